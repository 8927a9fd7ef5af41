//! Backend-neutral model representation.
//!
//! Formulations describe their LP/MILP here: variables are registered by
//! family name and index tuple, rows are linear, and the objective is always
//! maximized. Backends translate a [`MilpModel`] into their own API.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{SolverError, SolverResult};

/// Position of a variable inside its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarSpec {
    pub family: String,
    pub index: Vec<usize>,
    pub lower: f64,
    pub upper: f64,
    pub kind: VarKind,
    /// Starting value handed to the backend as a MIP start hint
    pub start: Option<f64>,
}

impl VarSpec {
    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }
}

/// `Σ coef·var + constant`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Builder form of [`LinearExpr::add_term`].
    pub fn term(mut self, var: VarId, coef: f64) -> Self {
        self.add_term(var, coef);
        self
    }

    /// Zero coefficients are dropped.
    pub fn add_term(&mut self, var: VarId, coef: f64) {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// `self += factor·other`
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: f64) {
        for (v, c) in &other.terms {
            self.add_term(*v, c * factor);
        }
        self.constant += other.constant * factor;
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, levels: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(v, c)| c * levels[v.index()])
                .sum::<f64>()
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        let mut expr = LinearExpr::new();
        for (v, c) in iter {
            expr.add_term(v, c);
        }
        expr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// `expr <sense> rhs`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub name: String,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Row {
    /// Amount by which `levels` violate the row; 0 when satisfied.
    pub fn violation(&self, levels: &[f64]) -> f64 {
        let lhs = self.expr.evaluate(levels);
        match self.sense {
            Sense::Le => (lhs - self.rhs).max(0.0),
            Sense::Ge => (self.rhs - lhs).max(0.0),
            Sense::Eq => (lhs - self.rhs).abs(),
        }
    }
}

/// A maximization LP/MILP.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MilpModel {
    name: String,
    vars: Vec<VarSpec>,
    #[serde(skip)]
    lookup: HashMap<(String, Vec<usize>), VarId>,
    rows: Vec<Row>,
    objective: LinearExpr,
}

impl MilpModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a variable. Re-registering the same family and index
    /// returns the existing id unchanged.
    pub fn add_var(
        &mut self,
        family: &str,
        index: &[usize],
        lower: f64,
        upper: f64,
        kind: VarKind,
    ) -> VarId {
        let key = (family.to_string(), index.to_vec());
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = VarId(self.vars.len());
        self.vars.push(VarSpec {
            family: family.to_string(),
            index: index.to_vec(),
            lower,
            upper,
            kind,
            start: None,
        });
        self.lookup.insert(key, id);
        id
    }

    pub fn add_continuous(&mut self, family: &str, index: &[usize], lower: f64, upper: f64) -> VarId {
        self.add_var(family, index, lower, upper, VarKind::Continuous)
    }

    pub fn add_binary(&mut self, family: &str, index: &[usize]) -> VarId {
        self.add_var(family, index, 0.0, 1.0, VarKind::Binary)
    }

    /// Fix a variable by collapsing its bounds.
    pub fn fix(&mut self, var: VarId, value: f64) {
        let spec = &mut self.vars[var.index()];
        spec.lower = value;
        spec.upper = value;
    }

    pub fn set_bounds(&mut self, var: VarId, lower: f64, upper: f64) {
        let spec = &mut self.vars[var.index()];
        spec.lower = lower;
        spec.upper = upper;
    }

    pub fn set_start(&mut self, var: VarId, value: f64) {
        self.vars[var.index()].start = Some(value);
    }

    pub fn add_row(&mut self, name: impl Into<String>, expr: LinearExpr, sense: Sense, rhs: f64) {
        self.rows.push(Row {
            name: name.into(),
            expr,
            sense,
            rhs,
        });
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn var(&self, family: &str, index: &[usize]) -> Option<VarId> {
        self.lookup
            .get(&(family.to_string(), index.to_vec()))
            .copied()
    }

    pub fn spec(&self, var: VarId) -> &VarSpec {
        &self.vars[var.index()]
    }

    pub fn vars(&self) -> &[VarSpec] {
        &self.vars
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_binaries(&self) -> usize {
        self.vars
            .iter()
            .filter(|v| v.kind == VarKind::Binary)
            .count()
    }

    /// Reject models no backend can make sense of.
    pub fn check(&self) -> SolverResult<()> {
        let invalid = |message: String| SolverError::InvalidModel {
            model: self.name.clone(),
            message,
        };
        for spec in &self.vars {
            if spec.lower.is_nan() || spec.upper.is_nan() || spec.lower > spec.upper {
                return Err(invalid(format!(
                    "variable {}{:?} has bounds [{}, {}]",
                    spec.family, spec.index, spec.lower, spec.upper
                )));
            }
        }
        let exprs = self
            .rows
            .iter()
            .map(|r| (r.name.as_str(), &r.expr, r.rhs))
            .chain(std::iter::once(("objective", &self.objective, 0.0)));
        for (name, expr, rhs) in exprs {
            let finite = rhs.is_finite()
                && expr.constant.is_finite()
                && expr.terms.iter().all(|(_, c)| c.is_finite());
            if !finite {
                return Err(invalid(format!("row {} has a non-finite coefficient", name)));
            }
            if let Some((v, _)) = expr.terms.iter().find(|(v, _)| v.index() >= self.vars.len()) {
                return Err(invalid(format!("row {} references unknown variable {}", name, v.index())));
            }
        }
        Ok(())
    }

    /// Largest row or bound violation of `levels`.
    pub fn max_violation(&self, levels: &[f64]) -> f64 {
        let rows = self.rows.iter().map(|r| r.violation(levels));
        let bounds = self.vars.iter().enumerate().map(|(i, spec)| {
            (spec.lower - levels[i]).max(levels[i] - spec.upper).max(0.0)
        });
        rows.chain(bounds).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_family_and_index() {
        let mut model = MilpModel::new("m");
        let a = model.add_continuous("FL", &[0, 1], 0.0, 5.0);
        let b = model.add_binary("CHI", &[0, 1, 2]);
        assert_eq!(model.var("FL", &[0, 1]), Some(a));
        assert_eq!(model.var("CHI", &[0, 1, 2]), Some(b));
        assert_eq!(model.var("FL", &[1, 0]), None);
        // duplicate registration returns the same id
        assert_eq!(model.add_continuous("FL", &[0, 1], 0.0, 9.0), a);
        assert_eq!(model.num_vars(), 2);
        assert_eq!(model.num_binaries(), 1);
    }

    #[test]
    fn fix_collapses_bounds() {
        let mut model = MilpModel::new("m");
        let x = model.add_continuous("x", &[], 0.0, 10.0);
        model.fix(x, 3.0);
        assert!(model.spec(x).is_fixed());
        assert_eq!(model.spec(x).upper, 3.0);
    }

    #[test]
    fn violation_measures_rows_and_bounds() {
        let mut model = MilpModel::new("m");
        let x = model.add_continuous("x", &[], 0.0, 1.0);
        let y = model.add_continuous("y", &[], 0.0, 10.0);
        model.add_row("sum", LinearExpr::new().term(x, 1.0).term(y, 1.0), Sense::Le, 4.0);
        model.add_row("eq", LinearExpr::new().term(y, 2.0), Sense::Eq, 6.0);
        assert_eq!(model.max_violation(&[1.0, 3.0]), 0.0);
        assert_eq!(model.max_violation(&[1.0, 4.0]), 2.0);
        assert_eq!(model.max_violation(&[1.5, 3.0]), 0.5);
    }

    #[test]
    fn check_rejects_crossed_bounds() {
        let mut model = MilpModel::new("bad");
        let x = model.add_continuous("x", &[], 0.0, 1.0);
        model.set_bounds(x, 2.0, 1.0);
        let err = model.check().unwrap_err();
        assert!(err.to_string().contains("invalid model 'bad'"));
    }

    #[test]
    fn evaluate_includes_constant() {
        let expr: LinearExpr = vec![(VarId(0), 2.0), (VarId(1), 0.0)].into_iter().collect();
        assert_eq!(expr.terms.len(), 1);
        let expr = LinearExpr::constant(1.5).term(VarId(0), 2.0);
        assert_eq!(expr.evaluate(&[4.0]), 9.5);
    }
}
