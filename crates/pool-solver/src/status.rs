use serde::{Deserialize, Serialize};

/// Status reported by a backend for one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Proven optimal.
    Optimal,
    /// Locally optimal (nonconvex models).
    LocallyOptimal,
    /// Feasible integer solution, optimality not proven.
    IntegerSolutionFound,
    /// Feasible but stopped early.
    IntermediateNonoptimal,
    /// Proven infeasible.
    Infeasible,
    /// Stopped without finding any feasible point.
    InfeasibleNoSolution,
    /// Anything else (unbounded, numerical trouble, backend failure).
    Other,
}

impl ModelStatus {
    /// Whether the response carries a usable solution.
    pub fn is_solved(&self) -> bool {
        matches!(
            self,
            ModelStatus::Optimal
                | ModelStatus::LocallyOptimal
                | ModelStatus::IntegerSolutionFound
                | ModelStatus::IntermediateNonoptimal
        )
    }

    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            ModelStatus::Infeasible | ModelStatus::InfeasibleNoSolution
        )
    }
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Optimal => write!(f, "optimal"),
            ModelStatus::LocallyOptimal => write!(f, "locally optimal"),
            ModelStatus::IntegerSolutionFound => write!(f, "integer solution found"),
            ModelStatus::IntermediateNonoptimal => write!(f, "intermediate nonoptimal"),
            ModelStatus::Infeasible => write!(f, "infeasible"),
            ModelStatus::InfeasibleNoSolution => write!(f, "infeasible, no solution"),
            ModelStatus::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_are_disjoint() {
        let all = [
            ModelStatus::Optimal,
            ModelStatus::LocallyOptimal,
            ModelStatus::IntegerSolutionFound,
            ModelStatus::IntermediateNonoptimal,
            ModelStatus::Infeasible,
            ModelStatus::InfeasibleNoSolution,
            ModelStatus::Other,
        ];
        let solved = all.iter().filter(|s| s.is_solved()).count();
        let infeasible = all.iter().filter(|s| s.is_infeasible()).count();
        assert_eq!(solved, 4);
        assert_eq!(infeasible, 2);
        assert!(!ModelStatus::Other.is_solved());
        assert!(!ModelStatus::Other.is_infeasible());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ModelStatus::IntegerSolutionFound).unwrap();
        assert_eq!(json, "\"integer_solution_found\"");
    }
}
