//! Reader for the AMPL-style `.dat` pooling instances.
//!
//! The standard layout is a sequence of statements:
//!
//! ```text
//! set SOURCES := s1 s2 ;
//! set DEMANDS := d1 ;
//! set POOLS := p1 ;
//! set QUALITIES := q1 ;
//!
//! param:   capacity  varcost  revenue  :=
//! s1       100       6        .
//! s2       100       16       .
//! p1       100       .        .
//! d1       100       .        9        ;
//!
//! set INPOOLARCS := (s1,p1) , (s2,p1) ;
//! set OUTPOOLARCS := (p1,d1) ;
//! set INOUTARCS := (s2,d1) ;
//!
//! param quality : q1 :=
//! s1  3
//! s2  1
//! ;
//! param min_quality : q1 :=
//! d1  0
//! ;
//! param max_quality : q1 :=
//! d1  2.5
//! ;
//! ```
//!
//! The first four sets are always sources, demands, pools and contaminants,
//! in that order. Every set after them is read as a list of `(from,to)` arcs.
//! The three tables following the unit table are source quality, demand
//! minimum and demand maximum. `.` marks an empty cell.

use std::collections::HashMap;

use crate::error::{PoolError, PoolResult};
use crate::instance::{RawDemand, RawInstance, RawPool, RawSource};

#[derive(Debug, Default)]
struct UnitRow {
    capacity: Option<f64>,
    cost: Option<f64>,
    revenue: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Units,
    SourceQuality,
    MinQuality,
    MaxQuality,
}

impl Table {
    fn from_position(position: usize) -> Option<Self> {
        match position {
            0 => Some(Table::Units),
            1 => Some(Table::SourceQuality),
            2 => Some(Table::MinQuality),
            3 => Some(Table::MaxQuality),
            _ => None,
        }
    }
}

/// Column positions of the unit table, read from its header.
#[derive(Debug, Clone, Copy)]
struct UnitColumns {
    capacity: usize,
    cost: usize,
    revenue: usize,
}

impl UnitColumns {
    fn from_header(tokens: &[&str]) -> Self {
        let mut columns = UnitColumns {
            capacity: 0,
            cost: 1,
            revenue: 2,
        };
        let names: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|t| !t.starts_with("param") && *t != ":=" && *t != ":")
            .collect();
        for (position, name) in names.iter().enumerate() {
            match name.to_ascii_lowercase().as_str() {
                "capacity" | "cap" => columns.capacity = position,
                "varcost" | "cost" => columns.cost = position,
                "revenue" | "price" => columns.revenue = position,
                _ => {}
            }
        }
        columns
    }
}

#[derive(Debug, Default)]
struct DatBuilder {
    node_sets: Vec<Vec<String>>,
    arcs: Vec<(String, String)>,
    units: HashMap<String, UnitRow>,
    source_quality: HashMap<String, Vec<f64>>,
    min_quality: HashMap<String, Vec<f64>>,
    max_quality: HashMap<String, Vec<f64>>,
    tables_seen: usize,
}

/// Parse the contents of a `.dat` file into a raw instance.
pub fn parse_dat(name: &str, contents: &str) -> PoolResult<RawInstance> {
    let mut builder = DatBuilder::default();
    let mut pending_set: Option<(usize, String)> = None;
    let mut open_table: Option<(Table, Option<UnitColumns>)> = None;

    for (idx, raw_line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // continuation of a multi-line set statement
        if let Some((start, mut text)) = pending_set.take() {
            text.push(' ');
            text.push_str(line);
            if line.contains(';') {
                builder.add_set(start, &text)?;
            } else {
                pending_set = Some((start, text));
            }
            continue;
        }

        if let Some((table, columns)) = open_table {
            let closes = line.ends_with(';');
            let body = line.trim_end_matches(';').trim();
            if !body.is_empty() {
                builder.add_row(line_no, table, columns, body)?;
            }
            if closes {
                open_table = None;
            }
            continue;
        }

        let first = line.split_whitespace().next().unwrap_or("");
        if first == "set" {
            if line.contains(';') {
                builder.add_set(line_no, line)?;
            } else {
                pending_set = Some((line_no, line.to_string()));
            }
        } else if line.contains(":=") {
            let table = Table::from_position(builder.tables_seen).ok_or_else(|| {
                PoolError::parse_at(line_no, "more than four parameter tables")
            })?;
            builder.tables_seen += 1;
            let columns = if table == Table::Units {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                Some(UnitColumns::from_header(&tokens))
            } else {
                None
            };
            open_table = Some((table, columns));
        } else if builder.node_sets.is_empty() || first == "data;" || first == "end;" {
            // file banner before the first statement
            continue;
        } else {
            return Err(PoolError::parse_at(
                line_no,
                format!("unexpected statement '{}'", line),
            ));
        }
    }

    if let Some((start, _)) = pending_set {
        return Err(PoolError::parse_at(start, "set statement is missing ';'"));
    }
    if open_table.is_some() {
        return Err(PoolError::Parse(
            "parameter table is not terminated by ';'".to_string(),
        ));
    }

    builder.finish(name)
}

impl DatBuilder {
    fn add_set(&mut self, line_no: usize, text: &str) -> PoolResult<()> {
        let body = text
            .split_once(":=")
            .map(|(_, rest)| rest)
            .ok_or_else(|| PoolError::parse_at(line_no, "set statement without ':='"))?;
        let body = body.split(';').next().unwrap_or("");

        if self.node_sets.len() < 4 {
            let names = body.split_whitespace().map(str::to_string).collect();
            self.node_sets.push(names);
            return Ok(());
        }

        let mut rest = body;
        while let Some(open) = rest.find('(') {
            let close = rest[open..]
                .find(')')
                .map(|c| open + c)
                .ok_or_else(|| PoolError::parse_at(line_no, "unbalanced '(' in arc set"))?;
            let inner = &rest[open + 1..close];
            let (from, to) = inner
                .split_once(',')
                .ok_or_else(|| PoolError::parse_at(line_no, format!("bad arc '({})'", inner)))?;
            self.arcs
                .push((from.trim().to_string(), to.trim().to_string()));
            rest = &rest[close + 1..];
        }
        Ok(())
    }

    fn add_row(
        &mut self,
        line_no: usize,
        table: Table,
        columns: Option<UnitColumns>,
        body: &str,
    ) -> PoolResult<()> {
        let mut tokens = body.split_whitespace();
        let unit = tokens
            .next()
            .ok_or_else(|| PoolError::parse_at(line_no, "empty table row"))?
            .to_string();
        let cells: Vec<Option<f64>> = tokens
            .map(|token| parse_cell(line_no, token))
            .collect::<PoolResult<_>>()?;

        match table {
            Table::Units => {
                let columns = columns.unwrap_or(UnitColumns {
                    capacity: 0,
                    cost: 1,
                    revenue: 2,
                });
                let cell = |i: usize| cells.get(i).copied().flatten();
                self.units.insert(
                    unit,
                    UnitRow {
                        capacity: cell(columns.capacity),
                        cost: cell(columns.cost),
                        revenue: cell(columns.revenue),
                    },
                );
            }
            Table::SourceQuality | Table::MinQuality | Table::MaxQuality => {
                let values = cells
                    .into_iter()
                    .map(|cell| {
                        cell.ok_or_else(|| PoolError::parse_at(line_no, "quality cell is empty"))
                    })
                    .collect::<PoolResult<Vec<f64>>>()?;
                let target = match table {
                    Table::SourceQuality => &mut self.source_quality,
                    Table::MinQuality => &mut self.min_quality,
                    _ => &mut self.max_quality,
                };
                target.insert(unit, values);
            }
        }
        Ok(())
    }

    fn finish(mut self, name: &str) -> PoolResult<RawInstance> {
        if self.node_sets.len() < 4 {
            return Err(PoolError::Parse(format!(
                "expected four node sets (sources, demands, pools, contaminants), found {}",
                self.node_sets.len()
            )));
        }
        let contaminants = self.node_sets.pop().unwrap_or_default();
        let pool_names = self.node_sets.pop().unwrap_or_default();
        let demand_names = self.node_sets.pop().unwrap_or_default();
        let source_names = self.node_sets.pop().unwrap_or_default();

        let units = &self.units;
        let unit = |name: &str| {
            units
                .get(name)
                .ok_or_else(|| PoolError::Parse(format!("unit '{}' is missing from the unit table", name)))
        };
        let required = |value: Option<f64>, what: &str, name: &str| {
            value.ok_or_else(|| PoolError::Parse(format!("{} of '{}' is missing", what, name)))
        };

        let mut sources = Vec::with_capacity(source_names.len());
        for s in &source_names {
            let row = unit(s)?;
            let quality = self
                .source_quality
                .remove(s)
                .ok_or_else(|| PoolError::Parse(format!("quality of source '{}' is missing", s)))?;
            sources.push(RawSource::new(
                s,
                required(row.capacity, "capacity", s)?,
                required(row.cost, "cost", s)?,
                quality,
            ));
        }

        let mut pools = Vec::with_capacity(pool_names.len());
        for p in &pool_names {
            let row = unit(p)?;
            pools.push(RawPool::new(p, required(row.capacity, "capacity", p)?));
        }

        let mut demands = Vec::with_capacity(demand_names.len());
        for d in &demand_names {
            let row = unit(d)?;
            let min_quality = self.min_quality.remove(d).ok_or_else(|| {
                PoolError::Parse(format!("minimum quality of demand '{}' is missing", d))
            })?;
            let max_quality = self.max_quality.remove(d).ok_or_else(|| {
                PoolError::Parse(format!("maximum quality of demand '{}' is missing", d))
            })?;
            demands.push(RawDemand::new(
                d,
                required(row.capacity, "capacity", d)?,
                required(row.revenue, "revenue", d)?,
                min_quality,
                max_quality,
            ));
        }

        Ok(RawInstance {
            name: name.to_string(),
            contaminants,
            sources,
            pools,
            demands,
            pipes: self.arcs,
        })
    }
}

fn parse_cell(line_no: usize, token: &str) -> PoolResult<Option<f64>> {
    if token == "." {
        return Ok(None);
    }
    token
        .parse::<f64>()
        .map(Some)
        .map_err(|_| PoolError::parse_at(line_no, format!("'{}' is not a number", token)))
}
