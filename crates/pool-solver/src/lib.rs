//! # pool-solver: MILP boundary for the pooling workspace
//!
//! Formulations build a backend-neutral [`MilpModel`] (variables addressed by
//! family name and index tuple, linear rows, a maximized objective) and hand
//! it to a [`Solver`] through a [`SolveRequest`]. The response carries a
//! [`ModelStatus`], the objective and one level per variable.
//!
//! ## Backends
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | microlp | `solver-microlp` (default) | pure Rust, branch and bound |
//! | HiGHS | `solver-highs` | native, optional |
//!
//! ```ignore
//! use pool_solver::{LinearExpr, MilpModel, Sense, SolveRequest, SolverKind};
//! use std::time::Duration;
//!
//! let mut model = MilpModel::new("demo");
//! let x = model.add_continuous("x", &[], 0.0, 4.0);
//! model.add_row("cap", LinearExpr::new().term(x, 2.0), Sense::Le, 6.0);
//! model.set_objective(LinearExpr::new().term(x, 1.0));
//!
//! let solver = SolverKind::Microlp.build_solver()?;
//! let response = solver.solve(&SolveRequest::new(&model, Duration::from_secs(10), 1e-4))?;
//! assert_eq!(response.objective, Some(3.0));
//! ```

pub mod backend;
pub mod error;
pub mod model;
pub mod registry;
pub mod solver;
pub mod status;

pub use backend::GoodLpSolver;
pub use error::{SolverError, SolverResult};
pub use model::{LinearExpr, MilpModel, Row, Sense, VarId, VarKind, VarSpec};
pub use registry::SolverKind;
pub use solver::{SolveRequest, SolveResponse, Solver};
pub use status::ModelStatus;
