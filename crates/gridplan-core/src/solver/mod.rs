//! Dense linear-system solver backends, used by sensitivity analysis (PTDF)
//! and other dense linear-algebra needs outside the LP/MIP solve itself.
//!
//! For the optimization (LP/MIP) solver abstraction, see
//! `gridplan_algo::solver`.

pub mod backend;
pub mod registry;

pub use backend::{FaerSolver, GaussSolver, LinearSystemBackend};
pub use registry::{register_solver, SolverKind};
