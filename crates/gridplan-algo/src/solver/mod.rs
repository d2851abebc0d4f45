//! LP/MIP solver abstraction for the model builder and runners.
//!
//! Two layers exist, deliberately:
//!
//! - [`goodlp`] assembles and solves problems through `good_lp`, which is
//!   what the monolithic runner, iterative runner, and Benders master use.
//!   `good_lp` does not expose dual variables in a backend-agnostic way.
//! - [`clarabel_dual`] drops to the `clarabel` crate directly for the
//!   Benders slave solve, which needs genuine duals to build optimality and
//!   feasibility cuts.

pub mod clarabel_dual;
pub mod goodlp;
pub mod registry;
pub mod traits;

pub use clarabel_dual::{solve_allow_infeasible, solve_with_duals, ClarabelDualSolution, ClarabelLp, SlaveOutcome};
pub use goodlp::solve;
pub use registry::SolverKind;
pub use traits::{LpSolution, SolveError};
