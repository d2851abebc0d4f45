//! Error type shared by the runners and the Benders driver.
//!
//! Hand-rolled rather than `thiserror`-derived, matching
//! [`crate::builder::BuildError`] and [`crate::solver::SolveError`]'s own
//! texture: this just wraps whichever of those two actually failed, plus a
//! `Network` variant for writeback-time inconsistencies (a model referencing
//! an asset the caller's `Network` no longer has).

use crate::builder::BuildError;
use crate::solver::SolveError;

#[derive(Debug)]
pub enum RunError {
    Build(BuildError),
    Solve(SolveError),
    Network(String),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Build(e) => write!(f, "{e}"),
            RunError::Solve(e) => write!(f, "{e}"),
            RunError::Network(msg) => write!(f, "network writeback error: {msg}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<BuildError> for RunError {
    fn from(e: BuildError) -> Self {
        RunError::Build(e)
    }
}

impl From<SolveError> for RunError {
    fn from(e: SolveError) -> Self {
        RunError::Solve(e)
    }
}
