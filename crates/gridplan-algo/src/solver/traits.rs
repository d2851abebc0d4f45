//! Error and solution types shared by both solver layers.
//!
//! Unlike `gridplan_core::error::GridError`, this is hand-rolled rather than
//! `thiserror`-derived: solver failures carry backend-specific prose (a
//! clarabel or HiGHS status string) that doesn't fit neatly into an enum of
//! structured variants, so a plain `Display` impl reads better here.

use good_lp::Variable;

/// A failure from either solver layer.
#[derive(Debug)]
pub enum SolveError {
    /// The problem has no feasible point.
    Infeasible(String),
    /// The objective is unbounded on the feasible region.
    Unbounded(String),
    /// The backend itself failed (numerical issue, iteration limit, panic
    /// caught at the boundary).
    Backend(String),
    /// The problem was malformed before it ever reached the backend (empty
    /// variable set, mismatched row count, unknown solver name).
    Configuration(String),
}

impl std::fmt::Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::Infeasible(msg) => write!(f, "infeasible: {msg}"),
            SolveError::Unbounded(msg) => write!(f, "unbounded: {msg}"),
            SolveError::Backend(msg) => write!(f, "solver backend error: {msg}"),
            SolveError::Configuration(msg) => write!(f, "invalid problem: {msg}"),
        }
    }
}

impl std::error::Error for SolveError {}

/// A solved `good_lp` problem, with the concrete backend's solution type
/// erased behind a closure so callers don't need to know which backend ran.
pub struct LpSolution {
    pub objective_value: f64,
    resolver: Box<dyn Fn(Variable) -> f64 + Send + Sync>,
}

impl LpSolution {
    pub fn new(objective_value: f64, resolver: impl Fn(Variable) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            objective_value,
            resolver: Box::new(resolver),
        }
    }

    pub fn value(&self, var: Variable) -> f64 {
        (self.resolver)(var)
    }
}

impl std::fmt::Debug for LpSolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LpSolution")
            .field("objective_value", &self.objective_value)
            .finish_non_exhaustive()
    }
}
