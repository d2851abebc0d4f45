//! Unified error type for the gridplan core data model.
//!
//! Domain-specific solver/builder errors in `gridplan-algo` convert into
//! this type at crate boundaries so callers have one error to match on.

use thiserror::Error;

/// Unified error type for network-model-level operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// Configuration is internally inconsistent (caught before any solve).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The network itself violates a structural invariant.
    #[error("network error: {0}")]
    Network(String),

    /// A solver backend failed to produce a usable result.
    #[error("solver error: {0}")]
    Solver(String),

    /// Generic errors for wrapping external errors.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias for `Result<T, GridError>`.
pub type GridResult<T> = Result<T, GridError>;

impl From<String> for GridError {
    fn from(s: String) -> Self {
        GridError::Other(s)
    }
}

impl From<&str> for GridError {
    fn from(s: &str) -> Self {
        GridError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GridError::Solver("infeasible".into());
        assert!(err.to_string().contains("solver error"));
        assert!(err.to_string().contains("infeasible"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> GridResult<()> {
            Err(GridError::Network("dangling bus reference".into()))
        }
        fn outer() -> GridResult<()> {
            inner()?;
            Ok(())
        }
        assert!(outer().is_err());
    }
}
