//! Naming for the LP/MIP backends reachable through [`super::goodlp::solve`].
//!
//! This mirrors the shape of `gridplan_core::solver::registry` (normalize,
//! `FromStr`, an `available()` listing) but is a closed enum rather than a
//! runtime constructor table. `good_lp` picks its backend by monomorphizing
//! over a solver-specific function (`clarabel()`, `highs()`) rather than
//! through a trait object, and which of those functions even exist is gated
//! by Cargo features (`solver-clarabel`, `solver-highs`) — so there is
//! nothing to register at runtime, only a name to resolve.

use std::fmt;
use std::str::FromStr;

use super::traits::SolveError;

/// Which `good_lp` backend to route a solve through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverKind {
    /// Interior-point conic solver. Handles continuous LPs; MILP investment
    /// variables must be relaxed or handled by the caller.
    #[default]
    Clarabel,
    /// Branch-and-bound MIP solver. Required for `integer`, `binary`, and
    /// `integer_bigm` investment types.
    Highs,
}

impl SolverKind {
    /// Backend names compiled into this binary, given the active features.
    pub fn available() -> Vec<&'static str> {
        let mut names = Vec::new();
        if cfg!(feature = "solver-clarabel") {
            names.push("clarabel");
        }
        if cfg!(feature = "solver-highs") {
            names.push("highs");
        }
        names
    }

    fn normalize(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverKind::Clarabel => "clarabel",
            SolverKind::Highs => "highs",
        };
        write!(f, "{name}")
    }
}

impl FromStr for SolverKind {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::normalize(s).as_str() {
            "clarabel" => Ok(SolverKind::Clarabel),
            "highs" => Ok(SolverKind::Highs),
            other => Err(SolveError::Configuration(format!(
                "unknown solver '{other}', available: [{}]",
                Self::available().join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names_case_insensitively() {
        assert_eq!("Clarabel".parse::<SolverKind>().unwrap(), SolverKind::Clarabel);
        assert_eq!("HIGHS".parse::<SolverKind>().unwrap(), SolverKind::Highs);
    }

    #[test]
    fn unknown_name_reports_available() {
        let err = "gurobi".parse::<SolverKind>().unwrap_err();
        assert!(err.to_string().contains("gurobi"));
    }

    #[test]
    fn default_is_clarabel() {
        assert_eq!(SolverKind::default(), SolverKind::Clarabel);
    }
}
