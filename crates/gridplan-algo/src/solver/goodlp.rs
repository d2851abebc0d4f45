//! Problem assembly and solving through `good_lp`.
//!
//! This is the entry point used by the model builder, the monolithic and
//! iterative runners, and the Benders master problem. `good_lp` is built
//! generic over its backend (`.using(clarabel)`, `.using(highs)`), which
//! means each backend produces a different concrete `Solution` type; we
//! erase that behind [`LpSolution`] right where the branch is taken so
//! callers never need to know which backend ran.

use good_lp::{constraint::Constraint, Expression, ProblemVariables, Solution, SolverModel};

use super::registry::SolverKind;
use super::traits::{LpSolution, SolveError};

/// Solve a minimization problem with the chosen backend.
///
/// `constraints` is consumed in order; large problems (the monolithic
/// runner's full-horizon LOPF, in particular) can hold tens of thousands of
/// rows, so this takes ownership rather than borrowing to avoid a clone.
pub fn solve(
    kind: SolverKind,
    vars: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
) -> Result<LpSolution, SolveError> {
    match kind {
        SolverKind::Clarabel => solve_clarabel(vars, objective, constraints),
        SolverKind::Highs => solve_highs(vars, objective, constraints),
    }
}

#[cfg(feature = "solver-clarabel")]
fn solve_clarabel(
    vars: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
) -> Result<LpSolution, SolveError> {
    let obj_for_eval = objective.clone();
    let mut model = vars.minimise(objective).using(good_lp::solvers::clarabel::clarabel);
    for c in constraints {
        model = model.with(c);
    }
    let solution = model
        .solve()
        .map_err(|e| SolveError::Infeasible(e.to_string()))?;
    let objective_value = solution.eval(&obj_for_eval);
    Ok(LpSolution::new(objective_value, move |v| solution.value(v)))
}

#[cfg(not(feature = "solver-clarabel"))]
fn solve_clarabel(
    _vars: ProblemVariables,
    _objective: Expression,
    _constraints: Vec<Constraint>,
) -> Result<LpSolution, SolveError> {
    Err(SolveError::Configuration(
        "clarabel backend not compiled in; enable the solver-clarabel feature".into(),
    ))
}

#[cfg(feature = "solver-highs")]
fn solve_highs(
    vars: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
) -> Result<LpSolution, SolveError> {
    let obj_for_eval = objective.clone();
    let mut model = vars.minimise(objective).using(good_lp::solvers::highs::highs);
    for c in constraints {
        model = model.with(c);
    }
    let solution = model
        .solve()
        .map_err(|e| SolveError::Infeasible(e.to_string()))?;
    let objective_value = solution.eval(&obj_for_eval);
    Ok(LpSolution::new(objective_value, move |v| solution.value(v)))
}

#[cfg(not(feature = "solver-highs"))]
fn solve_highs(
    _vars: ProblemVariables,
    _objective: Expression,
    _constraints: Vec<Constraint>,
) -> Result<LpSolution, SolveError> {
    Err(SolveError::Configuration(
        "HiGHS backend not compiled in; enable the solver-highs feature (required for MIP investment types)".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::variable;

    #[test]
    fn solves_trivial_lp() {
        let mut vars = ProblemVariables::new();
        let x = vars.add(variable().min(0.0).max(10.0));
        let constraints = vec![good_lp::constraint!(x >= 3.0)];
        let solution = solve(SolverKind::Clarabel, vars, x.into(), constraints).unwrap();
        assert!((solution.value(x) - 3.0).abs() < 1e-4);
        assert!((solution.objective_value - 3.0).abs() < 1e-4);
    }
}
