//! Direct `clarabel` usage for the Benders slave problem.
//!
//! `good_lp` does not expose dual variables in a backend-agnostic way (its
//! `Solution` trait is primal-only), but the Benders decomposition driver
//! needs genuine duals on the slave's equality and inequality rows to build
//! optimality cuts, and extreme rays of the dual when the slave is
//! infeasible to build feasibility cuts. So the slave is posed directly in
//! clarabel's native conic form instead of going through `good_lp`.
//!
//! The slave is always a pure LP (investment decisions are fixed by the
//! master before the slave runs), so the quadratic term `P` is always zero
//! and only two cone blocks are needed: a zero cone for equality rows
//! (nodal balance, angle-difference flow definitions) and a nonnegative
//! cone for inequality rows (thermal limits, dispatch bounds).

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};

use super::traits::SolveError;

/// A linear program in the split form clarabel expects: `eq_rows * x =
/// eq_rhs` and `ineq_rows * x <= ineq_rhs`, minimizing `cost . x`.
#[derive(Debug, Clone)]
pub struct ClarabelLp {
    pub num_vars: usize,
    pub cost: Vec<f64>,
    pub eq_rows: Vec<Vec<f64>>,
    pub eq_rhs: Vec<f64>,
    pub ineq_rows: Vec<Vec<f64>>,
    pub ineq_rhs: Vec<f64>,
}

/// Primal and dual values from a solved [`ClarabelLp`].
///
/// `dual_eq[i]` is the shadow price of `eq_rows[i]`; `dual_ineq[j]` is the
/// shadow price of `ineq_rows[j]`. Benders optimality cuts are built from
/// these; when the slave reports [`SolveError::Infeasible`], the caller
/// should instead fall back to a feasibility cut from the same dual
/// direction (clarabel reports a certificate in `z` even on the infeasible
/// path).
#[derive(Debug, Clone)]
pub struct ClarabelDualSolution {
    pub objective_value: f64,
    pub primal: Vec<f64>,
    pub dual_eq: Vec<f64>,
    pub dual_ineq: Vec<f64>,
}

fn dense_to_csc(rows: &[Vec<f64>], num_cols: usize) -> CscMatrix<f64> {
    let num_rows = rows.len();
    let mut col_major: Vec<Vec<(usize, f64)>> = vec![Vec::new(); num_cols];
    for (r, row) in rows.iter().enumerate() {
        for (c, &val) in row.iter().enumerate() {
            if val != 0.0 {
                col_major[c].push((r, val));
            }
        }
    }

    let mut colptr = Vec::with_capacity(num_cols + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for col in &col_major {
        for &(r, v) in col {
            rowval.push(r);
            nzval.push(v);
        }
        colptr.push(rowval.len());
    }

    CscMatrix::new(num_rows, num_cols, colptr, rowval, nzval)
}

/// Solve `lp` and return primal and dual values.
pub fn solve_with_duals(lp: &ClarabelLp) -> Result<ClarabelDualSolution, SolveError> {
    if lp.num_vars == 0 {
        return Err(SolveError::Configuration("slave LP has no variables".into()));
    }

    let n_eq = lp.eq_rows.len();
    let n_ineq = lp.ineq_rows.len();

    let mut a_rows = lp.eq_rows.clone();
    a_rows.extend(lp.ineq_rows.iter().cloned());
    let a = dense_to_csc(&a_rows, lp.num_vars);

    let mut b = lp.eq_rhs.clone();
    b.extend(lp.ineq_rhs.iter().copied());

    let p = CscMatrix::zeros((lp.num_vars, lp.num_vars));

    let cones = vec![
        SupportedConeT::ZeroConeT(n_eq),
        SupportedConeT::NonnegativeConeT(n_ineq),
    ];

    let settings = DefaultSettingsBuilder::default()
        .verbose(false)
        .build()
        .map_err(|e| SolveError::Configuration(e.to_string()))?;

    let mut solver = DefaultSolver::new(&p, &lp.cost, &a, &b, &cones, settings);
    solver.solve();

    match solver.solution.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(ClarabelDualSolution {
            objective_value: solver.solution.obj_val,
            primal: solver.solution.x.clone(),
            dual_eq: solver.solution.z[..n_eq].to_vec(),
            dual_ineq: solver.solution.z[n_eq..n_eq + n_ineq].to_vec(),
        }),
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            Err(SolveError::Infeasible(format!(
                "slave LP infeasible (status {:?})",
                solver.solution.status
            )))
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            Err(SolveError::Unbounded(format!(
                "slave LP unbounded (status {:?})",
                solver.solution.status
            )))
        }
        other => Err(SolveError::Backend(format!("clarabel status {other:?}"))),
    }
}

/// Outcome of a slave solve that the Benders driver can build a cut from
/// either way: an optimal solve yields an optimality cut, an infeasible one
/// yields a feasibility cut from the same dual vector (clarabel reports a
/// certificate in `z` on the infeasible path too).
#[derive(Debug, Clone)]
pub enum SlaveOutcome {
    Optimal(ClarabelDualSolution),
    Infeasible(ClarabelDualSolution),
}

/// Like [`solve_with_duals`], but returns the dual certificate instead of an
/// error when the slave is infeasible, so the caller can derive a
/// feasibility cut from it. Still returns `Err` for unbounded/backend
/// failures, which have no cut-generation meaning.
pub fn solve_allow_infeasible(lp: &ClarabelLp) -> Result<SlaveOutcome, SolveError> {
    if lp.num_vars == 0 {
        return Err(SolveError::Configuration("slave LP has no variables".into()));
    }

    let n_eq = lp.eq_rows.len();
    let n_ineq = lp.ineq_rows.len();

    let mut a_rows = lp.eq_rows.clone();
    a_rows.extend(lp.ineq_rows.iter().cloned());
    let a = dense_to_csc(&a_rows, lp.num_vars);

    let mut b = lp.eq_rhs.clone();
    b.extend(lp.ineq_rhs.iter().copied());

    let p = CscMatrix::zeros((lp.num_vars, lp.num_vars));

    let cones = vec![
        SupportedConeT::ZeroConeT(n_eq),
        SupportedConeT::NonnegativeConeT(n_ineq),
    ];

    let settings = DefaultSettingsBuilder::default()
        .verbose(false)
        .build()
        .map_err(|e| SolveError::Configuration(e.to_string()))?;

    let mut solver = DefaultSolver::new(&p, &lp.cost, &a, &b, &cones, settings);
    solver.solve();

    let dual_solution = ClarabelDualSolution {
        objective_value: solver.solution.obj_val,
        primal: solver.solution.x.clone(),
        dual_eq: solver.solution.z[..n_eq].to_vec(),
        dual_ineq: solver.solution.z[n_eq..n_eq + n_ineq].to_vec(),
    };

    match solver.solution.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(SlaveOutcome::Optimal(dual_solution)),
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            Ok(SlaveOutcome::Infeasible(dual_solution))
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => Err(SolveError::Unbounded(format!(
            "slave LP unbounded (status {:?})",
            solver.solution.status
        ))),
        other => Err(SolveError::Backend(format!("clarabel status {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_simple_equality_constrained_lp() {
        // minimize x + y  s.t.  x + y = 4, x >= 0, y >= 0 (encoded as -x <= 0, -y <= 0)
        let lp = ClarabelLp {
            num_vars: 2,
            cost: vec![1.0, 1.0],
            eq_rows: vec![vec![1.0, 1.0]],
            eq_rhs: vec![4.0],
            ineq_rows: vec![vec![-1.0, 0.0], vec![0.0, -1.0]],
            ineq_rhs: vec![0.0, 0.0],
        };
        let solution = solve_with_duals(&lp).unwrap();
        assert!((solution.objective_value - 4.0).abs() < 1e-6);
        assert_eq!(solution.dual_eq.len(), 1);
        assert_eq!(solution.dual_ineq.len(), 2);
    }

    #[test]
    fn reports_infeasibility() {
        // x = 1 and x = 2 simultaneously
        let lp = ClarabelLp {
            num_vars: 1,
            cost: vec![1.0],
            eq_rows: vec![vec![1.0], vec![1.0]],
            eq_rhs: vec![1.0, 2.0],
            ineq_rows: vec![],
            ineq_rhs: vec![],
        };
        let result = solve_with_duals(&lp);
        assert!(result.is_err());
    }
}
