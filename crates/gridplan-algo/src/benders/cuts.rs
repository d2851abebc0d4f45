//! Optimality and feasibility cuts derived from a slave solve's dual values,
//! by strong LP duality applied to the rows [`crate::benders::slave`] marked
//! as coupled to a master investment variable.
//!
//! Grounded on the same duality argument `gat_algo::tep::solver` applies when
//! it reads shadow prices off a solved relaxation to decide which capacity
//! candidates to fix next; here the readout feeds a cut instead of a fixing
//! decision.

use std::collections::HashMap;

use gridplan_core::{GeneratorId, LineId, LinkId};

use crate::builder::BuildConfig;

use super::slave::SlaveProblem;

/// Which master variable a cut term multiplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CutVariable {
    Generator(GeneratorId),
    Line(LineId),
    Link(LinkId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutKind {
    Optimality,
    Feasibility,
}

/// One Benders cut: `kind == Optimality` means `alpha[group] >= constant +
/// Σ coefficients[v] * v`; `kind == Feasibility` means `0 >= constant + Σ
/// coefficients[v] * v`, i.e. the right-hand side must never go positive.
#[derive(Debug, Clone)]
pub struct Cut {
    pub group: usize,
    pub kind: CutKind,
    pub constant: f64,
    pub coefficients: HashMap<CutVariable, f64>,
}

/// Build a cut from a solved (or infeasible) slave's dual vector, restricted
/// to `snapshots`.
///
/// A physical slave can span snapshots belonging to more than one cut group
/// (`split_subproblems` and `individualcuts` are independent axes — see
/// `crate::benders::run_benders`), so the caller passes exactly the subset
/// of its own `snapshots` that feed this cut's group; rows tagged to any
/// other snapshot are skipped.
///
/// `constant` sums `dual * rhs` over every row [`SlaveProblem::uncoupled_ineq_rows`]
/// names plus every equality row (equality rows are never coupled to a
/// master variable: their RHS is network data, not an investment decision).
/// Each coupled row instead contributes `dual * rescale * per-unit coeff *
/// master_var` to `coefficients`.
pub fn build_cut(
    slave: &SlaveProblem,
    config: &BuildConfig,
    group: usize,
    kind: CutKind,
    snapshots: &[usize],
    dual_eq: &[f64],
    dual_ineq: &[f64],
) -> Cut {
    let in_group: std::collections::HashSet<usize> = snapshots.iter().copied().collect();

    let mut constant = 0.0;
    for (row, &dual) in dual_eq.iter().enumerate() {
        if !in_group.contains(&slave.eq_row_t[row]) {
            continue;
        }
        constant += dual * slave.lp.eq_rhs[row];
    }
    for row in slave.uncoupled_ineq_rows() {
        if !in_group.contains(&slave.ineq_row_t[row]) {
            continue;
        }
        constant += dual_ineq[row] * slave.lp.ineq_rhs[row];
    }

    let mut coefficients: HashMap<CutVariable, f64> = HashMap::new();
    for (&(id, t), bound) in &slave.coupled_gen {
        if !in_group.contains(&t) {
            continue;
        }
        let coeff = dual_ineq[bound.lower_row] * config.rescale(config.rescaling.bounds_g, bound.lower_coeff)
            + dual_ineq[bound.upper_row] * config.rescale(config.rescaling.bounds_g, bound.upper_coeff);
        *coefficients.entry(CutVariable::Generator(id)).or_insert(0.0) += coeff;
    }
    for (&(id, t), bound) in &slave.coupled_line {
        if !in_group.contains(&t) {
            continue;
        }
        let coeff = dual_ineq[bound.lower_row] * config.rescale(config.rescaling.bounds_ln, bound.lower_coeff)
            + dual_ineq[bound.upper_row] * config.rescale(config.rescaling.bounds_ln, bound.upper_coeff);
        *coefficients.entry(CutVariable::Line(id)).or_insert(0.0) += coeff;
    }
    for (&(id, t), bound) in &slave.coupled_link {
        if !in_group.contains(&t) {
            continue;
        }
        let coeff = dual_ineq[bound.lower_row] * config.rescale(config.rescaling.bounds_lk, bound.lower_coeff)
            + dual_ineq[bound.upper_row] * config.rescale(config.rescaling.bounds_lk, bound.upper_coeff);
        *coefficients.entry(CutVariable::Link(id)).or_insert(0.0) += coeff;
    }

    Cut { group, kind, constant, coefficients }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benders::slave::build_slave;
    use crate::builder::Partition;
    use gridplan_core::{Bus, BusId, Generator, GeneratorId, Kilovolts, Line, LineId, Load, LoadId, Network, Node};

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        let b1 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(1), name: "A".into(), v_nom: Kilovolts(230.0), carrier: None }));
        let b2 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(2), name: "B".into(), v_nom: Kilovolts(230.0), carrier: None }));
        network.graph.add_node(Node::Generator(
            Generator::new(GeneratorId::new(1), "g".into(), BusId::new(1))
                .with_p_limits(0.0, 100.0)
                .with_marginal_cost(10.0)
                .extendable(0.0, 100.0, 1.0),
        ));
        network.graph.add_node(Node::Load(Load { id: LoadId::new(1), name: "L".into(), bus: BusId::new(2), p_set: vec![gridplan_core::Megawatts(40.0)] }));
        let l = Line::new(LineId::new(1), "L1".into(), BusId::new(1), BusId::new(2), 0.1).with_thermal_limit(100.0);
        network.graph.add_edge(b1, b2, gridplan_core::Edge::Line(l));
        network
    }

    #[test]
    fn optimality_cut_picks_up_generator_coupling() {
        let network = two_bus_network();
        let config = BuildConfig::default();
        let partition = Partition::from_network(&network);
        let slave = build_slave(&network, &config, &partition, vec![0]).unwrap();
        let solution = crate::solver::solve_with_duals(&slave.lp).unwrap();
        let cut = build_cut(&slave, &config, 0, CutKind::Optimality, &slave.snapshots, &solution.dual_eq, &solution.dual_ineq);
        assert!(cut.coefficients.contains_key(&CutVariable::Generator(GeneratorId::new(1))));
    }
}
