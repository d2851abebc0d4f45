//! Monolithic LOPF runner: one [`Model`] spanning every snapshot, covering
//! both investment and operation.
//!
//! Grounded on the overall shape of `gat_algo::opf::OpfSolver::solve` (build
//! → dispatch-to-formulation → return a typed solution) and
//! `gat_algo::tep::solver::solve_tep` (build → solve → decode into a typed
//! solution struct), generalized here to write results back onto `Network`
//! rather than only returning a flat struct.

use std::collections::HashMap;

use gridplan_core::{BusId, GeneratorId, LineId, LinkId, Network, Node, StoreId, StorageUnitId};

use crate::benders::build_slave;
use crate::builder::{BuildConfig, Model, ModelBuilder, Partition, Role};
use crate::error::RunError;
use crate::solver::{self, SolverKind};

/// Per-snapshot operational results and the objective value of a solved
/// monolithic run. Investment results are written directly onto `Network`
/// (see [`run_monolithic`]); this struct holds everything the spec calls
/// per-snapshot output.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    pub objective_value: f64,
    pub dispatch: HashMap<(GeneratorId, usize), f64>,
    pub line_flow: HashMap<(LineId, usize), f64>,
    pub link_flow: HashMap<(LinkId, usize), f64>,
    pub su_soc: HashMap<(StorageUnitId, usize), f64>,
    pub st_soc: HashMap<(StoreId, usize), f64>,
    pub su_spill: HashMap<(StorageUnitId, usize), f64>,
    pub st_spill: HashMap<(StoreId, usize), f64>,
    /// Nodal marginal prices from the nodal-balance constraint's dual value
    /// (spec §4.5, §6 Outputs). `good_lp`'s `Solution` trait is primal-only
    /// (see `crate::solver::clarabel_dual`'s module doc), so these are
    /// computed by re-posing the solved, fixed-capacity dispatch directly
    /// against `clarabel` (see `nodal_prices` below) purely to read its
    /// duals; empty only if that re-solve itself fails (e.g. a formulation
    /// this crate can't pose as a clarabel LP).
    pub nodal_prices: HashMap<(BusId, usize), f64>,
}

/// Build the full-horizon monolithic `Model`, solve it, and write optimized
/// capacities and per-snapshot operation back onto `network`.
pub fn run_monolithic(network: &mut Network, config: &BuildConfig, solver_kind: SolverKind) -> Result<Solution, RunError> {
    let partition = Partition::from_network(network);
    let model = ModelBuilder::build(network, config, Role::Monolithic)?;

    let Model {
        vars,
        constraints,
        objective,
        dispatch,
        line_flow,
        link_flow,
        su_dispatch: _,
        su_store: _,
        su_soc,
        su_spill,
        st_dispatch: _,
        st_store: _,
        st_soc,
        st_spill,
        g_p_nom,
        ln_s_nom,
        lk_p_nom,
        su_p_nom,
        st_e_nom,
        ..
    } = model;

    let solution = solver::solve(solver_kind, vars, objective, constraints)?;

    write_investment_back(network, &partition, &solution, &g_p_nom, &ln_s_nom, &lk_p_nom, &su_p_nom, &st_e_nom);

    let mut out = Solution {
        objective_value: solution.objective_value,
        ..Solution::default()
    };
    for (&key, &var) in &dispatch {
        out.dispatch.insert(key, solution.value(var));
    }
    for (&key, &var) in &line_flow {
        out.line_flow.insert(key, solution.value(var));
    }
    for (&key, &var) in &link_flow {
        out.link_flow.insert(key, solution.value(var));
    }
    for (&key, &var) in &su_soc {
        out.su_soc.insert(key, solution.value(var));
    }
    for (&key, &var) in &st_soc {
        out.st_soc.insert(key, solution.value(var));
    }
    for (&key, &var) in &su_spill {
        out.su_spill.insert(key, solution.value(var));
    }
    for (&key, &var) in &st_spill {
        out.st_spill.insert(key, solution.value(var));
    }

    out.nodal_prices = nodal_prices(network, config, &partition);

    Ok(out)
}

/// Marginal prices at every (bus, snapshot): the dual of that bus's nodal
/// balance row (spec §4.5, §6 Outputs). `good_lp`'s `Solution` trait is
/// primal-only, so this re-poses the now-fixed-capacity dispatch as a
/// standalone LP against `clarabel` directly (the same path the Benders
/// slave uses) purely to read its duals back; it does not affect the
/// investment/operation result already written onto `network`.
fn nodal_prices(
    network: &Network,
    config: &BuildConfig,
    partition: &Partition,
) -> HashMap<(BusId, usize), f64> {
    let snapshots: Vec<usize> = (0..network.snapshots.len()).collect();
    let Ok(slave) = build_slave(network, config, partition, snapshots) else {
        return HashMap::new();
    };
    let Ok(dual_solution) = solver::solve_with_duals(&slave.lp) else {
        return HashMap::new();
    };
    slave
        .balance_row
        .iter()
        .map(|(&key, &row)| (key, dual_solution.dual_eq[row]))
        .collect()
}

/// Write `*_nom_opt` investment results back onto `network`'s canonical
/// capacity fields. Fixed assets are left untouched (`*_nom_opt = *_nom` by
/// definition, spec §3 Invariants).
pub(crate) fn write_investment_back(
    network: &mut Network,
    partition: &Partition,
    solution: &solver::LpSolution,
    g_p_nom: &HashMap<GeneratorId, good_lp::Variable>,
    ln_s_nom: &HashMap<LineId, good_lp::Variable>,
    lk_p_nom: &HashMap<LinkId, good_lp::Variable>,
    su_p_nom: &HashMap<StorageUnitId, good_lp::Variable>,
    st_e_nom: &HashMap<StoreId, good_lp::Variable>,
) {
    for node in network.graph.node_weights_mut() {
        match node {
            Node::Generator(g) if partition.generators_extendable.contains(&g.id) => {
                if let Some(&var) = g_p_nom.get(&g.id) {
                    g.p_nom = gridplan_core::Megawatts(solution.value(var));
                }
            }
            Node::StorageUnit(su) if partition.storage_units_extendable.contains(&su.id) => {
                if let Some(&var) = su_p_nom.get(&su.id) {
                    su.p_nom = gridplan_core::Megawatts(solution.value(var));
                }
            }
            Node::Store(st) if partition.stores_extendable.contains(&st.id) => {
                if let Some(&var) = st_e_nom.get(&st.id) {
                    st.e_nom = gridplan_core::MegawattHours(solution.value(var));
                }
            }
            _ => {}
        }
    }

    for edge in network.graph.edge_weights_mut() {
        match edge {
            gridplan_core::Edge::Line(l) if partition.lines_extendable.contains(&l.id) => {
                if let Some(&var) = ln_s_nom.get(&l.id) {
                    l.s_nom = gridplan_core::Megawatts(solution.value(var));
                }
            }
            gridplan_core::Edge::Link(lk) if partition.links_extendable.contains(&lk.id) => {
                if let Some(&var) = lk_p_nom.get(&lk.id) {
                    lk.p_nom = gridplan_core::Megawatts(solution.value(var));
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridplan_core::{Bus, Generator, Line, LineId, Load, LoadId, Node};

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        let b1 = network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(1),
            name: "A".into(),
            v_nom: gridplan_core::Kilovolts(230.0),
            carrier: None,
        }));
        let b2 = network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(2),
            name: "B".into(),
            v_nom: gridplan_core::Kilovolts(230.0),
            carrier: None,
        }));
        network.graph.add_node(Node::Generator(
            Generator::new(GeneratorId::new(1), "cheap".into(), BusId::new(1))
                .with_p_limits(0.0, 100.0)
                .with_marginal_cost(10.0),
        ));
        network.graph.add_node(Node::Load(Load {
            id: LoadId::new(1),
            name: "L".into(),
            bus: BusId::new(2),
            p_set: vec![gridplan_core::Megawatts(40.0)],
        }));
        let l = Line::new(LineId::new(1), "L1".into(), BusId::new(1), BusId::new(2), 0.1).with_thermal_limit(100.0);
        network.graph.add_edge(b1, b2, gridplan_core::Edge::Line(l));
        network
    }

    #[test]
    fn solves_and_reports_dispatch_matching_load() {
        let mut network = two_bus_network();
        let config = BuildConfig::default();
        let solution = run_monolithic(&mut network, &config, SolverKind::Clarabel).unwrap();
        let dispatched: f64 = solution.dispatch.values().sum();
        assert!((dispatched - 40.0).abs() < 1e-3);
    }

    #[test]
    fn reports_a_nodal_price_at_every_bus() {
        let mut network = two_bus_network();
        let config = BuildConfig::default();
        let solution = run_monolithic(&mut network, &config, SolverKind::Clarabel).unwrap();
        assert_eq!(solution.nodal_prices.len(), 2);
        assert!(solution.nodal_prices.values().all(|p| p.is_finite()));
    }
}
