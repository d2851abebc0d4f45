//! Per-snapshot operation variables: generator dispatch, storage/store
//! charge-discharge-SOC, and their capacity-coupling bounds.
//!
//! The fixed-asset bound `p_min_pu * p_nom <= dispatch <= p_max_pu * p_nom`
//! and the extendable-asset bound `p_min_pu * P_nom_var <= dispatch <=
//! p_max_pu * P_nom_var` (spec §4.4.3) are both linear: `p_min_pu`/
//! `p_max_pu` are per-snapshot data, multiplied by either a constant or a
//! decision variable. Only [`Role::Monolithic`] reaches this module — the
//! master skips operation variables entirely, and the Benders slave is
//! built through a separate direct-`clarabel` path (`crate::benders::slave`)
//! so it can mutate RHS and read duals each outer iteration.

use good_lp::{constraint, variable, Expression};

use gridplan_core::Network;

use super::partition::Partition;
use super::Model;

pub fn build_operation_variables(
    model: &mut Model,
    network: &Network,
    _config: &BuildConfig,
    partition: &Partition,
    snapshots: &[usize],
) {
    build_generator_dispatch(model, network, partition, snapshots);
    build_storage_unit_variables(model, network, partition, snapshots);
    build_store_variables(model, network, partition, snapshots);
}

fn build_generator_dispatch(model: &mut Model, network: &Network, partition: &Partition, snapshots: &[usize]) {
    for g in network.generators() {
        let is_ext = partition.generators_extendable.contains(&g.id);
        for &t in snapshots {
            let lo_pu = g.p_min_pu_at(t).value();
            let hi_pu = g.p_max_pu_at(t).value();

            let var = if is_ext {
                model.vars.add(variable().min(0.0))
            } else {
                model.vars.add(variable().min(lo_pu.min(0.0) * g.p_nom.value()))
            };

            let capacity: Expression = if is_ext {
                Expression::from(model.g_p_nom[&g.id])
            } else {
                Expression::from(g.p_nom.value())
            };

            model.constraints.push(constraint!(var >= lo_pu * capacity.clone()));
            model.constraints.push(constraint!(var <= hi_pu * capacity));
            model.dispatch.insert((g.id, t), var);
        }
    }
}

fn build_storage_unit_variables(model: &mut Model, network: &Network, partition: &Partition, snapshots: &[usize]) {
    for su in network.storage_units() {
        let is_ext = partition.storage_units_extendable.contains(&su.id);
        let capacity: Expression = if is_ext {
            Expression::from(model.su_p_nom[&su.id])
        } else {
            Expression::from(su.p_nom.value())
        };

        let charge_limit = (-su.p_min_pu.value()).max(0.0);
        let discharge_limit = su.p_max_pu.value().max(0.0);

        let mut soc_vars = Vec::with_capacity(snapshots.len());
        for &t in snapshots {
            let dispatch = model.vars.add(variable().min(0.0));
            let store = model.vars.add(variable().min(0.0));
            let soc = model.vars.add(variable().min(0.0));
            let spill = model.vars.add(variable().min(0.0));

            model.constraints.push(constraint!(dispatch <= discharge_limit * capacity.clone()));
            model.constraints.push(constraint!(store <= charge_limit * capacity.clone()));
            model
                .constraints
                .push(constraint!(soc <= su.max_hours.value() * capacity.clone()));

            model.su_dispatch.insert((su.id, t), dispatch);
            model.su_store.insert((su.id, t), store);
            model.su_soc.insert((su.id, t), soc);
            model.su_spill.insert((su.id, t), spill);
            soc_vars.push((t, soc, dispatch, store, spill));
        }

        // SOC recurrence (spec §3): soc[t] = (1 - standing_loss) * soc[prev]
        // + eff_store * store[t] - dispatch[t] / eff_dispatch + inflow[t] -
        // spill[t]. `prev` wraps to the last snapshot when cyclic, otherwise
        // the chain starts from `state_of_charge_initial`.
        let retain = 1.0 - su.standing_loss.value();
        for (i, &(t, soc, dispatch, store, spill)) in soc_vars.iter().enumerate() {
            let prev_term: Expression = if i == 0 {
                if su.cyclic_state_of_charge {
                    retain * Expression::from(soc_vars[soc_vars.len() - 1].1)
                } else {
                    Expression::from(retain * su.state_of_charge_initial.value())
                }
            } else {
                retain * Expression::from(soc_vars[i - 1].1)
            };

            let rhs: Expression = prev_term + su.efficiency_store.value() * Expression::from(store)
                - (1.0 / su.efficiency_dispatch.value().max(1e-9)) * Expression::from(dispatch)
                + su.inflow_at(t).value()
                - Expression::from(spill);
            model.constraints.push(constraint!(soc == rhs));
        }
    }
}

fn build_store_variables(model: &mut Model, network: &Network, partition: &Partition, snapshots: &[usize]) {
    for st in network.stores() {
        let is_ext = partition.stores_extendable.contains(&st.id);
        let capacity: Expression = if is_ext {
            Expression::from(model.st_e_nom[&st.id])
        } else {
            Expression::from(st.e_nom.value())
        };

        let mut soc_vars = Vec::with_capacity(snapshots.len());
        for &t in snapshots {
            let dispatch = model.vars.add(variable().min(0.0));
            let store = model.vars.add(variable().min(0.0));
            let soc = model.vars.add(variable().min(0.0));
            let spill = model.vars.add(variable().min(0.0));

            model.constraints.push(constraint!(soc >= st.e_min_pu.value() * capacity.clone()));
            model.constraints.push(constraint!(soc <= st.e_max_pu.value() * capacity.clone()));

            model.st_dispatch.insert((st.id, t), dispatch);
            model.st_store.insert((st.id, t), store);
            model.st_soc.insert((st.id, t), soc);
            model.st_spill.insert((st.id, t), spill);
            soc_vars.push((t, soc, dispatch, store, spill));
        }

        // Same recurrence shape as storage units (spec §3): soc[t] = (1 -
        // standing_loss) * soc[prev] + eff_store * store[t] - dispatch[t] /
        // eff_dispatch + inflow[t] - spill[t].
        let retain = 1.0 - st.standing_loss.value();
        for (i, &(t, soc, dispatch, store, spill)) in soc_vars.iter().enumerate() {
            let prev_term: Expression = if i == 0 {
                if st.e_cyclic {
                    retain * Expression::from(soc_vars[soc_vars.len() - 1].1)
                } else {
                    Expression::from(retain * st.state_of_charge_initial.value())
                }
            } else {
                retain * Expression::from(soc_vars[i - 1].1)
            };

            let rhs: Expression = prev_term + st.efficiency_store.value() * Expression::from(store)
                - (1.0 / st.efficiency_dispatch.value().max(1e-9)) * Expression::from(dispatch)
                + st.inflow_at(t).value()
                - Expression::from(spill);
            model.constraints.push(constraint!(soc == rhs));
        }
    }
}

/// Objective terms common to every formulation: weighted marginal-cost
/// dispatch, plus annualized capital cost on every extendable asset. A
/// master build has no dispatch variables, so its marginal-cost loops
/// below are no-ops; capital cost always applies since both roles carry
/// investment variables.
pub fn build_objective_terms(
    model: &mut Model,
    network: &Network,
    _config: &BuildConfig,
    partition: &Partition,
    snapshots: &[usize],
) {
    for g in network.generators() {
        if g.marginal_cost == 0.0 {
            continue;
        }
        for &t in snapshots {
            if let Some(&var) = model.dispatch.get(&(g.id, t)) {
                let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
                model.objective += weighting * g.marginal_cost * var;
            }
        }
    }

    for su in network.storage_units() {
        if su.marginal_cost == 0.0 {
            continue;
        }
        for &t in snapshots {
            if let Some(&var) = model.su_dispatch.get(&(su.id, t)) {
                let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
                model.objective += weighting * su.marginal_cost * var;
            }
        }
    }

    for st in network.stores() {
        if st.marginal_cost == 0.0 {
            continue;
        }
        for &t in snapshots {
            if let Some(&var) = model.st_dispatch.get(&(st.id, t)) {
                let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
                model.objective += weighting * st.marginal_cost * var;
            }
        }
    }

    for id in &partition.generators_extendable {
        if let (Some(&var), Some(g)) = (model.g_p_nom.get(id), network.generators().into_iter().find(|g| g.id == *id)) {
            model.objective += g.capital_cost * var;
        }
    }
    for id in &partition.lines_extendable {
        if let (Some(&var), Some(l)) = (model.ln_s_nom.get(id), network.lines().into_iter().find(|l| l.id == *id)) {
            model.objective += l.capital_cost * var;
        }
    }
    for id in &partition.links_extendable {
        if let (Some(&var), Some(lk)) = (model.lk_p_nom.get(id), network.links().into_iter().find(|lk| lk.id == *id)) {
            model.objective += lk.capital_cost * var;
        }
    }
    for id in &partition.storage_units_extendable {
        if let (Some(&var), Some(su)) = (model.su_p_nom.get(id), network.storage_units().into_iter().find(|su| su.id == *id)) {
            model.objective += su.capital_cost * var;
        }
    }
    for id in &partition.stores_extendable {
        if let (Some(&var), Some(st)) = (model.st_e_nom.get(id), network.stores().into_iter().find(|st| st.id == *id)) {
            model.objective += st.capital_cost * var;
        }
    }
}

#[cfg(test)]
mod tests {
    use gridplan_core::{Bus, BusId, Kilovolts, Load, LoadId, Megawatts, MegawattHours, Network, Node, StorageUnit, StorageUnitId};

    use crate::builder::{BuildConfig, ModelBuilder, Role};
    use crate::solver::{self, SolverKind};

    fn single_bus_network_with_storage(initial_soc: f64) -> Network {
        let mut network = Network::new();
        network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(1),
            name: "A".into(),
            v_nom: Kilovolts(230.0),
            carrier: None,
        }));
        network.graph.add_node(Node::Load(Load {
            id: LoadId::new(1),
            name: "L".into(),
            bus: BusId::new(1),
            p_set: vec![Megawatts(10.0)],
        }));
        let su = StorageUnit {
            id: StorageUnitId::new(1),
            bus: BusId::new(1),
            p_nom: Megawatts(100.0),
            max_hours: gridplan_core::Hours(10.0),
            marginal_cost: 1.0,
            cyclic_state_of_charge: false,
            state_of_charge_initial: MegawattHours(initial_soc),
            ..StorageUnit::new(StorageUnitId::new(1), "Battery".into(), BusId::new(1), 100.0, 10.0)
        };
        network.graph.add_node(Node::StorageUnit(su));
        network
    }

    #[test]
    fn non_cyclic_soc_draws_down_from_initial_value() {
        let network = single_bus_network_with_storage(30.0);
        let config = BuildConfig::default();
        let model = ModelBuilder::build(&network, &config, Role::Monolithic).unwrap();
        let su_id = StorageUnitId::new(1);
        let dispatch0 = model.su_dispatch[&(su_id, 0)];
        let solution = solver::solve(SolverKind::Clarabel, model.vars, model.objective, model.constraints).unwrap();
        assert!((solution.value(dispatch0) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn non_cyclic_soc_with_no_initial_charge_is_infeasible() {
        let network = single_bus_network_with_storage(0.0);
        let config = BuildConfig::default();
        let model = ModelBuilder::build(&network, &config, Role::Monolithic).unwrap();
        let result = solver::solve(SolverKind::Clarabel, model.vars, model.objective, model.constraints);
        assert!(result.is_err());
    }
}
