//! Flow formulations: angle-based (with or without Big-M line investment),
//! cycle/Kirchhoff-based, and PTDF-based, plus the link flow variables and
//! nodal balance shared by all of them.
//!
//! `angles_linear` is grounded directly on `gat_algo::opf::dc_opf::solve`'s
//! angle-difference-times-susceptance flow definition and slack-angle-pinned
//! nodal balance. `ptdf` is grounded on
//! `gat_algo::sparse::sensitivity::SparsePtdf`. `kirchhoff_linear`'s
//! cycle-sum-zero constraint has no teacher counterpart and is new code
//! built on the cycle basis from [`crate::network::cycles`].

use std::collections::HashMap;

use good_lp::{constraint, variable, Expression};

use gridplan_core::{BusId, Network};

use crate::network::{CycleBasis, Direction, SparsePtdf};

use super::partition::Partition;
use super::{BuildConfig, BuildError, FormulationKind, Model};

pub fn build_flow_constraints(
    model: &mut Model,
    network: &Network,
    config: &BuildConfig,
    partition: &Partition,
    snapshots: &[usize],
) -> Result<(), BuildError> {
    build_link_flow_variables(model, network, partition, snapshots);
    build_line_flow_variables(model, network, partition, snapshots);

    match config.formulation {
        FormulationKind::AnglesLinear => build_angles_linear(model, network, snapshots),
        FormulationKind::AnglesLinearIntegerBigm => build_angles_linear_bigm(model, network, config, snapshots),
        FormulationKind::KirchhoffLinear => build_kirchhoff_linear(model, network, snapshots),
        FormulationKind::Ptdf => build_ptdf(model, network, snapshots),
        FormulationKind::AnglesBilinear | FormulationKind::KirchhoffBilinear => {
            return Err(BuildError::Configuration(
                "bilinear formulations require a nonlinear backend (checked earlier; unreachable)".into(),
            ));
        }
    }
}

fn build_link_flow_variables(model: &mut Model, network: &Network, partition: &Partition, snapshots: &[usize]) {
    for lk in network.links() {
        let is_ext = partition.links_extendable.contains(&lk.id);
        let capacity: Expression = if is_ext {
            Expression::from(model.lk_p_nom[&lk.id])
        } else {
            Expression::from(lk.p_nom.value())
        };

        for &t in snapshots {
            let var = model.vars.add(variable().min(f64::NEG_INFINITY));
            model
                .constraints
                .push(constraint!(var >= lk.p_min_pu.value() * capacity.clone()));
            model
                .constraints
                .push(constraint!(var <= lk.p_max_pu.value() * capacity.clone()));
            model.link_flow.insert((lk.id, t), var);
        }
    }
}

fn build_line_flow_variables(model: &mut Model, network: &Network, partition: &Partition, snapshots: &[usize]) {
    for l in network.lines() {
        if l.build_candidate {
            continue;
        }
        let is_ext = partition.lines_extendable.contains(&l.id);
        let capacity: Expression = if is_ext {
            Expression::from(model.ln_s_nom[&l.id])
        } else {
            Expression::from(l.s_nom.value())
        };

        let s_max_pu = l.s_max_pu.value();
        for &t in snapshots {
            let var = model.vars.add(variable().min(f64::NEG_INFINITY));
            model
                .constraints
                .push(constraint!(var >= -s_max_pu * capacity.clone()));
            model.constraints.push(constraint!(var <= s_max_pu * capacity.clone()));
            model.line_flow.insert((l.id, t), var);
        }
    }
}

/// `generators@n + efficiency*LK incoming on bus1 + SU/ST dispatch@n -
/// loads@n - LK outgoing on bus0 - SU/ST store@n` (spec §4.4.4).
fn net_injection_expr(model: &Model, network: &Network, bus_id: BusId, t: usize) -> Expression {
    let mut expr = Expression::from(0.0);

    for g in network.generators_at_bus(bus_id) {
        if let Some(&var) = model.dispatch.get(&(g.id, t)) {
            expr += var;
        }
    }
    for l in network.loads_at_bus(bus_id) {
        expr -= l.p_set_at(t).value();
    }
    for su in network.storage_units() {
        if su.bus != bus_id {
            continue;
        }
        if let Some(&d) = model.su_dispatch.get(&(su.id, t)) {
            expr += d;
        }
        if let Some(&s) = model.su_store.get(&(su.id, t)) {
            expr -= s;
        }
    }
    for st in network.stores() {
        if st.bus != bus_id {
            continue;
        }
        if let Some(&d) = model.st_dispatch.get(&(st.id, t)) {
            expr += d;
        }
        if let Some(&s) = model.st_store.get(&(st.id, t)) {
            expr -= s;
        }
    }
    for lk in network.links() {
        if let Some(&var) = model.link_flow.get(&(lk.id, t)) {
            if lk.bus1 == bus_id {
                expr += lk.efficiency.value() * var;
            }
            if lk.bus0 == bus_id {
                expr -= var;
            }
        }
    }

    expr
}

fn slack_bus(network: &Network) -> Option<BusId> {
    network.buses().first().map(|b| b.id)
}

fn build_angles_linear(model: &mut Model, network: &Network, snapshots: &[usize]) -> Result<(), BuildError> {
    let slack = slack_bus(network).ok_or_else(|| BuildError::Configuration("network has no buses".into()))?;

    for bus in network.buses() {
        for &t in snapshots {
            let theta = model.vars.add(variable().min(f64::NEG_INFINITY));
            model.theta.insert((bus.id, t), theta);
            if bus.id == slack {
                model.constraints.push(constraint!(theta == 0.0));
            }
        }
    }

    for l in network.lines() {
        if l.build_candidate {
            continue;
        }
        let x_pu = l.x.value().abs().max(1e-9);
        for &t in snapshots {
            let ln = model.line_flow[&(l.id, t)];
            let theta0 = model.theta[&(l.bus0, t)];
            let theta1 = model.theta[&(l.bus1, t)];
            model
                .constraints
                .push(constraint!(ln * x_pu == theta0 - theta1));
        }
    }

    build_nodal_balance_against_line_flows(model, network, snapshots);
    Ok(())
}

fn build_angles_linear_bigm(
    model: &mut Model,
    network: &Network,
    config: &BuildConfig,
    snapshots: &[usize],
) -> Result<(), BuildError> {
    let slack = slack_bus(network).ok_or_else(|| BuildError::Configuration("network has no buses".into()))?;

    for bus in network.buses() {
        for &t in snapshots {
            let theta = model.vars.add(variable().min(f64::NEG_INFINITY));
            model.theta.insert((bus.id, t), theta);
            if bus.id == slack {
                model.constraints.push(constraint!(theta == 0.0));
            }
        }
    }

    let big_m = config.big_m;
    for l in network.lines() {
        if l.build_candidate {
            continue;
        }
        let x_pu = l.x.value().abs().max(1e-9);
        let num_parallel = l.num_parallel.max(1e-9);

        let candidates: Vec<(usize, good_lp::Variable)> = model
            .ln_opt_candidates
            .iter()
            .filter(|((line_id, _), _)| *line_id == l.id)
            .map(|((_, c), &v)| (*c, v))
            .collect();

        for &t in snapshots {
            let ln = model.line_flow[&(l.id, t)];
            let theta0 = model.theta[&(l.bus0, t)];
            let theta1 = model.theta[&(l.bus1, t)];
            let delta_theta: Expression = Expression::from(theta0) - Expression::from(theta1);

            if candidates.is_empty() {
                // Fixed line (not a build candidate under this investment
                // type): plain equality.
                model
                    .constraints
                    .push(constraint!(ln * x_pu == delta_theta));
                continue;
            }

            for &(c, opt_var) in &candidates {
                let scale = 1.0 + c as f64 / num_parallel;
                // (1 + c/num_parallel) / x_pu * delta_theta - LN is relaxed by
                // big-M unless this candidate is selected.
                let lhs: Expression = (scale / x_pu) * delta_theta.clone() - Expression::from(ln);
                model
                    .constraints
                    .push(constraint!(lhs.clone() >= (opt_var - 1.0) * big_m));
                model
                    .constraints
                    .push(constraint!(lhs <= (1.0 - opt_var) * big_m));
            }
        }
    }

    build_nodal_balance_against_line_flows(model, network, snapshots);
    Ok(())
}

fn build_kirchhoff_linear(model: &mut Model, network: &Network, snapshots: &[usize]) -> Result<(), BuildError> {
    build_nodal_balance_against_line_flows(model, network, snapshots);

    let basis = CycleBasis::from_network(network)
        .map_err(|e| BuildError::Configuration(format!("cycle basis: {e}")))?;

    for (_id, cycle) in basis.iter() {
        for &t in snapshots {
            let mut expr = Expression::from(0.0);
            let mut any = false;
            for &(line_id, direction) in cycle {
                let Some(line) = network.lines().into_iter().find(|l| l.id == line_id) else {
                    continue;
                };
                if line.build_candidate {
                    continue;
                }
                if let Some(&ln) = model.line_flow.get(&(line_id, t)) {
                    let x_pu = line.x.value().abs().max(1e-9);
                    expr += direction.sign() * x_pu * ln;
                    any = true;
                }
            }
            if any {
                model.constraints.push(constraint!(expr == 0.0));
            }
        }
    }

    Ok(())
}

fn build_ptdf(model: &mut Model, network: &Network, snapshots: &[usize]) -> Result<(), BuildError> {
    let ptdf = SparsePtdf::compute_ptdf(network).map_err(|e| BuildError::Configuration(format!("PTDF: {e}")))?;

    let mut injection: HashMap<(BusId, usize), Expression> = HashMap::new();
    for bus in network.buses() {
        for &t in snapshots {
            injection.insert((bus.id, t), net_injection_expr(model, network, bus.id, t));
        }
    }

    for l in network.lines() {
        if l.build_candidate {
            continue;
        }
        for &t in snapshots {
            let Some(&ln) = model.line_flow.get(&(l.id, t)) else { continue };
            let mut rhs = Expression::from(0.0);
            for &bus_id in ptdf.bus_ids.iter() {
                if let Some(coef) = ptdf.get(l.id, bus_id) {
                    if coef.abs() < 1e-12 {
                        continue;
                    }
                    rhs += coef * injection[&(bus_id, t)].clone();
                }
            }
            model.constraints.push(constraint!(ln == rhs));
        }
    }

    for &t in snapshots {
        let mut total = Expression::from(0.0);
        for bus in network.buses() {
            total += injection[&(bus.id, t)].clone();
        }
        model.constraints.push(constraint!(total == 0.0));
    }

    Ok(())
}

fn build_nodal_balance_against_line_flows(model: &mut Model, network: &Network, snapshots: &[usize]) {
    for bus in network.buses() {
        for &t in snapshots {
            let injection = net_injection_expr(model, network, bus.id, t);

            let mut net_out = Expression::from(0.0);
            for l in network.lines() {
                if l.build_candidate {
                    continue;
                }
                if let Some(&ln) = model.line_flow.get(&(l.id, t)) {
                    if l.bus0 == bus.id {
                        net_out += ln;
                    }
                    if l.bus1 == bus.id {
                        net_out -= ln;
                    }
                }
            }

            model.constraints.push(constraint!(injection == net_out));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridplan_core::{Bus, Generator, GeneratorId, Kilovolts, Line, LineId, Load, LoadId, Node};

    use crate::builder::{ModelBuilder, Role};
    use crate::solver::{self, SolverKind};

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        let b1 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(1), name: "A".into(), v_nom: Kilovolts(230.0), carrier: None }));
        let b2 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(2), name: "B".into(), v_nom: Kilovolts(230.0), carrier: None }));
        network.graph.add_node(Node::Generator(
            Generator::new(GeneratorId::new(1), "g".into(), BusId::new(1)).with_p_limits(0.0, 100.0),
        ));
        network.graph.add_node(Node::Load(Load { id: LoadId::new(1), name: "L".into(), bus: BusId::new(2), p_set: vec![gridplan_core::Megawatts(40.0)] }));
        let l = Line::new(LineId::new(1), "L1".into(), BusId::new(1), BusId::new(2), 0.1).with_thermal_limit(100.0);
        network.graph.add_edge(b1, b2, gridplan_core::Edge::Line(l));
        network
    }

    fn triangle_network() -> Network {
        let mut network = Network::new();
        let b1 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(1), name: "A".into(), v_nom: Kilovolts(230.0), carrier: None }));
        let b2 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(2), name: "B".into(), v_nom: Kilovolts(230.0), carrier: None }));
        let b3 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(3), name: "C".into(), v_nom: Kilovolts(230.0), carrier: None }));
        network.graph.add_node(Node::Generator(
            Generator::new(GeneratorId::new(1), "g".into(), BusId::new(1)).with_p_limits(0.0, 100.0),
        ));
        network.graph.add_node(Node::Load(Load { id: LoadId::new(1), name: "L".into(), bus: BusId::new(3), p_set: vec![gridplan_core::Megawatts(30.0)] }));
        network.graph.add_edge(b1, b2, gridplan_core::Edge::Line(Line::new(LineId::new(1), "L1".into(), BusId::new(1), BusId::new(2), 0.1).with_thermal_limit(100.0)));
        network.graph.add_edge(b2, b3, gridplan_core::Edge::Line(Line::new(LineId::new(2), "L2".into(), BusId::new(2), BusId::new(3), 0.1).with_thermal_limit(100.0)));
        network.graph.add_edge(b1, b3, gridplan_core::Edge::Line(Line::new(LineId::new(3), "L3".into(), BusId::new(1), BusId::new(3), 0.2).with_thermal_limit(100.0)));
        network
    }

    #[test]
    fn angles_linear_pins_slack_and_balances_load() {
        let network = two_bus_network();
        let config = BuildConfig::default();
        let model = ModelBuilder::build(&network, &config, Role::Monolithic).unwrap();
        assert_eq!(model.theta.len(), 2);
        let solution = solver::solve(SolverKind::Clarabel, model.vars, model.objective, model.constraints).unwrap();
        let _ = solution;
    }

    #[test]
    fn kirchhoff_linear_matches_angles_linear_total_dispatch() {
        let network = triangle_network();
        let angles_config = BuildConfig::default().with_formulation(FormulationKind::AnglesLinear);
        let angles_model = ModelBuilder::build(&network, &angles_config, Role::Monolithic).unwrap();
        let angles_dispatch = angles_model.dispatch[&(GeneratorId::new(1), 0)];
        let angles_solution =
            solver::solve(SolverKind::Clarabel, angles_model.vars, angles_model.objective, angles_model.constraints).unwrap();

        let kirchhoff_config = BuildConfig::default().with_formulation(FormulationKind::KirchhoffLinear);
        let kirchhoff_model = ModelBuilder::build(&network, &kirchhoff_config, Role::Monolithic).unwrap();
        let kirchhoff_dispatch = kirchhoff_model.dispatch[&(GeneratorId::new(1), 0)];
        let kirchhoff_solution = solver::solve(
            SolverKind::Clarabel,
            kirchhoff_model.vars,
            kirchhoff_model.objective,
            kirchhoff_model.constraints,
        )
        .unwrap();

        assert!((angles_solution.value(angles_dispatch) - 30.0).abs() < 1e-3);
        assert!((kirchhoff_solution.value(kirchhoff_dispatch) - 30.0).abs() < 1e-3);
    }

    #[test]
    fn ptdf_formulation_respects_nodal_balance() {
        let network = triangle_network();
        let config = BuildConfig::default().with_formulation(FormulationKind::Ptdf);
        let model = ModelBuilder::build(&network, &config, Role::Monolithic).unwrap();
        let dispatch = model.dispatch[&(GeneratorId::new(1), 0)];
        let solution = solver::solve(SolverKind::Clarabel, model.vars, model.objective, model.constraints).unwrap();
        assert!((solution.value(dispatch) - 30.0).abs() < 1e-3);
    }
}
