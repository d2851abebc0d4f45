//! CO2 cap, transmission-volume cap, and renewable-share constraints,
//! emitted once per `Model` at the close of the snapshot slice.
//!
//! No teacher module builds constraints like these (`gat_algo` has no
//! policy-constraint layer); the accumulation idiom — fold an `Expression`
//! across a filtered asset list, then push one `constraint!` — follows
//! `dc_opf.rs`/`tep/solver.rs`'s own objective- and balance-construction
//! style.

use good_lp::{constraint, Expression};

use gridplan_core::{GlobalConstraint, Network};

use super::partition::Partition;
use super::{BuildConfig, BuildError, Model};

pub fn build_global_constraints(
    model: &mut Model,
    network: &Network,
    config: &BuildConfig,
    partition: &Partition,
) -> Result<(), BuildError> {
    for gc in &network.global_constraints {
        match gc {
            GlobalConstraint::Co2Limit(limit) => build_co2_limit(model, network, *limit)?,
            GlobalConstraint::MwKmLimit(limit) => build_mwkm_limit(model, network, partition, *limit)?,
            GlobalConstraint::ResTarget(target) => build_res_target(model, network, *target)?,
            GlobalConstraint::ApproxResTarget(target) => {
                build_approx_res_target(model, network, config, *target)?
            }
        }
    }
    Ok(())
}

fn is_zero_co2(network: &Network, carrier_id: Option<gridplan_core::CarrierId>) -> bool {
    match carrier_id {
        Some(id) => network
            .carriers
            .get(&id)
            .map(|c| c.co2_emissions <= 0.0)
            .unwrap_or(false),
        None => false,
    }
}

fn build_co2_limit(model: &mut Model, network: &Network, limit: f64) -> Result<(), BuildError> {
    let mut expr = Expression::from(0.0);
    let mut any_term = false;
    for g in network.generators() {
        let co2 = g
            .carrier
            .and_then(|c| network.carriers.get(&c))
            .map(|c| c.co2_emissions)
            .unwrap_or(0.0);
        if co2 <= 0.0 {
            continue;
        }
        let efficiency = g.efficiency.value().max(1e-9);
        for &t in &model.snapshots {
            if let Some(&var) = model.dispatch.get(&(g.id, t)) {
                let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
                expr += (weighting * co2 / efficiency) * var;
                any_term = true;
            }
        }
    }
    if any_term {
        model.constraints.push(constraint!(expr <= limit));
    }
    Ok(())
}

fn build_mwkm_limit(model: &mut Model, network: &Network, partition: &Partition, limit: f64) -> Result<(), BuildError> {
    let baseline_mwkm: f64 = network.lines().iter().map(|l| l.s_nom.value() * l.length_km).sum();
    if baseline_mwkm <= 0.0 {
        return Ok(());
    }

    let mut expr = Expression::from(0.0);
    for id in &partition.lines_extendable {
        if let (Some(&var), Some(l)) = (
            model.ln_s_nom.get(id),
            network.lines().into_iter().find(|l| l.id == *id),
        ) {
            expr += l.length_km * var;
        }
    }
    for id in &partition.lines_fixed {
        if let Some(l) = network.lines().into_iter().find(|l| l.id == *id) {
            expr += l.s_nom.value() * l.length_km;
        }
    }

    model.constraints.push(constraint!(expr <= limit * baseline_mwkm));
    Ok(())
}

fn build_res_target(model: &mut Model, network: &Network, target: f64) -> Result<(), BuildError> {
    let mut renewable_gen = Expression::from(0.0);
    let mut total_load = 0.0;

    for g in network.generators() {
        if !is_zero_co2(network, g.carrier) {
            continue;
        }
        for &t in &model.snapshots {
            if let Some(&var) = model.dispatch.get(&(g.id, t)) {
                let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
                renewable_gen += weighting * var;
            }
        }
    }

    for &t in &model.snapshots {
        let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
        total_load += weighting * network.total_load_mw(t);
    }

    model
        .constraints
        .push(constraint!(renewable_gen >= target * total_load));
    Ok(())
}

fn build_approx_res_target(
    model: &mut Model,
    network: &Network,
    config: &BuildConfig,
    target: f64,
) -> Result<(), BuildError> {
    // Uses maximum renewable availability as a proxy for generation, per
    // spec §4.4.5. No biomass carve-out: `approx_restarget` treats every
    // zero-CO2 carrier uniformly (an explicitly recorded scope decision,
    // see DESIGN.md). The rescale factor multiplies every term on both
    // sides of the inequality so it cancels out and never changes which
    // networks are feasible (spec §4.2).
    let mut available = Expression::from(0.0);
    let mut total_load = 0.0;

    for g in network.generators() {
        if !is_zero_co2(network, g.carrier) {
            continue;
        }
        for &t in &model.snapshots {
            let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
            let p_max = g.p_max_pu_at(t).value();
            if let Some(&var) = model.g_p_nom.get(&g.id) {
                available += config.rescale(config.rescaling.approx_restarget, weighting * p_max) * var;
            } else {
                available += config.rescale(config.rescaling.approx_restarget, weighting * p_max * g.p_nom.value());
            }
        }
    }

    for &t in &model.snapshots {
        let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
        total_load += weighting * network.total_load_mw(t);
    }

    let rescaled_target = config.rescale(config.rescaling.approx_restarget, target * total_load);
    model.constraints.push(constraint!(available >= rescaled_target));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridplan_core::{BusId, Carrier, CarrierId, Generator, Load, LoadId, Node};

    fn wind_network() -> Network {
        let mut network = Network::new();
        network.carriers.insert(
            CarrierId::new(1),
            Carrier {
                id: CarrierId::new(1),
                name: "wind".into(),
                co2_emissions: 0.0,
            },
        );
        let mut g = Generator::new(GeneratorId::new(1), "Wind1".into(), BusId::new(1));
        g.carrier = Some(CarrierId::new(1));
        g.p_nom = gridplan_core::Megawatts(50.0);
        network.graph.add_node(Node::Generator(g));
        network.graph.add_node(Node::Load(Load {
            id: LoadId::new(1),
            name: "L1".into(),
            bus: BusId::new(1),
            p_set: vec![gridplan_core::Megawatts(30.0)],
        }));
        network
    }

    #[test]
    fn res_target_builds_without_panicking() {
        use gridplan_core::GeneratorId;
        let network = wind_network();
        let mut model = Model::new(super::super::Role::Monolithic, vec![0]);
        let var = model.vars.add(good_lp::variable().min(0.0));
        model.dispatch.insert((GeneratorId::new(1), 0), var);
        let result = build_res_target(&mut model, &network, 0.5);
        assert!(result.is_ok());
        assert_eq!(model.constraints.len(), 1);
    }

    #[test]
    fn approx_res_target_rescaling_does_not_change_the_optimum() {
        use gridplan_core::GeneratorId;
        // One fixed and one extendable zero-CO2 generator: the fixed term
        // and the extendable term must scale identically, or rescaling
        // would shift how much capacity is needed to hit the target.
        let mut network = Network::new();
        network.carriers.insert(
            CarrierId::new(1),
            Carrier { id: CarrierId::new(1), name: "wind".into(), co2_emissions: 0.0 },
        );
        let mut fixed = Generator::new(GeneratorId::new(1), "FixedWind".into(), BusId::new(1));
        fixed.carrier = Some(CarrierId::new(1));
        fixed.p_nom = gridplan_core::Megawatts(20.0);
        network.graph.add_node(Node::Generator(fixed));

        let mut extendable = Generator::new(GeneratorId::new(2), "NewWind".into(), BusId::new(1));
        extendable.carrier = Some(CarrierId::new(1));
        extendable.capital_cost = 1.0;
        extendable.p_nom_extendable = true;
        extendable.p_nom_max = gridplan_core::Megawatts(1000.0);
        network.graph.add_node(Node::Generator(extendable));

        network.graph.add_node(Node::Load(Load {
            id: LoadId::new(1),
            name: "L1".into(),
            bus: BusId::new(1),
            p_set: vec![gridplan_core::Megawatts(50.0)],
        }));

        let solve_for_capacity = |config: &BuildConfig| -> f64 {
            let mut model = Model::new(super::super::Role::Monolithic, vec![0]);
            let g_p_nom = model.vars.add(good_lp::variable().min(0.0));
            model.g_p_nom.insert(GeneratorId::new(2), g_p_nom);
            model.objective += g_p_nom;
            build_approx_res_target(&mut model, &network, config, 0.6).unwrap();
            let solution =
                crate::solver::solve(crate::solver::SolverKind::Clarabel, model.vars, model.objective, model.constraints).unwrap();
            solution.value(g_p_nom)
        };

        let unscaled = solve_for_capacity(&BuildConfig::default());
        let rescaled = solve_for_capacity(&BuildConfig::default().with_rescaling(super::super::RescalingTable::uniform(3.7)));

        assert!((unscaled - 10.0).abs() < 1e-3);
        assert!((rescaled - unscaled).abs() < 1e-3);
    }

    #[test]
    fn co2_limit_divides_by_generator_efficiency() {
        use gridplan_core::GeneratorId;
        let mut network = Network::new();
        network.carriers.insert(
            CarrierId::new(1),
            Carrier { id: CarrierId::new(1), name: "gas".into(), co2_emissions: 0.5 },
        );
        let mut g = Generator::new(GeneratorId::new(1), "Gas1".into(), BusId::new(1));
        g.carrier = Some(CarrierId::new(1));
        g.efficiency = gridplan_core::PerUnit(0.5);
        network.graph.add_node(Node::Generator(g));

        let mut model = Model::new(super::super::Role::Monolithic, vec![0]);
        let var = model.vars.add(good_lp::variable().min(0.0).max(1000.0));
        model.dispatch.insert((GeneratorId::new(1), 0), var);
        build_co2_limit(&mut model, &network, 10.0).unwrap();
        model.objective += -1.0 * var;

        let solution = crate::solver::solve(crate::solver::SolverKind::Clarabel, model.vars, model.objective, model.constraints).unwrap();
        // emission rate = co2_emissions / efficiency = 0.5 / 0.5 = 1.0
        // tonnes/MWh, so a 10-tonne cap binds dispatch at 10 MW.
        assert!((solution.value(var) - 10.0).abs() < 1e-3);
    }
}
