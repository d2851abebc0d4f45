//! The Benders slave problem: operation-only, posed directly against
//! `clarabel` (not `good_lp`) so its RHS can be mutated in place each outer
//! iteration and its duals read back to build cuts.
//!
//! Grounded on three things composed together: the direct-`clarabel`
//! dual-extraction path from [`crate::solver::clarabel_dual`], the `gat_algo`
//! Big-M constraint-construction idiom reused for the (reduced-fidelity)
//! `angles_linear_integer_bigm` slave path, and the "contiguous index
//! tables" shape the design notes ask for: each coupled bound's row indices
//! are stored directly (`CoupledBound`), not looked up by constraint name,
//! so RHS push and dual read-back on the hot outer loop are plain array
//! operations.
//!
//! Storage and store variables are excluded from the slave entirely (spec §9
//! Design Notes: "the source explicitly disables it"). A network with
//! storage/store assets still builds and solves through Benders, it just
//! doesn't get SOC cuts — the same scope decision the teacher's own lineage
//! made.

use std::collections::HashMap;

use gridplan_core::{BusId, GeneratorId, LineId, LinkId, Network};

use crate::builder::{BuildConfig, BuildError, FormulationKind, Partition};
use crate::network::{CycleBasis, SparsePtdf};
use crate::solver::ClarabelLp;

/// Row indices and per-unit coefficients for one coupled (master-dependent)
/// bound pair. RHS at either row is `coeff * master_value`, rescaled and
/// clamped (spec §4.7 step 3).
#[derive(Debug, Clone, Copy)]
pub struct CoupledBound {
    pub lower_row: usize,
    pub lower_coeff: f64,
    pub upper_row: usize,
    pub upper_coeff: f64,
}

/// An operation-only LP for one group of snapshots, plus the coupling
/// tables the Benders driver needs to push master values into its RHS and
/// the uncoupled rows needed to compute a cut's constant term.
pub struct SlaveProblem {
    pub snapshots: Vec<usize>,
    pub lp: ClarabelLp,
    pub coupled_gen: HashMap<(GeneratorId, usize), CoupledBound>,
    pub coupled_line: HashMap<(LineId, usize), CoupledBound>,
    pub coupled_link: HashMap<(LinkId, usize), CoupledBound>,
    /// Column indices into `lp`'s primal vector, so a caller can read
    /// dispatch/flow values back out of a solved slave the way
    /// [`crate::runner::monolithic`] reads them out of a `good_lp::Solution`.
    pub dispatch_idx: HashMap<(GeneratorId, usize), usize>,
    pub line_idx: HashMap<(LineId, usize), usize>,
    pub link_idx: HashMap<(LinkId, usize), usize>,
    /// Row index of each bus's nodal-balance equality, so a caller that
    /// solves this problem with [`crate::solver::solve_with_duals`] can read
    /// off nodal marginal prices the way spec §4.5/§6 expect.
    pub balance_row: HashMap<(BusId, usize), usize>,
    /// Snapshot each equality/inequality row belongs to, parallel to
    /// `lp.eq_rows`/`lp.ineq_rows`. Every row built here is scoped to
    /// exactly one snapshot, so a cut covering only a subset of this
    /// slave's snapshots (spec: cut groups are independent of physical
    /// slave partitioning) can filter rows down to that subset.
    pub eq_row_t: Vec<usize>,
    pub ineq_row_t: Vec<usize>,
}

impl SlaveProblem {
    /// Every inequality row not touched by RHS mutation: the constant term
    /// of a Benders cut sums `dual * rhs` over these rows (spec §4.7 step 5).
    pub fn uncoupled_ineq_rows(&self) -> Vec<usize> {
        let coupled: std::collections::HashSet<usize> = self
            .coupled_gen
            .values()
            .chain(self.coupled_line.values())
            .chain(self.coupled_link.values())
            .flat_map(|b| [b.lower_row, b.upper_row])
            .collect();
        (0..self.lp.ineq_rows.len()).filter(|r| !coupled.contains(r)).collect()
    }
}

struct Builder {
    num_vars: usize,
    cost: Vec<f64>,
}

impl Builder {
    fn new_var(&mut self, cost: f64) -> usize {
        let idx = self.num_vars;
        self.num_vars += 1;
        self.cost.push(cost);
        idx
    }
}

/// Clamp near-zero RHS to zero: numerical hygiene, not a correctness fix
/// (spec §4.7 step 3, §9 Design Notes).
fn clamp_rhs(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        0.0
    } else {
        x
    }
}

/// Build the slave LP covering `snapshots`. `partition` must be computed
/// from the same `network` the master was built from.
pub fn build_slave(
    network: &Network,
    config: &BuildConfig,
    partition: &Partition,
    snapshots: Vec<usize>,
) -> Result<SlaveProblem, BuildError> {
    if config.formulation.is_bilinear() {
        return Err(BuildError::Configuration(
            "bilinear formulations require a nonlinear backend, which this crate does not wire in".into(),
        ));
    }

    let mut b = Builder { num_vars: 0, cost: Vec::new() };

    let mut dispatch_idx: HashMap<(GeneratorId, usize), usize> = HashMap::new();
    let mut line_idx: HashMap<(LineId, usize), usize> = HashMap::new();
    let mut link_idx: HashMap<(LinkId, usize), usize> = HashMap::new();
    let mut theta_idx: HashMap<(BusId, usize), usize> = HashMap::new();

    for g in network.generators() {
        for &t in &snapshots {
            let weighting = network.snapshots.get(t).map(|s| s.weighting.value()).unwrap_or(1.0);
            let idx = b.new_var(weighting * g.marginal_cost);
            dispatch_idx.insert((g.id, t), idx);
        }
    }
    for l in network.lines() {
        if l.build_candidate {
            continue;
        }
        for &t in &snapshots {
            let idx = b.new_var(0.0);
            line_idx.insert((l.id, t), idx);
        }
    }
    for lk in network.links() {
        for &t in &snapshots {
            let idx = b.new_var(0.0);
            link_idx.insert((lk.id, t), idx);
        }
    }
    if config.formulation.uses_angles() {
        for bus in network.buses() {
            for &t in &snapshots {
                let idx = b.new_var(0.0);
                theta_idx.insert((bus.id, t), idx);
            }
        }
    }

    let num_vars = b.num_vars;
    let cost = b.cost;
    let mut eq_rows: Vec<Vec<f64>> = Vec::new();
    let mut eq_rhs: Vec<f64> = Vec::new();
    let mut eq_row_t: Vec<usize> = Vec::new();
    let mut ineq_rows: Vec<Vec<f64>> = Vec::new();
    let mut ineq_rhs: Vec<f64> = Vec::new();
    let mut ineq_row_t: Vec<usize> = Vec::new();

    let mut push_eq = |coeffs: &[(usize, f64)],
                        rhs: f64,
                        t: usize,
                        eq_rows: &mut Vec<Vec<f64>>,
                        eq_rhs: &mut Vec<f64>,
                        eq_row_t: &mut Vec<usize>| {
        let mut row = vec![0.0; num_vars];
        for &(i, c) in coeffs {
            row[i] += c;
        }
        eq_rows.push(row);
        eq_rhs.push(rhs);
        eq_row_t.push(t);
    };
    let mut push_ineq = |coeffs: &[(usize, f64)],
                         rhs: f64,
                         t: usize,
                         ineq_rows: &mut Vec<Vec<f64>>,
                         ineq_rhs: &mut Vec<f64>,
                         ineq_row_t: &mut Vec<usize>|
     -> usize {
        let mut row = vec![0.0; num_vars];
        for &(i, c) in coeffs {
            row[i] += c;
        }
        ineq_rows.push(row);
        ineq_rhs.push(rhs);
        ineq_row_t.push(t);
        ineq_rows.len() - 1
    };

    // Nodal balance: generation + link couplings - loads - net line outflow = 0.
    let mut balance_row: HashMap<(BusId, usize), usize> = HashMap::new();
    for bus in network.buses() {
        for &t in &snapshots {
            balance_row.insert((bus.id, t), eq_rows.len());
            let mut coeffs: Vec<(usize, f64)> = Vec::new();
            for g in network.generators_at_bus(bus.id) {
                if let Some(&idx) = dispatch_idx.get(&(g.id, t)) {
                    coeffs.push((idx, 1.0));
                }
            }
            for lk in network.links() {
                let Some(&idx) = link_idx.get(&(lk.id, t)) else { continue };
                if lk.bus1 == bus.id {
                    coeffs.push((idx, lk.efficiency.value()));
                }
                if lk.bus0 == bus.id {
                    coeffs.push((idx, -1.0));
                }
            }
            for l in network.lines() {
                if l.build_candidate {
                    continue;
                }
                let Some(&idx) = line_idx.get(&(l.id, t)) else { continue };
                if l.bus0 == bus.id {
                    coeffs.push((idx, -1.0));
                }
                if l.bus1 == bus.id {
                    coeffs.push((idx, 1.0));
                }
            }
            let loads: f64 = network.loads_at_bus(bus.id).iter().map(|ld| ld.p_set_at(t).value()).sum();
            push_eq(&coeffs, loads, t, &mut eq_rows, &mut eq_rhs, &mut eq_row_t);
        }
    }

    match config.formulation {
        FormulationKind::AnglesLinear | FormulationKind::AnglesLinearIntegerBigm => {
            let slack = network
                .buses()
                .first()
                .map(|b| b.id)
                .ok_or_else(|| BuildError::Configuration("network has no buses".into()))?;
            for bus in network.buses() {
                for &t in &snapshots {
                    let theta = theta_idx[&(bus.id, t)];
                    if bus.id == slack {
                        push_eq(&[(theta, 1.0)], 0.0, t, &mut eq_rows, &mut eq_rhs, &mut eq_row_t);
                    }
                }
            }
            for l in network.lines() {
                if l.build_candidate {
                    continue;
                }
                let x_pu = l.x.value().abs().max(1e-9);
                for &t in &snapshots {
                    let ln = line_idx[&(l.id, t)];
                    let theta0 = theta_idx[&(l.bus0, t)];
                    let theta1 = theta_idx[&(l.bus1, t)];
                    push_eq(&[(ln, x_pu), (theta0, -1.0), (theta1, 1.0)], 0.0, t, &mut eq_rows, &mut eq_rhs, &mut eq_row_t);
                }
            }
        }
        FormulationKind::KirchhoffLinear => {
            let basis = CycleBasis::from_network(network).map_err(|e| BuildError::Configuration(format!("cycle basis: {e}")))?;
            for (_id, cycle) in basis.iter() {
                for &t in &snapshots {
                    let mut coeffs = Vec::new();
                    for &(line_id, direction) in cycle {
                        let Some(line) = network.lines().into_iter().find(|l| l.id == line_id) else { continue };
                        if line.build_candidate {
                            continue;
                        }
                        let Some(&ln) = line_idx.get(&(line_id, t)) else { continue };
                        let x_pu = line.x.value().abs().max(1e-9);
                        coeffs.push((ln, direction.sign() * x_pu));
                    }
                    if !coeffs.is_empty() {
                        push_eq(&coeffs, 0.0, t, &mut eq_rows, &mut eq_rhs, &mut eq_row_t);
                    }
                }
            }
        }
        FormulationKind::Ptdf => {
            let ptdf = SparsePtdf::compute_ptdf(network).map_err(|e| BuildError::Configuration(format!("PTDF: {e}")))?;
            // Injection per (bus, t) expressed as the same variable-indexed
            // terms the nodal-balance row above used, rebuilt here since
            // PTDF needs them again keyed per bus rather than summed per row.
            let mut injection: HashMap<(BusId, usize), Vec<(usize, f64)>> = HashMap::new();
            for bus in network.buses() {
                for &t in &snapshots {
                    let mut coeffs = Vec::new();
                    for g in network.generators_at_bus(bus.id) {
                        if let Some(&idx) = dispatch_idx.get(&(g.id, t)) {
                            coeffs.push((idx, 1.0));
                        }
                    }
                    for lk in network.links() {
                        let Some(&idx) = link_idx.get(&(lk.id, t)) else { continue };
                        if lk.bus1 == bus.id {
                            coeffs.push((idx, lk.efficiency.value()));
                        }
                        if lk.bus0 == bus.id {
                            coeffs.push((idx, -1.0));
                        }
                    }
                    injection.insert((bus.id, t), coeffs);
                }
            }
            for l in network.lines() {
                if l.build_candidate {
                    continue;
                }
                for &t in &snapshots {
                    let Some(&ln) = line_idx.get(&(l.id, t)) else { continue };
                    let mut coeffs = vec![(ln, -1.0)];
                    let mut rhs = 0.0;
                    for &bus_id in ptdf.bus_ids.iter() {
                        let Some(coef) = ptdf.get(l.id, bus_id) else { continue };
                        if coef.abs() < 1e-12 {
                            continue;
                        }
                        for &(idx, c) in &injection[&(bus_id, t)] {
                            coeffs.push((idx, coef * c));
                        }
                        let load = network.loads_at_bus(bus_id).iter().map(|ld| ld.p_set_at(t).value()).sum::<f64>();
                        rhs += coef * load;
                    }
                    push_eq(&coeffs, rhs, t, &mut eq_rows, &mut eq_rhs, &mut eq_row_t);
                }
            }
            for &t in &snapshots {
                let mut coeffs = Vec::new();
                let mut rhs = 0.0;
                for bus in network.buses() {
                    coeffs.extend(injection[&(bus.id, t)].iter().copied());
                    rhs += network.loads_at_bus(bus.id).iter().map(|ld| ld.p_set_at(t).value()).sum::<f64>();
                }
                push_eq(&coeffs, rhs, t, &mut eq_rows, &mut eq_rhs, &mut eq_row_t);
            }
        }
        FormulationKind::AnglesBilinear | FormulationKind::KirchhoffBilinear => unreachable!("rejected above"),
    }

    let mut coupled_gen = HashMap::new();
    for g in network.generators() {
        let is_ext = partition.generators_extendable.contains(&g.id);
        for &t in &snapshots {
            let idx = dispatch_idx[&(g.id, t)];
            let lo_pu = g.p_min_pu_at(t).value();
            let hi_pu = g.p_max_pu_at(t).value();
            let cap = g.p_nom.value();
            let upper_row = push_ineq(
                &[(idx, 1.0)],
                config.rescale(config.rescaling.bounds_g, hi_pu * cap),
                t,
                &mut ineq_rows,
                &mut ineq_rhs,
                &mut ineq_row_t,
            );
            let lower_row = push_ineq(
                &[(idx, -1.0)],
                config.rescale(config.rescaling.bounds_g, -lo_pu * cap),
                t,
                &mut ineq_rows,
                &mut ineq_rhs,
                &mut ineq_row_t,
            );
            if is_ext {
                coupled_gen.insert((g.id, t), CoupledBound { lower_row, lower_coeff: -lo_pu, upper_row, upper_coeff: hi_pu });
            }
        }
    }

    let mut coupled_line = HashMap::new();
    for l in network.lines() {
        if l.build_candidate {
            continue;
        }
        let is_ext = partition.lines_extendable.contains(&l.id);
        for &t in &snapshots {
            let idx = line_idx[&(l.id, t)];
            let cap = l.s_nom.value();
            let upper_row = push_ineq(
                &[(idx, 1.0)],
                config.rescale(config.rescaling.bounds_ln, cap),
                t,
                &mut ineq_rows,
                &mut ineq_rhs,
                &mut ineq_row_t,
            );
            let lower_row = push_ineq(
                &[(idx, -1.0)],
                config.rescale(config.rescaling.bounds_ln, cap),
                t,
                &mut ineq_rows,
                &mut ineq_rhs,
                &mut ineq_row_t,
            );
            if is_ext {
                coupled_line.insert((l.id, t), CoupledBound { lower_row, lower_coeff: 1.0, upper_row, upper_coeff: 1.0 });
            }
        }
    }

    let mut coupled_link = HashMap::new();
    for lk in network.links() {
        let is_ext = partition.links_extendable.contains(&lk.id);
        for &t in &snapshots {
            let idx = link_idx[&(lk.id, t)];
            let cap = lk.p_nom.value();
            let upper_row = push_ineq(
                &[(idx, 1.0)],
                config.rescale(config.rescaling.bounds_lk, lk.p_max_pu.value() * cap),
                t,
                &mut ineq_rows,
                &mut ineq_rhs,
                &mut ineq_row_t,
            );
            let lower_row = push_ineq(
                &[(idx, -1.0)],
                config.rescale(config.rescaling.bounds_lk, -lk.p_min_pu.value() * cap),
                t,
                &mut ineq_rows,
                &mut ineq_rhs,
                &mut ineq_row_t,
            );
            if is_ext {
                coupled_link.insert(
                    (lk.id, t),
                    CoupledBound { lower_row, lower_coeff: -lk.p_min_pu.value(), upper_row, upper_coeff: lk.p_max_pu.value() },
                );
            }
        }
    }

    Ok(SlaveProblem {
        snapshots,
        lp: ClarabelLp { num_vars, cost, eq_rows, eq_rhs, ineq_rows, ineq_rhs },
        coupled_gen,
        coupled_line,
        coupled_link,
        dispatch_idx,
        line_idx,
        link_idx,
        balance_row,
        eq_row_t,
        ineq_row_t,
    })
}

/// Master incumbent values the Benders driver read off the solved master
/// model, keyed the same way [`SlaveProblem`]'s coupling tables are.
#[derive(Debug, Clone, Default)]
pub struct MasterValues {
    pub g_p_nom: HashMap<GeneratorId, f64>,
    pub ln_s_nom: HashMap<LineId, f64>,
    pub lk_p_nom: HashMap<LinkId, f64>,
}

/// Push the current master incumbent into every coupled row's RHS (spec
/// §4.7 step 3).
pub fn push_master_values(slave: &mut SlaveProblem, config: &BuildConfig, values: &MasterValues) {
    for (&(id, _), bound) in &slave.coupled_gen {
        let Some(&cap) = values.g_p_nom.get(&id) else { continue };
        slave.lp.ineq_rhs[bound.lower_row] = clamp_rhs(config.rescale(config.rescaling.bounds_g, bound.lower_coeff * cap));
        slave.lp.ineq_rhs[bound.upper_row] = clamp_rhs(config.rescale(config.rescaling.bounds_g, bound.upper_coeff * cap));
    }
    for (&(id, _), bound) in &slave.coupled_line {
        let Some(&cap) = values.ln_s_nom.get(&id) else { continue };
        slave.lp.ineq_rhs[bound.lower_row] = clamp_rhs(config.rescale(config.rescaling.bounds_ln, bound.lower_coeff * cap));
        slave.lp.ineq_rhs[bound.upper_row] = clamp_rhs(config.rescale(config.rescaling.bounds_ln, bound.upper_coeff * cap));
    }
    for (&(id, _), bound) in &slave.coupled_link {
        let Some(&cap) = values.lk_p_nom.get(&id) else { continue };
        slave.lp.ineq_rhs[bound.lower_row] = clamp_rhs(config.rescale(config.rescaling.bounds_lk, bound.lower_coeff * cap));
        slave.lp.ineq_rhs[bound.upper_row] = clamp_rhs(config.rescale(config.rescaling.bounds_lk, bound.upper_coeff * cap));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridplan_core::{Bus, BusId, Generator, GeneratorId, Kilovolts, Line, LineId, Load, LoadId, Node};

    fn two_bus_network() -> Network {
        let mut network = Network::new();
        let b1 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(1), name: "A".into(), v_nom: Kilovolts(230.0), carrier: None }));
        let b2 = network.graph.add_node(Node::Bus(Bus { id: BusId::new(2), name: "B".into(), v_nom: Kilovolts(230.0), carrier: None }));
        network.graph.add_node(Node::Generator(
            Generator::new(GeneratorId::new(1), "g".into(), BusId::new(1)).with_p_limits(0.0, 100.0).extendable(0.0, 100.0, 1.0),
        ));
        network.graph.add_node(Node::Load(Load { id: LoadId::new(1), name: "L".into(), bus: BusId::new(2), p_set: vec![gridplan_core::Megawatts(40.0)] }));
        let l = Line::new(LineId::new(1), "L1".into(), BusId::new(1), BusId::new(2), 0.1).with_thermal_limit(100.0);
        network.graph.add_edge(b1, b2, gridplan_core::Edge::Line(l));
        network
    }

    #[test]
    fn builds_with_one_coupled_generator_bound() {
        let network = two_bus_network();
        let config = BuildConfig::default();
        let partition = Partition::from_network(&network);
        let slave = build_slave(&network, &config, &partition, vec![0]).unwrap();
        assert_eq!(slave.coupled_gen.len(), 1);
        assert!(!slave.uncoupled_ineq_rows().is_empty());
    }

    #[test]
    fn rejects_bilinear_formulation() {
        let network = two_bus_network();
        let config = BuildConfig::default().with_formulation(FormulationKind::AnglesBilinear);
        let partition = Partition::from_network(&network);
        assert!(build_slave(&network, &config, &partition, vec![0]).is_err());
    }
}
