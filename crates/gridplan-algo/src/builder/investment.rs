//! Investment variables: generator/link/storage/store capacity decisions,
//! and the four line-investment encodings.
//!
//! The `continuous`/`integer` cases are a direct linear relation between a
//! new `LN_inv` variable and `LN_s_nom`; no teacher counterpart needed one
//! since `gat_algo::tep::solver::solve_tep` only ever modeled a single
//! binary build decision. `binary` generalizes that teacher disjunctive
//! switch ("build this circuit, yes or no") into "how many parallel
//! circuits are active," and `integer_bigm` is the teacher's own Big-M
//! constraint triple, reused almost verbatim, widened from one candidate
//! bit to a per-line candidate set.

use good_lp::{constraint, variable};

use gridplan_core::Network;

use super::partition::Partition;
use super::{BuildConfig, BuildError, InvestmentType, Model};

pub fn build_investment_variables(
    model: &mut Model,
    network: &Network,
    config: &BuildConfig,
    partition: &Partition,
) -> Result<(), BuildError> {
    for g in network.generators() {
        if !partition.generators_extendable.contains(&g.id) {
            continue;
        }
        let var = model.vars.add(
            variable()
                .min(g.p_nom_min.value())
                .max(g.p_nom_max.value()),
        );
        model.g_p_nom.insert(g.id, var);
    }

    for lk in network.links() {
        if !partition.links_extendable.contains(&lk.id) {
            continue;
        }
        let var = model.vars.add(
            variable()
                .min(lk.p_nom_min.value())
                .max(lk.p_nom_max.value()),
        );
        model.lk_p_nom.insert(lk.id, var);
    }

    for su in network.storage_units() {
        if !partition.storage_units_extendable.contains(&su.id) {
            continue;
        }
        let var = model.vars.add(variable().min(0.0));
        model.su_p_nom.insert(su.id, var);
    }

    for st in network.stores() {
        if !partition.stores_extendable.contains(&st.id) {
            continue;
        }
        let var = model.vars.add(variable().min(0.0));
        model.st_e_nom.insert(st.id, var);
    }

    for l in network.lines() {
        if partition.lines_extendable.contains(&l.id) {
            build_line_investment(model, config, l)?;
        }
    }

    Ok(())
}

fn build_line_investment(
    model: &mut Model,
    config: &BuildConfig,
    line: &gridplan_core::Line,
) -> Result<(), BuildError> {
    let s_nom = line.s_nom.value();
    let num_parallel = line.num_parallel.max(1e-9);

    match config.investment_type {
        InvestmentType::Continuous => {
            let ln_inv = model.vars.add(variable().min(0.0));
            let ln_s_nom = model.vars.add(
                variable()
                    .min(line.s_nom_min.value())
                    .max(line.s_nom_max.value()),
            );
            model
                .constraints
                .push(constraint!(ln_s_nom == s_nom + s_nom / num_parallel * ln_inv));
            model.ln_inv.insert(line.id, ln_inv);
            model.ln_s_nom.insert(line.id, ln_s_nom);
        }
        InvestmentType::Integer => {
            let ln_inv = model.vars.add(variable().integer().min(0.0));
            let ln_s_nom = model.vars.add(
                variable()
                    .min(line.s_nom_min.value())
                    .max(line.s_nom_max.value()),
            );
            model
                .constraints
                .push(constraint!(ln_s_nom == s_nom + s_nom / num_parallel * ln_inv));
            model.ln_inv.insert(line.id, ln_inv);
            model.ln_s_nom.insert(line.id, ln_s_nom);
        }
        InvestmentType::Binary => {
            let ln_opt = model.vars.add(variable().binary());
            let ln_inv = model.vars.add(variable().min(0.0));
            let big_m = config.big_m;
            model
                .constraints
                .push(constraint!(ln_inv >= -big_m * (1.0 - ln_opt) + line.s_nom_ext_min.value()));
            model.constraints.push(constraint!(ln_inv <= big_m * ln_opt));
            let ln_s_nom = model.vars.add(
                variable()
                    .min(line.s_nom_min.value())
                    .max(line.s_nom_max.value()),
            );
            model
                .constraints
                .push(constraint!(ln_s_nom == s_nom + s_nom / num_parallel * ln_inv));
            model.ln_opt.insert(line.id, ln_opt);
            model.ln_inv.insert(line.id, ln_inv);
            model.ln_s_nom.insert(line.id, ln_s_nom);
        }
        InvestmentType::IntegerBigm => {
            let s_nom_per_parallel = (s_nom / num_parallel).max(1e-9);
            let max_candidate = (line.s_nom_max.value() / s_nom_per_parallel).floor().max(0.0) as usize;

            let mut opt_vars = Vec::with_capacity(max_candidate + 1);
            for c in 0..=max_candidate {
                let v = model.vars.add(variable().binary());
                model.ln_opt_candidates.insert((line.id, c), v);
                opt_vars.push(v);
            }

            let selector_sum: good_lp::Expression = opt_vars.iter().copied().sum();
            model.constraints.push(constraint!(selector_sum == 1.0));

            let capacity_expr: good_lp::Expression = opt_vars
                .iter()
                .enumerate()
                .map(|(c, &v)| (c as f64 / num_parallel) * v)
                .fold(good_lp::Expression::from(0.0), |acc, term| acc + term);

            let ln_s_nom = model.vars.add(
                variable()
                    .min(line.s_nom_min.value())
                    .max(line.s_nom_max.value()),
            );
            model
                .constraints
                .push(constraint!(ln_s_nom == s_nom + s_nom * capacity_expr));
            model.ln_s_nom.insert(line.id, ln_s_nom);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridplan_core::{BusId, Line, LineId};

    #[test]
    fn integer_bigm_candidate_count_matches_capacity_ratio() {
        let mut model = Model::new(super::Role::Monolithic, vec![0]);
        let config = BuildConfig::default()
            .with_investment_type(InvestmentType::IntegerBigm)
            .with_formulation(super::super::FormulationKind::AnglesLinearIntegerBigm);
        let line = Line::new(LineId::new(1), "L".into(), BusId::new(1), BusId::new(2), 0.1)
            .with_thermal_limit(100.0)
            .extendable(100.0, 300.0, 1000.0);

        build_line_investment(&mut model, &config, &line).unwrap();
        // s_nom_per_parallel = 100, s_nom_max = 300 -> candidates 0..=3
        assert_eq!(model.ln_opt_candidates.len(), 4);
    }
}
