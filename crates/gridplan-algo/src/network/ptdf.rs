//! Sparse PTDF computation for the `ptdf` flow formulation.
//!
//! ## Power Transfer Distribution Factors (PTDF)
//!
//! PTDF[ℓ,n] = sensitivity of flow on line ℓ to injection at bus n:
//! ```text
//! ΔP_ℓ = PTDF[ℓ,n] × ΔP_injection_n
//! ```
//!
//! The `ptdf` formulation expresses branch flows directly as a linear
//! function of nodal net injections, bypassing explicit angle variables.
//! N-1 contingency screening (LODF) is out of scope; see Non-goals.

use super::susceptance::{SparseSusceptance, SusceptanceError};
use gridplan_core::solver::backend::{FaerSolver, LinearSystemBackend};
use gridplan_core::{BusId, Edge, LineId, Network};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from sensitivity matrix operations
#[derive(Debug, Error)]
pub enum SensitivityError {
    #[error("Susceptance matrix error: {0}")]
    Susceptance(#[from] SusceptanceError),

    #[error("Network must have at least 2 buses")]
    TooFewBuses,

    #[error("Network must have at least 1 line")]
    NoLines,

    #[error("Matrix inversion failed: {0}")]
    InversionFailed(String),
}

/// PTDF matrix: sensitivity of line flows to bus injections.
///
/// Dense storage is used because PTDF matrices are typically dense
/// (every line is affected by injection at every bus to some degree).
#[derive(Debug, Clone)]
pub struct PtdfMatrix {
    /// Row index → line ID
    pub line_ids: Vec<LineId>,
    /// Column index → bus ID
    pub bus_ids: Vec<BusId>,
    /// PTDF values: ptdf[line_idx][bus_idx]
    pub values: Vec<Vec<f64>>,
    /// Lookup: line_id → row index
    line_to_idx: HashMap<LineId, usize>,
    /// Lookup: bus_id → column index
    bus_to_idx: HashMap<BusId, usize>,
}

impl PtdfMatrix {
    /// Get PTDF for line ℓ with respect to injection at bus n.
    pub fn get(&self, line_id: LineId, bus_id: BusId) -> Option<f64> {
        let line_idx = self.line_to_idx.get(&line_id)?;
        let bus_idx = self.bus_to_idx.get(&bus_id)?;
        Some(self.values[*line_idx][*bus_idx])
    }

    /// Get PTDF by indices
    pub fn get_by_idx(&self, line_idx: usize, bus_idx: usize) -> f64 {
        self.values
            .get(line_idx)
            .and_then(|row| row.get(bus_idx))
            .copied()
            .unwrap_or(0.0)
    }

    /// Number of lines (rows).
    pub fn num_lines(&self) -> usize {
        self.line_ids.len()
    }

    /// Number of buses (columns).
    pub fn num_buses(&self) -> usize {
        self.bus_ids.len()
    }

    /// Get line index from ID
    pub fn line_index(&self, id: LineId) -> Option<usize> {
        self.line_to_idx.get(&id).copied()
    }

    /// Get bus index from ID
    pub fn bus_index(&self, id: BusId) -> Option<usize> {
        self.bus_to_idx.get(&id).copied()
    }
}

/// Sparse PTDF computation using a factored B' matrix.
///
/// This is the main entry point for computing sensitivity factors.
pub struct SparsePtdf;

impl SparsePtdf {
    /// Compute PTDF matrix from network.
    ///
    /// Algorithm:
    /// 1. Build sparse B' susceptance matrix
    /// 2. Compute X = (B'_reduced)⁻¹ via LU factorization
    /// 3. For each line ℓ from bus i to j:
    ///    PTDF[ℓ,n] = (X[i,n] - X[j,n]) / x_ℓ
    pub fn compute_ptdf(network: &Network) -> Result<PtdfMatrix, SensitivityError> {
        let b_prime = SparseSusceptance::from_network(network)?;
        let n_bus = b_prime.n_bus();

        if n_bus < 2 {
            return Err(SensitivityError::TooFewBuses);
        }

        let mut lines: Vec<(LineId, BusId, BusId, f64)> = Vec::new();
        for edge in network.graph.edge_references() {
            if let Edge::Line(line) = edge.weight() {
                if !line.build_candidate {
                    let x = line.x.value().abs().max(1e-6);
                    lines.push((line.id, line.bus0, line.bus1, x));
                }
            }
        }

        if lines.is_empty() {
            return Err(SensitivityError::NoLines);
        }

        lines.sort_by_key(|l| l.0.value());

        let line_ids: Vec<LineId> = lines.iter().map(|l| l.0).collect();
        let bus_ids: Vec<BusId> = b_prime.bus_order().to_vec();

        let line_to_idx: HashMap<LineId, usize> =
            line_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let bus_to_idx: HashMap<BusId, usize> =
            bus_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let (reduced_matrix, _reduced_order) = b_prime.reduced_matrix();
        let slack_idx = b_prime.slack_idx();

        let mut dense = vec![vec![0.0; reduced_matrix.rows()]; reduced_matrix.rows()];
        for (val, (i, j)) in reduced_matrix.iter() {
            dense[i][j] = *val;
        }
        let x_inv = Self::compute_b_inverse(&dense, n_bus, slack_idx)?;

        let n_lines = lines.len();
        let mut ptdf = vec![vec![0.0; n_bus]; n_lines];

        for (line_idx, &(_, bus0, bus1, x)) in lines.iter().enumerate() {
            let i = bus_to_idx[&bus0];
            let j = bus_to_idx[&bus1];

            for bus_idx in 0..n_bus {
                ptdf[line_idx][bus_idx] = (x_inv[i][bus_idx] - x_inv[j][bus_idx]) / x;
            }
        }

        Ok(PtdfMatrix {
            line_ids,
            bus_ids,
            values: ptdf,
            line_to_idx,
            bus_to_idx,
        })
    }

    /// Compute (B'_reduced)⁻¹ extended with zeros for the slack bus, by
    /// solving one dense linear system per identity column with
    /// [`FaerSolver`].
    fn compute_b_inverse(
        reduced: &[Vec<f64>],
        full_size: usize,
        slack_idx: usize,
    ) -> Result<Vec<Vec<f64>>, SensitivityError> {
        let m = reduced.len();
        if m == 0 {
            return Err(SensitivityError::InversionFailed("empty matrix".into()));
        }

        let backend = FaerSolver;
        let mut inv_reduced = vec![vec![0.0; m]; m];
        for col in 0..m {
            let mut rhs = vec![0.0; m];
            rhs[col] = 1.0;
            let solution = backend
                .solve(reduced, &rhs)
                .map_err(|e| SensitivityError::InversionFailed(e.to_string()))?;
            for row in 0..m {
                inv_reduced[row][col] = solution[row];
            }
        }

        let mut x = vec![vec![0.0; full_size]; full_size];
        let mut reduced_to_full: Vec<usize> = Vec::with_capacity(m);
        for i in 0..full_size {
            if i != slack_idx {
                reduced_to_full.push(i);
            }
        }

        for (ri, &fi) in reduced_to_full.iter().enumerate() {
            for (rj, &fj) in reduced_to_full.iter().enumerate() {
                x[fi][fj] = inv_reduced[ri][rj];
            }
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::susceptance::tests::create_3bus_network;

    #[test]
    fn test_ptdf_dimensions() {
        let network = create_3bus_network();
        let ptdf = SparsePtdf::compute_ptdf(&network).unwrap();

        assert_eq!(ptdf.num_lines(), 3);
        assert_eq!(ptdf.num_buses(), 3);
    }

    #[test]
    fn test_ptdf_slack_bus_zero() {
        let network = create_3bus_network();
        let ptdf = SparsePtdf::compute_ptdf(&network).unwrap();

        let slack_bus = BusId::new(1);
        for &line_id in &ptdf.line_ids {
            let val = ptdf.get(line_id, slack_bus).unwrap();
            assert!(
                val.abs() < 1e-10,
                "PTDF for slack should be ~0, got {}",
                val
            );
        }
    }

    #[test]
    fn test_ptdf_reciprocity_row_sum_zero() {
        // Injections at every bus simultaneously produce zero net flow change.
        let network = create_3bus_network();
        let ptdf = SparsePtdf::compute_ptdf(&network).unwrap();

        for line_idx in 0..ptdf.num_lines() {
            let row_sum: f64 = (0..ptdf.num_buses())
                .map(|bus_idx| ptdf.get_by_idx(line_idx, bus_idx))
                .sum();
            assert!(row_sum.abs() < 1e-8, "row sum = {}", row_sum);
        }
    }
}
