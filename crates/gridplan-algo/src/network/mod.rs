//! Network-derived structures feeding the model builder: the B' susceptance
//! matrix, PTDF sensitivities, and the fundamental cycle basis used by the
//! `kirchhoff_linear` flow formulation.

pub mod cycles;
pub mod ptdf;
pub mod susceptance;

pub use cycles::{CycleBasis, CycleId, Direction};
pub use ptdf::{PtdfMatrix, SensitivityError, SparsePtdf};
pub use susceptance::{SparseSusceptance, SusceptanceError};
