//! # gridplan-algo: transmission-expansion-aware linear optimal power flow
//!
//! This crate builds and solves linear optimal power flow (LOPF) problems
//! over a [`gridplan_core::Network`], with optional co-optimization of
//! transmission and generation investment decisions.
//!
//! ## Flow formulations
//!
//! The [`builder`] module assembles a `good_lp` problem under one of six
//! formulations, selected per run:
//!
//! | Formulation | Variables | Constraint style |
//! |-------------|-----------|-------------------|
//! | `angles_linear` | bus angles | linear angle-difference flow |
//! | `angles_linear_integer_bigm` | bus angles + build binaries | Big-M disjunctive |
//! | `angles_bilinear` | bus angles, reactance as data | linearized around a reactance estimate |
//! | `kirchhoff_linear` | branch flows | cycle (KVL) constraints from [`network::CycleBasis`] |
//! | `kirchhoff_bilinear` | branch flows | cycle constraints with reactance re-estimated per iteration |
//! | `ptdf` | branch flows | precomputed sensitivity factors from [`network::PtdfMatrix`] |
//!
//! ## Investment types
//!
//! Candidate line and generator investment decisions can be modeled as
//! `continuous`, `integer`, `binary`, or `integer_bigm` (the last pairs with
//! the `angles_linear_integer_bigm` formulation's Big-M constraints).
//!
//! ## Running a study
//!
//! Three drivers sit on top of the model builder:
//!
//! - [`runner::monolithic`] solves the full angle/flow/investment problem in
//!   one shot.
//! - [`runner::iterative`] re-estimates line reactances between solves for
//!   the bilinear formulations, where reactance depends on a build decision
//!   that isn't known until the problem is solved.
//! - [`benders`] decomposes investment (master) from operation (slave) via
//!   lazy-constraint Benders cuts, for problems too large to solve
//!   monolithically.
//!
//! ## Non-goals
//!
//! AC power flow, unit commitment, security-constrained N-1 screening, and
//! stochastic programming are out of scope; see `gridplan_core::Network`'s
//! validation diagnostics for how unsupported features are surfaced rather
//! than silently ignored.

pub mod benders;
pub mod builder;
pub mod error;
pub mod network;
pub mod runner;
pub mod solver;

pub use error::RunError;
