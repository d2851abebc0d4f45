//! Drivers that sit on top of the [`crate::builder`]: build a [`crate::builder::Model`],
//! solve it, and write the result back onto a [`gridplan_core::Network`].
//!
//! [`monolithic`] solves the full problem in one shot; [`iterative`] wraps it
//! in the reactance-update fixed-point loop angle/cycle formulations need
//! because line reactance depends on a build decision the linear model takes
//! as data.

pub mod iterative;
pub mod monolithic;

pub use iterative::{run_iterative, IterativeResult, IterativeTrace};
pub use monolithic::{run_monolithic, Solution};
