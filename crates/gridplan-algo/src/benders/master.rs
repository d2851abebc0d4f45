//! The Benders master: investment variables plus one `ALPHA` proxy per cut
//! group, built through the same [`ModelBuilder`] the monolithic runner uses
//! (`Role::Master` just skips operation variables and flow constraints).

use gridplan_core::Network;

use crate::builder::{BuildConfig, BuildError, Model, ModelBuilder, Role};

pub fn build_master(network: &Network, config: &BuildConfig) -> Result<Model, BuildError> {
    ModelBuilder::build(network, config, Role::Master)
}
