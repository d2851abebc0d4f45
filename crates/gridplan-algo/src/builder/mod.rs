//! Assembles a `good_lp` problem from a [`gridplan_core::Network`] under a
//! chosen flow formulation, investment type, and decomposition role.
//!
//! This is the heart of the crate (see the module budget in the crate's
//! design notes: the builder is roughly half the implementation). It is
//! organized the way `gat_algo::opf::traits::OpfFormulation::build_problem`
//! funnels everything through one entry point, generalized here with an
//! explicit [`Role`] so the same construction code serves both the
//! monolithic runner and the Benders master.
//!
//! The Benders slave is a separate path ([`crate::benders::slave`]): it
//! needs genuine duals off a fixed-capacity LP each outer iteration, which
//! means posing it directly against `clarabel` rather than through
//! `good_lp`'s primal-only `Solution`. `Role` therefore has no `Slave`
//! variant — there is nothing here for it to gate.

mod flows;
mod global_constraints;
mod investment;
mod partition;
mod variables;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use good_lp::{Expression, ProblemVariables, Variable};

use gridplan_core::{BusId, GeneratorId, LineId, LinkId, Network, StorageUnitId, StoreId};

pub use partition::Partition;

/// Which power-flow formulation couples line/link flows to bus injections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormulationKind {
    #[default]
    AnglesLinear,
    AnglesLinearIntegerBigm,
    AnglesBilinear,
    KirchhoffLinear,
    KirchhoffBilinear,
    Ptdf,
}

impl FormulationKind {
    pub fn is_bilinear(&self) -> bool {
        matches!(self, Self::AnglesBilinear | Self::KirchhoffBilinear)
    }

    pub fn uses_angles(&self) -> bool {
        matches!(self, Self::AnglesLinear | Self::AnglesLinearIntegerBigm | Self::AnglesBilinear)
    }
}

impl fmt::Display for FormulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AnglesLinear => "angles_linear",
            Self::AnglesLinearIntegerBigm => "angles_linear_integer_bigm",
            Self::AnglesBilinear => "angles_bilinear",
            Self::KirchhoffLinear => "kirchhoff_linear",
            Self::KirchhoffBilinear => "kirchhoff_bilinear",
            Self::Ptdf => "ptdf",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FormulationKind {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "angles_linear" => Ok(Self::AnglesLinear),
            "angles_linear_integer_bigm" => Ok(Self::AnglesLinearIntegerBigm),
            "angles_bilinear" => Ok(Self::AnglesBilinear),
            "kirchhoff_linear" => Ok(Self::KirchhoffLinear),
            "kirchhoff_bilinear" => Ok(Self::KirchhoffBilinear),
            "ptdf" => Ok(Self::Ptdf),
            other => Err(BuildError::Configuration(format!("unknown formulation '{other}'"))),
        }
    }
}

/// How a candidate line's capacity addition is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvestmentType {
    #[default]
    Continuous,
    Integer,
    Binary,
    IntegerBigm,
}

impl fmt::Display for InvestmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Continuous => "continuous",
            Self::Integer => "integer",
            Self::Binary => "binary",
            Self::IntegerBigm => "integer_bigm",
        };
        write!(f, "{s}")
    }
}

impl FromStr for InvestmentType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continuous" => Ok(Self::Continuous),
            "integer" => Ok(Self::Integer),
            "binary" => Ok(Self::Binary),
            "integer_bigm" => Ok(Self::IntegerBigm),
            other => Err(BuildError::Configuration(format!("unknown investment_type '{other}'"))),
        }
    }
}

/// Which family of variables a build emits: investment and operation
/// (monolithic), or investment only (master, fed by the Benders slave's
/// cuts instead of its own operation variables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Monolithic,
    Master,
}

impl Role {
    fn emits_operation(&self) -> bool {
        !matches!(self, Role::Master)
    }
}

/// Named rescaling coefficients applied uniformly to both sides of selected
/// constraint families, purely for solver numerical conditioning. Default is
/// all-ones, i.e. a no-op; never affects feasibility.
#[derive(Debug, Clone, Copy)]
pub struct RescalingTable {
    pub bounds_g: f64,
    pub bounds_ln: f64,
    pub bounds_lk: f64,
    pub flows: f64,
    pub approx_restarget: f64,
    pub benderscut: f64,
}

impl Default for RescalingTable {
    fn default() -> Self {
        Self {
            bounds_g: 1.0,
            bounds_ln: 1.0,
            bounds_lk: 1.0,
            flows: 1.0,
            approx_restarget: 1.0,
            benderscut: 1.0,
        }
    }
}

impl RescalingTable {
    /// Apply the same tuning coefficient to every family.
    pub fn uniform(tune: f64) -> Self {
        Self {
            bounds_g: tune,
            bounds_ln: tune,
            bounds_lk: tune,
            flows: tune,
            approx_restarget: tune,
            benderscut: tune,
        }
    }
}

/// Recognized build-time options, mirroring the external-interface option
/// list: formulation/investment choice, rescaling, decomposition controls,
/// and the iterative and Benders runner knobs.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub formulation: FormulationKind,
    pub investment_type: InvestmentType,
    pub rescaling_enabled: bool,
    pub rescaling: RescalingTable,
    pub blockmodel: bool,
    pub decomposition: Option<String>,
    pub iterations: usize,
    pub post_discretization: bool,
    pub seq_discretization: bool,
    pub seq_discretization_threshold: f64,
    pub discretization_thresholds: Vec<f64>,
    pub split_subproblems: bool,
    pub individualcuts: bool,
    pub tolerance: f64,
    pub mip_gap: f64,
    pub big_m: f64,
    pub update_x: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            formulation: FormulationKind::AnglesLinear,
            investment_type: InvestmentType::Continuous,
            rescaling_enabled: false,
            rescaling: RescalingTable::default(),
            blockmodel: false,
            decomposition: None,
            iterations: 10,
            post_discretization: false,
            seq_discretization: false,
            seq_discretization_threshold: 0.3,
            discretization_thresholds: vec![0.2, 0.3],
            split_subproblems: false,
            individualcuts: false,
            tolerance: 100.0,
            mip_gap: 1e-8,
            big_m: 1e12,
            update_x: false,
        }
    }
}

impl BuildConfig {
    pub fn with_formulation(mut self, formulation: FormulationKind) -> Self {
        self.formulation = formulation;
        self
    }

    pub fn with_investment_type(mut self, investment_type: InvestmentType) -> Self {
        self.investment_type = investment_type;
        self
    }

    pub fn with_rescaling(mut self, table: RescalingTable) -> Self {
        self.rescaling_enabled = true;
        self.rescaling = table;
        self
    }

    pub fn with_decomposition(mut self, name: impl Into<String>) -> Self {
        self.decomposition = Some(name.into());
        self
    }

    pub(crate) fn rescale(&self, family: f64, value: f64) -> f64 {
        if self.rescaling_enabled {
            family * value
        } else {
            value
        }
    }

    fn validate(&self) -> Result<(), BuildError> {
        let bigm_pair_ok = match (self.investment_type, self.formulation) {
            (InvestmentType::IntegerBigm, FormulationKind::AnglesLinearIntegerBigm) => true,
            (InvestmentType::IntegerBigm, _) => false,
            (_, FormulationKind::AnglesLinearIntegerBigm) => false,
            _ => true,
        };
        if !bigm_pair_ok {
            return Err(BuildError::Configuration(
                "investment_type=integer_bigm requires formulation=angles_linear_integer_bigm (and vice versa)".into(),
            ));
        }
        if self.update_x && self.investment_type == InvestmentType::IntegerBigm {
            return Err(BuildError::Configuration(
                "update_x is incompatible with investment_type=integer_bigm".into(),
            ));
        }
        if self.blockmodel && self.decomposition.as_deref().map(|d| !d.is_empty()).unwrap_or(false) {
            return Err(BuildError::Configuration(
                "blockmodel is incompatible with a non-empty decomposition".into(),
            ));
        }
        if self.formulation.is_bilinear() {
            return Err(BuildError::Configuration(format!(
                "formulation={} requires a nonlinear backend, which this crate does not wire in",
                self.formulation
            )));
        }
        Ok(())
    }
}

/// Hand-rolled rather than `thiserror`-derived, matching the texture of
/// `gat_algo::tep::solver::TepError`: these errors carry free-form,
/// solver/config-specific prose rather than a fixed set of structured
/// fields.
#[derive(Debug)]
pub enum BuildError {
    Configuration(String),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Configuration(msg) => write!(f, "invalid model configuration: {msg}"),
        }
    }
}

impl std::error::Error for BuildError {}

/// The assembled optimization problem: `good_lp` variables, the objective,
/// and every constraint, plus the variable handles the runners and Benders
/// driver need to read back values or mutate RHS on the next build.
pub struct Model {
    pub vars: ProblemVariables,
    pub constraints: Vec<good_lp::Constraint>,
    pub objective: Expression,
    pub role: Role,
    pub snapshots: Vec<usize>,

    pub dispatch: HashMap<(GeneratorId, usize), Variable>,
    pub line_flow: HashMap<(LineId, usize), Variable>,
    pub link_flow: HashMap<(LinkId, usize), Variable>,
    pub theta: HashMap<(BusId, usize), Variable>,
    pub su_dispatch: HashMap<(StorageUnitId, usize), Variable>,
    pub su_store: HashMap<(StorageUnitId, usize), Variable>,
    pub su_soc: HashMap<(StorageUnitId, usize), Variable>,
    pub su_spill: HashMap<(StorageUnitId, usize), Variable>,
    pub st_dispatch: HashMap<(StoreId, usize), Variable>,
    pub st_store: HashMap<(StoreId, usize), Variable>,
    pub st_soc: HashMap<(StoreId, usize), Variable>,
    pub st_spill: HashMap<(StoreId, usize), Variable>,

    pub g_p_nom: HashMap<GeneratorId, Variable>,
    pub ln_s_nom: HashMap<LineId, Variable>,
    pub ln_inv: HashMap<LineId, Variable>,
    pub ln_opt: HashMap<LineId, Variable>,
    pub ln_opt_candidates: HashMap<(LineId, usize), Variable>,
    pub lk_p_nom: HashMap<LinkId, Variable>,
    pub su_p_nom: HashMap<StorageUnitId, Variable>,
    pub st_e_nom: HashMap<StoreId, Variable>,
    pub alpha: HashMap<usize, Variable>,
}

impl Model {
    fn new(role: Role, snapshots: Vec<usize>) -> Self {
        Self {
            vars: ProblemVariables::new(),
            constraints: Vec::new(),
            objective: Expression::from(0.0),
            role,
            snapshots,
            dispatch: HashMap::new(),
            line_flow: HashMap::new(),
            link_flow: HashMap::new(),
            theta: HashMap::new(),
            su_dispatch: HashMap::new(),
            su_store: HashMap::new(),
            su_soc: HashMap::new(),
            su_spill: HashMap::new(),
            st_dispatch: HashMap::new(),
            st_store: HashMap::new(),
            st_soc: HashMap::new(),
            st_spill: HashMap::new(),
            g_p_nom: HashMap::new(),
            ln_s_nom: HashMap::new(),
            ln_inv: HashMap::new(),
            ln_opt: HashMap::new(),
            ln_opt_candidates: HashMap::new(),
            lk_p_nom: HashMap::new(),
            su_p_nom: HashMap::new(),
            st_e_nom: HashMap::new(),
            alpha: HashMap::new(),
        }
    }

    /// Cut group index for snapshot `t`: one group per snapshot under
    /// `individualcuts`, else a single group covering every snapshot.
    pub fn cut_group(config: &BuildConfig, t: usize) -> usize {
        if config.individualcuts {
            t
        } else {
            0
        }
    }

    pub fn n_cut_groups(config: &BuildConfig, n_snapshots: usize) -> usize {
        if config.individualcuts {
            n_snapshots
        } else {
            1
        }
    }

    /// Partition of snapshots into physical Benders slaves: one slave per
    /// snapshot under `split_subproblems`, else a single slave spanning
    /// every snapshot. Independent of [`Model::cut_group`]/[`Model::n_cut_groups`]
    /// — a slave can contain snapshots that feed different cut groups, and
    /// several slaves can feed the same group (spec: `split_subproblems`
    /// governs slave partitioning, `individualcuts` governs `ALPHA` count).
    pub fn slave_partitions(config: &BuildConfig, n_snapshots: usize) -> Vec<Vec<usize>> {
        if config.split_subproblems {
            (0..n_snapshots).map(|t| vec![t]).collect()
        } else {
            vec![(0..n_snapshots).collect()]
        }
    }
}

/// Assembles a [`Model`] spanning every snapshot of `network`, gated by
/// `role`.
pub struct ModelBuilder;

impl ModelBuilder {
    pub fn build(network: &Network, config: &BuildConfig, role: Role) -> Result<Model, BuildError> {
        config.validate()?;

        let snapshots: Vec<usize> = (0..network.snapshots.len()).collect();
        let partition = Partition::from_network(network);
        let mut model = Model::new(role, snapshots.clone());

        investment::build_investment_variables(&mut model, network, config, &partition)?;

        if role.emits_operation() {
            variables::build_operation_variables(&mut model, network, config, &partition, &snapshots);
            flows::build_flow_constraints(&mut model, network, config, &partition, &snapshots)?;
            global_constraints::build_global_constraints(&mut model, network, config, &partition)?;
        }

        if role == Role::Master {
            let n_groups = Model::n_cut_groups(config, network.snapshots.len());
            for g in 0..n_groups {
                let alpha = model.vars.add(good_lp::variable().min(0.0));
                model.alpha.insert(g, alpha);
                model.objective += alpha;
            }
        }

        variables::build_objective_terms(&mut model, network, config, &partition, &snapshots);

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_bigm_pair() {
        let config = BuildConfig::default().with_investment_type(InvestmentType::IntegerBigm);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bilinear_formulations() {
        let config = BuildConfig::default().with_formulation(FormulationKind::AnglesBilinear);
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_default_config() {
        let config = BuildConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn formulation_round_trips_through_display_and_parse() {
        for f in [
            FormulationKind::AnglesLinear,
            FormulationKind::Ptdf,
            FormulationKind::KirchhoffLinear,
        ] {
            let s = f.to_string();
            assert_eq!(s.parse::<FormulationKind>().unwrap(), f);
        }
    }
}
