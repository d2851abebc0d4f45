//! # gridplan-core: Transmission-Expansion-Aware Network Data Model
//!
//! Provides the fundamental data structures and graph-based network model for
//! linear optimal power flow (LOPF) with transmission expansion planning.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected graphs** where:
//! - **Nodes**: Buses, Generators, StorageUnits, Stores, Loads
//! - **Edges**: Lines (impedance-coupled, used in angle/cycle/PTDF formulations)
//!   and Links (controllable directed transfer, no impedance coupling)
//!
//! This graph-based approach enables:
//! - Fast topological queries (connectivity, cycle bases)
//! - Type-safe element access with newtype IDs
//! - Support for multiple parallel lines/links between the same pair of buses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridplan_core::*;
//!
//! let mut network = Network::new();
//!
//! let bus1 = network.graph.add_node(Node::Bus(Bus {
//!     id: BusId::new(1),
//!     name: "Bus 1".to_string(),
//!     v_nom: Kilovolts(138.0),
//!     carrier: None,
//! }));
//!
//! let bus2 = network.graph.add_node(Node::Bus(Bus {
//!     id: BusId::new(2),
//!     name: "Bus 2".to_string(),
//!     v_nom: Kilovolts(138.0),
//!     carrier: None,
//! }));
//!
//! network.graph.add_node(Node::Generator(
//!     Generator::new(GeneratorId::new(1), "Gen 1".to_string(), BusId::new(1))
//!         .with_p_limits(0.0, 100.0)
//!         .with_marginal_cost(35.0),
//! ));
//!
//! network.graph.add_node(Node::Load(Load {
//!     id: LoadId::new(1),
//!     name: "Load 1".to_string(),
//!     bus: BusId::new(2),
//!     p_set: vec![Megawatts(50.0)],
//! }));
//!
//! network.graph.add_edge(
//!     bus1,
//!     bus2,
//!     Edge::Line(Line::new(LineId::new(1), "Line 1-2".to_string(), BusId::new(1), BusId::new(2), 0.1)),
//! );
//! ```
//!
//! ## Core Data Structures
//!
//! - [`Network`] - The main network container (petgraph `UnGraph<Node, Edge>`)
//! - [`Node`] - Enum for Bus, Generator, StorageUnit, Store, Load elements
//! - [`Edge`] - Enum for Line, Link connections
//! - Type-safe IDs: [`BusId`], [`LineId`], [`LinkId`], [`GeneratorId`],
//!   [`StorageUnitId`], [`StoreId`], [`LoadId`], [`CarrierId`]
//!
//! ## Modules
//!
//! - [`diagnostics`] - Validation and diagnostic reporting
//! - [`solver`] - Dense linear-system backends used by sensitivity analysis
//! - [`units`] - Compile-time unit safety for power system quantities
//!
//! Dataset import/export, reporting, and CLI entry points live outside this
//! crate; `gridplan-core` only defines the in-memory model those tools would
//! build and consume.

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod diagnostics;
pub mod error;
pub mod solver;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{GridError, GridResult};
pub use petgraph::graph::NodeIndex;
pub use units::{
    AdmittancePu, Hours, ImpedancePu, Kilovolts, Megawatts, MegawattHours, PerUnit, Radians,
};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }
    };
}

id_newtype!(BusId);
id_newtype!(LineId);
id_newtype!(LinkId);
id_newtype!(GeneratorId);
id_newtype!(StorageUnitId);
id_newtype!(StoreId);
id_newtype!(LoadId);
id_newtype!(CarrierId);

/// A carrier (energy type, e.g. "wind", "gas", "AC") shared across components.
///
/// Carriers hold the per-MWh CO2 intensity used by [`GlobalConstraint::Co2Limit`]
/// and the renewable flag used by [`GlobalConstraint::ResTarget`].
#[derive(Debug, Clone, Default)]
pub struct Carrier {
    pub id: CarrierId,
    pub name: String,
    /// CO2 emission intensity, tonnes per MWh of primary energy consumed.
    pub co2_emissions: f64,
}

impl Default for CarrierId {
    fn default() -> Self {
        CarrierId(0)
    }
}

/// A single optimization timestep with its weighting (hours represented).
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub index: usize,
    pub weighting: Hours,
}

impl Snapshot {
    pub fn new(index: usize, weighting_hours: f64) -> Self {
        Self {
            index,
            weighting: Hours(weighting_hours),
        }
    }
}

/// A crate-wide planning constraint spanning all snapshots.
#[derive(Debug, Clone, Copy)]
pub enum GlobalConstraint {
    /// Total CO2 emitted across all carriers and snapshots must not exceed this (tonnes).
    Co2Limit(f64),
    /// Total (line length in km) * (built capacity in MW) must not exceed this.
    MwKmLimit(f64),
    /// Renewable generation must be at least this fraction of total demand.
    ResTarget(f64),
    /// Same as `ResTarget` but linearized via an auxiliary total-generation proxy
    /// instead of the exact demand total (see Design Notes).
    ApproxResTarget(f64),
}

/// A bus: a node where power balance is enforced.
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Nominal voltage, used only for documentation and per-unit bookkeeping.
    pub v_nom: Kilovolts,
    pub carrier: Option<CarrierId>,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: BusId(0),
            name: String::new(),
            v_nom: Kilovolts(0.0),
            carrier: None,
        }
    }
}

/// A transmission line: impedance-coupled, flow determined by bus angles
/// (or the cycle/PTDF equivalent), subject to thermal and, if extendable,
/// investment constraints.
#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    pub name: String,
    pub bus0: BusId,
    pub bus1: BusId,
    /// Series reactance, per-unit.
    pub x: ImpedancePu,
    /// Series resistance, per-unit. Ignored by lossless DC formulations.
    pub r: ImpedancePu,
    /// Thermal limit, MW.
    pub s_nom: Megawatts,
    pub s_nom_extendable: bool,
    pub s_nom_min: Megawatts,
    pub s_nom_max: Megawatts,
    /// Lower bound on `LN_inv` under `binary` investment — the Big-M
    /// disjunctive switch's "off" floor, independent of `s_nom_min`.
    pub s_nom_ext_min: Megawatts,
    /// Thermal derating factor applied to `s_nom` (or the live investment
    /// variable) when bounding line flow.
    pub s_max_pu: PerUnit,
    /// Annualized cost per MW of new capacity, $/MW/yr.
    pub capital_cost: f64,
    /// Route length, used by the `MwKmLimit` global constraint.
    pub length_km: f64,
    /// Identical parallel circuits represented by this one line.
    pub num_parallel: f64,
    /// True if this line does not yet exist and is a discrete build decision
    /// (the `*_integer`/`*_integer_bigm`/`*_binary` investment types).
    pub build_candidate: bool,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            id: LineId(0),
            name: String::new(),
            bus0: BusId(0),
            bus1: BusId(0),
            x: ImpedancePu(0.1),
            r: ImpedancePu(0.0),
            s_nom: Megawatts(0.0),
            s_nom_extendable: false,
            s_nom_min: Megawatts(0.0),
            s_nom_max: Megawatts(f64::INFINITY),
            s_nom_ext_min: Megawatts(0.0),
            s_max_pu: PerUnit(1.0),
            capital_cost: 0.0,
            length_km: 0.0,
            num_parallel: 1.0,
            build_candidate: false,
        }
    }
}

impl Line {
    pub fn new(id: LineId, name: String, bus0: BusId, bus1: BusId, x: f64) -> Self {
        Self {
            id,
            name,
            bus0,
            bus1,
            x: ImpedancePu(x),
            ..Self::default()
        }
    }

    pub fn with_thermal_limit(mut self, s_nom_mw: f64) -> Self {
        self.s_nom = Megawatts(s_nom_mw);
        self
    }

    /// Mark as a continuous/integer/binary investment candidate with the
    /// given capacity bounds and annualized cost. `s_nom_ext_min` (the
    /// binary Big-M switch's floor) defaults to `s_nom_min`; override with
    /// [`Line::with_ext_min`] when the two should differ.
    pub fn extendable(mut self, s_nom_min_mw: f64, s_nom_max_mw: f64, capital_cost: f64) -> Self {
        self.s_nom_extendable = true;
        self.s_nom_min = Megawatts(s_nom_min_mw);
        self.s_nom_max = Megawatts(s_nom_max_mw);
        self.s_nom_ext_min = Megawatts(s_nom_min_mw);
        self.capital_cost = capital_cost;
        self
    }

    /// Override the Big-M floor used by `binary` investment independently
    /// of `s_nom_min`.
    pub fn with_ext_min(mut self, s_nom_ext_min_mw: f64) -> Self {
        self.s_nom_ext_min = Megawatts(s_nom_ext_min_mw);
        self
    }

    /// Derate the thermal limit applied to line flow bounds.
    pub fn with_s_max_pu(mut self, s_max_pu: f64) -> Self {
        self.s_max_pu = PerUnit(s_max_pu);
        self
    }

    /// Mark as a discrete new-build candidate (does not exist until built).
    pub fn as_candidate(mut self) -> Self {
        self.build_candidate = true;
        self.s_nom_extendable = true;
        self
    }
}

/// A controllable link: directed transfer between two buses with no
/// impedance coupling (e.g. HVDC, sector-coupling transfer).
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub bus0: BusId,
    pub bus1: BusId,
    pub p_nom: Megawatts,
    pub p_nom_extendable: bool,
    pub p_nom_min: Megawatts,
    pub p_nom_max: Megawatts,
    /// Fraction of `p_nom` the link may carry in reverse (bus1 -> bus0).
    pub p_min_pu: PerUnit,
    pub p_max_pu: PerUnit,
    pub capital_cost: f64,
    pub efficiency: PerUnit,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            id: LinkId(0),
            name: String::new(),
            bus0: BusId(0),
            bus1: BusId(0),
            p_nom: Megawatts(0.0),
            p_nom_extendable: false,
            p_nom_min: Megawatts(0.0),
            p_nom_max: Megawatts(f64::INFINITY),
            p_min_pu: PerUnit(0.0),
            p_max_pu: PerUnit(1.0),
            capital_cost: 0.0,
            efficiency: PerUnit(1.0),
        }
    }
}

impl Link {
    pub fn new(id: LinkId, name: String, bus0: BusId, bus1: BusId, p_nom_mw: f64) -> Self {
        Self {
            id,
            name,
            bus0,
            bus1,
            p_nom: Megawatts(p_nom_mw),
            ..Self::default()
        }
    }

    pub fn extendable(mut self, p_nom_min_mw: f64, p_nom_max_mw: f64, capital_cost: f64) -> Self {
        self.p_nom_extendable = true;
        self.p_nom_min = Megawatts(p_nom_min_mw);
        self.p_nom_max = Megawatts(p_nom_max_mw);
        self.capital_cost = capital_cost;
        self
    }
}

/// Dispatchable or variable generation at a bus.
#[derive(Debug, Clone)]
pub struct Generator {
    pub id: GeneratorId,
    pub name: String,
    pub bus: BusId,
    pub carrier: Option<CarrierId>,
    pub p_nom: Megawatts,
    pub p_nom_extendable: bool,
    pub p_nom_min: Megawatts,
    pub p_nom_max: Megawatts,
    /// Per-snapshot minimum dispatch, as a fraction of `p_nom`.
    pub p_min_pu: Vec<PerUnit>,
    /// Per-snapshot maximum dispatch (availability profile), as a fraction of `p_nom`.
    pub p_max_pu: Vec<PerUnit>,
    /// $/MWh, constant across snapshots.
    pub marginal_cost: f64,
    /// $/MW/yr, annualized cost of new capacity.
    pub capital_cost: f64,
    /// Unit commitment flag. Recognized but not modeled; see Non-goals.
    pub committable: bool,
    /// Fuel-to-electricity conversion efficiency; divides emitting carriers'
    /// dispatch in the `co2_limit` global constraint.
    pub efficiency: PerUnit,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            id: GeneratorId(0),
            name: String::new(),
            bus: BusId(0),
            carrier: None,
            p_nom: Megawatts(0.0),
            p_nom_extendable: false,
            p_nom_min: Megawatts(0.0),
            p_nom_max: Megawatts(f64::INFINITY),
            p_min_pu: vec![PerUnit(0.0)],
            p_max_pu: vec![PerUnit(1.0)],
            marginal_cost: 0.0,
            capital_cost: 0.0,
            committable: false,
            efficiency: PerUnit(1.0),
        }
    }
}

impl Generator {
    pub fn new(id: GeneratorId, name: String, bus: BusId) -> Self {
        Self {
            id,
            name,
            bus,
            ..Self::default()
        }
    }

    pub fn with_p_limits(mut self, pmin_mw: f64, pmax_mw: f64) -> Self {
        self.p_nom = Megawatts(pmax_mw);
        self.p_min_pu = vec![PerUnit(if pmax_mw.abs() > 1e-12 {
            pmin_mw / pmax_mw
        } else {
            0.0
        })];
        self
    }

    pub fn with_marginal_cost(mut self, cost_per_mwh: f64) -> Self {
        self.marginal_cost = cost_per_mwh;
        self
    }

    pub fn extendable(mut self, p_nom_min_mw: f64, p_nom_max_mw: f64, capital_cost: f64) -> Self {
        self.p_nom_extendable = true;
        self.p_nom_min = Megawatts(p_nom_min_mw);
        self.p_nom_max = Megawatts(p_nom_max_mw);
        self.capital_cost = capital_cost;
        self
    }

    /// Per-snapshot availability, e.g. a wind or solar capacity factor profile.
    pub fn with_availability_profile(mut self, profile: Vec<f64>) -> Self {
        self.p_max_pu = profile.into_iter().map(PerUnit).collect();
        self
    }

    /// Availability fraction for a given snapshot, broadcasting a constant profile.
    pub fn p_max_pu_at(&self, snapshot: usize) -> PerUnit {
        if self.p_max_pu.len() == 1 {
            self.p_max_pu[0]
        } else {
            self.p_max_pu[snapshot]
        }
    }

    pub fn p_min_pu_at(&self, snapshot: usize) -> PerUnit {
        if self.p_min_pu.len() == 1 {
            self.p_min_pu[0]
        } else {
            self.p_min_pu[snapshot]
        }
    }
}

/// A storage unit: power-rated (`p_nom`) with energy capacity derived from
/// `p_nom * max_hours`, tracking state of charge across snapshots.
#[derive(Debug, Clone)]
pub struct StorageUnit {
    pub id: StorageUnitId,
    pub name: String,
    pub bus: BusId,
    pub carrier: Option<CarrierId>,
    pub p_nom: Megawatts,
    pub p_nom_extendable: bool,
    /// Charging limit as a fraction of `p_nom`; negative, since it bounds the
    /// store leg rather than the dispatch leg.
    pub p_min_pu: PerUnit,
    /// Discharging limit as a fraction of `p_nom`.
    pub p_max_pu: PerUnit,
    /// Energy capacity expressed as hours of full-power discharge.
    pub max_hours: Hours,
    pub efficiency_store: PerUnit,
    pub efficiency_dispatch: PerUnit,
    /// Fractional energy loss per hour, independent of throughput.
    pub standing_loss: PerUnit,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    /// If true, state of charge at the last snapshot must equal the first.
    pub cyclic_state_of_charge: bool,
    /// State of charge at the start of the first snapshot, used only when
    /// `cyclic_state_of_charge` is false.
    pub state_of_charge_initial: MegawattHours,
    /// Exogenous energy inflow per snapshot (broadcast if length 1), e.g.
    /// hydro reservoir inflow.
    pub inflow: Vec<Megawatts>,
}

impl Default for StorageUnit {
    fn default() -> Self {
        Self {
            id: StorageUnitId(0),
            name: String::new(),
            bus: BusId(0),
            carrier: None,
            p_nom: Megawatts(0.0),
            p_nom_extendable: false,
            p_min_pu: PerUnit(-1.0),
            p_max_pu: PerUnit(1.0),
            max_hours: Hours(1.0),
            efficiency_store: PerUnit(1.0),
            efficiency_dispatch: PerUnit(1.0),
            standing_loss: PerUnit(0.0),
            marginal_cost: 0.0,
            capital_cost: 0.0,
            cyclic_state_of_charge: true,
            state_of_charge_initial: MegawattHours(0.0),
            inflow: vec![Megawatts(0.0)],
        }
    }
}

impl StorageUnit {
    pub fn new(id: StorageUnitId, name: String, bus: BusId, p_nom_mw: f64, max_hours: f64) -> Self {
        Self {
            id,
            name,
            bus,
            p_nom: Megawatts(p_nom_mw),
            max_hours: Hours(max_hours),
            ..Self::default()
        }
    }

    /// Energy capacity in MWh: `p_nom * max_hours`.
    pub fn energy_capacity(&self) -> MegawattHours {
        self.p_nom.over(self.max_hours)
    }

    /// Inflow at `snapshot`, broadcasting a single-element profile.
    pub fn inflow_at(&self, snapshot: usize) -> Megawatts {
        if self.inflow.len() == 1 {
            self.inflow[0]
        } else {
            self.inflow[snapshot]
        }
    }
}

/// A pure energy store: no power rating of its own, bounded only by `e_nom`
/// and the bus's other connected components.
#[derive(Debug, Clone)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub bus: BusId,
    pub carrier: Option<CarrierId>,
    pub e_nom: MegawattHours,
    pub e_nom_extendable: bool,
    /// Lower state-of-charge bound as a fraction of `e_nom`.
    pub e_min_pu: PerUnit,
    /// Upper state-of-charge bound as a fraction of `e_nom`.
    pub e_max_pu: PerUnit,
    pub standing_loss: PerUnit,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    pub e_cyclic: bool,
    /// State of charge at the start of the first snapshot, used only when
    /// `e_cyclic` is false.
    pub state_of_charge_initial: MegawattHours,
    /// Exogenous energy inflow per snapshot (broadcast if length 1).
    pub inflow: Vec<Megawatts>,
    /// Efficiency of the charging leg (energy retained per unit stored).
    pub efficiency_store: PerUnit,
    /// Efficiency of the discharging leg (energy retained per unit dispatched).
    pub efficiency_dispatch: PerUnit,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            id: StoreId(0),
            name: String::new(),
            bus: BusId(0),
            carrier: None,
            e_nom: MegawattHours(0.0),
            e_nom_extendable: false,
            e_min_pu: PerUnit(0.0),
            e_max_pu: PerUnit(1.0),
            standing_loss: PerUnit(0.0),
            marginal_cost: 0.0,
            capital_cost: 0.0,
            e_cyclic: true,
            state_of_charge_initial: MegawattHours(0.0),
            inflow: vec![Megawatts(0.0)],
            efficiency_store: PerUnit(1.0),
            efficiency_dispatch: PerUnit(1.0),
        }
    }
}

impl Store {
    /// Inflow at `snapshot`, broadcasting a single-element profile.
    pub fn inflow_at(&self, snapshot: usize) -> Megawatts {
        if self.inflow.len() == 1 {
            self.inflow[0]
        } else {
            self.inflow[snapshot]
        }
    }
}

/// Inelastic demand at a bus, one entry per snapshot (broadcast if length 1).
#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    pub p_set: Vec<Megawatts>,
}

impl Load {
    pub fn p_set_at(&self, snapshot: usize) -> Megawatts {
        if self.p_set.len() == 1 {
            self.p_set[0]
        } else {
            self.p_set[snapshot]
        }
    }
}

/// Enum to represent the different kinds of node in the graph.
#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Generator(Generator),
    StorageUnit(StorageUnit),
    Store(Store),
    Load(Load),
}

/// Enum to represent the different kinds of edge in the graph.
#[derive(Debug, Clone)]
pub enum Edge {
    Line(Line),
    Link(Link),
}

/// The core network graph: buses, generation, storage, and demand as nodes,
/// lines and links as edges, plus the global snapshot set and constraints
/// that scope an optimization run.
#[derive(Debug, Default, Clone)]
pub struct Network {
    pub graph: Graph<Node, Edge, Undirected>,
    pub carriers: HashMap<CarrierId, Carrier>,
    pub snapshots: Vec<Snapshot>,
    pub global_constraints: Vec<GlobalConstraint>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            carriers: HashMap::new(),
            snapshots: vec![Snapshot::new(0, 1.0)],
            global_constraints: Vec::new(),
        }
    }

    /// Compute basic statistics about the network.
    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();

        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Generator(g) => {
                    stats.num_generators += 1;
                    stats.total_generator_capacity_mw += g.p_nom.value();
                }
                Node::StorageUnit(_) => stats.num_storage_units += 1,
                Node::Store(_) => stats.num_stores += 1,
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.p_set_at(0).value();
                }
            }
        }

        for edge in self.graph.edge_weights() {
            match edge {
                Edge::Line(_) => stats.num_lines += 1,
                Edge::Link(_) => stats.num_links += 1,
            }
        }

        stats
    }

    /// Validate network data for issues that would make the model builder's
    /// job ill-posed. Populates the provided `Diagnostics` with warnings and
    /// errors; callers decide whether to abort on errors.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();

        if stats.num_buses == 0 {
            diag.add_error("structure", "Network has no buses");
            return;
        }

        if stats.total_load_mw.abs() < 1e-9 {
            diag.add_warning("structure", "Network has no load");
        }

        if stats.num_generators == 0 && stats.num_storage_units == 0 && stats.num_stores == 0 {
            diag.add_error("structure", "Network has no dispatchable component");
        }

        if stats.num_lines == 0 && stats.num_links == 0 && stats.num_buses > 1 {
            diag.add_error("structure", "Network has multiple buses but no lines or links");
        }

        if self.snapshots.is_empty() {
            diag.add_error("structure", "Network has no snapshots");
        }

        for node in self.graph.node_weights() {
            if let Node::Generator(g) = node {
                if g.committable {
                    diag.add_warning_with_entity(
                        "unsupported-feature",
                        "unit commitment is not modeled; generator dispatched as continuous",
                        &g.name,
                    );
                }
            }
        }
    }

    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    pub fn generators(&self) -> Vec<&Generator> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Generator(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn storage_units(&self) -> Vec<&StorageUnit> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::StorageUnit(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn stores(&self) -> Vec<&Store> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Store(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn lines(&self) -> Vec<&Line> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Line(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn links(&self) -> Vec<&Link> {
        self.graph
            .edge_weights()
            .filter_map(|e| match e {
                Edge::Link(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn generators_at_bus(&self, bus_id: BusId) -> Vec<&Generator> {
        self.generators()
            .into_iter()
            .filter(|g| g.bus == bus_id)
            .collect()
    }

    pub fn loads_at_bus(&self, bus_id: BusId) -> Vec<&Load> {
        self.loads().into_iter().filter(|l| l.bus == bus_id).collect()
    }

    pub fn total_load_mw(&self, snapshot: usize) -> f64 {
        self.loads().iter().map(|l| l.p_set_at(snapshot).value()).sum()
    }

    pub fn total_generator_capacity_mw(&self) -> f64 {
        self.generators()
            .iter()
            .map(|g| g.p_nom.value())
            .filter(|v| v.is_finite())
            .sum()
    }
}

/// Statistics about a network's size and capacity.
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_generators: usize,
    pub num_storage_units: usize,
    pub num_stores: usize,
    pub num_loads: usize,
    pub num_lines: usize,
    pub num_links: usize,
    pub total_load_mw: f64,
    pub total_generator_capacity_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} links, {} generators ({:.0} MW), {} loads ({:.0} MW)",
            self.num_buses,
            self.num_lines,
            self.num_links,
            self.num_generators,
            self.total_generator_capacity_mw,
            self.num_loads,
            self.total_load_mw
        )
    }
}

impl Node {
    /// Returns a human-readable label for the node.
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(bus) => &bus.name,
            Node::Generator(g) => &g.name,
            Node::StorageUnit(s) => &s.name,
            Node::Store(s) => &s.name,
            Node::Load(l) => &l.name,
        }
    }
}

impl Edge {
    /// Returns a human-readable label for the edge.
    pub fn label(&self) -> &str {
        match self {
            Edge::Line(line) => &line.name,
            Edge::Link(link) => &link.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus_network() -> (Network, NodeIndex, NodeIndex) {
        let mut network = Network::new();
        let bus1 = network.graph.add_node(Node::Bus(Bus {
            id: BusId(0),
            name: "Bus 1".to_string(),
            ..Bus::default()
        }));
        let bus2 = network.graph.add_node(Node::Bus(Bus {
            id: BusId(1),
            name: "Bus 2".to_string(),
            ..Bus::default()
        }));
        (network, bus1, bus2)
    }

    #[test]
    fn test_network_creation() {
        let (mut network, bus1, bus2) = two_bus_network();

        network.graph.add_edge(
            bus1,
            bus2,
            Edge::Line(Line::new(LineId(0), "Line 1-2".to_string(), BusId(0), BusId(1), 0.1)),
        );

        assert_eq!(network.graph.node_count(), 2);
        assert_eq!(network.graph.edge_count(), 1);

        if let Node::Bus(b) = network.graph[bus1].clone() {
            assert_eq!(b.name, "Bus 1");
        } else {
            panic!("Expected Bus node");
        }
    }

    #[test]
    fn test_network_validation_empty() {
        let network = Network::new();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("no buses")));
    }

    #[test]
    fn test_network_validation_no_load() {
        let (mut network, _bus1, _bus2) = two_bus_network();
        network.graph.add_node(Node::Generator(Generator::new(
            GeneratorId::new(1),
            "Gen 1".to_string(),
            BusId(0),
        )));

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.warnings().any(|i| i.message.contains("no load")));
    }

    #[test]
    fn test_committable_generator_warns() {
        let (mut network, _bus1, _bus2) = two_bus_network();
        let mut gen = Generator::new(GeneratorId::new(1), "Gen 1".to_string(), BusId(0));
        gen.committable = true;
        network.graph.add_node(Node::Generator(gen));
        network.graph.add_node(Node::Load(Load {
            id: LoadId::new(1),
            name: "Load 1".to_string(),
            bus: BusId(1),
            p_set: vec![Megawatts(10.0)],
        }));

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag
            .warnings()
            .any(|i| i.category == "unsupported-feature"));
    }

    #[test]
    fn test_network_stats() {
        let (mut network, bus1, bus2) = two_bus_network();
        let mut gen = Generator::new(GeneratorId::new(1), "Gen 1".to_string(), BusId(0));
        gen.p_nom = Megawatts(100.0);
        network.graph.add_node(Node::Generator(gen));
        network.graph.add_node(Node::Load(Load {
            id: LoadId::new(1),
            name: "Load 1".to_string(),
            bus: BusId(1),
            p_set: vec![Megawatts(50.0)],
        }));
        network.graph.add_edge(
            bus1,
            bus2,
            Edge::Line(Line::new(LineId(0), "Line 1-2".to_string(), BusId(0), BusId(1), 0.1)),
        );

        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_generators, 1);
        assert_eq!(stats.num_loads, 1);
        assert_eq!(stats.num_lines, 1);
        assert!((stats.total_load_mw - 50.0).abs() < 0.01);
        assert!((stats.total_generator_capacity_mw - 100.0).abs() < 0.01);

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_line_investment_builders() {
        let extendable = Line::new(LineId(1), "L1".into(), BusId(1), BusId(2), 0.2)
            .with_thermal_limit(100.0)
            .extendable(0.0, 500.0, 1200.0);
        assert!(extendable.s_nom_extendable);
        assert_eq!(extendable.s_nom_max.value(), 500.0);

        let candidate = Line::new(LineId(2), "L2".into(), BusId(1), BusId(3), 0.2).as_candidate();
        assert!(candidate.build_candidate);
        assert!(candidate.s_nom_extendable);
    }

    #[test]
    fn test_storage_unit_energy_capacity() {
        let storage = StorageUnit::new(StorageUnitId::new(1), "Battery".into(), BusId(1), 50.0, 4.0);
        assert_eq!(storage.energy_capacity().value(), 200.0);
    }

    #[test]
    fn test_storage_unit_inflow_broadcast() {
        let mut storage = StorageUnit::new(StorageUnitId::new(1), "Reservoir".into(), BusId(1), 50.0, 4.0);
        assert_eq!(storage.inflow_at(0).value(), 0.0);
        storage.inflow = vec![Megawatts(1.0), Megawatts(2.0), Megawatts(3.0)];
        assert_eq!(storage.inflow_at(2).value(), 3.0);
    }

    #[test]
    fn test_generator_availability_profile() {
        let gen = Generator::new(GeneratorId::new(1), "Wind".into(), BusId(1))
            .with_p_limits(0.0, 100.0)
            .with_availability_profile(vec![0.3, 0.8, 0.5]);
        assert_eq!(gen.p_max_pu_at(1).value(), 0.8);
        assert_eq!(gen.p_min_pu_at(0).value(), 0.0);
    }

    #[test]
    fn test_generators_and_loads_at_bus() {
        let (mut network, _bus1, _bus2) = two_bus_network();
        network.graph.add_node(Node::Generator(Generator::new(
            GeneratorId::new(1),
            "Gen1".into(),
            BusId(0),
        )));
        network.graph.add_node(Node::Generator(Generator::new(
            GeneratorId::new(2),
            "Gen2".into(),
            BusId(0),
        )));
        network.graph.add_node(Node::Load(Load {
            id: LoadId::new(1),
            name: "Load1".into(),
            bus: BusId(1),
            p_set: vec![Megawatts(10.0)],
        }));

        assert_eq!(network.generators_at_bus(BusId(0)).len(), 2);
        assert_eq!(network.loads_at_bus(BusId(1)).len(), 1);
        assert_eq!(network.loads_at_bus(BusId(0)).len(), 0);
    }
}
