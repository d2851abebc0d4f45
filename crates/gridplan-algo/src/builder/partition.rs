//! Fixed/extendable partitioning, computed once per build and consumed by
//! every later stage so the same asset always lands at the same row.
//!
//! Grounded on the stable index-assignment convention already implicit in
//! the teacher's DC-OPF bus indexing (`build_bus_index_map`), generalized
//! into a single pass per asset kind: fixed assets first, extendable second,
//! each producing a `Vec<Id>` other stages iterate in order.

use gridplan_core::{GeneratorId, LineId, LinkId, Network, StorageUnitId, StoreId};

#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub generators_fixed: Vec<GeneratorId>,
    pub generators_extendable: Vec<GeneratorId>,
    pub lines_fixed: Vec<LineId>,
    pub lines_extendable: Vec<LineId>,
    pub links_fixed: Vec<LinkId>,
    pub links_extendable: Vec<LinkId>,
    pub storage_units_fixed: Vec<StorageUnitId>,
    pub storage_units_extendable: Vec<StorageUnitId>,
    pub stores_fixed: Vec<StoreId>,
    pub stores_extendable: Vec<StoreId>,
}

impl Partition {
    pub fn from_network(network: &Network) -> Self {
        let mut p = Partition::default();

        for g in network.generators() {
            if g.p_nom_extendable {
                p.generators_extendable.push(g.id);
            } else {
                p.generators_fixed.push(g.id);
            }
        }

        for l in network.lines() {
            if l.s_nom_extendable {
                p.lines_extendable.push(l.id);
            } else {
                p.lines_fixed.push(l.id);
            }
        }

        for lk in network.links() {
            if lk.p_nom_extendable {
                p.links_extendable.push(lk.id);
            } else {
                p.links_fixed.push(lk.id);
            }
        }

        for su in network.storage_units() {
            if su.p_nom_extendable {
                p.storage_units_extendable.push(su.id);
            } else {
                p.storage_units_fixed.push(su.id);
            }
        }

        for st in network.stores() {
            if st.e_nom_extendable {
                p.stores_extendable.push(st.id);
            } else {
                p.stores_fixed.push(st.id);
            }
        }

        p
    }

    pub fn all_generators(&self) -> impl Iterator<Item = &GeneratorId> {
        self.generators_fixed.iter().chain(self.generators_extendable.iter())
    }

    pub fn all_lines(&self) -> impl Iterator<Item = &LineId> {
        self.lines_fixed.iter().chain(self.lines_extendable.iter())
    }

    pub fn all_links(&self) -> impl Iterator<Item = &LinkId> {
        self.links_fixed.iter().chain(self.links_extendable.iter())
    }

    pub fn all_storage_units(&self) -> impl Iterator<Item = &StorageUnitId> {
        self.storage_units_fixed.iter().chain(self.storage_units_extendable.iter())
    }

    pub fn all_stores(&self) -> impl Iterator<Item = &StoreId> {
        self.stores_fixed.iter().chain(self.stores_extendable.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridplan_core::{BusId, Generator, Line, Network, Node};

    #[test]
    fn partitions_fixed_before_extendable() {
        let mut network = Network::new();
        network.graph.add_node(Node::Generator(
            Generator::new(GeneratorId::new(1), "fixed".into(), BusId::new(1)),
        ));
        network.graph.add_node(Node::Generator(
            Generator::new(GeneratorId::new(2), "ext".into(), BusId::new(1)).extendable(0.0, 100.0, 5.0),
        ));

        let partition = Partition::from_network(&network);
        assert_eq!(partition.generators_fixed, vec![GeneratorId::new(1)]);
        assert_eq!(partition.generators_extendable, vec![GeneratorId::new(2)]);
        assert_eq!(partition.all_generators().count(), 2);
    }

    #[test]
    fn line_partitioning_matches_extendable_flag() {
        let mut network = Network::new();
        network.graph.add_node(Node::Generator(
            Generator::new(GeneratorId::new(1), "g".into(), BusId::new(1)),
        ));
        let _ = Line::new(LineId::new(1), "L".into(), BusId::new(1), BusId::new(2), 0.1);
        let partition = Partition::from_network(&network);
        assert!(partition.lines_fixed.is_empty());
        assert!(partition.lines_extendable.is_empty());
    }
}
