//! Fundamental cycle basis over the line graph, used by the
//! `kirchhoff_linear` flow formulation: one voltage-law constraint per
//! independent cycle, instead of one angle variable per bus.
//!
//! A spanning forest is grown by breadth-first search; every line not used
//! by the forest closes exactly one fundamental cycle with the tree path
//! between its two endpoints. This produces `|lines| - |buses| + |components|`
//! cycles, matching the cyclomatic number of the line graph.

use gridplan_core::{BusId, Edge, LineId, Network, Node, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CycleBasisError {
    #[error("No buses found in network")]
    NoBuses,
}

/// Index into a [`CycleBasis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(usize);

impl CycleId {
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Traversal direction of a line relative to its own `bus0 -> bus1` sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Traversed from `bus0` to `bus1`.
    Forward,
    /// Traversed from `bus1` to `bus0`.
    Reverse,
}

impl Direction {
    /// Sign to apply to the line's flow when summing around the cycle.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }
}

/// The fundamental cycle basis of a network's line graph.
#[derive(Debug, Clone, Default)]
pub struct CycleBasis {
    cycles: Vec<Vec<(LineId, Direction)>>,
}

impl CycleBasis {
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn get(&self, id: CycleId) -> &[(LineId, Direction)] {
        &self.cycles[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (CycleId, &[(LineId, Direction)])> {
        self.cycles
            .iter()
            .enumerate()
            .map(|(i, c)| (CycleId(i), c.as_slice()))
    }

    /// Compute the fundamental cycle basis via a BFS spanning forest over
    /// every bus and every line (including unbuilt investment candidates;
    /// the model builder decides how to gate a candidate line's contribution
    /// to a cycle constraint).
    pub fn from_network(network: &Network) -> Result<Self, CycleBasisError> {
        let mut bus_of_node: HashMap<NodeIndex, BusId> = HashMap::new();
        for node_idx in network.graph.node_indices() {
            if let Node::Bus(bus) = &network.graph[node_idx] {
                bus_of_node.insert(node_idx, bus.id);
            }
        }
        if bus_of_node.is_empty() {
            return Err(CycleBasisError::NoBuses);
        }

        let mut visited: HashMap<NodeIndex, bool> = bus_of_node.keys().map(|&n| (n, false)).collect();
        let mut parent: HashMap<NodeIndex, (NodeIndex, petgraph::graph::EdgeIndex)> = HashMap::new();
        let mut tree_edges: HashMap<petgraph::graph::EdgeIndex, ()> = HashMap::new();
        let mut cycles = Vec::new();
        let mut processed_back_edges: HashMap<petgraph::graph::EdgeIndex, ()> = HashMap::new();

        let bus_nodes: Vec<NodeIndex> = bus_of_node.keys().copied().collect();

        for &root in &bus_nodes {
            if visited[&root] {
                continue;
            }
            visited.insert(root, true);
            let mut queue = VecDeque::new();
            queue.push_back(root);

            while let Some(current) = queue.pop_front() {
                for edge_ref in network.graph.edges(current) {
                    if !matches!(edge_ref.weight(), Edge::Line(_)) {
                        continue;
                    }
                    let edge_idx = edge_ref.id();
                    let neighbor = if edge_ref.source() == current {
                        edge_ref.target()
                    } else {
                        edge_ref.source()
                    };
                    if neighbor == current {
                        continue; // self-loop, ignore
                    }

                    if !visited[&neighbor] {
                        visited.insert(neighbor, true);
                        parent.insert(neighbor, (current, edge_idx));
                        tree_edges.insert(edge_idx, ());
                        queue.push_back(neighbor);
                    } else if !tree_edges.contains_key(&edge_idx)
                        && !processed_back_edges.contains_key(&edge_idx)
                    {
                        processed_back_edges.insert(edge_idx, ());
                        if let Some(cycle) =
                            Self::close_cycle(network, &parent, &bus_of_node, current, neighbor, edge_idx)
                        {
                            // A 2-cycle is two parallel lines between the same
                            // bus pair; their flows are already individually
                            // bounded, so the loop constraint would be
                            // redundant (and for a self-pair, ill-formed).
                            if cycle.len() > 2 {
                                cycles.push(cycle);
                            }
                        }
                    }
                }
            }
        }

        Ok(Self { cycles })
    }

    fn path_to_root(
        node: NodeIndex,
        parent: &HashMap<NodeIndex, (NodeIndex, petgraph::graph::EdgeIndex)>,
    ) -> (Vec<NodeIndex>, Vec<petgraph::graph::EdgeIndex>) {
        let mut nodes = vec![node];
        let mut edges = Vec::new();
        let mut current = node;
        while let Some(&(p, e)) = parent.get(&current) {
            edges.push(e);
            nodes.push(p);
            current = p;
        }
        (nodes, edges)
    }

    fn line_direction(
        network: &Network,
        edge_idx: petgraph::graph::EdgeIndex,
        from_node: NodeIndex,
        bus_of_node: &HashMap<NodeIndex, BusId>,
    ) -> (LineId, Direction) {
        let line = match &network.graph[edge_idx] {
            Edge::Line(l) => l,
            _ => unreachable!("cycle edges are always lines"),
        };
        let from_bus = bus_of_node[&from_node];
        let direction = if from_bus == line.bus0 {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        (line.id, direction)
    }

    fn close_cycle(
        network: &Network,
        parent: &HashMap<NodeIndex, (NodeIndex, petgraph::graph::EdgeIndex)>,
        bus_of_node: &HashMap<NodeIndex, BusId>,
        u: NodeIndex,
        v: NodeIndex,
        back_edge: petgraph::graph::EdgeIndex,
    ) -> Option<Vec<(LineId, Direction)>> {
        let (nodes_u, edges_u) = Self::path_to_root(u, parent);
        let (nodes_v, edges_v) = Self::path_to_root(v, parent);

        let pos_u: HashMap<NodeIndex, usize> =
            nodes_u.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let (idx_u, idx_v) = nodes_v
            .iter()
            .enumerate()
            .find_map(|(iv, &n)| pos_u.get(&n).map(|&iu| (iu, iv)))?;

        let mut cycle = Vec::new();

        // u -> LCA, walking up (child -> parent)
        for k in 0..idx_u {
            cycle.push(Self::line_direction(network, edges_u[k], nodes_u[k], bus_of_node));
        }

        // LCA -> v, walking down (parent -> child), i.e. reverse of v's up-path
        for k in (0..idx_v).rev() {
            cycle.push(Self::line_direction(network, edges_v[k], nodes_v[k + 1], bus_of_node));
        }

        // close the loop: v -> u via the back edge
        cycle.push(Self::line_direction(network, back_edge, v, bus_of_node));

        Some(cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::susceptance::tests::create_3bus_network;
    use gridplan_core::{Bus, Line};

    #[test]
    fn test_triangle_has_one_cycle() {
        let network = create_3bus_network();
        let basis = CycleBasis::from_network(&network).unwrap();
        assert_eq!(basis.len(), 1);
    }

    #[test]
    fn test_cycle_sums_to_zero_with_unit_reactances() {
        let network = create_3bus_network();
        let basis = CycleBasis::from_network(&network).unwrap();
        let (_, cycle) = basis.iter().next().unwrap();
        assert_eq!(cycle.len(), 3);
        let forward_count = cycle.iter().filter(|(_, d)| *d == Direction::Forward).count();
        assert!(forward_count >= 1);
    }

    #[test]
    fn test_tree_network_has_no_cycles() {
        let mut network = Network::new();
        let b1 = network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(1),
            name: "Bus1".into(),
            ..Default::default()
        }));
        let b2 = network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(2),
            name: "Bus2".into(),
            ..Default::default()
        }));
        let b3 = network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(3),
            name: "Bus3".into(),
            ..Default::default()
        }));
        network.graph.add_edge(
            b1,
            b2,
            Edge::Line(Line::new(LineId::new(1), "L1".into(), BusId::new(1), BusId::new(2), 0.1)),
        );
        network.graph.add_edge(
            b2,
            b3,
            Edge::Line(Line::new(LineId::new(2), "L2".into(), BusId::new(2), BusId::new(3), 0.1)),
        );

        let basis = CycleBasis::from_network(&network).unwrap();
        assert!(basis.is_empty());
    }

    #[test]
    fn test_parallel_lines_do_not_form_a_two_cycle() {
        let mut network = Network::new();
        let b1 = network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(1),
            name: "Bus1".into(),
            ..Default::default()
        }));
        let b2 = network.graph.add_node(Node::Bus(Bus {
            id: BusId::new(2),
            name: "Bus2".into(),
            ..Default::default()
        }));
        network.graph.add_edge(
            b1,
            b2,
            Edge::Line(Line::new(LineId::new(1), "L1".into(), BusId::new(1), BusId::new(2), 0.1)),
        );
        network.graph.add_edge(
            b1,
            b2,
            Edge::Line(Line::new(LineId::new(2), "L2".into(), BusId::new(1), BusId::new(2), 0.2)),
        );

        let basis = CycleBasis::from_network(&network).unwrap();
        assert!(basis.is_empty(), "parallel lines should not produce a 2-cycle");
    }
}
