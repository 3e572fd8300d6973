//! Trait definitions for graph abstractions.
//!
//! The structuring core works on two different graphs: the immutable control flow graph
//! produced from the instruction stream, and the mutable region graph that is reduced
//! during structuring. Dominators and traversals are written once against these traits
//! and run on both.
//!
//! # Architecture
//!
//! - [`GraphBase`] - Core properties: node count and node iteration
//! - [`Successors`] - Forward edge traversal (outgoing edges)
//! - [`Predecessors`] - Backward edge traversal (incoming edges)
//! - [`RootedGraph`] - Graphs with a designated entry node (for dominator computation)
//!
//! Nodes are identified by the [`Address`] of the block they stand for. Adjacency
//! queries return iterators and must yield nodes in a stable order; the structuring
//! rules distinguish a conditional's arms by position.

use crate::utils::graph::Address;

/// Core graph properties shared by all graph types.
pub trait GraphBase {
    /// Returns the number of live nodes.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all live nodes.
    fn node_ids(&self) -> impl Iterator<Item = Address>;
}

/// Forward adjacency.
pub trait Successors: GraphBase {
    /// Returns the successors of `node` in edge-insertion order.
    fn successors(&self, node: Address) -> impl Iterator<Item = Address>;
}

/// Backward adjacency.
pub trait Predecessors: GraphBase {
    /// Returns the predecessors of `node`.
    fn predecessors(&self, node: Address) -> impl Iterator<Item = Address>;
}

/// A graph with a single distinguished entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// Returns the entry node.
    fn entry(&self) -> Address;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestGraph;

    #[test]
    fn test_graph_base() {
        let graph = TestGraph::new(0, &[(0, 1), (1, 2)]);
        assert_eq!(graph.node_count(), 3);

        let ids: Vec<Address> = graph.node_ids().collect();
        assert_eq!(ids, vec![Address::new(0), Address::new(1), Address::new(2)]);
    }

    #[test]
    fn test_successors_keep_insertion_order() {
        let graph = TestGraph::new(0, &[(0, 9), (0, 3), (3, 9)]);

        let succ: Vec<Address> = graph.successors(Address::new(0)).collect();
        assert_eq!(succ, vec![Address::new(9), Address::new(3)]);

        let succ: Vec<Address> = graph.successors(Address::new(9)).collect();
        assert!(succ.is_empty());
    }

    #[test]
    fn test_predecessors() {
        let graph = TestGraph::new(0, &[(0, 2), (1, 2), (0, 1)]);

        let pred: Vec<Address> = graph.predecessors(Address::new(2)).collect();
        assert_eq!(pred.len(), 2);
        assert!(pred.contains(&Address::new(0)));
        assert!(pred.contains(&Address::new(1)));

        assert_eq!(graph.predecessors(Address::new(0)).count(), 0);
    }

    #[test]
    fn test_rooted_graph() {
        let graph = TestGraph::new(4, &[(4, 8)]);
        assert_eq!(graph.entry(), Address::new(4));
    }
}
