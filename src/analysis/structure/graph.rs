//! Mutable graph reduced by the structure analyzer.

use std::{collections::BTreeMap, fmt::Write};

use crate::{
    analysis::cfg::ControlFlowGraph,
    utils::{
        escape_dot,
        graph::{
            algorithms::{postorder, Postorder},
            Address, GraphBase, Predecessors, RootedGraph, Successors,
        },
    },
    Error, Result,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct RegionNode {
    successors: Vec<Address>,
    predecessors: Vec<Address>,
}

/// A reducible view of a control flow graph.
///
/// Nodes start out as one per basic block and keep the address of that block as their
/// identity. The structure analyzer merges nodes by rewriting edges and removing the
/// nodes whose content it has folded into a region.
///
/// Successor lists keep insertion order, and rewrites keep the position of a redirected
/// edge, because the reduction rules tell the arms of a conditional apart by position.
/// Removing a node never rewires anything implicitly: incident edges must be removed
/// first.
///
/// # Examples
///
/// ```rust
/// use dsoscope::analysis::RegionGraph;
/// use dsoscope::utils::graph::Address;
///
/// let (a, b, c) = (Address::new(0), Address::new(4), Address::new(8));
/// let mut graph = RegionGraph::new(a);
/// graph.add_node(b);
/// graph.add_node(c);
/// graph.add_edge(a, b)?;
/// graph.add_edge(b, c)?;
///
/// // fold b into a
/// graph.remove_edge(a, b)?;
/// graph.transfer_successors(b, a)?;
/// graph.remove(b)?;
///
/// assert_eq!(graph.successors(a), &[c]);
/// assert_eq!(graph.node_count(), 2);
/// # Ok::<(), dsoscope::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionGraph {
    entry: Address,
    nodes: BTreeMap<Address, RegionNode>,
}

impl RegionGraph {
    /// Creates a graph holding only the entry node.
    #[must_use]
    pub fn new(entry: Address) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(entry, RegionNode::default());
        RegionGraph { entry, nodes }
    }

    /// Returns the entry node.
    #[must_use]
    pub fn entry(&self) -> Address {
        self.entry
    }

    /// Adds a node without edges. Adding an existing node has no effect.
    pub fn add_node(&mut self, node: Address) {
        self.nodes.entry(node).or_default();
    }

    /// Returns `true` if `node` is part of the graph.
    #[must_use]
    pub fn contains(&self, node: Address) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Returns `true` if the edge `from -> to` exists.
    #[must_use]
    pub fn contains_edge(&self, from: Address, to: Address) -> bool {
        self.successors(from).contains(&to)
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|node| node.successors.len()).sum()
    }

    /// Returns all nodes in address order.
    pub fn nodes(&self) -> impl Iterator<Item = Address> + '_ {
        self.nodes.keys().copied()
    }

    /// Returns the successors of `node` in insertion order.
    ///
    /// Unknown nodes have no successors.
    #[must_use]
    pub fn successors(&self, node: Address) -> &[Address] {
        self.nodes
            .get(&node)
            .map(|n| n.successors.as_slice())
            .unwrap_or_default()
    }

    /// Returns the predecessors of `node` in insertion order.
    #[must_use]
    pub fn predecessors(&self, node: Address) -> &[Address] {
        self.nodes
            .get(&node)
            .map(|n| n.predecessors.as_slice())
            .unwrap_or_default()
    }

    /// Returns the first successor of `node`.
    #[must_use]
    pub fn first_successor(&self, node: Address) -> Option<Address> {
        self.successors(node).first().copied()
    }

    /// Returns the successor of `node` if it has exactly one.
    #[must_use]
    pub fn sole_successor(&self, node: Address) -> Option<Address> {
        match self.successors(node) {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Adds the edge `from -> to`. Adding an existing edge has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if either end is not part of the graph.
    pub fn add_edge(&mut self, from: Address, to: Address) -> Result<()> {
        self.node(to)?;
        if self.contains_edge(from, to) {
            return Ok(());
        }

        self.node_mut(from)?.successors.push(to);
        self.node_mut(to)?.predecessors.push(from);
        Ok(())
    }

    /// Removes the edge `from -> to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EdgeNotFound`] if the edge does not exist.
    pub fn remove_edge(&mut self, from: Address, to: Address) -> Result<()> {
        if !self.contains_edge(from, to) {
            return Err(Error::EdgeNotFound { from, to });
        }

        self.node_mut(from)?.successors.retain(|&s| s != to);
        self.node_mut(to)?.predecessors.retain(|&p| p != from);
        Ok(())
    }

    /// Removes a node that no longer has any incident edges.
    ///
    /// # Errors
    ///
    /// - [`Error::NodeNotFound`] if `node` is not part of the graph
    /// - [`Error::DanglingEdges`] if edges still reference `node`
    /// - [`Error::GraphError`] if `node` is the entry
    pub fn remove(&mut self, node: Address) -> Result<()> {
        let entry = self.node(node)?;
        if !entry.successors.is_empty() || !entry.predecessors.is_empty() {
            return Err(Error::DanglingEdges(node));
        }
        if node == self.entry {
            return Err(Error::GraphError(format!(
                "Cannot remove entry node {node}"
            )));
        }

        self.nodes.remove(&node);
        Ok(())
    }

    /// Redirects every edge that targets `old` onto `new`.
    ///
    /// Each redirected edge keeps its position in its source's successor list. If a
    /// source already has an edge to `new`, the edge to `old` is dropped instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if either node is not part of the graph.
    pub fn replace_successors(&mut self, old: Address, new: Address) -> Result<()> {
        self.node(new)?;
        if old == new {
            self.node(old)?;
            return Ok(());
        }

        let sources = std::mem::take(&mut self.node_mut(old)?.predecessors);
        for source in sources {
            let already_linked = self.contains_edge(source, new);
            let successors = &mut self.node_mut(source)?.successors;
            if already_linked {
                successors.retain(|&s| s != old);
            } else {
                for succ in successors.iter_mut().filter(|s| **s == old) {
                    *succ = new;
                }
                self.node_mut(new)?.predecessors.push(source);
            }
        }
        Ok(())
    }

    /// Moves all outgoing edges of `from` onto `to`, in order.
    ///
    /// Used when `from` is folded into `to`: afterwards `to` continues wherever `from`
    /// did and `from` has no successors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if either node is not part of the graph.
    pub fn transfer_successors(&mut self, from: Address, to: Address) -> Result<()> {
        self.node(to)?;
        let targets = self.successors(from).to_vec();
        self.node(from)?;

        for target in targets {
            self.remove_edge(from, target)?;
            let target = if target == from { to } else { target };
            self.add_edge(to, target)?;
        }
        Ok(())
    }

    /// Returns a lazy postorder traversal from the entry.
    ///
    /// The traversal borrows the graph; collect it before mutating.
    pub fn postorder(&self) -> Postorder<'_, Self> {
        postorder(self, self.entry)
    }

    /// Generates a DOT representation of the graph for Graphviz.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph Regions {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"Regions: {}\";", escape_dot(name));
        }
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");

        for &addr in self.nodes.keys() {
            let style = if addr == self.entry {
                ", style=filled, fillcolor=lightgreen"
            } else {
                ""
            };
            let _ = writeln!(dot, "    R{addr} [label=\"region_{addr}\"{style}];");
        }
        for (&addr, node) in &self.nodes {
            for (i, succ) in node.successors.iter().enumerate() {
                let _ = writeln!(dot, "    R{addr} -> R{succ} [label=\"{i}\"];");
            }
        }

        dot.push_str("}\n");
        dot
    }

    fn node(&self, addr: Address) -> Result<&RegionNode> {
        self.nodes.get(&addr).ok_or(Error::NodeNotFound(addr))
    }

    fn node_mut(&mut self, addr: Address) -> Result<&mut RegionNode> {
        self.nodes.get_mut(&addr).ok_or(Error::NodeNotFound(addr))
    }
}

impl From<&ControlFlowGraph<'_>> for RegionGraph {
    fn from(cfg: &ControlFlowGraph<'_>) -> Self {
        let nodes = cfg
            .blocks()
            .map(|block| {
                let addr = block.addr();
                let node = RegionNode {
                    successors: cfg.successors(addr).collect(),
                    predecessors: cfg.predecessors(addr).collect(),
                };
                (addr, node)
            })
            .collect();

        RegionGraph {
            entry: cfg.entry(),
            nodes,
        }
    }
}

impl GraphBase for RegionGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = Address> {
        self.nodes.keys().copied()
    }
}

impl Successors for RegionGraph {
    fn successors(&self, node: Address) -> impl Iterator<Item = Address> {
        RegionGraph::successors(self, node).iter().copied()
    }
}

impl Predecessors for RegionGraph {
    fn predecessors(&self, node: Address) -> impl Iterator<Item = Address> {
        RegionGraph::predecessors(self, node).iter().copied()
    }
}

impl RootedGraph for RegionGraph {
    fn entry(&self) -> Address {
        self.entry
    }
}
