//! Dominator tree computation.
//!
//! A node `d` dominates a node `n` if every path from the entry node to `n` must go
//! through `d`. The immediate dominator of `n` is the unique strict dominator of `n`
//! that is dominated by every other strict dominator of `n`; linking every node to its
//! immediate dominator yields the dominator tree.
//!
//! The structuring core uses dominance to recognise back edges: an edge `p -> h` closes a
//! loop when `h` dominates `p`.
//!
//! # Algorithm
//!
//! This implementation uses the iterative algorithm of Cooper, Harvey and Kennedy: nodes
//! are visited in reverse postorder and each immediate dominator is refined by
//! intersecting the dominator chains of the already processed predecessors until nothing
//! changes. For the small, mostly reducible graphs of script functions this converges in
//! two or three sweeps and needs no auxiliary forest.

use rustc_hash::FxHashMap;

use crate::{
    utils::graph::{algorithms::reverse_postorder, Address, RootedGraph},
    Error, Result,
};

/// Result of dominator tree computation.
///
/// The dominator tree is a snapshot: it answers queries about the graph it was built
/// from and must be rebuilt after the graph's edge set changes.
///
/// # Examples
///
/// ```rust
/// use dsoscope::analysis::ControlFlowGraph;
/// use dsoscope::disassembler::Assembler;
/// use dsoscope::utils::graph::algorithms::DominatorTree;
///
/// // if (x) { y = 1; } return;
/// let mut asm = Assembler::new();
/// asm.load_var("$x")
///     .jmp_if_not("end")
///     .load_immed(1)
///     .save_var("$y")
///     .label("end")
///     .ret(false);
/// let instructions = asm.finish()?;
/// let cfg = ControlFlowGraph::build(&instructions)?;
///
/// let dom = DominatorTree::build(&cfg)?;
/// for block in cfg.blocks() {
///     assert!(dom.dominates(cfg.entry(), block.addr(), false));
/// }
/// # Ok::<(), dsoscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The entry (root) node of the dominator tree
    entry: Address,
    /// Immediate dominator of every node; the entry maps to itself
    idom: FxHashMap<Address, Address>,
    /// Reverse postorder the tree was computed in
    order: Vec<Address>,
}

impl DominatorTree {
    /// Computes the dominator tree of `graph`.
    ///
    /// Self-loops and duplicate edges do not affect the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if the entry is not a node of the graph, and
    /// [`Error::UnreachableNode`] for the first node (in `node_ids` order) that cannot be
    /// reached from the entry.
    ///
    /// # Complexity
    ///
    /// - Time: O(V + E) per sweep, with a small number of sweeps on reducible graphs
    /// - Space: O(V)
    pub fn build<G: RootedGraph>(graph: &G) -> Result<Self> {
        let entry = graph.entry();
        let order = reverse_postorder(graph, entry);
        if order.is_empty() {
            return Err(Error::NodeNotFound(entry));
        }

        let index: FxHashMap<Address, usize> = order
            .iter()
            .copied()
            .enumerate()
            .map(|(i, node)| (node, i))
            .collect();

        if let Some(node) = graph.node_ids().find(|node| !index.contains_key(node)) {
            return Err(Error::UnreachableNode(node));
        }

        // Indices into `order`; the entry is always at index 0.
        let mut idom: Vec<Option<usize>> = vec![None; order.len()];
        idom[0] = Some(0);

        let mut changed = true;
        while changed {
            changed = false;

            for (i, &node) in order.iter().enumerate().skip(1) {
                let mut new_idom: Option<usize> = None;

                for pred in graph.predecessors(node) {
                    let Some(&p) = index.get(&pred) else {
                        continue;
                    };
                    if idom[p].is_none() {
                        continue;
                    }

                    new_idom = Some(match new_idom {
                        None => p,
                        Some(current) => intersect(&idom, p, current),
                    });
                }

                if new_idom.is_some() && idom[i] != new_idom {
                    idom[i] = new_idom;
                    changed = true;
                }
            }
        }

        let idom = order
            .iter()
            .enumerate()
            .filter_map(|(i, &node)| idom[i].map(|d| (node, order[d])))
            .collect();

        Ok(DominatorTree { entry, idom, order })
    }

    /// Returns the entry (root) node of the dominator tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> Address {
        self.entry
    }

    /// Returns `true` if `node` was part of the graph the tree was built from.
    #[must_use]
    pub fn contains(&self, node: Address) -> bool {
        self.idom.contains_key(&node)
    }

    /// Returns the immediate dominator of a node, or `None` for the entry node and for
    /// nodes that are not part of the tree.
    #[must_use]
    pub fn immediate_dominator(&self, node: Address) -> Option<Address> {
        if node == self.entry {
            return None;
        }
        self.idom.get(&node).copied()
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// A node dominates itself unless `strict` is set, so `dominates(a, a, true)` is
    /// always `false` and `dominates(a, a, false)` is `true` for every node of the tree.
    ///
    /// # Complexity
    ///
    /// O(depth) where depth is the depth of `b` in the dominator tree.
    #[must_use]
    pub fn dominates(&self, a: Address, b: Address, strict: bool) -> bool {
        if strict && a == b {
            return false;
        }
        self.dominators(b).any(|d| d == a)
    }

    /// Checks if node `a` strictly dominates node `b`.
    #[must_use]
    pub fn strictly_dominates(&self, a: Address, b: Address) -> bool {
        self.dominates(a, b, true)
    }

    /// Returns an iterator over all dominators of a node, from the node itself
    /// up to (and including) the entry node.
    ///
    /// The iterator is empty for nodes that are not part of the tree.
    pub fn dominators(&self, node: Address) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: self.contains(node).then_some(node),
        }
    }

    /// Returns the depth of a node in the dominator tree.
    ///
    /// The entry node has depth 0.
    #[must_use]
    pub fn depth(&self, node: Address) -> usize {
        self.dominators(node).count().saturating_sub(1)
    }

    /// Returns all children of a node in the dominator tree, in reverse postorder.
    ///
    /// # Complexity
    ///
    /// O(V) where V is the number of nodes.
    #[must_use]
    pub fn children(&self, node: Address) -> Vec<Address> {
        self.order
            .iter()
            .copied()
            .filter(|&n| n != self.entry && self.idom.get(&n) == Some(&node))
            .collect()
    }

    /// Returns the number of nodes in the dominator tree.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.order.len()
    }
}

fn intersect(idom: &[Option<usize>], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while a > b {
            a = idom[a].unwrap_or(0);
        }
        while b > a {
            b = idom[b].unwrap_or(0);
        }
    }
    a
}

/// Iterator over dominators of a node, from the node up to the entry.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<Address>,
}

impl Iterator for DominatorIterator<'_> {
    type Item = Address;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;

        self.current = if current == self.tree.entry {
            None
        } else {
            self.tree.idom.get(&current).copied()
        };
        Some(current)
    }
}
