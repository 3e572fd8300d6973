//! Graph traversal algorithms.
//!
//! The structuring loop walks the region graph in postorder so that inner regions are
//! reduced before the regions that contain them, and the dominator computation
//! iterates in reverse postorder.
//!
//! # Algorithms
//!
//! - [`postorder`] - Lazy depth-first search with post-order visitation
//! - [`reverse_postorder`] - Reverse post-order (useful for forward data flow)
//!
//! Both follow successors in the order the graph reports them and mark nodes as
//! visited on first discovery, so graphs with cycles are traversed in finite time and
//! in a deterministic order.

use rustc_hash::FxHashSet;

use crate::utils::graph::{Address, Successors};

/// Post-order iterator over the nodes reachable from a start node.
///
/// The traversal is computed lazily with an explicit stack, so deep graphs do not
/// recurse. A node is yielded once all of its successors that were still unvisited when
/// it was entered have been yielded. Back edges are ignored through visited-marking.
///
/// The iterator borrows the graph; to traverse a graph that is mutated between steps,
/// collect the order first. Calling [`postorder`] again restarts the traversal on the
/// current graph.
///
/// # Examples
///
/// ```rust
/// use dsoscope::analysis::ControlFlowGraph;
/// use dsoscope::disassembler::Assembler;
/// use dsoscope::utils::graph::{algorithms::postorder, Address};
///
/// let mut asm = Assembler::new();
/// asm.load_immed(1).jmp_if_not("end").load_immed(2).label("end").ret(false);
/// let instructions = asm.finish()?;
/// let cfg = ControlFlowGraph::build(&instructions)?;
///
/// let order: Vec<Address> = postorder(&cfg, cfg.entry()).collect();
/// assert_eq!(order.last(), Some(&cfg.entry()));
/// # Ok::<(), dsoscope::Error>(())
/// ```
pub struct Postorder<'g, G: Successors> {
    graph: &'g G,
    visited: FxHashSet<Address>,
    stack: Vec<(Address, std::vec::IntoIter<Address>)>,
}

impl<'g, G: Successors> Postorder<'g, G> {
    fn new(graph: &'g G, start: Address) -> Self {
        let mut visited = FxHashSet::default();
        let mut stack = Vec::new();

        if graph.node_ids().any(|node| node == start) {
            visited.insert(start);
            let successors: Vec<Address> = graph.successors(start).collect();
            stack.push((start, successors.into_iter()));
        }

        Postorder {
            graph,
            visited,
            stack,
        }
    }
}

impl<G: Successors> Iterator for Postorder<'_, G> {
    type Item = Address;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let child = {
                let (_, successors) = self.stack.last_mut()?;
                successors.find(|succ| !self.visited.contains(succ))
            };

            match child {
                Some(child) => {
                    self.visited.insert(child);
                    let successors: Vec<Address> = self.graph.successors(child).collect();
                    self.stack.push((child, successors.into_iter()));
                }
                None => {
                    let (node, _) = self.stack.pop()?;
                    return Some(node);
                }
            }
        }
    }
}

/// Returns a lazy postorder traversal of the nodes reachable from `start`.
///
/// In postorder, a node is visited after all its descendants have been visited.
/// Returns an empty traversal if `start` is not a node of the graph.
///
/// # Complexity
///
/// - Time: O(V + E)
/// - Space: O(V)
pub fn postorder<G: Successors>(graph: &G, start: Address) -> Postorder<'_, G> {
    Postorder::new(graph, start)
}

/// Computes the reverse postorder traversal of nodes reachable from the start.
///
/// Every node appears before its successors, except along back edges.
#[must_use]
pub fn reverse_postorder<G: Successors>(graph: &G, start: Address) -> Vec<Address> {
    let mut order: Vec<Address> = postorder(graph, start).collect();
    order.reverse();
    order
}
