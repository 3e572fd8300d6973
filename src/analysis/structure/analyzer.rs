//! The fixed-point reduction driver.
//!
//! [`StructureAnalyzer`] repeatedly walks the region graph in postorder and folds
//! recognizable shapes into [`VirtualRegion`]s until a single node is left. Each fold
//! consumes the regions of the folded nodes and records the result under the address
//! of the surviving node, so the memo table always holds exactly one region per live
//! node that has absorbed something.
//!
//! # Reductions
//!
//! | Shape | Condition | Result |
//! |-------|-----------|--------|
//! | `n -> m` | `m` has no other predecessor | `Seq[n, m]` |
//! | `n -> {t, e}`, `t -> e` | `t` only reached from `n` | `If(n, t)`, `n -> e` |
//! | `n -> {t, e}`, `t -> j`, `e -> j` | arms only reached from `n` | `If(n, t, e)`, `n -> j` |
//! | `n -> {t, e}`, `t` returns | `t` only reached from `n` | `If(n, t)`, `n -> e` |
//! | `n -> {t, e}`, both return | arms only reached from `n` | `If(n, t, e)` |
//! | `n -> {t, e}`, `e` returns | arms only reached from `n` | `If(n, t, e)`, `n` takes over `t`'s successors |
//! | `n -> n` | self-loop | `Loop[n]` |
//! | `n -> s -> n` | `s` only connected to `n` | `Loop[n, s]` |
//!
//! Loop shapes are only tried on loop headers, and only when
//! [`StructureConfig::structure_loops`] is set.

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::{
    analysis::{
        cfg::ControlFlowGraph,
        structure::{RegionGraph, StructureConfig, VirtualRegion},
    },
    disassembler::Instruction,
    utils::graph::{algorithms::DominatorTree, Address},
    Error, Result,
};

/// Reduces the control flow graph of one function into a [`VirtualRegion`] tree.
///
/// The analyzer owns all mutable state of a structuring run: the region graph, the memo
/// table of regions built so far, and a dominator tree that is rebuilt on demand after
/// the graph changes. Independent functions can be structured concurrently by giving
/// each its own analyzer.
///
/// # Examples
///
/// ```rust
/// use dsoscope::analysis::{ControlFlowGraph, StructureAnalyzer, StructureConfig};
/// use dsoscope::disassembler::Assembler;
///
/// let mut asm = Assembler::new();
/// asm.load_var("%c")
///     .jmp_if_not("join")
///     .load_immed(1)
///     .save_var("%x")
///     .label("join")
///     .ret(false);
/// let instructions = asm.finish()?;
/// let cfg = ControlFlowGraph::build(&instructions)?;
///
/// let region = StructureAnalyzer::new(&cfg, StructureConfig::default()).analyze()?;
/// assert_eq!(region.leaf_count(), 3);
/// # Ok::<(), dsoscope::Error>(())
/// ```
pub struct StructureAnalyzer<'a> {
    graph: RegionGraph,
    blocks: FxHashMap<Address, &'a [Instruction]>,
    regions: FxHashMap<Address, VirtualRegion<'a>>,
    dominators: Option<DominatorTree>,
    config: StructureConfig,
    passes: usize,
    reductions: usize,
}

impl<'a> StructureAnalyzer<'a> {
    /// Prepares the structuring of `cfg`.
    #[must_use]
    pub fn new(cfg: &ControlFlowGraph<'a>, config: StructureConfig) -> Self {
        let blocks = cfg
            .blocks()
            .map(|block| (block.addr(), block.instructions()))
            .collect();

        StructureAnalyzer {
            graph: RegionGraph::from(cfg),
            blocks,
            regions: FxHashMap::default(),
            dominators: None,
            config,
            passes: 0,
            reductions: 0,
        }
    }

    /// Runs the reduction to completion and returns the structured function.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedBranching`] for a node with more than two successors
    /// - [`Error::InvalidConditional`] for an else-arm that jumps into its then-arm
    /// - [`Error::NonTerminatingStructure`] if the graph cannot be reduced further or the
    ///   configured pass limit is reached
    pub fn analyze(mut self) -> Result<VirtualRegion<'a>> {
        self.run()?;
        self.into_region()
    }

    /// Runs passes until the graph is fully reduced.
    ///
    /// # Errors
    ///
    /// See [`StructureAnalyzer::analyze`].
    pub fn run(&mut self) -> Result<()> {
        while !self.is_done() {
            if self
                .config
                .max_passes
                .is_some_and(|limit| self.passes >= limit)
            {
                return Err(self.stuck());
            }

            if self.pass()? == 0 && !self.is_done() {
                return Err(self.stuck());
            }
        }
        Ok(())
    }

    /// Runs a single pass over the graph and returns the number of reductions made.
    ///
    /// Nodes are visited in postorder. Each node is reduced repeatedly until no rule
    /// applies to it, then the pass moves on.
    ///
    /// # Errors
    ///
    /// See [`StructureAnalyzer::analyze`].
    pub fn pass(&mut self) -> Result<usize> {
        self.passes += 1;
        let order: Vec<Address> = self.graph.postorder().collect();

        let mut reduced = 0;
        for node in order {
            if !self.graph.contains(node) {
                continue;
            }

            while !self.graph.successors(node).is_empty() {
                let progress = self.reduce_acyclic(node)?
                    || (self.config.structure_loops && self.reduce_cyclic(node)?);
                if !progress {
                    break;
                }
                self.dominators = None;
                reduced += 1;
            }
        }

        self.reductions += reduced;
        trace!(
            "pass {}: {} reductions, {} nodes remain",
            self.passes,
            reduced,
            self.graph.node_count()
        );
        Ok(reduced)
    }

    /// Returns `true` once the graph consists of the entry node alone.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.graph.node_count() <= 1 && self.graph.edge_count() == 0
    }

    /// Consumes the analyzer and returns the region of the entry node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonTerminatingStructure`] if the graph is not fully reduced.
    pub fn into_region(mut self) -> Result<VirtualRegion<'a>> {
        if !self.is_done() {
            return Err(self.stuck());
        }
        let entry = self.graph.entry();
        self.take_region(entry)
    }

    /// Returns the current region graph.
    #[must_use]
    pub fn graph(&self) -> &RegionGraph {
        &self.graph
    }

    /// Returns the region recorded for `addr`, if any reduction has produced one.
    #[must_use]
    pub fn region(&self, addr: Address) -> Option<&VirtualRegion<'a>> {
        self.regions.get(&addr)
    }

    /// Returns the number of passes run so far.
    #[must_use]
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Returns the number of successful reductions so far.
    #[must_use]
    pub fn reductions(&self) -> usize {
        self.reductions
    }

    fn stuck(&self) -> Error {
        Error::NonTerminatingStructure {
            remaining: self.graph.node_count(),
            passes: self.passes,
        }
    }

    fn reduce_acyclic(&mut self, node: Address) -> Result<bool> {
        match self.graph.successors(node).len() {
            0 => Ok(false),
            1 => self.reduce_sequence(node),
            2 => self.reduce_conditional(node),
            successors => Err(Error::UnsupportedBranching {
                addr: node,
                successors,
            }),
        }
    }

    fn reduce_sequence(&mut self, node: Address) -> Result<bool> {
        let Some(next) = self.graph.sole_successor(node) else {
            return Ok(false);
        };
        if next == node || self.graph.predecessors(next).len() != 1 {
            trace!("{node} :: <shared> {next}");
            return Ok(false);
        }

        let head = self.take_region(node)?;
        let tail = self.take_region(next)?;
        self.regions
            .insert(node, VirtualRegion::sequence([head, tail]));

        self.graph.remove_edge(node, next)?;
        self.graph.transfer_successors(next, node)?;
        self.graph.remove(next)?;

        debug!("{node} :: sequence {next}");
        Ok(true)
    }

    fn reduce_conditional(&mut self, node: Address) -> Result<bool> {
        let (then, otherwise) = match *self.graph.successors(node) {
            [then, otherwise] => (then, otherwise),
            _ => return Ok(false),
        };
        if then == node || otherwise == node {
            return Ok(false);
        }

        let then_succ = self.graph.sole_successor(then);
        let else_succ = self.graph.sole_successor(otherwise);
        if else_succ == Some(then) {
            return Err(Error::InvalidConditional(node));
        }

        let then_owned = self.is_owned(then, node);
        let else_owned = self.is_owned(otherwise, node);

        if then_owned && then_succ == Some(otherwise) {
            let guard = self.take_region(node)?;
            let body = self.take_region(then)?;
            self.regions
                .insert(node, VirtualRegion::conditional(guard, body, None));

            self.graph.remove_edge(node, then)?;
            self.graph.remove_edge(then, otherwise)?;
            self.graph.remove(then)?;

            debug!("{node} :: if-then");
            return Ok(true);
        }

        if let (true, true, Some(join)) = (then_owned, else_owned, then_succ) {
            if else_succ == Some(join) {
                let guard = self.take_region(node)?;
                let body = self.take_region(then)?;
                let alternative = self.take_region(otherwise)?;
                self.regions.insert(
                    node,
                    VirtualRegion::conditional(guard, body, Some(alternative)),
                );

                self.graph.remove_edge(then, join)?;
                self.graph.remove_edge(otherwise, join)?;
                self.graph.remove_edge(node, then)?;
                self.graph.remove_edge(node, otherwise)?;
                self.graph.add_edge(node, join)?;
                self.graph.remove(then)?;
                self.graph.remove(otherwise)?;

                debug!("{node} :: if-then-else");
                return Ok(true);
            }
        }

        if then_owned && self.graph.successors(then).is_empty() {
            let guard = self.take_region(node)?;
            let body = self.take_region(then)?;

            if else_owned && self.graph.successors(otherwise).is_empty() {
                let alternative = self.take_region(otherwise)?;
                self.regions.insert(
                    node,
                    VirtualRegion::conditional(guard, body, Some(alternative)),
                );

                self.graph.remove_edge(node, then)?;
                self.graph.remove_edge(node, otherwise)?;
                self.graph.remove(then)?;
                self.graph.remove(otherwise)?;

                debug!("{node} :: if-then-else (terminating)");
            } else {
                self.regions
                    .insert(node, VirtualRegion::conditional(guard, body, None));

                self.graph.remove_edge(node, then)?;
                self.graph.remove(then)?;

                debug!("{node} :: if-then (terminating)");
            }
            return Ok(true);
        }

        if then_owned && else_owned && self.graph.successors(otherwise).is_empty() {
            let guard = self.take_region(node)?;
            let body = self.take_region(then)?;
            let alternative = self.take_region(otherwise)?;
            self.regions.insert(
                node,
                VirtualRegion::conditional(guard, body, Some(alternative)),
            );

            self.graph.remove_edge(node, then)?;
            self.graph.remove_edge(node, otherwise)?;
            self.graph.transfer_successors(then, node)?;
            self.graph.remove(then)?;
            self.graph.remove(otherwise)?;

            debug!("{node} :: if-then-else (terminating else)");
            return Ok(true);
        }

        trace!("{node} :: <failed> conditional {then}, {otherwise}");
        Ok(false)
    }

    fn reduce_cyclic(&mut self, node: Address) -> Result<bool> {
        if !self.is_loop_header(node)? {
            return Ok(false);
        }

        if self.graph.contains_edge(node, node) {
            let body = self.take_region(node)?;
            self.regions
                .insert(node, VirtualRegion::container(node, body));
            self.graph.remove_edge(node, node)?;

            debug!("{node} :: loop");
            return Ok(true);
        }

        let latch = self.graph.successors(node).iter().copied().find(|&succ| {
            self.graph.predecessors(succ) == [node] && self.graph.successors(succ) == [node]
        });
        if let Some(latch) = latch {
            let head = self.take_region(node)?;
            let tail = self.take_region(latch)?;
            self.regions.insert(
                node,
                VirtualRegion::container(node, VirtualRegion::sequence([head, tail])),
            );

            self.graph.remove_edge(node, latch)?;
            self.graph.remove_edge(latch, node)?;
            self.graph.remove(latch)?;

            debug!("{node} :: loop {latch}");
            return Ok(true);
        }

        trace!("{node} :: <unsupported loop>");
        Ok(false)
    }

    /// A node is a loop header if it has a self-loop or dominates one of its predecessors.
    fn is_loop_header(&mut self, node: Address) -> Result<bool> {
        if self.graph.contains_edge(node, node) {
            return Ok(true);
        }

        let predecessors = self.graph.predecessors(node).to_vec();
        let dominators = self.dominators()?;
        Ok(predecessors
            .into_iter()
            .any(|pred| dominators.strictly_dominates(node, pred)))
    }

    fn dominators(&mut self) -> Result<&DominatorTree> {
        let tree = match self.dominators.take() {
            Some(tree) => tree,
            None => DominatorTree::build(&self.graph)?,
        };
        let tree: &DominatorTree = self.dominators.insert(tree);
        Ok(tree)
    }

    fn is_owned(&self, arm: Address, node: Address) -> bool {
        self.graph.predecessors(arm) == [node]
    }

    fn take_region(&mut self, addr: Address) -> Result<VirtualRegion<'a>> {
        if let Some(region) = self.regions.remove(&addr) {
            return Ok(region);
        }

        self.blocks
            .get(&addr)
            .map(|&instructions| VirtualRegion::Leaf { addr, instructions })
            .ok_or(Error::NodeNotFound(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{
        bottom_tested_loop, both_arms_return, chain, early_return, if_then, if_then_else,
        loop_with_break, loop_with_else_return, loop_with_if, nested_else_return,
        top_tested_loop,
    };

    fn block_addrs(cfg: &ControlFlowGraph<'_>) -> Vec<Address> {
        cfg.blocks().map(|block| block.addr()).collect()
    }

    fn structure<'a>(cfg: &ControlFlowGraph<'a>) -> Result<VirtualRegion<'a>> {
        StructureAnalyzer::new(cfg, StructureConfig::default()).analyze()
    }

    #[test]
    fn test_single_block_is_a_leaf() {
        let instructions = chain(1);
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let region = structure(&cfg).unwrap();
        assert!(matches!(region, VirtualRegion::Leaf { .. }));
    }

    #[test]
    fn test_chain_folds_into_one_sequence() {
        let instructions = chain(5);
        let cfg = ControlFlowGraph::build(&instructions).unwrap();

        let mut analyzer = StructureAnalyzer::new(&cfg, StructureConfig::default());
        analyzer.run().unwrap();
        assert_eq!(analyzer.passes(), 1);
        assert_eq!(analyzer.reductions(), 4);

        let region = analyzer.into_region().unwrap();
        let VirtualRegion::Sequence(children) = &region else {
            panic!("expected a sequence, got {}", region.outline());
        };
        assert_eq!(children.len(), 5);
        assert_eq!(region.leaves(), block_addrs(&cfg));
    }

    #[test]
    fn test_if_then() {
        let instructions = if_then();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let region = structure(&cfg).unwrap();
        assert_eq!(
            region.outline(),
            format!("Seq[If({}, {}), {}]", b[0], b[1], b[2])
        );

        let VirtualRegion::Sequence(children) = &region else {
            unreachable!()
        };
        let branch = children[0].guard_instruction().unwrap();
        assert_eq!(branch.branch_target(), Some(b[2]));
    }

    #[test]
    fn test_if_then_else() {
        let instructions = if_then_else();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let region = structure(&cfg).unwrap();
        assert_eq!(
            region.outline(),
            format!("Seq[If({}, {}, {}), {}]", b[0], b[1], b[2], b[3])
        );
    }

    #[test]
    fn test_if_then_else_leaves_single_edge_to_join() {
        let instructions = if_then_else();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let mut analyzer = StructureAnalyzer::new(&cfg, StructureConfig::default());
        assert!(analyzer.reduce_conditional(b[0]).unwrap());

        let graph = analyzer.graph();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.successors(b[0]), &[b[3]]);
        assert!(!graph.contains(b[1]));
        assert!(!graph.contains(b[2]));
    }

    #[test]
    fn test_shared_target_is_not_merged() {
        let instructions = if_then_else();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);
        let join = b[3];

        let mut analyzer = StructureAnalyzer::new(&cfg, StructureConfig::default());
        assert!(!analyzer.reduce_sequence(b[1]).unwrap());
        assert!(!analyzer.reduce_sequence(b[2]).unwrap());
        assert!(analyzer.graph().contains(join));
        assert_eq!(analyzer.graph().predecessors(join).len(), 2);
        assert!(analyzer.region(b[1]).is_none());
    }

    #[test]
    fn test_early_return() {
        let instructions = early_return();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let region = structure(&cfg).unwrap();
        assert_eq!(region.outline(), format!("If({}, {}, {})", b[0], b[1], b[2]));
    }

    #[test]
    fn test_terminating_then_arm_keeps_continuation() {
        let instructions = both_arms_return();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let mut analyzer = StructureAnalyzer::new(&cfg, StructureConfig::default());
        // a self-loop gives the else-arm a second predecessor
        analyzer.graph.add_edge(b[2], b[2]).unwrap();

        assert!(analyzer.reduce_conditional(b[0]).unwrap());
        assert_eq!(analyzer.graph().successors(b[0]), &[b[2]]);
        assert!(!analyzer.graph().contains(b[1]));
        assert_eq!(
            analyzer.region(b[0]).map(VirtualRegion::outline),
            Some(format!("If({}, {})", b[0], b[1]))
        );
    }

    #[test]
    fn test_terminating_else_arm() {
        let instructions = nested_else_return();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);
        assert_eq!(b.len(), 5);

        let region = structure(&cfg).unwrap();
        assert_eq!(
            region.outline(),
            format!("Seq[If({}, If({}, {}, {})), {}]", b[0], b[1], b[2], b[3], b[4])
        );
        assert_eq!(region.leaves(), b);
    }

    #[test]
    fn test_terminating_else_arm_hands_over_continuation() {
        let instructions = nested_else_return();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let mut analyzer = StructureAnalyzer::new(&cfg, StructureConfig::default());
        assert!(analyzer.reduce_conditional(b[1]).unwrap());

        let graph = analyzer.graph();
        assert_eq!(graph.successors(b[1]), &[b[4]]);
        assert_eq!(graph.predecessors(b[4]), &[b[0], b[1]]);
        assert!(!graph.contains(b[2]));
        assert!(!graph.contains(b[3]));
    }

    #[test]
    fn test_loop_with_terminating_else_arm() {
        let instructions = loop_with_else_return();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);
        assert_eq!(b.len(), 6);

        let region = structure(&cfg).unwrap();
        assert_eq!(
            region.outline(),
            format!(
                "Seq[If({}, Loop[If({}, Seq[{}, {}], {})]), {}]",
                b[0], b[1], b[2], b[4], b[3], b[5]
            )
        );
        assert_eq!(region.leaf_count(), 6);
    }

    #[test]
    fn test_top_tested_loop() {
        let instructions = top_tested_loop();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let region = structure(&cfg).unwrap();
        assert_eq!(
            region.outline(),
            format!("Seq[{}, Loop[{}, {}], {}]", b[0], b[1], b[2], b[3])
        );
    }

    #[test]
    fn test_bottom_tested_loop() {
        let instructions = bottom_tested_loop();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let region = structure(&cfg).unwrap();
        assert_eq!(
            region.outline(),
            format!("Seq[If({}, Loop[{}]), {}]", b[0], b[1], b[2])
        );
    }

    #[test]
    fn test_loop_with_conditional_body() {
        let instructions = loop_with_if();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let region = structure(&cfg).unwrap();
        assert_eq!(
            region.outline(),
            format!(
                "Seq[{}, Loop[{}, If({}, {}), {}], {}]",
                b[0], b[1], b[2], b[3], b[4], b[5]
            )
        );
    }

    #[test]
    fn test_loop_with_break_is_reported() {
        let instructions = loop_with_break();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();

        let err = structure(&cfg).unwrap_err();
        assert_eq!(
            err,
            Error::NonTerminatingStructure {
                remaining: 5,
                passes: 1
            }
        );
    }

    #[test]
    fn test_acyclic_config_reports_loops() {
        let instructions = top_tested_loop();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();

        let result = StructureAnalyzer::new(&cfg, StructureConfig::acyclic()).analyze();
        assert_eq!(
            result.unwrap_err(),
            Error::NonTerminatingStructure {
                remaining: 4,
                passes: 1
            }
        );
    }

    #[test]
    fn test_pass_limit() {
        let instructions = if_then();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();

        let result = StructureAnalyzer::new(&cfg, StructureConfig::bounded(0)).analyze();
        assert_eq!(
            result.unwrap_err(),
            Error::NonTerminatingStructure {
                remaining: 3,
                passes: 0
            }
        );

        let region = StructureAnalyzer::new(&cfg, StructureConfig::bounded(1))
            .analyze()
            .unwrap();
        assert_eq!(region.leaf_count(), 3);
    }

    #[test]
    fn test_unsupported_branching() {
        let instructions = chain(4);
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let mut analyzer = StructureAnalyzer::new(&cfg, StructureConfig::default());
        analyzer.graph.add_edge(b[0], b[2]).unwrap();
        analyzer.graph.add_edge(b[0], b[3]).unwrap();

        assert_eq!(
            analyzer.run(),
            Err(Error::UnsupportedBranching {
                addr: b[0],
                successors: 3
            })
        );
    }

    #[test]
    fn test_else_arm_into_then_arm_is_invalid() {
        let instructions = if_then_else();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let mut analyzer = StructureAnalyzer::new(&cfg, StructureConfig::default());
        analyzer.graph.remove_edge(b[2], b[3]).unwrap();
        analyzer.graph.add_edge(b[2], b[1]).unwrap();

        assert_eq!(analyzer.run(), Err(Error::InvalidConditional(b[0])));
    }

    #[test]
    fn test_loop_header_detection() {
        let instructions = top_tested_loop();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let b = block_addrs(&cfg);

        let mut analyzer = StructureAnalyzer::new(&cfg, StructureConfig::default());
        assert!(!analyzer.is_loop_header(b[0]).unwrap());
        assert!(analyzer.is_loop_header(b[1]).unwrap());
        assert!(!analyzer.is_loop_header(b[2]).unwrap());
    }
}
