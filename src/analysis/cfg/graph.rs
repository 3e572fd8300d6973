//! Control flow graph construction and queries.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Write,
};

use log::debug;
use rustc_hash::FxHashMap;

use crate::{
    analysis::cfg::{BasicBlock, CfgEdge, CfgEdgeKind},
    disassembler::{Instruction, InstructionKind},
    utils::{
        dot_label, escape_dot,
        graph::{Address, GraphBase, Predecessors, RootedGraph, Successors},
    },
    Error, Result,
};

/// Control flow graph of one function.
///
/// Blocks borrow their instructions from the slice the graph was built from. Edges are
/// stored per block in a fixed order: a block ending in a conditional branch lists its
/// [`CfgEdgeKind::NotTaken`] edge first and its [`CfgEdgeKind::Taken`] edge second, so
/// the first successor is the arm that runs when the jump is not taken.
///
/// Only blocks reachable from the entry are part of the graph.
///
/// # Examples
///
/// ```rust
/// use dsoscope::analysis::{CfgEdgeKind, ControlFlowGraph};
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
///
/// let cfg = ControlFlowGraph::build(&instructions)?;
/// assert_eq!(cfg.block_count(), 3);
///
/// let kinds: Vec<CfgEdgeKind> = cfg.edges(cfg.entry()).iter().map(|e| e.kind()).collect();
/// assert_eq!(kinds, vec![CfgEdgeKind::NotTaken, CfgEdgeKind::Taken]);
/// # Ok::<(), dsoscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ControlFlowGraph<'a> {
    entry: Address,
    blocks: BTreeMap<Address, BasicBlock<'a>>,
    edges: FxHashMap<Address, Vec<CfgEdge>>,
    predecessors: FxHashMap<Address, Vec<Address>>,
}

impl<'a> ControlFlowGraph<'a> {
    /// Builds the control flow graph of a function body.
    ///
    /// Block leaders are the first instruction, every branch target and every
    /// instruction that follows a branch or a return. Blocks that cannot be reached from
    /// the first block are dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] if `instructions` is empty
    /// - [`Error::Malformed`] if addresses are not strictly increasing, a branch targets
    ///   an address that holds no instruction, the last block falls through past the end
    ///   of the function, or the entry block is itself a jump target
    pub fn build(instructions: &'a [Instruction]) -> Result<Self> {
        if instructions.is_empty() {
            return Err(Error::Empty);
        }

        for pair in instructions.windows(2) {
            if pair[1].addr() <= pair[0].addr() {
                return Err(malformed_error!(
                    "Instruction address {} does not follow {}",
                    pair[1].addr(),
                    pair[0].addr()
                ));
            }
        }

        let index: FxHashMap<Address, usize> = instructions
            .iter()
            .enumerate()
            .map(|(i, insn)| (insn.addr(), i))
            .collect();

        let mut leaders = BTreeSet::new();
        leaders.insert(0usize);
        for (i, insn) in instructions.iter().enumerate() {
            if let Some(target) = insn.branch_target() {
                let Some(&target_idx) = index.get(&target) else {
                    return Err(malformed_error!(
                        "Branch at {} targets {}, which is not an instruction",
                        insn.addr(),
                        target
                    ));
                };
                leaders.insert(target_idx);
            }
            if insn.terminates_block() && i + 1 < instructions.len() {
                leaders.insert(i + 1);
            }
        }

        let starts: Vec<usize> = leaders.into_iter().collect();
        let mut all_blocks = Vec::with_capacity(starts.len());
        for (n, &start) in starts.iter().enumerate() {
            let end = starts.get(n + 1).copied().unwrap_or(instructions.len());
            if let Some(block) = BasicBlock::new(&instructions[start..end]) {
                all_blocks.push(block);
            }
        }

        let position: FxHashMap<Address, usize> = all_blocks
            .iter()
            .enumerate()
            .map(|(n, block)| (block.addr(), n))
            .collect();

        // Walk from the entry so that only reachable blocks are checked for edges.
        let entry = instructions[0].addr();
        let mut edges: FxHashMap<Address, Vec<CfgEdge>> = FxHashMap::default();
        let mut worklist = vec![entry];
        while let Some(addr) = worklist.pop() {
            if edges.contains_key(&addr) {
                continue;
            }
            let Some(&n) = position.get(&addr) else {
                continue;
            };
            let next = all_blocks.get(n + 1).map(BasicBlock::addr);
            let block_edges = Self::block_edges(&all_blocks[n], next)?;
            worklist.extend(block_edges.iter().map(CfgEdge::target));
            edges.insert(addr, block_edges);
        }

        let mut blocks = BTreeMap::new();
        for block in all_blocks {
            if edges.contains_key(&block.addr()) {
                blocks.insert(block.addr(), block);
            } else {
                debug!("dropping unreachable block {}", block.addr());
            }
        }

        let mut predecessors: FxHashMap<Address, Vec<Address>> = FxHashMap::default();
        for &addr in blocks.keys() {
            predecessors.entry(addr).or_default();
        }
        for &addr in blocks.keys() {
            for edge in edges.get(&addr).map(Vec::as_slice).unwrap_or_default() {
                predecessors.entry(edge.target()).or_default().push(addr);
            }
        }

        if predecessors.get(&entry).is_some_and(|preds| !preds.is_empty()) {
            return Err(malformed_error!("Entry block {} is a jump target", entry));
        }

        Ok(ControlFlowGraph {
            entry,
            blocks,
            edges,
            predecessors,
        })
    }

    fn block_edges(block: &BasicBlock<'_>, next: Option<Address>) -> Result<Vec<CfgEdge>> {
        let Some(last) = block.last_instruction() else {
            return Ok(Vec::new());
        };

        let fall_through = |kind| {
            next.map(|addr| CfgEdge::new(addr, kind)).ok_or_else(|| {
                malformed_error!("Block {} falls through past the end", block.addr())
            })
        };

        let mut edges = Vec::with_capacity(2);
        match last.kind() {
            InstructionKind::Return { .. } => {}
            InstructionKind::Branch { target, kind } if kind.is_conditional() => {
                edges.push(fall_through(CfgEdgeKind::NotTaken)?);
                if edges.iter().all(|e| e.target() != *target) {
                    edges.push(CfgEdge::new(*target, CfgEdgeKind::Taken));
                }
            }
            InstructionKind::Branch { target, .. } => {
                edges.push(CfgEdge::new(*target, CfgEdgeKind::Taken));
            }
            _ => edges.push(fall_through(CfgEdgeKind::Fallthrough)?),
        }

        Ok(edges)
    }

    /// Returns the address of the entry block.
    #[must_use]
    pub fn entry(&self) -> Address {
        self.entry
    }

    /// Returns the block starting at `addr`.
    #[must_use]
    pub fn block(&self, addr: Address) -> Option<&BasicBlock<'a>> {
        self.blocks.get(&addr)
    }

    /// Returns all blocks in address order.
    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock<'a>> + '_ {
        self.blocks.values()
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the outgoing edges of a block, in successor order.
    #[must_use]
    pub fn edges(&self, addr: Address) -> &[CfgEdge] {
        self.edges.get(&addr).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the successor blocks of a block, in successor order.
    pub fn successors(&self, addr: Address) -> impl Iterator<Item = Address> + '_ {
        self.edges(addr).iter().map(CfgEdge::target)
    }

    /// Returns the predecessor blocks of a block, in address order.
    pub fn predecessors(&self, addr: Address) -> impl Iterator<Item = Address> + '_ {
        self.predecessors
            .get(&addr)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .copied()
    }

    /// Returns the total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Generates a DOT representation of the graph for Graphviz.
    ///
    /// The entry block is filled green and blocks without successors red. Branch edges
    /// are labeled with whether the jump is taken.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CFG {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"CFG: {}\";", escape_dot(name));
        }
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        for block in self.blocks.values() {
            let header = format!("block_{}", block.addr());
            let lines = std::iter::once(header)
                .chain(block.instructions().iter().map(ToString::to_string));

            let style = if block.addr() == self.entry {
                ", style=filled, fillcolor=lightgreen"
            } else if self.edges(block.addr()).is_empty() {
                ", style=filled, fillcolor=lightcoral"
            } else {
                ""
            };

            let _ = writeln!(
                dot,
                "    B{} [label=\"{}\"{style}];",
                block.addr(),
                dot_label(lines)
            );
        }

        dot.push('\n');

        for &addr in self.blocks.keys() {
            for edge in self.edges(addr) {
                let color = match edge.kind() {
                    CfgEdgeKind::Fallthrough => "black",
                    CfgEdgeKind::Taken => "darkgreen",
                    CfgEdgeKind::NotTaken => "red",
                };
                let _ = writeln!(
                    dot,
                    "    B{addr} -> B{} [label=\"{}\", color={color}];",
                    edge.target(),
                    edge.kind().label()
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}

impl GraphBase for ControlFlowGraph<'_> {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = Address> {
        self.blocks.keys().copied()
    }
}

impl Successors for ControlFlowGraph<'_> {
    fn successors(&self, node: Address) -> impl Iterator<Item = Address> {
        ControlFlowGraph::successors(self, node)
    }
}

impl Predecessors for ControlFlowGraph<'_> {
    fn predecessors(&self, node: Address) -> impl Iterator<Item = Address> {
        ControlFlowGraph::predecessors(self, node)
    }
}

impl RootedGraph for ControlFlowGraph<'_> {
    fn entry(&self) -> Address {
        self.entry
    }
}
