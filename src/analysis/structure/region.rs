//! The structured output tree.

use std::fmt;

use crate::{
    analysis::cfg::BasicBlock, disassembler::Instruction, utils::graph::Address,
};

/// A node of the structured control flow tree.
///
/// Regions are built bottom-up by the structure analyzer. Leaves borrow their
/// instructions from the function body, composite regions own their children.
///
/// # Invariants
///
/// - A [`VirtualRegion::Sequence`] never directly contains another sequence; nested
///   sequences are spliced into their parent on construction.
/// - The guard of a [`VirtualRegion::Conditional`] ends with the branch instruction that
///   selects between the arms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualRegion<'a> {
    /// The instructions of one basic block.
    Leaf {
        /// Address of the block
        addr: Address,
        /// The block's instructions, in order
        instructions: &'a [Instruction],
    },

    /// Regions executed one after another.
    Sequence(Vec<VirtualRegion<'a>>),

    /// A two-way branch.
    Conditional {
        /// Region that computes the condition and ends with the branch
        guard: Box<VirtualRegion<'a>>,
        /// Region executed on the fall-through (first) arm
        then: Box<VirtualRegion<'a>>,
        /// Region executed on the taken (second) arm, if it is not the continuation
        otherwise: Option<Box<VirtualRegion<'a>>>,
    },

    /// One iteration of a loop.
    ///
    /// The first child starts at the loop header; the body ends where control returns
    /// to the header.
    Container {
        /// Address of the loop header
        addr: Address,
        /// The loop body, in order
        body: Vec<VirtualRegion<'a>>,
    },
}

impl<'a> VirtualRegion<'a> {
    /// Creates a leaf region for a basic block.
    #[must_use]
    pub fn leaf(block: &BasicBlock<'a>) -> Self {
        VirtualRegion::Leaf {
            addr: block.addr(),
            instructions: block.instructions(),
        }
    }

    /// Creates a sequence, splicing in the children of nested sequences.
    pub fn sequence<I>(regions: I) -> Self
    where
        I: IntoIterator<Item = VirtualRegion<'a>>,
    {
        let mut children = Vec::new();
        for region in regions {
            match region {
                VirtualRegion::Sequence(inner) => children.extend(inner),
                other => children.push(other),
            }
        }
        VirtualRegion::Sequence(children)
    }

    /// Creates a conditional region.
    #[must_use]
    pub fn conditional(
        guard: VirtualRegion<'a>,
        then: VirtualRegion<'a>,
        otherwise: Option<VirtualRegion<'a>>,
    ) -> Self {
        VirtualRegion::Conditional {
            guard: Box::new(guard),
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        }
    }

    /// Wraps a region into a loop container headed at `addr`.
    #[must_use]
    pub fn container(addr: Address, body: VirtualRegion<'a>) -> Self {
        VirtualRegion::Container {
            addr,
            body: body.into_children(),
        }
    }

    /// Returns the children of a sequence, or the region itself as a single child.
    #[must_use]
    pub fn into_children(self) -> Vec<VirtualRegion<'a>> {
        match self {
            VirtualRegion::Sequence(children) => children,
            other => vec![other],
        }
    }

    /// Returns the address at which control enters the region.
    ///
    /// `None` only for an empty sequence.
    #[must_use]
    pub fn addr(&self) -> Option<Address> {
        match self {
            VirtualRegion::Leaf { addr, .. } | VirtualRegion::Container { addr, .. } => {
                Some(*addr)
            }
            VirtualRegion::Sequence(children) => children.first().and_then(Self::addr),
            VirtualRegion::Conditional { guard, .. } => guard.addr(),
        }
    }

    /// Returns the number of basic blocks in the region.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            VirtualRegion::Leaf { .. } => 1,
            VirtualRegion::Sequence(children) | VirtualRegion::Container { body: children, .. } => {
                children.iter().map(Self::leaf_count).sum()
            }
            VirtualRegion::Conditional {
                guard,
                then,
                otherwise,
            } => {
                guard.leaf_count()
                    + then.leaf_count()
                    + otherwise.as_ref().map_or(0, |region| region.leaf_count())
            }
        }
    }

    /// Returns the addresses of all basic blocks in the region, in layout order.
    ///
    /// Guards come before their arms and the then-arm before the else-arm.
    #[must_use]
    pub fn leaves(&self) -> Vec<Address> {
        let mut out = Vec::with_capacity(self.leaf_count());
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<Address>) {
        match self {
            VirtualRegion::Leaf { addr, .. } => out.push(*addr),
            VirtualRegion::Sequence(children) | VirtualRegion::Container { body: children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
            VirtualRegion::Conditional {
                guard,
                then,
                otherwise,
            } => {
                guard.collect_leaves(out);
                then.collect_leaves(out);
                if let Some(otherwise) = otherwise {
                    otherwise.collect_leaves(out);
                }
            }
        }
    }

    /// Returns the leaf through which control leaves the region, if there is a single one.
    ///
    /// Conditionals have two ways out and return `None`.
    #[must_use]
    pub fn last_leaf(&self) -> Option<(Address, &'a [Instruction])> {
        match self {
            VirtualRegion::Leaf { addr, instructions } => Some((*addr, *instructions)),
            VirtualRegion::Sequence(children) | VirtualRegion::Container { body: children, .. } => {
                children.last().and_then(Self::last_leaf)
            }
            VirtualRegion::Conditional { .. } => None,
        }
    }

    /// Returns the branch instruction that ends the guard of a conditional.
    #[must_use]
    pub fn guard_instruction(&self) -> Option<&'a Instruction> {
        match self {
            VirtualRegion::Conditional { guard, .. } => guard
                .last_leaf()
                .and_then(|(_, instructions)| instructions.last()),
            _ => None,
        }
    }

    /// Returns `true` for loop containers.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        matches!(self, VirtualRegion::Container { .. })
    }

    /// Renders the region shape on a single line.
    ///
    /// Leaves print as their address, sequences as `Seq[..]`, loops as `Loop[..]` and
    /// conditionals as `If(guard, then)` or `If(guard, then, else)`.
    #[must_use]
    pub fn outline(&self) -> String {
        match self {
            VirtualRegion::Leaf { addr, .. } => addr.to_string(),
            VirtualRegion::Sequence(children) => format!("Seq[{}]", outline_list(children)),
            VirtualRegion::Container { body, .. } => format!("Loop[{}]", outline_list(body)),
            VirtualRegion::Conditional {
                guard,
                then,
                otherwise: Some(otherwise),
            } => format!(
                "If({}, {}, {})",
                guard.outline(),
                then.outline(),
                otherwise.outline()
            ),
            VirtualRegion::Conditional { guard, then, .. } => {
                format!("If({}, {})", guard.outline(), then.outline())
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "    ".repeat(depth);
        match self {
            VirtualRegion::Leaf { addr, instructions } => {
                writeln!(f, "{pad}block_{addr}:")?;
                for insn in *instructions {
                    writeln!(f, "{pad}    {insn}")?;
                }
            }
            VirtualRegion::Sequence(children) => {
                writeln!(f, "{pad}sequence")?;
                for child in children {
                    child.fmt_indented(f, depth + 1)?;
                }
            }
            VirtualRegion::Container { addr, body } => {
                writeln!(f, "{pad}loop @{addr}")?;
                for child in body {
                    child.fmt_indented(f, depth + 1)?;
                }
            }
            VirtualRegion::Conditional {
                guard,
                then,
                otherwise,
            } => {
                writeln!(f, "{pad}if")?;
                guard.fmt_indented(f, depth + 1)?;
                writeln!(f, "{pad}then")?;
                then.fmt_indented(f, depth + 1)?;
                if let Some(otherwise) = otherwise {
                    writeln!(f, "{pad}else")?;
                    otherwise.fmt_indented(f, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

fn outline_list(regions: &[VirtualRegion<'_>]) -> String {
    regions
        .iter()
        .map(VirtualRegion::outline)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for VirtualRegion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::cfg::ControlFlowGraph,
        test::{addrs, chain, if_then_else},
    };

    fn leaves_of<'a>(cfg: &ControlFlowGraph<'a>) -> Vec<VirtualRegion<'a>> {
        cfg.blocks().map(VirtualRegion::leaf).collect()
    }

    #[test]
    fn test_sequence_flattens_nested_sequences() {
        let instructions = chain(4);
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let mut leaves = leaves_of(&cfg).into_iter();
        let (b0, b1, b2, b3) = (
            leaves.next().unwrap(),
            leaves.next().unwrap(),
            leaves.next().unwrap(),
            leaves.next().unwrap(),
        );

        let tail = VirtualRegion::sequence([b2, b3]);
        let head = VirtualRegion::sequence([b0, b1]);
        let all = VirtualRegion::sequence([head, tail]);

        let VirtualRegion::Sequence(children) = &all else {
            panic!("expected a sequence, got {}", all.outline());
        };
        assert_eq!(children.len(), 4);
        assert!(children
            .iter()
            .all(|child| matches!(child, VirtualRegion::Leaf { .. })));
        assert_eq!(all.leaf_count(), 4);
    }

    #[test]
    fn test_container_keeps_sequence_children() {
        let instructions = chain(2);
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let entry = cfg.entry();
        let body = VirtualRegion::sequence(leaves_of(&cfg));

        let looped = VirtualRegion::container(entry, body);
        assert!(looped.is_loop());
        assert_eq!(looped.addr(), Some(entry));

        // a loop nested in a sequence stays a distinct child
        let seq = VirtualRegion::sequence([looped.clone()]);
        assert_eq!(seq.into_children(), vec![looped]);
    }

    #[test]
    fn test_conditional_accessors() {
        let instructions = if_then_else();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let mut leaves = leaves_of(&cfg).into_iter();
        let guard = leaves.next().unwrap();
        let then = leaves.next().unwrap();
        let otherwise = leaves.next().unwrap();
        let end = leaves.next().unwrap();
        let guard_addr = guard.addr().unwrap();

        let cond = VirtualRegion::conditional(guard, then, Some(otherwise));
        let region = VirtualRegion::sequence([cond.clone(), end]);

        assert_eq!(cond.addr(), Some(guard_addr));
        let branch = cond.guard_instruction().unwrap();
        assert!(branch.is_branch());
        assert_eq!(cond.last_leaf(), None);

        let blocks: Vec<Address> = cfg.blocks().map(|b| b.addr()).collect();
        assert_eq!(region.leaves(), blocks);
        assert_eq!(region.leaf_count(), 4);
        assert_eq!(
            region.outline(),
            format!(
                "Seq[If({}, {}, {}), {}]",
                blocks[0], blocks[1], blocks[2], blocks[3]
            )
        );
    }

    #[test]
    fn test_guard_instruction_of_non_conditional() {
        let instructions = chain(1);
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let leaf = VirtualRegion::leaf(cfg.block(cfg.entry()).unwrap());
        assert_eq!(leaf.guard_instruction(), None);
        assert_eq!(leaf.leaves(), addrs(&[0]));
    }

    #[test]
    fn test_display_is_indented_tree() {
        let instructions = if_then_else();
        let cfg = ControlFlowGraph::build(&instructions).unwrap();
        let mut leaves = leaves_of(&cfg).into_iter();
        let cond = VirtualRegion::conditional(
            leaves.next().unwrap(),
            leaves.next().unwrap(),
            Some(leaves.next().unwrap()),
        );

        let text = cond.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "if");
        assert_eq!(lines[1], "    block_0:");
        assert!(lines.contains(&"then"));
        assert!(lines.contains(&"else"));
    }
}
