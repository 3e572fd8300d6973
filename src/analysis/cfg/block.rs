//! Basic blocks of a control flow graph.

use std::fmt;

use crate::{disassembler::Instruction, utils::graph::Address};

/// A maximal run of instructions with a single entry and a single exit.
///
/// A block borrows its instructions from the function's instruction list and is
/// identified by the address of its first instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicBlock<'a> {
    addr: Address,
    instructions: &'a [Instruction],
}

impl<'a> BasicBlock<'a> {
    /// Creates a block over a non-empty instruction run.
    pub(crate) fn new(instructions: &'a [Instruction]) -> Option<Self> {
        let first = instructions.first()?;
        Some(BasicBlock {
            addr: first.addr(),
            instructions,
        })
    }

    /// Returns the address of the first instruction.
    #[must_use]
    pub fn addr(&self) -> Address {
        self.addr
    }

    /// Returns the instructions of the block.
    #[must_use]
    pub fn instructions(&self) -> &'a [Instruction] {
        self.instructions
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Always `false`; blocks hold at least one instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction that ends the block.
    #[must_use]
    pub fn last_instruction(&self) -> Option<&'a Instruction> {
        self.instructions.last()
    }

    /// Returns the address of the last instruction.
    #[must_use]
    pub fn end_addr(&self) -> Address {
        self.last_instruction().map_or(self.addr, Instruction::addr)
    }
}

impl fmt::Display for BasicBlock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "block_{}:", self.addr)?;
        for insn in self.instructions {
            writeln!(f, "    {insn}")?;
        }
        Ok(())
    }
}
