// Copyright 2026 The dsoscope Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dsoscope
//!
//! Control flow structuring for Torque DSO bytecode.
//!
//! A DSO file is compiled TorqueScript: a flat stream of stack-machine instructions in
//! which `if`, `else` and loops have been lowered to conditional and unconditional jumps.
//! `dsoscope` recovers the nesting. It splits each function into basic blocks, builds the
//! control flow graph, and reduces that graph into a tree of sequences, conditionals and
//! loop bodies that a code emitter can print without inventing labels or gotos.
//!
//! ## Features
//!
//! - **Typed instruction model** - Every DSO opcode with its operands as a closed enum
//! - **Control flow graphs** - Basic blocks with edges labeled taken, not taken or fall-through
//! - **Dominance** - Dominator trees over any rooted graph
//! - **Structuring** - Fixed-point reduction into [`analysis::VirtualRegion`] trees
//! - **Parallel** - Whole listings are structured function by function on all cores
//!
//! ## Quick Start
//!
//! ```rust
//! use dsoscope::prelude::*;
//!
//! let mut asm = Assembler::new();
//! asm.load_var("%c")
//!     .jmp_if_not("join")
//!     .load_immed(1)
//!     .save_var("%x")
//!     .label("join")
//!     .ret(false);
//! let instructions = asm.finish()?;
//!
//! let cfg = ControlFlowGraph::build(&instructions)?;
//! let region = structure_function(&cfg, &StructureConfig::default())?;
//! println!("{region}");
//! # Ok::<(), dsoscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`disassembler`] - Opcodes, instructions, listings and a label-based assembler
//! - [`analysis`] - Control flow graphs and structuring
//! - [`utils`] - Graph traits, traversals, dominators and DOT helpers
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`Error`] and [`Result`] - Error handling
//!
//! Every failure is fatal for the function being processed and reported as an [`Error`].
//! The library never installs a logger; reduction decisions are emitted through the
//! [`log`](https://docs.rs/log) facade at `debug` and `trace` level.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dsoscope::prelude::*;
///
/// let mut asm = Assembler::new();
/// asm.load_immed(0).ret(true);
/// let instructions = asm.finish()?;
/// let cfg = ControlFlowGraph::build(&instructions)?;
/// assert_eq!(cfg.block_count(), 1);
/// # Ok::<(), dsoscope::Error>(())
/// ```
pub mod prelude;

/// DSO instruction model.
///
/// Decoding raw DSO bytes is left to the caller; this module defines what the decoded
/// instructions look like and how a listing is split into functions.
///
/// # Key Types
///
/// - [`disassembler::Opcode`] - The opcode table
/// - [`disassembler::Instruction`] - An opcode with its address and operands
/// - [`disassembler::Disassembly`] - An ordered listing of a whole file
/// - [`disassembler::Assembler`] - Builds instruction lists from labels
pub mod disassembler;

/// Control flow analysis.
///
/// - [`analysis::ControlFlowGraph`] - Basic blocks and ordered edges
/// - [`analysis::StructureAnalyzer`] - Reduction into structured regions
pub mod analysis;

/// Utilities shared by the analyses: graph traits, algorithms and DOT output.
pub mod utils;

/// `dsoscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `dsoscope` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use dsoscope::{analysis::ControlFlowGraph, Error};
///
/// match ControlFlowGraph::build(&[]) {
///     Err(Error::Empty) => println!("nothing to do"),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
///     Ok(_) => unreachable!(),
/// }
/// ```
pub use error::Error;

/// Configuration for control flow structuring.
///
/// See [`analysis::StructureConfig`].
pub use analysis::StructureConfig;
