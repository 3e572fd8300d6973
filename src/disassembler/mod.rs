//! DSO instruction model.
//!
//! This module defines the decoded form of Torque DSO bytecode that the control flow
//! analysis consumes. Decoding raw code words is left to the caller; the types here
//! describe the result and enforce the invariants the analysis relies on.
//!
//! # Key Types
//!
//! - [`Opcode`] - The opcode table, with raw value conversion and categories
//! - [`Instruction`] - A decoded instruction: opcode, address and [`InstructionKind`]
//! - [`BranchKind`] - When a jump is taken
//! - [`CallType`] - How a call is dispatched
//! - [`Disassembly`] - The instruction stream of one file, split into functions
//! - [`Assembler`] - Label-based builder for instruction streams
//!
//! # Example
//!
//! ```rust
//! use dsoscope::disassembler::{Assembler, CallType, Disassembly};
//!
//! // function hello() { echo("hi"); }
//! let mut asm = Assembler::new();
//! asm.func_decl("hello", &[], "end")
//!     .push_frame()
//!     .load_immed(0)
//!     .push_arg()
//!     .call("echo", None, CallType::FunctionCall)
//!     .ret(false)
//!     .label("end");
//!
//! let listing = Disassembly::new(asm.finish()?)?;
//! for insn in &listing {
//!     println!("{insn}");
//! }
//! # Ok::<(), dsoscope::Error>(())
//! ```

mod assembler;
mod disassembly;
mod instruction;
mod opcode;

pub use assembler::Assembler;
pub use disassembly::{Disassembly, FunctionBody};
pub use instruction::{AdvanceStringKind, CallType, ConvertType, Instruction, InstructionKind};
pub use opcode::{BranchKind, Opcode, OpcodeCategory};
