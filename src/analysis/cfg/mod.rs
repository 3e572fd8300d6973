//! Control Flow Graph (CFG) construction.
//!
//! The CFG splits a function body into basic blocks and connects them with edges that
//! record how control leaves each block. It is the read-only input of the structuring
//! analysis.
//!
//! # Key Components
//!
//! - [`ControlFlowGraph`] - Blocks keyed by start address, with ordered edges
//! - [`BasicBlock`] - A borrowed run of instructions with single entry and exit
//! - [`CfgEdge`] / [`CfgEdgeKind`] - Edges labeled fall-through, taken or not taken
//!
//! # Examples
//!
//! ```rust
//! use dsoscope::analysis::ControlFlowGraph;
//! use dsoscope::disassembler::Assembler;
//!
//! let mut asm = Assembler::new();
//! asm.load_var("%c")
//!     .jmp_if_not("else")
//!     .load_immed(1)
//!     .jmp("end")
//!     .label("else")
//!     .load_immed(2)
//!     .label("end")
//!     .ret(true);
//! let instructions = asm.finish()?;
//!
//! let cfg = ControlFlowGraph::build(&instructions)?;
//! for block in cfg.blocks() {
//!     println!("{} -> {:?}", block.addr(), cfg.successors(block.addr()).collect::<Vec<_>>());
//! }
//! # Ok::<(), dsoscope::Error>(())
//! ```

mod block;
mod edge;
mod graph;

pub use block::BasicBlock;
pub use edge::{CfgEdge, CfgEdgeKind};
pub use graph::ControlFlowGraph;
