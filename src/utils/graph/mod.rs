//! Graph infrastructure shared by the control flow graph and the region graph.
//!
//! # Architecture
//!
//! - **Core Types**: [`Address`] identifies a node by the address of its first
//!   instruction, so a node keeps its identity while the region graph is rewritten
//! - **Traits**: [`GraphBase`], [`Successors`], [`Predecessors`] and [`RootedGraph`]
//!   abstract over the concrete graphs
//! - **Algorithms**: postorder traversal and dominator computation, written against the
//!   traits
//!
//! # Usage Examples
//!
//! ```rust
//! use dsoscope::analysis::ControlFlowGraph;
//! use dsoscope::disassembler::Assembler;
//! use dsoscope::utils::graph::{algorithms::DominatorTree, RootedGraph, Successors};
//!
//! let mut asm = Assembler::new();
//! asm.load_var("$a")
//!     .jmp_if_not("else")
//!     .load_immed(1)
//!     .jmp("end")
//!     .label("else")
//!     .load_immed(2)
//!     .label("end")
//!     .ret(true);
//! let instructions = asm.finish()?;
//! let cfg = ControlFlowGraph::build(&instructions)?;
//!
//! assert_eq!(Successors::successors(&cfg, cfg.entry()).count(), 2);
//!
//! let dom = DominatorTree::build(&cfg)?;
//! let join = cfg.blocks().last().map(|block| block.addr()).unwrap_or_default();
//! assert_eq!(dom.immediate_dominator(join), Some(RootedGraph::entry(&cfg)));
//! # Ok::<(), dsoscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! All types in this module are [`Send`] and [`Sync`].

mod address;
mod traits;

pub mod algorithms;

pub use address::Address;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
