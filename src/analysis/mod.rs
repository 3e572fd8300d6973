//! Control flow analysis of DSO functions.
//!
//! This module turns the instruction list of a function into structured control flow.
//! It builds upon the generic graph infrastructure in [`crate::utils::graph`].
//!
//! # Architecture
//!
//! - [`cfg`] - Basic blocks and the control flow graph between them
//! - [`structure`] - Reduction of the control flow graph into nested regions
//!
//! The CFG is built once and never mutated. Structuring copies it into a
//! [`RegionGraph`] and works on that copy.
//!
//! # Usage
//!
//! ```rust
//! use dsoscope::analysis::{ControlFlowGraph, StructureAnalyzer, StructureConfig, VirtualRegion};
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
//! let region = StructureAnalyzer::new(&cfg, StructureConfig::default()).analyze()?;
//!
//! let VirtualRegion::Sequence(children) = &region else {
//!     panic!("expected a sequence");
//! };
//! assert!(matches!(children[0], VirtualRegion::Conditional { .. }));
//! # Ok::<(), dsoscope::Error>(())
//! ```

pub mod cfg;
pub mod structure;

pub use cfg::{BasicBlock, CfgEdge, CfgEdgeKind, ControlFlowGraph};
pub use structure::{
    structure_function, structure_functions, FunctionStructure, RegionGraph, StructureAnalyzer,
    StructureConfig, VirtualRegion,
};
