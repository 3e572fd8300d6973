//! Control flow structuring.
//!
//! Structuring turns the flat control flow graph of a function into a tree of nested
//! regions: sequences, conditionals and loops. The analysis works on a [`RegionGraph`],
//! a mutable copy of the CFG, and folds recognizable shapes into [`VirtualRegion`]s
//! until only the entry node is left. Its region is the structured function.
//!
//! # Key Components
//!
//! - [`StructureAnalyzer`] - The fixed-point reduction loop
//! - [`RegionGraph`] - Mutable graph with ordered, rewritable edges
//! - [`VirtualRegion`] - The structured output tree
//! - [`StructureConfig`] - Loop handling and pass limit
//! - [`structure_functions`] - Parallel structuring of every function in a listing
//!
//! # Examples
//!
//! ```rust
//! use dsoscope::analysis::{structure_function, ControlFlowGraph, StructureConfig};
//! use dsoscope::disassembler::Assembler;
//!
//! let mut asm = Assembler::new();
//! asm.load_immed(3)
//!     .save_var("%i")
//!     .label("head")
//!     .load_var("%i")
//!     .jmp_if_not("exit")
//!     .load_immed(0)
//!     .save_var("%i")
//!     .jmp("head")
//!     .label("exit")
//!     .ret(false);
//! let instructions = asm.finish()?;
//! let cfg = ControlFlowGraph::build(&instructions)?;
//!
//! let region = structure_function(&cfg, &StructureConfig::default())?;
//! println!("{region}");
//! # Ok::<(), dsoscope::Error>(())
//! ```

mod analyzer;
mod config;
mod functions;
mod graph;
mod region;

pub use analyzer::StructureAnalyzer;
pub use config::StructureConfig;
pub use functions::{structure_function, structure_functions, FunctionStructure};
pub use graph::RegionGraph;
pub use region::VirtualRegion;
