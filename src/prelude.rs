//! # dsoscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dsoscope library. Import this module to get quick access to everything needed
//! to go from an instruction list to a structured function.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dsoscope operations
pub use crate::Error;

/// The result type used throughout dsoscope
pub use crate::Result;

/// Configuration for control flow structuring
pub use crate::StructureConfig;

// ================================================================================================
// Instructions
// ================================================================================================

/// Instruction model and listings
pub use crate::disassembler::{
    Assembler, BranchKind, CallType, Disassembly, FunctionBody, Instruction, InstructionKind,
    Opcode, OpcodeCategory,
};

// ================================================================================================
// Analysis
// ================================================================================================

/// Control flow graph construction
pub use crate::analysis::{BasicBlock, CfgEdge, CfgEdgeKind, ControlFlowGraph};

/// Control flow structuring
pub use crate::analysis::{
    structure_function, structure_functions, FunctionStructure, RegionGraph, StructureAnalyzer,
    VirtualRegion,
};

// ================================================================================================
// Graph Infrastructure
// ================================================================================================

/// Node addresses and graph traits
pub use crate::utils::graph::{Address, GraphBase, Predecessors, RootedGraph, Successors};

/// Dominance
pub use crate::utils::graph::algorithms::DominatorTree;
