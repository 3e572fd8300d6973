//! Structuring whole functions and whole files.

use rayon::prelude::*;

use crate::{
    analysis::{
        cfg::ControlFlowGraph,
        structure::{StructureAnalyzer, StructureConfig, VirtualRegion},
    },
    disassembler::Disassembly,
    utils::graph::Address,
    Result,
};

/// Structures a single function.
///
/// # Errors
///
/// Returns any error raised by [`StructureAnalyzer::analyze`].
pub fn structure_function<'a>(
    cfg: &ControlFlowGraph<'a>,
    config: &StructureConfig,
) -> Result<VirtualRegion<'a>> {
    StructureAnalyzer::new(cfg, *config).analyze()
}

/// Outcome of structuring one function of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionStructure<'a> {
    /// Qualified function name, `Namespace::name` for namespaced functions
    pub name: String,
    /// Address of the declaring instruction
    pub addr: Address,
    /// The structured body, or the reason it could not be structured
    pub result: Result<VirtualRegion<'a>>,
}

impl FunctionStructure<'_> {
    /// Returns `true` if the function was structured.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Structures every function with a body in `disassembly`.
///
/// Functions are independent, so they are processed in parallel. The results keep the
/// order of the declarations, and a function that fails does not affect the others.
///
/// # Errors
///
/// Returns an error only if the function bodies cannot be located in the listing.
/// Per-function failures are reported in [`FunctionStructure::result`].
pub fn structure_functions<'a>(
    disassembly: &'a Disassembly,
    config: &StructureConfig,
) -> Result<Vec<FunctionStructure<'a>>> {
    let functions = disassembly.functions()?;

    let structured = functions
        .par_iter()
        .map(|function| {
            let result = ControlFlowGraph::build(function.body())
                .and_then(|cfg| structure_function(&cfg, config));
            FunctionStructure {
                name: function.qualified_name(),
                addr: function.decl().addr(),
                result,
            }
        })
        .collect();

    Ok(structured)
}
