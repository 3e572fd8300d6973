use thiserror::Error;

use crate::utils::graph::Address;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant is fatal for the function currently being analysed. Structuring is a
/// deterministic computation, so there is nothing to retry; a caller processing many
/// functions reports the failure and moves on to the next function.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - The instruction stream or CFG violates the upstream contract
/// - [`Error::Empty`] - Empty input provided
///
/// ## Graph Invariant Errors
/// - [`Error::UnreachableNode`] - Dominance precondition violated
/// - [`Error::EdgeNotFound`] - Removing an edge that does not exist
/// - [`Error::DanglingEdges`] - Removing a node that still has incident edges
/// - [`Error::NodeNotFound`] - Addressing a node that is not part of the graph
/// - [`Error::GraphError`] - Other graph construction failures
///
/// ## Structuring Errors
/// - [`Error::UnsupportedBranching`] - A block with more than two successors
/// - [`Error::InvalidConditional`] - An else-arm that jumps back into its then-arm
/// - [`Error::NonTerminatingStructure`] - The reduction loop stopped making progress
///
/// # Examples
///
/// ```rust
/// use dsoscope::{Error, analysis::ControlFlowGraph};
///
/// match ControlFlowGraph::build(&[]) {
///     Err(Error::Empty) => println!("nothing to analyse"),
///     Err(e) => eprintln!("Other error: {}", e),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input is damaged and could not be processed.
    ///
    /// Raised when the instruction stream breaks the contract the structuring core relies on:
    /// addresses that do not increase, branch targets that are not instruction addresses, an
    /// entry block that is itself a jump target, and similar. The error includes the source
    /// location where the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// A node cannot be reached from the graph entry.
    ///
    /// Dominance is only defined for nodes reachable from the entry, so the dominator
    /// computation refuses graphs that contain such nodes.
    #[error("Node {0} is not reachable from the entry")]
    UnreachableNode(Address),

    /// An edge that was expected to exist is missing.
    ///
    /// Indicates a bug in a graph rewrite rather than bad input.
    #[error("Edge {from} -> {to} does not exist")]
    EdgeNotFound {
        /// Source of the missing edge
        from: Address,
        /// Target of the missing edge
        to: Address,
    },

    /// A node was removed while edges still reference it.
    #[error("Node {0} still has incident edges")]
    DanglingEdges(Address),

    /// A node address is not part of the graph.
    #[error("Node {0} does not exist")]
    NodeNotFound(Address),

    /// A region graph node has more successors than a binary branch can produce.
    #[error("Node {addr} has {successors} successors, at most 2 are supported")]
    UnsupportedBranching {
        /// Address of the offending node
        addr: Address,
        /// Number of successors found
        successors: usize,
    },

    /// The else-arm of a conditional targets its own then-arm.
    #[error("Unexpected conditional inversion at {0}")]
    InvalidConditional(Address),

    /// The reduction loop stopped making progress before the graph collapsed.
    ///
    /// Raised when a full pass over the region graph performs no reduction, or when the
    /// configured pass limit is reached, while more than one node remains.
    #[error("Structuring made no progress after {passes} passes, {remaining} nodes remain")]
    NonTerminatingStructure {
        /// Nodes left in the region graph
        remaining: usize,
        /// Passes executed before giving up
        passes: usize,
    },

    /// Generic graph construction error.
    #[error("{0}")]
    GraphError(String),
}
