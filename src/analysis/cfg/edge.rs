//! Control flow graph edge types.
//!
//! DSO bytecode only has binary branches: an instruction either falls through, jumps,
//! or conditionally does one of the two. Edges record which of these paths they are.

use crate::utils::graph::Address;

/// The kind of control flow an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CfgEdgeKind {
    /// The block ends without a branch and falls into the next block.
    Fallthrough,

    /// The branch at the end of the block is taken.
    ///
    /// Used for both unconditional jumps and the target of conditional jumps.
    Taken,

    /// The conditional branch at the end of the block is not taken and execution
    /// continues with the next block.
    NotTaken,
}

impl CfgEdgeKind {
    /// Returns `true` if this edge leaves a block that ends in a conditional branch.
    ///
    /// A [`Taken`](Self::Taken) edge is only conditional when its block also has a
    /// [`NotTaken`](Self::NotTaken) edge; look at the block's terminator to tell.
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        matches!(self, Self::Taken | Self::NotTaken)
    }

    /// Label used in DOT output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Fallthrough => "",
            Self::Taken => "taken",
            Self::NotTaken => "not taken",
        }
    }
}

/// An edge in the control flow graph.
///
/// # Examples
///
/// ```rust
/// use dsoscope::analysis::{CfgEdge, CfgEdgeKind};
/// use dsoscope::utils::graph::Address;
///
/// let edge = CfgEdge::new(Address::new(12), CfgEdgeKind::Taken);
/// assert_eq!(edge.target(), Address::new(12));
/// assert!(edge.kind().is_branch());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgEdge {
    /// The target block of this edge.
    target: Address,
    /// The kind of control flow this edge represents.
    kind: CfgEdgeKind,
}

impl CfgEdge {
    /// Creates a new CFG edge.
    #[must_use]
    pub const fn new(target: Address, kind: CfgEdgeKind) -> Self {
        Self { target, kind }
    }

    /// Returns the address of the target block.
    #[must_use]
    pub const fn target(&self) -> Address {
        self.target
    }

    /// Returns the kind of control flow this edge represents.
    #[must_use]
    pub const fn kind(&self) -> CfgEdgeKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_flags() {
        assert!(!CfgEdgeKind::Fallthrough.is_branch());
        assert!(CfgEdgeKind::Taken.is_branch());
        assert!(CfgEdgeKind::NotTaken.is_branch());
    }

    #[test]
    fn test_edge_kind_labels() {
        assert_eq!(CfgEdgeKind::Fallthrough.label(), "");
        assert_eq!(CfgEdgeKind::NotTaken.label(), "not taken");
    }
}
