//! Graph algorithms for control flow structuring.
//!
//! # Available Algorithms
//!
//! ## Traversal
//!
//! - [`postorder`] - Lazy postorder traversal, the visiting order of the reduction loop
//! - [`reverse_postorder`] - Reverse postorder traversal (useful for data flow)
//!
//! ## Dominator Analysis
//!
//! - [`DominatorTree`] - Iterative dominator computation and dominance queries
//!
//! # Algorithm Selection
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | Postorder | O(V + E) | Inner-first reduction order |
//! | Dominators | O(V + E) per sweep | Back edge and loop header detection |

mod dominators;
mod traversal;

pub use dominators::{DominatorIterator, DominatorTree};
pub use traversal::{postorder, reverse_postorder, Postorder};
