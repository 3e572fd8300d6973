//! Shared utilities: the generic graph layer and DOT rendering helpers.

mod dot;
pub mod graph;

pub use dot::escape_dot;
pub(crate) use dot::dot_label;
