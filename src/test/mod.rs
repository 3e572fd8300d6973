//! Shared fixtures for the unit tests.
//!
//! - [`TestGraph`] is a minimal rooted graph used to exercise the generic algorithms
//!   without going through instruction decoding.
//! - The `programs` helpers assemble the instruction streams of the control flow
//!   shapes the structuring tests revolve around.


pub use graph::{addrs, TestGraph};
pub use programs::*;
