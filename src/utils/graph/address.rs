//! Instruction address type used as the node key of every graph.
//!
//! Basic blocks, region graph nodes and memoized regions are all identified by the
//! address of their first instruction. [`Address`] wraps that raw code offset so it
//! cannot be confused with instruction counts, table indices or other integers.

use std::fmt;

/// Address of an instruction inside a DSO code stream.
///
/// `Address` wraps the `u32` code offset assigned by the disassembler. Addresses are unique
/// and strictly increasing within a function, which makes them a stable key for graph
/// nodes even while the region graph is being rewritten.
///
/// # Examples
///
/// ```rust
/// use dsoscope::utils::graph::Address;
/// use std::collections::HashMap;
///
/// let entry = Address::new(0);
/// let join = Address::new(12);
/// assert!(entry < join);
///
/// let mut names: HashMap<Address, &str> = HashMap::new();
/// names.insert(join, "join");
/// assert_eq!(names.get(&Address::new(12)), Some(&"join"));
/// ```
///
/// # Thread Safety
///
/// `Address` is [`Copy`], [`Send`], and [`Sync`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub(crate) u32);

impl Address {
    /// Creates a new `Address` from a raw code offset.
    #[must_use]
    #[inline]
    pub const fn new(value: u32) -> Self {
        Address(value)
    }

    /// Returns the raw code offset.
    #[must_use]
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl From<u32> for Address {
    #[inline]
    fn from(value: u32) -> Self {
        Address(value)
    }
}

impl From<Address> for u32 {
    #[inline]
    fn from(addr: Address) -> Self {
        addr.0
    }
}
