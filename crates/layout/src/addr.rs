//! Typed addresses for the layout engine
//!
//! Concrete addresses are tagged with the address space (segment) they belong
//! to; mixing addresses from two spaces is a programming error and asserts.
//! Symbolic addresses stand in for addresses that have not been chosen yet.

use std::fmt;
use std::ops::{Add, Sub};

/// Identifies an address space. Addresses from distinct spaces must never be
/// combined arithmetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u16);

/// An address in the original or rewritten binary.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConcreteAddr {
    segment: SegmentId,
    offset: u64,
}

impl ConcreteAddr {
    /// Create an address at `offset` within `segment`.
    pub fn new(segment: SegmentId, offset: u64) -> Self {
        Self { segment, offset }
    }

    /// The address space this address belongs to.
    pub fn segment(&self) -> SegmentId {
        self.segment
    }

    /// Byte offset within the address space.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Round up to the next multiple of `align` (which must be a power of two).
    pub fn align_up(self, align: u64) -> Self {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        Self {
            segment: self.segment,
            offset: (self.offset + align - 1) & !(align - 1),
        }
    }
}

impl Add<i64> for ConcreteAddr {
    type Output = ConcreteAddr;

    fn add(self, delta: i64) -> ConcreteAddr {
        let offset = self
            .offset
            .checked_add_signed(delta)
            .unwrap_or_else(|| panic!("address overflow: {self} + {delta}"));
        ConcreteAddr {
            segment: self.segment,
            offset,
        }
    }
}

impl Sub<ConcreteAddr> for ConcreteAddr {
    type Output = i64;

    /// Byte distance between two addresses of the same address space.
    fn sub(self, other: ConcreteAddr) -> i64 {
        assert_eq!(
            self.segment, other.segment,
            "subtracting addresses from distinct address spaces: {self} - {other}"
        );
        self.offset.wrapping_sub(other.offset) as i64
    }
}

impl fmt::Display for ConcreteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg{}:{:#x}", self.segment.0, self.offset)
    }
}

impl fmt::Debug for ConcreteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// An opaque identifier standing in for an address that has not been assigned
/// yet. Allocated monotonically by [`SymbolSource`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolicAddr(u64);

impl fmt::Display for SymbolicAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym#{}", self.0)
    }
}

impl fmt::Debug for SymbolicAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Monotonically increasing source of symbolic addresses.
///
/// One source lives for the whole rewrite session; block recovery, injected
/// code, and any transformation pass draw from the same source so that
/// identifiers never collide.
#[derive(Debug, Default)]
pub struct SymbolSource {
    next: u64,
}

impl SymbolSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh symbolic address.
    pub fn fresh(&mut self) -> SymbolicAddr {
        let sym = SymbolicAddr(self.next);
        self.next += 1;
        sym
    }
}
