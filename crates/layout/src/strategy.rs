// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Layout strategy configuration
//!
//! A [`LayoutStrategy`] fixes all three dimensions of a layout run. There is
//! deliberately no `Default`: the caller must spell out a complete strategy.

/// How chunks are ordered before allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOrder {
    /// Descending by total chunk size, largest first.
    Sorted,
    /// Fisher–Yates shuffle driven by a ChaCha20 stream seeded with the
    /// given 256-bit value. Identical seeds replay identical orders.
    Random([u8; 32]),
}

/// Which allocator places the chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorKind {
    /// Input order preserved; the free-space heap is never consulted and
    /// every chunk bump-allocates in the fresh region. All reclaimed space
    /// becomes padding.
    Parallel,
    /// Best-fit from the free-space heap with bump-allocation fallback,
    /// visiting chunks in the given order.
    Compact(ChunkOrder),
}

/// How blocks are partitioned into chunks that must stay contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// Every modified block is its own chunk.
    Block,
    /// Blocks of one strongly-connected component (per the supplied weak
    /// topological ordering) form one chunk.
    Loop,
    /// All blocks of one function form one chunk.
    Function,
}

/// How redirections are chosen for modified blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrampolineStrategy {
    /// Every relocated block gets a trampoline at its original address.
    Always,
    /// Functions whose blocks are all modified, disjoint from every other
    /// function, and whose entry can host a jump get a single trampoline at
    /// the entry; interior blocks donate their full byte range.
    WholeFunction,
}

/// Complete configuration for one layout run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutStrategy {
    pub allocator: AllocatorKind,
    pub grouping: Grouping,
    pub trampolines: TrampolineStrategy,
}
