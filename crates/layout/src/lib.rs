//! Block-layout engine for the static binary rewriter
//!
//! Given the recovered basic blocks of an executable, some modified by
//! transformation passes and some untouched, this crate decides where every
//! rewritten block lives: in a hole reclaimed from the original `.text` or in
//! the freshly appended code region. Along the way it makes implicit
//! fallthrough control flow explicit, so a relocated block no longer depends
//! on whatever happened to sit after it in memory.
//!
//! # Pipeline
//!
//! [`driver::LayoutSession`] sequences the stages, leaves first:
//!
//! 1. [`group`]: partition blocks into chunks that must stay contiguous
//!    (per block, per loop, or per function).
//! 2. [`fallthrough`]: annotate every relocatable block's terminator with
//!    its explicit successor.
//! 3. [`freespace`]: account for the bytes each redirected block gives
//!    back, coalesce them, and build a largest-first heap.
//! 4. [`alloc`]: best-fit chunks into holes, bump-allocate the rest in the
//!    fresh region, place injected payloads.
//! 5. [`padding`]: turn whatever is left of the heap into trap fill.
//!
//! The engine is single-threaded and architecture-agnostic: everything it
//! needs from the target machine goes through the [`Isa`] trait.

pub mod addr;
pub mod alloc;
pub mod block;
pub mod driver;
pub mod error;
pub mod fallthrough;
pub mod freespace;
pub mod group;
pub mod isa;
pub mod padding;
pub mod strategy;

#[cfg(test)]
pub(crate) mod support;

pub use addr::{ConcreteAddr, SegmentId, SymbolSource, SymbolicAddr};
pub use block::{
    AddressedBlock, AddressedPair, BlockStatus, BranchTarget, ConcreteBlock, Fallthrough,
    FallthroughBlock, InjectedCode, LayoutPair, SymbolicBlock, SymbolicInstruction,
};
pub use driver::{Diagnostic, Layout, LayoutInput, LayoutSession};
pub use error::{LayoutError, LayoutResult};
pub use group::{FunctionMap, Wto};
pub use isa::{Cond, Isa, JumpKind, MemoryView};
pub use strategy::{AllocatorKind, ChunkOrder, Grouping, LayoutStrategy, TrampolineStrategy};
