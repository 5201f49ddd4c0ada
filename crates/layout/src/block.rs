// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Block model
//!
//! Blocks travel through the pipeline as a progression of variants, each
//! enriching the previous:
//!
//! 1. [`ConcreteBlock`]: decoded bytes at a known address.
//! 2. [`SymbolicBlock`]: instructions whose branch targets have been
//!    rewritten to symbolic addresses.
//! 3. [`FallthroughBlock`]: a symbolic block whose instructions carry
//!    explicit fallthrough annotations.
//! 4. [`AddressedBlock`]: a fallthrough block with its final address and
//!    reserved size.
//!
//! Blocks reference each other by symbolic address, never by pointer; the
//! layout engine operates on flat collections keyed by those identifiers.

use crate::addr::{ConcreteAddr, SymbolicAddr};

/// How a transformation pass left a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// Untouched; keep in place, do not relocate.
    Unmodified,
    /// Altered by a pass; must be relocated.
    Modified,
    /// Pinned by a pass; keep in place even if touched.
    Immutable,
    /// Original bytes fully reclaimed by other blocks' redirections.
    Subsumed,
}

/// A contiguous byte range at a known address, owning its decoded
/// instructions. Invariant: the instruction sizes sum to `size`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcreteBlock<I> {
    pub addr: ConcreteAddr,
    pub size: u64,
    pub instructions: Vec<I>,
}

impl<I> ConcreteBlock<I> {
    pub fn new(addr: ConcreteAddr, size: u64, instructions: Vec<I>) -> Self {
        Self {
            addr,
            size,
            instructions,
        }
    }

    /// Address one past the last byte of this block.
    pub fn end(&self) -> ConcreteAddr {
        self.addr + self.size as i64
    }
}

/// Where a rewritten branch points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTarget {
    /// A block (or injected payload) inside the rewrite set; resolved by the
    /// allocator.
    Symbol(SymbolicAddr),
    /// An address outside the rewrite set that keeps its meaning (e.g. a call
    /// into code that is not being rewritten).
    Fixed(ConcreteAddr),
}

/// An instruction whose branch target, if any, has been made
/// address-independent.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicInstruction<I> {
    pub instr: I,
    pub target: Option<BranchTarget>,
}

/// An ordered sequence of symbolic instructions, identified by the symbolic
/// address other blocks use to refer to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicBlock<I> {
    pub symbol: SymbolicAddr,
    pub instructions: Vec<SymbolicInstruction<I>>,
}

/// Fallthrough annotation carried by each instruction of a
/// [`FallthroughBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallthrough {
    /// Control does not implicitly continue past this instruction.
    No,
    /// Control falls through to the block identified by this symbol.
    To(SymbolicAddr),
}

/// A symbolic block with explicit fallthrough annotations; `tags[i]` belongs
/// to `block.instructions[i]`. After reification only the last instruction
/// may carry [`Fallthrough::To`].
#[derive(Debug, Clone, PartialEq)]
pub struct FallthroughBlock<I> {
    pub block: SymbolicBlock<I>,
    pub tags: Vec<Fallthrough>,
}

impl<I> FallthroughBlock<I> {
    /// Tag every instruction [`Fallthrough::No`]. Used for blocks that are
    /// emitted in place and never reassembled.
    pub fn vacuous(block: SymbolicBlock<I>) -> Self {
        let tags = vec![Fallthrough::No; block.instructions.len()];
        Self { block, tags }
    }

    /// The annotation on the final instruction, if the block is non-empty.
    pub fn terminator_tag(&self) -> Option<Fallthrough> {
        self.tags.last().copied()
    }
}

/// A fallthrough block plus its final address and the byte size reserved for
/// its reassembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressedBlock<I> {
    pub block: FallthroughBlock<I>,
    pub addr: ConcreteAddr,
    pub reserved: u64,
}

/// A block as supplied by block recovery: the original concrete block, the
/// symbolic block derived from it, and the status a pass left it in.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPair<I> {
    pub original: ConcreteBlock<I>,
    pub rewritten: SymbolicBlock<I>,
    pub status: BlockStatus,
}

/// A layout pair after address assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressedPair<I> {
    pub original: ConcreteBlock<I>,
    pub rewritten: AddressedBlock<I>,
    pub status: BlockStatus,
}

impl<I> AddressedPair<I> {
    /// True if the rewritten block lives somewhere other than its original
    /// site and therefore needs a redirection at the original address.
    pub fn is_relocated(&self) -> bool {
        self.rewritten.reserved != 0
    }
}

/// A raw byte payload to be placed at a fresh symbolic address alongside the
/// rewritten blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectedCode {
    pub symbol: SymbolicAddr,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{SegmentId, SymbolSource};

    #[test]
    fn test_block_end() {
        let block: ConcreteBlock<()> =
            ConcreteBlock::new(ConcreteAddr::new(SegmentId(0), 0x1000), 0x30, vec![]);
        assert_eq!(block.end().offset(), 0x1030);
    }

    #[test]
    fn test_vacuous_tags() {
        let mut symbols = SymbolSource::new();
        let block = SymbolicBlock {
            symbol: symbols.fresh(),
            instructions: vec![
                SymbolicInstruction {
                    instr: (),
                    target: None,
                },
                SymbolicInstruction {
                    instr: (),
                    target: None,
                },
            ],
        };
        let tagged = FallthroughBlock::vacuous(block);
        assert_eq!(tagged.tags, vec![Fallthrough::No, Fallthrough::No]);
        assert_eq!(tagged.terminator_tag(), Some(Fallthrough::No));
    }
}
