//! Fallthrough reification
//!
//! A relocated block can no longer rely on the block that happened to sit
//! after it in memory. Reification makes that implicit edge explicit: every
//! modifiable block whose terminator can fall through gets a
//! [`Fallthrough::To`] annotation naming the symbolic block its original
//! successor became. The block assembler later turns that annotation into an
//! unconditional jump.

use std::collections::HashMap;

use crate::addr::{ConcreteAddr, SymbolicAddr};
use crate::block::{
    BlockStatus, ConcreteBlock, Fallthrough, FallthroughBlock, LayoutPair, SymbolicBlock,
};
use crate::error::{LayoutError, LayoutResult};
use crate::isa::{Isa, MemoryView};

/// Index from a block's original start address to the symbolic block derived
/// from it. Built over *all* layout pairs, modified or not: an unmodified
/// block can still be some modified block's fallthrough successor.
#[derive(Debug, Default)]
pub struct SuccessorMap {
    by_origin: HashMap<ConcreteAddr, SymbolicAddr>,
}

impl SuccessorMap {
    pub fn build<I>(pairs: &[LayoutPair<I>]) -> Self {
        let by_origin = pairs
            .iter()
            .map(|pair| (pair.original.addr, pair.rewritten.symbol))
            .collect();
        Self { by_origin }
    }

    /// The symbolic block whose original sits immediately after `original`.
    pub fn successor_of<I>(&self, original: &ConcreteBlock<I>) -> Option<SymbolicAddr> {
        self.by_origin.get(&original.end()).copied()
    }
}

/// Reify the fallthrough of one modifiable block, turning it into a
/// [`FallthroughBlock`]. `original` is the concrete block `block` was
/// derived from and `status` the status of their layout pair.
///
/// An `Immutable` pair must never reach this step; an empty block cannot be
/// given a terminator annotation. Both are hard errors.
pub fn reify<A: Isa>(
    isa: &A,
    mem: &dyn MemoryView,
    successors: &SuccessorMap,
    original: &ConcreteBlock<A::Instr>,
    status: BlockStatus,
    block: SymbolicBlock<A::Instr>,
) -> LayoutResult<FallthroughBlock<A::Instr>> {
    if status == BlockStatus::Immutable {
        return Err(LayoutError::ImmutableBlockModified(original.addr));
    }

    let last = match block.instructions.last() {
        Some(si) => si,
        None => return Err(LayoutError::EmptyBlock(original.addr)),
    };

    // Classify against the address the terminator would have at the end of
    // the original block; the classifier only needs it to resolve relative
    // displacements, the result is discarded with the fake address.
    let fake_at = original.end() + -(isa.instruction_size(&last.instr) as i64);
    let kind = isa.classify_jump(&last.instr, mem, fake_at);

    let mut tags = vec![Fallthrough::No; block.instructions.len()];
    if !kind.is_unconditional_transfer() {
        match successors.successor_of(original) {
            Some(successor) => {
                let last_index = tags.len() - 1;
                tags[last_index] = Fallthrough::To(successor);
            }
            None => return Err(LayoutError::MissingFallthroughSuccessor(original.addr)),
        }
    }

    Ok(FallthroughBlock { block, tags })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::SymbolSource;
    use crate::support::{
        at, call, concrete_block, cond_jump, jump, plain, ret, symbolic_block, unchanged_pair,
        MockIsa, NullMemory,
    };

    fn reify_pair(
        pairs: &[LayoutPair<crate::support::MockInstr>],
        index: usize,
    ) -> LayoutResult<FallthroughBlock<crate::support::MockInstr>> {
        let successors = SuccessorMap::build(pairs);
        let pair = pairs[index].clone();
        reify(
            &MockIsa,
            &NullMemory,
            &successors,
            &pair.original,
            pair.status,
            pair.rewritten,
        )
    }

    #[test]
    fn test_unconditional_terminator_needs_no_successor() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![unchanged_pair(
            &mut symbols,
            0x1000,
            vec![plain(3), ret()],
            BlockStatus::Modified,
        )];

        let tagged = reify_pair(&pairs, 0).unwrap();
        assert_eq!(tagged.tags, vec![Fallthrough::No, Fallthrough::No]);
    }

    #[test]
    fn test_conditional_jump_gets_fallthrough() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            unchanged_pair(
                &mut symbols,
                0x1000,
                vec![plain(6), cond_jump()],
                BlockStatus::Modified,
            ),
            unchanged_pair(
                &mut symbols,
                0x1008,
                vec![plain(3), ret()],
                BlockStatus::Unmodified,
            ),
        ];
        let successor = pairs[1].rewritten.symbol;

        let tagged = reify_pair(&pairs, 0).unwrap();
        assert_eq!(
            tagged.tags,
            vec![Fallthrough::No, Fallthrough::To(successor)]
        );
    }

    #[test]
    fn test_call_terminator_gets_fallthrough() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            unchanged_pair(&mut symbols, 0x1000, vec![call()], BlockStatus::Modified),
            unchanged_pair(
                &mut symbols,
                0x1005,
                vec![ret()],
                BlockStatus::Unmodified,
            ),
        ];
        let successor = pairs[1].rewritten.symbol;

        let tagged = reify_pair(&pairs, 0).unwrap();
        assert_eq!(tagged.terminator_tag(), Some(Fallthrough::To(successor)));
    }

    #[test]
    fn test_plain_terminator_gets_fallthrough() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            unchanged_pair(
                &mut symbols,
                0x1000,
                vec![plain(4)],
                BlockStatus::Modified,
            ),
            unchanged_pair(
                &mut symbols,
                0x1004,
                vec![ret()],
                BlockStatus::Unmodified,
            ),
        ];
        let successor = pairs[1].rewritten.symbol;

        let tagged = reify_pair(&pairs, 0).unwrap();
        assert_eq!(tagged.terminator_tag(), Some(Fallthrough::To(successor)));
    }

    #[test]
    fn test_unconditional_jump_terminator() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![unchanged_pair(
            &mut symbols,
            0x1000,
            vec![plain(2), jump()],
            BlockStatus::Modified,
        )];

        let tagged = reify_pair(&pairs, 0).unwrap();
        assert_eq!(tagged.terminator_tag(), Some(Fallthrough::No));
    }

    #[test]
    fn test_missing_successor_is_fatal() {
        let mut symbols = SymbolSource::new();
        // Conditional terminator but nothing at 0x1008.
        let pairs = vec![unchanged_pair(
            &mut symbols,
            0x1000,
            vec![plain(6), cond_jump()],
            BlockStatus::Modified,
        )];

        let err = reify_pair(&pairs, 0).unwrap_err();
        assert_eq!(err, LayoutError::MissingFallthroughSuccessor(at(0x1000)));
    }

    #[test]
    fn test_empty_block_is_fatal() {
        let mut symbols = SymbolSource::new();
        let pair = LayoutPair {
            original: concrete_block(0x1000, vec![]),
            rewritten: symbolic_block(symbols.fresh(), vec![]),
            status: BlockStatus::Modified,
        };

        let err = reify_pair(&[pair], 0).unwrap_err();
        assert_eq!(err, LayoutError::EmptyBlock(at(0x1000)));
    }

    #[test]
    fn test_immutable_block_is_fatal() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![unchanged_pair(
            &mut symbols,
            0x1000,
            vec![plain(3), ret()],
            BlockStatus::Immutable,
        )];

        let err = reify_pair(&pairs, 0).unwrap_err();
        assert_eq!(err, LayoutError::ImmutableBlockModified(at(0x1000)));
    }
}
