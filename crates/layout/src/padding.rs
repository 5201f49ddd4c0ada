//! Padding emission
//!
//! Whatever is left in the free-space heap after allocation becomes padding:
//! synthetic blocks of architecture-defined trap bytes, so a stray transfer
//! into reclaimed code lands on a trap instead of half an instruction.

use crate::block::ConcreteBlock;
use crate::freespace::FreeHeap;
use crate::isa::Isa;

/// Drain the residual heap into padding blocks, ordered by ascending
/// address.
pub fn drain_into_padding<A: Isa>(isa: &A, heap: FreeHeap) -> Vec<ConcreteBlock<A::Instr>> {
    heap.into_spans_ascending()
        .into_iter()
        .map(|span| ConcreteBlock::new(span.addr, span.len, isa.make_padding(span.len)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freespace::PreHeap;
    use crate::support::{at, MockIsa};

    #[test]
    fn test_padding_covers_residual_spans_in_address_order() {
        let mut pre = PreHeap::new();
        pre.insert(at(0x1219), 7).unwrap();
        pre.insert(at(0x102d), 3).unwrap();
        pre.insert(at(0x110f), 1).unwrap();
        let heap = pre.coalesce().unwrap();

        let padding = drain_into_padding(&MockIsa, heap);
        let placed: Vec<(u64, u64)> = padding
            .iter()
            .map(|block| (block.addr.offset(), block.size))
            .collect();
        assert_eq!(placed, vec![(0x102d, 3), (0x110f, 1), (0x1219, 7)]);

        // Fill instructions account for every byte of the hole.
        for block in &padding {
            let total: u64 = block.instructions.iter().map(|i| i.size).sum();
            assert_eq!(total, block.size);
        }
    }

    #[test]
    fn test_empty_heap_yields_no_padding() {
        let padding = drain_into_padding(&MockIsa, FreeHeap::default());
        assert!(padding.is_empty());
    }
}
