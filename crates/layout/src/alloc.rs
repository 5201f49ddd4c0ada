//! Address assignment
//!
//! Chunks are placed by best-fit from the free-space heap (largest hole
//! first) and fall back to bump-allocation in the fresh code region when no
//! hole is big enough. Injected payloads always bump-allocate. The residual
//! heap is handed back for padding emission.

use std::cmp::Reverse;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::addr::ConcreteAddr;
use crate::freespace::{FreeHeap, FreeSpan};
use crate::strategy::{AllocatorKind, ChunkOrder};

/// Reorder `items` as the allocator strategy dictates. `total` yields an
/// item's byte size.
pub fn order_chunks<T>(items: &mut [T], total: impl Fn(&T) -> u64, allocator: AllocatorKind) {
    match allocator {
        AllocatorKind::Parallel => {}
        AllocatorKind::Compact(ChunkOrder::Sorted) => {
            // Stable sort: equal-sized chunks keep their input order.
            items.sort_by_key(|item| Reverse(total(item)));
        }
        AllocatorKind::Compact(ChunkOrder::Random(seed)) => {
            let mut rng = ChaCha20Rng::from_seed(seed);
            items.shuffle(&mut rng);
        }
    }
}

/// Assigns concrete addresses to chunks and injected payloads.
#[derive(Debug)]
pub struct Allocator {
    heap: FreeHeap,
    cursor: ConcreteAddr,
    reused_bytes: u64,
    use_heap: bool,
}

impl Allocator {
    /// `layout_base` is the first address of the fresh code region. With
    /// `use_heap` false (the `Parallel` allocator) every chunk
    /// bump-allocates and the heap drains untouched into padding.
    pub fn new(layout_base: ConcreteAddr, heap: FreeHeap, use_heap: bool) -> Self {
        Self {
            heap,
            cursor: layout_base,
            reused_bytes: 0,
            use_heap,
        }
    }

    /// Place one chunk, returning consecutive addresses for its blocks (one
    /// per entry of `sizes`) and whether the chunk landed in a reclaimed
    /// hole.
    pub fn place_chunk(&mut self, sizes: &[u64]) -> (Vec<ConcreteAddr>, bool) {
        let total: u64 = sizes.iter().sum();

        let mut base = None;
        if self.use_heap {
            if let Some(span) = self.heap.pop() {
                if span.len >= total {
                    if span.len > total {
                        self.heap.push(FreeSpan {
                            addr: span.addr + total as i64,
                            len: span.len - total,
                        });
                    }
                    self.reused_bytes += total;
                    base = Some(span.addr);
                } else {
                    // The largest hole does not fit; put it back and bump.
                    self.heap.push(span);
                }
            }
        }
        let from_heap = base.is_some();

        let mut next = match base {
            Some(addr) => addr,
            None => {
                let addr = self.cursor;
                self.cursor = self.cursor + total as i64;
                addr
            }
        };

        let mut addrs = Vec::with_capacity(sizes.len());
        for &size in sizes {
            addrs.push(next);
            next = next + size as i64;
        }
        (addrs, from_heap)
    }

    /// Place a raw payload of `len` bytes. Payloads never consume heap
    /// space.
    pub fn place_raw(&mut self, len: u64) -> ConcreteAddr {
        let addr = self.cursor;
        self.cursor = self.cursor + len as i64;
        addr
    }

    /// Heap bytes consumed by chunk placement so far.
    pub fn reused_bytes(&self) -> u64 {
        self.reused_bytes
    }

    /// One past the last fresh-region byte handed out.
    pub fn fresh_end(&self) -> ConcreteAddr {
        self.cursor
    }

    /// Hand back the residual heap for padding emission.
    pub fn into_remaining(self) -> FreeHeap {
        self.heap
    }
}
