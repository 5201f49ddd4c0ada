//! Layout driver
//!
//! Sequences the pipeline: group → reify fallthroughs → collect free space →
//! coalesce → order chunks → allocate blocks → allocate injected payloads →
//! drain the residual heap into padding. The session owns the diagnostics;
//! they stay readable after success and failure alike.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::addr::{ConcreteAddr, SymbolicAddr};
use crate::alloc::{order_chunks, Allocator};
use crate::block::{
    AddressedBlock, AddressedPair, BlockStatus, ConcreteBlock, FallthroughBlock, InjectedCode,
    LayoutPair,
};
use crate::error::{LayoutError, LayoutResult};
use crate::fallthrough::{reify, SuccessorMap};
use crate::freespace::PreHeap;
use crate::group::{group_pairs, Chunk, FunctionMap, Wto};
use crate::isa::{Isa, MemoryView};
use crate::padding::drain_into_padding;
use crate::strategy::{AllocatorKind, LayoutStrategy, TrampolineStrategy};

/// Everything one layout run consumes.
#[derive(Debug, Clone)]
pub struct LayoutInput<I> {
    /// All recovered blocks, in traversal order.
    pub pairs: Vec<LayoutPair<I>>,
    /// Raw payloads to place alongside the rewritten blocks.
    pub injected: Vec<InjectedCode>,
    /// First address of the fresh code region.
    pub layout_base: ConcreteAddr,
    /// Weak topological ordering of the CFG, for `Grouping::Loop`.
    pub wto: Option<Wto>,
    /// Function entry → block addresses, for `Grouping::Function` and
    /// `TrampolineStrategy::WholeFunction`.
    pub functions: Option<FunctionMap>,
}

/// The result of a layout run.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout<I> {
    /// Same traversal shape as the input pairs, now address-assigned.
    pub program_block_layout: Vec<AddressedPair<I>>,
    /// Trap fill for residual holes, ordered by ascending address.
    pub layout_padding_blocks: Vec<ConcreteBlock<I>>,
    /// `(symbol, assigned address, payload)` per injected item.
    pub injected_block_layout: Vec<(SymbolicAddr, ConcreteAddr, Vec<u8>)>,
    /// Heap bytes consumed by block placement.
    pub reused_bytes: u64,
    /// One past the last fresh-region byte in use.
    pub fresh_end: ConcreteAddr,
}

impl<I> Layout<I> {
    /// Resolve every symbolic address to its assigned concrete address:
    /// blocks (relocated or in place) and injected payloads alike.
    pub fn symbol_map(&self) -> HashMap<SymbolicAddr, ConcreteAddr> {
        let blocks = self
            .program_block_layout
            .iter()
            .map(|pair| (pair.rewritten.block.block.symbol, pair.rewritten.addr));
        let injected = self
            .injected_block_layout
            .iter()
            .map(|&(symbol, addr, _)| (symbol, addr));
        blocks.chain(injected).collect()
    }
}

/// Non-fatal observations recorded while laying out, in first-observed
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A modified block too small to host a redirection jump; kept in place.
    SmallBlock {
        addr: ConcreteAddr,
        size: u64,
        jump_size: u64,
    },
    /// A whole function was redirected through its entry; the interior
    /// blocks donated their full byte ranges.
    WholeFunctionRedirect {
        entry: ConcreteAddr,
        interior_blocks: usize,
    },
    /// No hole fit this chunk; it was bump-allocated in the fresh region.
    FreshAllocation {
        first_block: ConcreteAddr,
        size: u64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SmallBlock {
                addr,
                size,
                jump_size,
            } => write!(
                f,
                "block at {addr} ({size} bytes) cannot host a {jump_size}-byte redirection; kept in place"
            ),
            Diagnostic::WholeFunctionRedirect {
                entry,
                interior_blocks,
            } => write!(
                f,
                "function at {entry} redirected through its entry; {interior_blocks} interior block(s) subsumed"
            ),
            Diagnostic::FreshAllocation { first_block, size } => write!(
                f,
                "no hole fits chunk starting with block {first_block} ({size} bytes); bump-allocated"
            ),
        }
    }
}

/// One layout run. Owns the strategy and the diagnostics; all block state is
/// threaded through [`LayoutSession::run`].
pub struct LayoutSession<'a, A: Isa> {
    isa: &'a A,
    mem: &'a dyn MemoryView,
    strategy: LayoutStrategy,
    diagnostics: Vec<Diagnostic>,
}

/// A pair mid-pipeline: fallthroughs reified, address not yet assigned.
struct Slot<I> {
    original: ConcreteBlock<I>,
    status: BlockStatus,
    rewritten: FallthroughBlock<I>,
}

impl<'a, A: Isa> LayoutSession<'a, A> {
    pub fn new(isa: &'a A, mem: &'a dyn MemoryView, strategy: LayoutStrategy) -> Self {
        Self {
            isa,
            mem,
            strategy,
            diagnostics: Vec::new(),
        }
    }

    /// Diagnostics recorded so far, in first-observed order. Available after
    /// both successful and failed runs.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Run the layout pipeline to completion.
    pub fn run(&mut self, input: LayoutInput<A::Instr>) -> LayoutResult<Layout<A::Instr>> {
        let LayoutInput {
            pairs,
            injected,
            layout_base,
            wto,
            functions,
        } = input;

        // Group, then mark which pairs the chunks carry forward.
        let mut chunks = group_pairs(
            &pairs,
            self.strategy.grouping,
            wto.as_ref(),
            functions.as_ref(),
        );
        let mut modifiable = vec![false; pairs.len()];
        for chunk in &chunks {
            for &index in &chunk.members {
                modifiable[index] = true;
            }
        }

        // Reify fallthroughs on the modifiable pairs; everything else keeps
        // its implicit successor and is tagged vacuously.
        let successors = SuccessorMap::build(&pairs);
        let mut slots: Vec<Slot<A::Instr>> = Vec::with_capacity(pairs.len());
        for (index, pair) in pairs.into_iter().enumerate() {
            let LayoutPair {
                original,
                rewritten,
                status,
            } = pair;
            let rewritten = if modifiable[index] {
                reify(self.isa, self.mem, &successors, &original, status, rewritten)?
            } else {
                FallthroughBlock::vacuous(rewritten)
            };
            slots.push(Slot {
                original,
                status,
                rewritten,
            });
        }

        // Free-space accounting. Also under the Parallel allocator: the heap
        // is not consulted for placement there, but every reclaimed byte
        // still becomes padding.
        let pre_heap = self.collect_free_space(&mut slots, &mut modifiable, functions.as_ref())?;
        for chunk in &mut chunks {
            chunk.members.retain(|&index| modifiable[index]);
        }
        chunks.retain(|chunk| !chunk.members.is_empty());
        let heap = pre_heap.coalesce()?;

        // Order and allocate.
        let mut sized: Vec<(Chunk, Vec<u64>, u64)> = chunks
            .into_iter()
            .map(|chunk| {
                let sizes: Vec<u64> = chunk
                    .members
                    .iter()
                    .map(|&index| {
                        self.isa
                            .symbolic_block_size(&slots[index].rewritten, layout_base)
                    })
                    .collect();
                let total = sizes.iter().sum();
                (chunk, sizes, total)
            })
            .collect();
        order_chunks(&mut sized, |&(_, _, total)| total, self.strategy.allocator);

        let use_heap = matches!(self.strategy.allocator, AllocatorKind::Compact(_));
        let mut allocator = Allocator::new(layout_base, heap, use_heap);
        let mut assignments: Vec<Option<(ConcreteAddr, u64)>> = vec![None; slots.len()];
        for (chunk, sizes, total) in &sized {
            let (addrs, from_heap) = allocator.place_chunk(sizes);
            if use_heap && !from_heap {
                self.diagnostics.push(Diagnostic::FreshAllocation {
                    first_block: slots[chunk.members[0]].original.addr,
                    size: *total,
                });
            }
            for ((&index, addr), &size) in chunk.members.iter().zip(addrs).zip(sizes) {
                assignments[index] = Some((addr, size));
            }
        }

        // Injected payloads go after all blocks and never into holes.
        let injected_block_layout: Vec<(SymbolicAddr, ConcreteAddr, Vec<u8>)> = injected
            .into_iter()
            .map(|item| {
                let addr = allocator.place_raw(item.bytes.len() as u64);
                (item.symbol, addr, item.bytes)
            })
            .collect();

        let reused_bytes = allocator.reused_bytes();
        let fresh_end = allocator.fresh_end();
        let layout_padding_blocks = drain_into_padding(self.isa, allocator.into_remaining());

        // Final address tagging, preserving the input traversal shape.
        let mut program_block_layout = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            let pair = if modifiable[index] {
                let (addr, reserved) = assignments[index].ok_or(
                    LayoutError::UnassignedSymbolicBlock(slot.rewritten.block.symbol),
                )?;
                AddressedPair {
                    original: slot.original,
                    status: slot.status,
                    rewritten: AddressedBlock {
                        block: slot.rewritten,
                        addr,
                        reserved,
                    },
                }
            } else {
                // Emitted in place: original address, nothing reserved.
                let addr = slot.original.addr;
                AddressedPair {
                    original: slot.original,
                    status: slot.status,
                    rewritten: AddressedBlock {
                        block: slot.rewritten,
                        addr,
                        reserved: 0,
                    },
                }
            };
            program_block_layout.push(pair);
        }

        Ok(Layout {
            program_block_layout,
            layout_padding_blocks,
            injected_block_layout,
            reused_bytes,
            fresh_end,
        })
    }

    /// Compute the pre-heap from the modified pairs, applying the trampoline
    /// strategy. Marks subsumed interiors and drops small blocks from the
    /// modifiable set (they stay in place).
    fn collect_free_space(
        &mut self,
        slots: &mut [Slot<A::Instr>],
        modifiable: &mut [bool],
        functions: Option<&FunctionMap>,
    ) -> LayoutResult<PreHeap> {
        let mut pre = PreHeap::new();
        let mut handled: HashSet<usize> = HashSet::new();

        if self.strategy.trampolines == TrampolineStrategy::WholeFunction {
            if let Some(functions) = functions {
                self.collect_whole_functions(slots, modifiable, functions, &mut pre, &mut handled)?;
            }
        }

        for index in 0..slots.len() {
            if !modifiable[index] || handled.contains(&index) {
                continue;
            }
            let addr = slots[index].original.addr;
            let size = slots[index].original.size;
            match slots[index].status {
                BlockStatus::Modified => {
                    let jump_size = self.isa.jump_size(addr);
                    if size < jump_size {
                        // Too small to redirect; stays at its original site.
                        self.diagnostics.push(Diagnostic::SmallBlock {
                            addr,
                            size,
                            jump_size,
                        });
                        modifiable[index] = false;
                    } else {
                        pre.insert(addr + jump_size as i64, size - jump_size)?;
                    }
                }
                BlockStatus::Subsumed => {
                    // The pass promised these bytes are fully replaced.
                    pre.insert(addr, size)?;
                }
                BlockStatus::Unmodified | BlockStatus::Immutable => {}
            }
        }

        Ok(pre)
    }

    /// Apply the whole-function trampoline optimization: a function whose
    /// blocks are all modified, shared with no other function, and whose
    /// entry can host a jump is redirected only at the entry; its interior
    /// blocks donate their full ranges and become `Subsumed`.
    fn collect_whole_functions(
        &mut self,
        slots: &mut [Slot<A::Instr>],
        modifiable: &[bool],
        functions: &FunctionMap,
        pre: &mut PreHeap,
        handled: &mut HashSet<usize>,
    ) -> LayoutResult<()> {
        let index_of: HashMap<ConcreteAddr, usize> = slots
            .iter()
            .enumerate()
            .map(|(index, slot)| (slot.original.addr, index))
            .collect();

        // A block claimed by two functions disqualifies both.
        let mut owner: HashMap<ConcreteAddr, usize> = HashMap::new();
        let mut shared: HashSet<ConcreteAddr> = HashSet::new();
        for (fn_index, blocks) in functions.values().enumerate() {
            for &addr in blocks {
                if let Some(&previous) = owner.get(&addr) {
                    if previous != fn_index {
                        shared.insert(addr);
                    }
                } else {
                    owner.insert(addr, fn_index);
                }
            }
        }

        for (entry, blocks) in functions {
            let entry_index = match index_of.get(entry) {
                Some(&index) => index,
                None => continue,
            };
            let entry_jump = self.isa.jump_size(*entry);

            let eligible = blocks.iter().all(|addr| {
                !shared.contains(addr)
                    && index_of.get(addr).is_some_and(|&index| {
                        modifiable[index] && slots[index].status == BlockStatus::Modified
                    })
            }) && slots[entry_index].original.size >= entry_jump;
            if !eligible {
                continue;
            }

            let entry_size = slots[entry_index].original.size;
            pre.insert(*entry + entry_jump as i64, entry_size - entry_jump)?;
            handled.insert(entry_index);

            let mut interior_blocks = 0;
            for addr in blocks {
                if addr == entry {
                    continue;
                }
                let index = index_of[addr];
                pre.insert(*addr, slots[index].original.size)?;
                slots[index].status = BlockStatus::Subsumed;
                handled.insert(index);
                interior_blocks += 1;
            }
            self.diagnostics.push(Diagnostic::WholeFunctionRedirect {
                entry: *entry,
                interior_blocks,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::SymbolSource;
    use crate::strategy::{ChunkOrder, Grouping};
    use crate::support::{
        at, modified_pair, plain, ret, unchanged_pair, MockInstr, MockIsa, NullMemory,
    };

    const COMPACT_SORTED: LayoutStrategy = LayoutStrategy {
        allocator: AllocatorKind::Compact(ChunkOrder::Sorted),
        grouping: Grouping::Block,
        trampolines: TrampolineStrategy::Always,
    };

    fn run(
        strategy: LayoutStrategy,
        input: LayoutInput<MockInstr>,
    ) -> (LayoutResult<Layout<MockInstr>>, Vec<Diagnostic>) {
        let mut session = LayoutSession::new(&MockIsa, &NullMemory, strategy);
        let result = session.run(input);
        let diagnostics = session.diagnostics().to_vec();
        (result, diagnostics)
    }

    fn input(pairs: Vec<LayoutPair<MockInstr>>) -> LayoutInput<MockInstr> {
        LayoutInput {
            pairs,
            injected: vec![],
            layout_base: at(0x80_0000),
            wto: None,
            functions: None,
        }
    }

    fn placed(layout: &Layout<MockInstr>) -> Vec<(u64, u64)> {
        layout
            .program_block_layout
            .iter()
            .map(|pair| (pair.rewritten.addr.offset(), pair.rewritten.reserved))
            .collect()
    }

    fn padding(layout: &Layout<MockInstr>) -> Vec<(u64, u64)> {
        layout
            .layout_padding_blocks
            .iter()
            .map(|block| (block.addr.offset(), block.size))
            .collect()
    }

    #[test]
    fn test_best_fit_reuses_holes() {
        // Three modified blocks of sizes [48, 16, 32]; rewritten sizes
        // [40, 10, 20]; jump size 5.
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            modified_pair(&mut symbols, 0x1000, 48, 40),
            modified_pair(&mut symbols, 0x1100, 16, 10),
            modified_pair(&mut symbols, 0x1200, 32, 20),
        ];

        let (result, _) = run(COMPACT_SORTED, input(pairs));
        let layout = result.unwrap();

        assert_eq!(
            placed(&layout),
            vec![(0x1005, 40), (0x1105, 10), (0x1205, 20)]
        );
        assert_eq!(
            padding(&layout),
            vec![(0x102d, 3), (0x110f, 1), (0x1219, 7)]
        );
        assert_eq!(layout.reused_bytes, 70);
    }

    #[test]
    fn test_bump_allocation_when_no_hole_fits() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![modified_pair(&mut symbols, 0x1000, 8, 64)];

        let (result, diagnostics) = run(COMPACT_SORTED, input(pairs));
        let layout = result.unwrap();

        assert_eq!(placed(&layout), vec![(0x80_0000, 64)]);
        assert_eq!(padding(&layout), vec![(0x1005, 3)]);
        assert_eq!(layout.reused_bytes, 0);
        assert_eq!(layout.fresh_end, at(0x80_0040));
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::FreshAllocation { size: 64, .. })));
    }

    #[test]
    fn test_loop_chunk_stays_contiguous() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            modified_pair(&mut symbols, 0x1000, 16, 12),
            modified_pair(&mut symbols, 0x1010, 16, 8),
            modified_pair(&mut symbols, 0x1020, 16, 16),
        ];
        let strategy = LayoutStrategy {
            grouping: Grouping::Loop,
            ..COMPACT_SORTED
        };
        let mut layout_input = input(pairs);
        layout_input.wto = Some(Wto {
            components: vec![vec![at(0x1000), at(0x1010), at(0x1020)]],
        });

        let (result, _) = run(strategy, layout_input);
        let layout = result.unwrap();

        let blocks = placed(&layout);
        // A, B, C contiguous and in ascending original order.
        assert_eq!(blocks[1].0, blocks[0].0 + 12);
        assert_eq!(blocks[2].0, blocks[1].0 + 8);
    }

    #[test]
    fn test_whole_function_subsumes_interiors() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            modified_pair(&mut symbols, 0x1000, 16, 100),
            modified_pair(&mut symbols, 0x1010, 16, 100),
            modified_pair(&mut symbols, 0x1020, 16, 100),
        ];
        let strategy = LayoutStrategy {
            grouping: Grouping::Function,
            trampolines: TrampolineStrategy::WholeFunction,
            ..COMPACT_SORTED
        };
        let mut layout_input = input(pairs);
        let mut functions = FunctionMap::new();
        functions.insert(at(0x1000), vec![at(0x1000), at(0x1010), at(0x1020)]);
        layout_input.functions = Some(functions);

        let (result, diagnostics) = run(strategy, layout_input);
        let layout = result.unwrap();

        let statuses: Vec<BlockStatus> = layout
            .program_block_layout
            .iter()
            .map(|pair| pair.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                BlockStatus::Modified,
                BlockStatus::Subsumed,
                BlockStatus::Subsumed
            ]
        );
        // Entry donates (0x1005, 11); interiors their full 16 bytes each.
        // Adjacent spans coalesce into one hole, and nothing fits a
        // 300-byte chunk, so it all drains to padding.
        assert_eq!(padding(&layout), vec![(0x1005, 43)]);
        assert!(diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::WholeFunctionRedirect {
                interior_blocks: 2,
                ..
            }
        )));
    }

    #[test]
    fn test_unmodified_input_is_identity() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            unchanged_pair(
                &mut symbols,
                0x1000,
                vec![plain(7), ret()],
                BlockStatus::Unmodified,
            ),
            unchanged_pair(
                &mut symbols,
                0x1008,
                vec![plain(3), ret()],
                BlockStatus::Unmodified,
            ),
        ];

        let (result, diagnostics) = run(COMPACT_SORTED, input(pairs));
        let layout = result.unwrap();

        assert_eq!(placed(&layout), vec![(0x1000, 0), (0x1008, 0)]);
        assert!(layout.layout_padding_blocks.is_empty());
        assert!(layout.injected_block_layout.is_empty());
        assert_eq!(layout.reused_bytes, 0);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_parallel_drains_heap_to_padding() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![modified_pair(&mut symbols, 0x1000, 16, 8)];
        let strategy = LayoutStrategy {
            allocator: AllocatorKind::Parallel,
            ..COMPACT_SORTED
        };

        let (result, _) = run(strategy, input(pairs));
        let layout = result.unwrap();

        // The 8-byte block would fit the 11-byte hole, but Parallel never
        // consults the heap.
        assert_eq!(placed(&layout), vec![(0x80_0000, 8)]);
        assert_eq!(padding(&layout), vec![(0x1005, 11)]);
        assert_eq!(layout.reused_bytes, 0);
    }

    #[test]
    fn test_injected_payloads_follow_blocks() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![modified_pair(&mut symbols, 0x1000, 8, 64)];
        let first = symbols.fresh();
        let second = symbols.fresh();
        let mut layout_input = input(pairs);
        layout_input.injected = vec![
            InjectedCode {
                symbol: first,
                bytes: vec![0xaa; 16],
            },
            InjectedCode {
                symbol: second,
                bytes: vec![0xbb; 8],
            },
        ];

        let (result, _) = run(COMPACT_SORTED, layout_input);
        let layout = result.unwrap();

        assert_eq!(layout.injected_block_layout.len(), 2);
        assert_eq!(layout.injected_block_layout[0].1, at(0x80_0040));
        assert_eq!(layout.injected_block_layout[1].1, at(0x80_0050));
        assert_eq!(layout.fresh_end, at(0x80_0058));

        let symbol_map = layout.symbol_map();
        assert_eq!(symbol_map[&first], at(0x80_0040));
        assert_eq!(symbol_map[&second], at(0x80_0050));
    }

    #[test]
    fn test_small_block_stays_in_place() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            unchanged_pair(
                &mut symbols,
                0x1000,
                vec![plain(2), ret()],
                BlockStatus::Modified,
            ),
            modified_pair(&mut symbols, 0x1010, 16, 8),
        ];

        let (result, diagnostics) = run(COMPACT_SORTED, input(pairs));
        let layout = result.unwrap();

        // The 3-byte block cannot host a 5-byte jump: kept in place.
        assert_eq!(placed(&layout)[0], (0x1000, 0));
        assert_eq!(
            diagnostics[0],
            Diagnostic::SmallBlock {
                addr: at(0x1000),
                size: 3,
                jump_size: 5,
            }
        );
        // It contributes nothing to the heap either; the second block lands
        // in its own hole with three bytes left over.
        assert_eq!(placed(&layout)[1], (0x1015, 8));
        assert_eq!(padding(&layout), vec![(0x101d, 3)]);
    }

    #[test]
    fn test_random_order_replays_deterministically() {
        let seed = [42u8; 32];
        let strategy = LayoutStrategy {
            allocator: AllocatorKind::Compact(ChunkOrder::Random(seed)),
            ..COMPACT_SORTED
        };

        let make_input = || {
            let mut symbols = SymbolSource::new();
            input(vec![
                modified_pair(&mut symbols, 0x1000, 48, 40),
                modified_pair(&mut symbols, 0x1100, 16, 10),
                modified_pair(&mut symbols, 0x1200, 32, 20),
                modified_pair(&mut symbols, 0x1300, 64, 60),
            ])
        };

        let (first, _) = run(strategy, make_input());
        let (second, _) = run(strategy, make_input());
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_reserved_size_covers_instructions() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            unchanged_pair(
                &mut symbols,
                0x1000,
                vec![plain(6), plain(4)],
                BlockStatus::Modified,
            ),
            unchanged_pair(
                &mut symbols,
                0x100a,
                vec![plain(3), ret()],
                BlockStatus::Unmodified,
            ),
        ];

        let (result, _) = run(COMPACT_SORTED, input(pairs));
        let layout = result.unwrap();

        // The first block falls through, so its reservation includes the
        // appended jump: 10 bytes of body + 5-byte jump.
        let pair = &layout.program_block_layout[0];
        assert_eq!(pair.rewritten.reserved, 15);
        let body: u64 = pair
            .rewritten
            .block
            .block
            .instructions
            .iter()
            .map(|si| si.instr.size)
            .sum();
        assert!(pair.rewritten.reserved >= body);
    }

    #[test]
    fn test_assigned_ranges_are_disjoint() {
        let mut symbols = SymbolSource::new();
        let pairs = vec![
            modified_pair(&mut symbols, 0x1000, 48, 40),
            modified_pair(&mut symbols, 0x1100, 16, 10),
            modified_pair(&mut symbols, 0x1200, 32, 20),
            modified_pair(&mut symbols, 0x1300, 8, 200),
        ];

        let (result, _) = run(COMPACT_SORTED, input(pairs));
        let layout = result.unwrap();

        let mut ranges: Vec<(u64, u64)> = layout
            .program_block_layout
            .iter()
            .filter(|pair| pair.rewritten.reserved > 0)
            .map(|pair| {
                (
                    pair.rewritten.addr.offset(),
                    pair.rewritten.addr.offset() + pair.rewritten.reserved,
                )
            })
            .collect();
        ranges.sort();
        for window in ranges.windows(2) {
            assert!(window[0].1 <= window[1].0, "overlap: {window:?}");
        }
    }
}
