//! Basic-block recovery
//!
//! Splits the decoded `.text` stream into basic blocks. A new block starts
//! at the beginning of the region, at any in-region branch or call target,
//! and after every control-transfer instruction. Every block gets a symbolic
//! address, and every in-region branch target is rewritten to the symbol of
//! the block starting there.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use isa_x86::{decode_instructions, DecodeError, DecodedInstruction, X86};
use layout::{
    BlockStatus, BranchTarget, ConcreteAddr, ConcreteBlock, FunctionMap, Isa, JumpKind,
    LayoutPair, MemoryView, SymbolSource, SymbolicBlock, SymbolicInstruction, Wto,
};

/// Decode `code` (mapped at `base`) and carve it into layout pairs, all
/// `Unmodified`. Transformation passes flip statuses afterwards.
pub fn recover_blocks(
    code: &[u8],
    base: ConcreteAddr,
    mem: &dyn MemoryView,
    symbols: &mut SymbolSource,
) -> Result<Vec<LayoutPair<DecodedInstruction>>, DecodeError> {
    let isa = X86;
    let decoded = decode_instructions(code)?;
    if decoded.is_empty() {
        return Ok(Vec::new());
    }

    let kinds: Vec<JumpKind> = decoded
        .iter()
        .map(|instr| isa.classify_jump(instr, mem, base + instr.offset as i64))
        .collect();

    // In-region transfer targets start new blocks.
    let region_end = base + code.len() as i64;
    let target_offsets: BTreeSet<usize> = kinds
        .iter()
        .filter_map(|kind| match kind {
            JumpKind::RelativeJump { target, .. } | JumpKind::DirectCall { target } => {
                Some(*target)
            }
            _ => None,
        })
        .filter(|target| target.segment() == base.segment() && *target >= base && *target < region_end)
        .map(|target| (target - base) as usize)
        .collect();

    // Block boundaries: region start, transfer targets, post-terminator.
    let mut starts: Vec<usize> = Vec::new();
    let mut previous_was_terminator = false;
    for (index, instr) in decoded.iter().enumerate() {
        let is_target = target_offsets.contains(&instr.offset);
        if index == 0 || previous_was_terminator || is_target {
            if starts.last() != Some(&index) {
                starts.push(index);
            }
        }
        previous_was_terminator = kinds[index] != JumpKind::NoJump;
    }

    // One symbol per block, resolvable by start address.
    let block_syms: Vec<_> = starts.iter().map(|_| symbols.fresh()).collect();
    let sym_by_offset: HashMap<usize, _> = starts
        .iter()
        .zip(&block_syms)
        .map(|(&start, &sym)| (decoded[start].offset, sym))
        .collect();

    let mut pairs = Vec::with_capacity(starts.len());
    for (block_index, &start) in starts.iter().enumerate() {
        let end = starts
            .get(block_index + 1)
            .copied()
            .unwrap_or(decoded.len());

        let instructions: Vec<DecodedInstruction> = decoded[start..end].to_vec();
        let addr = base + instructions[0].offset as i64;
        let size: u64 = instructions.iter().map(|i| i.size()).sum();
        let original = ConcreteBlock::new(addr, size, instructions.clone());

        let symbolic = instructions
            .into_iter()
            .enumerate()
            .map(|(i, instr)| {
                let target = match kinds[start + i] {
                    JumpKind::RelativeJump { target, .. } | JumpKind::DirectCall { target } => {
                        let in_region = target.segment() == base.segment()
                            && target >= base
                            && target < region_end;
                        let symbolized = in_region
                            .then(|| sym_by_offset.get(&((target - base) as usize)).copied())
                            .flatten();
                        Some(match symbolized {
                            Some(sym) => BranchTarget::Symbol(sym),
                            None => BranchTarget::Fixed(target),
                        })
                    }
                    _ => None,
                };
                SymbolicInstruction { instr, target }
            })
            .collect();

        pairs.push(LayoutPair {
            original,
            rewritten: SymbolicBlock {
                symbol: block_syms[block_index],
                instructions: symbolic,
            },
            status: BlockStatus::Unmodified,
        });
    }

    Ok(pairs)
}

/// Build a weak topological ordering of the recovered blocks: edges follow
/// direct branches and fallthroughs, and each strongly-connected component
/// becomes one WTO component.
pub fn build_wto(
    pairs: &[LayoutPair<DecodedInstruction>],
    mem: &dyn MemoryView,
) -> Wto {
    let isa = X86;
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..pairs.len()).map(|i| graph.add_node(i)).collect();
    let by_addr: HashMap<ConcreteAddr, usize> = pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| (pair.original.addr, i))
        .collect();

    for (index, pair) in pairs.iter().enumerate() {
        let Some(last) = pair.original.instructions.last() else {
            continue;
        };
        let last_addr = pair.original.end() + -(last.size() as i64);
        let kind = isa.classify_jump(last, mem, last_addr);

        if let JumpKind::RelativeJump { target, .. } = kind {
            if let Some(&succ) = by_addr.get(&target) {
                graph.add_edge(nodes[index], nodes[succ], ());
            }
        }
        if !kind.is_unconditional_transfer() {
            if let Some(&succ) = by_addr.get(&pair.original.end()) {
                graph.add_edge(nodes[index], nodes[succ], ());
            }
        }
    }

    let components = tarjan_scc(&graph)
        .into_iter()
        .map(|component| {
            component
                .into_iter()
                .map(|node| pairs[graph[node]].original.addr)
                .collect()
        })
        .collect();
    Wto { components }
}

/// Assign blocks to functions by address range: sorted function entries
/// partition the region, and each block belongs to the function whose entry
/// precedes it. Blocks before the first entry belong to no function.
pub fn build_function_map(
    entries: &[u64],
    pairs: &[LayoutPair<DecodedInstruction>],
) -> FunctionMap {
    let mut map = FunctionMap::new();
    if entries.is_empty() {
        return map;
    }

    for pair in pairs {
        let addr = pair.original.addr;
        let slot = match entries.binary_search(&addr.offset()) {
            Ok(i) => Some(i),
            Err(0) => None,
            Err(i) => Some(i - 1),
        };
        if let Some(i) = slot {
            let entry = ConcreteAddr::new(addr.segment(), entries[i]);
            map.entry(entry).or_default().push(addr);
        }
    }

    map
}
