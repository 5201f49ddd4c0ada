//! Chunk grouping
//!
//! Blocks that must be laid out at consecutive addresses are unified into
//! chunks: one chunk per block, per loop (from a supplied weak topological
//! ordering), or per function. Union-find over original block addresses does
//! the unification; members of a chunk are then ordered by ascending original
//! address so relocated loops keep their locality.

use std::collections::{BTreeMap, HashMap};

use petgraph::unionfind::UnionFind;

use crate::addr::ConcreteAddr;
use crate::block::{BlockStatus, LayoutPair};
use crate::strategy::Grouping;

/// Map from a function's entry address to the addresses of all its blocks.
/// Supplied by block recovery; ordered so that runs are deterministic.
pub type FunctionMap = BTreeMap<ConcreteAddr, Vec<ConcreteAddr>>;

/// A weak topological ordering of the recovered CFG. Each component lists
/// the original addresses of the blocks in one strongly-connected component;
/// singleton components may be omitted.
#[derive(Debug, Clone, Default)]
pub struct Wto {
    pub components: Vec<Vec<ConcreteAddr>>,
}

/// A set of blocks the allocator must place contiguously. Members are
/// indices into the layout-pair slice, ordered by ascending original
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub members: Vec<usize>,
}

impl Chunk {
    fn new(members: Vec<usize>) -> Self {
        Self { members }
    }
}

fn is_modifiable(status: BlockStatus) -> bool {
    matches!(status, BlockStatus::Modified | BlockStatus::Subsumed)
}

/// Partition the modifiable pairs into chunks.
///
/// Unification runs over all pairs (a loop can span modified and unmodified
/// blocks alike), but only the modifiable members of a chunk are carried
/// forward: `Unmodified` and `Immutable` members stay in place, and a chunk
/// with no modifiable member disappears entirely. Chunks come out in input
/// order of their first member.
pub fn group_pairs<I>(
    pairs: &[LayoutPair<I>],
    grouping: Grouping,
    wto: Option<&Wto>,
    functions: Option<&FunctionMap>,
) -> Vec<Chunk> {
    match grouping {
        Grouping::Block => {
            return pairs
                .iter()
                .enumerate()
                .filter(|(_, pair)| is_modifiable(pair.status))
                .map(|(index, _)| Chunk::new(vec![index]))
                .collect();
        }
        Grouping::Loop | Grouping::Function => {}
    }

    let index_of: HashMap<ConcreteAddr, usize> = pairs
        .iter()
        .enumerate()
        .map(|(index, pair)| (pair.original.addr, index))
        .collect();

    let mut sets: UnionFind<usize> = UnionFind::new(pairs.len());
    let mut unify = |addrs: &[ConcreteAddr]| {
        let mut first: Option<usize> = None;
        for addr in addrs {
            let Some(&index) = index_of.get(addr) else {
                continue;
            };
            match first {
                Some(root) => {
                    sets.union(root, index);
                }
                None => first = Some(index),
            }
        }
    };

    match grouping {
        Grouping::Loop => {
            if let Some(wto) = wto {
                for component in &wto.components {
                    unify(component);
                }
            }
        }
        Grouping::Function => {
            if let Some(functions) = functions {
                for blocks in functions.values() {
                    unify(blocks);
                }
            }
        }
        Grouping::Block => unreachable!("handled above"),
    }

    // Collect groups in input order of their first member.
    let labels = sets.into_labeling();
    let mut group_of: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (index, &label) in labels.iter().enumerate() {
        let slot = *group_of.entry(label).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(index);
    }

    groups
        .into_iter()
        .filter(|members| members.iter().any(|&i| is_modifiable(pairs[i].status)))
        .map(|members| {
            let mut members: Vec<usize> = members
                .into_iter()
                .filter(|&i| is_modifiable(pairs[i].status))
                .collect();
            members.sort_by_key(|&i| pairs[i].original.addr);
            Chunk::new(members)
        })
        .collect()
}
