// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the layout engine.

use thiserror::Error;

use crate::addr::{ConcreteAddr, SymbolicAddr};

/// Result type alias for layout operations.
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Fatal layout errors. Any of these aborts the layout pass; partial state is
/// discarded and previously recorded diagnostics remain readable on the
/// session for post-mortem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// Two reclaimed spans overlap. Indicates an inconsistency in the
    /// upstream block model, not a recoverable layout condition.
    #[error("overlapping free spans: {a} + {la:#x} overlaps {b} + {lb:#x}")]
    OverlappingFreeBlocks {
        a: ConcreteAddr,
        la: u64,
        b: ConcreteAddr,
        lb: u64,
    },

    /// Reification found no block at the address immediately following a
    /// block whose terminator can fall through.
    #[error("no fallthrough successor for block at {0}")]
    MissingFallthroughSuccessor(ConcreteAddr),

    /// A block with no instructions reached reification.
    #[error("empty block at {0}")]
    EmptyBlock(ConcreteAddr),

    /// An immutable block ended up in the modifiable set.
    #[error("immutable block at {0} was treated as modifiable")]
    ImmutableBlockModified(ConcreteAddr),

    /// Final address tagging found a block the allocator never placed.
    #[error("no address assigned to symbolic block {0}")]
    UnassignedSymbolicBlock(SymbolicAddr),
}
