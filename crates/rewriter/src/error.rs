// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the rewriter crate

use thiserror::Error;

use crate::elf::ElfError;
use crate::patch::PatchError;
use isa_x86::DecodeError;
use layout::LayoutError;

/// Result type alias for rewrite operations
pub type RewriteResult<T> = Result<T, RewriteError>;

/// Errors from any stage of a rewrite
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("ELF error: {0}")]
    Elf(#[from] ElfError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),
}
