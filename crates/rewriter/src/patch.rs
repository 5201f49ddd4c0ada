// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Patch application
//!
//! Walks a finished layout and produces the two byte images the emitter
//! needs: the patched `.text` (trampolines over redirected blocks, trap fill
//! over residual holes, relocated blocks that landed back in holes) and the
//! fresh code region.

use thiserror::Error;

use isa_x86::{assemble_block, AssembleError, DecodedInstruction, INT3, X86};
use layout::{BlockStatus, ConcreteAddr, Isa, Layout};

/// Errors from patch application
#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("assigned address {addr} lies outside the text image and the fresh region")]
    AddressOutOfRange { addr: ConcreteAddr },
}

/// The two images produced by a rewrite.
#[derive(Debug)]
pub struct PatchedImage {
    /// The original `.text`, with redirections and padding written in.
    pub text: Vec<u8>,
    /// The fresh code region, mapped at the layout base.
    pub fresh: Vec<u8>,
}

/// Apply `layout` over the original text bytes.
pub fn apply(
    layout: &Layout<DecodedInstruction>,
    text: &[u8],
    text_base: u64,
    layout_base: u64,
) -> Result<PatchedImage, PatchError> {
    let isa = X86;
    let fresh_len = layout.fresh_end.offset().saturating_sub(layout_base);
    let mut image = PatchedImage {
        text: text.to_vec(),
        fresh: vec![INT3; fresh_len as usize],
    };
    let symbols = layout.symbol_map();

    for pair in &layout.program_block_layout {
        if !pair.is_relocated() {
            continue;
        }

        let bytes = assemble_block(&pair.rewritten, &symbols)?;
        write_bytes(&mut image, text_base, layout_base, pair.rewritten.addr, &bytes)?;
        // A block can assemble below its reservation; trap-fill the slack so
        // no stale bytes remain executable.
        let slack = pair.rewritten.reserved - bytes.len() as u64;
        if slack > 0 {
            let start = pair.rewritten.addr + bytes.len() as i64;
            write_bytes(
                &mut image,
                text_base,
                layout_base,
                start,
                &vec![INT3; slack as usize],
            )?;
        }

        // Subsumed blocks are reached through their function's entry; only
        // Modified blocks get their own redirection.
        if pair.status == BlockStatus::Modified {
            let trampoline: Vec<u8> = isa
                .make_relative_jump(pair.original.addr, pair.rewritten.addr)
                .iter()
                .flat_map(|i| i.bytes().to_vec())
                .collect();
            write_bytes(
                &mut image,
                text_base,
                layout_base,
                pair.original.addr,
                &trampoline,
            )?;
        }
    }

    for block in &layout.layout_padding_blocks {
        let bytes: Vec<u8> = block
            .instructions
            .iter()
            .flat_map(|i| i.bytes().to_vec())
            .collect();
        write_bytes(&mut image, text_base, layout_base, block.addr, &bytes)?;
    }

    for (_, addr, bytes) in &layout.injected_block_layout {
        write_bytes(&mut image, text_base, layout_base, *addr, bytes)?;
    }

    Ok(image)
}

fn write_bytes(
    image: &mut PatchedImage,
    text_base: u64,
    layout_base: u64,
    addr: ConcreteAddr,
    bytes: &[u8],
) -> Result<(), PatchError> {
    let offset = addr.offset();
    let end = offset + bytes.len() as u64;

    if offset >= text_base && end <= text_base + image.text.len() as u64 {
        let at = (offset - text_base) as usize;
        image.text[at..at + bytes.len()].copy_from_slice(bytes);
        return Ok(());
    }
    if offset >= layout_base && end <= layout_base + image.fresh.len() as u64 {
        let at = (offset - layout_base) as usize;
        image.fresh[at..at + bytes.len()].copy_from_slice(bytes);
        return Ok(());
    }
    Err(PatchError::AddressOutOfRange { addr })
}
