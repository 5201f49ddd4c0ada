//! x86-64 instruction decoding
//!
//! Decodes raw bytes into sized instructions using the `yaxpeax-x86` crate.
//! Each decoded instruction keeps its original encoding; everything
//! downstream (classification, re-encoding) works on those bytes.

use yaxpeax_arch::{Decoder, LengthedInstruction, U8Reader};
use yaxpeax_x86::long_mode::{InstDecoder, Instruction};

/// Errors that can occur during decoding
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode instruction at offset {offset:#x}: {message}")]
    InvalidInstruction { offset: usize, message: String },
}

/// A decoded instruction with its location and original encoding
#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    /// Offset from the start of the decoded region (in bytes)
    pub offset: usize,
    /// The raw encoding
    bytes: Vec<u8>,
    /// The decoded instruction
    instruction: Instruction,
}

impl DecodedInstruction {
    /// Encoded size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The original encoding
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mnemonic string (for diagnostics)
    pub fn mnemonic(&self) -> String {
        self.instruction.opcode().to_string()
    }

    /// Decode a single instruction from `bytes`, which must hold exactly one
    /// instruction.
    pub fn from_bytes(offset: usize, bytes: Vec<u8>) -> Result<Self, DecodeError> {
        let decoder = InstDecoder::default();
        let mut reader = U8Reader::new(&bytes);
        let instruction = decoder
            .decode(&mut reader)
            .map_err(|e| DecodeError::InvalidInstruction {
                offset,
                message: e.to_string(),
            })?;
        Ok(Self {
            offset,
            bytes,
            instruction,
        })
    }
}

/// Build an instruction from an encoding this crate synthesized itself.
pub(crate) fn synthesized(bytes: Vec<u8>) -> DecodedInstruction {
    match DecodedInstruction::from_bytes(0, bytes) {
        Ok(instruction) => instruction,
        Err(_) => unreachable!("synthesized encodings always decode"),
    }
}

/// Decode all instructions from a byte slice.
///
/// The slice must hold a gapless instruction stream; a byte sequence the
/// decoder rejects aborts with the offending offset.
pub fn decode_instructions(code: &[u8]) -> Result<Vec<DecodedInstruction>, DecodeError> {
    let decoder = InstDecoder::default();
    let mut instructions = Vec::new();
    let mut offset = 0usize;

    while offset < code.len() {
        let mut reader = U8Reader::new(&code[offset..]);
        let instruction =
            decoder
                .decode(&mut reader)
                .map_err(|e| DecodeError::InvalidInstruction {
                    offset,
                    message: e.to_string(),
                })?;
        let len = instruction.len().to_const() as usize;
        instructions.push(DecodedInstruction {
            offset,
            bytes: code[offset..offset + len].to_vec(),
            instruction,
        });
        offset += len;
    }

    Ok(instructions)
}
