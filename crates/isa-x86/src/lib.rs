//! x86-64 capability for the block-layout engine
//!
//! This crate realizes the [`layout::Isa`] contract for x86-64: decoding via
//! `yaxpeax-x86`, jump classification and re-encoding on the raw instruction
//! bytes, `jmp rel32` trampolines, and `int3` padding. It also carries the
//! block assembler that turns address-assigned blocks back into bytes.
//!
//! # Modules
//!
//! - [`decode`]: byte stream → [`DecodedInstruction`]
//! - [`jump`]: classification, displacement handling, branch encodings
//! - [`isa`]: the [`layout::Isa`] implementation, [`X86`]
//! - [`assemble`]: address-assigned blocks → bytes

pub mod assemble;
pub mod decode;
pub mod isa;
pub mod jump;

pub use assemble::{assemble_block, AssembleError};
pub use decode::{decode_instructions, DecodeError, DecodedInstruction};
pub use isa::X86;
pub use jump::{INT3, JUMP_SIZE};
