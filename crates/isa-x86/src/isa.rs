//! [`Isa`] implementation for x86-64.

use layout::{ConcreteAddr, Isa, JumpKind, MemoryView};

use crate::decode::{synthesized, DecodedInstruction};
use crate::jump;

/// The x86-64 instruction capability.
///
/// Trampolines are `jmp rel32` (5 bytes); padding is `int3` fill, so a stray
/// transfer into reclaimed bytes traps instead of executing half an
/// instruction.
#[derive(Debug, Default)]
pub struct X86;

impl Isa for X86 {
    type Instr = DecodedInstruction;

    fn instruction_size(&self, instr: &DecodedInstruction) -> u64 {
        instr.size()
    }

    fn classify_jump(
        &self,
        instr: &DecodedInstruction,
        mem: &dyn MemoryView,
        at: ConcreteAddr,
    ) -> JumpKind {
        jump::classify(instr.bytes(), mem, at)
    }

    fn make_relative_jump(&self, from: ConcreteAddr, to: ConcreteAddr) -> Vec<DecodedInstruction> {
        vec![synthesized(jump::encode_jmp(from, to).to_vec())]
    }

    fn make_padding(&self, len: u64) -> Vec<DecodedInstruction> {
        (0..len).map(|_| synthesized(vec![jump::INT3])).collect()
    }

    fn widened_size(&self, instr: &DecodedInstruction) -> u64 {
        jump::widened_len(instr.bytes())
    }
}
