// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Jump classification and branch encodings
//!
//! All of this works on the instruction's encoded bytes: skip the legacy and
//! REX prefixes, then the opcode byte decides. The relative displacement of a
//! branch is always its trailing immediate.

use layout::{Cond, ConcreteAddr, JumpKind, MemoryView};

/// `jmp rel32`
pub const JMP_REL32: u8 = 0xe9;
/// `call rel32`
pub const CALL_REL32: u8 = 0xe8;
/// `jmp rel8`
pub const JMP_REL8: u8 = 0xeb;
/// One-byte breakpoint trap, the padding fill
pub const INT3: u8 = 0xcc;

/// Byte size of the redirection jump (`jmp rel32`).
pub const JUMP_SIZE: u64 = 5;

fn is_prefix(byte: u8) -> bool {
    matches!(
        byte,
        0x26 | 0x2e | 0x36 | 0x3e | 0x64 | 0x65 | 0x66 | 0x67 | 0xf0 | 0xf2 | 0xf3
    ) || (0x40..=0x4f).contains(&byte)
}

/// Index of the first opcode byte (past legacy and REX prefixes).
fn opcode_index(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&b| is_prefix(b)).count()
}

/// The encoding shape of a PC-relative branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchEncoding {
    JmpRel8,
    JmpRel32,
    CallRel32,
    /// `7x cb`: condition code in the low nibble
    CondRel8 { cc: u8 },
    /// `0f 8x cd`
    CondRel32 { cc: u8 },
    /// `jrcxz` / `loopnz` / `loopz` / `loop`: rel8-only encodings
    CondRcx { opcode: u8 },
}

/// Recognize a PC-relative branch from its encoding.
pub(crate) fn branch_encoding(bytes: &[u8]) -> Option<BranchEncoding> {
    let index = opcode_index(bytes);
    match *bytes.get(index)? {
        JMP_REL8 => Some(BranchEncoding::JmpRel8),
        JMP_REL32 => Some(BranchEncoding::JmpRel32),
        CALL_REL32 => Some(BranchEncoding::CallRel32),
        op @ 0x70..=0x7f => Some(BranchEncoding::CondRel8 { cc: op - 0x70 }),
        0x0f => match *bytes.get(index + 1)? {
            op @ 0x80..=0x8f => Some(BranchEncoding::CondRel32 { cc: op - 0x80 }),
            _ => None,
        },
        op @ 0xe0..=0xe3 => Some(BranchEncoding::CondRcx { opcode: op }),
        _ => None,
    }
}

/// The encoded displacement of a relative branch (the trailing immediate).
pub(crate) fn displacement(bytes: &[u8], encoding: BranchEncoding) -> i64 {
    match encoding {
        BranchEncoding::JmpRel8
        | BranchEncoding::CondRel8 { .. }
        | BranchEncoding::CondRcx { .. } => bytes[bytes.len() - 1] as i8 as i64,
        BranchEncoding::JmpRel32
        | BranchEncoding::CallRel32
        | BranchEncoding::CondRel32 { .. } => {
            let tail = &bytes[bytes.len() - 4..];
            i32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) as i64
        }
    }
}

/// Worst-case encoded size once the branch target has been redirected:
/// short jumps widen to rel32, the rel8-only forms go through a widening
/// thunk, everything else keeps its size.
pub(crate) fn widened_len(bytes: &[u8]) -> u64 {
    match branch_encoding(bytes) {
        None => bytes.len() as u64,
        Some(BranchEncoding::JmpRel8) | Some(BranchEncoding::JmpRel32) => 5,
        Some(BranchEncoding::CallRel32) => 5,
        Some(BranchEncoding::CondRel8 { .. }) | Some(BranchEncoding::CondRel32 { .. }) => 6,
        // jrcxz/loop* have no rel32 form: original rel8 over a skip jump
        // over a long jump.
        Some(BranchEncoding::CondRcx { .. }) => 9,
    }
}

/// Classify the control-flow effect of an encoded instruction sitting at
/// `at`. `mem` maps absolute targets back into tagged addresses; targets it
/// cannot place are assumed to live in `at`'s own segment.
pub(crate) fn classify(bytes: &[u8], mem: &dyn MemoryView, at: ConcreteAddr) -> JumpKind {
    if let Some(encoding) = branch_encoding(bytes) {
        let offset = displacement(bytes, encoding);
        let target = resolve_target(mem, at, bytes.len() as u64, offset);
        return match encoding {
            BranchEncoding::CallRel32 => JumpKind::DirectCall { target },
            BranchEncoding::JmpRel8 | BranchEncoding::JmpRel32 => JumpKind::RelativeJump {
                cond: Cond::Unconditional,
                offset,
                target,
            },
            BranchEncoding::CondRel8 { .. }
            | BranchEncoding::CondRel32 { .. }
            | BranchEncoding::CondRcx { .. } => JumpKind::RelativeJump {
                cond: Cond::Conditional,
                offset,
                target,
            },
        };
    }

    let index = opcode_index(bytes);
    let Some(&op) = bytes.get(index) else {
        return JumpKind::NoJump;
    };
    match op {
        // ret / retf, with and without an immediate
        0xc3 | 0xc2 | 0xcb | 0xca => JumpKind::Return {
            cond: Cond::Unconditional,
        },
        // Group 5: the ModRM reg field selects call/jmp through a register
        // or memory operand.
        0xff => match bytes.get(index + 1).map(|modrm| (modrm >> 3) & 0b111) {
            Some(2) | Some(3) => JumpKind::IndirectCall,
            Some(4) | Some(5) => JumpKind::IndirectJump {
                cond: Cond::Unconditional,
            },
            _ => JumpKind::NoJump,
        },
        _ => JumpKind::NoJump,
    }
}

fn resolve_target(mem: &dyn MemoryView, at: ConcreteAddr, len: u64, offset: i64) -> ConcreteAddr {
    let absolute = at
        .offset()
        .wrapping_add(len)
        .wrapping_add(offset as u64);
    mem.resolve_absolute(absolute)
        .unwrap_or_else(|| ConcreteAddr::new(at.segment(), absolute))
}

/// Encode `jmp rel32` from `from` to `to`. The layout engine keeps both ends
/// within one binary, so the displacement always fits.
pub(crate) fn encode_jmp(from: ConcreteAddr, to: ConcreteAddr) -> [u8; 5] {
    let rel = to - (from + JUMP_SIZE as i64);
    assert!(
        i32::try_from(rel).is_ok(),
        "jump from {from} to {to} exceeds rel32 range"
    );
    let rel = (rel as i32).to_le_bytes();
    [JMP_REL32, rel[0], rel[1], rel[2], rel[3]]
}
