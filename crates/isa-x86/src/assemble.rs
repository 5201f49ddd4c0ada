//! Block assembler
//!
//! Turns address-assigned blocks back into bytes. Instructions without a
//! branch target are copied verbatim; relative branches are re-encoded
//! against the block's assigned address; a fallthrough annotation on the
//! final instruction becomes an explicit `jmp` to the successor.

use std::collections::HashMap;

use thiserror::Error;

use layout::{AddressedBlock, BranchTarget, ConcreteAddr, Fallthrough, SymbolicAddr};

use crate::decode::DecodedInstruction;
use crate::jump::{self, BranchEncoding};

/// Errors that can occur while assembling a block
#[derive(Debug, Clone, Error)]
pub enum AssembleError {
    #[error("unresolved symbolic address {0}")]
    UnresolvedSymbol(SymbolicAddr),

    #[error("block at {addr} assembled to {actual} bytes, exceeding its {reserved}-byte reservation")]
    BlockTooLarge {
        addr: ConcreteAddr,
        reserved: u64,
        actual: u64,
    },

    #[error("displacement from {from} to {to} does not fit in rel32")]
    DisplacementOverflow { from: ConcreteAddr, to: ConcreteAddr },

    #[error("instruction at {pc} carries a branch target but is not a relative branch")]
    NotABranch { pc: ConcreteAddr },
}

/// Assemble one address-assigned block. `symbols` maps every symbolic
/// address (blocks and injected payloads) to its assigned concrete address.
pub fn assemble_block(
    block: &AddressedBlock<DecodedInstruction>,
    symbols: &HashMap<SymbolicAddr, ConcreteAddr>,
) -> Result<Vec<u8>, AssembleError> {
    let mut out: Vec<u8> = Vec::with_capacity(block.reserved as usize);

    for si in &block.block.block.instructions {
        let pc = block.addr + out.len() as i64;
        match si.target {
            Some(target) => {
                let dest = resolve(target, symbols)?;
                let encoding = jump::branch_encoding(si.instr.bytes())
                    .ok_or(AssembleError::NotABranch { pc })?;
                encode_branch(&mut out, encoding, pc, dest)?;
            }
            None => out.extend_from_slice(si.instr.bytes()),
        }
    }

    if let Some(Fallthrough::To(successor)) = block.block.terminator_tag() {
        let pc = block.addr + out.len() as i64;
        let dest = resolve(BranchTarget::Symbol(successor), symbols)?;
        let rel = rel32(pc, jump::JUMP_SIZE, dest)?;
        out.push(jump::JMP_REL32);
        out.extend_from_slice(&rel.to_le_bytes());
    }

    let actual = out.len() as u64;
    if actual > block.reserved {
        return Err(AssembleError::BlockTooLarge {
            addr: block.addr,
            reserved: block.reserved,
            actual,
        });
    }
    Ok(out)
}

fn resolve(
    target: BranchTarget,
    symbols: &HashMap<SymbolicAddr, ConcreteAddr>,
) -> Result<ConcreteAddr, AssembleError> {
    match target {
        BranchTarget::Symbol(symbol) => symbols
            .get(&symbol)
            .copied()
            .ok_or(AssembleError::UnresolvedSymbol(symbol)),
        BranchTarget::Fixed(addr) => Ok(addr),
    }
}

fn rel32(pc: ConcreteAddr, len: u64, dest: ConcreteAddr) -> Result<i32, AssembleError> {
    let rel = dest - (pc + len as i64);
    i32::try_from(rel).map_err(|_| AssembleError::DisplacementOverflow { from: pc, to: dest })
}

/// Re-encode a relative branch at `pc` so it reaches `dest`. Short forms are
/// widened to rel32; the rel8-only forms (`jrcxz`, `loop*`) keep their
/// original opcode and hop through a long jump:
///
/// ```text
/// jrcxz taken        ; original opcode, rel8 = +2
/// jmp   done         ; rel8 = +5, skips the long jump
/// taken: jmp dest    ; rel32
/// done:
/// ```
fn encode_branch(
    out: &mut Vec<u8>,
    encoding: BranchEncoding,
    pc: ConcreteAddr,
    dest: ConcreteAddr,
) -> Result<(), AssembleError> {
    match encoding {
        BranchEncoding::JmpRel8 | BranchEncoding::JmpRel32 => {
            let rel = rel32(pc, 5, dest)?;
            out.push(jump::JMP_REL32);
            out.extend_from_slice(&rel.to_le_bytes());
        }
        BranchEncoding::CallRel32 => {
            let rel = rel32(pc, 5, dest)?;
            out.push(jump::CALL_REL32);
            out.extend_from_slice(&rel.to_le_bytes());
        }
        BranchEncoding::CondRel8 { cc } | BranchEncoding::CondRel32 { cc } => {
            let rel = rel32(pc, 6, dest)?;
            out.push(0x0f);
            out.push(0x80 + cc);
            out.extend_from_slice(&rel.to_le_bytes());
        }
        BranchEncoding::CondRcx { opcode } => {
            let rel = rel32(pc, 9, dest)?;
            out.extend_from_slice(&[opcode, 0x02, jump::JMP_REL8, 0x05, jump::JMP_REL32]);
            out.extend_from_slice(&rel.to_le_bytes());
        }
    }
    Ok(())
}
