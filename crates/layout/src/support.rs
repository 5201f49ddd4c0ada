//! Mock instruction set shared by the unit tests.

use crate::addr::{ConcreteAddr, SegmentId, SymbolSource, SymbolicAddr};
use crate::block::{
    BlockStatus, ConcreteBlock, LayoutPair, SymbolicBlock, SymbolicInstruction,
};
use crate::isa::{Cond, Isa, JumpKind, MemoryView};

pub const SEG: SegmentId = SegmentId(0);

pub fn at(offset: u64) -> ConcreteAddr {
    ConcreteAddr::new(SEG, offset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockKind {
    Plain,
    Ret,
    Jump,
    CondJump,
    Call,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockInstr {
    pub size: u64,
    pub kind: MockKind,
}

pub fn plain(size: u64) -> MockInstr {
    MockInstr {
        size,
        kind: MockKind::Plain,
    }
}

pub fn ret() -> MockInstr {
    MockInstr {
        size: 1,
        kind: MockKind::Ret,
    }
}

pub fn jump() -> MockInstr {
    MockInstr {
        size: 2,
        kind: MockKind::Jump,
    }
}

pub fn cond_jump() -> MockInstr {
    MockInstr {
        size: 2,
        kind: MockKind::CondJump,
    }
}

pub fn call() -> MockInstr {
    MockInstr {
        size: 5,
        kind: MockKind::Call,
    }
}

/// Mock architecture: sizes are taken at face value, jumps are classified by
/// their declared kind, and the trampoline jump is 5 bytes like the real one.
pub struct MockIsa;

pub const MOCK_JUMP_SIZE: u64 = 5;

impl Isa for MockIsa {
    type Instr = MockInstr;

    fn instruction_size(&self, instr: &MockInstr) -> u64 {
        instr.size
    }

    fn classify_jump(&self, instr: &MockInstr, _mem: &dyn MemoryView, at: ConcreteAddr) -> JumpKind {
        match instr.kind {
            MockKind::Plain => JumpKind::NoJump,
            MockKind::Ret => JumpKind::Return {
                cond: Cond::Unconditional,
            },
            MockKind::Jump => JumpKind::RelativeJump {
                cond: Cond::Unconditional,
                offset: 0,
                target: at,
            },
            MockKind::CondJump => JumpKind::RelativeJump {
                cond: Cond::Conditional,
                offset: 0,
                target: at,
            },
            MockKind::Call => JumpKind::DirectCall { target: at },
        }
    }

    fn make_relative_jump(&self, _from: ConcreteAddr, _to: ConcreteAddr) -> Vec<MockInstr> {
        vec![MockInstr {
            size: MOCK_JUMP_SIZE,
            kind: MockKind::Jump,
        }]
    }

    fn make_padding(&self, len: u64) -> Vec<MockInstr> {
        vec![plain(len)]
    }
}

/// Memory view that resolves nothing.
pub struct NullMemory;

impl MemoryView for NullMemory {
    fn resolve_absolute(&self, _addr: u64) -> Option<ConcreteAddr> {
        None
    }
}

pub fn concrete_block(offset: u64, instructions: Vec<MockInstr>) -> ConcreteBlock<MockInstr> {
    let size = instructions.iter().map(|i| i.size).sum();
    ConcreteBlock::new(at(offset), size, instructions)
}

pub fn symbolic_block(symbol: SymbolicAddr, instructions: Vec<MockInstr>) -> SymbolicBlock<MockInstr> {
    SymbolicBlock {
        symbol,
        instructions: instructions
            .into_iter()
            .map(|instr| SymbolicInstruction {
                instr,
                target: None,
            })
            .collect(),
    }
}

/// A pair whose original and rewritten blocks share the same instruction
/// sequence.
pub fn unchanged_pair(
    symbols: &mut SymbolSource,
    offset: u64,
    instructions: Vec<MockInstr>,
    status: BlockStatus,
) -> LayoutPair<MockInstr> {
    let original = concrete_block(offset, instructions.clone());
    let rewritten = symbolic_block(symbols.fresh(), instructions);
    LayoutPair {
        original,
        rewritten,
        status,
    }
}

/// A modified pair: the original is `orig_size` bytes, the rewritten block
/// `new_size` bytes, both ending in a return (so no fallthrough jump is
/// appended and the rewritten size is exact).
pub fn modified_pair(
    symbols: &mut SymbolSource,
    offset: u64,
    orig_size: u64,
    new_size: u64,
) -> LayoutPair<MockInstr> {
    let original = concrete_block(offset, vec![plain(orig_size - 1), ret()]);
    let rewritten = symbolic_block(symbols.fresh(), vec![plain(new_size - 1), ret()]);
    LayoutPair {
        original,
        rewritten,
        status: BlockStatus::Modified,
    }
}
