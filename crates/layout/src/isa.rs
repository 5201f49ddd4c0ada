//! Architecture capability consumed by the layout engine
//!
//! The engine never inspects instruction encodings itself. Everything it
//! needs from the target architecture (sizes, jump classification,
//! trampoline and padding synthesis) goes through the [`Isa`] trait, so the
//! same layout code serves any machine that can describe its jumps.

use crate::addr::ConcreteAddr;
use crate::block::{ConcreteBlock, Fallthrough, FallthroughBlock};

/// Whether a control transfer always happens or depends on a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Unconditional,
    Conditional,
}

/// Classification of a (potential) control-transfer instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// Not a control transfer; execution continues with the next instruction.
    NoJump,
    /// Call with a statically known target.
    DirectCall { target: ConcreteAddr },
    /// Call through a register or memory operand.
    IndirectCall,
    /// Return to the caller.
    Return { cond: Cond },
    /// Jump through a register or memory operand.
    IndirectJump { cond: Cond },
    /// Jump to an absolute, statically encoded target.
    AbsoluteJump { cond: Cond, target: ConcreteAddr },
    /// PC-relative jump; `offset` is the encoded displacement and `target`
    /// the resolved destination.
    RelativeJump {
        cond: Cond,
        offset: i64,
        target: ConcreteAddr,
    },
}

impl JumpKind {
    /// True if control never falls through to the next instruction.
    pub fn is_unconditional_transfer(&self) -> bool {
        matches!(
            self,
            JumpKind::Return {
                cond: Cond::Unconditional
            } | JumpKind::IndirectJump {
                cond: Cond::Unconditional
            } | JumpKind::AbsoluteJump {
                cond: Cond::Unconditional,
                ..
            } | JumpKind::RelativeJump {
                cond: Cond::Unconditional,
                ..
            }
        )
    }
}

/// A byte-addressable view of the binary being rewritten.
///
/// The layout engine itself reads no bytes; the view exists so that jump
/// classification can turn an absolute target into a tagged address.
pub trait MemoryView {
    /// Resolve an absolute address into a tagged concrete address, or `None`
    /// if the address falls outside every known segment.
    fn resolve_absolute(&self, addr: u64) -> Option<ConcreteAddr>;
}

/// Operations the layout engine needs from the target architecture.
pub trait Isa {
    /// A decoded machine instruction.
    type Instr: Clone;

    /// Encoded byte size of `instr`.
    fn instruction_size(&self, instr: &Self::Instr) -> u64;

    /// Classify the control-flow effect of `instr`, assuming it sits at
    /// address `at`. `mem` resolves absolute targets into tagged addresses.
    fn classify_jump(&self, instr: &Self::Instr, mem: &dyn MemoryView, at: ConcreteAddr)
        -> JumpKind;

    /// Synthesize an unconditional jump from `from` to `to`. The summed byte
    /// size of the returned instructions is the trampoline size used by
    /// free-space accounting.
    fn make_relative_jump(&self, from: ConcreteAddr, to: ConcreteAddr) -> Vec<Self::Instr>;

    /// Synthesize `len` bytes of trap/no-op fill.
    fn make_padding(&self, len: u64) -> Vec<Self::Instr>;

    /// Worst-case encoded size of `instr` once its branch target has been
    /// redirected (e.g. a short jump widened to its long form). Non-branch
    /// instructions keep their original size.
    fn widened_size(&self, instr: &Self::Instr) -> u64 {
        self.instruction_size(instr)
    }

    /// Byte size of a trampoline jump placed at `at`.
    fn jump_size(&self, at: ConcreteAddr) -> u64 {
        self.make_relative_jump(at, at)
            .iter()
            .map(|i| self.instruction_size(i))
            .sum()
    }

    /// Total byte size of a concrete block (sum of its instruction sizes).
    fn concrete_block_size(&self, block: &ConcreteBlock<Self::Instr>) -> u64 {
        block
            .instructions
            .iter()
            .map(|i| self.instruction_size(i))
            .sum()
    }

    /// Upper-bound byte size of a reassembled block laid out against
    /// `layout_base`: every branch widened, plus one trampoline jump if the
    /// block's last instruction carries a fallthrough annotation.
    fn symbolic_block_size(
        &self,
        block: &FallthroughBlock<Self::Instr>,
        layout_base: ConcreteAddr,
    ) -> u64 {
        let body: u64 = block
            .block
            .instructions
            .iter()
            .map(|si| self.widened_size(&si.instr))
            .sum();
        match block.tags.last() {
            Some(Fallthrough::To(_)) => body + self.jump_size(layout_base),
            _ => body,
        }
    }
}
