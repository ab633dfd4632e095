//! IR instructions (component D).

use super::operand::IrOperand;

/// Opcode space. Grouped the way the decoder emits them: integer ALU first,
/// then control flow, then memory/barrier, then x87/MMX/SSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrOpcode {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Not,
    Neg,
    Mul,
    IMul,
    Div,
    IDiv,
    Shl,
    Shr,
    Sar,
    Rol,
    Ror,
    Cmp,
    Test,
    Mov,
    MovZx,
    MovSx,
    /// `XCHG`: swaps its two operands. Atomic on x86 regardless of a `LOCK`
    /// prefix, so the decoder always precedes it with a fence node.
    Xchg,

    /// Lazy EFLAGS recompute nodes. A later pass may drop these if the
    /// flags they'd produce are never read before the next definition.
    UpdateEflagsAdd,
    UpdateEflagsSub,
    UpdateEflagsLogic,
    UpdateEflagsShift,

    Jmp,
    /// Conditional jump; the condition code is carried in `Operand::Immediate`.
    Jcc,
    Call,
    Ret,

    Load,
    Store,
    /// Emits the host memory barrier chosen by `memory_model`.
    MemFence,

    /// Guest-side explicit synchronization point: generated code must be
    /// safe to suspend/resume only here (see concurrency model).
    SafepointYield,

    FLoad,
    FStore,
    FAdd,
    FSub,
    FMul,
    FDiv,
    /// Popping forms of the four arithmetic ops (`FADDP`/`FSUBP`/`FMULP`/
    /// `FDIVP`): compute into the addressed `ST(i)` and then pop `ST(0)`,
    /// distinct from the non-popping `FAdd`/`FSub`/`FMul`/`FDiv` above.
    FAddP,
    FSubP,
    FMulP,
    FDivP,
    FCompare,
    /// `FTST`: compares `ST(0)` against +0.0 and sets C0/C2/C3 accordingly.
    FTst,
    /// `FLD1`: pushes the constant +1.0.
    FLd1,
    /// `FLDZ`: pushes the constant +0.0.
    FLdZ,
    FSin,
    FCos,
    FPTan,
    F2Xm1,
    FYl2X,
    FPATan,
    FSqrt,
    FAbs,
    FChs,
    Emms,
    /// Named but not wired to a concrete decode path (see module docs).
    FScale,
    FPrem,
    FRndInt,
    FXch,
    FIncStp,
    FDecStp,
    FLdcw,
    FNstcw,
    FNstsw,

    PAdd,
    PSub,
    PAnd,
    PXor,

    /// Raises a guest exception (vector in the first immediate operand)
    /// instead of falling through; used for decode-time #UD and runtime
    /// #DE/#MF/#XF injection points.
    RaiseException,
}

#[derive(Debug, Clone)]
pub struct IrInstruction {
    pub opcode: IrOpcode,
    pub operands: Vec<IrOperand>,
    /// Guest EIP this instruction was translated from, for exception
    /// reporting and self-modifying-code invalidation bookkeeping.
    pub guest_address: u32,
}

impl IrInstruction {
    pub fn new(opcode: IrOpcode, operands: Vec<IrOperand>, guest_address: u32) -> Self {
        Self { opcode, operands, guest_address }
    }

    pub fn dst(&self) -> Option<&IrOperand> {
        self.operands.first()
    }
}
