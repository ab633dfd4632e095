//! x86 TSO → ARM weak-ordering reconciliation (component F).
//!
//! x86 loads/stores are totally ordered except store-forwarding; AArch64 is
//! weakly ordered and needs explicit `DMB`/`DSB`/`ISB` to recover the
//! guarantees guest code assumes. This module classifies each access pair
//! and emits the matching barrier as an `IrOpcode::MemFence` node; it never
//! touches the generated code itself (that's component G's job).

use crate::ir::{IrDataType, IrInstruction, IrOpcode, IrOperand};

/// Host barrier strength, ordered from "instruction already orders this"
/// to the strongest generated sequence required to model an x86 `MFENCE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierType {
    None,
    /// Guest `MFENCE`.
    MFence,
    /// Guest `SFENCE`.
    SFence,
    /// Guest `LFENCE`.
    LFence,
    /// Implicit barrier around a `LOCK`-prefixed instruction.
    LockPrefix,
    /// Implicit barrier around `XCHG` (locked by definition on x86).
    Xchg,
    /// Host `DMB ISH` (full inner-shareable barrier).
    DmbIsh,
    /// Host `DMB ISHST` (inner-shareable store-store subset, guest `SFENCE`).
    DmbIshSt,
    /// Host `DMB ISHLD` (inner-shareable load-load subset, guest `LFENCE`).
    DmbIshLd,
    /// Host `DSB ISH` (full inner-shareable barrier, waits for completion).
    DsbIsh,
    /// Host `ISB` (pipeline flush, needed after code modification).
    Isb,
}

/// Kind of access on either side of a potential ordering hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Load,
    Store,
}

/// x86 TSO only requires ordering enforcement for store→load and
/// store→store pairs; load→load and load→store are already ordered on
/// both ISAs and need nothing inserted.
pub fn needs_barrier_between(first: AccessKind, second: AccessKind) -> bool {
    matches!((first, second), (AccessKind::Store, _))
}

/// Host barrier a given guest `BarrierType` lowers to. `SFENCE`/`LFENCE`
/// only need their respective store or load subset, not the full barrier
/// `MFENCE`/`LOCK`/`XCHG` require.
pub fn host_barrier_for(barrier: BarrierType) -> BarrierType {
    match barrier {
        BarrierType::None => BarrierType::None,
        BarrierType::MFence | BarrierType::LockPrefix | BarrierType::Xchg => BarrierType::DmbIsh,
        BarrierType::SFence => BarrierType::DmbIshSt,
        BarrierType::LFence => BarrierType::DmbIshLd,
        BarrierType::DmbIsh | BarrierType::DmbIshSt | BarrierType::DmbIshLd | BarrierType::DsbIsh | BarrierType::Isb => {
            barrier
        }
    }
}

/// Barrier required around a self-modifying-code trampoline: a data-side
/// `DSB` to retire the write followed by `ISB` to flush stale decoded
/// instructions from the pipeline.
pub fn code_modification_barrier() -> [BarrierType; 2] {
    [BarrierType::DsbIsh, BarrierType::Isb]
}

/// Classifies a load at translation time. Returns the barrier (if any) that
/// must precede it given the kind of the prior access in program order.
pub fn analyze_load_operation(previous: Option<AccessKind>) -> BarrierType {
    match previous {
        Some(AccessKind::Store) => BarrierType::DmbIsh,
        _ => BarrierType::None,
    }
}

/// Classifies a store at translation time, symmetric to `analyze_load_operation`.
pub fn analyze_store_operation(previous: Option<AccessKind>) -> BarrierType {
    match previous {
        Some(AccessKind::Store) => BarrierType::DmbIsh,
        _ => BarrierType::None,
    }
}

/// Appends a `MEM_FENCE` IR node for `barrier` to `block`, unless it is
/// `BarrierType::None`.
pub fn add_memory_barrier_to_ir(block: &mut Vec<IrInstruction>, barrier: BarrierType, guest_address: u32) {
    if barrier == BarrierType::None {
        return;
    }
    block.push(IrInstruction::new(
        IrOpcode::MemFence,
        vec![IrOperand::imm(barrier as i64, IrDataType::U32)],
        guest_address,
    ));
}

/// Classifies an instruction's memory access, if any: a memory operand in
/// the destination position (operand 0) is a store, a memory operand
/// anywhere else is a load. x86 never encodes a memory operand on both
/// sides of the same instruction.
fn classify_access(instruction: &IrInstruction) -> Option<AccessKind> {
    match instruction.operands.first() {
        Some(IrOperand::Memory { .. }) => return Some(AccessKind::Store),
        _ => {}
    }
    if instruction.operands.iter().any(|op| matches!(op, IrOperand::Memory { .. })) {
        Some(AccessKind::Load)
    } else {
        None
    }
}

/// The memory-model pass: walks a decoded block's instructions in program
/// order and splices in the `MEM_FENCE` nodes the x86-TSO-to-ARM-weak
/// reconciliation requires ahead of each load/store, based on the kind of
/// access immediately preceding it.
pub fn apply_memory_model_pass(block: &[IrInstruction]) -> Vec<IrInstruction> {
    let mut out = Vec::with_capacity(block.len());
    let mut previous: Option<AccessKind> = None;
    for instruction in block {
        if let Some(kind) = classify_access(instruction) {
            let barrier = match kind {
                AccessKind::Load => analyze_load_operation(previous),
                AccessKind::Store => analyze_store_operation(previous),
            };
            add_memory_barrier_to_ir(&mut out, barrier, instruction.guest_address);
            previous = Some(kind);
        }
        out.push(instruction.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_load_needs_barrier() {
        assert!(needs_barrier_between(AccessKind::Store, AccessKind::Load));
    }

    #[test]
    fn load_then_load_needs_no_barrier() {
        assert!(!needs_barrier_between(AccessKind::Load, AccessKind::Load));
    }

    #[test]
    fn load_then_store_needs_no_barrier() {
        assert!(!needs_barrier_between(AccessKind::Load, AccessKind::Store));
    }

    #[test]
    fn mfence_lowers_to_full_barrier() {
        assert_eq!(host_barrier_for(BarrierType::MFence), BarrierType::DmbIsh);
    }

    #[test]
    fn sfence_lowers_to_the_store_only_subset() {
        assert_eq!(host_barrier_for(BarrierType::SFence), BarrierType::DmbIshSt);
    }

    #[test]
    fn lfence_lowers_to_the_load_only_subset() {
        assert_eq!(host_barrier_for(BarrierType::LFence), BarrierType::DmbIshLd);
    }

    #[test]
    fn code_modification_uses_dsb_then_isb() {
        assert_eq!(code_modification_barrier(), [BarrierType::DsbIsh, BarrierType::Isb]);
    }

    fn store_to(addr: u32) -> IrInstruction {
        let mem = IrOperand::mem_base(0, 0, IrDataType::U32);
        let reg = IrOperand::reg(1, IrDataType::U32);
        IrInstruction::new(IrOpcode::Store, vec![mem, reg], addr)
    }

    fn load_from(addr: u32) -> IrInstruction {
        let reg = IrOperand::reg(1, IrDataType::U32);
        let mem = IrOperand::mem_base(0, 0, IrDataType::U32);
        IrInstruction::new(IrOpcode::Load, vec![reg, mem], addr)
    }

    #[test]
    fn pass_inserts_no_barrier_before_the_first_access_in_a_block() {
        let out = apply_memory_model_pass(&[load_from(0x1000)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].opcode, IrOpcode::Load);
    }

    #[test]
    fn pass_inserts_a_fence_between_a_store_and_a_following_load() {
        let out = apply_memory_model_pass(&[store_to(0x1000), load_from(0x1004)]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].opcode, IrOpcode::Store);
        assert_eq!(out[1].opcode, IrOpcode::MemFence);
        assert_eq!(out[2].opcode, IrOpcode::Load);
    }

    #[test]
    fn pass_inserts_nothing_between_two_consecutive_loads() {
        let out = apply_memory_model_pass(&[load_from(0x1000), load_from(0x1004)]);
        assert_eq!(out.len(), 2);
    }
}
