//! Memory-model classification matches the ordering table in the design:
//! only a preceding store forces a barrier before the next access.

use x86_arm_jit::ir::IrInstruction;
use x86_arm_jit::memory_model::{add_memory_barrier_to_ir, analyze_load_operation, AccessKind, BarrierType};

#[test]
fn load_after_store_requires_a_barrier() {
    assert_eq!(analyze_load_operation(Some(AccessKind::Store)), BarrierType::DmbIsh);
}

#[test]
fn load_after_load_requires_nothing() {
    assert_eq!(analyze_load_operation(Some(AccessKind::Load)), BarrierType::None);
}

#[test]
fn first_access_in_a_block_requires_nothing() {
    assert_eq!(analyze_load_operation(None), BarrierType::None);
}

#[test]
fn emitting_a_none_barrier_adds_no_ir_node() {
    let mut block: Vec<IrInstruction> = Vec::new();
    add_memory_barrier_to_ir(&mut block, BarrierType::None, 0x1000);
    assert!(block.is_empty());
}

#[test]
fn emitting_a_real_barrier_adds_one_mem_fence_node() {
    let mut block: Vec<IrInstruction> = Vec::new();
    add_memory_barrier_to_ir(&mut block, BarrierType::DmbIsh, 0x1000);
    assert_eq!(block.len(), 1);
}
