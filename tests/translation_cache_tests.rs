//! Translation cache scenario: two blocks chained by a direct branch, then
//! the target invalidated (e.g. by guest self-modifying code), which must
//! unchain the caller's patched branch before the target is freed.

use x86_arm_jit::cache::{ControlFlowExit, ControlFlowExitType, TranslatedBlock, TranslationCache};
use x86_arm_jit::codegen::PatchPoint;

fn code(len: usize) -> Vec<u8> {
    vec![0u8; len]
}

#[test]
fn chain_then_invalidate_reverts_the_patched_caller() {
    let mut cache = TranslationCache::new();
    cache.store(TranslatedBlock::new(
        0x1000,
        5,
        code(0x100),
        vec![ControlFlowExit {
            exit_type: ControlFlowExitType::Jmp,
            patch_point: PatchPoint { offset_in_block: 0x20 },
            target_guest_address: Some(0x2000),
            false_target_guest_address: None,
            is_patched: false,
        }],
    ));
    cache.store(TranslatedBlock::new(0x2000, 2, code(0x100), vec![]));
    let target_ptr = cache.lookup(0x2000).unwrap().executable().ptr;

    let mut events: Vec<(PatchPoint, Option<*const u8>)> = Vec::new();
    {
        let mut patch = |_buffer, point, target| events.push((point, target));
        assert!(cache.chain(0x1000, 0, 0x2000, &mut patch));
    }
    assert_eq!(events, vec![(PatchPoint { offset_in_block: 0x20 }, Some(target_ptr))]);
    assert_eq!(cache.get_chained_block_count(), 1);

    events.clear();
    {
        let mut patch = |_buffer, point, target| events.push((point, target));
        cache.invalidate(0x2000, &mut patch);
    }
    assert_eq!(events, vec![(PatchPoint { offset_in_block: 0x20 }, None)]);
    assert!(cache.lookup(0x2000).is_none());
    assert!(cache.lookup(0x1000).is_some(), "the caller block itself must survive invalidation");
}

#[test]
fn flush_unchains_and_clears_every_block() {
    let mut cache = TranslationCache::new();
    cache.store(TranslatedBlock::new(0x1000, 5, code(0x100), vec![]));
    cache.store(TranslatedBlock::new(0x2000, 2, code(0x100), vec![]));
    let mut patch = |_, _, _| {};
    cache.flush(&mut patch);
    assert!(cache.lookup(0x1000).is_none());
    assert!(cache.lookup(0x2000).is_none());
}
