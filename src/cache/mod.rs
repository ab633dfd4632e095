//! Translation cache (component H).
//!
//! Guest-address-keyed exact-match cache of translated blocks, grounded in
//! the original `TranslationCache` but reshaped around the teacher's
//! `DecodeCache` (`cpu/tier2/cache.rs`): a `HashMap` keyed by guest address,
//! hit/miss counters, and `invalidate`/`invalidate_range`/`clear` with the
//! same names. Unlike the teacher's cache, entries here carry *chained*
//! control-flow exits, so invalidation has to unchain incoming callers
//! before it can free a block.

use std::collections::{HashMap, HashSet};

use crate::codegen::{ExecutableBuffer, PatchPoint};

/// Sentinel used by exits that have no patch site at all (e.g. `RET`, which
/// the cache must still record as an exit but can never chain).
pub const NO_PATCH_POINT: PatchPoint = PatchPoint { offset_in_block: usize::MAX };

/// The seven exit kinds a basic block can end in. `ConditionalPair` is the
/// only one carrying two targets: `target_guest_address` is the taken
/// branch, `false_target_guest_address` the fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlowExitType {
    Jmp,
    ConditionalPair,
    Call,
    Ret,
    Fallthrough,
    IndirectJmp,
    IndirectCall,
}

#[derive(Debug, Clone, Copy)]
pub struct ControlFlowExit {
    pub exit_type: ControlFlowExitType,
    pub patch_point: PatchPoint,
    /// Known for direct/chainable exits; `None` for indirect ones and for
    /// `Ret`, which is never chained.
    pub target_guest_address: Option<u32>,
    /// Only meaningful for `ConditionalPair`: the not-taken fallthrough target.
    pub false_target_guest_address: Option<u32>,
    /// Set by `chain`, cleared by the unchain step of `invalidate`.
    pub is_patched: bool,
}

pub struct TranslatedBlock {
    pub guest_address: u32,
    /// Size, in bytes, of the guest instruction stream this block consumed.
    pub guest_byte_length: u32,
    /// Cache-owned copy of the generated host code. Distinct from whatever
    /// buffer the code generator used to assemble it: the cache keeps its
    /// own copy so a block's lifetime isn't tied to the generator's scratch
    /// allocation.
    host_code: Vec<u8>,
    pub exits: Vec<ControlFlowExit>,
    pub is_linked: bool,
    /// Guest addresses of blocks whose exits are currently patched to jump
    /// directly into this one; used to unchain them before eviction.
    incoming_links: HashSet<u32>,
}

impl TranslatedBlock {
    pub fn new(guest_address: u32, guest_byte_length: u32, host_code: Vec<u8>, exits: Vec<ControlFlowExit>) -> Self {
        Self { guest_address, guest_byte_length, host_code, exits, is_linked: false, incoming_links: HashSet::new() }
    }

    /// Pointer into this block's cache-owned code. Stable between store and
    /// invalidation, since `host_code` is never reallocated afterward.
    pub fn executable(&self) -> ExecutableBuffer {
        ExecutableBuffer { ptr: self.host_code.as_ptr(), len: self.host_code.len() }
    }

    /// `[guest_address, guest_address + guest_byte_length)`.
    fn guest_span(&self) -> (u32, u32) {
        (self.guest_address, self.guest_address + self.guest_byte_length)
    }
}

/// Caller-supplied, ISA-agnostic patcher: rewrites the branch at
/// `patch_point` within `buffer` to target `target` (`None` reverts it to
/// the dispatcher re-entry stub).
pub type PatchFn<'a> = dyn FnMut(ExecutableBuffer, PatchPoint, Option<*const u8>) + 'a;

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct TranslationCache {
    blocks: HashMap<u32, TranslatedBlock>,
    stats: CacheStats,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self { blocks: HashMap::new(), stats: CacheStats::default() }
    }

    pub fn lookup(&mut self, guest_address: u32) -> Option<&TranslatedBlock> {
        let hit = self.blocks.contains_key(&guest_address);
        if hit {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        self.blocks.get(&guest_address)
    }

    /// Inserts a newly translated block. Assumes no entry already exists
    /// for `guest_address`; callers must `invalidate` first if replacing one.
    /// `block.host_code` is already the cache's own copy (see
    /// `TranslatedBlock::new`), so this leaves `is_linked` false and simply
    /// takes ownership.
    pub fn store(&mut self, block: TranslatedBlock) {
        debug_assert!(!self.blocks.contains_key(&block.guest_address), "store() over an existing entry");
        self.blocks.insert(block.guest_address, block);
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.stats.hits + self.stats.misses;
        if total == 0 {
            0.0
        } else {
            self.stats.hits as f64 / total as f64
        }
    }

    /// Patches `source`'s exit at `exit_index` directly to `target`'s entry
    /// point, and records the link so `target`'s eviction can unchain it.
    /// No-op (returns `false`) if either block is absent or the exit isn't
    /// a chainable type with a matching target address (checked against
    /// both the taken and fallthrough targets, since `ConditionalPair`
    /// carries both).
    pub fn chain(&mut self, source: u32, exit_index: usize, target: u32, patch: &mut PatchFn) -> bool {
        let target_entry = match self.blocks.get(&target) {
            Some(block) => block.executable().ptr,
            None => return false,
        };
        let source_block = match self.blocks.get(&source) {
            Some(block) => block,
            None => return false,
        };
        let matches = matches!(
            source_block.exits.get(exit_index),
            Some(exit) if exit.target_guest_address == Some(target) || exit.false_target_guest_address == Some(target)
        );
        if !matches {
            return false;
        }
        let executable = source_block.executable();
        let patch_point = source_block.exits[exit_index].patch_point;
        patch(executable, patch_point, Some(target_entry));

        let source_block = self.blocks.get_mut(&source).unwrap();
        source_block.exits[exit_index].is_patched = true;
        source_block.is_linked = true;
        self.blocks.get_mut(&target).unwrap().incoming_links.insert(source);
        debug_assert!(self.check_incoming_links_invariant(), "invariant 2 violated after chain");
        true
    }

    fn unchain_incoming(&mut self, guest_address: u32, patch: &mut PatchFn) {
        let incoming: Vec<u32> = match self.blocks.get(&guest_address) {
            Some(block) => block.incoming_links.iter().copied().collect(),
            None => return,
        };
        for source in incoming {
            if let Some(source_block) = self.blocks.get(&source) {
                let executable = source_block.executable();
                let patch_points: Vec<PatchPoint> = source_block
                    .exits
                    .iter()
                    .filter(|exit| {
                        exit.target_guest_address == Some(guest_address)
                            || exit.false_target_guest_address == Some(guest_address)
                    })
                    .map(|exit| exit.patch_point)
                    .collect();
                for patch_point in patch_points {
                    patch(executable, patch_point, None);
                }
                if let Some(source_block) = self.blocks.get_mut(&source) {
                    for exit in &mut source_block.exits {
                        if exit.target_guest_address == Some(guest_address)
                            || exit.false_target_guest_address == Some(guest_address)
                        {
                            exit.is_patched = false;
                        }
                    }
                    source_block.is_linked = source_block.exits.iter().any(|exit| exit.is_patched);
                }
            }
        }
    }

    /// Unchains every caller into `guest_address`, then removes the block.
    pub fn invalidate(&mut self, guest_address: u32, patch: &mut PatchFn) {
        self.unchain_incoming(guest_address, patch);
        self.blocks.remove(&guest_address);
        debug_assert!(self.check_incoming_links_invariant(), "invariant 2 violated after invalidate");
    }

    /// Invariant 2 of this component's design: for every block B in
    /// `incoming_links(T)`, some exit of B is patched and targets T. Checked
    /// with `debug_assert!` after every mutating operation and exercised
    /// directly by the cache's randomized property tests.
    pub fn check_incoming_links_invariant(&self) -> bool {
        for (&target, target_block) in &self.blocks {
            for &source in &target_block.incoming_links {
                let Some(source_block) = self.blocks.get(&source) else { return false };
                let linked = source_block.exits.iter().any(|exit| {
                    exit.is_patched
                        && (exit.target_guest_address == Some(target) || exit.false_target_guest_address == Some(target))
                });
                if !linked {
                    return false;
                }
            }
        }
        true
    }

    /// Invalidates every block whose guest span `[guest_address,
    /// guest_address + guest_byte_length)` intersects `[start, end)`, not
    /// just ones whose entry address falls inside it.
    pub fn invalidate_range(&mut self, start: u32, end: u32, patch: &mut PatchFn) {
        let victims: Vec<u32> = self
            .blocks
            .values()
            .filter(|block| {
                let (block_start, block_end) = block.guest_span();
                block_start < end && block_end > start
            })
            .map(|block| block.guest_address)
            .collect();
        for addr in victims {
            self.invalidate(addr, patch);
        }
    }

    pub fn flush(&mut self, patch: &mut PatchFn) {
        let all: Vec<u32> = self.blocks.keys().copied().collect();
        for addr in all {
            self.invalidate(addr, patch);
        }
        self.stats = CacheStats::default();
    }

    pub fn get_chained_block_count(&self) -> usize {
        self.blocks.values().filter(|b| !b.incoming_links.is_empty()).count()
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    fn direct_exit(target: u32) -> ControlFlowExit {
        ControlFlowExit {
            exit_type: ControlFlowExitType::Jmp,
            patch_point: PatchPoint { offset_in_block: 0x10 },
            target_guest_address: Some(target),
            false_target_guest_address: None,
            is_patched: false,
        }
    }

    #[test]
    fn lookup_miss_then_hit_after_store() {
        let mut cache = TranslationCache::new();
        assert!(cache.lookup(0x1000).is_none());
        cache.store(TranslatedBlock::new(0x1000, 4, code(0x40), vec![]));
        assert!(cache.lookup(0x1000).is_some());
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn store_gives_the_block_its_own_copy_of_the_code_bytes() {
        let mut cache = TranslationCache::new();
        let mut bytes = code(0x10);
        bytes[0] = 0xAB;
        let external_ptr = bytes.as_ptr();
        cache.store(TranslatedBlock::new(0x1000, 4, bytes, vec![]));
        let block = cache.lookup(0x1000).unwrap();
        assert_ne!(block.executable().ptr, external_ptr, "cache must hold its own copy, not the caller's buffer");
    }

    #[test]
    fn chain_patches_and_records_incoming_link() {
        let mut cache = TranslationCache::new();
        cache.store(TranslatedBlock::new(0x1000, 4, code(0x40), vec![direct_exit(0x2000)]));
        cache.store(TranslatedBlock::new(0x2000, 4, code(0x40), vec![]));
        let target_ptr = cache.lookup(0x2000).unwrap().executable().ptr;

        let mut patched = Vec::new();
        let mut patch = |_buf, point, target| patched.push((point, target));
        assert!(cache.chain(0x1000, 0, 0x2000, &mut patch));

        assert_eq!(patched, vec![(PatchPoint { offset_in_block: 0x10 }, Some(target_ptr))]);
        assert_eq!(cache.get_chained_block_count(), 1);
        let source = cache.lookup(0x1000).unwrap();
        assert!(source.is_linked);
        assert!(source.exits[0].is_patched);
    }

    #[test]
    fn invalidate_unchains_callers_before_removal() {
        let mut cache = TranslationCache::new();
        cache.store(TranslatedBlock::new(0x1000, 4, code(0x40), vec![direct_exit(0x2000)]));
        cache.store(TranslatedBlock::new(0x2000, 4, code(0x40), vec![]));
        let mut noop = |_, _, _| {};
        cache.chain(0x1000, 0, 0x2000, &mut noop);

        let mut reverted = Vec::new();
        let mut patch = |_buf, point, target| reverted.push((point, target));
        cache.invalidate(0x2000, &mut patch);

        assert_eq!(reverted, vec![(PatchPoint { offset_in_block: 0x10 }, None)]);
        assert!(cache.lookup(0x2000).is_none());
        let source = cache.lookup(0x1000).unwrap();
        assert!(!source.is_linked);
        assert!(!source.exits[0].is_patched);
    }

    #[test]
    fn invalidate_range_sweeps_matching_blocks_only() {
        let mut cache = TranslationCache::new();
        cache.store(TranslatedBlock::new(0x1000, 4, code(0x40), vec![]));
        cache.store(TranslatedBlock::new(0x2000, 4, code(0x40), vec![]));
        let mut noop = |_, _, _| {};
        cache.invalidate_range(0x1000, 0x1800, &mut noop);
        assert!(cache.lookup(0x1000).is_none());
        assert!(cache.lookup(0x2000).is_some());
    }

    #[test]
    fn invalidate_range_catches_a_block_whose_span_straddles_the_boundary() {
        // Block at 0x1ffc, 8 bytes long, ends at 0x2004 -- entry address
        // falls outside [0x2000, 0x3000) but its span still overlaps it.
        let mut cache = TranslationCache::new();
        cache.store(TranslatedBlock::new(0x1ffc, 8, code(0x40), vec![]));
        let mut noop = |_, _, _| {};
        cache.invalidate_range(0x2000, 0x3000, &mut noop);
        assert!(cache.lookup(0x1ffc).is_none());
    }
}
