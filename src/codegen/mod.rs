//! AArch64 code generation contract (component G).
//!
//! This crate defines the interface a host-supplied backend implements; it
//! does not assemble AArch64 encodings itself (the two sketches in the
//! original headers disagree on that layer's shape, which is exactly the
//! kind of host-specific detail this core treats as an external
//! collaborator — see DESIGN.md).

use crate::error::JitResult;
use crate::ir::IrFunction;

/// Host-allocated executable memory a translated block lives in.
#[derive(Debug, Clone, Copy)]
pub struct ExecutableBuffer {
    pub ptr: *const u8,
    pub len: usize,
}

/// Where within a generated block a direct branch needs patching once its
/// target is known, so `cache::TranslationCache::chain` can rewrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchPoint {
    pub offset_in_block: usize,
}

/// Maps IR virtual registers to AArch64 physical registers. The default
/// identity allocator is only useful for testing the rest of the pipeline
/// end to end; production backends supply a real allocator.
pub trait RegisterAllocator {
    fn allocate(&mut self, virtual_reg: u32) -> u32;
    fn reset(&mut self);
}

/// Trivial allocator: virtual register `n` always maps to physical `n`.
/// Exists so `CodeGenerator` implementations can be exercised without a
/// real allocator wired in.
#[derive(Debug, Default)]
pub struct IdentityAllocator;

impl RegisterAllocator for IdentityAllocator {
    fn allocate(&mut self, virtual_reg: u32) -> u32 {
        virtual_reg
    }

    fn reset(&mut self) {}
}

/// Lowers IR to host machine code. Implemented per-target outside this
/// crate's core; this crate only needs the contract to drive translation
/// and caching.
pub trait CodeGenerator {
    fn set_register_allocator(&mut self, allocator: Box<dyn RegisterAllocator>);

    /// Emits code for `function` into host-managed memory, returning the
    /// buffer plus the patch points for any direct-exit branches so the
    /// translation cache can chain them later.
    fn generate_code(&mut self, function: &IrFunction) -> JitResult<(ExecutableBuffer, Vec<PatchPoint>)>;

    /// Rewrites the branch at `patch_point` (within `buffer`) to target
    /// `target_entry`, or reverts it to the exit-to-dispatcher stub when
    /// `target_entry` is `None` (used by cache invalidation/unchaining).
    fn patch_branch(&mut self, buffer: ExecutableBuffer, patch_point: PatchPoint, target_entry: Option<*const u8>);
}
