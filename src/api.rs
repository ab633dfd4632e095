//! External interfaces (§6): the host-facing JIT engine facade.
//!
//! Named after the original `xenoarm_jit_*` C ABI functions but expressed
//! as methods on an owned `JitEngine` rather than a process-wide singleton
//! reached through free functions — the singleton-and-C-ABI wrapper is a
//! host-embedding concern this crate leaves to its caller.

use crate::cache::{self, ControlFlowExit, ControlFlowExitType, TranslatedBlock, TranslationCache};
use crate::codegen::{CodeGenerator, IdentityAllocator, PatchPoint};
use crate::decoder::decode_instruction;
use crate::error::{JitError, JitResult};
use crate::exception::{ExceptionHandler, GuestExceptionCallback};
use crate::ir::{BlockId, IrFunction, IrOpcode, IrOperand};
use crate::memory_model;
use crate::simd::SimdState;

pub struct JitEngine {
    initialized: bool,
    cache: TranslationCache,
    exceptions: ExceptionHandler,
    simd: SimdState,
    codegen: Box<dyn CodeGenerator>,
}

impl JitEngine {
    /// Equivalent to `xenoarm_jit_init`. `codegen` is the host's AArch64
    /// backend; this crate only calls it through the `CodeGenerator` trait.
    pub fn init(mut codegen: Box<dyn CodeGenerator>) -> JitResult<Self> {
        codegen.set_register_allocator(Box::new(IdentityAllocator));
        tracing::info!("jit engine initialized");
        Ok(Self {
            initialized: true,
            cache: TranslationCache::new(),
            exceptions: ExceptionHandler::new(),
            simd: SimdState::new(),
            codegen,
        })
    }

    /// Equivalent to `xenoarm_jit_shutdown`. Calling this twice, or calling
    /// any other method after it, is host API misuse.
    pub fn shutdown(&mut self) -> JitResult<()> {
        if !self.initialized {
            return Err(JitError::NotInitialized);
        }
        self.initialized = false;
        tracing::info!("jit engine shut down");
        Ok(())
    }

    pub fn set_exception_callback(&mut self, callback: GuestExceptionCallback) -> JitResult<()> {
        self.require_initialized()?;
        self.exceptions.set_callback(callback)
    }

    pub fn exceptions_mut(&mut self) -> &mut ExceptionHandler {
        &mut self.exceptions
    }

    pub fn simd_mut(&mut self) -> &mut SimdState {
        &mut self.simd
    }

    fn require_initialized(&self) -> JitResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(JitError::NotInitialized)
        }
    }

    /// Looks up (translating on miss) the block starting at `entry_address`
    /// and returns its executable buffer. This is the JIT's core service;
    /// actually transferring control to the generated code is a host
    /// concern (see module docs) since it requires an ISA-specific calling
    /// convention this crate does not assume.
    pub fn translate(&mut self, entry_address: u32, guest_memory: &[u8]) -> JitResult<*const u8> {
        self.require_initialized()?;
        if let Some(block) = self.cache.lookup(entry_address) {
            return Ok(block.executable().ptr);
        }

        let (function, block_end) = self.decode_block(entry_address, guest_memory)?;
        let (executable, patch_points) =
            self.codegen.generate_code(&function).map_err(|_| JitError::Translation)?;
        let exits = self.collect_exits(&function, block_end, &patch_points);

        // The cache keeps its own copy of the generated code (see
        // `cache::TranslatedBlock`) rather than aliasing the generator's
        // buffer, so its lifetime doesn't depend on the generator's own
        // allocation strategy. Sound because `generate_code` contractually
        // hands back a live buffer of exactly `executable.len` bytes.
        let host_code = unsafe { std::slice::from_raw_parts(executable.ptr, executable.len) }.to_vec();
        let guest_byte_length = block_end - entry_address;
        self.cache.store(TranslatedBlock::new(entry_address, guest_byte_length, host_code, exits));
        Ok(executable.ptr)
    }

    /// Decodes guest instructions starting at `entry_address` until one ends
    /// the block, running the memory-model pass over the result. Returns the
    /// decoded function along with the guest address immediately past the
    /// last instruction, used both as the `JCC` fallthrough target and to
    /// size the block's guest span for cache invalidation.
    fn decode_block(&mut self, entry_address: u32, guest_memory: &[u8]) -> JitResult<(IrFunction, u32)> {
        let mut function = IrFunction::new(entry_address);
        let block_id = function.add_block(entry_address);
        let mut offset = entry_address as usize;
        loop {
            let remaining = guest_memory.get(offset..).ok_or(JitError::Decoding)?;
            let decoded = decode_instruction(remaining, offset as u32)?;
            for instruction in decoded.ir {
                function.block_mut(block_id).push(instruction);
            }
            offset += decoded.length;
            if decoded.ends_block {
                break;
            }
        }
        let block = function.block_mut(block_id);
        block.instructions = memory_model::apply_memory_model_pass(&block.instructions);
        Ok((function, offset as u32))
    }

    /// Maps generated patch points to control-flow exits so the cache can
    /// chain them later. `JMP`/`CALL` with an immediate (statically known)
    /// target and `JCC` are chainable; `JCC`'s fallthrough (the address past
    /// the instruction, i.e. `block_end`) is recorded as its false target.
    /// Everything without a static target is indirect; `RET` always gets an
    /// exit entry (with no patch site) since it's a named exit kind even
    /// though it can never be chained.
    fn collect_exits(&self, function: &IrFunction, block_end: u32, patch_points: &[PatchPoint]) -> Vec<ControlFlowExit> {
        let block = function.block(BlockId(0));
        let mut patch_points = patch_points.iter().copied();
        let mut exits = Vec::new();

        for instruction in &block.instructions {
            let target = || {
                instruction.operands.iter().rev().find_map(|op| match op {
                    IrOperand::Immediate { value, .. } => Some((instruction.guest_address as i64 + value) as u32),
                    _ => None,
                })
            };
            match instruction.opcode {
                IrOpcode::Jmp => {
                    let target = target();
                    exits.push(ControlFlowExit {
                        exit_type: if target.is_some() { ControlFlowExitType::Jmp } else { ControlFlowExitType::IndirectJmp },
                        patch_point: patch_points.next().unwrap_or(cache::NO_PATCH_POINT),
                        target_guest_address: target,
                        false_target_guest_address: None,
                        is_patched: false,
                    });
                }
                IrOpcode::Jcc => {
                    exits.push(ControlFlowExit {
                        exit_type: ControlFlowExitType::ConditionalPair,
                        patch_point: patch_points.next().unwrap_or(cache::NO_PATCH_POINT),
                        target_guest_address: target(),
                        false_target_guest_address: Some(block_end),
                        is_patched: false,
                    });
                }
                IrOpcode::Call => {
                    let target = target();
                    exits.push(ControlFlowExit {
                        exit_type: if target.is_some() { ControlFlowExitType::Call } else { ControlFlowExitType::IndirectCall },
                        patch_point: patch_points.next().unwrap_or(cache::NO_PATCH_POINT),
                        target_guest_address: target,
                        false_target_guest_address: None,
                        is_patched: false,
                    });
                }
                IrOpcode::Ret => {
                    exits.push(ControlFlowExit {
                        exit_type: ControlFlowExitType::Ret,
                        patch_point: cache::NO_PATCH_POINT,
                        target_guest_address: None,
                        false_target_guest_address: None,
                        is_patched: false,
                    });
                }
                _ => {}
            }
        }
        exits
    }

    pub fn invalidate(&mut self, guest_address: u32) {
        let mut patch = |buffer, point, target| self.codegen.patch_branch(buffer, point, target);
        self.cache.invalidate(guest_address, &mut patch);
    }

    pub fn invalidate_range(&mut self, start: u32, end: u32) {
        let mut patch = |buffer, point, target| self.codegen.patch_branch(buffer, point, target);
        self.cache.invalidate_range(start, end, &mut patch);
    }

    pub fn flush(&mut self) {
        let mut patch = |buffer, point, target| self.codegen.patch_branch(buffer, point, target);
        self.cache.flush(&mut patch);
    }
}
