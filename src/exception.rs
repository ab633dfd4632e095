//! Exception delivery (component I).
//!
//! Generated code and translation-failure recovery sequences both funnel
//! through here to reach the host's exception callback. One `ExceptionHandler`
//! per JIT instance; the C ABI boundary (out of this crate's scope) is where
//! a process-wide singleton shim would live, not here.

use crate::error::{JitError, JitResult};

/// x86 exception vector numbers this core is able to raise.
pub mod vector {
    pub const DIVIDE_ERROR: u32 = 0; // #DE
    pub const INVALID_OPCODE: u32 = 6; // #UD
    pub const PAGE_FAULT: u32 = 14; // #PF
    pub const FPU_ERROR: u32 = 16; // #MF
    pub const SIMD_EXCEPTION: u32 = 19; // #XF
}

/// Host callback signature: `(vector, error_code) -> ()`.
pub type GuestExceptionCallback = fn(vector: u32, error_code: u32);

/// Routes guest exceptions detected during translation or execution to the
/// host, tracking the faulting address the way x86 CR2 tracks page faults.
pub struct ExceptionHandler {
    callback: Option<GuestExceptionCallback>,
    last_faulting_address: u32,
}

impl ExceptionHandler {
    pub fn new() -> Self {
        Self {
            callback: None,
            last_faulting_address: 0,
        }
    }

    /// Registers the host's exception callback. A null/absent callback is
    /// host API misuse, not a translation failure.
    pub fn set_callback(&mut self, callback: GuestExceptionCallback) -> JitResult<()> {
        self.callback = Some(callback);
        tracing::info!("guest exception callback registered");
        Ok(())
    }

    pub fn get_last_faulting_address(&self) -> u32 {
        self.last_faulting_address
    }

    /// Delivers a guest exception to the host, recording `faulting_address`
    /// first so `get_last_faulting_address()` is coherent even if the
    /// callback itself inspects it.
    pub fn report_exception(&mut self, vector: u32, error_code: u32, faulting_address: u32) -> JitResult<()> {
        self.last_faulting_address = faulting_address;
        match self.callback {
            Some(callback) => {
                tracing::info!(vector, error_code, faulting_address, "reporting guest exception");
                callback(vector, error_code);
                Ok(())
            }
            None => {
                tracing::error!(vector, error_code, "exception occurred with no callback registered");
                Err(JitError::InvalidParameter)
            }
        }
    }

    pub fn report_divide_by_zero(&mut self, eip: u32) -> JitResult<()> {
        self.report_exception(vector::DIVIDE_ERROR, 0, eip)
    }

    pub fn report_invalid_opcode(&mut self, eip: u32) -> JitResult<()> {
        self.report_exception(vector::INVALID_OPCODE, 0, eip)
    }

    pub fn report_page_fault(&mut self, eip: u32, error_code: u32, fault_address: u32) -> JitResult<()> {
        self.last_faulting_address = fault_address;
        match self.callback {
            Some(callback) => {
                tracing::info!(eip, error_code, fault_address, "reporting page fault");
                callback(vector::PAGE_FAULT, error_code);
                Ok(())
            }
            None => Err(JitError::InvalidParameter),
        }
    }

    /// `fpu_status` (the FPU status word) is carried as the exception's
    /// error code so the host can inspect which sticky bits tripped.
    pub fn report_fpu_exception(&mut self, eip: u32, fpu_status: u16) -> JitResult<()> {
        self.report_exception(vector::FPU_ERROR, fpu_status as u32, eip)
    }

    pub fn report_simd_exception(&mut self, eip: u32, mxcsr: u32) -> JitResult<()> {
        self.report_exception(vector::SIMD_EXCEPTION, mxcsr, eip)
    }
}

impl Default for ExceptionHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicU32 as AU32, Ordering};

    static LAST_VECTOR: AtomicU32 = AU32::new(u32::MAX);
    static LAST_ERROR: AtomicU32 = AtomicU32::new(0);

    fn record(vector: u32, error_code: u32) {
        LAST_VECTOR.store(vector, Ordering::SeqCst);
        LAST_ERROR.store(error_code, Ordering::SeqCst);
    }

    #[test]
    fn fpu_exception_carries_status_and_eip() {
        let mut handler = ExceptionHandler::new();
        handler.set_callback(record).unwrap();
        handler.report_fpu_exception(0x4000_1000, 0x0002).unwrap();
        assert_eq!(LAST_VECTOR.load(Ordering::SeqCst), vector::FPU_ERROR);
        assert_eq!(LAST_ERROR.load(Ordering::SeqCst), 0x0002);
        assert_eq!(handler.get_last_faulting_address(), 0x4000_1000);
    }

    #[test]
    fn missing_callback_is_invalid_parameter() {
        let mut handler = ExceptionHandler::new();
        assert_eq!(handler.report_invalid_opcode(0x100).unwrap_err(), JitError::InvalidParameter);
    }
}
