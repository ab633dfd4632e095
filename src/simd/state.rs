//! x87/MMX/SSE register file and stack machine (component B).
//!
//! The x87 stack is 8 slots of 80-bit extended precision, addressed
//! relatively through `top`; MMX aliases the low 64 bits of the same slots.
//! Mixing the two without an intervening `EMMS` is a guest programming
//! error the real CPU catches with `#MF` (device-not-available-style fault,
//! repurposed for this condition) — this type enforces the same rule so a
//! translation bug surfaces immediately in testing rather than corrupting
//! FPU state silently.

use crate::error::{JitError, JitResult};
use crate::exception::ExceptionHandler;
use crate::fpconv::{self, PrecisionControl, RoundingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum X87TagStatus {
    Valid,
    Zero,
    Special,
    Empty,
}

impl X87TagStatus {
    fn to_bits(self) -> u16 {
        match self {
            X87TagStatus::Valid => 0b00,
            X87TagStatus::Zero => 0b01,
            X87TagStatus::Special => 0b10,
            X87TagStatus::Empty => 0b11,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => X87TagStatus::Valid,
            0b01 => X87TagStatus::Zero,
            0b10 => X87TagStatus::Special,
            _ => X87TagStatus::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct X87Register {
    pub value: [u8; 10],
    pub tag: X87TagStatus,
}

impl X87Register {
    const EMPTY: X87Register = X87Register { value: [0; 10], tag: X87TagStatus::Empty };
}

/// Which register discipline last touched the stack. x87 and MMX share
/// physical storage but cannot be interleaved without `EMMS`/`FEMMS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdMode {
    Fpu,
    Mmx,
    /// An x87 op ran while in `Mmx` mode without an intervening EMMS; the
    /// next x87 access raises `#MF` instead of silently aliasing garbage.
    Mixed,
}

pub struct SimdState {
    stack: [X87Register; 8],
    /// 3-bit stack pointer, mirrored into status-word bits 11..13.
    top: u8,
    control_word: u16,
    status_word: u16,
    mode: SimdMode,
    mxcsr: u32,
}

const SW_TOP_SHIFT: u16 = 11;
const SW_TOP_MASK: u16 = 0b111 << SW_TOP_SHIFT;
const SW_C2: u16 = 1 << 10;

impl SimdState {
    pub fn new() -> Self {
        Self {
            stack: [X87Register::EMPTY; 8],
            top: 0,
            control_word: 0x037F, // power-up default: round-nearest, 64-bit precision, all exceptions masked
            status_word: 0,
            mode: SimdMode::Fpu,
            mxcsr: 0x1F80,
        }
    }

    pub fn control_word(&self) -> u16 {
        self.control_word
    }

    pub fn set_control_word(&mut self, control_word: u16) {
        self.control_word = control_word;
    }

    pub fn status_word(&self) -> u16 {
        (self.status_word & !SW_TOP_MASK) | ((self.top as u16) << SW_TOP_SHIFT)
    }

    pub fn mxcsr(&self) -> u32 {
        self.mxcsr
    }

    pub fn set_mxcsr(&mut self, mxcsr: u32) {
        self.mxcsr = mxcsr;
    }

    pub fn top(&self) -> u8 {
        self.top
    }

    pub fn mode(&self) -> SimdMode {
        self.mode
    }

    fn rounding_mode(&self) -> RoundingMode {
        RoundingMode::from_control_word(self.control_word)
    }

    fn precision_control(&self) -> PrecisionControl {
        PrecisionControl::from_control_word(self.control_word)
    }

    fn physical(&self, logical: u8) -> usize {
        ((self.top + logical) & 0x7) as usize
    }

    /// Maps a logical x87 register index (`ST(i)`) to its physical slot.
    pub fn logical_to_physical(&self, logical: u8) -> u8 {
        self.physical(logical) as u8
    }

    /// Entering `Mixed` mode (or any x87 access while already `Mixed`) is
    /// the real hardware's `#MF` condition: mark `IE` sticky immediately so
    /// `status_word()` reflects the fault before the caller even decides
    /// whether to report it.
    fn enter_fpu_mode(&mut self) -> JitResult<()> {
        match self.mode {
            SimdMode::Fpu => Ok(()),
            SimdMode::Mmx => {
                self.mode = SimdMode::Mixed;
                self.status_word |= fpconv::IE;
                Err(JitError::Execution)
            }
            SimdMode::Mixed => {
                self.status_word |= fpconv::IE;
                Err(JitError::Execution)
            }
        }
    }

    /// `EMMS`/`FEMMS`: clears all tags to empty and returns to FPU mode.
    pub fn emms(&mut self) {
        for reg in &mut self.stack {
            reg.tag = X87TagStatus::Empty;
        }
        self.mode = SimdMode::Fpu;
    }

    /// Pushes `value` onto the x87 stack, decrementing `top` first. Sets
    /// `IE` and leaves the stack unmodified on overflow (pushing into a
    /// non-empty slot), matching hardware stack-overflow semantics.
    pub fn push(&mut self, value: [u8; 10]) -> JitResult<()> {
        self.enter_fpu_mode()?;
        let new_top = self.top.wrapping_sub(1) & 0x7;
        if self.stack[new_top as usize].tag != X87TagStatus::Empty {
            self.status_word |= fpconv::IE;
            self.status_word |= SW_C2; // C1 would be set on overflow; C2 here marks the stack-fault direction convention used by this core
            return Err(JitError::Execution);
        }
        self.top = new_top;
        let tag = if value == [0u8; 10] { X87TagStatus::Zero } else { X87TagStatus::Valid };
        self.stack[self.top as usize] = X87Register { value, tag };
        Ok(())
    }

    /// Same as `push`, but on failure also surfaces the fault to the host
    /// through `exceptions` as a guest `#MF` (vector 16), carrying the
    /// current status word as its error code — the bridge invariant 5
    /// exercises: mixing MMX and x87 without `EMMS` must not just return an
    /// error internally, it must reach the registered exception callback.
    pub fn push_reporting(&mut self, value: [u8; 10], exceptions: &mut ExceptionHandler, eip: u32) -> JitResult<()> {
        match self.push(value) {
            Ok(()) => Ok(()),
            Err(err) => {
                exceptions.report_fpu_exception(eip, self.status_word())?;
                Err(err)
            }
        }
    }

    /// Pops `ST(0)`, returning its value. Sets `IE` and returns a stale
    /// empty-slot value on underflow rather than panicking.
    pub fn pop(&mut self) -> JitResult<[u8; 10]> {
        self.enter_fpu_mode()?;
        let physical = self.top as usize;
        if self.stack[physical].tag == X87TagStatus::Empty {
            self.status_word |= fpconv::IE;
            return Err(JitError::Execution);
        }
        let value = self.stack[physical].value;
        self.stack[physical].tag = X87TagStatus::Empty;
        self.top = (self.top + 1) & 0x7;
        Ok(value)
    }

    /// Pops `ST(0)` without returning the value (e.g. `FSTP` already wrote
    /// it elsewhere); same underflow behavior as `pop`.
    pub fn pop_without_result(&mut self) -> JitResult<()> {
        self.pop().map(|_| ())
    }

    pub fn read(&mut self, logical: u8) -> JitResult<[u8; 10]> {
        self.enter_fpu_mode()?;
        let physical = self.physical(logical);
        if self.stack[physical].tag == X87TagStatus::Empty {
            self.status_word |= fpconv::IE;
            return Err(JitError::Execution);
        }
        Ok(self.stack[physical].value)
    }

    pub fn write(&mut self, logical: u8, value: [u8; 10]) -> JitResult<()> {
        self.enter_fpu_mode()?;
        let physical = self.physical(logical);
        let tag = if value == [0u8; 10] { X87TagStatus::Zero } else { X87TagStatus::Valid };
        self.stack[physical] = X87Register { value, tag };
        Ok(())
    }

    pub fn tag(&self, logical: u8) -> X87TagStatus {
        self.stack[self.physical(logical)].tag
    }

    /// Packed tag word: 2 bits per *physical* register, ST(0) at bit 0 up to
    /// the teacher's register 7 at bit 14 (unlike `status_word`, no logical
    /// remapping through `top`).
    pub fn tag_word(&self) -> u16 {
        let mut word = 0u16;
        for (physical, reg) in self.stack.iter().enumerate() {
            word |= reg.tag.to_bits() << (physical * 2);
        }
        word
    }

    pub fn set_tag_word(&mut self, tag_word: u16) {
        for (physical, reg) in self.stack.iter_mut().enumerate() {
            reg.tag = X87TagStatus::from_bits(tag_word >> (physical * 2));
        }
    }

    /// Applies the current precision control to a freshly computed result,
    /// folding the truncation's exception flags into the status word.
    pub fn round_result(&mut self, value: [u8; 10]) -> [u8; 10] {
        let (rounded, status) = fpconv::apply_precision_control(value, self.precision_control(), self.rounding_mode());
        self.status_word |= status;
        rounded
    }

    // --- MMX aliasing -----------------------------------------------------
    // MM0..MM7 are the low 64 bits of the corresponding *physical* x87 slot
    // (MMX addressing is absolute, unlike the x87 stack's relative ST(i)).

    pub fn read_mmx(&mut self, reg: u8) -> JitResult<u64> {
        match self.mode {
            SimdMode::Fpu => self.mode = SimdMode::Mmx,
            SimdMode::Mmx => {}
            SimdMode::Mixed => return Err(JitError::Execution),
        }
        let value = self.stack[reg as usize].value;
        Ok(u64::from_le_bytes(value[0..8].try_into().unwrap()))
    }

    /// Any MMX write marks every stack slot `Valid` and zeros each slot's
    /// unused exponent bytes, not just the addressed register's.
    pub fn write_mmx(&mut self, reg: u8, value: u64) -> JitResult<()> {
        match self.mode {
            SimdMode::Fpu => self.mode = SimdMode::Mmx,
            SimdMode::Mmx => {}
            SimdMode::Mixed => return Err(JitError::Execution),
        }
        for slot in &mut self.stack {
            slot.tag = X87TagStatus::Valid;
            slot.value[8] = 0;
            slot.value[9] = 0;
        }
        self.stack[reg as usize].value[0..8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

impl Default for SimdState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_one() -> [u8; 10] {
        fpconv::f64_to_f80(0x3FF0_0000_0000_0000).0
    }

    #[test]
    fn push_then_pop_round_trips() {
        let mut state = SimdState::new();
        let one = encode_one();
        state.push(one).unwrap();
        assert_eq!(state.tag(0), X87TagStatus::Valid);
        let popped = state.pop().unwrap();
        assert_eq!(popped, one);
    }

    #[test]
    fn pop_on_empty_stack_sets_ie_and_errs() {
        let mut state = SimdState::new();
        assert!(state.pop().is_err());
        assert_ne!(state.status_word() & fpconv::IE, 0);
    }

    #[test]
    fn push_eight_then_ninth_overflows() {
        let mut state = SimdState::new();
        let one = encode_one();
        for _ in 0..8 {
            state.push(one).unwrap();
        }
        assert!(state.push(one).is_err());
        assert_ne!(state.status_word() & fpconv::IE, 0);
    }

    #[test]
    fn top_is_mirrored_into_status_word() {
        let mut state = SimdState::new();
        state.push(encode_one()).unwrap();
        let sw = state.status_word();
        assert_eq!((sw & SW_TOP_MASK) >> SW_TOP_SHIFT, state.top() as u16);
    }

    #[test]
    fn mmx_then_x87_without_emms_raises_mf_on_first_x87_op() {
        let mut state = SimdState::new();
        state.write_mmx(0, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(state.mode(), SimdMode::Mmx);
        assert!(state.push(encode_one()).is_err());
        assert_eq!(state.mode(), SimdMode::Mixed);
        assert_ne!(state.status_word() & fpconv::IE, 0);
    }

    #[test]
    fn push_reporting_delivers_mf_to_the_exception_callback() {
        use crate::exception::vector;
        use std::sync::atomic::{AtomicU32, Ordering};

        static LAST_VECTOR: AtomicU32 = AtomicU32::new(u32::MAX);
        fn record(vector: u32, _error_code: u32) {
            LAST_VECTOR.store(vector, Ordering::SeqCst);
        }

        let mut state = SimdState::new();
        let mut exceptions = ExceptionHandler::new();
        exceptions.set_callback(record).unwrap();

        state.write_mmx(0, 1).unwrap();
        assert!(state.push_reporting(encode_one(), &mut exceptions, 0x4000_2000).is_err());
        assert_eq!(LAST_VECTOR.load(Ordering::SeqCst), vector::FPU_ERROR);
        assert_eq!(exceptions.get_last_faulting_address(), 0x4000_2000);
    }

    #[test]
    fn emms_clears_tags_and_returns_to_fpu_mode() {
        let mut state = SimdState::new();
        state.write_mmx(0, 1).unwrap();
        state.emms();
        assert_eq!(state.mode(), SimdMode::Fpu);
        assert_eq!(state.tag(0), X87TagStatus::Empty);
    }

    #[test]
    fn mmx_register_aliases_low_64_bits_of_x87_slot() {
        let mut state = SimdState::new();
        state.write_mmx(2, 0xDEAD_BEEF_CAFE_F00D).unwrap();
        assert_eq!(state.read_mmx(2).unwrap(), 0xDEAD_BEEF_CAFE_F00D);
    }

    #[test]
    fn mmx_write_marks_every_slot_valid_and_zeros_their_exponent_bytes() {
        let mut state = SimdState::new();
        state.write_mmx(3, 0x0102_0304_0506_0708).unwrap();
        for logical in 0..8u8 {
            assert_eq!(state.tag(logical), X87TagStatus::Valid);
        }
        assert_eq!(state.tag_word(), 0x0000);
    }

    #[test]
    fn tag_word_round_trips_through_set_tag_word() {
        let mut state = SimdState::new();
        state.write_mmx(0, 1).unwrap();
        state.set_tag_word(0b11_00_11_00_11_00_11_01);
        assert_eq!(state.tag(0), X87TagStatus::Zero);
        assert_eq!(state.tag_word(), 0b11_00_11_00_11_00_11_01);
    }
}
