//! Decoded-instruction result type (component E).

use crate::ir::IrInstruction;

/// One guest instruction's translation: the IR it lowers to plus the byte
/// length consumed from the guest stream (including all prefixes).
#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    pub length: usize,
    pub ir: Vec<IrInstruction>,
    /// `true` if this instruction ends the current basic block (branch,
    /// call, return, or a decode-time exception raise).
    pub ends_block: bool,
}

impl DecodedInstruction {
    pub fn new(length: usize, ir: Vec<IrInstruction>, ends_block: bool) -> Self {
        Self { length, ir, ends_block }
    }
}
