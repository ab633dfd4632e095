//! x87 sub-decoder for opcode space 0xD8..0xDF (component E).
//!
//! The FPU escape opcodes pack the actual operation into the ModR/M `reg`
//! field (for memory operands) or into the full ModR/M byte (for the
//! register-to-register and no-operand forms), so this emits IR directly
//! rather than going through the general ALU operand-building path the
//! rest of the decoder uses.

use crate::decoder::modrm::{decode_modrm, Addressing};
use crate::error::{JitError, JitResult};
use crate::ir::{IrDataType, IrInstruction, IrOpcode, IrOperand};

pub struct FpuDecodeResult {
    pub instructions: Vec<IrInstruction>,
    /// Bytes consumed after the `0xD8..0xDF` opcode byte itself.
    pub consumed: usize,
}

/// `first_byte` is the `0xD8..0xDF` escape opcode; `rest` starts at the
/// ModR/M byte.
pub fn decode_fpu_instruction(first_byte: u8, rest: &[u8], guest_address: u32) -> JitResult<FpuDecodeResult> {
    let modrm = decode_modrm(rest).ok_or(JitError::Decoding)?;

    match modrm.addressing {
        Addressing::Memory { .. } => decode_memory_form(first_byte, &modrm, guest_address),
        Addressing::Register(rm) => decode_register_form(first_byte, modrm.reg_field, rm, guest_address, modrm.consumed),
    }
}

fn mem_operand(modrm: &crate::decoder::modrm::ModRm, ty: IrDataType) -> IrOperand {
    crate::decoder::operands::addressing_to_operand(modrm.addressing, ty)
}

fn decode_memory_form(first_byte: u8, modrm: &crate::decoder::modrm::ModRm, guest_address: u32) -> JitResult<FpuDecodeResult> {
    let st0 = IrOperand::reg(0, IrDataType::F80);
    let instructions = match first_byte {
        0xD8 => {
            let mem = mem_operand(modrm, IrDataType::F32);
            match modrm.reg_field {
                0 => vec![IrInstruction::new(IrOpcode::FAdd, vec![st0, st0, mem], guest_address)],
                4 => vec![IrInstruction::new(IrOpcode::FSub, vec![st0, st0, mem], guest_address)],
                _ => return Err(JitError::Unsupported),
            }
        }
        0xD9 => {
            let mem = mem_operand(modrm, IrDataType::F32);
            match modrm.reg_field {
                0 => vec![IrInstruction::new(IrOpcode::FLoad, vec![st0, mem], guest_address)],
                2 => vec![IrInstruction::new(IrOpcode::FStore, vec![mem, st0], guest_address)],
                3 => vec![IrInstruction::new(IrOpcode::FStore, vec![mem, st0], guest_address)],
                _ => return Err(JitError::Unsupported),
            }
        }
        0xDD => {
            let mem = mem_operand(modrm, IrDataType::F64);
            match modrm.reg_field {
                0 => vec![IrInstruction::new(IrOpcode::FLoad, vec![st0, mem], guest_address)],
                2 => vec![IrInstruction::new(IrOpcode::FStore, vec![mem, st0], guest_address)],
                3 => vec![IrInstruction::new(IrOpcode::FStore, vec![mem, st0], guest_address)],
                _ => return Err(JitError::Unsupported),
            }
        }
        _ => return Err(JitError::Unsupported),
    };
    Ok(FpuDecodeResult { instructions, consumed: modrm.consumed })
}

fn decode_register_form(first_byte: u8, reg_field: u8, rm: u8, guest_address: u32, consumed: usize) -> JitResult<FpuDecodeResult> {
    let st = |i: u8| IrOperand::reg(i as u32, IrDataType::F80);

    // D9's no-operand forms are addressed by (reg_field, rm) directly;
    // DE's popping-arithmetic forms pick the operation from `reg_field`
    // alone and the target `ST(i)` from `rm`.
    let instructions = match (first_byte, reg_field, rm) {
        (0xD9, 4, 0) => vec![IrInstruction::new(IrOpcode::FChs, vec![st(0), st(0)], guest_address)],
        (0xD9, 4, 1) => vec![IrInstruction::new(IrOpcode::FAbs, vec![st(0), st(0)], guest_address)],
        (0xD9, 4, 4) => vec![IrInstruction::new(IrOpcode::FTst, vec![st(0)], guest_address)],
        (0xD9, 5, 0) => vec![IrInstruction::new(IrOpcode::FLd1, vec![st(0)], guest_address)],
        (0xD9, 5, 6) => vec![IrInstruction::new(IrOpcode::FLdZ, vec![st(0)], guest_address)],
        (0xD9, 7, 2) => vec![IrInstruction::new(IrOpcode::FSqrt, vec![st(0), st(0)], guest_address)],
        (0xD9, 6, 0) => vec![IrInstruction::new(IrOpcode::F2Xm1, vec![st(0), st(0)], guest_address)],
        (0xD9, 6, 1) => vec![IrInstruction::new(IrOpcode::FYl2X, vec![st(1), st(0), st(1)], guest_address)],
        (0xD9, 6, 2) => vec![IrInstruction::new(IrOpcode::FPTan, vec![st(0), st(0)], guest_address)],
        (0xD9, 6, 3) => vec![IrInstruction::new(IrOpcode::FPATan, vec![st(1), st(1), st(0)], guest_address)],
        (0xD9, 7, 6) => vec![IrInstruction::new(IrOpcode::FSin, vec![st(0), st(0)], guest_address)],
        (0xD9, 7, 7) => vec![IrInstruction::new(IrOpcode::FCos, vec![st(0), st(0)], guest_address)],
        (0xDE, 0, _) => vec![IrInstruction::new(IrOpcode::FAddP, vec![st(rm), st(rm), st(0)], guest_address)],
        (0xDE, 1, _) => vec![IrInstruction::new(IrOpcode::FMulP, vec![st(rm), st(rm), st(0)], guest_address)],
        (0xDE, 5, _) => vec![IrInstruction::new(IrOpcode::FSubP, vec![st(rm), st(rm), st(0)], guest_address)],
        (0xDE, 7, _) => vec![IrInstruction::new(IrOpcode::FDivP, vec![st(rm), st(rm), st(0)], guest_address)],
        _ => return Err(JitError::Unsupported),
    };
    Ok(FpuDecodeResult { instructions, consumed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fld_m32_emits_fload() {
        // D9 /0, mod=00 rm=000 -> [EAX]
        let result = decode_fpu_instruction(0xD9, &[0x00], 0x1000).unwrap();
        assert_eq!(result.instructions.len(), 1);
        assert_eq!(result.instructions[0].opcode, IrOpcode::FLoad);
    }

    #[test]
    fn fchs_register_form() {
        let result = decode_fpu_instruction(0xD9, &[0xE0], 0x1000).unwrap();
        assert_eq!(result.instructions[0].opcode, IrOpcode::FChs);
        assert_eq!(result.consumed, 1);
    }

    #[test]
    fn fsin_register_form() {
        let result = decode_fpu_instruction(0xD9, &[0xFE], 0x1000).unwrap();
        assert_eq!(result.instructions[0].opcode, IrOpcode::FSin);
    }

    #[test]
    fn faddp_pops_into_st1() {
        let result = decode_fpu_instruction(0xDE, &[0xC1], 0x1000).unwrap();
        assert_eq!(result.instructions[0].opcode, IrOpcode::FAddP);
    }

    #[test]
    fn ftst_register_form() {
        let result = decode_fpu_instruction(0xD9, &[0xE4], 0x1000).unwrap();
        assert_eq!(result.instructions[0].opcode, IrOpcode::FTst);
    }

    #[test]
    fn fld1_and_fldz_register_forms() {
        let one = decode_fpu_instruction(0xD9, &[0xE8], 0x1000).unwrap();
        assert_eq!(one.instructions[0].opcode, IrOpcode::FLd1);
        let zero = decode_fpu_instruction(0xD9, &[0xEE], 0x1000).unwrap();
        assert_eq!(zero.instructions[0].opcode, IrOpcode::FLdZ);
    }

    #[test]
    fn fsubp_fmulp_fdivp_pop_into_addressed_register() {
        let sub = decode_fpu_instruction(0xDE, &[0xE9], 0x1000).unwrap();
        assert_eq!(sub.instructions[0].opcode, IrOpcode::FSubP);
        let mul = decode_fpu_instruction(0xDE, &[0xC9], 0x1000).unwrap();
        assert_eq!(mul.instructions[0].opcode, IrOpcode::FMulP);
        let div = decode_fpu_instruction(0xDE, &[0xF9], 0x1000).unwrap();
        assert_eq!(div.instructions[0].opcode, IrOpcode::FDivP);
    }
}
