//! x86-32 instruction decoder (component E).
//!
//! Decodes one guest instruction at a time into IR. Mirrors the original
//! decoder's opcode grouping (`decoder.cpp`): `MOV` forms first since
//! they're overwhelmingly the hottest path, then the ALU group, then
//! control flow, with the 0xD8..0xDF FPU escape space handed off to
//! `fpu::decode_fpu_instruction` entirely.

pub mod fpu;
pub mod instruction;
pub mod modrm;
pub mod operands;
pub mod prefix;

use crate::error::{JitError, JitResult};
use crate::ir::{IrDataType, IrInstruction, IrOpcode, IrOperand};
use crate::memory_model::{host_barrier_for, BarrierType};
use instruction::DecodedInstruction;
use modrm::decode_modrm;
use operands::{addressing_to_operand, reg_field_operand};
use prefix::scan_prefixes;

fn fence_node(barrier: BarrierType, guest_address: u32) -> IrInstruction {
    IrInstruction::new(IrOpcode::MemFence, vec![IrOperand::imm(barrier as i64, IrDataType::U32)], guest_address)
}

fn operand_width(prefixes: &prefix::Prefixes) -> IrDataType {
    if prefixes.operand_size_override {
        IrDataType::U16
    } else {
        IrDataType::U32
    }
}

fn read_imm32(bytes: &[u8]) -> JitResult<i64> {
    let raw: [u8; 4] = bytes.get(0..4).ok_or(JitError::Decoding)?.try_into().unwrap();
    Ok(i32::from_le_bytes(raw) as i64)
}

fn read_rel8(bytes: &[u8]) -> JitResult<i64> {
    Ok(*bytes.first().ok_or(JitError::Decoding)? as i8 as i64)
}

fn read_rel32(bytes: &[u8]) -> JitResult<i64> {
    read_imm32(bytes)
}

struct AluOp {
    opcode: IrOpcode,
    update_eflags: Option<IrOpcode>,
}

fn alu_op_for(byte_low5: u8) -> Option<AluOp> {
    // Standard x86 ALU group layout: each operator owns a 5-opcode run
    // (Eb,Gb / Ev,Gv / Gb,Eb / Gv,Ev / AL,imm8 / eAX,immz), offset by 0x08
    // per operator. We only implement the Ev,Gv (+1) and Gv,Ev (+3) forms.
    match byte_low5 {
        0x00 => Some(AluOp { opcode: IrOpcode::Add, update_eflags: Some(IrOpcode::UpdateEflagsAdd) }),
        0x08 => Some(AluOp { opcode: IrOpcode::Or, update_eflags: Some(IrOpcode::UpdateEflagsLogic) }),
        0x20 => Some(AluOp { opcode: IrOpcode::And, update_eflags: Some(IrOpcode::UpdateEflagsLogic) }),
        0x28 => Some(AluOp { opcode: IrOpcode::Sub, update_eflags: Some(IrOpcode::UpdateEflagsSub) }),
        0x30 => Some(AluOp { opcode: IrOpcode::Xor, update_eflags: Some(IrOpcode::UpdateEflagsLogic) }),
        0x38 => Some(AluOp { opcode: IrOpcode::Cmp, update_eflags: Some(IrOpcode::UpdateEflagsSub) }),
        _ => None,
    }
}

/// Decodes one instruction starting at `bytes[0]`, which is the guest
/// memory image at `guest_address`.
pub fn decode_instruction(bytes: &[u8], guest_address: u32) -> JitResult<DecodedInstruction> {
    let (prefixes, prefix_len) = scan_prefixes(bytes);
    let rest = &bytes[prefix_len..];
    let opcode = *rest.first().ok_or(JitError::Decoding)?;
    let ty = operand_width(&prefixes);

    if (0xD8..=0xDF).contains(&opcode) {
        let result = fpu::decode_fpu_instruction(opcode, &rest[1..], guest_address).map_err(|_| JitError::Decoding)?;
        return Ok(DecodedInstruction::new(prefix_len + 1 + result.consumed, result.instructions, false));
    }

    // MOV r/m32, r32
    if opcode == 0x89 {
        let modrm = decode_modrm(&rest[1..]).ok_or(JitError::Decoding)?;
        let dst = addressing_to_operand(modrm.addressing, ty);
        let src = reg_field_operand(modrm.reg_field, ty);
        let ir = vec![mk_mov(dst, src, guest_address)];
        return Ok(DecodedInstruction::new(prefix_len + 1 + modrm.consumed, ir, false));
    }

    // MOV r32, r/m32
    if opcode == 0x8B {
        let modrm = decode_modrm(&rest[1..]).ok_or(JitError::Decoding)?;
        let dst = reg_field_operand(modrm.reg_field, ty);
        let src = addressing_to_operand(modrm.addressing, ty);
        let ir = vec![mk_mov(dst, src, guest_address)];
        return Ok(DecodedInstruction::new(prefix_len + 1 + modrm.consumed, ir, false));
    }

    // MOV r32, imm32 (0xB8..0xBF encode the register in the opcode's low 3 bits)
    if (0xB8..=0xBF).contains(&opcode) {
        let reg = opcode - 0xB8;
        let imm = read_imm32(&rest[1..])?;
        let dst = IrOperand::reg(reg as u32, ty);
        let ir = vec![mk_mov(dst, IrOperand::imm(imm, ty), guest_address)];
        return Ok(DecodedInstruction::new(prefix_len + 1 + 4, ir, false));
    }

    // MOV r/m32, imm32 (opcode extension /0 only)
    if opcode == 0xC7 {
        let modrm = decode_modrm(&rest[1..]).ok_or(JitError::Decoding)?;
        if modrm.reg_field != 0 {
            return Err(JitError::Decoding);
        }
        let imm = read_imm32(&rest[1 + modrm.consumed..])?;
        let dst = addressing_to_operand(modrm.addressing, ty);
        let ir = vec![mk_mov(dst, IrOperand::imm(imm, ty), guest_address)];
        return Ok(DecodedInstruction::new(prefix_len + 1 + modrm.consumed + 4, ir, false));
    }

    // ALU group, Ev,Gv form (opcode & 0x07 == 1) and Gv,Ev form (opcode & 0x07 == 3)
    if let Some(op) = alu_op_for(opcode & !0x03) {
        let form = opcode & 0x03;
        if form == 0x01 || form == 0x03 {
            let modrm = decode_modrm(&rest[1..]).ok_or(JitError::Decoding)?;
            let (dst, src) = if form == 0x01 {
                (addressing_to_operand(modrm.addressing, ty), reg_field_operand(modrm.reg_field, ty))
            } else {
                (reg_field_operand(modrm.reg_field, ty), addressing_to_operand(modrm.addressing, ty))
            };
            let mut ir = Vec::new();
            if prefixes.lock {
                ir.push(fence_node(host_barrier_for(BarrierType::LockPrefix), guest_address));
            }
            ir.push(IrInstruction::new(op.opcode, vec![dst, dst, src], guest_address));
            if let Some(update) = op.update_eflags {
                ir.push(IrInstruction::new(update, vec![dst, src], guest_address));
            }
            return Ok(DecodedInstruction::new(prefix_len + 1 + modrm.consumed, ir, false));
        }
    }

    // XCHG Ev, Gv: locked by definition, so it carries its own barrier
    // without needing an explicit LOCK prefix.
    if opcode == 0x87 {
        let modrm = decode_modrm(&rest[1..]).ok_or(JitError::Decoding)?;
        let ev = addressing_to_operand(modrm.addressing, ty);
        let gv = reg_field_operand(modrm.reg_field, ty);
        let ir = vec![
            fence_node(host_barrier_for(BarrierType::Xchg), guest_address),
            IrInstruction::new(IrOpcode::Xchg, vec![ev, gv], guest_address),
        ];
        return Ok(DecodedInstruction::new(prefix_len + 1 + modrm.consumed, ir, false));
    }

    // Jcc rel8 (0x70..0x7F)
    if (0x70..=0x7F).contains(&opcode) {
        let rel = read_rel8(&rest[1..])?;
        let cc = (opcode - 0x70) as i64;
        let ir = vec![IrInstruction::new(
            IrOpcode::Jcc,
            vec![IrOperand::imm(cc, IrDataType::U8), IrOperand::imm(rel, IrDataType::I32)],
            guest_address,
        )];
        return Ok(DecodedInstruction::new(prefix_len + 2, ir, true));
    }

    // JMP rel8 / rel32
    if opcode == 0xEB {
        let rel = read_rel8(&rest[1..])?;
        let ir = vec![IrInstruction::new(IrOpcode::Jmp, vec![IrOperand::imm(rel, IrDataType::I32)], guest_address)];
        return Ok(DecodedInstruction::new(prefix_len + 2, ir, true));
    }
    if opcode == 0xE9 {
        let rel = read_rel32(&rest[1..])?;
        let ir = vec![IrInstruction::new(IrOpcode::Jmp, vec![IrOperand::imm(rel, IrDataType::I32)], guest_address)];
        return Ok(DecodedInstruction::new(prefix_len + 5, ir, true));
    }

    // CALL rel32
    if opcode == 0xE8 {
        let rel = read_rel32(&rest[1..])?;
        let ir = vec![IrInstruction::new(IrOpcode::Call, vec![IrOperand::imm(rel, IrDataType::I32)], guest_address)];
        return Ok(DecodedInstruction::new(prefix_len + 5, ir, true));
    }

    // RET
    if opcode == 0xC3 {
        let ir = vec![IrInstruction::new(IrOpcode::Ret, vec![], guest_address)];
        return Ok(DecodedInstruction::new(prefix_len + 1, ir, true));
    }

    // Two-byte opcode escape: 0F 77 (EMMS) and 0F AE /5../7 (fences) implemented here.
    if opcode == 0x0F {
        let second = *rest.get(1).ok_or(JitError::Decoding)?;
        if second == 0x77 {
            let ir = vec![IrInstruction::new(IrOpcode::Emms, vec![], guest_address)];
            return Ok(DecodedInstruction::new(prefix_len + 2, ir, false));
        }
        if second == 0xAE {
            let modrm = decode_modrm(&rest[2..]).ok_or(JitError::Decoding)?;
            if let modrm::Addressing::Register(rm) = modrm.addressing {
                let guest_barrier = match (modrm.reg_field, rm) {
                    (5, _) => Some(BarrierType::LFence),
                    (6, _) => Some(BarrierType::MFence),
                    (7, _) => Some(BarrierType::SFence),
                    _ => None,
                };
                if let Some(guest_barrier) = guest_barrier {
                    let ir = vec![fence_node(host_barrier_for(guest_barrier), guest_address)];
                    return Ok(DecodedInstruction::new(prefix_len + 2 + modrm.consumed, ir, false));
                }
            }
        }
        let ir = vec![IrInstruction::new(
            IrOpcode::RaiseException,
            vec![IrOperand::imm(crate::exception::vector::INVALID_OPCODE as i64, IrDataType::U32)],
            guest_address,
        )];
        return Ok(DecodedInstruction::new(prefix_len + 2, ir, true));
    }

    // Unrecognized opcode: emit a decode-time #UD rather than failing translation outright.
    let ir = vec![IrInstruction::new(
        IrOpcode::RaiseException,
        vec![IrOperand::imm(crate::exception::vector::INVALID_OPCODE as i64, IrDataType::U32)],
        guest_address,
    )];
    Ok(DecodedInstruction::new(prefix_len + 1, ir, true))
}

fn mk_mov(dst: IrOperand, src: IrOperand, guest_address: u32) -> IrInstruction {
    IrInstruction::new(IrOpcode::Mov, vec![dst, src], guest_address)
}
