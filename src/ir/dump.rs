//! Textual IR dumper (component D), used by debug logging and tests.
//!
//! Memory operand format matches the original dumper: `[base + index*scale
//! + displacement]`, omitting any field that carries the `NO_REGISTER`
//! sentinel or a zero displacement.

use std::fmt::Write as _;

use super::block::IrFunction;
use super::instr::{IrInstruction, IrOpcode};
use super::operand::IrOperand;
use super::types::IrDataType;

fn data_type_name(ty: IrDataType) -> &'static str {
    use IrDataType::*;
    match ty {
        Unknown => "unk",
        I8 => "i8",
        U8 => "u8",
        I16 => "i16",
        U16 => "u16",
        I32 => "i32",
        U32 => "u32",
        I64 => "i64",
        U64 => "u64",
        F32 => "f32",
        F64 => "f64",
        F80 => "f80",
        V64B8 => "v64b8",
        V64W4 => "v64w4",
        V64D2 => "v64d2",
        V128B16 => "v128b16",
        V128W8 => "v128w8",
        V128D4 => "v128d4",
        V128Q2 => "v128q2",
        Ptr => "ptr",
    }
}

fn dump_operand(out: &mut String, operand: &IrOperand) {
    match operand {
        IrOperand::Register { reg, ty } => {
            let _ = write!(out, "r{}:{}", reg, data_type_name(*ty));
        }
        IrOperand::Immediate { value, ty } => {
            let _ = write!(out, "#{}:{}", value, data_type_name(*ty));
        }
        IrOperand::Label(target) => {
            let _ = write!(out, "L{}", target);
        }
        IrOperand::Memory { mem, ty } => {
            out.push('[');
            let mut wrote = false;
            if mem.has_base() {
                let _ = write!(out, "r{}", mem.base);
                wrote = true;
            }
            if mem.has_index() {
                if wrote {
                    out.push_str(" + ");
                }
                let _ = write!(out, "r{}*{}", mem.index, mem.scale);
                wrote = true;
            }
            if mem.displacement != 0 {
                if wrote {
                    out.push_str(if mem.displacement < 0 { " - " } else { " + " });
                    let _ = write!(out, "{:#x}", mem.displacement.unsigned_abs());
                } else {
                    let _ = write!(out, "{:#x}", mem.displacement);
                }
            }
            out.push(']');
            let _ = write!(out, ":{}", data_type_name(*ty));
        }
    }
}

fn opcode_name(opcode: IrOpcode) -> &'static str {
    use IrOpcode::*;
    match opcode {
        Add => "ADD",
        Sub => "SUB",
        And => "AND",
        Or => "OR",
        Xor => "XOR",
        Not => "NOT",
        Neg => "NEG",
        Mul => "MUL",
        IMul => "IMUL",
        Div => "DIV",
        IDiv => "IDIV",
        Shl => "SHL",
        Shr => "SHR",
        Sar => "SAR",
        Rol => "ROL",
        Ror => "ROR",
        Cmp => "CMP",
        Test => "TEST",
        Mov => "MOV",
        MovZx => "MOVZX",
        MovSx => "MOVSX",
        Xchg => "XCHG",
        UpdateEflagsAdd => "UPDATE_EFLAGS_ADD",
        UpdateEflagsSub => "UPDATE_EFLAGS_SUB",
        UpdateEflagsLogic => "UPDATE_EFLAGS_LOGIC",
        UpdateEflagsShift => "UPDATE_EFLAGS_SHIFT",
        Jmp => "JMP",
        Jcc => "JCC",
        Call => "CALL",
        Ret => "RET",
        Load => "LOAD",
        Store => "STORE",
        MemFence => "MEM_FENCE",
        SafepointYield => "SAFEPOINT_YIELD",
        FLoad => "FLOAD",
        FStore => "FSTORE",
        FAdd => "FADD",
        FSub => "FSUB",
        FMul => "FMUL",
        FDiv => "FDIV",
        FAddP => "FADDP",
        FSubP => "FSUBP",
        FMulP => "FMULP",
        FDivP => "FDIVP",
        FCompare => "FCOMPARE",
        FTst => "FTST",
        FLd1 => "FLD1",
        FLdZ => "FLDZ",
        FSin => "FSIN",
        FCos => "FCOS",
        FPTan => "FPTAN",
        F2Xm1 => "F2XM1",
        FYl2X => "FYL2X",
        FPATan => "FPATAN",
        FSqrt => "FSQRT",
        FAbs => "FABS",
        FChs => "FCHS",
        Emms => "EMMS",
        FScale => "FSCALE",
        FPrem => "FPREM",
        FRndInt => "FRNDINT",
        FXch => "FXCH",
        FIncStp => "FINCSTP",
        FDecStp => "FDECSTP",
        FLdcw => "FLDCW",
        FNstcw => "FNSTCW",
        FNstsw => "FNSTSW",
        PAdd => "PADD",
        PSub => "PSUB",
        PAnd => "PAND",
        PXor => "PXOR",
        RaiseException => "RAISE_EXCEPTION",
    }
}

pub fn dump_instruction(instruction: &IrInstruction) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:08x}: {}", instruction.guest_address, opcode_name(instruction.opcode));
    for (i, operand) in instruction.operands.iter().enumerate() {
        out.push_str(if i == 0 { " " } else { ", " });
        dump_operand(&mut out, operand);
    }
    out
}

pub fn dump_function(function: &IrFunction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "function @ {:08x}", function.entry_address);
    for block in function.blocks() {
        let _ = writeln!(out, "  block {} @ {:08x}:", block.id.0, block.start_address);
        for instruction in &block.instructions {
            let _ = writeln!(out, "    {}", dump_instruction(instruction));
        }
    }
    out
}
