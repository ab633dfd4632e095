//! Operand construction helpers (component E).
//!
//! Thin builders turning a decoded ModR/M addressing form into an
//! `IrOperand`, in the same spirit as the teacher's `reg8`/`mem8_disp`
//! constructor family but targeting IR operands directly rather than a
//! separate `Operand`/execute-handler indirection.

use crate::decoder::modrm::Addressing;
use crate::ir::{IrDataType, IrOperand};

pub fn addressing_to_operand(addressing: Addressing, ty: IrDataType) -> IrOperand {
    match addressing {
        Addressing::Register(reg) => IrOperand::reg(reg as u32, ty),
        Addressing::Memory { base, index, scale, displacement } => {
            IrOperand::mem(base, index, scale, displacement, ty)
        }
    }
}

pub fn reg_field_operand(reg_field: u8, ty: IrDataType) -> IrOperand {
    IrOperand::reg(reg_field as u32, ty)
}
