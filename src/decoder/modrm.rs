//! ModR/M and SIB decoding (component E), 32-bit addressing forms.
//!
//! Mirrors the teacher's `AddressingMode` split between register-direct and
//! the various memory forms, extended with the SIB byte and disp32 modes
//! 16-bit addressing never needed.

use crate::ir::NO_REGISTER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    Register(u8),
    Memory { base: u32, index: u32, scale: u8, displacement: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    pub reg_field: u8,
    pub addressing: Addressing,
    pub consumed: usize,
}

/// Decodes a ModR/M byte (plus SIB/displacement if present) from `bytes`,
/// where `bytes[0]` is the ModR/M byte itself. `address_size_override`
/// selects 16-bit addressing forms (rare but legal with a 0x67 prefix);
/// this core only implements the 32-bit forms actual translated guests use.
pub fn decode_modrm(bytes: &[u8]) -> Option<ModRm> {
    let modrm = *bytes.first()?;
    let md = modrm >> 6;
    let reg_field = (modrm >> 3) & 0x7;
    let rm = modrm & 0x7;
    let mut offset = 1;

    if md == 0b11 {
        return Some(ModRm { reg_field, addressing: Addressing::Register(rm), consumed: offset });
    }

    let (mut base, mut index, mut scale) = (rm as u32, NO_REGISTER, 1u8);

    if rm == 0b100 {
        // SIB byte follows.
        let sib = *bytes.get(offset)?;
        offset += 1;
        let sib_scale = sib >> 6;
        let sib_index = (sib >> 3) & 0x7;
        let sib_base = sib & 0x7;
        scale = 1 << sib_scale;
        index = if sib_index == 0b100 { NO_REGISTER } else { sib_index as u32 };
        if sib_base == 0b101 && md == 0b00 {
            base = NO_REGISTER;
        } else {
            base = sib_base as u32;
        }
    }

    if md == 0b00 && rm == 0b101 {
        // disp32-only addressing, no base register.
        let disp = i32::from_le_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?);
        offset += 4;
        return Some(ModRm {
            reg_field,
            addressing: Addressing::Memory { base: NO_REGISTER, index, scale, displacement: disp },
            consumed: offset,
        });
    }
    if md == 0b00 && rm == 0b100 && base == NO_REGISTER {
        let disp = i32::from_le_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?);
        offset += 4;
        return Some(ModRm {
            reg_field,
            addressing: Addressing::Memory { base: NO_REGISTER, index, scale, displacement: disp },
            consumed: offset,
        });
    }

    let displacement = match md {
        0b00 => 0,
        0b01 => {
            let disp = *bytes.get(offset)? as i8 as i32;
            offset += 1;
            disp
        }
        0b10 => {
            let disp = i32::from_le_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?);
            offset += 4;
            disp
        }
        _ => unreachable!("mod == 0b11 handled above"),
    };

    Some(ModRm {
        reg_field,
        addressing: Addressing::Memory { base, index, scale, displacement },
        consumed: offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_direct_mode() {
        // mod=11, reg=000 (EAX), rm=001 (ECX)
        let modrm = decode_modrm(&[0xC1]).unwrap();
        assert_eq!(modrm.reg_field, 0);
        assert_eq!(modrm.addressing, Addressing::Register(1));
        assert_eq!(modrm.consumed, 1);
    }

    #[test]
    fn memory_indirect_no_displacement() {
        // mod=00, reg=000, rm=011 (EBX) -> [EBX]
        let modrm = decode_modrm(&[0x03]).unwrap();
        assert_eq!(modrm.addressing, Addressing::Memory { base: 3, index: NO_REGISTER, scale: 1, displacement: 0 });
        assert_eq!(modrm.consumed, 1);
    }

    #[test]
    fn disp32_only_addressing() {
        // mod=00, reg=000, rm=101 -> disp32
        let modrm = decode_modrm(&[0x05, 0x78, 0x56, 0x34, 0x12]).unwrap();
        assert_eq!(
            modrm.addressing,
            Addressing::Memory { base: NO_REGISTER, index: NO_REGISTER, scale: 1, displacement: 0x1234_5678 }
        );
        assert_eq!(modrm.consumed, 5);
    }

    #[test]
    fn sib_with_scaled_index_and_disp8() {
        // mod=01, reg=000, rm=100 (SIB) -> SIB: scale=10(*4), index=001(ECX), base=000(EAX); disp8=0x10
        let modrm = decode_modrm(&[0x44, 0x88, 0x10]).unwrap();
        assert_eq!(modrm.addressing, Addressing::Memory { base: 0, index: 1, scale: 4, displacement: 0x10 });
        assert_eq!(modrm.consumed, 3);
    }

    #[test]
    fn sib_base_none_disp32_when_mod_zero_and_base_101() {
        let modrm = decode_modrm(&[0x04, 0x25, 0x00, 0x00, 0x00, 0x01]).unwrap();
        assert_eq!(
            modrm.addressing,
            Addressing::Memory { base: NO_REGISTER, index: NO_REGISTER, scale: 1, displacement: 0x0100_0000 }
        );
        assert_eq!(modrm.consumed, 6);
    }
}
