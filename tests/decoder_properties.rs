//! Property test for Invariant 1 on the register-direct `MOV r/m32, r32`
//! form: the register ids the decoder puts in its IR are enough to
//! reconstruct the exact ModR/M byte the instruction was decoded from, and
//! the reported length matches the bytes actually consumed.

use proptest::prelude::*;
use x86_arm_jit::decoder::decode_instruction;
use x86_arm_jit::ir::IrOperand;

proptest! {
    #[test]
    fn mov_reg_to_reg_round_trips_through_its_modrm_byte(dst in 0u8..8, src in 0u8..8) {
        let modrm = 0xC0 | (src << 3) | dst;
        let bytes = [0x89, modrm];
        let decoded = decode_instruction(&bytes, 0x1000).unwrap();

        prop_assert_eq!(decoded.length, bytes.len());
        let (decoded_dst, decoded_src) = match (&decoded.ir[0].operands[0], &decoded.ir[0].operands[1]) {
            (IrOperand::Register { reg: d, .. }, IrOperand::Register { reg: s, .. }) => (*d as u8, *s as u8),
            other => panic!("expected two register operands, got {:?}", other),
        };

        let re_encoded_modrm = 0xC0 | (decoded_src << 3) | decoded_dst;
        prop_assert_eq!(re_encoded_modrm, modrm);
    }
}
