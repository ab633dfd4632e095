//! Round-trip properties for f32 <-> f80 conversion across every IEEE-754
//! class: normal values round-trip losslessly, and the special classes each
//! get the behavior their own unit tests pin down as a single example,
//! checked here across the whole class.

use proptest::prelude::*;
use x86_arm_jit::fpconv::{f32_to_f80, f80_to_f32, DE, IE};

fn is_normal_f32(bits: u32) -> bool {
    let exponent = (bits >> 23) & 0xFF;
    exponent != 0 && exponent != 0xFF
}

fn is_zero_f32(bits: u32) -> bool {
    bits & 0x7FFF_FFFF == 0
}

fn is_infinite_f32(bits: u32) -> bool {
    bits & 0x7FFF_FFFF == 0x7F80_0000
}

fn is_nan_f32(bits: u32) -> bool {
    let exponent = (bits >> 23) & 0xFF;
    let fraction = bits & 0x007F_FFFF;
    exponent == 0xFF && fraction != 0
}

fn is_subnormal_f32(bits: u32) -> bool {
    let exponent = (bits >> 23) & 0xFF;
    let fraction = bits & 0x007F_FFFF;
    exponent == 0 && fraction != 0
}

proptest! {
    #[test]
    fn normal_f32_round_trips_through_f80_losslessly(bits in any::<u32>().prop_filter("normal only", |b| is_normal_f32(*b))) {
        let (f80, status) = f32_to_f80(bits);
        prop_assert_eq!(status, 0);
        let (back, _) = f80_to_f32(f80);
        prop_assert_eq!(back, bits);
    }

    #[test]
    fn zero_round_trips_through_f80_with_sign_preserved(bits in any::<u32>().prop_filter("zero only", |b| is_zero_f32(*b))) {
        let (f80, status) = f32_to_f80(bits);
        prop_assert_eq!(status, 0);
        let (back, _) = f80_to_f32(f80);
        prop_assert_eq!(back, bits);
    }

    #[test]
    fn infinity_round_trips_through_f80_with_sign_preserved(bits in any::<u32>().prop_filter("infinite only", |b| is_infinite_f32(*b))) {
        let (f80, status) = f32_to_f80(bits);
        prop_assert_eq!(status, 0);
        let (back, _) = f80_to_f32(f80);
        prop_assert_eq!(back, bits);
    }

    #[test]
    fn nan_upconverts_to_a_quiet_nan_and_stays_nan_on_round_trip(bits in any::<u32>().prop_filter("nan only", |b| is_nan_f32(*b))) {
        let (f80, status) = f32_to_f80(bits);
        prop_assert_ne!(status & IE, 0);
        let (back, _) = f80_to_f32(f80);
        prop_assert!(is_nan_f32(back));
        prop_assert_eq!(back & 0x0040_0000, 0x0040_0000, "must still be a quiet NaN");
    }

    #[test]
    fn subnormal_f32_sets_de_converting_into_f80(bits in any::<u32>().prop_filter("subnormal only", |b| is_subnormal_f32(*b))) {
        let (_, status) = f32_to_f80(bits);
        prop_assert_ne!(status & DE, 0);
    }
}
