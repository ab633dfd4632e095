//! x87 transcendental helpers (component B).
//!
//! The hardware computes these directly in extended precision; this core
//! computes them in `f64` and re-widens, which is within the ≤1 ulp
//! tolerance this project accepts for transcendentals (see DESIGN.md).
//! Domain checks are reproduced exactly since they gate correctness, not
//! just precision.

use crate::fpconv::{f64_to_f80, f80_to_f64};

/// Status-word C2 bit: set when a transcendental's argument was out of its
/// reduced-argument domain and the result is the unreduced input unchanged.
pub const SW_C2: u16 = 1 << 10;

fn to_f64(value: [u8; 10]) -> f64 {
    f64::from_bits(f80_to_f64(value).0)
}

fn from_f64(value: f64) -> [u8; 10] {
    f64_to_f80(value.to_bits()).0
}

/// `FSIN`. Hardware requires |x| < 2^63 for in-range reduction; out-of-range
/// arguments set C2 and leave the value unchanged.
pub fn fsin(value: [u8; 10]) -> ([u8; 10], u16) {
    let x = to_f64(value);
    if x.abs() >= 9_223_372_036_854_775_808.0 {
        return (value, SW_C2);
    }
    (from_f64(x.sin()), 0)
}

pub fn fcos(value: [u8; 10]) -> ([u8; 10], u16) {
    let x = to_f64(value);
    if x.abs() >= 9_223_372_036_854_775_808.0 {
        return (value, SW_C2);
    }
    (from_f64(x.cos()), 0)
}

/// `FPTAN` pushes `1.0` then the tangent, per the x86 two-result contract;
/// callers push in this order onto the x87 stack.
pub fn fptan(value: [u8; 10]) -> ([u8; 10], [u8; 10], u16) {
    let x = to_f64(value);
    if x.abs() >= 9_223_372_036_854_775_808.0 {
        return (value, from_f64(1.0), SW_C2);
    }
    (from_f64(x.tan()), from_f64(1.0), 0)
}

/// `F2XM1`: computes `2^x - 1`. Domain is `|x| <= 1.0`; callers must not
/// invoke this outside that range (the decoder only emits it following the
/// guest's own `FSCALE`/range-reduction sequence, matching hardware).
pub fn f2xm1(value: [u8; 10]) -> ([u8; 10], u16) {
    let x = to_f64(value);
    if x.abs() > 1.0 {
        return (value, SW_C2);
    }
    (from_f64(2f64.powf(x) - 1.0), 0)
}

/// `FYL2X`: computes `y * log2(x)`.
pub fn fyl2x(x: [u8; 10], y: [u8; 10]) -> ([u8; 10], u16) {
    let xv = to_f64(x);
    let yv = to_f64(y);
    (from_f64(yv * xv.log2()), 0)
}

/// `FPATAN`: computes `atan2(y, x)` (operand order matches the x86 mnemonic,
/// where `ST(1)` is `y` and `ST(0)` is `x`).
pub fn fpatan(y: [u8; 10], x: [u8; 10]) -> ([u8; 10], u16) {
    let yv = to_f64(y);
    let xv = to_f64(x);
    (from_f64(yv.atan2(xv)), 0)
}

pub fn fsqrt(value: [u8; 10]) -> [u8; 10] {
    from_f64(to_f64(value).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f2xm1_at_zero_is_zero() {
        let zero = from_f64(0.0);
        let (result, status) = f2xm1(zero);
        assert_eq!(status, 0);
        assert_eq!(to_f64(result), 0.0);
    }

    #[test]
    fn f2xm1_out_of_domain_sets_c2() {
        let two = from_f64(2.0);
        let (_, status) = f2xm1(two);
        assert_ne!(status & SW_C2, 0);
    }

    #[test]
    fn fsin_of_zero_is_zero() {
        let zero = from_f64(0.0);
        let (result, status) = fsin(zero);
        assert_eq!(status, 0);
        assert_eq!(to_f64(result), 0.0);
    }

    #[test]
    fn fpatan_matches_atan2() {
        let y = from_f64(1.0);
        let x = from_f64(1.0);
        let (result, _) = fpatan(y, x);
        assert!((to_f64(result) - std::f64::consts::FRAC_PI_4).abs() < 1e-9);
    }
}
