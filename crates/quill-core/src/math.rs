//! Integer arithmetic used by the reward and scheduling engines.
//!
//! Consensus math never touches floating point. Products of two u128 values
//! are carried in 256 bits so `a * b / d` is exact whenever the quotient
//! itself fits in u128.

use crate::constants::PERCENT_100;

/// 256-bit unsigned integer as (high, low) 128-bit halves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct U256 {
    hi: u128,
    lo: u128,
}

fn mul_u128_to_u256(a: u128, b: u128) -> U256 {
    let a_lo = a as u64 as u128;
    let a_hi = a >> 64;
    let b_lo = b as u64 as u128;
    let b_hi = b >> 64;

    let p0 = a_lo * b_lo;
    let p1 = a_lo * b_hi;
    let p2 = a_hi * b_lo;
    let p3 = a_hi * b_hi;

    // p1 + p2 + carry can exceed u128; track the spill separately.
    let (mid, mid_carry) = p1.overflowing_add(p2);
    let (mid, mid_carry2) = mid.overflowing_add(p0 >> 64);
    let mid_spill = (u128::from(mid_carry) + u128::from(mid_carry2)) << 64;

    let lo = (p0 as u64 as u128) | (mid << 64);
    let hi = p3 + (mid >> 64) + mid_spill;
    U256 { hi, lo }
}

/// `floor(a * b / d)` with a 256-bit intermediate product.
///
/// Returns `None` when `d == 0` or the quotient does not fit in u128.
///
/// # Examples
///
/// ```
/// use quill_core::math::mul_div_floor;
/// assert_eq!(mul_div_floor(u128::MAX, 3, 6), Some(u128::MAX / 2));
/// assert_eq!(mul_div_floor(10, 10, 0), None);
/// ```
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    if a == 0 || b == 0 {
        return Some(0);
    }
    if let Some(product) = a.checked_mul(b) {
        return Some(product / d);
    }

    let U256 { hi, lo } = mul_u128_to_u256(a, b);
    if hi >= d {
        return None;
    }

    // Shift-subtract long division of (hi:lo) by d; the remainder stays < d.
    let mut rem = hi;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quotient |= 1;
        }
    }
    Some(quotient)
}

/// Integer square root: `floor(sqrt(n))`.
///
/// Newton's method from an overestimate, which converges monotonically
/// downward.
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << bits.div_ceil(2);
    loop {
        let next = (x + n / x) / 2;
        if next >= x {
            return x;
        }
        x = next;
    }
}

/// `floor(amount * percent / 100%)` for a basis-point percentage.
pub fn apply_percent(amount: u64, percent: u16) -> u64 {
    // percent <= u16::MAX, so the product fits in u128 and the result in u64
    // whenever percent <= 100%.
    let scaled = u128::from(amount) * u128::from(percent) / u128::from(PERCENT_100);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wide_product_matches_narrow_when_it_fits() {
        let p = mul_u128_to_u256(u64::MAX as u128, u64::MAX as u128);
        assert_eq!(p.hi, 0);
        assert_eq!(p.lo, (u64::MAX as u128) * (u64::MAX as u128));
    }

    #[test]
    fn wide_product_of_max_values() {
        // (2^128 - 1)^2 = 2^256 - 2^129 + 1
        let p = mul_u128_to_u256(u128::MAX, u128::MAX);
        assert_eq!(p.hi, u128::MAX - 1);
        assert_eq!(p.lo, 1);
    }

    #[test]
    fn mul_div_exact_on_overflowing_product() {
        assert_eq!(mul_div_floor(u128::MAX, u128::MAX, u128::MAX), Some(u128::MAX));
        assert_eq!(mul_div_floor(1u128 << 100, 1u128 << 100, 1u128 << 90), Some(1u128 << 110));
    }

    #[test]
    fn mul_div_floors() {
        assert_eq!(mul_div_floor(7, 3, 2), Some(10));
        assert_eq!(mul_div_floor(1, 1, 2), Some(0));
    }

    #[test]
    fn mul_div_quotient_overflow() {
        assert_eq!(mul_div_floor(u128::MAX, 2, 1), None);
    }

    #[test]
    fn mul_div_zero_divisor() {
        assert_eq!(mul_div_floor(0, 0, 0), None);
    }

    #[test]
    fn isqrt_known_values() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(4), 2);
        assert_eq!(isqrt(10_000), 100);
        assert_eq!(isqrt(u64::MAX as u128), 4_294_967_295);
        assert_eq!(isqrt(u128::MAX), u64::MAX as u128);
    }

    #[test]
    fn apply_percent_basis_points() {
        assert_eq!(apply_percent(1_000, 2_500), 250);
        assert_eq!(apply_percent(3, 5_000), 1);
        assert_eq!(apply_percent(u64::MAX, PERCENT_100), u64::MAX);
    }

    proptest! {
        #[test]
        fn isqrt_is_floor(n in any::<u128>()) {
            let r = isqrt(n);
            prop_assert!(r * r <= n);
            let next = r + 1;
            prop_assert!(next.checked_mul(next).is_none_or(|sq| sq > n));
        }

        #[test]
        fn mul_div_agrees_with_narrow_math(a in any::<u64>(), b in any::<u64>(), d in 1u64..) {
            let expected = (a as u128) * (b as u128) / (d as u128);
            prop_assert_eq!(mul_div_floor(a as u128, b as u128, d as u128), Some(expected));
        }

        #[test]
        fn mul_div_by_own_factor_is_identity(a in any::<u128>(), b in 1u128..) {
            prop_assert_eq!(mul_div_floor(a, b, b), Some(a));
        }
    }
}
