//! Reward curves: map net rshares to claim weight.

use quill_core::math::isqrt;
use quill_core::types::RewardCurve;

/// Claim weight of `rshares` under `curve`.
///
/// Quadratic saturates at `u128::MAX`; square root rounds down.
///
/// # Examples
///
/// ```
/// use quill_core::types::RewardCurve;
/// use quill_rewards::curve::evaluate_reward_curve;
/// assert_eq!(evaluate_reward_curve(10, RewardCurve::Linear), 10);
/// assert_eq!(evaluate_reward_curve(10, RewardCurve::Quadratic), 100);
/// assert_eq!(evaluate_reward_curve(10, RewardCurve::SquareRoot), 3);
/// ```
pub fn evaluate_reward_curve(rshares: u128, curve: RewardCurve) -> u128 {
    match curve {
        RewardCurve::Linear => rshares,
        RewardCurve::Quadratic => rshares.saturating_mul(rshares),
        RewardCurve::SquareRoot => isqrt(rshares),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_maps_to_zero() {
        for curve in [RewardCurve::Linear, RewardCurve::Quadratic, RewardCurve::SquareRoot] {
            assert_eq!(evaluate_reward_curve(0, curve), 0);
        }
    }

    #[test]
    fn quadratic_saturates() {
        assert_eq!(evaluate_reward_curve(u128::MAX, RewardCurve::Quadratic), u128::MAX);
        assert_eq!(evaluate_reward_curve(1u128 << 64, RewardCurve::Quadratic), u128::MAX);
        assert_eq!(
            evaluate_reward_curve(u64::MAX as u128, RewardCurve::Quadratic),
            (u64::MAX as u128) * (u64::MAX as u128)
        );
    }

    #[test]
    fn square_root_of_perfect_squares() {
        assert_eq!(evaluate_reward_curve(1_000_000, RewardCurve::SquareRoot), 1_000);
        assert_eq!(evaluate_reward_curve(999_999, RewardCurve::SquareRoot), 999);
    }

    proptest! {
        #[test]
        fn curves_are_monotonic(a in any::<u64>(), b in any::<u64>()) {
            let (lo, hi) = if a <= b { (a as u128, b as u128) } else { (b as u128, a as u128) };
            for curve in [RewardCurve::Linear, RewardCurve::Quadratic, RewardCurve::SquareRoot] {
                prop_assert!(evaluate_reward_curve(lo, curve) <= evaluate_reward_curve(hi, curve));
            }
        }
    }
}
