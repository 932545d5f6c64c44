//! Decay of the reward fund's `recent_claims`.
//!
//! Claims fall linearly to zero over the decay period:
//! `claims' = claims - claims * elapsed / period`. Applying the decay in
//! small steps lands within rounding distance of one large step.

use quill_core::math::mul_div_floor;
use quill_core::types::{RewardFund, Timestamp};

/// `claims` after `elapsed` seconds of linear decay over `period` seconds.
///
/// Zero once `elapsed >= period`. A zero period clears every claim.
pub fn decayed_claims(claims: u128, elapsed: u64, period: u64) -> u128 {
    if elapsed >= period {
        return 0;
    }
    // elapsed < period, so the quotient never exceeds claims.
    let lost = mul_div_floor(claims, u128::from(elapsed), u128::from(period)).unwrap_or(claims);
    claims - lost
}

/// Decay `fund.recent_claims` up to `now` and move `last_update` forward.
///
/// A `now` at or before `last_update` leaves the fund unchanged.
pub fn decay_recent_claims(fund: &mut RewardFund, now: Timestamp, period: u64) {
    if now <= fund.last_update {
        return;
    }
    let elapsed = now - fund.last_update;
    fund.recent_claims = decayed_claims(fund.recent_claims, elapsed, period);
    fund.last_update = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use quill_core::constants::RECENT_CLAIMS_DECAY_SECS;

    #[test]
    fn half_period_halves_claims() {
        assert_eq!(decayed_claims(1_000, 50, 100), 500);
    }

    #[test]
    fn full_period_clears_claims() {
        assert_eq!(decayed_claims(u128::MAX, 100, 100), 0);
        assert_eq!(decayed_claims(u128::MAX, 101, 100), 0);
    }

    #[test]
    fn wide_claims_do_not_overflow() {
        let claims = u128::MAX;
        let out = decayed_claims(claims, 1, RECENT_CLAIMS_DECAY_SECS);
        assert_eq!(out, claims - claims / u128::from(RECENT_CLAIMS_DECAY_SECS));
    }

    #[test]
    fn fund_last_update_moves_forward_only() {
        let mut fund = RewardFund { recent_claims: 1_000, last_update: 100, ..Default::default() };
        decay_recent_claims(&mut fund, 90, 100);
        assert_eq!(fund.recent_claims, 1_000);
        assert_eq!(fund.last_update, 100);

        decay_recent_claims(&mut fund, 110, 100);
        assert_eq!(fund.recent_claims, 900);
        assert_eq!(fund.last_update, 110);
    }

    proptest! {
        #[test]
        fn stepwise_decay_tracks_single_step(
            claims in 1u128..(1u128 << 100),
            steps in 1u64..200,
            step_secs in 1u64..1_000,
        ) {
            let period = RECENT_CLAIMS_DECAY_SECS;
            let total = steps * step_secs;
            let once = decayed_claims(claims, total, period);

            let mut fund = RewardFund { recent_claims: claims, ..Default::default() };
            for i in 1..=steps {
                decay_recent_claims(&mut fund, i * step_secs, period);
            }
            // Stepwise decay compounds, so it keeps at least the single-step
            // result; the excess is bounded by the quadratic term plus one
            // unit of rounding per step.
            prop_assert!(fund.recent_claims + 1 >= once);
            let excess = fund.recent_claims.saturating_sub(once) as f64;
            let x = total as f64 / period as f64;
            let bound = claims as f64 * x * x / 2.0 + steps as f64 + 1.0;
            prop_assert!(excess <= bound, "excess {} bound {}", excess, bound);
        }
    }
}
