//! Protocol constants. All monetary values in units (1 QUILL = 10^9 units).

pub const COIN: u64 = 1_000_000_000;

/// Basis-point denominator used for every percentage in the protocol.
///
/// # Examples
///
/// ```
/// use quill_core::constants::{PERCENT_1, PERCENT_100};
/// assert_eq!(PERCENT_100, 100 * PERCENT_1);
/// ```
pub const PERCENT_100: u16 = 10_000;
pub const PERCENT_1: u16 = PERCENT_100 / 100;

pub const BLOCK_INTERVAL_SECS: u64 = 3;
pub const BLOCKS_PER_DAY: u64 = 24 * 60 * 60 / BLOCK_INTERVAL_SECS;

/// Sentinel timestamp for "never" (paid comments, unbounded deadlines).
pub const TIME_MAX: u64 = u64::MAX;

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// Period over which `recent_claims` decays linearly to zero.
pub const RECENT_CLAIMS_DECAY_SECS: u64 = 15 * 24 * 60 * 60;

/// Time between a comment's creation and its payout.
pub const CASHOUT_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// Payouts strictly below this amount are treated as dust and not paid.
pub const MIN_COMMENT_PAYOUT: u64 = COIN / 1_000_000;

/// Share of every comment payout routed to curators.
pub const CURATION_REWARD_PERCENT: u16 = 25 * PERCENT_1;

pub const MAX_COMMENT_DEPTH: u16 = 0xffff;

// ---------------------------------------------------------------------------
// Witness scheduling
// ---------------------------------------------------------------------------

/// Witnesses selected by rank of accumulated votes each round.
pub const MAX_VOTED_WITNESSES: usize = 20;

/// Witnesses selected by earliest virtual scheduled time each round.
pub const MAX_TIMESHARE_WITNESSES: usize = 1;

pub const MAX_WITNESSES: usize = MAX_VOTED_WITNESSES + MAX_TIMESHARE_WITNESSES;

/// Virtual distance a witness must travel between two timeshare turns.
///
/// A witness with `v` votes advances `v + 1` virtual units per unit of
/// virtual time, so it is due again after `LAP / (v + 1)`.
pub const VIRTUAL_SCHEDULE_LAP_LENGTH: u128 = u64::MAX as u128;

/// Multiplier of the xorshift-style schedule shuffle.
pub const SHUFFLE_MULTIPLIER: u64 = 2_685_821_657_736_338_717;

pub const MAX_WITNESS_VOTES_PER_ACCOUNT: usize = 30;

// ---------------------------------------------------------------------------
// Budgets
// ---------------------------------------------------------------------------

pub const MAX_BUDGETS_PER_OWNER: usize = 100;

/// Share of every fund-budget allocation paid to the block's witness.
pub const WITNESS_REWARD_PERCENT: u16 = 5 * PERCENT_1;

/// Length of the protocol-wide fund budget created at genesis.
pub const FUND_BUDGET_PERIOD_DAYS: u64 = 2 * 365;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_per_day_matches_interval() {
        assert_eq!(BLOCKS_PER_DAY * BLOCK_INTERVAL_SECS, 86_400);
    }

    #[test]
    fn decay_period_longer_than_cashout_window() {
        assert!(RECENT_CLAIMS_DECAY_SECS > CASHOUT_WINDOW_SECS);
    }

    #[test]
    fn percentages_within_bounds() {
        assert!(CURATION_REWARD_PERCENT <= PERCENT_100);
        assert!(WITNESS_REWARD_PERCENT <= PERCENT_100);
    }

    #[test]
    fn lap_length_leaves_headroom_for_virtual_time() {
        // Virtual time is u128; a lap only spans the low 64 bits.
        assert!(VIRTUAL_SCHEDULE_LAP_LENGTH.checked_mul(1u128 << 63).is_some());
    }
}
