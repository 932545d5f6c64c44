//! Chain parameters shared by every per-block engine.
//!
//! Every field defaults to the matching value in [`crate::constants`], so a
//! partial TOML or JSON document only needs to name what it overrides.

use serde::{Deserialize, Serialize};

use crate::error::ParamsError;

use crate::constants::{
    BLOCK_INTERVAL_SECS, CASHOUT_WINDOW_SECS, CURATION_REWARD_PERCENT, MAX_BUDGETS_PER_OWNER,
    MAX_TIMESHARE_WITNESSES, MAX_VOTED_WITNESSES, MIN_COMMENT_PAYOUT, PERCENT_100,
    RECENT_CLAIMS_DECAY_SECS, VIRTUAL_SCHEDULE_LAP_LENGTH, WITNESS_REWARD_PERCENT,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ChainParams {
    pub block_interval_secs: u64,
    pub reward: RewardParams,
    pub schedule: ScheduleParams,
    pub budget: BudgetParams,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            block_interval_secs: BLOCK_INTERVAL_SECS,
            reward: RewardParams::default(),
            schedule: ScheduleParams::default(),
            budget: BudgetParams::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RewardParams {
    pub recent_claims_decay_secs: u64,
    pub cashout_window_secs: u64,
    /// Dust floor; smaller payouts are not made.
    pub min_payout: u64,
    /// Basis points of each payout routed to curators.
    pub curation_percent: u16,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            recent_claims_decay_secs: RECENT_CLAIMS_DECAY_SECS,
            cashout_window_secs: CASHOUT_WINDOW_SECS,
            min_payout: MIN_COMMENT_PAYOUT,
            curation_percent: CURATION_REWARD_PERCENT,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleParams {
    pub max_voted_witnesses: usize,
    pub max_timeshare_witnesses: usize,
    pub lap_length: u128,
}

impl ScheduleParams {
    pub fn max_witnesses(&self) -> usize {
        self.max_voted_witnesses + self.max_timeshare_witnesses
    }
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            max_voted_witnesses: MAX_VOTED_WITNESSES,
            max_timeshare_witnesses: MAX_TIMESHARE_WITNESSES,
            lap_length: VIRTUAL_SCHEDULE_LAP_LENGTH,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BudgetParams {
    pub max_budgets_per_owner: usize,
    pub witness_reward_percent: u16,
}

impl Default for BudgetParams {
    fn default() -> Self {
        Self {
            max_budgets_per_owner: MAX_BUDGETS_PER_OWNER,
            witness_reward_percent: WITNESS_REWARD_PERCENT,
        }
    }
}

impl ChainParams {
    /// Checks values the engines divide by or treat as percentages.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.block_interval_secs == 0 {
            return Err(ParamsError::NotPositive("block_interval_secs"));
        }
        if self.reward.recent_claims_decay_secs == 0 {
            return Err(ParamsError::NotPositive("reward.recent_claims_decay_secs"));
        }
        check_percent("reward.curation_percent", self.reward.curation_percent)?;
        check_percent("budget.witness_reward_percent", self.budget.witness_reward_percent)?;
        let witnesses = self.schedule.max_witnesses();
        if witnesses == 0 || witnesses > u8::MAX as usize {
            return Err(ParamsError::WitnessCount(witnesses));
        }
        if self.schedule.lap_length == 0 {
            return Err(ParamsError::NotPositive("schedule.lap_length"));
        }
        Ok(())
    }
}

fn check_percent(name: &'static str, value: u16) -> Result<(), ParamsError> {
    if value > PERCENT_100 {
        return Err(ParamsError::PercentOutOfRange { name, value });
    }
    Ok(())
}
