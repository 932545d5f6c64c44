//! Payout math for a single matured comment.
//!
//! [`rshare_reward`] turns a comment's claim into an amount of the reward
//! fund; [`split_payout`] divides that amount between curators,
//! beneficiaries, and the author. Both are pure: the cashout task applies
//! their results to the ledger.

use quill_core::constants::PERCENT_100;
use quill_core::error::{InvariantError, QuillError};
use quill_core::math::{apply_percent, mul_div_floor};
use quill_core::types::{AccountName, Comment, RewardCurve, Vote};

use crate::curve::evaluate_reward_curve;

/// Inputs of one comment's reward computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRewardContext {
    pub rshares: i64,
    pub reward_weight: u16,
    pub max_payout: u64,
    /// `recent_claims` of the fund snapshot, including this comment's claim.
    pub total_claims: u128,
    pub reward_balance: u64,
    pub curve: RewardCurve,
}

pub fn is_comment_payout_dust(payout: u64, min_payout: u64) -> bool {
    payout < min_payout
}

/// Share of the reward balance earned by the context's rshares.
///
/// Non-positive rshares earn nothing. Dust is zeroed before the cap at
/// `max_payout` is applied.
pub fn rshare_reward(ctx: &CommentRewardContext, min_payout: u64) -> Result<u64, QuillError> {
    if ctx.rshares <= 0 {
        return Ok(0);
    }
    if ctx.total_claims == 0 {
        return Err(InvariantError::ZeroTotalClaims.into());
    }

    let claim = evaluate_reward_curve(ctx.rshares.unsigned_abs().into(), ctx.curve);
    let claim = mul_div_floor(claim, u128::from(ctx.reward_weight), u128::from(PERCENT_100))
        .ok_or(InvariantError::BalanceOverflow)?;
    let payout = mul_div_floor(u128::from(ctx.reward_balance), claim, ctx.total_claims)
        .and_then(|p| u64::try_from(p).ok())
        .unwrap_or(u64::MAX);

    if is_comment_payout_dust(payout, min_payout) {
        return Ok(0);
    }
    Ok(payout.min(ctx.max_payout))
}

/// How one payout is divided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayoutSplit {
    /// Curators in payment order, zero rewards omitted.
    pub curators: Vec<(AccountName, u64)>,
    pub beneficiaries: Vec<(AccountName, u64)>,
    pub author_liquid: u64,
    pub author_stake: u64,
}

impl PayoutSplit {
    pub fn curation_total(&self) -> u64 {
        self.curators.iter().map(|(_, r)| r).sum()
    }

    pub fn beneficiary_total(&self) -> u64 {
        self.beneficiaries.iter().map(|(_, r)| r).sum()
    }

    pub fn author_total(&self) -> u64 {
        self.author_liquid + self.author_stake
    }

    pub fn total(&self) -> u64 {
        self.curation_total() + self.beneficiary_total() + self.author_total()
    }
}

/// Pay curators `curation * weight / total_weight` each, visiting `votes`
/// in order. Returns the rewards and the unclaimed remainder.
pub fn split_curation(curation: u64, total_weight: u64, votes: &[Vote]) -> (Vec<(AccountName, u64)>, u64) {
    let mut rewards = Vec::new();
    let mut unclaimed = curation;
    if total_weight == 0 {
        return (rewards, unclaimed);
    }
    for vote in votes {
        let claim = mul_div_floor(u128::from(curation), u128::from(vote.weight), u128::from(total_weight))
            .and_then(|c| u64::try_from(c).ok())
            .unwrap_or(0)
            .min(unclaimed);
        if claim > 0 {
            unclaimed -= claim;
            rewards.push((vote.voter.clone(), claim));
        }
    }
    (rewards, unclaimed)
}

/// Divide `payout` for `comment`.
///
/// Curators take `curation_percent` (nothing when curation is disabled)
/// and whatever they leave unclaimed returns to the author share.
/// Beneficiaries then take their basis points of the author share; the
/// author keeps the rest, `percent_scr` of it liquid.
pub fn split_payout(
    payout: u64,
    comment: &Comment,
    votes: &[Vote],
    curation_percent: u16,
) -> Result<PayoutSplit, QuillError> {
    let weight_sum: u32 = comment.beneficiaries.iter().map(|b| u32::from(b.weight)).sum();
    if weight_sum > u32::from(PERCENT_100) {
        return Err(InvariantError::BeneficiaryWeightOverflow(weight_sum).into());
    }
    if curation_percent > PERCENT_100 {
        return Err(InvariantError::PercentOutOfRange { name: "curation_percent", value: curation_percent }.into());
    }

    let curation = if comment.allow_curation_rewards {
        apply_percent(payout, curation_percent)
    } else {
        0
    };
    let (curators, unclaimed) = split_curation(curation, comment.total_vote_weight, votes);
    let mut author_tokens = payout - curation + unclaimed;

    let mut beneficiaries = Vec::with_capacity(comment.beneficiaries.len());
    let author_share = author_tokens;
    for route in &comment.beneficiaries {
        let reward = apply_percent(author_share, route.weight);
        if reward > 0 {
            author_tokens -= reward;
            beneficiaries.push((route.account.clone(), reward));
        }
    }

    let author_liquid = apply_percent(author_tokens, comment.percent_scr.min(PERCENT_100));
    Ok(PayoutSplit {
        curators,
        beneficiaries,
        author_liquid,
        author_stake: author_tokens - author_liquid,
    })
}
