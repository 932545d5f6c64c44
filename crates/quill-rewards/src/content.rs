//! Posting and voting: the operations that feed the cashout task.

use std::collections::BTreeSet;

use tracing::debug;

use quill_core::constants::{MAX_COMMENT_DEPTH, PERCENT_100, TIME_MAX};
use quill_core::error::{InvariantError, PolicyError, QuillError};
use quill_core::math::isqrt;
use quill_core::params::RewardParams;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, BeneficiaryRoute, Comment, CommentId, Timestamp, Vote};

/// Payout options chosen by the author when posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentOptions {
    pub max_accepted_payout: u64,
    pub percent_scr: u16,
    pub allow_votes: bool,
    pub allow_curation_rewards: bool,
    pub beneficiaries: Vec<BeneficiaryRoute>,
}

impl Default for CommentOptions {
    fn default() -> Self {
        Self {
            max_accepted_payout: u64::MAX,
            percent_scr: PERCENT_100,
            allow_votes: true,
            allow_curation_rewards: true,
            beneficiaries: Vec::new(),
        }
    }
}

fn validate_options(ledger: &dyn Ledger, options: &CommentOptions) -> Result<(), QuillError> {
    if options.percent_scr > PERCENT_100 {
        return Err(PolicyError::InvalidPercent(options.percent_scr).into());
    }
    let mut seen = BTreeSet::new();
    let mut total: u32 = 0;
    for route in &options.beneficiaries {
        if !seen.insert(&route.account) {
            return Err(PolicyError::DuplicateBeneficiary(route.account.to_string()).into());
        }
        ledger.get_account(&route.account)?;
        total += u32::from(route.weight);
    }
    if total > u32::from(PERCENT_100) {
        return Err(PolicyError::BeneficiaryWeightsTooLarge(total).into());
    }
    Ok(())
}

/// Create a post (`parent == None`) or a reply maturing one cashout window
/// after `now`.
pub fn post_comment(
    ledger: &mut dyn Ledger,
    params: &RewardParams,
    author: &AccountName,
    permlink: &str,
    parent: Option<CommentId>,
    options: CommentOptions,
    now: Timestamp,
) -> Result<CommentId, QuillError> {
    ledger.get_account(author)?;
    if ledger.find_comment_by_permlink(author, permlink).is_some() {
        return Err(PolicyError::DuplicatePermlink {
            author: author.to_string(),
            permlink: permlink.to_string(),
        }
        .into());
    }
    validate_options(ledger, &options)?;

    let mut comment = Comment::new(author.clone(), permlink, now);
    if let Some(parent_id) = parent {
        let parent = ledger.get_comment(parent_id)?;
        if parent.depth >= MAX_COMMENT_DEPTH {
            return Err(PolicyError::MaxDepthReached.into());
        }
        comment.parent = Some(parent.id);
        comment.root = parent.root;
        comment.depth = parent.depth + 1;
    }
    comment.cashout_time = now.saturating_add(params.cashout_window_secs).min(TIME_MAX - 1);
    comment.max_accepted_payout = options.max_accepted_payout;
    comment.percent_scr = options.percent_scr;
    comment.allow_votes = options.allow_votes;
    comment.allow_curation_rewards = options.allow_curation_rewards;
    comment.beneficiaries = options.beneficiaries;

    let id = ledger.insert_comment(comment)?;
    debug!(author = %author, permlink, id = %id, "comment posted");
    Ok(id)
}

/// Cast or change `voter`'s vote on `comment`.
///
/// A first positive vote earns curation weight on the square-root curve of
/// the comment's positive rshares. Changing a vote forfeits its weight.
pub fn cast_vote(
    ledger: &mut dyn Ledger,
    voter: &AccountName,
    comment_id: CommentId,
    rshares: i64,
    now: Timestamp,
) -> Result<Vote, QuillError> {
    ledger.get_account(voter)?;
    let mut comment = ledger.get_comment(comment_id)?;
    if comment.is_paid() || comment.cashout_time == TIME_MAX || !comment.allow_votes {
        return Err(PolicyError::VotingClosed {
            author: comment.author.to_string(),
            permlink: comment.permlink.clone(),
        }
        .into());
    }

    let previous = ledger.find_vote(voter, comment_id);
    let old_rshares = previous.as_ref().map_or(0, |v| v.rshares);
    let delta = rshares
        .checked_sub(old_rshares)
        .ok_or(InvariantError::BalanceOverflow)?;

    comment.net_rshares = comment
        .net_rshares
        .checked_add(delta)
        .ok_or(InvariantError::BalanceOverflow)?;
    comment.abs_rshares = comment.abs_rshares.saturating_add(delta.unsigned_abs());

    let old_positive = old_rshares.max(0).unsigned_abs();
    let new_positive = rshares.max(0).unsigned_abs();
    let old_vote_rshares = comment.vote_rshares;
    comment.vote_rshares = comment
        .vote_rshares
        .saturating_sub(old_positive)
        .saturating_add(new_positive);

    let vote = match previous {
        None => {
            let weight = if rshares > 0 && comment.allow_curation_rewards {
                let before = isqrt(u128::from(old_vote_rshares));
                let after = isqrt(u128::from(comment.vote_rshares));
                u64::try_from(after - before).unwrap_or(u64::MAX)
            } else {
                0
            };
            comment.total_vote_weight = comment.total_vote_weight.saturating_add(weight);
            Vote {
                voter: voter.clone(),
                comment: comment_id,
                rshares,
                weight,
                last_update: now,
                num_changes: 0,
            }
        }
        Some(mut old) => {
            comment.total_vote_weight = comment.total_vote_weight.saturating_sub(old.weight);
            old.rshares = rshares;
            old.weight = 0;
            old.last_update = now;
            old.num_changes += 1;
            old
        }
    };

    ledger.update_comment(comment)?;
    ledger.upsert_vote(vote.clone())?;
    debug!(voter = %voter, comment = %comment_id, rshares, weight = vote.weight, "vote cast");
    Ok(vote)
}
