//! Comment cashout: the per-block task that pays matured comments.
//!
//! Every block, in order:
//! 1. decay the fund's `recent_claims` to the block time;
//! 2. add the claims of every comment now due;
//! 3. pay each due comment from one snapshot of the fund;
//! 4. deduct the sum of payouts from the fund balance.

use tracing::debug;

use quill_core::block_task::{BlockTask, BlockTaskContext};
use quill_core::constants::TIME_MAX;
use quill_core::error::{InvariantError, QuillError};
use quill_core::operations::{VirtualOperation, VirtualOperationSink};
use quill_core::params::ChainParams;
use quill_core::traits::Ledger;
use quill_core::types::{Comment, RewardFund, Timestamp};

use quill_consensus::stake::credit_stake;

use crate::claims::decay_recent_claims;
use crate::curve::evaluate_reward_curve;
use crate::payout::{rshare_reward, split_payout, CommentRewardContext};

/// Pay every comment whose cashout time has passed. Returns the total paid.
pub fn process_comments_cashout(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ChainParams,
    now: Timestamp,
) -> Result<u64, QuillError> {
    let mut fund = ledger.reward_fund().ok_or(InvariantError::MissingRewardFund)?;
    decay_recent_claims(&mut fund, now, params.reward.recent_claims_decay_secs);

    let due = ledger.comments_due(now);
    for id in &due {
        let comment = ledger.get_comment(*id)?;
        if comment.net_rshares > 0 {
            let claim = evaluate_reward_curve(comment.net_rshares.unsigned_abs().into(), fund.curve);
            fund.recent_claims = fund.recent_claims.saturating_add(claim);
        }
    }

    let snapshot = fund.clone();
    let mut paid_total: u64 = 0;
    for id in due {
        // Re-read: paying an earlier reply may have updated this comment.
        let comment = ledger.get_comment(id)?;
        let payout = comment_reward(&comment, &snapshot, params)?;
        let paid = pay_comment(ledger, vops, params, comment, payout, now)?;
        paid_total = paid_total
            .checked_add(paid)
            .ok_or(InvariantError::BalanceOverflow)?;
    }

    fund.activity_reward_balance = fund
        .activity_reward_balance
        .checked_sub(paid_total)
        .ok_or(InvariantError::InsufficientRewardBalance {
            have: fund.activity_reward_balance,
            need: paid_total,
        })?;
    ledger.set_reward_fund(fund);
    Ok(paid_total)
}

fn comment_reward(comment: &Comment, fund: &RewardFund, params: &ChainParams) -> Result<u64, QuillError> {
    let ctx = CommentRewardContext {
        rshares: comment.net_rshares,
        reward_weight: comment.reward_weight,
        max_payout: comment.max_accepted_payout,
        total_claims: fund.recent_claims,
        reward_balance: fund.activity_reward_balance,
        curve: fund.curve,
    };
    rshare_reward(&ctx, params.reward.min_payout)
}

/// Distribute `payout` for `comment`, propagate it to the ancestors, and mark
/// the comment paid. Returns the amount taken from the fund.
fn pay_comment(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ChainParams,
    mut comment: Comment,
    payout: u64,
    now: Timestamp,
) -> Result<u64, QuillError> {
    if payout > 0 {
        let votes = ledger.comment_votes(comment.id);
        let split = split_payout(payout, &comment, &votes, params.reward.curation_percent)?;

        for (curator, reward) in &split.curators {
            credit_stake(ledger, vops, &params.schedule, curator, *reward)?;
            vops.push_virtual_operation(VirtualOperation::CuratorReward {
                curator: curator.clone(),
                author: comment.author.clone(),
                permlink: comment.permlink.clone(),
                reward: *reward,
            });
        }
        for (beneficiary, reward) in &split.beneficiaries {
            credit_stake(ledger, vops, &params.schedule, beneficiary, *reward)?;
            vops.push_virtual_operation(VirtualOperation::BeneficiaryReward {
                beneficiary: beneficiary.clone(),
                author: comment.author.clone(),
                permlink: comment.permlink.clone(),
                reward: *reward,
            });
        }

        let mut author = ledger.get_account(&comment.author)?;
        author.balance = author
            .balance
            .checked_add(split.author_liquid)
            .ok_or(InvariantError::BalanceOverflow)?;
        ledger.update_account(author)?;
        credit_stake(ledger, vops, &params.schedule, &comment.author, split.author_stake)?;
        vops.push_virtual_operation(VirtualOperation::AuthorReward {
            author: comment.author.clone(),
            permlink: comment.permlink.clone(),
            liquid: split.author_liquid,
            stake: split.author_stake,
        });

        comment.author_rewards = comment.author_rewards.saturating_add(split.author_total());
        comment.total_payout_value = comment.total_payout_value.saturating_add(split.author_total());
        comment.curator_payout_value = comment.curator_payout_value.saturating_add(split.curation_total());
        comment.beneficiary_payout_value = comment
            .beneficiary_payout_value
            .saturating_add(split.beneficiary_total());

        vops.push_virtual_operation(VirtualOperation::CommentPayout {
            author: comment.author.clone(),
            permlink: comment.permlink.clone(),
            total_payout: payout,
        });
        debug!(
            author = %comment.author,
            permlink = %comment.permlink,
            payout,
            curators = split.curators.len(),
            "comment paid"
        );
    }

    let mut parent = comment.parent;
    while let Some(parent_id) = parent {
        let mut ancestor = ledger.get_comment(parent_id)?;
        ancestor.children_abs_rshares = ancestor.children_abs_rshares.saturating_add(comment.abs_rshares);
        ancestor.children_payout_value = ancestor.children_payout_value.saturating_add(payout);
        parent = ancestor.parent;
        ledger.update_comment(ancestor)?;
    }

    comment.cashout_time = TIME_MAX;
    comment.last_payout = Some(now);
    ledger.update_comment(comment)?;
    Ok(payout)
}

/// Block task wrapper around [`process_comments_cashout`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommentsCashout;

impl BlockTask for ProcessCommentsCashout {
    fn name(&self) -> &'static str {
        "process_comments_cashout"
    }

    fn on_apply(&self, ctx: &mut BlockTaskContext<'_>) -> Result<(), QuillError> {
        let now = ctx.block_time();
        let (ledger, vops, params) = ctx.parts();
        process_comments_cashout(ledger, vops, params, now)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::constants::PERCENT_100;
    use quill_core::ledger::{LedgerBuilder, MemoryLedger};
    use quill_core::params::RewardParams;
    use quill_core::types::{AccountName, BeneficiaryRoute, CommentId};

    use crate::content::{cast_vote, post_comment, CommentOptions};

    const WINDOW: u64 = 100;

    fn params() -> ChainParams {
        ChainParams {
            reward: RewardParams {
                cashout_window_secs: WINDOW,
                min_payout: 0,
                ..RewardParams::default()
            },
            ..ChainParams::default()
        }
    }

    fn genesis(balance: u64) -> MemoryLedger {
        LedgerBuilder::new(0)
            .reward_balance(balance)
            .account("alice", 0, 0)
            .account("bob", 0, 0)
            .account("carol", 0, 0)
            .build()
            .unwrap()
    }

    fn post(ledger: &mut MemoryLedger, author: &str, permlink: &str, parent: Option<CommentId>) -> CommentId {
        post_comment(
            ledger,
            &params().reward,
            &author.into(),
            permlink,
            parent,
            CommentOptions::default(),
            0,
        )
        .unwrap()
    }

    fn stake(ledger: &MemoryLedger, name: &str) -> u64 {
        ledger.get_account(&AccountName::from(name)).unwrap().stake
    }

    #[test]
    fn nothing_due_before_window() {
        let mut ledger = genesis(1_000);
        let id = post(&mut ledger, "alice", "p", None);
        cast_vote(&mut ledger, &"bob".into(), id, 100, 1).unwrap();
        let paid = process_comments_cashout(&mut ledger, &mut Vec::new(), &params(), WINDOW - 1).unwrap();
        assert_eq!(paid, 0);
        assert!(!ledger.get_comment(id).unwrap().is_paid());
    }

    #[test]
    fn single_comment_takes_whole_balance() {
        let mut ledger = genesis(1_000);
        let id = post(&mut ledger, "alice", "p", None);
        cast_vote(&mut ledger, &"bob".into(), id, 100, 1).unwrap();

        let mut vops = Vec::new();
        let paid = process_comments_cashout(&mut ledger, &mut vops, &params(), WINDOW).unwrap();
        assert_eq!(paid, 1_000);

        // 25% curation to bob, the rest to alice, fully liquid by default.
        assert_eq!(stake(&ledger, "bob"), 250);
        assert_eq!(ledger.get_account(&"alice".into()).unwrap().balance, 750);
        assert_eq!(ledger.reward_fund().unwrap().activity_reward_balance, 0);
        assert_eq!(ledger.global_properties().total_stake, 250);

        let c = ledger.get_comment(id).unwrap();
        assert!(c.is_paid());
        assert_eq!(c.cashout_time, TIME_MAX);
        assert_eq!(c.total_payout_value, 750);
        assert_eq!(c.curator_payout_value, 250);
        assert!(vops.iter().any(|op| matches!(op, VirtualOperation::CommentPayout { total_payout: 1_000, .. })));
    }

    #[test]
    fn zero_rshares_marks_paid_without_payout() {
        let mut ledger = genesis(1_000);
        let id = post(&mut ledger, "alice", "p", None);
        let mut vops = Vec::new();
        let paid = process_comments_cashout(&mut ledger, &mut vops, &params(), WINDOW).unwrap();
        assert_eq!(paid, 0);
        assert!(vops.is_empty());
        assert!(ledger.get_comment(id).unwrap().is_paid());
        assert_eq!(ledger.reward_fund().unwrap().activity_reward_balance, 1_000);
    }

    #[test]
    fn dust_payout_is_skipped() {
        let mut ledger = genesis(1_000);
        let big = post(&mut ledger, "alice", "big", None);
        let small = post(&mut ledger, "bob", "small", None);
        cast_vote(&mut ledger, &"carol".into(), big, 997, 1).unwrap();
        cast_vote(&mut ledger, &"carol".into(), small, 3, 1).unwrap();

        let mut p = params();
        p.reward.min_payout = 10;
        let paid = process_comments_cashout(&mut ledger, &mut Vec::new(), &p, WINDOW).unwrap();
        assert_eq!(paid, 997);
        assert_eq!(ledger.get_comment(small).unwrap().total_payout_value, 0);
        assert!(ledger.get_comment(small).unwrap().is_paid());
        assert_eq!(ledger.reward_fund().unwrap().activity_reward_balance, 3);
    }

    #[test]
    fn payout_capped_at_max_accepted() {
        let mut ledger = genesis(1_000);
        let id = post_comment(
            &mut ledger,
            &params().reward,
            &"alice".into(),
            "p",
            None,
            CommentOptions { max_accepted_payout: 40, ..CommentOptions::default() },
            0,
        )
        .unwrap();
        cast_vote(&mut ledger, &"bob".into(), id, 100, 1).unwrap();
        let paid = process_comments_cashout(&mut ledger, &mut Vec::new(), &params(), WINDOW).unwrap();
        assert_eq!(paid, 40);
        assert_eq!(ledger.reward_fund().unwrap().activity_reward_balance, 960);
    }

    #[test]
    fn reply_payout_propagates_to_ancestors() {
        let mut ledger = genesis(1_000);
        let root = post(&mut ledger, "alice", "root", None);
        let reply = post(&mut ledger, "bob", "reply", Some(root));
        let nested = post(&mut ledger, "carol", "nested", Some(reply));
        cast_vote(&mut ledger, &"alice".into(), nested, 50, 1).unwrap();

        process_comments_cashout(&mut ledger, &mut Vec::new(), &params(), WINDOW).unwrap();
        let root_c = ledger.get_comment(root).unwrap();
        let reply_c = ledger.get_comment(reply).unwrap();
        assert_eq!(reply_c.children_abs_rshares, 50);
        assert_eq!(root_c.children_abs_rshares, 50);
        assert_eq!(root_c.children_payout_value, 1_000);
        // Ancestors keep their own payout state.
        assert!(root_c.is_paid());
        assert_eq!(root_c.total_payout_value, 0);
    }

    #[test]
    fn beneficiaries_and_stake_split() {
        let mut ledger = genesis(1_000);
        let id = post_comment(
            &mut ledger,
            &params().reward,
            &"alice".into(),
            "p",
            None,
            CommentOptions {
                percent_scr: PERCENT_100 / 2,
                allow_curation_rewards: false,
                beneficiaries: vec![BeneficiaryRoute { account: "carol".into(), weight: 2_000 }],
                ..CommentOptions::default()
            },
            0,
        )
        .unwrap();
        cast_vote(&mut ledger, &"bob".into(), id, 100, 1).unwrap();

        process_comments_cashout(&mut ledger, &mut Vec::new(), &params(), WINDOW).unwrap();
        assert_eq!(stake(&ledger, "bob"), 0);
        assert_eq!(stake(&ledger, "carol"), 200);
        assert_eq!(ledger.get_account(&"alice".into()).unwrap().balance, 400);
        assert_eq!(stake(&ledger, "alice"), 400);
        assert_eq!(ledger.get_comment(id).unwrap().beneficiary_payout_value, 200);
    }

    #[test]
    fn competing_comments_share_the_snapshot() {
        let mut ledger = genesis(1_000);
        let a = post(&mut ledger, "alice", "a", None);
        let b = post(&mut ledger, "bob", "b", None);
        cast_vote(&mut ledger, &"carol".into(), a, 300, 1).unwrap();
        cast_vote(&mut ledger, &"carol".into(), b, 100, 1).unwrap();
        let paid = process_comments_cashout(&mut ledger, &mut Vec::new(), &params(), WINDOW).unwrap();
        assert_eq!(paid, 1_000);
        assert_eq!(ledger.get_comment(a).unwrap().author_rewards + ledger.get_comment(a).unwrap().curator_payout_value, 750);
    }

    #[test]
    fn claims_decay_before_new_claims_are_added() {
        let mut ledger = genesis(1_000);
        let mut fund = ledger.reward_fund().unwrap();
        fund.recent_claims = 1_000;
        ledger.set_reward_fund(fund);

        let p = params();
        let half = p.reward.recent_claims_decay_secs / 2;
        process_comments_cashout(&mut ledger, &mut Vec::new(), &p, half).unwrap();
        let fund = ledger.reward_fund().unwrap();
        assert_eq!(fund.recent_claims, 500);
        assert_eq!(fund.last_update, half);
    }

    #[test]
    fn missing_fund_is_fatal() {
        let mut ledger = MemoryLedger::default();
        let err = process_comments_cashout(&mut ledger, &mut Vec::new(), &params(), 1).unwrap_err();
        assert_eq!(err, QuillError::Invariant(InvariantError::MissingRewardFund));
    }
}
