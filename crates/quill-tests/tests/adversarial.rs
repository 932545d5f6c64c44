//! Adversarial property-based test suite for Quill.
//!
//! These tests attempt to break protocol invariants under randomized inputs.
//! Property tests run at least 64 cases (256 for the cheap ones) with
//! proptest shrinking to produce minimal failing examples.
//!
//! Attack vectors tested:
//! - Stake churn and approval flapping against witness vote bookkeeping
//! - Block time manipulation (stale, repeated, and far-future blocks)
//! - Budget lifetimes with missed slots and early closes
//! - Supply conservation under random posting, voting, and budgets
//! - Payout caps chosen by the author

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use quill_budget::{allocate_cash, close_budget, create_budget};
use quill_consensus::{adjust_stake, approve_witness};
use quill_core::error::{PolicyError, QuillError};
use quill_core::ledger::{LedgerBuilder, MemoryLedger};
use quill_core::operations::VirtualOperation;
use quill_core::params::ChainParams;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, CommentId};
use quill_node_lib::NodeError;
use quill_rewards::{cast_vote, post_comment, CommentOptions};
use quill_tests::helpers::*;

const ACCOUNTS: [&str; 5] = ["alice", "bob", "carol", "w1", "w2"];
const WITNESSES: [&str; 2] = ["w1", "w2"];

/// A step of stake or approval churn.
#[derive(Debug, Clone)]
enum StakeAction {
    Adjust { account: usize, delta: i64 },
    Approve { account: usize, witness: usize },
    Unapprove { account: usize, witness: usize },
}

fn stake_action() -> impl Strategy<Value = StakeAction> {
    prop_oneof![
        (0..ACCOUNTS.len(), -1_000_000i64..1_000_000).prop_map(|(account, delta)| StakeAction::Adjust { account, delta }),
        (0..ACCOUNTS.len(), 0..WITNESSES.len()).prop_map(|(account, witness)| StakeAction::Approve { account, witness }),
        (0..ACCOUNTS.len(), 0..WITNESSES.len()).prop_map(|(account, witness)| StakeAction::Unapprove { account, witness }),
    ]
}

fn apply_stake_action(ledger: &mut MemoryLedger, params: &ChainParams, action: &StakeAction) -> Result<(), QuillError> {
    let mut vops: Vec<VirtualOperation> = Vec::new();
    match *action {
        StakeAction::Adjust { account, delta } => {
            let name = AccountName::from(ACCOUNTS[account]);
            // Never withdraw more than the account holds.
            let stake = i64::try_from(ledger.get_account(&name)?.stake).unwrap_or(i64::MAX);
            adjust_stake(ledger, &mut vops, &params.schedule, &name, delta.max(-stake))
        }
        StakeAction::Approve { account, witness } => approve_witness(
            ledger,
            &mut vops,
            &params.schedule,
            &ACCOUNTS[account].into(),
            &WITNESSES[witness].into(),
            true,
        ),
        StakeAction::Unapprove { account, witness } => approve_witness(
            ledger,
            &mut vops,
            &params.schedule,
            &ACCOUNTS[account].into(),
            &WITNESSES[witness].into(),
            false,
        ),
    }
}

fn pick(rng: &mut StdRng) -> AccountName {
    AccountName::from(ACCOUNTS[rng.gen_range(0..ACCOUNTS.len())])
}

/// Random user activity between blocks. Policy rejections are expected and
/// skipped.
fn random_activity(rng: &mut StdRng, ledger: &mut MemoryLedger, params: &ChainParams, comments: &mut Vec<CommentId>) {
    let now = ledger.global_properties().time;

    let result: Result<(), QuillError> = match rng.gen_range(0..4) {
        0 => {
            let author = pick(&mut *rng);
            let parent = if comments.is_empty() || rng.gen_bool(0.5) {
                None
            } else {
                Some(comments[rng.gen_range(0..comments.len())])
            };
            let permlink = format!("p{}", rng.r#gen::<u32>());
            post_comment(ledger, &params.reward, &author, &permlink, parent, CommentOptions::default(), now)
                .map(|id| comments.push(id))
        }
        1 | 2 if !comments.is_empty() => {
            let comment = comments[rng.gen_range(0..comments.len())];
            let voter = pick(&mut *rng);
            let rshares = rng.gen_range(-10_000i64..100_000);
            cast_vote(ledger, &voter, comment, rshares, now).map(|_| ())
        }
        _ => {
            let owner = pick(&mut *rng);
            let balance = rng.gen_range(1..5_000u64);
            let deadline = now + rng.gen_range(1..40u64) * INTERVAL;
            create_budget(ledger, params, &owner, None, balance, deadline, now).map(|_| ())
        }
    };
    if let Err(err) = result {
        assert!(!err.is_fatal(), "user operation hit an invariant: {err}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Witness votes always equal the stake of their approvers and never
    /// exceed total stake, whatever order stake and approvals change in.
    #[test]
    fn votes_track_approver_stake(actions in prop::collection::vec(stake_action(), 1..60)) {
        let params = test_params();
        let mut ledger = scenario_builder().build().unwrap();
        for action in &actions {
            match apply_stake_action(&mut ledger, &params, action) {
                Ok(()) => {}
                Err(QuillError::Policy(_)) => {}
                Err(err) => prop_assert!(false, "{action:?} failed: {err}"),
            }
            assert_votes_bounded(&ledger);
            assert_supply_conserved(&ledger);
        }
    }

    /// An owner budget pays out or refunds exactly its balance, whatever
    /// slots are missed and whenever the owner closes it.
    #[test]
    fn budget_settles_exact_balance(
        balance in 1u64..1_000_000,
        blocks in 1u64..60,
        gaps in prop::collection::vec(1u64..4, 1..80),
        close_at in proptest::option::of(1usize..80),
    ) {
        let params = test_params();
        let mut ledger = LedgerBuilder::new(GENESIS_TIME).account("owner", balance, 0).build().unwrap();
        let owner: AccountName = "owner".into();
        let id = create_budget(&mut ledger, &params, &owner, None, balance, GENESIS_TIME + blocks * INTERVAL, GENESIS_TIME).unwrap();

        let mut vops: Vec<VirtualOperation> = Vec::new();
        let mut withdrawn = 0u64;
        let mut time = GENESIS_TIME;
        for (i, gap) in gaps.iter().enumerate() {
            if ledger.find_budget(id).is_none() {
                break;
            }
            if close_at == Some(i) {
                close_budget(&mut ledger, &mut vops, id, &owner).unwrap();
                break;
            }
            time += gap * INTERVAL;
            withdrawn += allocate_cash(&mut ledger, &mut vops, id, i as u64 + 1, time).unwrap();
        }
        let remaining = ledger.find_budget(id).map_or(0, |b| b.balance);
        let refunded = ledger.get_account(&owner).unwrap().balance;
        prop_assert_eq!(withdrawn + remaining + refunded, balance);
    }

    /// Blocks at or before the head time are rejected without side effects.
    #[test]
    fn stale_block_times_are_rejected(blocks in 1u64..10, back in 0u64..100) {
        let node = test_node(scenario_builder().build().unwrap(), test_params());
        advance(&node, blocks);
        let digest = node.state_digest().unwrap();
        let stale = node.head_block_time().saturating_sub(back);
        let err = node.apply_block(stale).unwrap_err();
        let is_policy_rejection = matches!(
            err,
            NodeError::Quill(QuillError::Policy(PolicyError::BlockTimeNotAfterHead { .. }))
        );
        prop_assert!(is_policy_rejection);
        prop_assert_eq!(node.state_digest().unwrap(), digest);
        prop_assert_eq!(node.head_block_number(), blocks);
    }

    /// The author's cap bounds everything paid for a comment.
    #[test]
    fn author_cap_bounds_total_payout(cap in 0u64..20_000, rshares in 1i64..1_000_000) {
        let params = test_params();
        let node = test_node(scenario_builder().reward_balance(10_000).build().unwrap(), params.clone());
        let id = node.with_ledger_mut(|ledger| {
            let options = CommentOptions { max_accepted_payout: cap, ..CommentOptions::default() };
            let id = post_comment(ledger, &params.reward, &"carol".into(), "capped", None, options, GENESIS_TIME).unwrap();
            cast_vote(ledger, &"bob".into(), id, rshares, GENESIS_TIME).unwrap();
            id
        });
        advance(&node, 10);
        let ledger = node.ledger();
        let ledger = ledger.read();
        let comment = ledger.get_comment(id).unwrap();
        let paid = comment.total_payout_value + comment.curator_payout_value + comment.beneficiary_payout_value;
        prop_assert!(comment.is_paid());
        prop_assert!(paid <= cap);
        prop_assert_eq!(ledger.reward_fund().unwrap().activity_reward_balance, 10_000 - paid);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Supply is conserved and votes stay bounded across every committed
    /// block of a random history, with a fund budget feeding rewards.
    #[test]
    fn random_history_conserves_supply(seed in any::<u64>(), blocks in 5u64..40) {
        let params = test_params();
        let mut ledger = scenario_builder().reward_balance(5_000).build().unwrap();
        quill_budget::create_fund_budget(&mut ledger, &params, 100_000, GENESIS_TIME + 200 * INTERVAL, GENESIS_TIME).unwrap();
        let node = test_node(ledger, params.clone());

        let mut rng = StdRng::seed_from_u64(seed);
        let mut comments = Vec::new();
        for _ in 0..blocks {
            for _ in 0..rng.gen_range(0..4) {
                node.with_ledger_mut(|ledger| random_activity(&mut rng, ledger, &params, &mut comments));
            }
            let skip = rng.gen_range(0..3u64);
            node.apply_block(node.next_slot_time() + skip * INTERVAL).unwrap();

            let ledger = node.ledger();
            let ledger = ledger.read();
            assert_supply_conserved(&ledger);
            assert_votes_bounded(&ledger);
        }
    }
}
