//! Shared helpers for scenario and adversarial tests.

use std::sync::Arc;

use parking_lot::Mutex;

use quill_core::ledger::{LedgerBuilder, MemoryLedger};
use quill_core::operations::VirtualOperation;
use quill_core::params::{ChainParams, RewardParams};
use quill_core::traits::Ledger;
use quill_core::types::{SigningKey, Timestamp};
use quill_node_lib::{AppliedBlock, ChainNode, VirtualOperationObserver};

/// 2026-01-01 00:00:00 UTC.
pub const GENESIS_TIME: Timestamp = 1_767_225_600;

pub const INTERVAL: u64 = 3;

/// Ten-block cashout window, no dust floor, short claim decay.
pub fn test_params() -> ChainParams {
    ChainParams {
        block_interval_secs: INTERVAL,
        reward: RewardParams {
            recent_claims_decay_secs: 100 * INTERVAL,
            cashout_window_secs: 10 * INTERVAL,
            min_payout: 0,
            ..RewardParams::default()
        },
        ..ChainParams::default()
    }
}

/// Deterministic signing key from a seed byte.
pub fn key(seed: u8) -> SigningKey {
    SigningKey([seed; 32])
}

/// Three stakeholders and two witnesses; alice backs w1, bob backs w2.
pub fn scenario_builder() -> LedgerBuilder {
    LedgerBuilder::new(GENESIS_TIME)
        .account("alice", 1_000_000, 300)
        .account("bob", 1_000_000, 100)
        .account("carol", 1_000_000, 0)
        .account("w1", 0, 0)
        .account("w2", 0, 0)
        .witness("w1", key(1))
        .witness("w2", key(2))
        .approve("alice", "w1")
        .approve("bob", "w2")
}

pub fn test_node(ledger: MemoryLedger, params: ChainParams) -> ChainNode {
    ChainNode::new(ledger, params).unwrap()
}

/// Apply `n` blocks at consecutive slots.
pub fn advance(node: &ChainNode, n: u64) -> Vec<AppliedBlock> {
    (0..n).map(|_| node.apply_block(node.next_slot_time()).unwrap()).collect()
}

/// Observer keeping every committed operation with its block number.
#[derive(Default)]
pub struct Recorder(Mutex<Vec<(u64, VirtualOperation)>>);

impl Recorder {
    pub fn attach(node: &ChainNode) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        node.subscribe(recorder.clone());
        recorder
    }

    pub fn ops(&self) -> Vec<(u64, VirtualOperation)> {
        self.0.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.0.lock().iter().filter(|(_, op)| op.name() == name).count()
    }
}

impl VirtualOperationObserver for Recorder {
    fn on_block_operations(&self, block_num: u64, _block_time: Timestamp, ops: &[VirtualOperation]) {
        self.0.lock().extend(ops.iter().map(|op| (block_num, op.clone())));
    }
}

/// Every unit of supply is held by exactly one of: account balances,
/// account stake, the reward fund, or a budget.
pub fn assert_supply_conserved(ledger: &MemoryLedger) {
    let props = ledger.global_properties();
    let balances: u128 = ledger.accounts().map(|a| u128::from(a.balance)).sum();
    let stake: u128 = ledger.accounts().map(|a| u128::from(a.stake)).sum();
    let fund = ledger.reward_fund().map_or(0, |f| u128::from(f.activity_reward_balance));
    let budgets: u128 = ledger.budgets_by_per_block().iter().map(|b| u128::from(b.balance)).sum();

    assert_eq!(u128::from(props.total_stake), stake, "total_stake drifted");
    assert_eq!(
        u128::from(props.total_supply),
        balances + stake + fund + budgets,
        "supply not conserved: balances {balances} stake {stake} fund {fund} budgets {budgets}"
    );
}

/// No witness holds more votes than its approvers' combined stake, nor more
/// than the total stake.
pub fn assert_votes_bounded(ledger: &MemoryLedger) {
    let total_stake = ledger.global_properties().total_stake;
    for witness in ledger.witnesses_by_vote() {
        let backing: u64 = ledger
            .accounts()
            .filter(|a| ledger.witness_approvals(&a.name).contains(&witness.owner))
            .map(|a| a.stake)
            .sum();
        assert_eq!(witness.votes, backing, "votes of {} out of sync", witness.owner);
        assert!(witness.votes <= total_stake, "votes of {} exceed total stake", witness.owner);
    }
}
