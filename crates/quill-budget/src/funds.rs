//! Per-block budget processing.
//!
//! Budgets are visited in descending `per_block` order. Cash drawn from the
//! fund budget pays the block's witness its cut as stake; everything else
//! lands in the reward fund's activity balance, where comment cashout picks
//! it up.

use tracing::debug;

use quill_core::block_task::{BlockTask, BlockTaskContext};
use quill_core::constants::PERCENT_100;
use quill_core::error::{InvariantError, QuillError};
use quill_core::math::apply_percent;
use quill_core::operations::{VirtualOperation, VirtualOperationSink};
use quill_core::params::ChainParams;
use quill_core::traits::Ledger;
use quill_core::types::Timestamp;

use quill_consensus::stake::credit_stake;

use crate::engine::allocate_cash;

/// Amounts moved by one round of [`process_funds`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FundsSummary {
    pub allocated: u64,
    pub producer_reward: u64,
    pub to_reward_fund: u64,
}

/// Allocate this block's cash from every budget.
pub fn process_funds(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ChainParams,
    block_num: u64,
    now: Timestamp,
) -> Result<FundsSummary, QuillError> {
    let witness_percent = params.budget.witness_reward_percent;
    if witness_percent > PERCENT_100 {
        return Err(InvariantError::PercentOutOfRange { name: "witness_reward_percent", value: witness_percent }.into());
    }
    let producer = ledger.global_properties().current_witness;
    let mut summary = FundsSummary::default();

    for budget in ledger.budgets_by_per_block() {
        let cash = allocate_cash(ledger, vops, budget.id, block_num, now)?;
        if cash == 0 {
            continue;
        }
        summary.allocated = summary.allocated.saturating_add(cash);

        let mut witness_cut = 0;
        if let Some(witness) = producer.as_ref().filter(|_| budget.is_fund()) {
            witness_cut = apply_percent(cash, witness_percent);
            if witness_cut > 0 {
                credit_stake(ledger, vops, &params.schedule, witness, witness_cut)?;
                vops.push_virtual_operation(VirtualOperation::ProducerReward {
                    producer: witness.clone(),
                    reward: witness_cut,
                });
                summary.producer_reward += witness_cut;
            }
        }
        summary.to_reward_fund = summary
            .to_reward_fund
            .checked_add(cash - witness_cut)
            .ok_or(InvariantError::BalanceOverflow)?;
    }

    if summary.to_reward_fund > 0 {
        let mut fund = ledger.reward_fund().ok_or(InvariantError::MissingRewardFund)?;
        fund.activity_reward_balance = fund
            .activity_reward_balance
            .checked_add(summary.to_reward_fund)
            .ok_or(InvariantError::BalanceOverflow)?;
        ledger.set_reward_fund(fund);
    }
    if summary.allocated > 0 {
        debug!(
            block_num,
            allocated = summary.allocated,
            producer_reward = summary.producer_reward,
            "budgets allocated"
        );
    }
    Ok(summary)
}

/// Block task wrapper around [`process_funds`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessFunds;

impl BlockTask for ProcessFunds {
    fn name(&self) -> &'static str {
        "process_funds"
    }

    fn on_apply(&self, ctx: &mut BlockTaskContext<'_>) -> Result<(), QuillError> {
        let block_num = ctx.block_num();
        let now = ctx.block_time();
        let (ledger, vops, params) = ctx.parts();
        process_funds(ledger, vops, params, block_num, now)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ledger::{LedgerBuilder, MemoryLedger};
    use quill_core::types::{AccountName, SigningKey};

    use crate::engine::{create_budget, create_fund_budget};

    fn params() -> ChainParams {
        ChainParams { block_interval_secs: 3, ..ChainParams::default() }
    }

    fn genesis() -> MemoryLedger {
        LedgerBuilder::new(0)
            .account("alice", 10_000, 0)
            .account("w1", 0, 0)
            .witness("w1", SigningKey([1; 32]))
            .build()
            .unwrap()
    }

    fn with_producer(ledger: &mut MemoryLedger, name: &str) {
        let mut props = ledger.global_properties();
        props.current_witness = Some(AccountName::from(name));
        ledger.set_global_properties(props);
    }

    #[test]
    fn fund_cash_pays_producer_and_reward_fund() {
        let mut ledger = genesis();
        let p = params();
        create_fund_budget(&mut ledger, &p, 10_000, 30, 0).unwrap();
        with_producer(&mut ledger, "w1");

        let mut vops = Vec::new();
        let summary = process_funds(&mut ledger, &mut vops, &p, 1, 3).unwrap();
        // 1_000 per block, 5% to the witness.
        assert_eq!(summary, FundsSummary { allocated: 1_000, producer_reward: 50, to_reward_fund: 950 });
        assert_eq!(ledger.get_account(&"w1".into()).unwrap().stake, 50);
        assert_eq!(ledger.reward_fund().unwrap().activity_reward_balance, 950);
        assert!(vops.contains(&VirtualOperation::ProducerReward { producer: "w1".into(), reward: 50 }));
    }

    #[test]
    fn no_producer_sends_everything_to_fund() {
        let mut ledger = genesis();
        let p = params();
        create_fund_budget(&mut ledger, &p, 10_000, 30, 0).unwrap();
        let summary = process_funds(&mut ledger, &mut Vec::new(), &p, 1, 3).unwrap();
        assert_eq!(summary.producer_reward, 0);
        assert_eq!(ledger.reward_fund().unwrap().activity_reward_balance, 1_000);
    }

    #[test]
    fn account_budgets_skip_witness_cut() {
        let mut ledger = genesis();
        let p = params();
        create_budget(&mut ledger, &p, &"alice".into(), None, 3_000, 30, 0).unwrap();
        with_producer(&mut ledger, "w1");
        let summary = process_funds(&mut ledger, &mut Vec::new(), &p, 1, 3).unwrap();
        assert_eq!(summary, FundsSummary { allocated: 300, producer_reward: 0, to_reward_fund: 300 });
        assert_eq!(ledger.get_account(&"w1".into()).unwrap().stake, 0);
    }

    #[test]
    fn same_block_is_not_paid_twice() {
        let mut ledger = genesis();
        let p = params();
        create_fund_budget(&mut ledger, &p, 10_000, 30, 0).unwrap();
        process_funds(&mut ledger, &mut Vec::new(), &p, 1, 3).unwrap();
        let again = process_funds(&mut ledger, &mut Vec::new(), &p, 1, 3).unwrap();
        assert_eq!(again, FundsSummary::default());
        assert_eq!(ledger.reward_fund().unwrap().activity_reward_balance, 1_000);
    }

    #[test]
    fn oversized_witness_percent_is_fatal() {
        let mut ledger = genesis();
        let mut p = params();
        create_fund_budget(&mut ledger, &p, 10_000, 30, 0).unwrap();
        with_producer(&mut ledger, "w1");
        p.budget.witness_reward_percent = 20_000;

        let err = process_funds(&mut ledger, &mut Vec::new(), &p, 1, 3).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            QuillError::Invariant(InvariantError::PercentOutOfRange { value: 20_000, .. })
        ));
        // Rejected before any budget was visited.
        assert_eq!(ledger.fund_budget().unwrap().balance, 10_000);
    }

    #[test]
    fn task_runs_through_context() {
        let mut ledger = genesis();
        let p = params();
        create_fund_budget(&mut ledger, &p, 10_000, 30, 0).unwrap();
        let mut vops: Vec<VirtualOperation> = Vec::new();
        let mut ctx = BlockTaskContext::new(&mut ledger, &mut vops, &p, 1, 3).unwrap();
        ProcessFunds.on_apply(&mut ctx).unwrap();
        assert_eq!(ProcessFunds.name(), "process_funds");
        assert!(matches!(vops.first(), Some(VirtualOperation::BudgetWithdrawal { amount: 1_000, .. })));
    }
}
