//! Virtual operations: side-channel notifications emitted by block tasks.
//!
//! They carry no authority of their own. Observers (history, explorers,
//! wallets) use them to learn what a block did to balances and schedules.

use serde::{Deserialize, Serialize};

use crate::types::{AccountName, BudgetId, BudgetOwner};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VirtualOperation {
    AuthorReward {
        author: AccountName,
        permlink: String,
        liquid: u64,
        stake: u64,
    },
    CuratorReward {
        curator: AccountName,
        author: AccountName,
        permlink: String,
        reward: u64,
    },
    BeneficiaryReward {
        beneficiary: AccountName,
        author: AccountName,
        permlink: String,
        reward: u64,
    },
    CommentPayout {
        author: AccountName,
        permlink: String,
        total_payout: u64,
    },
    ProducerReward {
        producer: AccountName,
        reward: u64,
    },
    WitnessVoteAdjusted {
        witness: AccountName,
        delta: i64,
        votes: u64,
        virtual_scheduled_time: u128,
    },
    WitnessScheduleUpdated {
        block_num: u64,
        witnesses: Vec<AccountName>,
        current_virtual_time: u128,
    },
    BudgetWithdrawal {
        budget: BudgetId,
        owner: BudgetOwner,
        amount: u64,
    },
    BudgetClosed {
        budget: BudgetId,
        owner: BudgetOwner,
        refunded: u64,
        retired: u64,
    },
}

impl VirtualOperation {
    /// Short snake_case name, matching the serialized variant key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthorReward { .. } => "author_reward",
            Self::CuratorReward { .. } => "curator_reward",
            Self::BeneficiaryReward { .. } => "beneficiary_reward",
            Self::CommentPayout { .. } => "comment_payout",
            Self::ProducerReward { .. } => "producer_reward",
            Self::WitnessVoteAdjusted { .. } => "witness_vote_adjusted",
            Self::WitnessScheduleUpdated { .. } => "witness_schedule_updated",
            Self::BudgetWithdrawal { .. } => "budget_withdrawal",
            Self::BudgetClosed { .. } => "budget_closed",
        }
    }

    /// Accounts whose balance, stake, or witness record this operation touches.
    pub fn impacted_accounts(&self) -> Vec<&AccountName> {
        match self {
            Self::AuthorReward { author, .. } | Self::CommentPayout { author, .. } => vec![author],
            Self::CuratorReward { curator, author, .. } => vec![curator, author],
            Self::BeneficiaryReward { beneficiary, author, .. } => vec![beneficiary, author],
            Self::ProducerReward { producer, .. } => vec![producer],
            Self::WitnessVoteAdjusted { witness, .. } => vec![witness],
            Self::WitnessScheduleUpdated { witnesses, .. } => witnesses.iter().collect(),
            Self::BudgetWithdrawal { owner, .. } | Self::BudgetClosed { owner, .. } => match owner {
                BudgetOwner::Account(name) => vec![name],
                BudgetOwner::Fund => Vec::new(),
            },
        }
    }
}

/// Destination for virtual operations produced while applying a block.
pub trait VirtualOperationSink {
    fn push_virtual_operation(&mut self, op: VirtualOperation);
}

impl VirtualOperationSink for Vec<VirtualOperation> {
    fn push_virtual_operation(&mut self, op: VirtualOperation) {
        self.push(op);
    }
}
