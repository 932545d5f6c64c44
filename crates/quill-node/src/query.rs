//! Read-only queries over a [`ChainNode`].
//!
//! Every query takes the ledger read lock once and returns owned JSON-ready
//! objects. Timestamps are rendered as UTC; `TIME_MAX` renders as `null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_core::constants::TIME_MAX;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, Budget, BudgetOwner, RewardCurve, Timestamp, Witness, WitnessTier};

use crate::node::ChainNode;

/// Upper bound on any paginated query.
pub const MAX_QUERY_LIMIT: usize = 1_000;

fn utc(ts: Timestamp) -> Option<DateTime<Utc>> {
    if ts == TIME_MAX {
        return None;
    }
    DateTime::from_timestamp(i64::try_from(ts).ok()?, 0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPropertiesJson {
    pub head_block_number: u64,
    pub time: Option<DateTime<Utc>>,
    pub current_aslot: u64,
    pub current_witness: Option<AccountName>,
    pub total_stake: u64,
    pub total_supply: u64,
    pub retired_supply: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardFundJson {
    pub curve: RewardCurve,
    /// Decimal string; exceeds the JSON safe integer range.
    pub recent_claims: String,
    pub activity_reward_balance: u64,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessJson {
    pub owner: AccountName,
    pub url: String,
    pub signing_key: String,
    pub created: Option<DateTime<Utc>>,
    pub votes: u64,
    pub virtual_scheduled_time: String,
    pub schedule: WitnessTier,
}

impl From<Witness> for WitnessJson {
    fn from(w: Witness) -> Self {
        Self {
            owner: w.owner,
            url: w.url,
            signing_key: w.signing_key.to_string(),
            created: utc(w.created),
            votes: w.votes,
            virtual_scheduled_time: w.virtual_scheduled_time.to_string(),
            schedule: w.schedule,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessScheduleJson {
    pub current_virtual_time: String,
    pub next_shuffle_block_num: u64,
    pub current_shuffled_witnesses: Vec<AccountName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetJson {
    pub id: u64,
    pub owner: BudgetOwner,
    pub content_permlink: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub balance: u64,
    pub per_block: u64,
    pub last_cashout_block: u64,
}

impl From<Budget> for BudgetJson {
    fn from(b: Budget) -> Self {
        Self {
            id: b.id.0,
            owner: b.owner,
            content_permlink: b.content_permlink,
            created: utc(b.created),
            deadline: utc(b.deadline),
            balance: b.balance,
            per_block: b.per_block,
            last_cashout_block: b.last_cashout_block,
        }
    }
}

impl ChainNode {
    pub fn get_global_properties(&self) -> GlobalPropertiesJson {
        let props = self.ledger().read().global_properties();
        GlobalPropertiesJson {
            head_block_number: props.head_block_number,
            time: utc(props.time),
            current_aslot: props.current_aslot,
            current_witness: props.current_witness,
            total_stake: props.total_stake,
            total_supply: props.total_supply,
            retired_supply: props.retired_supply,
        }
    }

    pub fn get_reward_fund(&self) -> Option<RewardFundJson> {
        let fund = self.ledger().read().reward_fund()?;
        Some(RewardFundJson {
            curve: fund.curve,
            recent_claims: fund.recent_claims.to_string(),
            activity_reward_balance: fund.activity_reward_balance,
            last_update: utc(fund.last_update),
        })
    }

    /// Witnesses by votes descending, starting at `from` when given.
    ///
    /// A `from` that names no witness yields an empty page.
    pub fn get_witnesses_by_vote(&self, from: Option<&AccountName>, limit: usize) -> Vec<WitnessJson> {
        let ranked = self.ledger().read().witnesses_by_vote();
        let start = match from {
            None => 0,
            Some(name) => match ranked.iter().position(|w| &w.owner == name) {
                Some(index) => index,
                None => return Vec::new(),
            },
        };
        ranked
            .into_iter()
            .skip(start)
            .take(limit.min(MAX_QUERY_LIMIT))
            .map(WitnessJson::from)
            .collect()
    }

    pub fn get_witness_schedule(&self) -> Option<WitnessScheduleJson> {
        let schedule = self.ledger().read().witness_schedule()?;
        Some(WitnessScheduleJson {
            current_virtual_time: schedule.current_virtual_time.to_string(),
            next_shuffle_block_num: schedule.next_shuffle_block_num,
            current_shuffled_witnesses: schedule.current_shuffled_witnesses,
        })
    }

    pub fn get_active_witnesses(&self) -> Vec<AccountName> {
        self.ledger()
            .read()
            .witness_schedule()
            .map(|s| s.current_shuffled_witnesses)
            .unwrap_or_default()
    }

    pub fn get_budgets(&self, owners: &[BudgetOwner]) -> Vec<BudgetJson> {
        let ledger = self.ledger();
        let ledger = ledger.read();
        owners
            .iter()
            .take(MAX_QUERY_LIMIT)
            .flat_map(|owner| ledger.budgets_by_owner(owner))
            .map(BudgetJson::from)
            .collect()
    }

    /// Budgets paying the most per block first.
    pub fn get_top_budgets(&self, limit: usize) -> Vec<BudgetJson> {
        self.ledger()
            .read()
            .budgets_by_per_block()
            .into_iter()
            .take(limit.min(MAX_QUERY_LIMIT))
            .map(BudgetJson::from)
            .collect()
    }

    /// Budget owners in order, starting at the first owner `>= lower_bound`.
    pub fn lookup_budget_owners(&self, lower_bound: Option<&BudgetOwner>, limit: usize) -> Vec<BudgetOwner> {
        self.ledger()
            .read()
            .budget_owners()
            .into_iter()
            .filter(|owner| lower_bound.is_none_or(|bound| owner >= bound))
            .take(limit.min(MAX_QUERY_LIMIT))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_budget::{create_budget, create_fund_budget};
    use quill_core::ledger::LedgerBuilder;
    use quill_core::params::ChainParams;
    use quill_core::types::SigningKey;

    fn node() -> ChainNode {
        let params = ChainParams::default();
        let mut ledger = LedgerBuilder::new(1_700_000_000)
            .reward_balance(500)
            .account("alice", 10_000, 300)
            .account("bob", 10_000, 100)
            .account("w1", 0, 0)
            .account("w2", 0, 0)
            .witness("w1", SigningKey([1; 32]))
            .witness("w2", SigningKey([2; 32]))
            .approve("alice", "w1")
            .approve("bob", "w2")
            .build()
            .unwrap();
        create_fund_budget(&mut ledger, &params, 9_000, 1_700_000_090, 1_700_000_000).unwrap();
        create_budget(&mut ledger, &params, &"alice".into(), None, 300, 1_700_000_090, 1_700_000_000).unwrap();
        ChainNode::new(ledger, params).unwrap()
    }

    #[test]
    fn properties_render_utc() {
        let props = node().get_global_properties();
        assert_eq!(props.time.unwrap().to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn witnesses_paginate_from_name() {
        let node = node();
        let all = node.get_witnesses_by_vote(None, 10);
        let owners: Vec<_> = all.iter().map(|w| w.owner.as_str()).collect();
        assert_eq!(owners, ["w1", "w2"]);
        let tail = node.get_witnesses_by_vote(Some(&"w2".into()), 10);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].votes, 100);
    }

    #[test]
    fn witnesses_from_unknown_name_is_empty() {
        let node = node();
        assert!(node.get_witnesses_by_vote(Some(&"nobody".into()), 10).is_empty());
        assert!(node.get_witnesses_by_vote(Some(&"alice".into()), 10).is_empty());
    }

    #[test]
    fn budgets_by_rate_and_owner() {
        let node = node();
        let top = node.get_top_budgets(1);
        assert_eq!(top[0].owner, BudgetOwner::Fund);
        assert_eq!(top[0].per_block, 300);

        let alice = node.get_budgets(&[BudgetOwner::Account("alice".into())]);
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].per_block, 10);

        let owners = node.lookup_budget_owners(None, 10);
        assert_eq!(owners, vec![BudgetOwner::Fund, BudgetOwner::Account("alice".into())]);
        let from_alice = node.lookup_budget_owners(Some(&BudgetOwner::Account("a".into())), 10);
        assert_eq!(from_alice, vec![BudgetOwner::Account("alice".into())]);
    }

    #[test]
    fn schedule_appears_after_first_block() {
        let node = node();
        assert!(node.get_active_witnesses().is_empty());
        node.apply_block(1_700_000_003).unwrap();
        let mut active = node.get_active_witnesses();
        active.sort();
        assert_eq!(active, vec![AccountName::from("w1"), "w2".into()]);
        assert_eq!(node.get_witness_schedule().unwrap().next_shuffle_block_num, 3);
    }

    #[test]
    fn reward_fund_serializes_claims_as_string() {
        let fund = node().get_reward_fund().unwrap();
        let json = serde_json::to_value(&fund).unwrap();
        assert_eq!(json["recent_claims"], "0");
        assert_eq!(json["activity_reward_balance"], 500);
    }
}
