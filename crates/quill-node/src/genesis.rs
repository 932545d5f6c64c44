//! JSON genesis state.
//!
//! Seeds accounts, witnesses, approvals, the reward fund, and the fund
//! budget. Everything else starts empty.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use quill_budget::create_fund_budget;
use quill_core::constants::{COIN, FUND_BUDGET_PERIOD_DAYS};
use quill_core::ledger::{LedgerBuilder, MemoryLedger};
use quill_core::params::ChainParams;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, RewardCurve, SigningKey, Timestamp};

use crate::error::NodeError;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisAccount {
    pub name: AccountName,
    #[serde(default)]
    pub balance: u64,
    #[serde(default)]
    pub stake: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisWitness {
    pub owner: AccountName,
    pub signing_key: SigningKey,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisApproval {
    pub account: AccountName,
    pub witness: AccountName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisFundBudget {
    pub balance: u64,
    #[serde(default = "default_fund_period")]
    pub period_days: u64,
}

fn default_fund_period() -> u64 {
    FUND_BUDGET_PERIOD_DAYS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisState {
    pub genesis_time: Timestamp,
    #[serde(default)]
    pub reward_curve: RewardCurve,
    #[serde(default)]
    pub reward_balance: u64,
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    #[serde(default)]
    pub witnesses: Vec<GenesisWitness>,
    #[serde(default)]
    pub approvals: Vec<GenesisApproval>,
    #[serde(default)]
    pub fund_budget: Option<GenesisFundBudget>,
}

impl GenesisState {
    pub fn from_json(json: &str) -> Result<Self, NodeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, NodeError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Three witnesses and six stakeholders, 2026-01-01 genesis.
    pub fn development() -> Self {
        let stakeholders: [(&str, u64); 6] = [
            ("alice", 3_000),
            ("bob", 1_000),
            ("carol", 500),
            ("dave", 250),
            ("erin", 100),
            ("frank", 50),
        ];
        let mut accounts: Vec<GenesisAccount> = stakeholders
            .iter()
            .map(|(name, stake)| GenesisAccount {
                name: (*name).into(),
                balance: 1_000 * COIN,
                stake: stake * COIN,
            })
            .collect();
        let witnesses: Vec<GenesisWitness> = (1..=3u8)
            .map(|i| GenesisWitness {
                owner: AccountName::new(format!("witness{i}")),
                signing_key: SigningKey([i; 32]),
                url: String::new(),
            })
            .collect();
        accounts.extend(witnesses.iter().map(|w| GenesisAccount {
            name: w.owner.clone(),
            balance: 0,
            stake: 0,
        }));
        let approvals = vec![
            GenesisApproval { account: "alice".into(), witness: "witness1".into() },
            GenesisApproval { account: "bob".into(), witness: "witness2".into() },
            GenesisApproval { account: "carol".into(), witness: "witness3".into() },
            GenesisApproval { account: "dave".into(), witness: "witness3".into() },
        ];
        Self {
            genesis_time: 1_767_225_600,
            reward_curve: RewardCurve::Linear,
            reward_balance: 0,
            accounts,
            witnesses,
            approvals,
            fund_budget: Some(GenesisFundBudget {
                balance: 10_000_000 * COIN,
                period_days: FUND_BUDGET_PERIOD_DAYS,
            }),
        }
    }

    pub fn build(&self, params: &ChainParams) -> Result<MemoryLedger, NodeError> {
        let mut builder = LedgerBuilder::new(self.genesis_time)
            .reward_curve(self.reward_curve)
            .reward_balance(self.reward_balance)
            .lap_length(params.schedule.lap_length);
        for account in &self.accounts {
            builder = builder.account(account.name.clone(), account.balance, account.stake);
        }
        for witness in &self.witnesses {
            if witness.signing_key.is_empty() {
                return Err(NodeError::Genesis(format!("witness {} has an empty signing key", witness.owner)));
            }
            builder = builder.witness(witness.owner.clone(), witness.signing_key);
        }
        for approval in &self.approvals {
            builder = builder.approve(approval.account.clone(), approval.witness.clone());
        }
        let mut ledger = builder.build()?;

        for witness in self.witnesses.iter().filter(|w| !w.url.is_empty()) {
            let mut record = ledger.get_witness(&witness.owner)?;
            record.url = witness.url.clone();
            ledger.update_witness(record)?;
        }
        if let Some(fund) = &self.fund_budget {
            let deadline = self
                .genesis_time
                .saturating_add(fund.period_days.saturating_mul(SECS_PER_DAY));
            create_fund_budget(&mut ledger, params, fund.balance, deadline, self.genesis_time)?;
        }

        info!(
            accounts = self.accounts.len(),
            witnesses = self.witnesses.len(),
            genesis_time = self.genesis_time,
            "genesis state built"
        );
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_genesis_builds() {
        let params = ChainParams::default();
        let ledger = GenesisState::development().build(&params).unwrap();
        assert_eq!(ledger.witness_count(), 3);
        assert_eq!(ledger.get_witness(&"witness3".into()).unwrap().votes, 750 * COIN);
        let fund = ledger.fund_budget().unwrap();
        assert_eq!(fund.balance, 10_000_000 * COIN);
        assert_eq!(fund.deadline, 1_767_225_600 + FUND_BUDGET_PERIOD_DAYS * SECS_PER_DAY);
    }

    #[test]
    fn parses_minimal_json() {
        let json = r#"{
            "genesis_time": 100,
            "accounts": [{ "name": "alice", "stake": 10 }, { "name": "w" }],
            "witnesses": [{ "owner": "w", "signing_key": "0101010101010101010101010101010101010101010101010101010101010101", "url": "https://w.example" }],
            "approvals": [{ "account": "alice", "witness": "w" }],
            "fund_budget": { "balance": 1000 }
        }"#;
        let genesis = GenesisState::from_json(json).unwrap();
        assert_eq!(genesis.fund_budget.as_ref().unwrap().period_days, FUND_BUDGET_PERIOD_DAYS);

        let ledger = genesis.build(&ChainParams::default()).unwrap();
        let w = ledger.get_witness(&"w".into()).unwrap();
        assert_eq!(w.votes, 10);
        assert_eq!(w.url, "https://w.example");
        assert_eq!(ledger.global_properties().genesis_time, 100);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = GenesisState::from_json(r#"{ "genesis_time": 1, "bogus": true }"#).unwrap_err();
        assert!(matches!(err, NodeError::Json(_)));
    }

    #[test]
    fn rejects_empty_signing_key() {
        let genesis = GenesisState {
            genesis_time: 0,
            reward_curve: RewardCurve::Linear,
            reward_balance: 0,
            accounts: vec![GenesisAccount { name: "w".into(), balance: 0, stake: 0 }],
            witnesses: vec![GenesisWitness { owner: "w".into(), signing_key: SigningKey::EMPTY, url: String::new() }],
            approvals: Vec::new(),
            fund_budget: None,
        };
        assert!(matches!(genesis.build(&ChainParams::default()), Err(NodeError::Genesis(_))));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesis.json");
        let dev = GenesisState::development();
        std::fs::write(&path, serde_json::to_string_pretty(&dev).unwrap()).unwrap();
        assert_eq!(GenesisState::load(&path).unwrap(), dev);
    }
}
