//! Seeded synthetic user activity applied between blocks.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use quill_budget::create_budget;
use quill_consensus::approve_witness;
use quill_core::constants::COIN;
use quill_core::error::QuillError;
use quill_core::ledger::MemoryLedger;
use quill_core::operations::VirtualOperation;
use quill_core::params::ChainParams;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, CommentId, Timestamp};
use quill_rewards::{cast_vote, post_comment, CommentOptions};

/// Operations accepted and rejected by policy so far.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct ActivityStats {
    pub posts: u64,
    pub votes: u64,
    pub budgets: u64,
    pub approvals: u64,
    pub rejected: u64,
}

pub struct Activity {
    rng: StdRng,
    comments: Vec<CommentId>,
    pub stats: ActivityStats,
}

impl Activity {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), comments: Vec::new(), stats: ActivityStats::default() }
    }

    /// Run one round of activity at head time `now`.
    ///
    /// Policy rejections are counted and skipped; anything else aborts.
    pub fn step(&mut self, ledger: &mut MemoryLedger, params: &ChainParams, now: Timestamp) -> Result<(), QuillError> {
        let accounts = ledger.account_names();
        if accounts.is_empty() {
            return Ok(());
        }

        if self.rng.gen_bool(0.3) {
            let author = self.pick(&accounts);
            let parent = if !self.comments.is_empty() && self.rng.gen_bool(0.3) {
                self.comments.choose(&mut self.rng).copied()
            } else {
                None
            };
            let permlink = format!("post-{now}-{}", self.rng.r#gen::<u32>());
            let result = post_comment(ledger, &params.reward, &author, &permlink, parent, CommentOptions::default(), now);
            if let Some(id) = self.record(result, |s| s.posts += 1)? {
                self.comments.push(id);
            }
        }

        for _ in 0..self.rng.gen_range(0..4) {
            let Some(&comment) = self.comments.choose(&mut self.rng) else {
                break;
            };
            let voter = self.pick(&accounts);
            let magnitude = self.rng.gen_range(1..=1_000_000i64) * 1_000;
            let rshares = if self.rng.gen_bool(0.1) { -magnitude } else { magnitude };
            let result = cast_vote(ledger, &voter, comment, rshares, now);
            self.record(result, |s| s.votes += 1)?;
        }

        if self.rng.gen_bool(0.02) {
            let owner = self.pick(&accounts);
            let balance = self.rng.gen_range(1..=10) * COIN;
            let deadline = now + self.rng.gen_range(10..=100) * params.block_interval_secs;
            let result = create_budget(ledger, params, &owner, None, balance, deadline, now);
            self.record(result, |s| s.budgets += 1)?;
        }

        if self.rng.gen_bool(0.05) {
            let witnesses = ledger.witnesses_by_vote();
            if let Some(witness) = witnesses.choose(&mut self.rng).map(|w| w.owner.clone()) {
                let account = self.pick(&accounts);
                // Votes cast between blocks are not part of any block's history.
                let mut vops: Vec<VirtualOperation> = Vec::new();
                let result = approve_witness(ledger, &mut vops, &params.schedule, &account, &witness, true);
                self.record(result, |s| s.approvals += 1)?;
            }
        }
        Ok(())
    }

    fn pick(&mut self, accounts: &[AccountName]) -> AccountName {
        accounts[self.rng.gen_range(0..accounts.len())].clone()
    }

    fn record<T>(
        &mut self,
        result: Result<T, QuillError>,
        accepted: impl FnOnce(&mut ActivityStats),
    ) -> Result<Option<T>, QuillError> {
        match result {
            Ok(value) => {
                accepted(&mut self.stats);
                Ok(Some(value))
            }
            Err(err) if !err.is_fatal() => {
                debug!(error = %err, "activity rejected");
                self.stats.rejected += 1;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
