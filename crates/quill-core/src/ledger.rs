//! In-memory ledger: record arenas keyed by id plus ordered secondary
//! indices.
//!
//! Every secondary index is a `BTreeSet` of sort keys. Writes remove the
//! record's old keys and insert the new ones in the same call, so listings
//! always reflect the stored records.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::constants::TIME_MAX;
use crate::error::{LedgerError, PolicyError, QuillError};
use crate::traits::Ledger;
use crate::types::{
    Account, AccountName, Budget, BudgetId, BudgetOwner, Comment, CommentId, GlobalProperties,
    RewardCurve, RewardFund, SigningKey, Timestamp, Vote, Witness, WitnessId, WitnessSchedule,
};

/// Reference implementation of [`Ledger`].
///
/// `Clone` is cheap enough for the node to snapshot the whole ledger before
/// a block and restore it if any task fails.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    props: GlobalProperties,
    accounts: BTreeMap<AccountName, Account>,

    comments: BTreeMap<CommentId, Comment>,
    next_comment_id: u64,
    comments_by_permlink: BTreeMap<(AccountName, String), CommentId>,
    comments_by_cashout: BTreeSet<(Timestamp, CommentId)>,
    votes: BTreeMap<(CommentId, AccountName), Vote>,
    votes_by_weight: BTreeSet<(CommentId, Reverse<u64>, AccountName)>,

    reward_fund: Option<RewardFund>,

    witnesses: BTreeMap<WitnessId, Witness>,
    next_witness_id: u64,
    witness_by_owner: BTreeMap<AccountName, WitnessId>,
    witnesses_by_vote: BTreeSet<(Reverse<u64>, AccountName)>,
    witnesses_by_schedule: BTreeSet<(u128, WitnessId)>,
    /// `(account, witness)` approval pairs.
    approvals: BTreeSet<(AccountName, AccountName)>,
    schedule: Option<WitnessSchedule>,

    budgets: BTreeMap<BudgetId, Budget>,
    next_budget_id: u64,
    budgets_by_per_block: BTreeSet<(Reverse<u64>, BudgetId)>,
    budgets_by_owner: BTreeSet<(BudgetOwner, BudgetId)>,
}

/// Saved ledger state, restored with [`MemoryLedger::restore`].
#[derive(Clone, Debug)]
pub struct LedgerCheckpoint(MemoryLedger);

impl LedgerCheckpoint {
    pub fn head_block_number(&self) -> u64 {
        self.0.props.head_block_number
    }
}

/// BLAKE3 hash of the ledger's primary tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateDigest(pub [u8; 32]);

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateDigest({self})")
    }
}

impl MemoryLedger {
    pub fn new(props: GlobalProperties) -> Self {
        Self { props, ..Self::default() }
    }

    pub fn checkpoint(&self) -> LedgerCheckpoint {
        LedgerCheckpoint(self.clone())
    }

    /// Discard every change since `checkpoint` was taken.
    pub fn restore(&mut self, checkpoint: LedgerCheckpoint) {
        debug!(
            from = self.props.head_block_number,
            to = checkpoint.head_block_number(),
            "restoring ledger checkpoint"
        );
        *self = checkpoint.0;
    }

    /// Hash of every primary table, in key order. Two ledgers that applied
    /// the same history produce the same digest.
    pub fn state_digest(&self) -> Result<StateDigest, QuillError> {
        let config = bincode::config::standard();
        let mut hasher = blake3::Hasher::new();
        let mut feed = |bytes: Result<Vec<u8>, bincode::error::EncodeError>| {
            bytes
                .map(|b| {
                    hasher.update(&(b.len() as u64).to_le_bytes());
                    hasher.update(&b);
                })
                .map_err(|e| QuillError::from(LedgerError::Encoding(e.to_string())))
        };
        feed(bincode::encode_to_vec(&self.props, config))?;
        feed(bincode::encode_to_vec(&self.accounts, config))?;
        feed(bincode::encode_to_vec(&self.comments, config))?;
        feed(bincode::encode_to_vec(&self.votes, config))?;
        feed(bincode::encode_to_vec(&self.reward_fund, config))?;
        feed(bincode::encode_to_vec(&self.witnesses, config))?;
        feed(bincode::encode_to_vec(&self.approvals, config))?;
        feed(bincode::encode_to_vec(&self.schedule, config))?;
        feed(bincode::encode_to_vec(&self.budgets, config))?;
        Ok(StateDigest(*hasher.finalize().as_bytes()))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn budget_count(&self) -> usize {
        self.budgets.len()
    }

    fn index_comment(&mut self, comment: &Comment) {
        self.comments_by_permlink
            .insert((comment.author.clone(), comment.permlink.clone()), comment.id);
        if comment.cashout_time != TIME_MAX {
            self.comments_by_cashout.insert((comment.cashout_time, comment.id));
        }
    }

    fn unindex_comment(&mut self, comment: &Comment) {
        self.comments_by_permlink
            .remove(&(comment.author.clone(), comment.permlink.clone()));
        self.comments_by_cashout.remove(&(comment.cashout_time, comment.id));
    }

    fn index_witness(&mut self, witness: &Witness) {
        self.witness_by_owner.insert(witness.owner.clone(), witness.id);
        self.witnesses_by_vote
            .insert((Reverse(witness.votes), witness.owner.clone()));
        self.witnesses_by_schedule
            .insert((witness.virtual_scheduled_time, witness.id));
    }

    fn unindex_witness(&mut self, witness: &Witness) {
        self.witness_by_owner.remove(&witness.owner);
        self.witnesses_by_vote
            .remove(&(Reverse(witness.votes), witness.owner.clone()));
        self.witnesses_by_schedule
            .remove(&(witness.virtual_scheduled_time, witness.id));
    }

    fn index_budget(&mut self, budget: &Budget) {
        self.budgets_by_per_block.insert((Reverse(budget.per_block), budget.id));
        self.budgets_by_owner.insert((budget.owner.clone(), budget.id));
    }

    fn unindex_budget(&mut self, budget: &Budget) {
        self.budgets_by_per_block.remove(&(Reverse(budget.per_block), budget.id));
        self.budgets_by_owner.remove(&(budget.owner.clone(), budget.id));
    }
}

impl Ledger for MemoryLedger {
    fn global_properties(&self) -> GlobalProperties {
        self.props.clone()
    }

    fn set_global_properties(&mut self, props: GlobalProperties) {
        self.props = props;
    }

    fn create_account(&mut self, account: Account) -> Result<(), QuillError> {
        if self.accounts.contains_key(&account.name) {
            return Err(LedgerError::DuplicateAccount(account.name.to_string()).into());
        }
        self.accounts.insert(account.name.clone(), account);
        Ok(())
    }

    fn find_account(&self, name: &AccountName) -> Option<Account> {
        self.accounts.get(name).cloned()
    }

    fn update_account(&mut self, account: Account) -> Result<(), QuillError> {
        let slot = self
            .accounts
            .get_mut(&account.name)
            .ok_or_else(|| LedgerError::AccountNotFound(account.name.to_string()))?;
        *slot = account;
        Ok(())
    }

    fn account_names(&self) -> Vec<AccountName> {
        self.accounts.keys().cloned().collect()
    }

    fn insert_comment(&mut self, mut comment: Comment) -> Result<CommentId, QuillError> {
        let key = (comment.author.clone(), comment.permlink.clone());
        if self.comments_by_permlink.contains_key(&key) {
            return Err(PolicyError::DuplicatePermlink {
                author: comment.author.to_string(),
                permlink: comment.permlink,
            }
            .into());
        }
        let id = CommentId(self.next_comment_id);
        self.next_comment_id += 1;
        comment.id = id;
        if comment.parent.is_none() {
            comment.root = id;
        }
        self.index_comment(&comment);
        self.comments.insert(id, comment);
        Ok(id)
    }

    fn find_comment(&self, id: CommentId) -> Option<Comment> {
        self.comments.get(&id).cloned()
    }

    fn find_comment_by_permlink(&self, author: &AccountName, permlink: &str) -> Option<Comment> {
        self.comments_by_permlink
            .get(&(author.clone(), permlink.to_string()))
            .and_then(|id| self.comments.get(id))
            .cloned()
    }

    fn update_comment(&mut self, comment: Comment) -> Result<(), QuillError> {
        let old = self
            .comments
            .get(&comment.id)
            .cloned()
            .ok_or(LedgerError::CommentNotFound(comment.id.0))?;
        self.unindex_comment(&old);
        self.index_comment(&comment);
        self.comments.insert(comment.id, comment);
        Ok(())
    }

    fn comments_due(&self, now: Timestamp) -> Vec<CommentId> {
        self.comments_by_cashout
            .range(..=(now, CommentId(u64::MAX)))
            .map(|(_, id)| *id)
            .collect()
    }

    fn find_vote(&self, voter: &AccountName, comment: CommentId) -> Option<Vote> {
        self.votes.get(&(comment, voter.clone())).cloned()
    }

    fn upsert_vote(&mut self, vote: Vote) -> Result<(), QuillError> {
        if !self.comments.contains_key(&vote.comment) {
            return Err(LedgerError::CommentNotFound(vote.comment.0).into());
        }
        let key = (vote.comment, vote.voter.clone());
        if let Some(old) = self.votes.get(&key) {
            self.votes_by_weight
                .remove(&(old.comment, Reverse(old.weight), old.voter.clone()));
        }
        self.votes_by_weight
            .insert((vote.comment, Reverse(vote.weight), vote.voter.clone()));
        self.votes.insert(key, vote);
        Ok(())
    }

    fn comment_votes(&self, comment: CommentId) -> Vec<Vote> {
        let start = (comment, Reverse(u64::MAX), AccountName::default());
        self.votes_by_weight
            .range(start..)
            .take_while(|(c, _, _)| *c == comment)
            .filter_map(|(c, _, voter)| self.votes.get(&(*c, voter.clone())).cloned())
            .collect()
    }

    fn reward_fund(&self) -> Option<RewardFund> {
        self.reward_fund.clone()
    }

    fn set_reward_fund(&mut self, fund: RewardFund) {
        self.reward_fund = Some(fund);
    }

    fn insert_witness(&mut self, mut witness: Witness) -> Result<WitnessId, QuillError> {
        if self.witness_by_owner.contains_key(&witness.owner) {
            return Err(LedgerError::DuplicateWitness(witness.owner.to_string()).into());
        }
        let id = WitnessId(self.next_witness_id);
        self.next_witness_id += 1;
        witness.id = id;
        self.index_witness(&witness);
        self.witnesses.insert(id, witness);
        Ok(id)
    }

    fn find_witness(&self, owner: &AccountName) -> Option<Witness> {
        self.witness_by_owner
            .get(owner)
            .and_then(|id| self.witnesses.get(id))
            .cloned()
    }

    fn update_witness(&mut self, witness: Witness) -> Result<(), QuillError> {
        let old = self
            .witnesses
            .get(&witness.id)
            .cloned()
            .ok_or_else(|| LedgerError::WitnessNotFound(witness.owner.to_string()))?;
        self.unindex_witness(&old);
        self.index_witness(&witness);
        self.witnesses.insert(witness.id, witness);
        Ok(())
    }

    fn witnesses_by_vote(&self) -> Vec<Witness> {
        self.witnesses_by_vote
            .iter()
            .filter_map(|(_, owner)| self.find_witness(owner))
            .collect()
    }

    fn witnesses_by_schedule_time(&self) -> Vec<Witness> {
        self.witnesses_by_schedule
            .iter()
            .filter_map(|(_, id)| self.witnesses.get(id).cloned())
            .collect()
    }

    fn witness_count(&self) -> usize {
        self.witnesses.len()
    }

    fn witness_approvals(&self, account: &AccountName) -> Vec<AccountName> {
        self.approvals
            .range((account.clone(), AccountName::default())..)
            .take_while(|(a, _)| a == account)
            .map(|(_, w)| w.clone())
            .collect()
    }

    fn add_witness_approval(&mut self, account: &AccountName, witness: &AccountName) -> bool {
        self.approvals.insert((account.clone(), witness.clone()))
    }

    fn remove_witness_approval(&mut self, account: &AccountName, witness: &AccountName) -> bool {
        self.approvals.remove(&(account.clone(), witness.clone()))
    }

    fn witness_schedule(&self) -> Option<WitnessSchedule> {
        self.schedule.clone()
    }

    fn set_witness_schedule(&mut self, schedule: WitnessSchedule) {
        self.schedule = Some(schedule);
    }

    fn insert_budget(&mut self, mut budget: Budget) -> BudgetId {
        let id = BudgetId(self.next_budget_id);
        self.next_budget_id += 1;
        budget.id = id;
        self.index_budget(&budget);
        self.budgets.insert(id, budget);
        id
    }

    fn find_budget(&self, id: BudgetId) -> Option<Budget> {
        self.budgets.get(&id).cloned()
    }

    fn update_budget(&mut self, budget: Budget) -> Result<(), QuillError> {
        let old = self
            .budgets
            .get(&budget.id)
            .cloned()
            .ok_or(LedgerError::BudgetNotFound(budget.id.0))?;
        self.unindex_budget(&old);
        self.index_budget(&budget);
        self.budgets.insert(budget.id, budget);
        Ok(())
    }

    fn remove_budget(&mut self, id: BudgetId) -> Result<Budget, QuillError> {
        let budget = self
            .budgets
            .remove(&id)
            .ok_or(LedgerError::BudgetNotFound(id.0))?;
        self.unindex_budget(&budget);
        Ok(budget)
    }

    fn budgets_by_per_block(&self) -> Vec<Budget> {
        self.budgets_by_per_block
            .iter()
            .filter_map(|(_, id)| self.budgets.get(id).cloned())
            .collect()
    }

    fn budgets_by_owner(&self, owner: &BudgetOwner) -> Vec<Budget> {
        self.budgets_by_owner
            .range((owner.clone(), BudgetId(0))..=(owner.clone(), BudgetId(u64::MAX)))
            .filter_map(|(_, id)| self.budgets.get(id).cloned())
            .collect()
    }

    fn budget_owners(&self) -> Vec<BudgetOwner> {
        let mut owners: Vec<BudgetOwner> = Vec::new();
        for (owner, _) in &self.budgets_by_owner {
            if owners.last() != Some(owner) {
                owners.push(owner.clone());
            }
        }
        owners
    }
}

// ---------------------------------------------------------------------------
// Genesis builder
// ---------------------------------------------------------------------------

/// Seeds a [`MemoryLedger`] with accounts, witnesses, approvals, and the
/// reward fund.
///
/// Witness votes are aggregated from approvals, and each witness starts at
/// virtual position 0 with `virtual_scheduled_time = lap / (votes + 1)`.
/// The schedule is recomputed at block 1.
#[derive(Clone, Debug)]
pub struct LedgerBuilder {
    genesis_time: Timestamp,
    curve: RewardCurve,
    reward_balance: u64,
    lap_length: u128,
    accounts: Vec<(AccountName, u64, u64)>,
    witnesses: Vec<(AccountName, SigningKey)>,
    approvals: Vec<(AccountName, AccountName)>,
}

impl LedgerBuilder {
    pub fn new(genesis_time: Timestamp) -> Self {
        Self {
            genesis_time,
            curve: RewardCurve::Linear,
            reward_balance: 0,
            lap_length: crate::constants::VIRTUAL_SCHEDULE_LAP_LENGTH,
            accounts: Vec::new(),
            witnesses: Vec::new(),
            approvals: Vec::new(),
        }
    }

    pub fn reward_curve(mut self, curve: RewardCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Initial balance of the reward fund.
    pub fn reward_balance(mut self, balance: u64) -> Self {
        self.reward_balance = balance;
        self
    }

    pub fn lap_length(mut self, lap: u128) -> Self {
        self.lap_length = lap;
        self
    }

    pub fn account(mut self, name: impl Into<AccountName>, balance: u64, stake: u64) -> Self {
        self.accounts.push((name.into(), balance, stake));
        self
    }

    pub fn witness(mut self, owner: impl Into<AccountName>, key: SigningKey) -> Self {
        self.witnesses.push((owner.into(), key));
        self
    }

    pub fn approve(mut self, account: impl Into<AccountName>, witness: impl Into<AccountName>) -> Self {
        self.approvals.push((account.into(), witness.into()));
        self
    }

    pub fn build(self) -> Result<MemoryLedger, QuillError> {
        let mut ledger = MemoryLedger::default();
        let mut props = GlobalProperties {
            genesis_time: self.genesis_time,
            time: self.genesis_time,
            ..GlobalProperties::default()
        };
        props.total_supply = self.reward_balance;

        for (name, balance, stake) in &self.accounts {
            let account = Account {
                name: name.clone(),
                balance: *balance,
                stake: *stake,
                created: self.genesis_time,
            };
            ledger.create_account(account)?;
            props.total_stake = props
                .total_stake
                .checked_add(*stake)
                .ok_or(crate::error::InvariantError::BalanceOverflow)?;
            props.total_supply = props
                .total_supply
                .checked_add(*balance)
                .and_then(|s| s.checked_add(*stake))
                .ok_or(crate::error::InvariantError::BalanceOverflow)?;
        }

        for (owner, key) in &self.witnesses {
            ledger.get_account(owner)?;
            ledger.insert_witness(Witness::new(owner.clone(), *key, self.genesis_time))?;
        }

        for (account, witness) in &self.approvals {
            let stake = ledger.get_account(account)?.stake;
            let mut record = ledger.get_witness(witness)?;
            if ledger.add_witness_approval(account, witness) {
                record.votes += stake;
                ledger.update_witness(record)?;
            }
        }

        for mut witness in ledger.witnesses_by_vote() {
            witness.virtual_scheduled_time = self.lap_length / (u128::from(witness.votes) + 1);
            ledger.update_witness(witness)?;
        }

        ledger.set_global_properties(props);
        ledger.set_reward_fund(RewardFund {
            curve: self.curve,
            recent_claims: 0,
            activity_reward_balance: self.reward_balance,
            last_update: self.genesis_time,
        });
        ledger.set_witness_schedule(WitnessSchedule {
            next_shuffle_block_num: 1,
            ..WitnessSchedule::default()
        });
        Ok(ledger)
    }
}
