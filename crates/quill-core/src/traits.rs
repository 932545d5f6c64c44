//! Trait interfaces for the Quill protocol.
//!
//! - [`Ledger`]: typed read/write access to chain records (quill-core's
//!   [`MemoryLedger`](crate::ledger::MemoryLedger) implements it)
//! - [`BlockTask`](crate::block_task::BlockTask): one per-block state
//!   transition, run by the pipeline in quill-node
//!
//! Records are read out by value and written back whole. Every write keeps
//! the secondary indices of the record consistent with its new contents.

use crate::error::{LedgerError, QuillError};
use crate::types::{
    Account, AccountName, Budget, BudgetId, BudgetOwner, Comment, CommentId, GlobalProperties,
    RewardFund, Timestamp, Vote, Witness, WitnessId, WitnessSchedule,
};

/// Typed access to the versioned chain state.
///
/// Ordered listings are part of the contract: every implementation must
/// return them in the documented order so that all nodes visit records
/// identically.
pub trait Ledger: Send + Sync {
    // ------------------------------------------------------------------
    // Global properties
    // ------------------------------------------------------------------

    fn global_properties(&self) -> GlobalProperties;

    fn set_global_properties(&mut self, props: GlobalProperties);

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    /// Insert a new account. Fails if the name is taken.
    fn create_account(&mut self, account: Account) -> Result<(), QuillError>;

    fn find_account(&self, name: &AccountName) -> Option<Account>;

    /// Like [`find_account`](Self::find_account) but a missing account is an error.
    fn get_account(&self, name: &AccountName) -> Result<Account, QuillError> {
        self.find_account(name)
            .ok_or_else(|| LedgerError::AccountNotFound(name.to_string()).into())
    }

    fn update_account(&mut self, account: Account) -> Result<(), QuillError>;

    /// All account names in ascending order.
    fn account_names(&self) -> Vec<AccountName>;

    // ------------------------------------------------------------------
    // Comments and votes
    // ------------------------------------------------------------------

    /// Insert a comment and return its assigned id. A root comment becomes
    /// its own root.
    fn insert_comment(&mut self, comment: Comment) -> Result<CommentId, QuillError>;

    fn find_comment(&self, id: CommentId) -> Option<Comment>;

    fn get_comment(&self, id: CommentId) -> Result<Comment, QuillError> {
        self.find_comment(id)
            .ok_or_else(|| LedgerError::CommentNotFound(id.0).into())
    }

    fn find_comment_by_permlink(&self, author: &AccountName, permlink: &str) -> Option<Comment>;

    fn update_comment(&mut self, comment: Comment) -> Result<(), QuillError>;

    /// Ids of comments with `cashout_time <= now`, ordered by
    /// `(cashout_time, id)`.
    fn comments_due(&self, now: Timestamp) -> Vec<CommentId>;

    fn find_vote(&self, voter: &AccountName, comment: CommentId) -> Option<Vote>;

    /// Insert or replace the vote of `vote.voter` on `vote.comment`.
    fn upsert_vote(&mut self, vote: Vote) -> Result<(), QuillError>;

    /// Votes on a comment ordered by curation weight descending, then voter
    /// ascending.
    fn comment_votes(&self, comment: CommentId) -> Vec<Vote>;

    // ------------------------------------------------------------------
    // Reward fund
    // ------------------------------------------------------------------

    fn reward_fund(&self) -> Option<RewardFund>;

    fn set_reward_fund(&mut self, fund: RewardFund);

    // ------------------------------------------------------------------
    // Witnesses
    // ------------------------------------------------------------------

    /// Insert a witness and return its assigned id. Fails if the owner
    /// already runs one.
    fn insert_witness(&mut self, witness: Witness) -> Result<WitnessId, QuillError>;

    fn find_witness(&self, owner: &AccountName) -> Option<Witness>;

    fn get_witness(&self, owner: &AccountName) -> Result<Witness, QuillError> {
        self.find_witness(owner)
            .ok_or_else(|| LedgerError::WitnessNotFound(owner.to_string()).into())
    }

    fn update_witness(&mut self, witness: Witness) -> Result<(), QuillError>;

    /// All witnesses ordered by votes descending, then owner ascending.
    fn witnesses_by_vote(&self) -> Vec<Witness>;

    /// All witnesses ordered by `virtual_scheduled_time` ascending, then id
    /// ascending.
    fn witnesses_by_schedule_time(&self) -> Vec<Witness>;

    fn witness_count(&self) -> usize;

    /// Witnesses approved by `account`, in owner-name order.
    fn witness_approvals(&self, account: &AccountName) -> Vec<AccountName>;

    /// Record an approval. Returns `false` if it already existed.
    fn add_witness_approval(&mut self, account: &AccountName, witness: &AccountName) -> bool;

    /// Remove an approval. Returns `false` if there was none.
    fn remove_witness_approval(&mut self, account: &AccountName, witness: &AccountName) -> bool;

    fn witness_schedule(&self) -> Option<WitnessSchedule>;

    fn set_witness_schedule(&mut self, schedule: WitnessSchedule);

    // ------------------------------------------------------------------
    // Budgets
    // ------------------------------------------------------------------

    /// Insert a budget and return its assigned id.
    fn insert_budget(&mut self, budget: Budget) -> BudgetId;

    fn find_budget(&self, id: BudgetId) -> Option<Budget>;

    fn get_budget(&self, id: BudgetId) -> Result<Budget, QuillError> {
        self.find_budget(id)
            .ok_or_else(|| LedgerError::BudgetNotFound(id.0).into())
    }

    fn update_budget(&mut self, budget: Budget) -> Result<(), QuillError>;

    fn remove_budget(&mut self, id: BudgetId) -> Result<Budget, QuillError>;

    /// All budgets ordered by `per_block` descending, then id ascending.
    fn budgets_by_per_block(&self) -> Vec<Budget>;

    /// Budgets of one owner in id order.
    fn budgets_by_owner(&self, owner: &BudgetOwner) -> Vec<Budget>;

    /// Distinct owners with at least one budget, ascending.
    fn budget_owners(&self) -> Vec<BudgetOwner>;

    /// The fund budget, if one is open.
    ///
    /// Default implementation scans [`budgets_by_owner`](Self::budgets_by_owner).
    fn fund_budget(&self) -> Option<Budget> {
        self.budgets_by_owner(&BudgetOwner::Fund).into_iter().next()
    }
}
