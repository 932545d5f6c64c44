//! Error types for the Quill protocol.
//!
//! - [`InvariantError`]: a protocol invariant failed; fatal to the current block.
//! - [`PolicyError`]: an operation was deliberately rejected; never fatal.
//! - [`LedgerError`]: a record lookup or insertion failed in the store.
//! - [`ParamsError`]: chain parameters were rejected before any block ran.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("block number must be greater than zero")] ZeroBlockNumber,
    #[error("reward fund does not exist")] MissingRewardFund,
    #[error("witness schedule does not exist")] MissingWitnessSchedule,
    #[error("witness {witness} votes {votes} exceed total stake {total_stake}")] WitnessVotesExceedStake { witness: String, votes: u64, total_stake: u64 },
    #[error("witness {witness} votes would become negative: {votes} + ({delta})")] NegativeWitnessVotes { witness: String, votes: u64, delta: i64 },
    #[error("stake of {account} would become negative: {stake} + ({delta})")] NegativeStake { account: String, stake: u64, delta: i64 },
    #[error("total claims are zero while paying a positive claim")] ZeroTotalClaims,
    #[error("reward fund balance {have} cannot cover payouts of {need}")] InsufficientRewardBalance { have: u64, need: u64 },
    #[error("scheduled {got} witnesses, expected {expected}")] ScheduleSizeMismatch { expected: usize, got: usize },
    #[error("beneficiary weights sum to {0} basis points")] BeneficiaryWeightOverflow(u32),
    #[error("{name} of {value} basis points exceeds 100%")] PercentOutOfRange { name: &'static str, value: u16 },
    #[error("balance overflow")] BalanceOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("budget deadline {deadline} is not after its start {start}")] NonPositiveDuration { start: u64, deadline: u64 },
    #[error("budget balance must be positive")] ZeroBalance,
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("{owner} already owns {limit} budgets")] BudgetLimitReached { owner: String, limit: usize },
    #[error("fund budget already exists")] FundBudgetExists,
    #[error("the fund budget cannot be closed explicitly")] FundBudgetNotClosable,
    #[error("{account} does not own budget {budget}")] NotBudgetOwner { account: String, budget: u64 },
    #[error("voting is closed on {author}/{permlink}")] VotingClosed { author: String, permlink: String },
    #[error("permlink already used: {author}/{permlink}")] DuplicatePermlink { author: String, permlink: String },
    #[error("maximum comment depth reached")] MaxDepthReached,
    #[error("beneficiary weights exceed 100%: {0}")] BeneficiaryWeightsTooLarge(u32),
    #[error("duplicate beneficiary: {0}")] DuplicateBeneficiary(String),
    #[error("percentage {0} exceeds 100%")] InvalidPercent(u16),
    #[error("witness signing key must not be empty")] EmptySigningKey,
    #[error("{account} already approves {limit} witnesses")] TooManyWitnessVotes { account: String, limit: usize },
    #[error("{account} already approves {witness}")] AlreadyApproved { account: String, witness: String },
    #[error("{account} does not approve {witness}")] NotApproved { account: String, witness: String },
    #[error("block time {time} is not after head block time {head}")] BlockTimeNotAfterHead { time: u64, head: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account not found: {0}")] AccountNotFound(String),
    #[error("comment not found: {0}")] CommentNotFound(u64),
    #[error("witness not found: {0}")] WitnessNotFound(String),
    #[error("budget not found: {0}")] BudgetNotFound(u64),
    #[error("vote not found: {voter} on comment {comment}")] VoteNotFound { voter: String, comment: u64 },
    #[error("account already exists: {0}")] DuplicateAccount(String),
    #[error("witness already exists: {0}")] DuplicateWitness(String),
    #[error("state encoding failed: {0}")] Encoding(String),
}

/// A [`ChainParams`](crate::params::ChainParams) value the engines cannot run with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("{0} must be positive")] NotPositive(&'static str),
    #[error("{name} of {value} basis points exceeds 100%")] PercentOutOfRange { name: &'static str, value: u16 },
    #[error("schedule must select between 1 and 255 witnesses, got {0}")] WitnessCount(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuillError {
    #[error(transparent)] Invariant(#[from] InvariantError),
    #[error(transparent)] Policy(#[from] PolicyError),
    #[error(transparent)] Ledger(#[from] LedgerError),
}

impl QuillError {
    /// Whether this error must reject the block it occurred in.
    ///
    /// Policy rejections are scoped to a single operation; everything else
    /// means the ledger reached a state the protocol forbids.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Policy(_))
    }
}
