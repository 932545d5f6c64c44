//! Core protocol records: accounts, comments, votes, witnesses, budgets.
//!
//! All monetary values are in units (1 QUILL = 10^9 units) and stored as
//! u64. Vote weight (`rshares`) is signed; claim and virtual-time values are
//! u128 to leave headroom for squared curves and long-running schedules.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{PERCENT_100, TIME_MAX};

/// Unix seconds.
pub type Timestamp = u64;

/// Name of an on-chain account.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(transparent)]
pub struct AccountName(pub String);

impl AccountName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for AccountName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for AccountName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            Default, bincode::Encode, bincode::Decode,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Stable arena identity of a comment.
    CommentId
);
record_id!(
    /// Stable arena identity of a witness; breaks ties in the schedule index.
    WitnessId
);
record_id!(
    /// Stable arena identity of a budget; breaks ties in the per-block index.
    BudgetId
);

/// A 32-byte block signing key. All zeros means "no key": the witness is
/// skipped by the scheduler.
#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(try_from = "String", into = "String")]
pub struct SigningKey(pub [u8; 32]);

impl SigningKey {
    pub const EMPTY: Self = Self([0u8; 32]);

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey({self})")
    }
}

impl FromStr for SigningKey {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for SigningKey {
    type Error = hex::FromHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SigningKey> for String {
    fn from(key: SigningKey) -> Self {
        key.to_string()
    }
}

/// Singleton chain-wide properties, advanced by the host once per block.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct GlobalProperties {
    pub head_block_number: u64,
    /// Time of the head block.
    pub time: Timestamp,
    pub genesis_time: Timestamp,
    /// Absolute slot number of the head block since genesis.
    pub current_aslot: u64,
    /// Witness that produced the head block, if the schedule named one.
    pub current_witness: Option<AccountName>,
    /// Sum of all account stake. Upper bound for any witness's votes.
    pub total_stake: u64,
    pub total_supply: u64,
    /// Supply removed from circulation by closing the fund budget early.
    pub retired_supply: u64,
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Account {
    pub name: AccountName,
    /// Liquid balance.
    pub balance: u64,
    /// Staked balance; counts towards the witnesses this account approves.
    pub stake: u64,
    pub created: Timestamp,
}

impl Account {
    pub fn new(name: impl Into<AccountName>, created: Timestamp) -> Self {
        Self {
            name: name.into(),
            created,
            ..Self::default()
        }
    }
}

/// Share of an author payout routed to another account.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BeneficiaryRoute {
    pub account: AccountName,
    /// Basis points of the author share.
    pub weight: u16,
}

/// A post or reply competing for content rewards.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Comment {
    pub id: CommentId,
    pub author: AccountName,
    pub permlink: String,
    /// `None` for a root post.
    pub parent: Option<CommentId>,
    pub root: CommentId,
    pub depth: u16,
    pub created: Timestamp,
    /// Set once, when the comment is paid.
    pub last_payout: Option<Timestamp>,

    /// Sum of all vote rshares, positive and negative.
    pub net_rshares: i64,
    /// Sum of the absolute value of every vote change.
    pub abs_rshares: u64,
    /// Sum of positive vote rshares.
    pub vote_rshares: u64,
    /// Accumulated `abs_rshares` of paid descendants.
    pub children_abs_rshares: u64,
    /// Accumulated payouts of paid descendants.
    pub children_payout_value: u64,
    /// Maturity deadline; [`TIME_MAX`] once paid.
    pub cashout_time: Timestamp,
    /// Sum of curation weights of all votes.
    pub total_vote_weight: u64,

    pub reward_weight: u16,
    pub max_accepted_payout: u64,
    /// Basis points of the author share paid liquid; the rest is staked.
    pub percent_scr: u16,
    pub allow_votes: bool,
    pub allow_curation_rewards: bool,
    pub beneficiaries: Vec<BeneficiaryRoute>,

    pub author_rewards: u64,
    pub total_payout_value: u64,
    pub curator_payout_value: u64,
    pub beneficiary_payout_value: u64,
}

impl Comment {
    /// A fresh root post with default payout options. The store assigns `id`.
    pub fn new(author: impl Into<AccountName>, permlink: impl Into<String>, created: Timestamp) -> Self {
        Self {
            id: CommentId::default(),
            author: author.into(),
            permlink: permlink.into(),
            parent: None,
            root: CommentId::default(),
            depth: 0,
            created,
            last_payout: None,
            net_rshares: 0,
            abs_rshares: 0,
            vote_rshares: 0,
            children_abs_rshares: 0,
            children_payout_value: 0,
            cashout_time: TIME_MAX,
            total_vote_weight: 0,
            reward_weight: PERCENT_100,
            max_accepted_payout: u64::MAX,
            percent_scr: PERCENT_100,
            allow_votes: true,
            allow_curation_rewards: true,
            beneficiaries: Vec::new(),
            author_rewards: 0,
            total_payout_value: 0,
            curator_payout_value: 0,
            beneficiary_payout_value: 0,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.last_payout.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// The single vote of `voter` on `comment`.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Vote {
    pub voter: AccountName,
    pub comment: CommentId,
    pub rshares: i64,
    /// Curation weight; 0 for negative or changed votes.
    pub weight: u64,
    pub last_update: Timestamp,
    pub num_changes: u32,
}

/// Curve applied to net rshares to obtain a comment's claim weight.
///
/// Fixed when the reward fund is created.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum RewardCurve {
    #[default]
    Linear,
    Quadratic,
    SquareRoot,
}

/// Singleton pool that pays matured comments.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct RewardFund {
    pub curve: RewardCurve,
    /// Decaying sum of the claim weight of recently matured comments.
    pub recent_claims: u128,
    /// Funds available to pay comments.
    pub activity_reward_balance: u64,
    pub last_update: Timestamp,
}

/// How a witness entered the current schedule round.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum WitnessTier {
    #[default]
    None,
    Top,
    Timeshare,
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Witness {
    pub id: WitnessId,
    pub owner: AccountName,
    pub signing_key: SigningKey,
    pub url: String,
    pub created: Timestamp,
    /// Stake of every account approving this witness.
    pub votes: u64,
    pub virtual_position: u128,
    pub virtual_last_update: u128,
    pub virtual_scheduled_time: u128,
    pub schedule: WitnessTier,
}

impl Witness {
    /// A witness with no votes. The store assigns `id`.
    pub fn new(owner: impl Into<AccountName>, signing_key: SigningKey, created: Timestamp) -> Self {
        Self {
            id: WitnessId::default(),
            owner: owner.into(),
            signing_key,
            url: String::new(),
            created,
            votes: 0,
            virtual_position: 0,
            virtual_last_update: 0,
            virtual_scheduled_time: u128::MAX,
            schedule: WitnessTier::None,
        }
    }
}

/// Singleton producer schedule.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct WitnessSchedule {
    pub current_virtual_time: u128,
    /// Block at which the schedule is next recomputed.
    pub next_shuffle_block_num: u64,
    pub current_shuffled_witnesses: Vec<AccountName>,
    pub num_scheduled_witnesses: u8,
}

/// Who funded a budget.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum BudgetOwner {
    /// The protocol-wide reward budget; has no owning account.
    Fund,
    Account(AccountName),
}

impl fmt::Display for BudgetOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fund => f.write_str("<fund>"),
            Self::Account(name) => write!(f, "{name}"),
        }
    }
}

#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Budget {
    pub id: BudgetId,
    pub owner: BudgetOwner,
    pub content_permlink: Option<String>,
    pub created: Timestamp,
    pub deadline: Timestamp,
    pub balance: u64,
    /// Fixed at creation.
    pub per_block: u64,
    pub last_cashout_block: u64,
}

impl Budget {
    pub fn is_fund(&self) -> bool {
        self.owner == BudgetOwner::Fund
    }
}
