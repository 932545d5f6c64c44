//! # quill-rewards — Content reward distribution engine.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! - **Claims**: matured comments convert net rshares into claim weight via
//!   the fund's reward curve; the fund's `recent_claims` decays linearly.
//! - **Payout**: each comment receives its claim's share of the fund
//!   balance, zeroed below the dust floor and capped by the author's limit.
//! - **Split**: curators, then beneficiaries, then the author (liquid and
//!   stake).
//! - **Propagation**: ancestors accumulate their replies' rshares and
//!   payouts.

pub mod cashout;
pub mod claims;
pub mod content;
pub mod curve;
pub mod payout;

pub use cashout::{process_comments_cashout, ProcessCommentsCashout};
pub use content::{cast_vote, post_comment, CommentOptions};
pub use curve::evaluate_reward_curve;
pub use payout::{rshare_reward, split_payout, CommentRewardContext};
