//! # quill-consensus — Witness scheduling and stake-weighted voting.
//!
//! Witnesses are elected by the stake of the accounts approving them. Each
//! round the top-voted witnesses are scheduled outright and the remaining
//! slots are shared by virtual time, proportionally to votes.

pub mod schedule;
pub mod stake;

pub use schedule::{
    adjust_witness_vote, adjust_witness_votes, scheduled_witness, update_witness_schedule,
    UpdateWitnessSchedule,
};
pub use stake::{adjust_stake, approve_witness, credit_stake, register_witness};
