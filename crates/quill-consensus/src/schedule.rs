//! Stake-weighted virtual-time witness scheduling.
//!
//! Each witness travels a lap of virtual distance at a speed of `votes + 1`
//! units per unit of virtual time. The witness that would finish its lap
//! first is next in line for a timeshare slot, so over many rounds a
//! witness's share of timeshare slots is proportional to its votes.
//!
//! The top-voted witnesses are always scheduled; the remaining slots go to
//! whoever is due first in virtual time.

use std::collections::BTreeSet;

use tracing::{debug, info};

use quill_core::block_task::{BlockTask, BlockTaskContext};
use quill_core::constants::SHUFFLE_MULTIPLIER;
use quill_core::error::{InvariantError, QuillError};
use quill_core::operations::{VirtualOperation, VirtualOperationSink};
use quill_core::params::ScheduleParams;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, GlobalProperties, Timestamp, Witness, WitnessSchedule, WitnessTier};

/// Virtual time at which a witness completes its current lap.
///
/// Saturates to `u128::MAX` when the witness has already overrun the lap or
/// the sum would land before `current_virtual_time`.
///
/// # Examples
///
/// ```
/// use quill_consensus::schedule::next_scheduled_time;
/// // 99 votes travel 100 units per tick; 1000 units remain.
/// assert_eq!(next_scheduled_time(0, 0, 0, 99, 1_000), 10);
/// assert_eq!(next_scheduled_time(0, 0, 2_000, 99, 1_000), u128::MAX);
/// ```
pub fn next_scheduled_time(
    current_virtual_time: u128,
    last_update: u128,
    position: u128,
    votes: u64,
    lap_length: u128,
) -> u128 {
    // A position past the lap has no remaining distance; it takes the same
    // clamp as a time that overflows or falls behind.
    let Some(remaining) = lap_length.checked_sub(position) else {
        return u128::MAX;
    };
    let step = remaining / (u128::from(votes) + 1);
    match last_update.checked_add(step) {
        Some(t) if t >= current_virtual_time => t,
        _ => u128::MAX,
    }
}

/// Change a witness's votes by `delta`, first crediting the virtual distance
/// travelled at the old vote count since its last update.
///
/// Fails if the votes would become negative or exceed the total stake.
pub fn adjust_witness_vote(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ScheduleParams,
    owner: &AccountName,
    delta: i64,
) -> Result<Witness, QuillError> {
    let schedule = ledger
        .witness_schedule()
        .ok_or(InvariantError::MissingWitnessSchedule)?;
    let total_stake = ledger.global_properties().total_stake;
    let mut witness = ledger.get_witness(owner)?;
    let cvt = schedule.current_virtual_time;

    let elapsed = cvt.saturating_sub(witness.virtual_last_update);
    witness.virtual_position = witness
        .virtual_position
        .saturating_add(u128::from(witness.votes).saturating_mul(elapsed));
    witness.virtual_last_update = cvt;

    let votes = if delta < 0 {
        witness.votes.checked_sub(delta.unsigned_abs()).ok_or_else(|| {
            InvariantError::NegativeWitnessVotes {
                witness: owner.to_string(),
                votes: witness.votes,
                delta,
            }
        })?
    } else {
        witness
            .votes
            .checked_add(delta.unsigned_abs())
            .ok_or(InvariantError::BalanceOverflow)?
    };
    if votes > total_stake {
        return Err(InvariantError::WitnessVotesExceedStake {
            witness: owner.to_string(),
            votes,
            total_stake,
        }
        .into());
    }
    witness.votes = votes;
    witness.virtual_scheduled_time = next_scheduled_time(
        cvt,
        witness.virtual_last_update,
        witness.virtual_position,
        witness.votes,
        params.lap_length,
    );

    debug!(
        witness = %owner,
        delta,
        votes = witness.votes,
        scheduled = %witness.virtual_scheduled_time,
        "adjusted witness votes"
    );
    vops.push_virtual_operation(VirtualOperation::WitnessVoteAdjusted {
        witness: owner.clone(),
        delta,
        votes: witness.votes,
        virtual_scheduled_time: witness.virtual_scheduled_time,
    });
    ledger.update_witness(witness.clone())?;
    Ok(witness)
}

/// Apply `delta` to every witness `account` approves, in witness-name order.
pub fn adjust_witness_votes(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ScheduleParams,
    account: &AccountName,
    delta: i64,
) -> Result<(), QuillError> {
    if delta == 0 {
        return Ok(());
    }
    for witness in ledger.witness_approvals(account) {
        adjust_witness_vote(ledger, vops, params, &witness, delta)?;
    }
    Ok(())
}

/// Restart every witness's lap from virtual time zero.
fn reset_virtual_schedule(ledger: &mut dyn Ledger, lap_length: u128) -> Result<(), QuillError> {
    for mut witness in ledger.witnesses_by_schedule_time() {
        witness.virtual_position = 0;
        witness.virtual_last_update = 0;
        witness.virtual_scheduled_time = lap_length / (u128::from(witness.votes) + 1);
        ledger.update_witness(witness)?;
    }
    Ok(())
}

/// Deterministic in-place shuffle seeded from the block time.
pub fn shuffle_witnesses(witnesses: &mut [AccountName], block_time: Timestamp) {
    let now_hi = block_time << 32;
    let n = witnesses.len();
    for i in 0..n {
        let mut k = now_hi.wrapping_add((i as u64).wrapping_mul(SHUFFLE_MULTIPLIER));
        k ^= k >> 12;
        k ^= k << 25;
        k ^= k >> 27;
        k = k.wrapping_mul(SHUFFLE_MULTIPLIER);

        let jmax = (n - i) as u64;
        let j = i + (k % jmax) as usize;
        witnesses.swap(i, j);
    }
}

/// Recompute the producer schedule if `block_num` reached the next shuffle.
///
/// Returns whether the schedule changed.
pub fn update_witness_schedule(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ScheduleParams,
    block_num: u64,
    block_time: Timestamp,
) -> Result<bool, QuillError> {
    let schedule = ledger
        .witness_schedule()
        .ok_or(InvariantError::MissingWitnessSchedule)?;
    if block_num < schedule.next_shuffle_block_num {
        return Ok(false);
    }

    let max_active = params.max_witnesses();
    let mut active: Vec<AccountName> = Vec::with_capacity(max_active);
    let mut selected: BTreeSet<AccountName> = BTreeSet::new();

    for mut witness in ledger.witnesses_by_vote() {
        if active.len() >= params.max_voted_witnesses {
            break;
        }
        if witness.signing_key.is_empty() {
            continue;
        }
        selected.insert(witness.owner.clone());
        active.push(witness.owner.clone());
        if witness.schedule != WitnessTier::Top {
            witness.schedule = WitnessTier::Top;
            ledger.update_witness(witness)?;
        }
    }

    let mut new_virtual_time = schedule.current_virtual_time;
    let mut processed: Vec<AccountName> = Vec::new();
    for mut witness in ledger.witnesses_by_schedule_time() {
        if active.len() >= max_active {
            break;
        }
        new_virtual_time = witness.virtual_scheduled_time;
        processed.push(witness.owner.clone());
        if witness.signing_key.is_empty() || selected.contains(&witness.owner) {
            continue;
        }
        selected.insert(witness.owner.clone());
        active.push(witness.owner.clone());
        witness.schedule = WitnessTier::Timeshare;
        ledger.update_witness(witness)?;
    }

    let mut reset = false;
    for owner in &processed {
        let mut witness = ledger.get_witness(owner)?;
        let step = params.lap_length / (u128::from(witness.votes) + 1);
        let Some(scheduled) = new_virtual_time.checked_add(step) else {
            reset = true;
            break;
        };
        witness.virtual_position = 0;
        witness.virtual_last_update = new_virtual_time;
        witness.virtual_scheduled_time = scheduled;
        ledger.update_witness(witness)?;
    }
    if reset {
        info!(block_num, "virtual time overflow, resetting virtual schedule");
        new_virtual_time = 0;
        reset_virtual_schedule(ledger, params.lap_length)?;
    }

    for mut witness in ledger.witnesses_by_vote() {
        if witness.schedule != WitnessTier::None && !selected.contains(&witness.owner) {
            witness.schedule = WitnessTier::None;
            ledger.update_witness(witness)?;
        }
    }

    let with_keys = ledger
        .witnesses_by_vote()
        .iter()
        .filter(|w| !w.signing_key.is_empty())
        .count();
    let expected = max_active.min(with_keys);
    if active.len() != expected {
        return Err(InvariantError::ScheduleSizeMismatch { expected, got: active.len() }.into());
    }

    active.sort();
    shuffle_witnesses(&mut active, block_time);

    let count = active.len() as u64;
    let updated = WitnessSchedule {
        current_virtual_time: new_virtual_time,
        next_shuffle_block_num: block_num + count.max(1),
        num_scheduled_witnesses: u8::try_from(active.len()).unwrap_or(u8::MAX),
        current_shuffled_witnesses: active.clone(),
    };
    ledger.set_witness_schedule(updated);

    info!(
        block_num,
        witnesses = active.len(),
        virtual_time = %new_virtual_time,
        "witness schedule updated"
    );
    vops.push_virtual_operation(VirtualOperation::WitnessScheduleUpdated {
        block_num,
        witnesses: active,
        current_virtual_time: new_virtual_time,
    });
    Ok(true)
}

/// Block task wrapper around [`update_witness_schedule`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateWitnessSchedule;

impl BlockTask for UpdateWitnessSchedule {
    fn name(&self) -> &'static str {
        "update_witness_schedule"
    }

    fn on_apply(&self, ctx: &mut BlockTaskContext<'_>) -> Result<(), QuillError> {
        let block_num = ctx.block_num();
        let block_time = ctx.block_time();
        let (ledger, vops, params) = ctx.parts();
        update_witness_schedule(ledger, vops, &params.schedule, block_num, block_time)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Time of the `slot`-th slot after the head block. Slot 0 means "no slot".
pub fn slot_time(props: &GlobalProperties, interval: u64, slot: u64) -> Timestamp {
    if slot == 0 {
        return 0;
    }
    let offset = slot.saturating_mul(interval);
    if props.head_block_number == 0 {
        return props.genesis_time.saturating_add(offset);
    }
    let head_slot_time = props.time / interval * interval;
    head_slot_time.saturating_add(offset)
}

/// Slot a block produced at `when` falls into; 0 if `when` is before the
/// first slot after the head block.
pub fn slot_at_time(props: &GlobalProperties, interval: u64, when: Timestamp) -> u64 {
    let first = slot_time(props, interval, 1);
    if when < first {
        return 0;
    }
    (when - first) / interval + 1
}

/// Witness scheduled to produce the `slot`-th slot after the head block.
pub fn scheduled_witness(ledger: &dyn Ledger, slot: u64) -> Option<AccountName> {
    let schedule = ledger.witness_schedule()?;
    let count = schedule.current_shuffled_witnesses.len() as u64;
    if count == 0 {
        return None;
    }
    let aslot = ledger.global_properties().current_aslot.wrapping_add(slot);
    schedule
        .current_shuffled_witnesses
        .get((aslot % count) as usize)
        .cloned()
}
