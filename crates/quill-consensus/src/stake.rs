//! Stake changes and witness approvals.
//!
//! Every change to an account's stake flows into the votes of the witnesses
//! it approves. Ordering matters: `total_stake` grows before votes are
//! raised and shrinks only after votes are lowered, so no witness ever
//! holds more votes than the stake in existence.

use tracing::debug;

use quill_core::constants::MAX_WITNESS_VOTES_PER_ACCOUNT;
use quill_core::error::{InvariantError, PolicyError, QuillError};
use quill_core::operations::VirtualOperationSink;
use quill_core::params::ScheduleParams;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, SigningKey, Timestamp, Witness, WitnessId};

use crate::schedule::{adjust_witness_vote, adjust_witness_votes};

fn signed(amount: u64) -> Result<i64, QuillError> {
    i64::try_from(amount).map_err(|_| InvariantError::BalanceOverflow.into())
}

/// Change `account`'s stake by `delta` and propagate it to the witnesses the
/// account approves.
pub fn adjust_stake(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ScheduleParams,
    account: &AccountName,
    delta: i64,
) -> Result<(), QuillError> {
    if delta == 0 {
        return Ok(());
    }
    let mut record = ledger.get_account(account)?;
    let mut props = ledger.global_properties();
    let amount = delta.unsigned_abs();

    if delta > 0 {
        record.stake = record
            .stake
            .checked_add(amount)
            .ok_or(InvariantError::BalanceOverflow)?;
        props.total_stake = props
            .total_stake
            .checked_add(amount)
            .ok_or(InvariantError::BalanceOverflow)?;
        ledger.update_account(record)?;
        ledger.set_global_properties(props);
        adjust_witness_votes(ledger, vops, params, account, delta)?;
    } else {
        let stake = record.stake.checked_sub(amount).ok_or_else(|| InvariantError::NegativeStake {
            account: account.to_string(),
            stake: record.stake,
            delta,
        })?;
        adjust_witness_votes(ledger, vops, params, account, delta)?;
        record.stake = stake;
        props.total_stake = props
            .total_stake
            .checked_sub(amount)
            .ok_or(InvariantError::BalanceOverflow)?;
        ledger.update_account(record)?;
        ledger.set_global_properties(props);
    }
    debug!(account = %account, delta, "adjusted stake");
    Ok(())
}

/// Credit `amount` of new stake to `account`.
pub fn credit_stake(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ScheduleParams,
    account: &AccountName,
    amount: u64,
) -> Result<(), QuillError> {
    adjust_stake(ledger, vops, params, account, signed(amount)?)
}

/// Add or remove `account`'s approval of `witness`, moving the account's
/// stake onto or off the witness's votes.
pub fn approve_witness(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    params: &ScheduleParams,
    account: &AccountName,
    witness: &AccountName,
    approve: bool,
) -> Result<(), QuillError> {
    let stake = ledger.get_account(account)?.stake;
    ledger.get_witness(witness)?;

    if approve {
        if ledger.witness_approvals(account).len() >= MAX_WITNESS_VOTES_PER_ACCOUNT {
            return Err(PolicyError::TooManyWitnessVotes {
                account: account.to_string(),
                limit: MAX_WITNESS_VOTES_PER_ACCOUNT,
            }
            .into());
        }
        if !ledger.add_witness_approval(account, witness) {
            return Err(PolicyError::AlreadyApproved {
                account: account.to_string(),
                witness: witness.to_string(),
            }
            .into());
        }
        adjust_witness_vote(ledger, vops, params, witness, signed(stake)?)?;
    } else {
        if !ledger.remove_witness_approval(account, witness) {
            return Err(PolicyError::NotApproved {
                account: account.to_string(),
                witness: witness.to_string(),
            }
            .into());
        }
        adjust_witness_vote(ledger, vops, params, witness, -signed(stake)?)?;
    }
    Ok(())
}

/// Register `owner` as a witness candidate. It enters the timeshare queue
/// on its first vote adjustment.
pub fn register_witness(
    ledger: &mut dyn Ledger,
    owner: &AccountName,
    signing_key: SigningKey,
    url: &str,
    now: Timestamp,
) -> Result<WitnessId, QuillError> {
    if signing_key.is_empty() {
        return Err(PolicyError::EmptySigningKey.into());
    }
    ledger.get_account(owner)?;
    let mut witness = Witness::new(owner.clone(), signing_key, now);
    witness.url = url.to_string();
    ledger.insert_witness(witness)
}

/// Replace a witness's signing key. An empty key takes the witness out of
/// future schedules without touching its votes.
pub fn set_signing_key(
    ledger: &mut dyn Ledger,
    owner: &AccountName,
    signing_key: SigningKey,
) -> Result<(), QuillError> {
    let mut witness = ledger.get_witness(owner)?;
    witness.signing_key = signing_key;
    ledger.update_witness(witness)
}
