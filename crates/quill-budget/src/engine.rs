//! Budget lifecycle: creation, per-block allocation, and closing.
//!
//! A budget pays out a constant `per_block` amount fixed at creation. It
//! closes when its balance runs out or its deadline is reached, whichever
//! comes first. Whatever is left at closing goes back to the owner, or is
//! retired from supply for the fund budget.

use tracing::{debug, warn};

use quill_core::error::{InvariantError, PolicyError, QuillError};
use quill_core::operations::{VirtualOperation, VirtualOperationSink};
use quill_core::params::ChainParams;
use quill_core::traits::Ledger;
use quill_core::types::{AccountName, Budget, BudgetId, BudgetOwner, Timestamp};

/// Constant per-block withdrawal for `balance` spread from `start` to
/// `deadline`. Never zero.
///
/// # Examples
///
/// ```
/// use quill_budget::engine::per_block_amount;
/// // 10 blocks of 3 seconds.
/// assert_eq!(per_block_amount(1_000, 0, 30, 3), 100);
/// // More blocks than units: one unit per block.
/// assert_eq!(per_block_amount(5, 0, 30, 3), 1);
/// ```
pub fn per_block_amount(balance: u64, start: Timestamp, deadline: Timestamp, interval: u64) -> u64 {
    let duration = deadline.saturating_sub(start);
    let blocks = (duration / interval.max(1)).max(1);
    (balance / blocks).max(1)
}

fn check_terms(balance: u64, start: Timestamp, deadline: Timestamp) -> Result<(), QuillError> {
    if deadline <= start {
        return Err(PolicyError::NonPositiveDuration { start, deadline }.into());
    }
    if balance == 0 {
        return Err(PolicyError::ZeroBalance.into());
    }
    Ok(())
}

/// Open a budget funded from `owner`'s liquid balance.
pub fn create_budget(
    ledger: &mut dyn Ledger,
    params: &ChainParams,
    owner: &AccountName,
    content_permlink: Option<String>,
    balance: u64,
    deadline: Timestamp,
    now: Timestamp,
) -> Result<BudgetId, QuillError> {
    check_terms(balance, now, deadline)?;
    let mut account = ledger.get_account(owner)?;
    if account.balance < balance {
        return Err(PolicyError::InsufficientFunds { have: account.balance, need: balance }.into());
    }
    let budget_owner = BudgetOwner::Account(owner.clone());
    let limit = params.budget.max_budgets_per_owner;
    if ledger.budgets_by_owner(&budget_owner).len() >= limit {
        return Err(PolicyError::BudgetLimitReached { owner: owner.to_string(), limit }.into());
    }

    account.balance -= balance;
    ledger.update_account(account)?;
    let id = ledger.insert_budget(Budget {
        id: BudgetId::default(),
        owner: budget_owner,
        content_permlink,
        created: now,
        deadline,
        balance,
        per_block: per_block_amount(balance, now, deadline, params.block_interval_secs),
        last_cashout_block: 0,
    });
    debug!(owner = %owner, budget = %id, balance, deadline, "budget created");
    Ok(id)
}

/// Open the protocol-wide fund budget. Its balance is newly issued supply.
pub fn create_fund_budget(
    ledger: &mut dyn Ledger,
    params: &ChainParams,
    balance: u64,
    deadline: Timestamp,
    now: Timestamp,
) -> Result<BudgetId, QuillError> {
    if ledger.fund_budget().is_some() {
        return Err(PolicyError::FundBudgetExists.into());
    }
    check_terms(balance, now, deadline)?;

    let mut props = ledger.global_properties();
    props.total_supply = props
        .total_supply
        .checked_add(balance)
        .ok_or(InvariantError::BalanceOverflow)?;
    ledger.set_global_properties(props);

    let id = ledger.insert_budget(Budget {
        id: BudgetId::default(),
        owner: BudgetOwner::Fund,
        content_permlink: None,
        created: now,
        deadline,
        balance,
        per_block: per_block_amount(balance, now, deadline, params.block_interval_secs),
        last_cashout_block: 0,
    });
    debug!(budget = %id, balance, deadline, "fund budget created");
    Ok(id)
}

/// Remove `budget` and settle its remaining balance.
fn finish_budget(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    budget: Budget,
) -> Result<(), QuillError> {
    ledger.remove_budget(budget.id)?;
    let remainder = budget.balance;
    let (refunded, retired) = match &budget.owner {
        BudgetOwner::Fund => {
            let mut props = ledger.global_properties();
            props.total_supply = props.total_supply.saturating_sub(remainder);
            props.retired_supply = props
                .retired_supply
                .checked_add(remainder)
                .ok_or(InvariantError::BalanceOverflow)?;
            ledger.set_global_properties(props);
            (0, remainder)
        }
        BudgetOwner::Account(name) => {
            let mut account = ledger.get_account(name)?;
            account.balance = account
                .balance
                .checked_add(remainder)
                .ok_or(InvariantError::BalanceOverflow)?;
            ledger.update_account(account)?;
            (remainder, 0)
        }
    };
    debug!(budget = %budget.id, owner = %budget.owner, refunded, retired, "budget closed");
    vops.push_virtual_operation(VirtualOperation::BudgetClosed {
        budget: budget.id,
        owner: budget.owner,
        refunded,
        retired,
    });
    Ok(())
}

/// Withdraw this block's share from a budget.
///
/// Returns 0 for an unknown budget or one already visited at `block_num`.
/// A budget whose deadline has passed closes without paying; one whose
/// deadline is reached pays out everything that is left.
pub fn allocate_cash(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    id: BudgetId,
    block_num: u64,
    now: Timestamp,
) -> Result<u64, QuillError> {
    let Some(mut budget) = ledger.find_budget(id) else {
        return Ok(0);
    };
    if budget.last_cashout_block == block_num {
        return Ok(0);
    }
    if now > budget.deadline {
        warn!(budget = %id, deadline = budget.deadline, now, "budget missed its deadline");
        finish_budget(ledger, vops, budget)?;
        return Ok(0);
    }

    let cash = if now >= budget.deadline {
        budget.balance
    } else {
        budget.per_block.min(budget.balance)
    };
    budget.balance -= cash;
    budget.last_cashout_block = block_num;
    if cash > 0 {
        vops.push_virtual_operation(VirtualOperation::BudgetWithdrawal {
            budget: id,
            owner: budget.owner.clone(),
            amount: cash,
        });
    }

    if budget.balance == 0 || now >= budget.deadline {
        finish_budget(ledger, vops, budget)?;
    } else {
        ledger.update_budget(budget)?;
    }
    Ok(cash)
}

/// Close an account budget early at its owner's request.
pub fn close_budget(
    ledger: &mut dyn Ledger,
    vops: &mut dyn VirtualOperationSink,
    id: BudgetId,
    requester: &AccountName,
) -> Result<(), QuillError> {
    let budget = ledger.get_budget(id)?;
    match &budget.owner {
        BudgetOwner::Fund => Err(PolicyError::FundBudgetNotClosable.into()),
        BudgetOwner::Account(owner) if owner != requester => Err(PolicyError::NotBudgetOwner {
            account: requester.to_string(),
            budget: id.0,
        }
        .into()),
        BudgetOwner::Account(_) => finish_budget(ledger, vops, budget),
    }
}
