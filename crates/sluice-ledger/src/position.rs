// crates/sluice-ledger/src/position.rs
//
// Stake positions and the weighted-average stake start time.
//
// A position's voting power is `balance * (now - stake_start_time)`. When a
// position grows, the start time is moved so that previously accumulated
// time-weight is kept and the new amount starts from its own anchor:
//
//   elapsed' = (elapsed_old * balance_old + elapsed_new * added) / (balance_old + added)
//
// When a position shrinks, elapsed time is scaled by the remaining fraction:
//
//   elapsed' = elapsed * remaining / original
//
// Multiplication always happens before division. Dividing first collapses a
// 99.9% withdrawal to zero elapsed time.

use sluice_core::error::SluiceError;
use sluice_core::traits::LedgerStore;
use sluice_core::types::{Address, Amount, Timestamp};

use crate::txn::LedgerTxn;

/// Balance and start time of a position after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionUpdate {
    pub balance: Amount,
    pub stake_start_time: Timestamp,
}

fn elapsed(now: Timestamp, start: Timestamp) -> Result<u128, SluiceError> {
    now.checked_sub(start).map(u128::from).ok_or_else(|| {
        SluiceError::InvalidInput(format!(
            "stake start time {} is after now {}",
            start, now
        ))
    })
}

/// Start time of a position holding `old_balance` anchored at `old_start`
/// after `added` more anchored at `added_start` joins it.
pub fn blend_start_time(
    now: Timestamp,
    old_start: Timestamp,
    old_balance: Amount,
    added: Amount,
    added_start: Timestamp,
) -> Result<Timestamp, SluiceError> {
    let added_elapsed = elapsed(now, added_start)?;
    if old_balance == 0 {
        return Ok(added_start);
    }
    let old_elapsed = elapsed(now, old_start)?;

    let weighted = old_elapsed
        .checked_mul(old_balance)
        .and_then(|w| added_elapsed.checked_mul(added).and_then(|a| w.checked_add(a)))
        .ok_or_else(|| SluiceError::overflow("weighted stake time"))?;
    let total = old_balance
        .checked_add(added)
        .ok_or_else(|| SluiceError::overflow("position balance"))?;

    // new_elapsed <= max(old_elapsed, added_elapsed) <= now, so the
    // conversion back to a timestamp cannot fail
    let new_elapsed = (weighted / total) as Timestamp;
    Ok(now - new_elapsed)
}

/// Start time of a position shrinking from `original` to `remaining`.
/// A fully closed position returns 0.
pub fn shrink_start_time(
    now: Timestamp,
    start: Timestamp,
    original: Amount,
    remaining: Amount,
) -> Result<Timestamp, SluiceError> {
    if remaining == 0 || original == 0 {
        return Ok(0);
    }
    if remaining > original {
        return Err(SluiceError::InvalidInput(format!(
            "remaining balance {} exceeds original {}",
            remaining, original
        )));
    }
    let new_elapsed = elapsed(now, start)?
        .checked_mul(remaining)
        .ok_or_else(|| SluiceError::overflow("scaled stake time"))?
        / original;
    Ok(now - new_elapsed as Timestamp)
}

/// Mint `amount` receipts to `account`; the new amount is anchored at
/// `added_start`.
pub fn credit<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    account: &Address,
    amount: Amount,
    added_start: Timestamp,
    now: Timestamp,
) -> Result<PositionUpdate, SluiceError> {
    let old_balance = txn.receipt_balance(account)?;
    let old_start = txn.stake_start_time(account)?;
    let start = blend_start_time(now, old_start, old_balance, amount, added_start)?;
    let balance = old_balance
        .checked_add(amount)
        .ok_or_else(|| SluiceError::overflow("position balance"))?;
    let supply = txn
        .receipt_supply()?
        .checked_add(amount)
        .ok_or_else(|| SluiceError::overflow("receipt supply"))?;

    txn.set_receipt_balance(account, balance)?;
    txn.set_stake_start_time(account, start)?;
    txn.set_receipt_supply(supply)?;
    Ok(PositionUpdate {
        balance,
        stake_start_time: start,
    })
}

/// Burn `amount` receipts from `account`, scaling its elapsed time.
pub fn debit<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    account: &Address,
    amount: Amount,
    now: Timestamp,
) -> Result<PositionUpdate, SluiceError> {
    let original = txn.receipt_balance(account)?;
    if amount > original {
        return Err(SluiceError::InsufficientBalance(format!(
            "{} holds {} but {} was requested",
            account, original, amount
        )));
    }
    let remaining = original - amount;
    let start = shrink_start_time(now, txn.stake_start_time(account)?, original, remaining)?;
    let supply = txn.receipt_supply()?.checked_sub(amount).ok_or_else(|| {
        SluiceError::PreconditionViolated("receipt supply below a holder's balance".to_string())
    })?;

    txn.set_receipt_balance(account, remaining)?;
    txn.set_stake_start_time(account, start)?;
    txn.set_receipt_supply(supply)?;
    Ok(PositionUpdate {
        balance: remaining,
        stake_start_time: start,
    })
}
