// crates/sluice-ledger/src/claim.rs
//
// Proportional reward claims.
//
// Each token keeps a reward-per-share accumulator that grows by
// `vested_delta / total_staked` on every settlement. An account's share of
// the pool is its balance times the accumulator growth since its last
// checkpoint, plus anything it had already earned. Checkpointing an account
// before its balance changes keeps a new depositor from capturing rewards
// that vested before it arrived, and keeps a leaver's earned share intact.
//
// Per-account shares are floored, so the pool always covers every claim. The
// floored remainders go back into the token's carry and are spread again at
// the next settlement, so dust stays in the pool and stays claimable.

use sluice_core::error::SluiceError;
use sluice_core::traits::LedgerStore;
use sluice_core::types::{Address, Amount};

use crate::records::{RewardCheckpoint, RewardTokenState};
use crate::txn::LedgerTxn;
use crate::units::{mul_div_rem, REWARD_PRECISION};

/// Whole units earned since `checkpoint` and the scaled remainder lost to
/// flooring them.
fn earned_since(
    state: &RewardTokenState,
    checkpoint: &RewardCheckpoint,
    balance: Amount,
) -> Result<(Amount, u128), SluiceError> {
    let growth = state
        .reward_per_share
        .saturating_sub(checkpoint.paid_per_share);
    if growth == 0 || balance == 0 {
        return Ok((0, 0));
    }
    mul_div_rem(balance, growth, REWARD_PRECISION)
}

/// Amount of `state`'s token owed to an account holding `balance`.
pub fn pending(
    state: &RewardTokenState,
    checkpoint: &RewardCheckpoint,
    balance: Amount,
) -> Result<Amount, SluiceError> {
    let (earned, _) = earned_since(state, checkpoint, balance)?;
    checkpoint
        .accrued
        .checked_add(earned)
        .ok_or_else(|| SluiceError::overflow("accrued rewards"))
}

/// Fold everything earned since the account's checkpoint into `accrued`
/// and move the floored remainder back into the token's carry.
fn materialize<S: LedgerStore>(
    txn: &LedgerTxn<'_, S>,
    state: &mut RewardTokenState,
    account: &Address,
    balance: Amount,
) -> Result<(RewardCheckpoint, bool), SluiceError> {
    let mut cp = txn.checkpoint(account, &state.token)?;
    if cp.paid_per_share == state.reward_per_share {
        return Ok((cp, false));
    }
    let (earned, lost) = earned_since(state, &cp, balance)?;
    cp.accrued = cp
        .accrued
        .checked_add(earned)
        .ok_or_else(|| SluiceError::overflow("accrued rewards"))?;
    cp.paid_per_share = state.reward_per_share;
    state.reward_carry = state
        .reward_carry
        .checked_add(lost)
        .ok_or_else(|| SluiceError::overflow("reward carry"))?;
    Ok((cp, true))
}

/// Record everything `account` has earned so far on every token in
/// `tokens`. Tokens must already be settled; call before the account's
/// balance changes. Touched token records are staged as well.
pub fn checkpoint_account<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    tokens: &mut [RewardTokenState],
    account: &Address,
    balance: Amount,
) -> Result<(), SluiceError> {
    for state in tokens.iter_mut() {
        let (cp, changed) = materialize(txn, state, account, balance)?;
        if changed {
            txn.put_checkpoint(&cp)?;
            txn.put_token(state)?;
        }
    }
    Ok(())
}

/// Take everything `account` is owed on `state`'s token out of the pool.
/// A sole staker also collects whole units left in the carry, which no
/// other account can ever be owed. The caller persists `state` afterwards.
pub fn take<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    state: &mut RewardTokenState,
    account: &Address,
    balance: Amount,
    total_staked: Amount,
) -> Result<Amount, SluiceError> {
    let (mut cp, changed) = materialize(txn, state, account, balance)?;
    let mut owed = cp.accrued;
    if balance > 0 && balance == total_staked {
        let swept = state.reward_carry / REWARD_PRECISION;
        state.reward_carry -= swept * REWARD_PRECISION;
        owed = owed
            .checked_add(swept)
            .ok_or_else(|| SluiceError::overflow("claimed rewards"))?;
    }
    if owed > state.available_pool {
        return Err(SluiceError::InsufficientBalance(format!(
            "{} owed {} of {} but the pool holds {}",
            account, owed, state.token, state.available_pool
        )));
    }
    state.available_pool -= owed;

    if changed || cp.accrued > 0 {
        cp.accrued = 0;
        txn.put_checkpoint(&cp)?;
    }
    Ok(owed)
}

/// Book `amount` of `account`'s entitlement as already paid without
/// moving tokens. Used when a payout could not be taken back.
pub fn forfeit<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    state: &mut RewardTokenState,
    account: &Address,
    balance: Amount,
    total_staked: Amount,
    amount: Amount,
) -> Result<(), SluiceError> {
    let owed = take(txn, state, account, balance, total_staked)?;
    if amount > owed {
        return Err(SluiceError::InsufficientBalance(format!(
            "cannot book {} of {} as paid: {} is owed {}",
            amount, state.token, account, owed
        )));
    }
    let rest = owed - amount;
    if rest > 0 {
        state.available_pool += rest;
        let mut cp = txn.checkpoint(account, &state.token)?;
        cp.accrued = rest;
        txn.put_checkpoint(&cp)?;
    }
    Ok(())
}
