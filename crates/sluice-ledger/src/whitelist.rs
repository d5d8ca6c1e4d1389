// crates/sluice-ledger/src/whitelist.rs
//
// Reward token admission.
//
// Only admitted tokens take part in streaming. Admission is limited to the
// token authority and to `max_reward_tokens` records, which keeps dust tokens
// from exhausting bookkeeping slots. The underlying is admitted when the
// ledger is created and can never be revoked.
//
// Lifecycle:
//   admit -> (accrue/settle/claim)* -> drained -> revoke -> cleanup
//                                                   \-> admit (clean slate)

use tracing::info;

use sluice_core::error::SluiceError;
use sluice_core::events::LedgerEvent;
use sluice_core::traits::LedgerStore;
use sluice_core::types::{Address, Amount, Timestamp, TokenId};

use crate::config::LedgerConfig;
use crate::records::RewardTokenState;
use crate::stream;
use crate::txn::LedgerTxn;

fn require_token_authority(config: &LedgerConfig, caller: &Address) -> Result<(), SluiceError> {
    if *caller != config.token_authority {
        return Err(SluiceError::Unauthorized(format!(
            "{} is not the token authority",
            caller
        )));
    }
    Ok(())
}

/// Fail with `NotAdmitted` unless the token is tracked and whitelisted.
pub fn require_whitelisted(state: &RewardTokenState) -> Result<(), SluiceError> {
    if !state.exists || !state.whitelisted {
        return Err(SluiceError::NotAdmitted(format!(
            "token {} is not whitelisted",
            state.token
        )));
    }
    Ok(())
}

/// Create the underlying token record if it does not exist yet.
/// Returns true when a record was created.
pub fn ensure_underlying<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    config: &LedgerConfig,
) -> Result<bool, SluiceError> {
    match txn.token(&config.underlying)? {
        Some(state) if state.whitelisted => Ok(false),
        Some(mut state) => {
            // A store written under different settings; the underlying is
            // always admitted.
            state.whitelisted = true;
            txn.put_token(&state)?;
            Ok(true)
        }
        None => {
            txn.put_token(&RewardTokenState::admitted(config.underlying, 0))?;
            Ok(true)
        }
    }
}

/// Admit `token` to the reward streams.
pub fn admit<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    config: &LedgerConfig,
    caller: &Address,
    token: &TokenId,
    now: Timestamp,
) -> Result<RewardTokenState, SluiceError> {
    require_token_authority(config, caller)?;
    if token.is_zero() {
        return Err(SluiceError::InvalidInput(
            "cannot admit the zero token id".to_string(),
        ));
    }

    let state = match txn.token(token)? {
        Some(existing) if existing.whitelisted => {
            return Err(SluiceError::PreconditionViolated(format!(
                "token {} is already admitted",
                token
            )));
        }
        Some(existing) => {
            if !existing.is_drained() {
                return Err(SluiceError::PreconditionViolated(format!(
                    "token {} still holds pool {} and stream {}",
                    token, existing.available_pool, existing.stream_total
                )));
            }
            if now < existing.last_update {
                return Err(SluiceError::InvalidInput(format!(
                    "time went backwards for {}",
                    token
                )));
            }
            // Clean slate; the accumulator is kept so that existing account
            // checkpoints stay consistent with it.
            let mut fresh = RewardTokenState::admitted(*token, now);
            fresh.reward_per_share = existing.reward_per_share;
            fresh.reward_carry = existing.reward_carry;
            fresh
        }
        None => {
            let tracked = txn.tokens()?.len();
            if tracked >= config.max_reward_tokens {
                return Err(SluiceError::PreconditionViolated(format!(
                    "all {} reward token slots are in use",
                    config.max_reward_tokens
                )));
            }
            RewardTokenState::admitted(*token, now)
        }
    };

    txn.put_token(&state)?;
    txn.emit(LedgerEvent::TokenAdmitted { token: *token });
    info!(token = %token, "reward token admitted");
    Ok(state)
}

/// Withdraw `token` from the reward streams. Requires a settled, fully
/// claimed token.
pub fn revoke<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    config: &LedgerConfig,
    caller: &Address,
    token: &TokenId,
    total_staked: Amount,
    now: Timestamp,
) -> Result<(), SluiceError> {
    require_token_authority(config, caller)?;
    if *token == config.underlying {
        return Err(SluiceError::PreconditionViolated(
            "the underlying token cannot be revoked".to_string(),
        ));
    }

    let mut state = txn.require_token(token)?;
    if !state.whitelisted {
        return Err(SluiceError::PreconditionViolated(format!(
            "token {} is already revoked",
            token
        )));
    }
    stream::settle(&mut state, total_staked, now)?;
    if !state.is_drained() {
        return Err(SluiceError::PreconditionViolated(format!(
            "token {} still holds pool {} and stream {}",
            token, state.available_pool, state.stream_total
        )));
    }

    state.whitelisted = false;
    txn.put_token(&state)?;
    txn.emit(LedgerEvent::TokenRevoked { token: *token });
    info!(token = %token, "reward token revoked");
    Ok(())
}

/// Delete the bookkeeping of a revoked, drained token and free its slot.
/// Returns how many account checkpoints were dropped.
pub fn cleanup<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    token: &TokenId,
) -> Result<usize, SluiceError> {
    let state = txn.require_token(token)?;
    if state.whitelisted {
        return Err(SluiceError::PreconditionViolated(format!(
            "token {} must be revoked before cleanup",
            token
        )));
    }
    if !state.is_drained() {
        return Err(SluiceError::PreconditionViolated(format!(
            "token {} still holds pool {} and stream {}",
            token, state.available_pool, state.stream_total
        )));
    }

    txn.remove_token(token);
    let dropped = txn.remove_checkpoints(token)?;
    txn.emit(LedgerEvent::TokenCleanedUp { token: *token });
    info!(token = %token, checkpoints = dropped, "reward token cleaned up");
    Ok(dropped)
}
