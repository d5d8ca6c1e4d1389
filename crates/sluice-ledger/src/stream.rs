// crates/sluice-ledger/src/stream.rs
//
// Per-token linear vesting.
//
// A token's schedule vests `stream_total` uniformly over
// `[stream_start, stream_end)`. Settling moves whatever vested since the last
// settlement into `available_pool` and advances the token's reward-per-share
// accumulator by `delta / total_staked`.
//
// While nobody is staked the schedule is paused: the window slides forward by
// the idle interval, so vesting resumes from where it stopped instead of
// releasing value nobody can claim.
//
// The accumulator is floored; the remainder is carried on the token and
// spread again at the next settlement, so no vested value is stranded.
//
// Starting a new schedule folds the unvested remainder of the current one
// into the new total. Dropping that remainder would silently destroy funds.

use tracing::debug;

use sluice_core::error::SluiceError;
use sluice_core::types::{Amount, Timestamp};

use crate::records::RewardTokenState;
use crate::units::{mul_div_rem, REWARD_PRECISION};

/// Outcome of settling one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settlement {
    /// Newly vested amount moved into the pool.
    pub vested: Amount,
    /// Seconds the window was pushed forward because nobody was staked.
    pub paused_for: Timestamp,
}

/// Amount of the current schedule vested as of `now`, capped at the total.
pub fn vested_at(state: &RewardTokenState, now: Timestamp) -> Result<Amount, SluiceError> {
    if state.stream_total == 0 {
        return Ok(0);
    }
    if now >= state.stream_end || state.stream_end <= state.stream_start {
        return Ok(state.stream_total);
    }
    let elapsed = now.saturating_sub(state.stream_start) as u128;
    let duration = (state.stream_end - state.stream_start) as u128;
    let vested = state
        .stream_total
        .checked_mul(elapsed)
        .ok_or_else(|| SluiceError::overflow("vested amount"))?
        / duration;
    Ok(vested.min(state.stream_total))
}

/// Settle `state` up to `now` given the current total staked.
pub fn settle(
    state: &mut RewardTokenState,
    total_staked: Amount,
    now: Timestamp,
) -> Result<Settlement, SluiceError> {
    if now < state.last_update {
        return Err(SluiceError::InvalidInput(format!(
            "time went backwards for {}: now {} < last update {}",
            state.token, now, state.last_update
        )));
    }

    if total_staked == 0 {
        let idle = if state.stream_total > 0 {
            now - state.last_update
        } else {
            0
        };
        state.stream_start = state.stream_start.saturating_add(idle);
        state.stream_end = state.stream_end.saturating_add(idle);
        state.last_update = now;
        if idle > 0 {
            debug!(token = %state.token, idle, "stream paused, no stakers");
        }
        return Ok(Settlement {
            vested: 0,
            paused_for: idle,
        });
    }

    let mut delta = 0;
    if state.stream_total > 0 {
        let vested = vested_at(state, now)?;
        delta = vested.saturating_sub(state.stream_vested);
        if delta > 0 {
            state.available_pool = state
                .available_pool
                .checked_add(delta)
                .ok_or_else(|| SluiceError::overflow("available pool"))?;
            state.stream_vested = vested;
        }
    }
    distribute(state, delta, total_staked)?;
    state.last_update = now;

    // Fully vested: the schedule is finished.
    if state.stream_total > 0 && state.stream_vested >= state.stream_total {
        state.stream_total = 0;
        state.stream_vested = 0;
    }

    if delta > 0 {
        debug!(token = %state.token, delta, pool = state.available_pool, "stream settled");
    }
    Ok(Settlement {
        vested: delta,
        paused_for: 0,
    })
}

/// Spread `delta` plus the carried remainder over `total_staked` shares.
/// Whatever does not divide evenly stays in `reward_carry`.
fn distribute(
    state: &mut RewardTokenState,
    delta: Amount,
    total_staked: Amount,
) -> Result<(), SluiceError> {
    if delta == 0 && state.reward_carry == 0 {
        return Ok(());
    }
    let (per_share, rem) = mul_div_rem(delta, REWARD_PRECISION, total_staked)?;
    let pending = rem
        .checked_add(state.reward_carry)
        .ok_or_else(|| SluiceError::overflow("reward carry"))?;
    let per_share = per_share
        .checked_add(pending / total_staked)
        .ok_or_else(|| SluiceError::overflow("reward per share"))?;
    state.reward_per_share = state
        .reward_per_share
        .checked_add(per_share)
        .ok_or_else(|| SluiceError::overflow("reward per share"))?;
    state.reward_carry = pending % total_staked;
    Ok(())
}

/// Begin a new schedule of `amount` plus the unvested remainder over
/// `[now, now + window)`. `state` must already be settled at `now`.
///
/// Returns the carried-over remainder.
pub fn restart(
    state: &mut RewardTokenState,
    amount: Amount,
    now: Timestamp,
    window: Timestamp,
) -> Result<Amount, SluiceError> {
    if window == 0 {
        return Err(SluiceError::InvalidInput(format!(
            "stream window for {} must be positive",
            state.token
        )));
    }
    let carried = state.unvested();
    state.stream_total = amount
        .checked_add(carried)
        .ok_or_else(|| SluiceError::overflow("stream total"))?;
    state.stream_vested = 0;
    state.stream_start = now;
    state.stream_end = now
        .checked_add(window)
        .ok_or_else(|| SluiceError::overflow("stream end"))?;
    state.last_update = now;
    Ok(carried)
}
