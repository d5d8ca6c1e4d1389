// crates/sluice-ledger/src/records.rs
//
// Persisted ledger records.
//
// A position's size is never stored next to its stake start time: the
// receipt holding is the only record of how much an account has staked, and
// the sum of all receipt holdings is the receipt supply (= total staked).

use serde::{Deserialize, Serialize};

use sluice_core::types::{Address, Amount, Timestamp, TokenId};

/// Stake start time of an account. Absent (or 0) means no active position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub account: Address,
    pub stake_start_time: Timestamp,
}

/// Receipt holding of an account. This is the authoritative stake balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptHolding {
    pub account: Address,
    pub balance: Amount,
}

/// Read-only view of an account's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPosition {
    pub account: Address,
    pub balance: Amount,
    pub stake_start_time: Timestamp,
}

impl AccountPosition {
    pub fn is_active(&self) -> bool {
        self.balance > 0 && self.stake_start_time > 0
    }
}

/// Admission flags and vesting schedule of one reward token.
///
/// Every token owns its own record; no two tokens share a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTokenState {
    pub token: TokenId,
    pub exists: bool,
    pub whitelisted: bool,
    /// Vested amount not yet paid out.
    pub available_pool: Amount,
    /// Total of the current schedule. Zero once fully vested.
    pub stream_total: Amount,
    /// Portion of `stream_total` already moved into `available_pool`.
    pub stream_vested: Amount,
    pub stream_start: Timestamp,
    pub stream_end: Timestamp,
    pub last_update: Timestamp,
    /// Cumulative vested amount per staked base unit, scaled by
    /// `REWARD_PRECISION`. Monotonic for the lifetime of the record.
    pub reward_per_share: u128,
    /// Vested value not yet assigned to any share, scaled by
    /// `REWARD_PRECISION`. Holds division remainders until the next
    /// settlement spreads them again; always covered by `available_pool`.
    #[serde(default)]
    pub reward_carry: u128,
}

impl RewardTokenState {
    /// A freshly admitted token with an empty schedule anchored at `now`.
    pub fn admitted(token: TokenId, now: Timestamp) -> Self {
        Self {
            token,
            exists: true,
            whitelisted: true,
            available_pool: 0,
            stream_total: 0,
            stream_vested: 0,
            stream_start: now,
            stream_end: now,
            last_update: now,
            reward_per_share: 0,
            reward_carry: 0,
        }
    }

    /// Amount of the current schedule that has not vested yet.
    pub fn unvested(&self) -> Amount {
        self.stream_total.saturating_sub(self.stream_vested)
    }

    /// Nothing left to vest and nothing left to claim.
    pub fn is_drained(&self) -> bool {
        self.available_pool == 0 && self.stream_total == 0
    }
}

/// Per-account reward bookkeeping for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCheckpoint {
    pub account: Address,
    pub token: TokenId,
    /// Token `reward_per_share` at the last checkpoint.
    pub paid_per_share: u128,
    /// Rewards earned up to the last checkpoint and not yet claimed.
    pub accrued: Amount,
}

impl RewardCheckpoint {
    pub fn empty(account: Address, token: TokenId) -> Self {
        Self {
            account,
            token,
            paid_per_share: 0,
            accrued: 0,
        }
    }
}
