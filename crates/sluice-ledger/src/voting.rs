// crates/sluice-ledger/src/voting.rs
//
// Voting power: stake size times time held.
//
// Governance evaluates power against a snapshot taken once per proposal, so
// stake moved after the snapshot cannot change the outcome.

use serde::{Deserialize, Serialize};

use sluice_core::error::SluiceError;
use sluice_core::types::{Address, Amount, Timestamp};

use crate::records::AccountPosition;

/// `balance * (at - stake_start_time)`, or zero for an inactive position or
/// a reference time before the position started.
pub fn voting_power(
    balance: Amount,
    stake_start_time: Timestamp,
    at: Timestamp,
) -> Result<u128, SluiceError> {
    if balance == 0 || stake_start_time == 0 || at <= stake_start_time {
        return Ok(0);
    }
    balance
        .checked_mul(u128::from(at - stake_start_time))
        .ok_or_else(|| SluiceError::overflow("voting power"))
}

/// The inputs of an account's voting power frozen at `taken_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPowerSnapshot {
    pub account: Address,
    pub balance: Amount,
    pub stake_start_time: Timestamp,
    pub taken_at: Timestamp,
}

impl VotingPowerSnapshot {
    pub fn of(position: &AccountPosition, taken_at: Timestamp) -> Self {
        Self {
            account: position.account,
            balance: position.balance,
            stake_start_time: position.stake_start_time,
            taken_at,
        }
    }

    /// Voting power at the snapshot time.
    pub fn power(&self) -> Result<u128, SluiceError> {
        self.power_at(self.taken_at)
    }

    /// Voting power of the frozen position at an arbitrary reference time.
    pub fn power_at(&self, at: Timestamp) -> Result<u128, SluiceError> {
        voting_power(self.balance, self.stake_start_time, at)
    }
}
