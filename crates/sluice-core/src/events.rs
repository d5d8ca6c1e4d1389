// crates/sluice-core/src/events.rs
//
// Ledger events published to collaborators after an operation commits.
//
// Governance, fee splitters, and indexers observe these instead of reading
// the ledger store directly. Events from an operation that fails are never
// published.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, Timestamp, TokenId};

/// Why an account position changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionChange {
    Deposit,
    Withdraw,
    TransferIn,
    TransferOut,
}

/// Events emitted by the ledger engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// An account's receipt balance and stake start time changed.
    PositionChanged {
        account: Address,
        change: PositionChange,
        /// Amount moved by this change (received amount for deposits).
        amount: Amount,
        /// Receipt balance after the change.
        balance: Amount,
        stake_start_time: Timestamp,
    },
    /// A token's vesting schedule was (re)started.
    StreamStarted {
        token: TokenId,
        stream_total: Amount,
        /// Unvested remainder of the previous schedule folded into this one.
        carried_over: Amount,
        stream_start: Timestamp,
        stream_end: Timestamp,
    },
    /// Fresh balance was accepted into a token's stream.
    Accrued { token: TokenId, amount: Amount },
    /// Rewards were paid out of a token's available pool.
    Claimed {
        account: Address,
        token: TokenId,
        recipient: Address,
        amount: Amount,
    },
    TokenAdmitted { token: TokenId },
    TokenRevoked { token: TokenId },
    TokenCleanedUp { token: TokenId },
    ConfigUpdated { by: Address },
}

impl LedgerEvent {
    /// Short stable name of the event, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::PositionChanged { .. } => "position_changed",
            LedgerEvent::StreamStarted { .. } => "stream_started",
            LedgerEvent::Accrued { .. } => "accrued",
            LedgerEvent::Claimed { .. } => "claimed",
            LedgerEvent::TokenAdmitted { .. } => "token_admitted",
            LedgerEvent::TokenRevoked { .. } => "token_revoked",
            LedgerEvent::TokenCleanedUp { .. } => "token_cleaned_up",
            LedgerEvent::ConfigUpdated { .. } => "config_updated",
        }
    }
}
