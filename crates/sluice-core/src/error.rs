// crates/sluice-core/src/error.rs

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger-wide error type for Sluice.
///
/// Every top-level ledger operation either succeeds completely or returns one
/// of these with no state change.
#[derive(Debug, Error)]
pub enum SluiceError {
    /// Zero amount, zero address, or otherwise malformed parameters.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A withdrawal, claim, or transfer exceeds what is available.
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// The token is not admitted to the reward streams.
    #[error("Token not admitted: {0}")]
    NotAdmitted(String),

    /// The ledger is not in a state that allows the operation.
    #[error("Precondition violated: {0}")]
    PreconditionViolated(String),

    /// The caller lacks the role required by the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A ledger operation was invoked while another was still in progress.
    #[error("Reentrant call rejected: {0}")]
    Reentrancy(String),

    /// Checked arithmetic overflowed.
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// The external token ledger refused a transfer.
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// Storage backend error (RocksDB, in-memory map).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Machine-readable reason attached to every `SluiceError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InsufficientBalance,
    NotAdmitted,
    PreconditionViolated,
    Unauthorized,
    Reentrancy,
    Overflow,
    Transfer,
    Storage,
    Serialization,
}

impl SluiceError {
    /// The machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SluiceError::InvalidInput(_) => ErrorKind::InvalidInput,
            SluiceError::InsufficientBalance(_) => ErrorKind::InsufficientBalance,
            SluiceError::NotAdmitted(_) => ErrorKind::NotAdmitted,
            SluiceError::PreconditionViolated(_) => ErrorKind::PreconditionViolated,
            SluiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            SluiceError::Reentrancy(_) => ErrorKind::Reentrancy,
            SluiceError::Overflow(_) => ErrorKind::Overflow,
            SluiceError::Transfer(_) => ErrorKind::Transfer,
            SluiceError::Storage(_) => ErrorKind::Storage,
            SluiceError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Shorthand for an overflow error naming the computation that failed.
    pub fn overflow(what: &str) -> Self {
        SluiceError::Overflow(format!("{} overflowed", what))
    }
}

impl From<serde_json::Error> for SluiceError {
    fn from(e: serde_json::Error) -> Self {
        SluiceError::Serialization(e.to_string())
    }
}
