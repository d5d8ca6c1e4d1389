// crates/sluice-core/src/lib.rs
//
// sluice-core: Core types, traits, and events for the Sluice staking ledger.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines account and token identifiers, the error type, ledger events,
// and the trait seams (storage, token custody, event delivery) that the
// engine in sluice-ledger is written against.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use sluice_core::Address;`

pub use error::{ErrorKind, SluiceError};
pub use events::{LedgerEvent, PositionChange};
pub use traits::{BatchOp, EventSink, LedgerBatch, LedgerStore, TokenBank};
pub use types::{Address, Amount, Timestamp, TokenId};
