// crates/sluice-core/src/traits.rs

use std::sync::Arc;

use crate::error::SluiceError;
use crate::events::LedgerEvent;
use crate::types::{Address, Amount, TokenId};

/// One write in a `LedgerBatch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// A set of writes that a `LedgerStore` applies atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBatch {
    ops: Vec<BatchOp>,
}

impl LedgerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Trait for durable ledger storage.
///
/// Implemented by sluice-store (in-memory map and RocksDB backends). Keys and
/// values are opaque bytes; the engine owns the key layout.
pub trait LedgerStore: Send + Sync {
    /// Read a single key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SluiceError>;

    /// List every `(key, value)` pair whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, SluiceError>;

    /// Apply every write in `batch`, all or nothing.
    fn write_batch(&self, batch: LedgerBatch) -> Result<(), SluiceError>;
}

/// Trait for the external token ledger that actually custodies balances.
///
/// The engine only ever moves tokens through this boundary and measures what
/// it received by diffing `balance_of` around an inbound transfer.
pub trait TokenBank: Send + Sync {
    /// Current balance of `holder` in `token`.
    fn balance_of(&self, token: &TokenId, holder: &Address) -> Result<Amount, SluiceError>;

    /// Move `amount` of `token` from `from` to `to`. The recipient may be
    /// credited less than `amount` for fee-on-transfer tokens.
    fn transfer(
        &self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), SluiceError>;
}

/// Receives ledger events after the emitting operation has committed.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &LedgerEvent);
}

impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SluiceError> {
        (**self).get(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, SluiceError> {
        (**self).scan_prefix(prefix)
    }

    fn write_batch(&self, batch: LedgerBatch) -> Result<(), SluiceError> {
        (**self).write_batch(batch)
    }
}

impl<T: TokenBank + ?Sized> TokenBank for Arc<T> {
    fn balance_of(&self, token: &TokenId, holder: &Address) -> Result<Amount, SluiceError> {
        (**self).balance_of(token, holder)
    }

    fn transfer(
        &self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), SluiceError> {
        (**self).transfer(token, from, to, amount)
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn publish(&self, event: &LedgerEvent) {
        (**self).publish(event)
    }
}
