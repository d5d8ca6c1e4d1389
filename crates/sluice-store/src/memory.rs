// crates/sluice-store/src/memory.rs
//
// In-memory ledger store backed by an ordered map.
//
// A whole batch is applied while holding the map lock, so readers never see a
// half-applied batch.

use std::collections::BTreeMap;
use std::sync::Mutex;

use sluice_core::error::SluiceError;
use sluice_core::traits::{BatchOp, LedgerBatch, LedgerStore};

/// `LedgerStore` over a `BTreeMap`, for tests and simulations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> Result<usize, SluiceError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SluiceError> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, SluiceError> {
        self.map
            .lock()
            .map_err(|_| SluiceError::Storage("memory store lock poisoned".to_string()))
    }
}

impl LedgerStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SluiceError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, SluiceError> {
        let map = self.lock()?;
        Ok(map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, batch: LedgerBatch) -> Result<(), SluiceError> {
        let mut map = self.lock()?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}
