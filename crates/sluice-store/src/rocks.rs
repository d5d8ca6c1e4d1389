// crates/sluice-store/src/rocks.rs
//
// RocksDB-backed persistent ledger storage.
//
// The engine owns the key layout (`position:{hex}`, `token:{hex}`, ...); this
// store only guarantees that a `LedgerBatch` lands atomically through a
// RocksDB `WriteBatch`.

use rocksdb::{DBWithThreadMode, MultiThreaded, Options, WriteBatch};

use sluice_core::error::SluiceError;
use sluice_core::traits::{BatchOp, LedgerBatch, LedgerStore};

/// RocksDB wrapper implementing the `LedgerStore` trait.
#[derive(Debug)]
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, SluiceError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(|e| {
            SluiceError::Storage(format!("Failed to open RocksDB at {}: {}", path, e))
        })?;

        Ok(Self { db })
    }
}

impl LedgerStore for RocksStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SluiceError> {
        self.db
            .get(key)
            .map_err(|e| SluiceError::Storage(format!("RocksDB get failed: {}", e)))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, SluiceError> {
        let mut items = Vec::new();
        for item in self.db.prefix_iterator(prefix) {
            let (key, value) = item
                .map_err(|e| SluiceError::Storage(format!("RocksDB iteration error: {}", e)))?;

            // No prefix extractor is configured, so the iterator runs past
            // the prefix. Stop at the first foreign key.
            if !key.starts_with(prefix) {
                break;
            }
            items.push((key.to_vec(), value.to_vec()));
        }
        Ok(items)
    }

    fn write_batch(&self, batch: LedgerBatch) -> Result<(), SluiceError> {
        let mut wb = WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => wb.put(key, value),
                BatchOp::Delete { key } => wb.delete(key),
            }
        }
        self.db
            .write(wb)
            .map_err(|e| SluiceError::Storage(format!("RocksDB batch write failed: {}", e)))
    }
}
