// crates/sluice-store/src/lib.rs
//
// sluice-store: Storage backends for the Sluice staking ledger.
//
// Provides an in-memory store for tests and simulations and a RocksDB-backed
// store for persistent ledgers. Both apply write batches atomically.

pub mod memory;
pub mod rocks;

// Re-export key types for ergonomic access from downstream crates.
pub use memory::MemoryStore;
pub use rocks::RocksStore;
