// crates/sluice-ledger/src/lib.rs
//
// sluice-ledger: Stake positions, per-token reward streams, proportional
// claims, reward token admission, and time-weighted voting power for the
// Sluice staking ledger.
//
// All amounts are tracked in base units of 18-decimal tokens.
// 1 token = 1,000,000,000,000,000,000 base units (10^18).

pub mod audit;
pub mod bank;
pub mod claim;
pub mod config;
pub mod engine;
pub mod guard;
pub mod position;
pub mod records;
pub mod sink;
pub mod stream;
pub mod txn;
pub mod units;
pub mod voting;
pub mod whitelist;

// Re-export key types for ergonomic access from downstream crates.
pub use audit::{LedgerAudit, TokenAudit};
pub use bank::{MemoryBank, TransferHook};
pub use config::LedgerConfig;
pub use engine::{LedgerEngine, Payout};
pub use guard::ReentrancyGuard;
pub use records::{AccountPosition, RewardCheckpoint, RewardTokenState};
pub use sink::{MemoryEventLog, TracingSink};
pub use units::{parse_units, Tokens, REWARD_PRECISION, SECONDS_PER_DAY, UNIT};
pub use voting::{voting_power, VotingPowerSnapshot};
