// crates/sluice-cli/src/commands/vp.rs
//
// `sluice vp --db DIR --account HEX --at T`: voting power of an account.

use clap::Args;

use sluice_core::error::SluiceError;
use sluice_core::traits::LedgerStore;
use sluice_core::types::{Address, Timestamp};
use sluice_ledger::txn::LedgerTxn;
use sluice_ledger::{AccountPosition, VotingPowerSnapshot};
use sluice_store::RocksStore;

use crate::output::{self, OutputFormat};

/// Arguments of `sluice vp`.
#[derive(Debug, Args)]
pub struct VpCmd {
    /// RocksDB directory of the ledger.
    #[arg(long, default_value = "~/.sluice/ledger")]
    pub db: String,

    /// Account address (hex, 0x prefix optional).
    #[arg(long)]
    pub account: Address,

    /// Reference time in seconds.
    #[arg(long)]
    pub at: Timestamp,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Freeze the stored position of `account` at `at`.
pub fn snapshot<S: LedgerStore>(
    store: &S,
    account: &Address,
    at: Timestamp,
) -> Result<VotingPowerSnapshot, SluiceError> {
    let txn = LedgerTxn::new(store);
    let position = AccountPosition {
        account: *account,
        balance: txn.receipt_balance(account)?,
        stake_start_time: txn.stake_start_time(account)?,
    };
    Ok(VotingPowerSnapshot::of(&position, at))
}

/// Run the vp command.
pub fn run(cmd: &VpCmd) -> Result<(), Box<dyn std::error::Error>> {
    let store = RocksStore::open(&output::expand_tilde(&cmd.db))?;
    let snapshot = snapshot(&store, &cmd.account, cmd.at)?;
    let power = snapshot.power()?;

    if OutputFormat::from_json_flag(cmd.json) == OutputFormat::Json {
        #[derive(serde::Serialize)]
        struct VpReport {
            #[serde(flatten)]
            snapshot: VotingPowerSnapshot,
            voting_power: u128,
        }
        println!(
            "{}",
            output::format_json(&VpReport {
                snapshot,
                voting_power: power,
            })
        );
        return Ok(());
    }

    println!("Account:      {}", cmd.account);
    println!("Balance:      {}", snapshot.balance);
    println!("Stake start:  {}", snapshot.stake_start_time);
    println!("Voting power: {} (at {})", power, cmd.at);
    Ok(())
}
