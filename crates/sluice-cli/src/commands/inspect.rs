// crates/sluice-cli/src/commands/inspect.rs
//
// `sluice inspect --db DIR`: show positions and reward token state of a
// persisted ledger. Reads the store directly; no bank is involved, so held
// balances are not shown.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use sluice_core::error::SluiceError;
use sluice_core::traits::LedgerStore;
use sluice_core::types::Amount;
use sluice_ledger::txn::LedgerTxn;
use sluice_ledger::{AccountPosition, RewardTokenState, Tokens};
use sluice_store::RocksStore;

use crate::output::{self, OutputFormat};

/// Arguments of `sluice inspect`.
#[derive(Debug, Args)]
pub struct InspectCmd {
    /// RocksDB directory of the ledger.
    #[arg(long, default_value = "~/.sluice/ledger")]
    pub db: String,

    /// Print JSON instead of tables.
    #[arg(long)]
    pub json: bool,
}

/// Everything stored in a ledger.
#[derive(Debug, Serialize)]
pub struct LedgerSnapshot {
    pub total_staked: Amount,
    pub positions: Vec<AccountPosition>,
    pub tokens: Vec<RewardTokenState>,
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Tokens")]
    tokens: String,
    #[tabled(rename = "Stake start")]
    start: u64,
}

#[derive(Tabled)]
struct TokenRow {
    #[tabled(rename = "Token")]
    token: String,
    #[tabled(rename = "Listed")]
    whitelisted: bool,
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Stream")]
    stream: String,
    #[tabled(rename = "Vested")]
    vested: String,
    #[tabled(rename = "Window")]
    window: String,
    #[tabled(rename = "Updated")]
    last_update: u64,
}

/// Read every position and token record out of `store`.
pub fn snapshot<S: LedgerStore>(store: &S) -> Result<LedgerSnapshot, SluiceError> {
    let txn = LedgerTxn::new(store);
    Ok(LedgerSnapshot {
        total_staked: txn.receipt_supply()?,
        positions: txn.positions()?,
        tokens: txn.tokens()?,
    })
}

/// Run the inspect command.
pub fn run(cmd: &InspectCmd) -> Result<(), Box<dyn std::error::Error>> {
    let path = output::expand_tilde(&cmd.db);
    let store = RocksStore::open(&path)?;
    let snap = snapshot(&store)?;

    if OutputFormat::from_json_flag(cmd.json) == OutputFormat::Json {
        println!("{}", output::format_json(&snap));
        return Ok(());
    }

    println!("Ledger at {}", path);
    println!(
        "Total staked: {} ({} tokens)",
        snap.total_staked,
        Tokens(snap.total_staked)
    );
    println!();

    let positions: Vec<PositionRow> = snap
        .positions
        .iter()
        .map(|p| PositionRow {
            account: p.account.to_string(),
            balance: p.balance.to_string(),
            tokens: Tokens(p.balance).to_string(),
            start: p.stake_start_time,
        })
        .collect();
    println!("{}", output::format_table(&positions));
    println!();

    let tokens: Vec<TokenRow> = snap
        .tokens
        .iter()
        .map(|t| TokenRow {
            token: t.token.to_string(),
            whitelisted: t.whitelisted,
            pool: t.available_pool.to_string(),
            stream: t.stream_total.to_string(),
            vested: t.stream_vested.to_string(),
            window: format!("{}..{}", t.stream_start, t.stream_end),
            last_update: t.last_update,
        })
        .collect();
    println!("{}", output::format_table(&tokens));

    Ok(())
}
