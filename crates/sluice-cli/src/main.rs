// crates/sluice-cli/src/main.rs
//
// CLI entrypoint for the Sluice staking ledger.
//
// Provides subcommands for replaying TOML scenarios against a ledger,
// inspecting a persisted ledger, and computing an account's voting power.

mod commands;
mod output;
mod scenario;

use clap::{Parser, Subcommand};
use commands::inspect::InspectCmd;
use commands::simulate::SimulateCmd;
use commands::vp::VpCmd;

/// Sluice CLI: staking reward streams and time-weighted voting power.
#[derive(Parser, Debug)]
#[command(
    name = "sluice",
    version = "0.1.0",
    about = "Sluice staking ledger tools: simulate scenarios, inspect ledgers, query voting power"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a TOML scenario against a fresh or persisted ledger.
    Simulate(SimulateCmd),

    /// Show positions and reward token state of a persisted ledger.
    Inspect(InspectCmd),

    /// Voting power of an account at a reference time.
    Vp(VpCmd),
}

/// Initialize the tracing subscriber, preferring `RUST_LOG` over `default_level`.
pub(crate) fn init_tracing(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Simulate(cmd) => commands::simulate::run(cmd)?,
        Commands::Inspect(cmd) => {
            init_tracing("warn");
            commands::inspect::run(cmd)?
        }
        Commands::Vp(cmd) => {
            init_tracing("warn");
            commands::vp::run(cmd)?
        }
    }

    Ok(())
}
