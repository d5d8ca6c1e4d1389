// crates/sluice-cli/src/commands/simulate.rs
//
// `sluice simulate <scenario.toml>`: replay a scenario against a ledger.
//
// Runs against an in-memory store unless `--db` names a RocksDB directory.
// Token balances always live in an in-memory bank seeded by `mint` steps.
// Failing steps are reported and the replay continues; a step whose outcome
// does not match its `expect` makes the command fail after the report.

use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use sluice_core::error::{ErrorKind, SluiceError};
use sluice_core::events::LedgerEvent;
use sluice_core::traits::LedgerStore;
use sluice_core::types::Timestamp;
use sluice_ledger::{
    AccountPosition, LedgerAudit, LedgerEngine, MemoryBank, MemoryEventLog, TracingSink,
};
use sluice_store::{MemoryStore, RocksStore};

use crate::output::{self, OutputFormat};
use crate::scenario::{Action, Scenario, Step};

/// Arguments of `sluice simulate`.
#[derive(Debug, Args)]
pub struct SimulateCmd {
    /// Path to the scenario TOML file.
    pub scenario: String,

    /// Persist the ledger in this RocksDB directory instead of memory.
    #[arg(long)]
    pub db: Option<String>,

    /// Print a JSON report instead of tables.
    #[arg(long)]
    pub json: bool,
}

/// Result of one replayed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub at: Timestamp,
    pub op: &'static str,
    pub ok: bool,
    pub detail: String,
    pub error_kind: Option<ErrorKind>,
    pub expected: Option<ErrorKind>,
}

impl StepOutcome {
    /// Whether the outcome matches the step's expectation.
    pub fn as_expected(&self) -> bool {
        self.error_kind == self.expected
    }
}

/// Full report of a replay.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepOutcome>,
    pub events: Vec<LedgerEvent>,
    pub positions: Vec<AccountPosition>,
    pub audit: LedgerAudit,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "At")]
    at: Timestamp,
    #[tabled(rename = "Op")]
    op: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Stake start")]
    start: Timestamp,
}

#[derive(Tabled)]
struct TokenRow {
    #[tabled(rename = "Token")]
    token: String,
    #[tabled(rename = "Listed")]
    whitelisted: bool,
    #[tabled(rename = "Held")]
    held: String,
    #[tabled(rename = "Escrow")]
    escrow: String,
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Unvested")]
    unvested: String,
    #[tabled(rename = "Unaccounted")]
    unaccounted: String,
}

/// Run the simulate command.
pub fn run(cmd: &SimulateCmd) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = Scenario::load(&cmd.scenario)?;
    crate::init_tracing(&scenario.config.log_level);
    tracing::info!(
        scenario = %cmd.scenario,
        steps = scenario.steps.len(),
        "replaying scenario"
    );

    let format = OutputFormat::from_json_flag(cmd.json);
    let report = match &cmd.db {
        Some(db) => {
            let store = RocksStore::open(&output::expand_tilde(db))?;
            replay(store, &scenario)?
        }
        None => replay(MemoryStore::new(), &scenario)?,
    };

    print_report(&report, format);

    let mismatched: Vec<&StepOutcome> = report.steps.iter().filter(|s| !s.as_expected()).collect();
    if let Some(first) = mismatched.first() {
        return Err(format!(
            "{} step(s) did not go as expected; first is #{} ({}): expected {:?}, got {:?}",
            mismatched.len(),
            first.index,
            first.op,
            first.expected,
            first.error_kind
        )
        .into());
    }
    report.audit.ensure_sound()?;
    Ok(())
}

/// Replay every step of `scenario` against a ledger over `store`.
pub fn replay<S: LedgerStore>(store: S, scenario: &Scenario) -> Result<SimulationReport, SluiceError> {
    let log = Arc::new(MemoryEventLog::new());
    let engine = LedgerEngine::new(
        scenario.ledger,
        store,
        MemoryBank::new(),
        scenario.config.clone(),
    )?
    .with_event_sink(log.clone())
    .with_event_sink(TracingSink);

    let steps = scenario
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let result = apply(&engine, step);
            if let Err(e) = &result {
                tracing::debug!(step = i, op = step.action.name(), error = %e, "step failed");
            }
            StepOutcome {
                index: i,
                at: step.at,
                op: step.action.name(),
                ok: result.is_ok(),
                error_kind: result.as_ref().err().map(|e| e.kind()),
                detail: match result {
                    Ok(detail) => detail,
                    Err(e) => e.to_string(),
                },
                expected: step.expect,
            }
        })
        .collect();

    Ok(SimulationReport {
        steps,
        events: log.events(),
        positions: engine.positions()?,
        audit: engine.audit_report()?,
    })
}

fn apply<S: LedgerStore>(
    engine: &LedgerEngine<S, MemoryBank>,
    step: &Step,
) -> Result<String, SluiceError> {
    let now = step.at;
    match &step.action {
        Action::Mint {
            token,
            holder,
            amount,
        } => {
            engine.bank().mint(token, holder, *amount)?;
            Ok(format!("minted {} of {} to {}", amount, token, holder))
        }
        Action::SetFee { token, bps } => {
            engine.bank().set_transfer_fee_bps(token, *bps)?;
            Ok(format!("{} now charges {} bps", token, bps))
        }
        Action::Deposit { account, amount } => {
            let received = engine.deposit(account, *amount, now)?;
            Ok(format!("received {}", received))
        }
        Action::Withdraw {
            account,
            amount,
            recipient,
        } => {
            let payouts = engine.withdraw(account, *amount, &recipient.unwrap_or(*account), now)?;
            Ok(format!("{} payout(s)", payouts.len()))
        }
        Action::Transfer { from, to, amount } => {
            engine.transfer_receipts(from, to, *amount, now)?;
            Ok(format!("moved {} receipts", amount))
        }
        Action::Accrue { token, amount } => {
            let state = engine.accrue(token, *amount, now)?;
            Ok(format!(
                "stream of {} until {}",
                state.stream_total, state.stream_end
            ))
        }
        Action::AccrueUnaccounted { token } => {
            let amount = engine.accrue_unaccounted(token, now)?;
            Ok(format!("accrued {}", amount))
        }
        Action::Claim {
            account,
            tokens,
            recipient,
        } => {
            let payouts = engine.claim(account, tokens, &recipient.unwrap_or(*account), now)?;
            let total: Vec<String> = payouts
                .iter()
                .map(|p| format!("{} of {}", p.amount, p.token))
                .collect();
            if total.is_empty() {
                Ok("nothing to claim".to_string())
            } else {
                Ok(total.join(", "))
            }
        }
        Action::Admit { caller, token } => {
            engine.admit(caller, token, now)?;
            Ok(format!("{} admitted", token))
        }
        Action::Revoke { caller, token } => {
            engine.revoke(caller, token, now)?;
            Ok(format!("{} revoked", token))
        }
        Action::Cleanup { token } => {
            engine.cleanup(token)?;
            Ok(format!("{} cleaned up", token))
        }
        Action::VotingPower { account } => {
            let vp = engine.voting_power(account, now)?;
            Ok(format!("voting power {}", vp))
        }
    }
}

fn print_report(report: &SimulationReport, format: OutputFormat) {
    if format == OutputFormat::Json {
        println!("{}", output::format_json(report));
        return;
    }

    let steps: Vec<StepRow> = report
        .steps
        .iter()
        .map(|s| StepRow {
            index: s.index,
            at: s.at,
            op: s.op.to_string(),
            outcome: match (s.ok, s.as_expected()) {
                (true, true) => s.detail.clone(),
                (false, true) => format!("rejected as expected: {}", s.detail),
                (_, false) => format!("UNEXPECTED: {}", s.detail),
            },
        })
        .collect();
    println!("{}", output::format_table(&steps));
    println!();

    let positions: Vec<PositionRow> = report
        .positions
        .iter()
        .map(|p| PositionRow {
            account: output::short_id(&p.account.to_string()),
            balance: p.balance.to_string(),
            start: p.stake_start_time,
        })
        .collect();
    println!("Positions (total staked {})", report.audit.total_staked);
    println!("{}", output::format_table(&positions));
    println!();

    let tokens: Vec<TokenRow> = report
        .audit
        .tokens
        .iter()
        .map(|t| TokenRow {
            token: output::short_id(&t.token.to_string()),
            whitelisted: t.whitelisted,
            held: t.held.to_string(),
            escrow: t.escrow.to_string(),
            pool: t.pool.to_string(),
            unvested: t.unvested.to_string(),
            unaccounted: t.unaccounted.to_string(),
        })
        .collect();
    println!("Reward tokens");
    println!("{}", output::format_table(&tokens));
    println!();
    println!(
        "Events: {}  |  Audit: {}",
        report.events.len(),
        if report.audit.is_sound() { "sound" } else { "VIOLATED" }
    );
}
