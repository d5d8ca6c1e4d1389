// crates/sluice-cli/src/scenario.rs
//
// TOML scenario files for `sluice simulate`.
//
// A scenario carries a ledger config and an ordered list of timed steps:
//
//   [config]
//   underlying = "0x0101…01"
//   token_authority = "0xa1a1…a1"
//   config_authority = "0xc1c1…c1"
//
//   [[step]]
//   at = 100
//   op = "deposit"
//   account = "0x0a0a…0a"
//   amount = "500"        # decimal tokens; plain integers are base units
//   expect = "insufficient_balance"   # optional: the step must fail this way

use std::fs;

use serde::Deserialize;

use sluice_core::error::{ErrorKind, SluiceError};
use sluice_core::types::{Address, Amount, Timestamp, TokenId};
use sluice_ledger::units::deserialize_amount;
use sluice_ledger::LedgerConfig;

fn default_ledger() -> Address {
    Address::repeat_byte(0xee)
}

/// A replayable ledger scenario.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// Bank address holding the ledger's balances.
    #[serde(default = "default_ledger")]
    pub ledger: Address,
    pub config: LedgerConfig,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// One timed action.
#[derive(Debug, Deserialize)]
pub struct Step {
    pub at: Timestamp,
    /// Error kind the step is expected to fail with.
    #[serde(default)]
    pub expect: Option<ErrorKind>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Credit bank balance out of thin air.
    Mint {
        token: TokenId,
        holder: Address,
        #[serde(deserialize_with = "deserialize_amount")]
        amount: Amount,
    },
    /// Charge a transfer fee on a token, in basis points.
    SetFee { token: TokenId, bps: u32 },
    Deposit {
        account: Address,
        #[serde(deserialize_with = "deserialize_amount")]
        amount: Amount,
    },
    Withdraw {
        account: Address,
        #[serde(deserialize_with = "deserialize_amount")]
        amount: Amount,
        recipient: Option<Address>,
    },
    Transfer {
        from: Address,
        to: Address,
        #[serde(deserialize_with = "deserialize_amount")]
        amount: Amount,
    },
    Accrue {
        token: TokenId,
        #[serde(deserialize_with = "deserialize_amount")]
        amount: Amount,
    },
    AccrueUnaccounted { token: TokenId },
    Claim {
        account: Address,
        tokens: Vec<TokenId>,
        recipient: Option<Address>,
    },
    Admit { caller: Address, token: TokenId },
    Revoke { caller: Address, token: TokenId },
    Cleanup { token: TokenId },
    VotingPower { account: Address },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Mint { .. } => "mint",
            Action::SetFee { .. } => "set_fee",
            Action::Deposit { .. } => "deposit",
            Action::Withdraw { .. } => "withdraw",
            Action::Transfer { .. } => "transfer",
            Action::Accrue { .. } => "accrue",
            Action::AccrueUnaccounted { .. } => "accrue_unaccounted",
            Action::Claim { .. } => "claim",
            Action::Admit { .. } => "admit",
            Action::Revoke { .. } => "revoke",
            Action::Cleanup { .. } => "cleanup",
            Action::VotingPower { .. } => "voting_power",
        }
    }
}

impl Scenario {
    /// Load a scenario from a TOML file.
    pub fn load(path: &str) -> Result<Self, SluiceError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SluiceError::InvalidInput(format!("cannot read {}: {}", path, e)))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, SluiceError> {
        let scenario: Scenario = toml::from_str(contents)
            .map_err(|e| SluiceError::InvalidInput(format!("bad scenario: {}", e)))?;
        scenario.config.validate()?;
        if let Some(pair) = scenario.steps.windows(2).find(|w| w[1].at < w[0].at) {
            return Err(SluiceError::InvalidInput(format!(
                "steps must be in time order: {} comes after {}",
                pair[1].at, pair[0].at
            )));
        }
        Ok(scenario)
    }
}
