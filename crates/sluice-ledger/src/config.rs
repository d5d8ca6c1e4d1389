// crates/sluice-ledger/src/config.rs
//
// Ledger configuration.
// Loaded from a TOML file or populated with sensible defaults.
//
// The engine keeps the current config behind a lock and takes a snapshot at
// the start of every operation, so a config update between two operations is
// always picked up and never observed halfway through one.

use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};

use sluice_core::error::SluiceError;
use sluice_core::types::{Address, Amount, Timestamp, TokenId};

use crate::units::{deserialize_amount, DEFAULT_MIN_REWARD_AMOUNT, DEFAULT_STREAM_WINDOW_SECS};

/// Runtime configuration for the ledger engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// The stake asset. Always admitted as a reward token and never revocable.
    pub underlying: TokenId,

    /// Role allowed to admit and revoke reward tokens.
    pub token_authority: Address,

    /// Role allowed to replace this configuration.
    pub config_authority: Address,

    /// Vesting window for tokens without an entry in `stream_windows`.
    #[serde(default = "default_stream_window_secs")]
    pub default_stream_window_secs: Timestamp,

    /// Per-token vesting window overrides, keyed by token id.
    #[serde(default)]
    pub stream_windows: BTreeMap<TokenId, Timestamp>,

    /// Smallest amount a single accrual may add to a stream.
    #[serde(
        default = "default_min_reward_amount",
        deserialize_with = "deserialize_amount"
    )]
    pub min_reward_amount: Amount,

    /// Maximum number of token records (underlying included).
    #[serde(default = "default_max_reward_tokens")]
    pub max_reward_tokens: usize,

    /// Whether receipts received by transfer carry the sender's stake time.
    /// When false they start fresh at the transfer time.
    #[serde(default)]
    pub transfer_inherits_time: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_stream_window_secs() -> Timestamp {
    DEFAULT_STREAM_WINDOW_SECS
}

fn default_min_reward_amount() -> Amount {
    DEFAULT_MIN_REWARD_AMOUNT
}

fn default_max_reward_tokens() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LedgerConfig {
    /// A config with default tunables for the given underlying and authorities.
    pub fn new(underlying: TokenId, token_authority: Address, config_authority: Address) -> Self {
        Self {
            underlying,
            token_authority,
            config_authority,
            default_stream_window_secs: default_stream_window_secs(),
            stream_windows: BTreeMap::new(),
            min_reward_amount: default_min_reward_amount(),
            max_reward_tokens: default_max_reward_tokens(),
            transfer_inherits_time: false,
            log_level: default_log_level(),
        }
    }

    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, SluiceError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SluiceError::InvalidInput(format!("cannot read {}: {}", path, e)))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self, SluiceError> {
        let config: LedgerConfig = toml::from_str(contents)
            .map_err(|e| SluiceError::InvalidInput(format!("bad ledger config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), SluiceError> {
        if self.underlying.is_zero() {
            return Err(SluiceError::InvalidInput(
                "underlying token must not be the zero id".to_string(),
            ));
        }
        if self.token_authority.is_zero() || self.config_authority.is_zero() {
            return Err(SluiceError::InvalidInput(
                "authorities must not be the zero address".to_string(),
            ));
        }
        if self.default_stream_window_secs == 0 {
            return Err(SluiceError::InvalidInput(
                "default_stream_window_secs must be positive".to_string(),
            ));
        }
        if let Some((token, _)) = self.stream_windows.iter().find(|(_, w)| **w == 0) {
            return Err(SluiceError::InvalidInput(format!(
                "stream window for {} must be positive",
                token
            )));
        }
        if self.min_reward_amount == 0 {
            return Err(SluiceError::InvalidInput(
                "min_reward_amount must be positive".to_string(),
            ));
        }
        if self.max_reward_tokens == 0 {
            return Err(SluiceError::InvalidInput(
                "max_reward_tokens must allow at least the underlying".to_string(),
            ));
        }
        Ok(())
    }

    /// Vesting window in effect for `token`.
    pub fn stream_window(&self, token: &TokenId) -> Timestamp {
        self.stream_windows
            .get(token)
            .copied()
            .unwrap_or(self.default_stream_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LedgerConfig {
        LedgerConfig::new(
            TokenId::repeat_byte(1),
            Address::repeat_byte(0xa1),
            Address::repeat_byte(0xc1),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = base();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_reward_tokens, 50);
        assert!(!cfg.transfer_inherits_time);
    }

    #[test]
    fn test_stream_window_override() {
        let mut cfg = base();
        let t = TokenId::repeat_byte(2);
        cfg.stream_windows.insert(t, 3_600);
        assert_eq!(cfg.stream_window(&t), 3_600);
        assert_eq!(
            cfg.stream_window(&TokenId::repeat_byte(3)),
            DEFAULT_STREAM_WINDOW_SECS
        );
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut cfg = base();
        cfg.stream_windows.insert(TokenId::repeat_byte(2), 0);
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.default_stream_window_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_authority_rejected() {
        let mut cfg = base();
        cfg.token_authority = Address::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let underlying = TokenId::repeat_byte(1);
        let other = TokenId::repeat_byte(2);
        let doc = format!(
            r#"
underlying = "{}"
token_authority = "{}"
config_authority = "{}"
min_reward_amount = 1
transfer_inherits_time = true

[stream_windows]
"{}" = 259200
"#,
            underlying,
            Address::repeat_byte(0xa1),
            Address::repeat_byte(0xc1),
            other
        );
        let cfg = LedgerConfig::from_toml(&doc).unwrap();
        assert_eq!(cfg.underlying, underlying);
        assert_eq!(cfg.min_reward_amount, 1);
        assert!(cfg.transfer_inherits_time);
        assert_eq!(cfg.stream_window(&other), 259_200);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_from_toml_missing_required() {
        assert!(LedgerConfig::from_toml("min_reward_amount = 5").is_err());
    }
}
