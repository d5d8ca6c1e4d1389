// crates/sluice-ledger/src/audit.rs
//
// Solvency report.
//
// For every tracked token the ledger must hold at least what it owes:
//
//   held >= available_pool + unvested + escrow
//
// where escrow is the receipt supply for the underlying and zero for every
// other token. Anything above that is unaccounted and can be fed into the
// token's stream with an accrual.

use serde::{Deserialize, Serialize};

use sluice_core::error::SluiceError;
use sluice_core::types::{Amount, TokenId};

use crate::records::RewardTokenState;

/// Accounting of one token held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAudit {
    pub token: TokenId,
    pub whitelisted: bool,
    /// Balance the bank reports for the ledger address.
    pub held: Amount,
    /// Principal backing receipts (underlying only).
    pub escrow: Amount,
    pub pool: Amount,
    pub unvested: Amount,
    /// `held - (escrow + pool + unvested)`, or zero when under-collateralized.
    pub unaccounted: Amount,
    pub solvent: bool,
}

impl TokenAudit {
    pub fn new(state: &RewardTokenState, held: Amount, escrow: Amount) -> Result<Self, SluiceError> {
        let committed = committed(state, escrow)?;
        Ok(Self {
            token: state.token,
            whitelisted: state.whitelisted,
            held,
            escrow,
            pool: state.available_pool,
            unvested: state.unvested(),
            unaccounted: held.saturating_sub(committed),
            solvent: held >= committed,
        })
    }
}

/// Everything the ledger owes in `state`'s token: escrow, pool and the
/// unvested stream.
pub fn committed(state: &RewardTokenState, escrow: Amount) -> Result<Amount, SluiceError> {
    state
        .available_pool
        .checked_add(state.unvested())
        .and_then(|c| c.checked_add(escrow))
        .ok_or_else(|| SluiceError::overflow("committed balance"))
}

/// Ledger-wide audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAudit {
    pub total_staked: Amount,
    /// Sum of individual receipt holdings; equals `total_staked` when sound.
    pub receipts_sum: Amount,
    pub tokens: Vec<TokenAudit>,
}

impl LedgerAudit {
    pub fn is_sound(&self) -> bool {
        self.receipts_sum == self.total_staked && self.tokens.iter().all(|t| t.solvent)
    }

    /// Fail with `PreconditionViolated` describing the first broken invariant.
    pub fn ensure_sound(&self) -> Result<(), SluiceError> {
        if self.receipts_sum != self.total_staked {
            return Err(SluiceError::PreconditionViolated(format!(
                "receipt holdings sum to {} but supply is {}",
                self.receipts_sum, self.total_staked
            )));
        }
        if let Some(t) = self.tokens.iter().find(|t| !t.solvent) {
            return Err(SluiceError::PreconditionViolated(format!(
                "token {} holds {} but owes escrow {} pool {} unvested {}",
                t.token, t.held, t.escrow, t.pool, t.unvested
            )));
        }
        Ok(())
    }
}
