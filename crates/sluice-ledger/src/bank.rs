// crates/sluice-ledger/src/bank.rs
//
// In-memory token bank.
//
// Custodies balances of every token for every holder. Used by the simulator
// and by tests to reproduce awkward token behavior:
//   - fee-on-transfer tokens (a per-token fee in basis points, burned)
//   - transfer hooks that call back into the ledger mid-transfer
//   - recipients that refuse incoming transfers

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use sluice_core::error::SluiceError;
use sluice_core::traits::TokenBank;
use sluice_core::types::{Address, Amount, TokenId};

/// Maximum transfer fee: 100%.
pub const MAX_FEE_BPS: u32 = 10_000;

/// Callback run after every successful transfer, outside the bank's locks.
pub type TransferHook = Arc<dyn Fn(&TokenId, &Address, &Address, Amount) + Send + Sync>;

#[derive(Default)]
struct BankState {
    balances: HashMap<(TokenId, Address), Amount>,
    fee_bps: HashMap<TokenId, u32>,
    blocked: HashSet<Address>,
}

/// Token balances held in memory.
#[derive(Default)]
pub struct MemoryBank {
    state: Mutex<BankState>,
    hook: Mutex<Option<TransferHook>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BankState>, SluiceError> {
        self.state
            .lock()
            .map_err(|_| SluiceError::Transfer("bank lock poisoned".to_string()))
    }

    /// Create `amount` of `token` out of thin air for `holder`.
    pub fn mint(&self, token: &TokenId, holder: &Address, amount: Amount) -> Result<(), SluiceError> {
        let mut state = self.lock()?;
        let balance = state.balances.entry((*token, *holder)).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| SluiceError::overflow("bank balance"))?;
        Ok(())
    }

    /// Charge `bps` basis points on every transfer of `token`.
    pub fn set_transfer_fee_bps(&self, token: &TokenId, bps: u32) -> Result<(), SluiceError> {
        if bps > MAX_FEE_BPS {
            return Err(SluiceError::InvalidInput(format!(
                "transfer fee {} bps exceeds {}",
                bps, MAX_FEE_BPS
            )));
        }
        self.lock()?.fee_bps.insert(*token, bps);
        Ok(())
    }

    /// Refuse (or accept again) every transfer to `holder`.
    pub fn set_blocked(&self, holder: &Address, blocked: bool) -> Result<(), SluiceError> {
        let mut state = self.lock()?;
        if blocked {
            state.blocked.insert(*holder);
        } else {
            state.blocked.remove(holder);
        }
        Ok(())
    }

    pub fn set_transfer_hook(&self, hook: Option<TransferHook>) -> Result<(), SluiceError> {
        let mut slot = self
            .hook
            .lock()
            .map_err(|_| SluiceError::Transfer("bank hook lock poisoned".to_string()))?;
        *slot = hook;
        Ok(())
    }

    fn current_hook(&self) -> Result<Option<TransferHook>, SluiceError> {
        self.hook
            .lock()
            .map(|slot| slot.clone())
            .map_err(|_| SluiceError::Transfer("bank hook lock poisoned".to_string()))
    }
}

impl TokenBank for MemoryBank {
    fn balance_of(&self, token: &TokenId, holder: &Address) -> Result<Amount, SluiceError> {
        Ok(self
            .lock()?
            .balances
            .get(&(*token, *holder))
            .copied()
            .unwrap_or(0))
    }

    fn transfer(
        &self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), SluiceError> {
        {
            let mut state = self.lock()?;
            if state.blocked.contains(to) {
                return Err(SluiceError::Transfer(format!(
                    "{} refuses transfers of {}",
                    to, token
                )));
            }
            let held = state.balances.get(&(*token, *from)).copied().unwrap_or(0);
            if amount > held {
                return Err(SluiceError::InsufficientBalance(format!(
                    "{} holds {} of {} but {} was requested",
                    from, held, token, amount
                )));
            }
            let bps = state.fee_bps.get(token).copied().unwrap_or(0);
            let fee = amount.checked_mul(u128::from(bps)).ok_or_else(|| {
                SluiceError::overflow("transfer fee")
            })? / u128::from(MAX_FEE_BPS);

            state.balances.insert((*token, *from), held - amount);
            let credited = state.balances.entry((*token, *to)).or_insert(0);
            *credited = credited
                .checked_add(amount - fee)
                .ok_or_else(|| SluiceError::overflow("bank balance"))?;
        }

        if let Some(hook) = self.current_hook()? {
            hook(token, from, to, amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token() -> TokenId {
        TokenId::repeat_byte(1)
    }

    #[test]
    fn test_transfer_moves_balance() {
        let bank = MemoryBank::new();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        bank.mint(&token(), &a, 100).unwrap();
        bank.transfer(&token(), &a, &b, 40).unwrap();
        assert_eq!(bank.balance_of(&token(), &a).unwrap(), 60);
        assert_eq!(bank.balance_of(&token(), &b).unwrap(), 40);
    }

    #[test]
    fn test_insufficient_balance() {
        let bank = MemoryBank::new();
        let a = Address::repeat_byte(1);
        bank.mint(&token(), &a, 10).unwrap();
        let result = bank.transfer(&token(), &a, &Address::repeat_byte(2), 11);
        assert!(matches!(result, Err(SluiceError::InsufficientBalance(_))));
        assert_eq!(bank.balance_of(&token(), &a).unwrap(), 10);
    }

    #[test]
    fn test_fee_is_burned() {
        let bank = MemoryBank::new();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        bank.mint(&token(), &a, 1_000).unwrap();
        bank.set_transfer_fee_bps(&token(), 100).unwrap();
        bank.transfer(&token(), &a, &b, 1_000).unwrap();
        assert_eq!(bank.balance_of(&token(), &a).unwrap(), 0);
        assert_eq!(bank.balance_of(&token(), &b).unwrap(), 990);
    }

    #[test]
    fn test_fee_above_max_rejected() {
        let bank = MemoryBank::new();
        assert!(bank.set_transfer_fee_bps(&token(), MAX_FEE_BPS + 1).is_err());
    }

    #[test]
    fn test_blocked_recipient() {
        let bank = MemoryBank::new();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        bank.mint(&token(), &a, 10).unwrap();
        bank.set_blocked(&b, true).unwrap();
        assert!(matches!(
            bank.transfer(&token(), &a, &b, 5),
            Err(SluiceError::Transfer(_))
        ));
        bank.set_blocked(&b, false).unwrap();
        assert!(bank.transfer(&token(), &a, &b, 5).is_ok());
    }

    #[test]
    fn test_hook_runs_outside_lock() {
        let bank = Arc::new(MemoryBank::new());
        let a = Address::repeat_byte(1);
        bank.mint(&token(), &a, 10).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let inner = bank.clone();
        bank.set_transfer_hook(Some(Arc::new(move |token: &TokenId, _: &Address, _: &Address, _: Amount| {
            // Would deadlock if the bank were still locked
            let _ = inner.balance_of(token, &Address::ZERO);
            seen.fetch_add(1, Ordering::SeqCst);
        })))
        .unwrap();

        bank.transfer(&token(), &a, &Address::repeat_byte(2), 3).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
