// crates/sluice-ledger/src/txn.rs
//
// Write-buffering transaction over a `LedgerStore`.
//
// Key format:
//   - `position:{account}`              -> PositionRecord
//   - `receipt:{account}`               -> ReceiptHolding
//   - `supply`                          -> receipt supply (u128)
//   - `token:{token}`                   -> RewardTokenState
//   - `checkpoint:{token}:{account}`    -> RewardCheckpoint
//
// Reads see the transaction's own writes first, then the store. Nothing
// reaches the store until the engine commits the transaction, so a failed
// operation is discarded simply by dropping it.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use sluice_core::error::SluiceError;
use sluice_core::events::LedgerEvent;
use sluice_core::traits::{LedgerBatch, LedgerStore};
use sluice_core::types::{Address, Amount, Timestamp, TokenId};

use crate::records::{AccountPosition, PositionRecord, ReceiptHolding, RewardCheckpoint, RewardTokenState};

const POSITION_PREFIX: &str = "position:";
const RECEIPT_PREFIX: &str = "receipt:";
const TOKEN_PREFIX: &str = "token:";
const CHECKPOINT_PREFIX: &str = "checkpoint:";
const SUPPLY_KEY: &[u8] = b"supply";

fn position_key(account: &Address) -> Vec<u8> {
    format!("{}{}", POSITION_PREFIX, account.to_hex()).into_bytes()
}

fn receipt_key(account: &Address) -> Vec<u8> {
    format!("{}{}", RECEIPT_PREFIX, account.to_hex()).into_bytes()
}

fn token_key(token: &TokenId) -> Vec<u8> {
    format!("{}{}", TOKEN_PREFIX, token.to_hex()).into_bytes()
}

fn checkpoint_prefix(token: &TokenId) -> Vec<u8> {
    format!("{}{}:", CHECKPOINT_PREFIX, token.to_hex()).into_bytes()
}

fn checkpoint_key(account: &Address, token: &TokenId) -> Vec<u8> {
    let mut key = checkpoint_prefix(token);
    key.extend_from_slice(account.to_hex().as_bytes());
    key
}

/// Pending writes and events of one ledger operation.
pub struct LedgerTxn<'a, S: LedgerStore> {
    store: &'a S,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    events: Vec<LedgerEvent>,
}

/// Everything a transaction produced, ready to be committed.
pub struct TxnOutput {
    pub writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    pub events: Vec<LedgerEvent>,
}

impl<'a, S: LedgerStore> LedgerTxn<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            writes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SluiceError> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        self.store.get(key)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, SluiceError> {
        match self.get_raw(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<(), SluiceError> {
        let bytes = serde_json::to_vec(value)?;
        self.writes.insert(key, Some(bytes));
        Ok(())
    }

    fn delete(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    /// Merge store contents under `prefix` with pending writes, in key order.
    fn scan_json<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>, SluiceError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.store.scan_prefix(prefix)?.into_iter().collect();
        for (key, pending) in self.writes.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match pending {
                Some(bytes) => {
                    merged.insert(key.clone(), bytes.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged
            .values()
            .map(|bytes| serde_json::from_slice(bytes).map_err(SluiceError::from))
            .collect()
    }

    // -----------------------------------------------------------------
    // Positions and receipts
    // -----------------------------------------------------------------

    pub fn receipt_balance(&self, account: &Address) -> Result<Amount, SluiceError> {
        Ok(self
            .get_json::<ReceiptHolding>(&receipt_key(account))?
            .map(|h| h.balance)
            .unwrap_or(0))
    }

    pub fn set_receipt_balance(
        &mut self,
        account: &Address,
        balance: Amount,
    ) -> Result<(), SluiceError> {
        if balance == 0 {
            self.delete(receipt_key(account));
            return Ok(());
        }
        let holding = ReceiptHolding {
            account: *account,
            balance,
        };
        self.put_json(receipt_key(account), &holding)
    }

    pub fn receipt_holdings(&self) -> Result<Vec<ReceiptHolding>, SluiceError> {
        self.scan_json(RECEIPT_PREFIX.as_bytes())
    }

    /// Every account holding receipts, with its stake start time.
    pub fn positions(&self) -> Result<Vec<AccountPosition>, SluiceError> {
        self.receipt_holdings()?
            .into_iter()
            .map(|h| {
                Ok(AccountPosition {
                    account: h.account,
                    balance: h.balance,
                    stake_start_time: self.stake_start_time(&h.account)?,
                })
            })
            .collect()
    }

    /// Outstanding receipt supply, i.e. total staked.
    pub fn receipt_supply(&self) -> Result<Amount, SluiceError> {
        Ok(self.get_json::<Amount>(SUPPLY_KEY)?.unwrap_or(0))
    }

    pub fn set_receipt_supply(&mut self, supply: Amount) -> Result<(), SluiceError> {
        self.put_json(SUPPLY_KEY.to_vec(), &supply)
    }

    pub fn stake_start_time(&self, account: &Address) -> Result<Timestamp, SluiceError> {
        Ok(self
            .get_json::<PositionRecord>(&position_key(account))?
            .map(|p| p.stake_start_time)
            .unwrap_or(0))
    }

    pub fn set_stake_start_time(
        &mut self,
        account: &Address,
        stake_start_time: Timestamp,
    ) -> Result<(), SluiceError> {
        if stake_start_time == 0 {
            self.delete(position_key(account));
            return Ok(());
        }
        let record = PositionRecord {
            account: *account,
            stake_start_time,
        };
        self.put_json(position_key(account), &record)
    }

    // -----------------------------------------------------------------
    // Reward tokens
    // -----------------------------------------------------------------

    pub fn token(&self, token: &TokenId) -> Result<Option<RewardTokenState>, SluiceError> {
        self.get_json(&token_key(token))
    }

    /// Like `token`, but a missing record is `NotAdmitted`.
    pub fn require_token(&self, token: &TokenId) -> Result<RewardTokenState, SluiceError> {
        self.token(token)?
            .ok_or_else(|| SluiceError::NotAdmitted(format!("token {} is not tracked", token)))
    }

    pub fn put_token(&mut self, state: &RewardTokenState) -> Result<(), SluiceError> {
        self.put_json(token_key(&state.token), state)
    }

    pub fn remove_token(&mut self, token: &TokenId) {
        self.delete(token_key(token));
    }

    /// Every tracked token record, ordered by token id.
    pub fn tokens(&self) -> Result<Vec<RewardTokenState>, SluiceError> {
        self.scan_json(TOKEN_PREFIX.as_bytes())
    }

    // -----------------------------------------------------------------
    // Reward checkpoints
    // -----------------------------------------------------------------

    pub fn checkpoint(
        &self,
        account: &Address,
        token: &TokenId,
    ) -> Result<RewardCheckpoint, SluiceError> {
        Ok(self
            .get_json(&checkpoint_key(account, token))?
            .unwrap_or_else(|| RewardCheckpoint::empty(*account, *token)))
    }

    pub fn put_checkpoint(&mut self, checkpoint: &RewardCheckpoint) -> Result<(), SluiceError> {
        self.put_json(
            checkpoint_key(&checkpoint.account, &checkpoint.token),
            checkpoint,
        )
    }

    /// Drop every account checkpoint of `token`. Returns how many were removed.
    pub fn remove_checkpoints(&mut self, token: &TokenId) -> Result<usize, SluiceError> {
        let checkpoints: Vec<RewardCheckpoint> = self.scan_json(&checkpoint_prefix(token))?;
        for cp in &checkpoints {
            self.delete(checkpoint_key(&cp.account, &cp.token));
        }
        Ok(checkpoints.len())
    }

    // -----------------------------------------------------------------
    // Events and commit
    // -----------------------------------------------------------------

    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_output(self) -> TxnOutput {
        TxnOutput {
            writes: self.writes,
            events: self.events,
        }
    }
}

impl TxnOutput {
    /// Split into the forward batch and a batch restoring the current store
    /// contents of every touched key.
    pub fn batches<S: LedgerStore>(
        &self,
        store: &S,
    ) -> Result<(LedgerBatch, LedgerBatch), SluiceError> {
        let mut forward = LedgerBatch::new();
        let mut undo = LedgerBatch::new();
        for (key, value) in &self.writes {
            match store.get(key)? {
                Some(old) => undo.put(key.clone(), old),
                None => undo.delete(key.clone()),
            }
            match value {
                Some(bytes) => forward.put(key.clone(), bytes.clone()),
                None => forward.delete(key.clone()),
            }
        }
        Ok((forward, undo))
    }
}
