// crates/sluice-ledger/src/engine.rs
//
// The ledger engine.
//
// Every state-changing operation follows the same shape:
//   1. enter the reentrancy guard and snapshot the config
//   2. stage all reads and writes in a `LedgerTxn`
//   3. commit the transaction as one atomic store batch
//   4. move tokens out through the bank
//   5. publish the operation's events
//
// State is committed before any outbound transfer, so a collaborator called
// from inside a transfer observes the final state (and is rejected by the
// guard if it tries to call back in). If an outbound transfer fails, the
// commit is undone and earlier payouts are taken back. A payout that cannot
// be fully taken back (a transfer fee, a recipient that moved the funds) is
// charged to the account's entitlement, so the ledger never owes more than
// it holds. Events of the operation are published only once everything
// succeeded.

use std::collections::HashSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sluice_core::error::SluiceError;
use sluice_core::events::{LedgerEvent, PositionChange};
use sluice_core::traits::{EventSink, LedgerBatch, LedgerStore, TokenBank};
use sluice_core::types::{Address, Amount, Timestamp, TokenId};

use crate::audit::{self, LedgerAudit, TokenAudit};
use crate::claim;
use crate::config::LedgerConfig;
use crate::guard::ReentrancyGuard;
use crate::position;
use crate::records::{AccountPosition, RewardTokenState};
use crate::stream;
use crate::txn::LedgerTxn;
use crate::voting::{self, VotingPowerSnapshot};
use crate::whitelist;

/// One outbound transfer made by a committed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub token: TokenId,
    pub recipient: Address,
    pub amount: Amount,
}

/// A committed transaction waiting for its outbound transfers.
struct Committed {
    undo: LedgerBatch,
    events: Vec<LedgerEvent>,
}

/// Staking ledger over a key-value store and a token bank.
pub struct LedgerEngine<S: LedgerStore, B: TokenBank> {
    /// Holder of escrowed principal and reward balances in the bank.
    address: Address,
    store: S,
    bank: B,
    config: RwLock<LedgerConfig>,
    guard: ReentrancyGuard,
    sinks: Vec<Box<dyn EventSink>>,
}

fn require_nonzero(amount: Amount, what: &str) -> Result<(), SluiceError> {
    if amount == 0 {
        return Err(SluiceError::InvalidInput(format!("{} must be positive", what)));
    }
    Ok(())
}

fn require_address(address: &Address, what: &str) -> Result<(), SluiceError> {
    if address.is_zero() {
        return Err(SluiceError::InvalidInput(format!(
            "{} must not be the zero address",
            what
        )));
    }
    Ok(())
}

/// Settle every tracked token and stage the results.
fn settle_all<S: LedgerStore>(
    txn: &mut LedgerTxn<'_, S>,
    total_staked: Amount,
    now: Timestamp,
) -> Result<Vec<RewardTokenState>, SluiceError> {
    let mut tokens = txn.tokens()?;
    for state in tokens.iter_mut() {
        stream::settle(state, total_staked, now)?;
        txn.put_token(state)?;
    }
    Ok(tokens)
}

impl<S: LedgerStore, B: TokenBank> LedgerEngine<S, B> {
    /// Open a ledger held by `address`. The underlying token record is
    /// created on first use.
    pub fn new(address: Address, store: S, bank: B, config: LedgerConfig) -> Result<Self, SluiceError> {
        require_address(&address, "ledger address")?;
        config.validate()?;

        let mut txn = LedgerTxn::new(&store);
        if whitelist::ensure_underlying(&mut txn, &config)? {
            let (forward, _) = txn.into_output().batches(&store)?;
            store.write_batch(forward)?;
            info!(underlying = %config.underlying, "underlying token admitted");
        }

        Ok(Self {
            address,
            store,
            bank,
            config: RwLock::new(config),
            guard: ReentrancyGuard::new(),
            sinks: Vec::new(),
        })
    }

    /// Publish committed events to `sink` as well.
    pub fn with_event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Result<LedgerConfig, SluiceError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| SluiceError::Storage("config lock poisoned".to_string()))
    }

    // -----------------------------------------------------------------
    // Operation plumbing
    // -----------------------------------------------------------------

    /// Run one state-changing operation under the guard with a fresh config
    /// snapshot. Rejections are logged here.
    fn run<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&LedgerConfig) -> Result<T, SluiceError>,
    ) -> Result<T, SluiceError> {
        let result = self
            .guard
            .enter(operation)
            .and_then(|_entered| {
                let config = self.config()?;
                body(&config)
            });
        if let Err(e) = &result {
            warn!(operation, kind = ?e.kind(), error = %e, "ledger operation rejected");
        }
        result
    }

    fn commit(&self, txn: LedgerTxn<'_, S>) -> Result<Committed, SluiceError> {
        let output = txn.into_output();
        let (forward, undo) = output.batches(&self.store)?;
        debug!(writes = forward.len(), "committing ledger batch");
        self.store.write_batch(forward)?;
        Ok(Committed {
            undo,
            events: output.events,
        })
    }

    fn publish(&self, events: &[LedgerEvent]) {
        for event in events {
            debug!(event = event.name(), "publishing ledger event");
            for sink in &self.sinks {
                sink.publish(event);
            }
        }
    }

    /// Make every payout of a committed operation on behalf of `account`,
    /// then publish its events. A failed transfer undoes the commit and
    /// takes earlier payouts back; whatever cannot be taken back stays
    /// booked as paid so the ledger never owes more than it holds.
    fn pay_out(
        &self,
        account: &Address,
        committed: Committed,
        payouts: &[Payout],
        now: Timestamp,
    ) -> Result<(), SluiceError> {
        for (i, payout) in payouts.iter().enumerate() {
            if payout.amount == 0 {
                continue;
            }
            let sent = self.bank.transfer(
                &payout.token,
                &self.address,
                &payout.recipient,
                payout.amount,
            );
            if let Err(e) = sent {
                warn!(
                    token = %payout.token,
                    recipient = %payout.recipient,
                    amount = payout.amount,
                    error = %e,
                    "payout failed, rolling back"
                );
                self.store.write_batch(committed.undo).map_err(|undo_err| {
                    SluiceError::Storage(format!(
                        "payout failed ({}) and rollback failed ({})",
                        e, undo_err
                    ))
                })?;
                let kept = self.reclaim(&payouts[..i]);
                if !kept.is_empty() {
                    self.book_kept(account, &kept, now).map_err(|book_err| {
                        SluiceError::Storage(format!(
                            "payout failed ({}) and booking unreclaimed payouts failed ({})",
                            e, book_err
                        ))
                    })?;
                }
                return Err(e);
            }
        }
        self.publish(&committed.events);
        Ok(())
    }

    /// Take `done` payouts back from their recipients. Returns the part of
    /// each payout that did not come back.
    fn reclaim(&self, done: &[Payout]) -> Vec<Payout> {
        let mut kept = Vec::new();
        for payout in done.iter().filter(|p| p.amount > 0) {
            let returned = self.reclaim_one(payout).unwrap_or_else(|e| {
                warn!(
                    token = %payout.token,
                    recipient = %payout.recipient,
                    amount = payout.amount,
                    error = %e,
                    "could not reclaim payout after rollback"
                );
                0
            });
            if returned < payout.amount {
                kept.push(Payout {
                    amount: payout.amount - returned,
                    ..payout.clone()
                });
            }
        }
        kept
    }

    /// Pull up to `payout.amount` back and return what the ledger actually
    /// received, which a transfer fee can make smaller.
    fn reclaim_one(&self, payout: &Payout) -> Result<Amount, SluiceError> {
        let available = self
            .bank
            .balance_of(&payout.token, &payout.recipient)?
            .min(payout.amount);
        if available == 0 {
            return Ok(0);
        }
        let before = self.bank.balance_of(&payout.token, &self.address)?;
        self.bank
            .transfer(&payout.token, &payout.recipient, &self.address, available)?;
        Ok(self
            .bank
            .balance_of(&payout.token, &self.address)?
            .saturating_sub(before))
    }

    /// Charge payouts that stayed with their recipients against `account`'s
    /// restored entitlement.
    fn book_kept(&self, account: &Address, kept: &[Payout], now: Timestamp) -> Result<(), SluiceError> {
        let mut txn = LedgerTxn::new(&self.store);
        let total = txn.receipt_supply()?;
        let balance = txn.receipt_balance(account)?;
        for payout in kept {
            let mut state = txn.require_token(&payout.token)?;
            stream::settle(&mut state, total, now)?;
            claim::forfeit(&mut txn, &mut state, account, balance, total, payout.amount)?;
            txn.put_token(&state)?;
            txn.emit(LedgerEvent::Claimed {
                account: *account,
                token: payout.token,
                recipient: payout.recipient,
                amount: payout.amount,
            });
            warn!(
                account = %account,
                token = %payout.token,
                recipient = %payout.recipient,
                amount = payout.amount,
                "payout could not be reclaimed, booked as paid"
            );
        }
        let committed = self.commit(txn)?;
        self.publish(&committed.events);
        Ok(())
    }

    fn unaccounted_in(
        &self,
        txn: &LedgerTxn<'_, S>,
        config: &LedgerConfig,
        state: &RewardTokenState,
    ) -> Result<Amount, SluiceError> {
        let held = self.bank.balance_of(&state.token, &self.address)?;
        let escrow = if state.token == config.underlying {
            txn.receipt_supply()?
        } else {
            0
        };
        Ok(held.saturating_sub(audit::committed(state, escrow)?))
    }

    // -----------------------------------------------------------------
    // Positions
    // -----------------------------------------------------------------

    /// Stake `amount` of the underlying from `account`. Returns the amount
    /// actually received, which is what gets credited.
    pub fn deposit(&self, account: &Address, amount: Amount, now: Timestamp) -> Result<Amount, SluiceError> {
        self.run("deposit", |config| {
            require_address(account, "account")?;
            require_nonzero(amount, "deposit amount")?;
            if now == 0 {
                return Err(SluiceError::InvalidInput(
                    "deposit time must be positive".to_string(),
                ));
            }

            let mut txn = LedgerTxn::new(&self.store);
            let total = txn.receipt_supply()?;
            let mut tokens = settle_all(&mut txn, total, now)?;
            let balance = txn.receipt_balance(account)?;
            claim::checkpoint_account(&mut txn, &mut tokens, account, balance)?;

            let before = self.bank.balance_of(&config.underlying, &self.address)?;
            self.bank
                .transfer(&config.underlying, account, &self.address, amount)?;
            let received = self
                .bank
                .balance_of(&config.underlying, &self.address)?
                .saturating_sub(before);

            match self.finish_deposit(txn, account, received, now) {
                Ok(()) => Ok(received),
                Err(e) => {
                    if received > 0 {
                        if let Err(refund) =
                            self.bank
                                .transfer(&config.underlying, &self.address, account, received)
                        {
                            warn!(account = %account, received, error = %refund, "deposit refund failed");
                        }
                    }
                    Err(e)
                }
            }
        })
    }

    fn finish_deposit(
        &self,
        mut txn: LedgerTxn<'_, S>,
        account: &Address,
        received: Amount,
        now: Timestamp,
    ) -> Result<(), SluiceError> {
        require_nonzero(received, "received deposit")?;
        let update = position::credit(&mut txn, account, received, now, now)?;
        txn.emit(LedgerEvent::PositionChanged {
            account: *account,
            change: PositionChange::Deposit,
            amount: received,
            balance: update.balance,
            stake_start_time: update.stake_start_time,
        });
        let committed = self.commit(txn)?;
        self.publish(&committed.events);
        info!(account = %account, received, balance = update.balance, "deposit committed");
        Ok(())
    }

    /// Unstake `amount`, paying the principal and every pending reward to
    /// `recipient`.
    pub fn withdraw(
        &self,
        account: &Address,
        amount: Amount,
        recipient: &Address,
        now: Timestamp,
    ) -> Result<Vec<Payout>, SluiceError> {
        self.run("withdraw", |config| {
            require_nonzero(amount, "withdraw amount")?;
            require_address(recipient, "recipient")?;

            let mut txn = LedgerTxn::new(&self.store);
            let total = txn.receipt_supply()?;
            let balance = txn.receipt_balance(account)?;
            if amount > balance {
                return Err(SluiceError::InsufficientBalance(format!(
                    "{} holds {} but {} was requested",
                    account, balance, amount
                )));
            }

            let tokens = settle_all(&mut txn, total, now)?;
            let mut payouts = Vec::new();
            for mut state in tokens {
                let owed = claim::take(&mut txn, &mut state, account, balance, total)?;
                txn.put_token(&state)?;
                if owed > 0 {
                    txn.emit(LedgerEvent::Claimed {
                        account: *account,
                        token: state.token,
                        recipient: *recipient,
                        amount: owed,
                    });
                    payouts.push(Payout {
                        token: state.token,
                        recipient: *recipient,
                        amount: owed,
                    });
                }
            }

            let update = position::debit(&mut txn, account, amount, now)?;
            txn.emit(LedgerEvent::PositionChanged {
                account: *account,
                change: PositionChange::Withdraw,
                amount,
                balance: update.balance,
                stake_start_time: update.stake_start_time,
            });
            payouts.push(Payout {
                token: config.underlying,
                recipient: *recipient,
                amount,
            });

            let committed = self.commit(txn)?;
            self.pay_out(account, committed, &payouts, now)?;
            info!(
                account = %account,
                amount,
                rewards = payouts.len() - 1,
                balance = update.balance,
                "withdraw committed"
            );
            Ok(payouts)
        })
    }

    /// Move `amount` receipts from `from` to `to`. No underlying moves.
    pub fn transfer_receipts(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), SluiceError> {
        self.run("transfer_receipts", |config| {
            require_nonzero(amount, "transfer amount")?;
            require_address(to, "receiver")?;
            if from == to {
                return Err(SluiceError::InvalidInput(
                    "cannot transfer receipts to the sender".to_string(),
                ));
            }

            let mut txn = LedgerTxn::new(&self.store);
            let total = txn.receipt_supply()?;
            let from_balance = txn.receipt_balance(from)?;
            if amount > from_balance {
                return Err(SluiceError::InsufficientBalance(format!(
                    "{} holds {} receipts but {} was requested",
                    from, from_balance, amount
                )));
            }
            let mut tokens = settle_all(&mut txn, total, now)?;
            let to_balance = txn.receipt_balance(to)?;
            claim::checkpoint_account(&mut txn, &mut tokens, from, from_balance)?;
            claim::checkpoint_account(&mut txn, &mut tokens, to, to_balance)?;

            let sender_start = txn.stake_start_time(from)?;
            let sent = position::debit(&mut txn, from, amount, now)?;
            let anchor = if config.transfer_inherits_time {
                sender_start
            } else {
                now
            };
            let received = position::credit(&mut txn, to, amount, anchor, now)?;

            txn.emit(LedgerEvent::PositionChanged {
                account: *from,
                change: PositionChange::TransferOut,
                amount,
                balance: sent.balance,
                stake_start_time: sent.stake_start_time,
            });
            txn.emit(LedgerEvent::PositionChanged {
                account: *to,
                change: PositionChange::TransferIn,
                amount,
                balance: received.balance,
                stake_start_time: received.stake_start_time,
            });

            let committed = self.commit(txn)?;
            self.publish(&committed.events);
            info!(from = %from, to = %to, amount, "receipt transfer committed");
            Ok(())
        })
    }

    // -----------------------------------------------------------------
    // Streams
    // -----------------------------------------------------------------

    /// Stream `amount` of `token` that was already sent to the ledger.
    pub fn accrue(&self, token: &TokenId, amount: Amount, now: Timestamp) -> Result<RewardTokenState, SluiceError> {
        self.run("accrue", |config| {
            self.accrue_with(config, token, Some(amount), now)
                .map(|(state, _)| state)
        })
    }

    /// Stream every unaccounted unit of `token` held by the ledger.
    /// Returns the amount accrued.
    pub fn accrue_unaccounted(&self, token: &TokenId, now: Timestamp) -> Result<Amount, SluiceError> {
        self.run("accrue_unaccounted", |config| {
            self.accrue_with(config, token, None, now)
                .map(|(_, amount)| amount)
        })
    }

    fn accrue_with(
        &self,
        config: &LedgerConfig,
        token: &TokenId,
        amount: Option<Amount>,
        now: Timestamp,
    ) -> Result<(RewardTokenState, Amount), SluiceError> {
        let mut txn = LedgerTxn::new(&self.store);
        let mut state = txn.token(token)?.ok_or_else(|| {
            SluiceError::NotAdmitted(format!("token {} is not tracked", token))
        })?;
        whitelist::require_whitelisted(&state)?;

        let total = txn.receipt_supply()?;
        stream::settle(&mut state, total, now)?;

        let unaccounted = self.unaccounted_in(&txn, config, &state)?;
        let amount = amount.unwrap_or(unaccounted);
        if amount < config.min_reward_amount {
            return Err(SluiceError::InvalidInput(format!(
                "accrual of {} is below the minimum {}",
                amount, config.min_reward_amount
            )));
        }
        if amount > unaccounted {
            return Err(SluiceError::InsufficientBalance(format!(
                "accrual of {} exceeds the {} unaccounted {} held",
                amount, unaccounted, token
            )));
        }

        let carried = stream::restart(&mut state, amount, now, config.stream_window(token))?;
        txn.put_token(&state)?;
        txn.emit(LedgerEvent::Accrued {
            token: *token,
            amount,
        });
        txn.emit(LedgerEvent::StreamStarted {
            token: *token,
            stream_total: state.stream_total,
            carried_over: carried,
            stream_start: state.stream_start,
            stream_end: state.stream_end,
        });

        let committed = self.commit(txn)?;
        self.publish(&committed.events);
        info!(
            token = %token,
            amount,
            carried,
            stream_end = state.stream_end,
            "accrual committed"
        );
        Ok((state, amount))
    }

    // -----------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------

    /// Pay `account`'s share of each listed token's vested pool to
    /// `recipient`. Duplicate tokens are claimed once.
    pub fn claim(
        &self,
        account: &Address,
        tokens: &[TokenId],
        recipient: &Address,
        now: Timestamp,
    ) -> Result<Vec<Payout>, SluiceError> {
        self.run("claim", |_| {
            require_address(recipient, "recipient")?;
            if tokens.is_empty() {
                return Err(SluiceError::InvalidInput(
                    "no tokens to claim".to_string(),
                ));
            }

            let mut txn = LedgerTxn::new(&self.store);
            let total = txn.receipt_supply()?;
            let balance = txn.receipt_balance(account)?;

            let mut seen = HashSet::new();
            let mut payouts = Vec::new();
            for token in tokens.iter().filter(|t| seen.insert(**t)) {
                let mut state = txn.require_token(token)?;
                stream::settle(&mut state, total, now)?;
                let owed = claim::take(&mut txn, &mut state, account, balance, total)?;
                txn.put_token(&state)?;
                if owed > 0 {
                    txn.emit(LedgerEvent::Claimed {
                        account: *account,
                        token: *token,
                        recipient: *recipient,
                        amount: owed,
                    });
                    payouts.push(Payout {
                        token: *token,
                        recipient: *recipient,
                        amount: owed,
                    });
                }
            }

            let committed = self.commit(txn)?;
            self.pay_out(account, committed, &payouts, now)?;
            info!(account = %account, payouts = payouts.len(), "claim committed");
            Ok(payouts)
        })
    }

    // -----------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------

    pub fn admit(&self, caller: &Address, token: &TokenId, now: Timestamp) -> Result<(), SluiceError> {
        self.run("admit", |config| {
            let mut txn = LedgerTxn::new(&self.store);
            whitelist::admit(&mut txn, config, caller, token, now)?;
            let committed = self.commit(txn)?;
            self.publish(&committed.events);
            Ok(())
        })
    }

    pub fn revoke(&self, caller: &Address, token: &TokenId, now: Timestamp) -> Result<(), SluiceError> {
        self.run("revoke", |config| {
            let mut txn = LedgerTxn::new(&self.store);
            let total = txn.receipt_supply()?;
            whitelist::revoke(&mut txn, config, caller, token, total, now)?;
            let committed = self.commit(txn)?;
            self.publish(&committed.events);
            Ok(())
        })
    }

    /// Permissionless removal of a revoked, drained token.
    pub fn cleanup(&self, token: &TokenId) -> Result<(), SluiceError> {
        self.run("cleanup", |_| {
            let mut txn = LedgerTxn::new(&self.store);
            whitelist::cleanup(&mut txn, token)?;
            let committed = self.commit(txn)?;
            self.publish(&committed.events);
            Ok(())
        })
    }

    /// Replace the configuration. Takes effect from the next operation.
    pub fn update_config(&self, caller: &Address, config: LedgerConfig) -> Result<(), SluiceError> {
        self.run("update_config", |current| {
            if *caller != current.config_authority {
                return Err(SluiceError::Unauthorized(format!(
                    "{} is not the config authority",
                    caller
                )));
            }
            if config.underlying != current.underlying {
                return Err(SluiceError::InvalidInput(
                    "the underlying token cannot be changed".to_string(),
                ));
            }
            config.validate()?;

            let mut slot = self
                .config
                .write()
                .map_err(|_| SluiceError::Storage("config lock poisoned".to_string()))?;
            *slot = config;
            drop(slot);

            self.publish(&[LedgerEvent::ConfigUpdated { by: *caller }]);
            info!(by = %caller, "config updated");
            Ok(())
        })
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn position(&self, account: &Address) -> Result<AccountPosition, SluiceError> {
        let txn = LedgerTxn::new(&self.store);
        Ok(AccountPosition {
            account: *account,
            balance: txn.receipt_balance(account)?,
            stake_start_time: txn.stake_start_time(account)?,
        })
    }

    /// Every active position, ordered by account.
    pub fn positions(&self) -> Result<Vec<AccountPosition>, SluiceError> {
        LedgerTxn::new(&self.store).positions()
    }

    /// Total staked, i.e. the outstanding receipt supply.
    pub fn total_staked(&self) -> Result<Amount, SluiceError> {
        LedgerTxn::new(&self.store).receipt_supply()
    }

    /// Stored state of `token`, as of its last settlement.
    pub fn token_state(&self, token: &TokenId) -> Result<Option<RewardTokenState>, SluiceError> {
        LedgerTxn::new(&self.store).token(token)
    }

    pub fn tokens(&self) -> Result<Vec<RewardTokenState>, SluiceError> {
        LedgerTxn::new(&self.store).tokens()
    }

    /// What `account` could claim of `token` at `now`.
    pub fn pending_rewards(
        &self,
        account: &Address,
        token: &TokenId,
        now: Timestamp,
    ) -> Result<Amount, SluiceError> {
        let txn = LedgerTxn::new(&self.store);
        let mut state = txn.require_token(token)?;
        stream::settle(&mut state, txn.receipt_supply()?, now)?;
        let checkpoint = txn.checkpoint(account, token)?;
        claim::pending(&state, &checkpoint, txn.receipt_balance(account)?)
    }

    /// Held balance of `token` not owed to stakers or streams.
    pub fn unaccounted(&self, token: &TokenId) -> Result<Amount, SluiceError> {
        let config = self.config()?;
        let txn = LedgerTxn::new(&self.store);
        let state = txn.require_token(token)?;
        self.unaccounted_in(&txn, &config, &state)
    }

    pub fn voting_power(&self, account: &Address, at: Timestamp) -> Result<u128, SluiceError> {
        let position = self.position(account)?;
        voting::voting_power(position.balance, position.stake_start_time, at)
    }

    pub fn voting_power_snapshot(
        &self,
        account: &Address,
        taken_at: Timestamp,
    ) -> Result<VotingPowerSnapshot, SluiceError> {
        Ok(VotingPowerSnapshot::of(&self.position(account)?, taken_at))
    }

    /// Per-token solvency and receipt peg, without judging them.
    pub fn audit_report(&self) -> Result<LedgerAudit, SluiceError> {
        let config = self.config()?;
        let txn = LedgerTxn::new(&self.store);
        let total_staked = txn.receipt_supply()?;
        let receipts_sum = txn
            .receipt_holdings()?
            .iter()
            .try_fold(0u128, |sum, h| sum.checked_add(h.balance))
            .ok_or_else(|| SluiceError::overflow("receipt holdings"))?;

        let mut tokens = Vec::new();
        for state in txn.tokens()? {
            let held = self.bank.balance_of(&state.token, &self.address)?;
            let escrow = if state.token == config.underlying {
                total_staked
            } else {
                0
            };
            tokens.push(TokenAudit::new(&state, held, escrow)?);
        }
        Ok(LedgerAudit {
            total_staked,
            receipts_sum,
            tokens,
        })
    }

    /// Audit the ledger and fail if any accounting invariant is broken.
    pub fn audit(&self) -> Result<LedgerAudit, SluiceError> {
        let report = self.audit_report()?;
        report.ensure_sound()?;
        Ok(report)
    }
}
