// crates/sluice-ledger/tests/ledger_properties.rs
//
// End-to-end properties of the ledger engine.
//
// Drives the public engine API against an in-memory bank and store (and
// RocksDB for the persistence case), checking accounting closure, vesting,
// claims, admission, voting power, reentrancy, and rollback behavior.

use std::sync::{Arc, Mutex, OnceLock};

use uuid::Uuid;

use sluice_core::error::{ErrorKind, SluiceError};
use sluice_core::events::{LedgerEvent, PositionChange};
use sluice_core::traits::{LedgerStore, TokenBank};
use sluice_core::types::{Address, Amount, Timestamp, TokenId};
use sluice_ledger::{
    LedgerConfig, LedgerEngine, MemoryBank, MemoryEventLog, SECONDS_PER_DAY,
};
use sluice_store::{MemoryStore, RocksStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const LEDGER: Address = Address([0xee; 32]);
const UNDERLYING: TokenId = TokenId([0x01; 32]);
const REWARD: TokenId = TokenId([0x02; 32]);
const OTHER: TokenId = TokenId([0x03; 32]);

const TOKEN_AUTHORITY: Address = Address([0xa1; 32]);
const CONFIG_AUTHORITY: Address = Address([0xc1; 32]);

const ALICE: Address = Address([0x0a; 32]);
const BOB: Address = Address([0x0b; 32]);
const CAROL: Address = Address([0x0c; 32]);

type Engine<S> = LedgerEngine<S, Arc<MemoryBank>>;

fn test_config(window: Timestamp) -> LedgerConfig {
    let mut config = LedgerConfig::new(UNDERLYING, TOKEN_AUTHORITY, CONFIG_AUTHORITY);
    config.default_stream_window_secs = window;
    config.min_reward_amount = 1;
    config
}

fn build<S: LedgerStore>(
    store: S,
    config: LedgerConfig,
) -> (Engine<S>, Arc<MemoryBank>, Arc<MemoryEventLog>) {
    let bank = Arc::new(MemoryBank::new());
    let log = Arc::new(MemoryEventLog::new());
    let engine = LedgerEngine::new(LEDGER, store, bank.clone(), config)
        .expect("engine opens")
        .with_event_sink(log.clone());
    (engine, bank, log)
}

fn memory_ledger(window: Timestamp) -> (Engine<MemoryStore>, Arc<MemoryBank>, Arc<MemoryEventLog>) {
    build(MemoryStore::new(), test_config(window))
}

/// Mint `amount` of the underlying to `account` and stake all of it.
fn stake<S: LedgerStore>(
    engine: &Engine<S>,
    bank: &MemoryBank,
    account: &Address,
    amount: Amount,
    now: Timestamp,
) {
    bank.mint(&UNDERLYING, account, amount).unwrap();
    engine.deposit(account, amount, now).unwrap();
}

/// Send `amount` of `token` to the ledger and stream it.
fn fund<S: LedgerStore>(
    engine: &Engine<S>,
    bank: &MemoryBank,
    token: &TokenId,
    amount: Amount,
    now: Timestamp,
) {
    bank.mint(token, &LEDGER, amount).unwrap();
    engine.accrue(token, amount, now).unwrap();
}

fn temp_db_path(label: &str) -> String {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("sluice_test_{}_{}", label, Uuid::now_v7()));
    path.to_string_lossy().to_string()
}

// ---------------------------------------------------------------------------
// Accounting closure
// ---------------------------------------------------------------------------

#[test]
fn test_accounting_closure_after_every_operation() {
    let (engine, bank, _) = memory_ledger(100);
    engine.audit().unwrap();

    stake(&engine, &bank, &ALICE, 1_000, 1);
    engine.audit().unwrap();

    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 701, 1);
    engine.audit().unwrap();

    stake(&engine, &bank, &BOB, 1_000, 30);
    engine.audit().unwrap();

    engine.transfer_receipts(&ALICE, &CAROL, 333, 45).unwrap();
    engine.audit().unwrap();

    engine.claim(&ALICE, &[REWARD, UNDERLYING], &ALICE, 60).unwrap();
    engine.audit().unwrap();

    bank.mint(&UNDERLYING, &LEDGER, 97).unwrap();
    engine.accrue_unaccounted(&UNDERLYING, 70).unwrap();
    engine.audit().unwrap();

    engine.withdraw(&BOB, 500, &BOB, 90).unwrap();
    engine.audit().unwrap();

    engine.claim(&CAROL, &[REWARD, UNDERLYING], &CAROL, 400).unwrap();
    engine.withdraw(&ALICE, 667, &ALICE, 400).unwrap();
    engine.withdraw(&BOB, 500, &BOB, 400).unwrap();
    let report = engine.audit().unwrap();

    assert_eq!(report.total_staked, 333);
    assert_eq!(report.receipts_sum, 333);
    for token in &report.tokens {
        // Only integer-division dust may be left unclaimed
        assert!(token.pool < 10, "pool {} left in {}", token.pool, token.token);
        assert_eq!(token.unvested, 0);
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[test]
fn test_mid_stream_accrual_carries_unvested_remainder() {
    let (engine, bank, log) = memory_ledger(3 * SECONDS_PER_DAY);
    let start = 1;
    stake(&engine, &bank, &ALICE, 1_000, start);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, start).unwrap();
    fund(&engine, &bank, &REWARD, 600, start);

    let day_one = start + SECONDS_PER_DAY;
    fund(&engine, &bank, &REWARD, 1, day_one);

    let state = engine.token_state(&REWARD).unwrap().unwrap();
    assert_eq!(state.stream_total, 401);
    assert_eq!(state.available_pool, 200);
    assert_eq!(state.stream_start, day_one);
    assert_eq!(state.stream_end, day_one + 3 * SECONDS_PER_DAY);

    let restarted = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            LedgerEvent::StreamStarted { carried_over, .. } => Some(carried_over),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(restarted, vec![0, 400]);
}

#[test]
fn test_paused_stream_resumes_with_total_intact() {
    let (engine, bank, _) = memory_ledger(100);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 10).unwrap();
    fund(&engine, &bank, &REWARD, 1_000, 10);

    // Nobody staked for 490 seconds
    stake(&engine, &bank, &ALICE, 100, 500);
    let state = engine.token_state(&REWARD).unwrap().unwrap();
    assert_eq!(state.stream_total, 1_000);
    assert_eq!(state.available_pool, 0);
    assert_eq!(state.stream_start, 500);
    assert_eq!(state.stream_end, 600);

    assert_eq!(engine.pending_rewards(&ALICE, &REWARD, 550).unwrap(), 500);
    let payouts = engine.claim(&ALICE, &[REWARD], &ALICE, 700).unwrap();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].amount, 1_000);
    assert_eq!(bank.balance_of(&REWARD, &ALICE).unwrap(), 1_000);
}

#[test]
fn test_accrue_requirements() {
    let (engine, bank, _) = memory_ledger(100);
    bank.mint(&OTHER, &LEDGER, 50).unwrap();
    assert!(matches!(
        engine.accrue(&OTHER, 50, 1),
        Err(SluiceError::NotAdmitted(_))
    ));

    let mut config = engine.config().unwrap();
    config.min_reward_amount = 10;
    engine.update_config(&CONFIG_AUTHORITY, config).unwrap();
    engine.admit(&TOKEN_AUTHORITY, &OTHER, 1).unwrap();

    assert!(matches!(
        engine.accrue(&OTHER, 9, 2),
        Err(SluiceError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.accrue(&OTHER, 51, 2),
        Err(SluiceError::InsufficientBalance(_))
    ));
    engine.accrue(&OTHER, 50, 2).unwrap();
}

#[test]
fn test_clock_going_backwards_rejected() {
    let (engine, bank, _) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 10, 100);
    bank.mint(&UNDERLYING, &BOB, 10).unwrap();
    let err = engine.deposit(&BOB, 10, 50).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(bank.balance_of(&UNDERLYING, &BOB).unwrap(), 10);
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

#[test]
fn test_equal_stakers_split_pool_evenly() {
    let (engine, bank, _) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 500, 1);
    stake(&engine, &bank, &BOB, 500, 1);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 700, 1);

    let a = engine.claim(&ALICE, &[REWARD], &ALICE, 150).unwrap();
    // Claiming later does not change the share
    let b = engine.claim(&BOB, &[REWARD], &BOB, 900).unwrap();
    assert_eq!(a[0].amount, 350);
    assert_eq!(b[0].amount, 350);
    assert_eq!(engine.token_state(&REWARD).unwrap().unwrap().available_pool, 0);
}

#[test]
fn test_claim_with_zero_balance_is_noop() {
    let (engine, bank, log) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 500, 1);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 700, 1);
    let before = log.len();

    let payouts = engine.claim(&CAROL, &[REWARD, REWARD], &CAROL, 50).unwrap();
    assert!(payouts.is_empty());
    assert_eq!(log.len(), before);
}

#[test]
fn test_withdraw_pays_pending_rewards() {
    let (engine, bank, log) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 100, 1);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 100, 1);

    let payouts = engine.withdraw(&ALICE, 40, &CAROL, 51).unwrap();
    assert_eq!(payouts.len(), 2);
    assert_eq!(bank.balance_of(&REWARD, &CAROL).unwrap(), 50);
    assert_eq!(bank.balance_of(&UNDERLYING, &CAROL).unwrap(), 40);

    let kinds = log
        .events()
        .into_iter()
        .rev()
        .take(2)
        .map(|e| e.name())
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["position_changed", "claimed"]);
}

#[test]
fn test_receipt_transfer_keeps_earned_rewards() {
    let (engine, bank, _) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 100, 100);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 100).unwrap();
    fund(&engine, &bank, &REWARD, 1_000, 100);

    engine.transfer_receipts(&ALICE, &BOB, 50, 150).unwrap();
    assert_eq!(engine.pending_rewards(&ALICE, &REWARD, 150).unwrap(), 500);
    assert_eq!(engine.pending_rewards(&BOB, &REWARD, 150).unwrap(), 0);

    let alice = engine.claim(&ALICE, &[REWARD], &ALICE, 200).unwrap();
    let bob = engine.claim(&BOB, &[REWARD], &BOB, 200).unwrap();
    assert_eq!(alice[0].amount, 750);
    assert_eq!(bob[0].amount, 250);
}

// ---------------------------------------------------------------------------
// Isolation
// ---------------------------------------------------------------------------

#[test]
fn test_work_on_one_token_leaves_another_untouched() {
    let (engine, bank, _) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 100, 1);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    engine.admit(&TOKEN_AUTHORITY, &OTHER, 1).unwrap();
    fund(&engine, &bank, &REWARD, 1_000, 1);
    fund(&engine, &bank, &OTHER, 1_000, 1);

    let reward_before = engine.token_state(&REWARD).unwrap().unwrap();
    let pending_before = engine.pending_rewards(&ALICE, &REWARD, 80).unwrap();

    fund(&engine, &bank, &OTHER, 500, 40);
    engine.claim(&ALICE, &[OTHER], &ALICE, 60).unwrap();
    fund(&engine, &bank, &OTHER, 77, 70);

    let reward_after = engine.token_state(&REWARD).unwrap().unwrap();
    assert_eq!(
        serde_json::to_vec(&reward_before).unwrap(),
        serde_json::to_vec(&reward_after).unwrap()
    );
    assert_eq!(
        engine.pending_rewards(&ALICE, &REWARD, 80).unwrap(),
        pending_before
    );
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

#[test]
fn test_admit_drain_revoke_readmit() {
    let (engine, bank, _) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 100, 1);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 100, 1);

    // Still streaming
    assert!(matches!(
        engine.revoke(&TOKEN_AUTHORITY, &REWARD, 50),
        Err(SluiceError::PreconditionViolated(_))
    ));
    assert!(matches!(
        engine.admit(&TOKEN_AUTHORITY, &REWARD, 50),
        Err(SluiceError::PreconditionViolated(_))
    ));

    // Vested but unclaimed
    assert!(matches!(
        engine.revoke(&TOKEN_AUTHORITY, &REWARD, 200),
        Err(SluiceError::PreconditionViolated(_))
    ));

    engine.claim(&ALICE, &[REWARD], &ALICE, 200).unwrap();
    engine.revoke(&TOKEN_AUTHORITY, &REWARD, 200).unwrap();
    assert!(matches!(
        engine.accrue(&REWARD, 1, 210),
        Err(SluiceError::NotAdmitted(_))
    ));

    engine.admit(&TOKEN_AUTHORITY, &REWARD, 300).unwrap();
    let state = engine.token_state(&REWARD).unwrap().unwrap();
    assert!(state.whitelisted);
    assert_eq!(state.available_pool, 0);
    assert_eq!(state.stream_total, 0);
    assert_eq!(state.stream_vested, 0);
    assert_eq!(state.stream_start, 300);
    assert_eq!(state.stream_end, 300);

    // The re-admitted token streams and pays out normally
    fund(&engine, &bank, &REWARD, 100, 300);
    let payouts = engine.claim(&ALICE, &[REWARD], &ALICE, 400).unwrap();
    assert_eq!(payouts[0].amount, 100);
}

#[test]
fn test_uneven_split_drains_and_revokes() {
    let (engine, bank, _) = memory_ledger(100);
    for account in [&ALICE, &BOB, &CAROL] {
        stake(&engine, &bank, account, 1, 1);
    }
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 100, 1);

    for account in [&ALICE, &BOB, &CAROL] {
        let payouts = engine.claim(account, &[REWARD], account, 200).unwrap();
        assert_eq!(payouts[0].amount, 33);
    }
    assert_eq!(engine.token_state(&REWARD).unwrap().unwrap().available_pool, 1);

    engine.withdraw(&ALICE, 1, &ALICE, 300).unwrap();
    engine.withdraw(&BOB, 1, &BOB, 300).unwrap();
    let last = engine.withdraw(&CAROL, 1, &CAROL, 300).unwrap();
    assert!(last.iter().any(|p| p.token == REWARD && p.amount == 1));

    let state = engine.token_state(&REWARD).unwrap().unwrap();
    assert!(state.is_drained());
    assert_eq!(state.reward_carry, 0);
    assert_eq!(bank.balance_of(&REWARD, &LEDGER).unwrap(), 0);

    engine.revoke(&TOKEN_AUTHORITY, &REWARD, 300).unwrap();
    engine.cleanup(&REWARD).unwrap();
    assert!(engine.token_state(&REWARD).unwrap().is_none());
    engine.audit().unwrap();
}

#[test]
fn test_rounding_dust_stays_claimable() {
    let (engine, bank, _) = memory_ledger(100);
    for account in [&ALICE, &BOB, &CAROL] {
        stake(&engine, &bank, account, 1, 1);
    }
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 100, 1);
    for account in [&ALICE, &BOB, &CAROL] {
        engine.claim(account, &[REWARD], account, 200).unwrap();
    }

    // Still staked by all three: the leftover unit cannot be split yet
    assert!(engine.claim(&CAROL, &[REWARD], &CAROL, 250).unwrap().is_empty());

    engine.withdraw(&ALICE, 1, &ALICE, 300).unwrap();
    engine.withdraw(&BOB, 1, &BOB, 300).unwrap();
    assert_eq!(engine.pending_rewards(&CAROL, &REWARD, 300).unwrap(), 1);
    let payouts = engine.claim(&CAROL, &[REWARD], &CAROL, 300).unwrap();
    assert_eq!(payouts[0].amount, 1);
    assert_eq!(bank.balance_of(&REWARD, &CAROL).unwrap(), 34);
    assert_eq!(engine.token_state(&REWARD).unwrap().unwrap().available_pool, 0);
    engine.audit().unwrap();
}

#[test]
fn test_admission_requires_token_authority() {
    let (engine, _, _) = memory_ledger(100);
    assert!(matches!(
        engine.admit(&ALICE, &REWARD, 1),
        Err(SluiceError::Unauthorized(_))
    ));
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    assert!(matches!(
        engine.revoke(&ALICE, &REWARD, 1),
        Err(SluiceError::Unauthorized(_))
    ));
    assert!(matches!(
        engine.revoke(&TOKEN_AUTHORITY, &UNDERLYING, 1),
        Err(SluiceError::PreconditionViolated(_))
    ));
}

#[test]
fn test_slot_limit_and_cleanup() {
    let mut config = test_config(100);
    config.max_reward_tokens = 2;
    let (engine, _, log) = build(MemoryStore::new(), config);

    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    assert!(matches!(
        engine.admit(&TOKEN_AUTHORITY, &OTHER, 1),
        Err(SluiceError::PreconditionViolated(_))
    ));

    // Revoked records still hold their slot until cleaned up
    engine.revoke(&TOKEN_AUTHORITY, &REWARD, 2).unwrap();
    assert!(engine.admit(&TOKEN_AUTHORITY, &OTHER, 3).is_err());

    engine.cleanup(&REWARD).unwrap();
    assert!(engine.token_state(&REWARD).unwrap().is_none());
    engine.admit(&TOKEN_AUTHORITY, &OTHER, 4).unwrap();

    assert!(log
        .events()
        .iter()
        .any(|e| matches!(e, LedgerEvent::TokenCleanedUp { token } if *token == REWARD)));
}

// ---------------------------------------------------------------------------
// Voting power
// ---------------------------------------------------------------------------

#[test]
fn test_voting_power_precision_on_large_withdrawal() {
    let (engine, bank, _) = memory_ledger(100);
    let year = 365 * SECONDS_PER_DAY;
    let start = 1;
    stake(&engine, &bank, &ALICE, 1_000_000, start);

    let now = start + year;
    engine.withdraw(&ALICE, 999_000, &ALICE, now).unwrap();

    let position = engine.position(&ALICE).unwrap();
    assert_eq!(position.balance, 1_000);
    assert_eq!(now - position.stake_start_time, 31_536);
    assert_eq!(engine.voting_power(&ALICE, now).unwrap(), 1_000 * 31_536);
}

#[test]
fn test_receipt_transfer_voting_power() {
    let (engine, bank, log) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 100, 100);
    engine.transfer_receipts(&ALICE, &BOB, 50, 200).unwrap();

    assert_eq!(engine.position(&ALICE).unwrap().stake_start_time, 150);
    assert_eq!(engine.voting_power(&ALICE, 200).unwrap(), 2_500);
    // Received receipts start fresh
    assert_eq!(engine.voting_power(&BOB, 200).unwrap(), 0);
    assert_eq!(engine.voting_power(&BOB, 300).unwrap(), 5_000);

    let changes = log
        .events()
        .into_iter()
        .filter_map(|e| match e {
            LedgerEvent::PositionChanged { change, .. } => Some(change),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        changes,
        vec![
            PositionChange::Deposit,
            PositionChange::TransferOut,
            PositionChange::TransferIn
        ]
    );
}

#[test]
fn test_transfer_can_inherit_stake_time() {
    let (engine, bank, _) = memory_ledger(100);
    let mut config = engine.config().unwrap();
    config.transfer_inherits_time = true;
    engine.update_config(&CONFIG_AUTHORITY, config).unwrap();

    stake(&engine, &bank, &ALICE, 100, 100);
    engine.transfer_receipts(&ALICE, &BOB, 50, 200).unwrap();
    assert_eq!(engine.position(&BOB).unwrap().stake_start_time, 100);
    assert_eq!(engine.voting_power(&BOB, 200).unwrap(), 5_000);
}

#[test]
fn test_voting_power_snapshot_is_frozen() {
    let (engine, bank, _) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 10, 100);
    let snapshot = engine.voting_power_snapshot(&ALICE, 200).unwrap();

    engine.withdraw(&ALICE, 10, &ALICE, 250).unwrap();
    assert_eq!(engine.voting_power(&ALICE, 300).unwrap(), 0);
    assert_eq!(snapshot.power().unwrap(), 1_000);
}

// ---------------------------------------------------------------------------
// Token behavior at the bank boundary
// ---------------------------------------------------------------------------

#[test]
fn test_fee_on_transfer_credits_received_amount() {
    let (engine, bank, _) = memory_ledger(100);
    bank.set_transfer_fee_bps(&UNDERLYING, 100).unwrap();
    bank.mint(&UNDERLYING, &ALICE, 1_000).unwrap();

    let received = engine.deposit(&ALICE, 1_000, 1).unwrap();
    assert_eq!(received, 990);
    assert_eq!(engine.position(&ALICE).unwrap().balance, 990);
    assert_eq!(engine.total_staked().unwrap(), 990);
    engine.audit().unwrap();
}

#[test]
fn test_reentrant_call_from_transfer_rejected() {
    let (engine, bank, _) = memory_ledger(100);
    let engine = Arc::new(engine);

    let slot: Arc<OnceLock<Arc<Engine<MemoryStore>>>> = Arc::new(OnceLock::new());
    let rejected: Arc<Mutex<Vec<ErrorKind>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let slot = slot.clone();
        let rejected = rejected.clone();
        bank.set_transfer_hook(Some(Arc::new(
            move |_: &TokenId, _: &Address, _: &Address, _: Amount| {
                if let Some(engine) = slot.get() {
                    if let Err(e) = engine.claim(&ALICE, &[UNDERLYING], &ALICE, 5) {
                        rejected.lock().unwrap().push(e.kind());
                    }
                }
            },
        )))
        .unwrap();
    }
    assert!(slot.set(engine.clone()).is_ok());

    stake(&engine, &bank, &ALICE, 100, 1);
    engine.withdraw(&ALICE, 100, &ALICE, 10).unwrap();

    let rejected = rejected.lock().unwrap().clone();
    assert_eq!(rejected, vec![ErrorKind::Reentrancy, ErrorKind::Reentrancy]);

    // Guard is released once the outer call returns
    bank.set_transfer_hook(None).unwrap();
    stake(&engine, &bank, &BOB, 5, 20);
}

#[test]
fn test_failed_payout_rolls_back() {
    let (engine, bank, log) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 100, 1);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 100, 1);
    let events_before = log.len();
    let reward_before = engine.token_state(&REWARD).unwrap().unwrap();

    bank.set_blocked(&CAROL, true).unwrap();
    let err = engine.withdraw(&ALICE, 100, &CAROL, 200).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transfer);

    assert_eq!(engine.position(&ALICE).unwrap().balance, 100);
    assert_eq!(engine.total_staked().unwrap(), 100);
    assert_eq!(engine.token_state(&REWARD).unwrap().unwrap(), reward_before);
    assert_eq!(bank.balance_of(&REWARD, &LEDGER).unwrap(), 100);
    assert_eq!(log.len(), events_before);
    engine.audit().unwrap();

    bank.set_blocked(&CAROL, false).unwrap();
    engine.withdraw(&ALICE, 100, &CAROL, 200).unwrap();
    assert_eq!(bank.balance_of(&REWARD, &CAROL).unwrap(), 100);
    assert_eq!(bank.balance_of(&UNDERLYING, &CAROL).unwrap(), 100);
}

#[test]
fn test_unreclaimable_payout_is_booked_as_paid() {
    let (engine, bank, log) = memory_ledger(100);
    stake(&engine, &bank, &ALICE, 100, 1);
    engine.admit(&TOKEN_AUTHORITY, &REWARD, 1).unwrap();
    fund(&engine, &bank, &REWARD, 100, 1);
    bank.set_transfer_fee_bps(&REWARD, 100).unwrap();

    // CAROL becomes unreachable right after receiving the reward payout
    {
        let hook_bank = bank.clone();
        bank.set_transfer_hook(Some(Arc::new(
            move |token: &TokenId, _: &Address, to: &Address, _: Amount| {
                if *token == REWARD && *to == CAROL {
                    hook_bank.set_blocked(&CAROL, true).unwrap();
                }
            },
        )))
        .unwrap();
    }
    let events_before = log.len();

    let err = engine.withdraw(&ALICE, 100, &CAROL, 200).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transfer);
    bank.set_transfer_hook(None).unwrap();

    // Principal stays staked; 99 of the 100 reward came back, 1 was burned
    assert_eq!(engine.position(&ALICE).unwrap().balance, 100);
    assert_eq!(bank.balance_of(&REWARD, &CAROL).unwrap(), 0);
    assert_eq!(bank.balance_of(&REWARD, &LEDGER).unwrap(), 99);
    let state = engine.token_state(&REWARD).unwrap().unwrap();
    assert_eq!(state.available_pool, 99);
    assert_eq!(state.unvested(), 0);
    assert_eq!(engine.pending_rewards(&ALICE, &REWARD, 200).unwrap(), 99);
    engine.audit().unwrap();

    // Only the unit that stayed out is reported
    let events = log.events();
    assert_eq!(events.len(), events_before + 1);
    assert!(matches!(
        events.last(),
        Some(LedgerEvent::Claimed { amount: 1, .. })
    ));

    bank.set_blocked(&CAROL, false).unwrap();
    engine.withdraw(&ALICE, 100, &ALICE, 300).unwrap();
    assert_eq!(bank.balance_of(&REWARD, &ALICE).unwrap(), 99);
    engine.audit().unwrap();
}

#[test]
fn test_concurrent_operations_are_serialized() {
    let (engine, bank, _) = memory_ledger(100);
    let engine = Arc::new(engine);
    let accounts: Vec<Address> = (0..4u8).map(|i| Address::repeat_byte(0x20 + i)).collect();
    for account in &accounts {
        bank.mint(&UNDERLYING, account, 100).unwrap();
    }

    std::thread::scope(|scope| {
        for account in &accounts {
            let engine = engine.clone();
            scope.spawn(move || engine.deposit(account, 100, 10).unwrap());
        }
    });

    assert_eq!(engine.total_staked().unwrap(), 400);
    assert_eq!(engine.positions().unwrap().len(), 4);
    engine.audit().unwrap();
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_ledger_reopens_from_rocksdb() {
    let path = temp_db_path("reopen");
    let bank = Arc::new(MemoryBank::new());
    bank.mint(&UNDERLYING, &ALICE, 100).unwrap();

    {
        let store = RocksStore::open(&path).unwrap();
        let engine = LedgerEngine::new(LEDGER, store, bank.clone(), test_config(100)).unwrap();
        engine.deposit(&ALICE, 100, 10).unwrap();
    }

    let store = RocksStore::open(&path).unwrap();
    let engine = LedgerEngine::new(LEDGER, store, bank.clone(), test_config(100)).unwrap();
    let position = engine.position(&ALICE).unwrap();
    assert_eq!(position.balance, 100);
    assert_eq!(position.stake_start_time, 10);
    assert_eq!(engine.tokens().unwrap().len(), 1);
    engine.audit().unwrap();

    let _ = std::fs::remove_dir_all(&path);
}
