//! End-to-end ledger flows against the in-memory store: the full
//! deposit/freeze/deduct settlement scenario, transfer atomicity, the
//! idempotency law under concurrency, and an invariant fuzz run.

use std::sync::Arc;

use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use exchange_ledger::outbox::{LogPublisher, OutboxDispatcher};
use exchange_ledger::store::{LedgerStore, MemStore};
use exchange_ledger::wallet::{
    EntryKind, Funds, WalletAction, WalletEngine, WalletError, WalletStatus,
};
use exchange_ledger::Currency;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Engine over a fresh in-memory store seeded with one 8-decimal currency.
fn setup() -> (WalletEngine, Arc<MemStore>, Uuid) {
    let store = Arc::new(MemStore::new());
    let currency = Currency::new("BTC", "Bitcoin", 8);
    let currency_id = currency.id;
    store.add_currency(currency);
    let engine = WalletEngine::new(store.clone() as Arc<dyn LedgerStore>);
    (engine, store, currency_id)
}

#[tokio::test]
async fn settlement_scenario_deposit_freeze_deduct() {
    let (engine, _store, currency_id) = setup();
    let user = Uuid::new_v4();

    // Deposit 100.
    let deposit = engine
        .apply(&WalletAction::deposit(user, currency_id, dec("100")))
        .await
        .unwrap();
    let wallet_id = deposit.wallet_id;

    // Hold 40 for an open order.
    engine
        .apply(&WalletAction::freeze(user, wallet_id, dec("40")))
        .await
        .unwrap();
    let wallet = engine.wallet(wallet_id).await.unwrap();
    assert_eq!(wallet.funds.balance(), dec("60"));
    assert_eq!(wallet.funds.frozen(), dec("40"));

    // Spendable is 60 now, so withdrawing 70 must fail.
    let err = engine
        .apply(&WalletAction::withdraw(user, wallet_id, dec("70")))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));

    // The order fills: settle the hold.
    engine
        .apply(&WalletAction::deduct_frozen(user, wallet_id, dec("40")))
        .await
        .unwrap();
    let wallet = engine.wallet(wallet_id).await.unwrap();
    assert_eq!(wallet.funds.balance(), dec("60"));
    assert_eq!(wallet.funds.frozen(), Decimal::ZERO);
    assert_eq!(wallet.funds.total(), dec("60"));

    // Full history in order: deposit, freeze, rejected withdraw absent,
    // deduct_frozen.
    let history = engine.history(user, wallet_id, 10).await.unwrap();
    let kinds: Vec<EntryKind> = history.iter().rev().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EntryKind::Deposit, EntryKind::Freeze, EntryKind::DeductFrozen]
    );
}

#[tokio::test]
async fn freeze_unfreeze_round_trip_restores_funds() {
    let (engine, _store, currency_id) = setup();
    let user = Uuid::new_v4();
    let deposit = engine
        .apply(&WalletAction::deposit(user, currency_id, dec("55.5")))
        .await
        .unwrap();

    let before = engine.wallet(deposit.wallet_id).await.unwrap().funds;
    engine
        .apply(&WalletAction::freeze(user, deposit.wallet_id, dec("12.25")))
        .await
        .unwrap();
    engine
        .apply(&WalletAction::unfreeze(user, deposit.wallet_id, dec("12.25")))
        .await
        .unwrap();
    let after = engine.wallet(deposit.wallet_id).await.unwrap().funds;

    assert_eq!(before, after);
}

#[tokio::test]
async fn transfer_moves_funds_atomically_with_joint_audit() {
    let (engine, store, currency_id) = setup();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let a_dep = engine
        .apply(&WalletAction::deposit(alice, currency_id, dec("100")))
        .await
        .unwrap();
    let b_dep = engine
        .apply(&WalletAction::deposit(bob, currency_id, dec("1")))
        .await
        .unwrap();

    let debit = engine
        .apply(&WalletAction::internal_transfer(
            alice,
            a_dep.wallet_id,
            b_dep.wallet_id,
            dec("50"),
        ))
        .await
        .unwrap();
    assert_eq!(debit.wallet_id, a_dep.wallet_id);
    assert_eq!(debit.kind, EntryKind::InternalTransfer);

    let a = engine.wallet(a_dep.wallet_id).await.unwrap();
    let b = engine.wallet(b_dep.wallet_id).await.unwrap();
    assert_eq!(a.funds.balance(), dec("50"));
    assert_eq!(b.funds.balance(), dec("51"));

    // Both legs share one transaction_id; only the debit leg carries the
    // action_id.
    let a_history = engine.history(alice, a_dep.wallet_id, 10).await.unwrap();
    let b_history = engine.history(bob, b_dep.wallet_id, 10).await.unwrap();
    let debit_leg = &a_history[0];
    let credit_leg = &b_history[0];
    assert_eq!(debit_leg.refs.transaction_id, credit_leg.refs.transaction_id);
    assert!(debit_leg.refs.transaction_id.is_some());
    assert!(debit_leg.action_id.is_some());
    assert!(credit_leg.action_id.is_none());

    // 2 deposits + 2 transfer legs.
    assert_eq!(store.entry_count(), 4);
}

#[tokio::test]
async fn transfer_insufficient_changes_neither_wallet() {
    let (engine, store, currency_id) = setup();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let a_dep = engine
        .apply(&WalletAction::deposit(alice, currency_id, dec("10")))
        .await
        .unwrap();
    let b_dep = engine
        .apply(&WalletAction::deposit(bob, currency_id, dec("10")))
        .await
        .unwrap();
    let entries_before = store.entry_count();

    let err = engine
        .apply(&WalletAction::internal_transfer(
            alice,
            a_dep.wallet_id,
            b_dep.wallet_id,
            dec("11"),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));

    let a = engine.wallet(a_dep.wallet_id).await.unwrap();
    let b = engine.wallet(b_dep.wallet_id).await.unwrap();
    assert_eq!(a.funds.balance(), dec("10"));
    assert_eq!(b.funds.balance(), dec("10"));
    assert_eq!(store.entry_count(), entries_before);
}

#[tokio::test]
async fn transfer_to_self_rejected() {
    let (engine, _store, currency_id) = setup();
    let user = Uuid::new_v4();
    let dep = engine
        .apply(&WalletAction::deposit(user, currency_id, dec("10")))
        .await
        .unwrap();

    let err = engine
        .apply(&WalletAction::internal_transfer(
            user,
            dep.wallet_id,
            dep.wallet_id,
            dec("1"),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::SameWallet));
}

/// The idempotency law: N concurrent submissions of one action mutate once
/// and all observe the same entry.
#[tokio::test]
async fn concurrent_retries_apply_once() {
    let (engine, store, currency_id) = setup();
    let user = Uuid::new_v4();
    let action = WalletAction::deposit(user, currency_id, dec("33"));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        let action = action.clone();
        handles.push(tokio::spawn(async move { engine.apply(&action).await }));
    }

    let mut entry_ids = Vec::new();
    for h in handles {
        let entry = h.await.unwrap().unwrap();
        entry_ids.push(entry.id);
    }
    entry_ids.sort();
    entry_ids.dedup();
    assert_eq!(entry_ids.len(), 1);
    assert_eq!(store.entry_count(), 1);

    let wallets = engine.wallets(user).await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].funds.balance(), dec("33"));
}

/// Distinct actions on one wallet serialize through the row lock; the final
/// balance is exactly the sum regardless of interleaving.
#[tokio::test]
async fn concurrent_distinct_deposits_serialize() {
    let (engine, _store, currency_id) = setup();
    let user = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .apply(&WalletAction::deposit(user, currency_id, dec("1")))
                .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let wallets = engine.wallets(user).await.unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].funds.balance(), dec("20"));

    // Balance snapshots on the entries form a gapless chain.
    let mut entries = engine
        .history(user, wallets[0].id, 100)
        .await
        .unwrap();
    entries.reverse();
    let mut expected = Decimal::ZERO;
    for entry in &entries {
        assert_eq!(entry.balance_before, expected);
        expected += dec("1");
        assert_eq!(entry.balance_after, expected);
    }
}

/// Mixed credits and debits race on one wallet; some withdrawals lose to
/// insufficient funds depending on the interleaving, but the final balance
/// must equal the seed plus exactly the accepted operations, and the entry
/// chain must replay to the same number.
#[tokio::test]
async fn concurrent_deposits_and_withdrawals_serialize() {
    let (engine, _store, currency_id) = setup();
    let user = Uuid::new_v4();
    let seed = engine
        .apply(&WalletAction::deposit(user, currency_id, dec("10")))
        .await
        .unwrap();
    let wallet_id = seed.wallet_id;

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let action = if i % 2 == 0 {
                WalletAction::deposit(user, currency_id, dec("1"))
            } else {
                WalletAction::withdraw(user, wallet_id, dec("3"))
            };
            let delta = if i % 2 == 0 { dec("1") } else { dec("-3") };
            engine.apply(&action).await.map(|_| delta)
        }));
    }

    let mut accepted = Decimal::ZERO;
    let mut rejections = 0usize;
    for h in handles {
        match h.await.unwrap() {
            Ok(delta) => accepted += delta,
            Err(WalletError::InsufficientFunds) => rejections += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let wallet = engine.wallet(wallet_id).await.unwrap();
    assert_eq!(wallet.funds.balance(), dec("10") + accepted);
    assert!(wallet.funds.balance() >= Decimal::ZERO);

    // Rejected withdrawals leave no trace; the accepted entries replay to
    // the observed balance.
    let entries = engine.history(user, wallet_id, 100).await.unwrap();
    assert_eq!(entries.len(), 21 - rejections);
    let replayed: Decimal = entries
        .iter()
        .map(|e| match e.kind {
            EntryKind::Deposit => e.amount,
            EntryKind::Withdraw => -e.amount,
            other => panic!("unexpected entry kind: {other:?}"),
        })
        .sum();
    assert_eq!(replayed, dec("10") + accepted);
}

#[tokio::test]
async fn outbox_records_every_mutation_and_drains_in_order() {
    let (engine, store, currency_id) = setup();
    let user = Uuid::new_v4();
    let dep = engine
        .apply(&WalletAction::deposit(user, currency_id, dec("100")))
        .await
        .unwrap();
    engine
        .apply(&WalletAction::freeze(user, dep.wallet_id, dec("40")))
        .await
        .unwrap();
    engine
        .apply(&WalletAction::deduct_frozen(user, dep.wallet_id, dec("40")))
        .await
        .unwrap();
    assert_eq!(store.event_count(), 3);

    let pending = store.fetch_pending(100, 100).await.unwrap();
    assert_eq!(pending.len(), 3);
    // Same pair (the wallet), gapless sequence in commit order.
    let sequences: Vec<i64> = pending.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(pending[0].event_type, "wallet.deposit");
    assert_eq!(pending[1].event_type, "wallet.freeze");
    assert_eq!(pending[2].event_type, "wallet.deduct_frozen");

    let dispatcher = OutboxDispatcher::with_defaults(
        store.clone() as Arc<dyn LedgerStore>,
        Arc::new(LogPublisher),
    );
    assert_eq!(dispatcher.drain_once().await.unwrap(), 3);
    assert!(store.fetch_pending(100, 100).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_mutations_emit_no_events() {
    let (engine, store, currency_id) = setup();
    let user = Uuid::new_v4();
    let dep = engine
        .apply(&WalletAction::deposit(user, currency_id, dec("5")))
        .await
        .unwrap();

    let _ = engine
        .apply(&WalletAction::withdraw(user, dep.wallet_id, dec("6")))
        .await
        .unwrap_err();
    assert_eq!(store.event_count(), 1); // only the deposit
}

#[tokio::test]
async fn status_change_leaves_event_and_audit_entry() {
    let (engine, store, currency_id) = setup();
    let user = Uuid::new_v4();
    let dep = engine
        .apply(&WalletAction::deposit(user, currency_id, dec("5")))
        .await
        .unwrap();

    engine
        .set_status(dep.wallet_id, WalletStatus::Frozen)
        .await
        .unwrap();

    let pending = store.fetch_pending(100, 100).await.unwrap();
    let statuses: Vec<&str> = pending
        .iter()
        .map(|e| e.event_type.as_str())
        .collect();
    assert!(statuses.contains(&"wallet.status_changed"));

    // The transition is reconstructible from the ledger alone.
    let history = engine.history(user, dep.wallet_id, 10).await.unwrap();
    let marker = &history[0];
    assert_eq!(marker.kind, EntryKind::StatusChange);
    assert_eq!(marker.amount, Decimal::ZERO);
    assert_eq!(marker.balance_before, marker.balance_after);
    assert_eq!(marker.refs.meta.as_deref(), Some("active -> frozen"));
}

/// Random walk over all single-wallet operations; the non-negativity and
/// conservation invariants must hold after every step, accepted or not.
#[tokio::test]
async fn invariant_fuzz_random_operations() {
    let (engine, _store, currency_id) = setup();
    let user = Uuid::new_v4();
    let dep = engine
        .apply(&WalletAction::deposit(user, currency_id, dec("1000")))
        .await
        .unwrap();
    let wallet_id = dep.wallet_id;

    let mut rng = rand::thread_rng();
    let mut expected: Funds = engine.wallet(wallet_id).await.unwrap().funds;

    for _ in 0..300 {
        let amount = Decimal::from(rng.gen_range(1..=200i64));
        let op = rng.gen_range(0..6);
        let action = match op {
            0 => WalletAction::deposit(user, currency_id, amount),
            1 => WalletAction::withdraw(user, wallet_id, amount),
            2 => WalletAction::freeze(user, wallet_id, amount),
            3 => WalletAction::unfreeze(user, wallet_id, amount),
            4 => WalletAction::deduct_frozen(user, wallet_id, amount),
            _ => WalletAction::adjust(
                user,
                wallet_id,
                if rng.gen_bool(0.5) { amount } else { -amount },
            ),
        };

        // Mirror the op on a model copy; both sides must accept or reject
        // identically.
        let mut model = expected;
        let model_result = match op {
            0 => model.deposit(amount),
            1 => model.withdraw(amount),
            2 => model.freeze(amount),
            3 => model.unfreeze(amount),
            4 => model.deduct_frozen(amount),
            _ => model.adjust(action.amount),
        };

        let engine_result = engine.apply(&action).await;
        assert_eq!(
            engine_result.is_ok(),
            model_result.is_ok(),
            "engine and model diverged on op {op} amount {amount}"
        );
        if model_result.is_ok() {
            expected = model;
        }

        let funds = engine.wallet(wallet_id).await.unwrap().funds;
        assert!(funds.balance() >= Decimal::ZERO);
        assert!(funds.frozen() >= Decimal::ZERO);
        assert_eq!(funds, expected);
    }
}
