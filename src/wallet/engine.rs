//! Balance Mutation Engine and Idempotent Action Gate
//!
//! The single authority for changing wallet funds. Every operation follows
//! the same template: begin transaction, lock the wallet row(s), re-check
//! the idempotency key under the lock, validate status and amount, run the
//! funds arithmetic, save the wallet, append the ledger entry, enqueue the
//! outbox event, commit. A publish failure can never roll back a balance
//! change because publishing happens strictly after commit (see
//! `outbox::dispatcher`).
//!
//! Concurrency: the wallet row lock serializes mutations per wallet only;
//! different wallets proceed fully in parallel. Internal transfers lock
//! both wallets in ascending wallet-id order to rule out lock-ordering
//! deadlocks.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::currency::Currency;
use crate::outbox::{OutboxEvent, WalletEventPayload};
use crate::store::{LedgerStore, LedgerTx};

use super::error::WalletError;
use super::models::{
    ActionKind, EntryKind, EntryRefs, Wallet, WalletAction, WalletStatus, WalletTransaction,
};

/// Per-currency balance summary for one user.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WalletSummary {
    pub currency_id: Uuid,
    pub balance: Decimal,
    pub frozen: Decimal,
    pub total: Decimal,
}

/// The mutation engine. Cheap to clone; all state lives in the store.
#[derive(Clone)]
pub struct WalletEngine {
    store: Arc<dyn LedgerStore>,
    op_timeout: Duration,
}

impl WalletEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            op_timeout: Duration::from_secs(10),
        }
    }

    /// Engine configured from the application config; this is the
    /// constructor embedders should use so `op_timeout_ms` takes effect.
    pub fn from_config(store: Arc<dyn LedgerStore>, config: &AppConfig) -> Self {
        Self::new(store).with_timeout(Duration::from_millis(config.op_timeout_ms))
    }

    /// Bound every mutation transaction; on expiry the transaction is
    /// dropped (rolled back) and the action can be resubmitted safely.
    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn op_timeout(&self) -> Duration {
        self.op_timeout
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    // ========================================================================
    // Idempotent Action Gate
    // ========================================================================

    /// Apply a wallet action exactly once.
    ///
    /// Applying the same `action_id` again returns the original ledger
    /// entry without re-mutating, which makes network retries and
    /// at-least-once upstream delivery safe.
    #[instrument(skip(self, action), fields(action_id = %action.action_id, kind = action.kind.as_str()))]
    pub async fn apply(&self, action: &WalletAction) -> Result<WalletTransaction, WalletError> {
        action.validate()?;

        // Fast path: already committed.
        if let Some(prior) = self.store.find_entry_by_action(action.action_id).await? {
            info!(entry_id = %prior.id, "Action already applied - returning prior result");
            return Ok(prior);
        }

        match tokio::time::timeout(self.op_timeout, self.apply_tx(action)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Mutation transaction timed out - rolled back");
                Err(WalletError::Timeout)
            }
        }
    }

    async fn apply_tx(&self, action: &WalletAction) -> Result<WalletTransaction, WalletError> {
        let mut tx = self.store.begin().await?;
        let entry = match action.kind {
            ActionKind::Deposit => self.deposit_tx(&mut tx, action).await?,
            ActionKind::InternalTransfer => self.transfer_tx(&mut tx, action).await?,
            _ => self.single_wallet_tx(&mut tx, action).await?,
        };
        tx.commit().await?;
        info!(entry_id = %entry.id, balance_after = %entry.balance_after, "Wallet action applied");
        Ok(entry)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Deposit: targets (user, currency) and creates the wallet on first
    /// credit, inside the same transaction that takes the row lock, so two
    /// concurrent first deposits cannot both create.
    async fn deposit_tx(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        action: &WalletAction,
    ) -> Result<WalletTransaction, WalletError> {
        let existing = match action.wallet_id {
            Some(wallet_id) => tx.lock_wallet_by_id(wallet_id).await?,
            None => {
                let currency_id = action.currency_id.ok_or(WalletError::CurrencyNotFound)?;
                tx.lock_wallet(action.user_id, currency_id).await?
            }
        };

        if let Some(prior) = tx.find_entry_by_action(action.action_id).await? {
            return Ok(prior);
        }

        let (mut wallet, created) = match existing {
            Some(w) => {
                if w.user_id != action.user_id {
                    return Err(WalletError::WalletUnauthorized);
                }
                (w, false)
            }
            None => {
                // Creation only happens on the (user, currency) path, where
                // that key's lock is held; a missing wallet addressed by id
                // is simply not found.
                if action.wallet_id.is_some() {
                    return Err(WalletError::WalletNotFound);
                }
                let currency_id = action.currency_id.ok_or(WalletError::CurrencyNotFound)?;
                (Wallet::open(action.user_id, currency_id), true)
            }
        };

        let currency = self.require_currency(wallet.currency_id).await?;
        currency.check_scale(action.amount)?;
        if !wallet.status.allows_credit() {
            return Err(WalletError::WalletInactive);
        }

        let before = wallet.funds;
        wallet.funds.deposit(action.amount)?;

        let entry = WalletTransaction::record(
            wallet.user_id,
            wallet.id,
            EntryKind::Deposit,
            action.amount,
            Decimal::ZERO,
            before,
            wallet.funds,
            Some(action.action_id),
            refs_from(action),
        )?;

        self.persist(tx, &mut wallet, created, &entry, action.pair_id)
            .await?;
        Ok(entry)
    }

    /// Withdraw / freeze / unfreeze / deduct-frozen / adjust: one existing
    /// wallet, addressed by id.
    async fn single_wallet_tx(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        action: &WalletAction,
    ) -> Result<WalletTransaction, WalletError> {
        let wallet_id = action.wallet_id.ok_or(WalletError::WalletNotFound)?;
        let mut wallet = tx
            .lock_wallet_by_id(wallet_id)
            .await?
            .ok_or(WalletError::WalletNotFound)?;

        if let Some(prior) = tx.find_entry_by_action(action.action_id).await? {
            return Ok(prior);
        }

        if wallet.user_id != action.user_id {
            return Err(WalletError::WalletUnauthorized);
        }

        let currency = self.require_currency(wallet.currency_id).await?;
        currency.check_scale(action.amount.abs())?;
        self.check_status(&wallet, action.kind, action.amount)?;

        let before = wallet.funds;
        let kind = match action.kind {
            ActionKind::Withdraw => {
                wallet.funds.withdraw(action.amount)?;
                EntryKind::Withdraw
            }
            ActionKind::Freeze => {
                wallet.funds.freeze(action.amount)?;
                EntryKind::Freeze
            }
            ActionKind::Unfreeze => {
                wallet.funds.unfreeze(action.amount)?;
                EntryKind::Unfreeze
            }
            ActionKind::DeductFrozen => {
                wallet.funds.deduct_frozen(action.amount)?;
                EntryKind::DeductFrozen
            }
            ActionKind::Adjust => {
                wallet.funds.adjust(action.amount)?;
                EntryKind::Adjust
            }
            ActionKind::Deposit | ActionKind::InternalTransfer => {
                unreachable!("dispatched in apply_tx")
            }
        };

        let entry = WalletTransaction::record(
            wallet.user_id,
            wallet.id,
            kind,
            action.amount,
            Decimal::ZERO,
            before,
            wallet.funds,
            Some(action.action_id),
            refs_from(action),
        )?;

        self.persist(tx, &mut wallet, false, &entry, action.pair_id)
            .await?;
        Ok(entry)
    }

    /// Internal transfer: atomic across exactly two wallets, locked in
    /// ascending wallet-id order. Two ledger entries share one
    /// transaction_id; the debit entry carries the action_id and is the
    /// result returned by the gate.
    async fn transfer_tx(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        action: &WalletAction,
    ) -> Result<WalletTransaction, WalletError> {
        let from_id = action.wallet_id.ok_or(WalletError::WalletNotFound)?;
        let to_id = action.dest_wallet_id.ok_or(WalletError::WalletNotFound)?;

        let (first, second) = if from_id < to_id {
            (from_id, to_id)
        } else {
            (to_id, from_id)
        };
        let w_first = tx.lock_wallet_by_id(first).await?;
        let w_second = tx.lock_wallet_by_id(second).await?;

        if let Some(prior) = tx.find_entry_by_action(action.action_id).await? {
            return Ok(prior);
        }

        let (src, dst) = if first == from_id {
            (w_first, w_second)
        } else {
            (w_second, w_first)
        };
        let mut src = src.ok_or(WalletError::WalletNotFound)?;
        let mut dst = dst.ok_or(WalletError::WalletNotFound)?;

        if src.user_id != action.user_id {
            return Err(WalletError::WalletUnauthorized);
        }
        if src.currency_id != dst.currency_id {
            return Err(WalletError::CurrencyMismatch);
        }
        if !src.status.allows_debit() {
            return Err(status_error(src.status));
        }
        if !dst.status.allows_credit() {
            return Err(WalletError::WalletInactive);
        }

        let currency = self.require_currency(src.currency_id).await?;
        currency.check_scale(action.amount)?;

        let src_before = src.funds;
        let dst_before = dst.funds;
        src.funds.withdraw(action.amount)?;
        dst.funds.deposit(action.amount)?;

        // Both legs share one transaction id for joint audit lookup.
        let transaction_id = Uuid::new_v4();
        let mut refs = refs_from(action);
        refs.transaction_id = Some(transaction_id);

        let debit = WalletTransaction::record(
            src.user_id,
            src.id,
            EntryKind::InternalTransfer,
            action.amount,
            Decimal::ZERO,
            src_before,
            src.funds,
            Some(action.action_id),
            refs.clone(),
        )?;
        let credit = WalletTransaction::record(
            dst.user_id,
            dst.id,
            EntryKind::InternalTransfer,
            action.amount,
            Decimal::ZERO,
            dst_before,
            dst.funds,
            None,
            refs,
        )?;

        self.persist(tx, &mut src, false, &debit, action.pair_id)
            .await?;
        self.persist(tx, &mut dst, false, &credit, action.pair_id)
            .await?;
        Ok(debit)
    }

    /// Admin-only wallet status transition (distinct from balance
    /// freeze/unfreeze). Legal moves: active→frozen, frozen→active,
    /// active→inactive. Inactive is terminal.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        wallet_id: Uuid,
        status: WalletStatus,
    ) -> Result<Wallet, WalletError> {
        let work = async {
            let mut tx = self.store.begin().await?;
            let mut wallet = tx
                .lock_wallet_by_id(wallet_id)
                .await?
                .ok_or(WalletError::WalletNotFound)?;

            let legal = matches!(
                (wallet.status, status),
                (WalletStatus::Active, WalletStatus::Frozen)
                    | (WalletStatus::Frozen, WalletStatus::Active)
                    | (WalletStatus::Active, WalletStatus::Inactive)
            );
            if !legal {
                return Err(WalletError::InvalidWalletStatus(format!(
                    "{} -> {}",
                    wallet.status.as_str(),
                    status.as_str()
                )));
            }

            let old = wallet.status;
            wallet.status = status;
            wallet.touch();
            tx.save_wallet(&wallet).await?;

            // Zero-amount audit marker so the admin trail is reconstructible
            // from the ledger alone.
            let entry = WalletTransaction::record(
                wallet.user_id,
                wallet.id,
                EntryKind::StatusChange,
                Decimal::ZERO,
                Decimal::ZERO,
                wallet.funds,
                wallet.funds,
                None,
                EntryRefs {
                    meta: Some(format!("{} -> {}", old.as_str(), status.as_str())),
                    ..EntryRefs::default()
                },
            )?;
            tx.insert_entry(&entry).await?;

            let payload = serde_json::json!({
                "wallet_id": wallet.id,
                "user_id": wallet.user_id,
                "old_status": old.as_str(),
                "new_status": status.as_str(),
                "occurred_at": wallet.updated_at,
            });
            let mut event = OutboxEvent::pending("wallet.status_changed", wallet.id, payload);
            event.sequence = tx.next_sequence(wallet.id).await?;
            tx.insert_event(&event).await?;

            tx.commit().await?;
            info!(old = old.as_str(), new = status.as_str(), "Wallet status changed");
            Ok(wallet)
        };
        match tokio::time::timeout(self.op_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(WalletError::Timeout),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn wallet(&self, wallet_id: Uuid) -> Result<Wallet, WalletError> {
        self.store
            .get_wallet(wallet_id)
            .await?
            .ok_or(WalletError::WalletNotFound)
    }

    pub async fn wallets(&self, user_id: Uuid) -> Result<Vec<Wallet>, WalletError> {
        self.store.list_wallets(user_id).await
    }

    /// Per-currency balance totals for one user.
    pub async fn summary(&self, user_id: Uuid) -> Result<Vec<WalletSummary>, WalletError> {
        let wallets = self.store.list_wallets(user_id).await?;
        Ok(wallets
            .iter()
            .map(|w| WalletSummary {
                currency_id: w.currency_id,
                balance: w.funds.balance(),
                frozen: w.funds.frozen(),
                total: w.funds.total(),
            })
            .collect())
    }

    /// Wallet audit history, newest first.
    pub async fn history(
        &self,
        user_id: Uuid,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        let wallet = self.wallet(wallet_id).await?;
        if wallet.user_id != user_id {
            return Err(WalletError::WalletUnauthorized);
        }
        self.store.list_entries(wallet_id, limit).await
    }

    // ========================================================================
    // Template pieces
    // ========================================================================

    async fn require_currency(&self, currency_id: Uuid) -> Result<Currency, WalletError> {
        let currency = self
            .store
            .get_currency(currency_id)
            .await?
            .ok_or(WalletError::CurrencyNotFound)?;
        currency.check_active()?;
        Ok(currency)
    }

    fn check_status(
        &self,
        wallet: &Wallet,
        kind: ActionKind,
        amount: Decimal,
    ) -> Result<(), WalletError> {
        let is_debit = match kind {
            ActionKind::Withdraw | ActionKind::Freeze | ActionKind::DeductFrozen => true,
            ActionKind::Adjust => amount < Decimal::ZERO,
            // Unfreeze only moves held funds toward spendable.
            ActionKind::Unfreeze => false,
            ActionKind::Deposit | ActionKind::InternalTransfer => false,
        };
        if is_debit {
            if !wallet.status.allows_debit() {
                return Err(status_error(wallet.status));
            }
        } else if !wallet.status.allows_credit() {
            return Err(WalletError::WalletInactive);
        }
        Ok(())
    }

    /// Persist one mutated wallet with its ledger entry and outbox event,
    /// all inside the caller's transaction.
    async fn persist(
        &self,
        tx: &mut Box<dyn LedgerTx>,
        wallet: &mut Wallet,
        created: bool,
        entry: &WalletTransaction,
        pair_hint: Option<Uuid>,
    ) -> Result<(), WalletError> {
        wallet.touch();
        if created {
            tx.insert_wallet(wallet).await?;
        } else {
            tx.save_wallet(wallet).await?;
        }
        tx.insert_entry(entry).await?;

        // Partition key: the trading pair when the mutation has one,
        // otherwise the wallet itself, so per-wallet order stays total.
        let pair_id = pair_hint.unwrap_or(wallet.id);
        let payload = WalletEventPayload::from_entry(entry, pair_hint);
        let value = serde_json::to_value(&payload)
            .map_err(|e| WalletError::Store(e.to_string()))?;
        let mut event = OutboxEvent::pending(&payload.event_type(), pair_id, value);
        event.sequence = tx.next_sequence(pair_id).await?;
        tx.insert_event(&event).await?;
        Ok(())
    }
}

fn status_error(status: WalletStatus) -> WalletError {
    match status {
        WalletStatus::Frozen => WalletError::WalletFrozen,
        _ => WalletError::WalletInactive,
    }
}

fn refs_from(action: &WalletAction) -> EntryRefs {
    EntryRefs {
        transaction_id: None,
        order_id: action.order_id,
        ref_id: None,
        ref_type: action.ref_code.clone(),
        meta: if action.reason.is_empty() {
            None
        } else {
            Some(action.reason.clone())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::store::MemStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn setup() -> (WalletEngine, MemStore, Uuid) {
        let store = MemStore::new();
        let currency = Currency::new("BTC", "Bitcoin", 8);
        let currency_id = currency.id;
        store.add_currency(currency);
        let engine = WalletEngine::new(Arc::new(store.clone()));
        (engine, store, currency_id)
    }

    #[test]
    fn test_timeout_comes_from_config() {
        let config = AppConfig {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "ledger.log".to_string(),
            use_json: false,
            rotation: "never".to_string(),
            postgres_url: String::new(),
            op_timeout_ms: 2500,
            dispatcher: Default::default(),
        };
        let engine = WalletEngine::from_config(Arc::new(MemStore::new()), &config);
        assert_eq!(engine.op_timeout(), Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_deposit_creates_wallet_lazily() {
        let (engine, store, currency_id) = setup();
        let user = Uuid::new_v4();

        let entry = engine
            .apply(&WalletAction::deposit(user, currency_id, dec("100")))
            .await
            .unwrap();
        assert_eq!(entry.kind, EntryKind::Deposit);
        assert_eq!(entry.balance_before, Decimal::ZERO);
        assert_eq!(entry.balance_after, dec("100"));

        let wallets = store.list_wallets(user).await.unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].funds.balance(), dec("100"));

        // Second deposit reuses the wallet.
        engine
            .apply(&WalletAction::deposit(user, currency_id, dec("50")))
            .await
            .unwrap();
        assert_eq!(store.list_wallets(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_leaves_state_unchanged() {
        let (engine, _store, currency_id) = setup();
        let user = Uuid::new_v4();
        let deposit = engine
            .apply(&WalletAction::deposit(user, currency_id, dec("60")))
            .await
            .unwrap();

        let err = engine
            .apply(&WalletAction::withdraw(user, deposit.wallet_id, dec("70")))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds));

        let wallet = engine.wallet(deposit.wallet_id).await.unwrap();
        assert_eq!(wallet.funds.balance(), dec("60"));
    }

    #[tokio::test]
    async fn test_idempotent_apply() {
        let (engine, store, currency_id) = setup();
        let user = Uuid::new_v4();

        let action = WalletAction::deposit(user, currency_id, dec("25"));
        let first = engine.apply(&action).await.unwrap();
        let second = engine.apply(&action).await.unwrap();
        let third = engine.apply(&action).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id, third.id);
        assert_eq!(store.entry_count(), 1);

        let wallet = engine.wallet(first.wallet_id).await.unwrap();
        assert_eq!(wallet.funds.balance(), dec("25"));
    }

    #[tokio::test]
    async fn test_unknown_currency_rejected() {
        let (engine, _store, _currency_id) = setup();
        let err = engine
            .apply(&WalletAction::deposit(Uuid::new_v4(), Uuid::new_v4(), dec("1")))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::CurrencyNotFound));
    }

    #[tokio::test]
    async fn test_inactive_currency_rejected() {
        let (engine, store, _) = setup();
        let mut dead = Currency::new("XXX", "Dead Coin", 8);
        dead.is_active = false;
        let dead_id = dead.id;
        store.add_currency(dead);

        let err = engine
            .apply(&WalletAction::deposit(Uuid::new_v4(), dead_id, dec("1")))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::CurrencyInactive));
    }

    #[tokio::test]
    async fn test_precision_gate() {
        let store = MemStore::new();
        let usdt = Currency::new("USDT", "Tether", 2);
        let usdt_id = usdt.id;
        store.add_currency(usdt);
        let engine = WalletEngine::new(Arc::new(store));

        let err = engine
            .apply(&WalletAction::deposit(Uuid::new_v4(), usdt_id, dec("1.001")))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::AmountPrecision));
    }

    #[tokio::test]
    async fn test_frozen_wallet_blocks_debits_permits_deposits() {
        let (engine, _store, currency_id) = setup();
        let user = Uuid::new_v4();
        let deposit = engine
            .apply(&WalletAction::deposit(user, currency_id, dec("100")))
            .await
            .unwrap();
        let wallet_id = deposit.wallet_id;

        engine
            .set_status(wallet_id, WalletStatus::Frozen)
            .await
            .unwrap();

        let err = engine
            .apply(&WalletAction::withdraw(user, wallet_id, dec("10")))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::WalletFrozen));

        engine
            .apply(&WalletAction::deposit(user, currency_id, dec("5")))
            .await
            .unwrap();
        let wallet = engine.wallet(wallet_id).await.unwrap();
        assert_eq!(wallet.funds.balance(), dec("105"));

        engine
            .set_status(wallet_id, WalletStatus::Active)
            .await
            .unwrap();
        engine
            .apply(&WalletAction::withdraw(user, wallet_id, dec("10")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_inactive_is_terminal() {
        let (engine, _store, currency_id) = setup();
        let user = Uuid::new_v4();
        let deposit = engine
            .apply(&WalletAction::deposit(user, currency_id, dec("1")))
            .await
            .unwrap();

        engine
            .set_status(deposit.wallet_id, WalletStatus::Inactive)
            .await
            .unwrap();
        let err = engine
            .set_status(deposit.wallet_id, WalletStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidWalletStatus(_)));
    }

    #[tokio::test]
    async fn test_adjust_signed_and_bounded() {
        let (engine, _store, currency_id) = setup();
        let user = Uuid::new_v4();
        let deposit = engine
            .apply(&WalletAction::deposit(user, currency_id, dec("30")))
            .await
            .unwrap();

        let entry = engine
            .apply(&WalletAction::adjust(user, deposit.wallet_id, dec("-10")))
            .await
            .unwrap();
        assert_eq!(entry.kind, EntryKind::Adjust);
        assert_eq!(entry.amount, dec("-10"));
        assert_eq!(entry.balance_after, dec("20"));

        let err = engine
            .apply(&WalletAction::adjust(user, deposit.wallet_id, dec("-21")))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds));
    }

    #[tokio::test]
    async fn test_wrong_owner_rejected() {
        let (engine, _store, currency_id) = setup();
        let user = Uuid::new_v4();
        let deposit = engine
            .apply(&WalletAction::deposit(user, currency_id, dec("10")))
            .await
            .unwrap();

        let intruder = Uuid::new_v4();
        let err = engine
            .apply(&WalletAction::withdraw(intruder, deposit.wallet_id, dec("1")))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::WalletUnauthorized));
    }

    #[tokio::test]
    async fn test_history_and_summary() {
        let (engine, _store, currency_id) = setup();
        let user = Uuid::new_v4();
        let deposit = engine
            .apply(&WalletAction::deposit(user, currency_id, dec("100")))
            .await
            .unwrap();
        engine
            .apply(&WalletAction::freeze(user, deposit.wallet_id, dec("40")))
            .await
            .unwrap();

        let history = engine.history(user, deposit.wallet_id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, EntryKind::Freeze); // newest first

        let summary = engine.summary(user).await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].balance, dec("60"));
        assert_eq!(summary[0].frozen, dec("40"));
        assert_eq!(summary[0].total, dec("100"));
    }
}
