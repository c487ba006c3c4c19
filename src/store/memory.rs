//! In-memory ledger store
//!
//! Implements the same locking discipline as the Postgres store: one
//! exclusive async lock per wallet row, held for the life of the
//! transaction, with all writes staged and applied atomically on commit.
//! Dropping a transaction discards the staged writes and releases the
//! locks, which is exactly the rollback behavior the engine relies on.
//!
//! Used by unit/property tests and embeddable for single-process setups.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::currency::Currency;
use crate::outbox::{OutboxEvent, OutboxStatus};
use crate::wallet::error::WalletError;
use crate::wallet::models::{Wallet, WalletTransaction};

use super::{LedgerStore, LedgerTx};

/// Row-lock key: wallets are identified by (user, currency) so the lock can
/// be taken even before the row exists (first-deposit creation race).
type LockKey = (Uuid, Uuid);

#[derive(Default)]
struct MemInner {
    currencies: StdMutex<HashMap<Uuid, Currency>>,
    wallets: StdMutex<HashMap<Uuid, Wallet>>,
    wallet_index: StdMutex<HashMap<LockKey, Uuid>>,
    entries: StdMutex<Vec<WalletTransaction>>,
    action_index: StdMutex<HashMap<Uuid, usize>>,
    events: StdMutex<Vec<OutboxEvent>>,
    dedup: StdMutex<HashSet<(String, String)>>,
    sequences: StdMutex<HashMap<Uuid, i64>>,
    row_locks: StdMutex<HashMap<LockKey, Arc<TokioMutex<()>>>>,
    pair_locks: StdMutex<HashMap<Uuid, Arc<TokioMutex<()>>>>,
}

impl MemInner {
    fn row_lock(&self, key: LockKey) -> Arc<TokioMutex<()>> {
        let mut locks = self.row_locks.lock().unwrap();
        locks.entry(key).or_default().clone()
    }

    fn pair_lock(&self, pair_id: Uuid) -> Arc<TokioMutex<()>> {
        let mut locks = self.pair_locks.lock().unwrap();
        locks.entry(pair_id).or_default().clone()
    }
}

/// In-memory `LedgerStore`.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register reference data (tests and embedded setups).
    pub fn add_currency(&self, currency: Currency) {
        self.inner
            .currencies
            .lock()
            .unwrap()
            .insert(currency.id, currency);
    }

    /// Total number of outbox rows, any status (test observability).
    pub fn event_count(&self) -> usize {
        self.inner.events.lock().unwrap().len()
    }

    /// Total number of ledger entries (test observability).
    pub fn entry_count(&self) -> usize {
        self.inner.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerStore for MemStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, WalletError> {
        Ok(Box::new(MemTx {
            inner: Arc::clone(&self.inner),
            guards: HashMap::new(),
            pair_guards: HashMap::new(),
            staged_wallets: HashMap::new(),
            staged_index: HashMap::new(),
            staged_entries: Vec::new(),
            staged_events: Vec::new(),
            staged_seq: HashMap::new(),
        }))
    }

    async fn get_currency(&self, currency_id: Uuid) -> Result<Option<Currency>, WalletError> {
        Ok(self
            .inner
            .currencies
            .lock()
            .unwrap()
            .get(&currency_id)
            .cloned())
    }

    async fn get_wallet(&self, wallet_id: Uuid) -> Result<Option<Wallet>, WalletError> {
        Ok(self.inner.wallets.lock().unwrap().get(&wallet_id).cloned())
    }

    async fn list_wallets(&self, user_id: Uuid) -> Result<Vec<Wallet>, WalletError> {
        let wallets = self.inner.wallets.lock().unwrap();
        let mut out: Vec<Wallet> = wallets
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|w| w.created_at);
        Ok(out)
    }

    async fn find_entry_by_action(
        &self,
        action_id: Uuid,
    ) -> Result<Option<WalletTransaction>, WalletError> {
        let index = self.inner.action_index.lock().unwrap();
        let entries = self.inner.entries.lock().unwrap();
        Ok(index.get(&action_id).and_then(|i| entries.get(*i).cloned()))
    }

    async fn list_entries(
        &self,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, WalletError> {
        let entries = self.inner.entries.lock().unwrap();
        let mut out: Vec<WalletTransaction> = entries
            .iter()
            .filter(|e| e.wallet_id == wallet_id)
            .cloned()
            .collect();
        out.reverse(); // append order -> newest first
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn fetch_pending(
        &self,
        limit: i64,
        per_pair: i64,
    ) -> Result<Vec<OutboxEvent>, WalletError> {
        let events = self.inner.events.lock().unwrap();
        let mut undelivered: Vec<OutboxEvent> = events
            .iter()
            .filter(|e| e.status != OutboxStatus::Sent)
            .cloned()
            .collect();
        undelivered.sort_by(|a, b| (a.pair_id, a.sequence).cmp(&(b.pair_id, b.sequence)));

        let per_pair = per_pair.max(1) as usize;
        let mut taken: HashMap<Uuid, usize> = HashMap::new();
        let mut out = Vec::new();
        for event in undelivered {
            let count = taken.entry(event.pair_id).or_insert(0);
            if *count < per_pair {
                *count += 1;
                out.push(event);
            }
        }
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn mark_sent(&self, event_id: Uuid) -> Result<(), WalletError> {
        let mut events = self.inner.events.lock().unwrap();
        if let Some(ev) = events.iter_mut().find(|e| e.id == event_id) {
            let now = Utc::now();
            ev.status = OutboxStatus::Sent;
            ev.sent_at = Some(now);
            ev.updated_at = now;
            ev.error_message = None;
        }
        Ok(())
    }

    async fn mark_error(&self, event_id: Uuid, message: &str) -> Result<(), WalletError> {
        let mut events = self.inner.events.lock().unwrap();
        if let Some(ev) = events.iter_mut().find(|e| e.id == event_id) {
            ev.status = OutboxStatus::Error;
            ev.retry_count += 1;
            ev.error_message = Some(message.to_string());
            ev.updated_at = Utc::now();
        }
        Ok(())
    }
}

struct MemTx {
    inner: Arc<MemInner>,
    guards: HashMap<LockKey, OwnedMutexGuard<()>>,
    pair_guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    staged_wallets: HashMap<Uuid, Wallet>,
    staged_index: HashMap<LockKey, Uuid>,
    staged_entries: Vec<WalletTransaction>,
    staged_events: Vec<OutboxEvent>,
    staged_seq: HashMap<Uuid, i64>,
}

impl MemTx {
    async fn acquire(&mut self, key: LockKey) {
        if self.guards.contains_key(&key) {
            return;
        }
        let lock = self.inner.row_lock(key);
        let guard = lock.lock_owned().await;
        self.guards.insert(key, guard);
    }

    fn read_wallet(&self, key: LockKey) -> Option<Wallet> {
        if let Some(id) = self.staged_index.get(&key) {
            return self.staged_wallets.get(id).cloned();
        }
        let id = *self.inner.wallet_index.lock().unwrap().get(&key)?;
        if let Some(staged) = self.staged_wallets.get(&id) {
            return Some(staged.clone());
        }
        self.inner.wallets.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl LedgerTx for MemTx {
    async fn lock_wallet(
        &mut self,
        user_id: Uuid,
        currency_id: Uuid,
    ) -> Result<Option<Wallet>, WalletError> {
        let key = (user_id, currency_id);
        self.acquire(key).await;
        Ok(self.read_wallet(key))
    }

    async fn lock_wallet_by_id(
        &mut self,
        wallet_id: Uuid,
    ) -> Result<Option<Wallet>, WalletError> {
        // Resolve the lock key first; the key (user, currency) of a wallet
        // never changes, so the pre-lock read is safe.
        let key = {
            if let Some(w) = self.staged_wallets.get(&wallet_id) {
                Some((w.user_id, w.currency_id))
            } else {
                self.inner
                    .wallets
                    .lock()
                    .unwrap()
                    .get(&wallet_id)
                    .map(|w| (w.user_id, w.currency_id))
            }
        };
        let Some(key) = key else {
            return Ok(None);
        };
        self.acquire(key).await;
        Ok(self.read_wallet(key))
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), WalletError> {
        let key = (wallet.user_id, wallet.currency_id);
        self.staged_index.insert(key, wallet.id);
        self.staged_wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), WalletError> {
        self.staged_wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &WalletTransaction) -> Result<(), WalletError> {
        self.staged_entries.push(entry.clone());
        Ok(())
    }

    async fn find_entry_by_action(
        &mut self,
        action_id: Uuid,
    ) -> Result<Option<WalletTransaction>, WalletError> {
        if let Some(e) = self
            .staged_entries
            .iter()
            .find(|e| e.action_id == Some(action_id))
        {
            return Ok(Some(e.clone()));
        }
        let index = self.inner.action_index.lock().unwrap();
        let entries = self.inner.entries.lock().unwrap();
        Ok(index.get(&action_id).and_then(|i| entries.get(*i).cloned()))
    }

    async fn next_sequence(&mut self, pair_id: Uuid) -> Result<i64, WalletError> {
        // Serialize sequence assignment per pair until this tx ends, so the
        // numbering stays gapless in commit order.
        if !self.pair_guards.contains_key(&pair_id) {
            let lock = self.inner.pair_lock(pair_id);
            let guard = lock.lock_owned().await;
            self.pair_guards.insert(pair_id, guard);
        }
        let current = self.staged_seq.get(&pair_id).copied().unwrap_or_else(|| {
            self.inner
                .sequences
                .lock()
                .unwrap()
                .get(&pair_id)
                .copied()
                .unwrap_or(0)
        });
        let next = current + 1;
        self.staged_seq.insert(pair_id, next);
        Ok(next)
    }

    async fn insert_event(&mut self, event: &OutboxEvent) -> Result<bool, WalletError> {
        let key = (event.event_type.clone(), event.dedup_key.clone());
        if self.inner.dedup.lock().unwrap().contains(&key) {
            return Ok(false);
        }
        if self
            .staged_events
            .iter()
            .any(|e| e.event_type == event.event_type && e.dedup_key == event.dedup_key)
        {
            return Ok(false);
        }
        self.staged_events.push(event.clone());
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), WalletError> {
        let me = *self;

        {
            let mut wallets = me.inner.wallets.lock().unwrap();
            let mut index = me.inner.wallet_index.lock().unwrap();
            for (key, id) in &me.staged_index {
                index.insert(*key, *id);
            }
            for (id, wallet) in me.staged_wallets {
                wallets.insert(id, wallet);
            }
        }

        {
            let mut entries = me.inner.entries.lock().unwrap();
            let mut index = me.inner.action_index.lock().unwrap();
            for entry in me.staged_entries {
                if let Some(action_id) = entry.action_id {
                    index.insert(action_id, entries.len());
                }
                entries.push(entry);
            }
        }

        {
            let mut events = me.inner.events.lock().unwrap();
            let mut dedup = me.inner.dedup.lock().unwrap();
            for event in me.staged_events {
                let key = (event.event_type.clone(), event.dedup_key.clone());
                if dedup.insert(key) {
                    events.push(event);
                }
            }
        }

        {
            let mut sequences = me.inner.sequences.lock().unwrap();
            for (pair_id, seq) in me.staged_seq {
                let slot = sequences.entry(pair_id).or_insert(0);
                if seq > *slot {
                    *slot = seq;
                }
            }
        }

        // Guards drop here, releasing the row and pair locks.
        Ok(())
    }
}
