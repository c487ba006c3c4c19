//! Ledger storage capability traits
//!
//! The mutation engine only talks to these traits, so it runs unchanged
//! against PostgreSQL in production and the in-memory store in tests.
//!
//! Locking discipline: `lock_wallet`/`lock_wallet_by_id` take an exclusive
//! row lock that lives until the transaction commits or is dropped.
//! Transactions on different wallets proceed fully in parallel; there is no
//! global ledger lock.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::currency::Currency;
use crate::outbox::OutboxEvent;
use crate::wallet::error::WalletError;
use crate::wallet::models::{Wallet, WalletTransaction};

pub use memory::MemStore;
pub use postgres::PgStore;

/// One ledger transaction. Dropping the box without `commit` rolls
/// everything back, including any row locks taken.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock the wallet row for (user, currency). Returns None when absent;
    /// the caller may then `insert_wallet` inside this same transaction,
    /// closing the check-then-create race for concurrent first deposits.
    async fn lock_wallet(
        &mut self,
        user_id: Uuid,
        currency_id: Uuid,
    ) -> Result<Option<Wallet>, WalletError>;

    /// Lock the wallet row by id.
    async fn lock_wallet_by_id(&mut self, wallet_id: Uuid)
        -> Result<Option<Wallet>, WalletError>;

    async fn insert_wallet(&mut self, wallet: &Wallet) -> Result<(), WalletError>;

    async fn save_wallet(&mut self, wallet: &Wallet) -> Result<(), WalletError>;

    /// Append a ledger entry. Entries are immutable once committed.
    async fn insert_entry(&mut self, entry: &WalletTransaction) -> Result<(), WalletError>;

    /// Idempotency lookup inside the transaction, after the wallet lock is
    /// held.
    async fn find_entry_by_action(
        &mut self,
        action_id: Uuid,
    ) -> Result<Option<WalletTransaction>, WalletError>;

    /// Next outbox sequence for the partition, gapless in commit order.
    /// Serialized per pair only.
    async fn next_sequence(&mut self, pair_id: Uuid) -> Result<i64, WalletError>;

    /// Append an outbox event. Returns false when `(event_type, dedup_key)`
    /// already exists (re-enqueue is a no-op).
    async fn insert_event(&mut self, event: &OutboxEvent) -> Result<bool, WalletError>;

    async fn commit(self: Box<Self>) -> Result<(), WalletError>;
}

/// Durable ledger store: transaction factory plus non-locking reads and the
/// outbox dispatch side.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, WalletError>;

    async fn get_currency(&self, currency_id: Uuid) -> Result<Option<Currency>, WalletError>;

    async fn get_wallet(&self, wallet_id: Uuid) -> Result<Option<Wallet>, WalletError>;

    async fn list_wallets(&self, user_id: Uuid) -> Result<Vec<Wallet>, WalletError>;

    /// Fast-path idempotency lookup (no lock, no transaction).
    async fn find_entry_by_action(
        &self,
        action_id: Uuid,
    ) -> Result<Option<WalletTransaction>, WalletError>;

    /// Wallet history, newest first.
    async fn list_entries(
        &self,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, WalletError>;

    /// Undelivered events ordered by (pair_id, sequence), at most
    /// `per_pair` rows per pair so one backed-up pair cannot fill the whole
    /// batch and starve the others.
    async fn fetch_pending(
        &self,
        limit: i64,
        per_pair: i64,
    ) -> Result<Vec<OutboxEvent>, WalletError>;

    async fn mark_sent(&self, event_id: Uuid) -> Result<(), WalletError>;

    async fn mark_error(&self, event_id: Uuid, message: &str) -> Result<(), WalletError>;
}
