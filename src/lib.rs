//! Custodial balance ledger for a trading venue.
//!
//! Tracks user funds per currency, records every mutation in an append-only
//! audit ledger, and publishes each applied mutation through a transactional
//! outbox. All mutations flow through one engine behind an idempotency gate,
//! so upstream retries and at-least-once delivery are safe by construction.
//!
//! # Modules
//!
//! - [`currency`] - Currency and pair reference data
//! - [`wallet`] - Funds arithmetic, audit entries, mutation engine, bulk runner
//! - [`store`] - Storage capability traits; PostgreSQL and in-memory stores
//! - [`outbox`] - Transactional outbox rows and the background dispatcher
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing setup with rolling file output

pub mod config;
pub mod currency;
pub mod logging;
pub mod outbox;
pub mod store;
pub mod wallet;

// Convenient re-exports at crate root
pub use currency::{Currency, Pair};
pub use outbox::{
    DispatcherConfig, EventPublisher, LogPublisher, OutboxDispatcher, OutboxEvent, OutboxStatus,
    WalletEventPayload,
};
pub use store::{LedgerStore, LedgerTx, MemStore, PgStore};
pub use wallet::{
    ActionKind, BulkOutcome, BulkReport, BulkRunner, BulkWalletOp, EntryKind, EntryRefs,
    EntryStatus, Funds, Wallet, WalletAction, WalletEngine, WalletError, WalletStatus,
    WalletSummary, WalletTransaction,
};
