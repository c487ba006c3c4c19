//! Custodial wallet ledger: funds arithmetic, audit entries, the mutation
//! engine with its idempotency gate, and the bulk runner.

pub mod bulk;
pub mod engine;
pub mod error;
pub mod funds;
pub mod models;

pub use bulk::{BulkOutcome, BulkReport, BulkRunner};
pub use engine::{WalletEngine, WalletSummary};
pub use error::WalletError;
pub use funds::Funds;
pub use models::{
    ActionKind, BulkWalletOp, EntryKind, EntryRefs, EntryStatus, Wallet, WalletAction,
    WalletStatus, WalletTransaction,
};
