//! Wallet Error Types
//!
//! Typed errors for every ledger operation, split into three classes:
//! validation (rejected before any lock), conflict (business outcomes like
//! insufficient funds), and transient store errors (safe to retry the same
//! WalletAction thanks to the idempotency gate).

use thiserror::Error;

/// Wallet/ledger error types
///
/// Error codes are stable and match the API contract for client handling.
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    // === Validation Errors ===
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Adjust amount must be nonzero")]
    ZeroAdjust,

    #[error("Amount precision exceeds currency limit")]
    AmountPrecision,

    #[error("Invalid wallet status: {0}")]
    InvalidWalletStatus(String),

    #[error("Source and destination wallet cannot be the same")]
    SameWallet,

    // === Reference Data Errors ===
    #[error("Currency not found")]
    CurrencyNotFound,

    #[error("Currency is inactive")]
    CurrencyInactive,

    #[error("Wallets are denominated in different currencies")]
    CurrencyMismatch,

    // === Wallet Errors ===
    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Wallet does not belong to user")]
    WalletUnauthorized,

    #[error("Wallet is inactive")]
    WalletInactive,

    #[error("Wallet is frozen")]
    WalletFrozen,

    // === Conflict (business) Errors ===
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Insufficient frozen funds")]
    FrozenInsufficientFunds,

    #[error("Balance arithmetic overflow")]
    Overflow,

    // === Transient Infrastructure Errors ===
    #[error("Store error: {0}")]
    Store(String),

    #[error("Operation timed out")]
    Timeout,
}

impl WalletError {
    /// Stable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidAction(_) => "INVALID_ACTION",
            WalletError::InvalidAmount => "INVALID_AMOUNT",
            WalletError::ZeroAdjust => "INVALID_AMOUNT",
            WalletError::AmountPrecision => "AMOUNT_PRECISION",
            WalletError::InvalidWalletStatus(_) => "INVALID_WALLET_STATUS",
            WalletError::SameWallet => "SAME_WALLET",
            WalletError::CurrencyNotFound => "INVALID_CURRENCY_ID",
            WalletError::CurrencyInactive => "CURRENCY_INACTIVE",
            WalletError::CurrencyMismatch => "CURRENCY_MISMATCH",
            WalletError::WalletNotFound => "WALLET_NOT_FOUND",
            WalletError::WalletUnauthorized => "FORBIDDEN",
            WalletError::WalletInactive => "WALLET_INACTIVE",
            WalletError::WalletFrozen => "WALLET_FROZEN",
            WalletError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            WalletError::FrozenInsufficientFunds => "FROZEN_INSUFFICIENT_FUNDS",
            WalletError::Overflow => "OVERFLOW",
            WalletError::Store(_) => "STORE_ERROR",
            WalletError::Timeout => "TIMEOUT",
        }
    }

    /// HTTP status code suggestion for transport layers.
    pub fn http_status(&self) -> u16 {
        match self {
            WalletError::InvalidAction(_)
            | WalletError::InvalidAmount
            | WalletError::ZeroAdjust
            | WalletError::AmountPrecision
            | WalletError::InvalidWalletStatus(_)
            | WalletError::SameWallet
            | WalletError::CurrencyNotFound => 400,
            WalletError::WalletUnauthorized => 403,
            WalletError::WalletNotFound => 404,
            WalletError::CurrencyInactive
            | WalletError::CurrencyMismatch
            | WalletError::WalletInactive
            | WalletError::WalletFrozen
            | WalletError::InsufficientFunds
            | WalletError::FrozenInsufficientFunds
            | WalletError::Overflow => 422,
            WalletError::Store(_) => 500,
            WalletError::Timeout => 503,
        }
    }

    /// Whether resubmitting the identical WalletAction is safe and useful.
    ///
    /// Only transient infrastructure failures are retryable; validation and
    /// conflict errors are terminal outcomes. Retries are protected by the
    /// idempotency gate, so a retry of an action that actually committed is
    /// a no-op.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Store(_) | WalletError::Timeout)
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::Store(e.to_string())
    }
}
