//! Enforced funds type: the single place balance arithmetic happens.
//!
//! # Enforcement Strategy:
//! 1. Fields are PRIVATE - no direct access
//! 2. All mutations return Result - errors are explicit
//! 3. Exact decimal arithmetic - never binary floats
//! 4. Type system prevents bypassing validation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::WalletError;

/// Spendable/held funds for a single wallet
///
/// # Invariants (ENFORCED by private fields):
/// - `balance >= 0` and `frozen >= 0` after every mutation
/// - `total() == balance + frozen` by construction
/// - All state changes return Result; a failed mutation leaves funds unchanged
///
/// # Usage:
/// ```ignore
/// let mut funds = Funds::default();
/// funds.deposit(dec!(100))?;        // balance = 100
/// funds.freeze(dec!(40))?;          // balance = 60, frozen = 40
/// funds.deduct_frozen(dec!(40))?;   // balance = 60, frozen = 0
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Funds {
    balance: Decimal, // PRIVATE - spendable, only via deposit/withdraw/freeze/unfreeze/adjust
    frozen: Decimal,  // PRIVATE - held, only via freeze/unfreeze/deduct_frozen
}

impl Funds {
    /// Restore funds from stored columns. Rejects rows that already violate
    /// the non-negativity invariant (corrupt data must not enter the engine).
    pub fn from_stored(balance: Decimal, frozen: Decimal) -> Result<Self, WalletError> {
        if balance < Decimal::ZERO || frozen < Decimal::ZERO {
            return Err(WalletError::Store(format!(
                "negative stored funds: balance={balance} frozen={frozen}"
            )));
        }
        Ok(Self { balance, frozen })
    }

    /// Spendable balance (read-only)
    #[inline(always)]
    pub const fn balance(&self) -> Decimal {
        self.balance
    }

    /// Held balance (read-only)
    #[inline(always)]
    pub const fn frozen(&self) -> Decimal {
        self.frozen
    }

    /// Total funds (balance + frozen)
    #[inline(always)]
    pub fn total(&self) -> Decimal {
        self.balance + self.frozen
    }

    /// Credit spendable balance.
    pub fn deposit(&mut self, amount: Decimal) -> Result<(), WalletError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(WalletError::Overflow)?;
        Ok(())
    }

    /// Debit spendable balance.
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if self.balance < amount {
            return Err(WalletError::InsufficientFunds);
        }
        self.balance -= amount;
        Ok(())
    }

    /// Move funds from spendable to held. Total is unchanged.
    pub fn freeze(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if self.balance < amount {
            return Err(WalletError::InsufficientFunds);
        }
        self.balance -= amount;
        self.frozen = self
            .frozen
            .checked_add(amount)
            .ok_or(WalletError::Overflow)?;
        Ok(())
    }

    /// Move funds from held back to spendable. Total is unchanged.
    pub fn unfreeze(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if self.frozen < amount {
            return Err(WalletError::FrozenInsufficientFunds);
        }
        self.frozen -= amount;
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(WalletError::Overflow)?;
        Ok(())
    }

    /// Permanently remove held funds (trade settlement). Balance unchanged,
    /// total reduced by amount.
    pub fn deduct_frozen(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if self.frozen < amount {
            return Err(WalletError::FrozenInsufficientFunds);
        }
        self.frozen -= amount;
        Ok(())
    }

    /// Admin correction: signed delta applied to spendable balance.
    /// The resulting balance must not go negative.
    pub fn adjust(&mut self, delta: Decimal) -> Result<(), WalletError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or(WalletError::Overflow)?;
        if next < Decimal::ZERO {
            return Err(WalletError::InsufficientFunds);
        }
        self.balance = next;
        Ok(())
    }
}
