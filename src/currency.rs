//! Currency and trading-pair reference data
//!
//! Consumed read-only by the mutation engine: a wallet mutation is only
//! legal for a currency that exists and is active, and amounts must fit the
//! currency's decimal precision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wallet::error::WalletError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Currency {
    pub id: Uuid,
    /// BTC, ETH, USDT ...
    pub code: String,
    pub name: String,
    /// crypto, fiat, token
    pub kind: String,
    /// Allowed number of decimal places for amounts in this currency.
    pub precision: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Currency {
    pub fn new(code: &str, name: &str, precision: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            kind: "crypto".to_string(),
            precision,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Gate applied before any wallet mutation in this currency.
    pub fn check_active(&self) -> Result<(), WalletError> {
        if self.is_active {
            Ok(())
        } else {
            Err(WalletError::CurrencyInactive)
        }
    }

    /// Reject amounts with more decimal places than this currency allows.
    /// Trailing zeros are not significant: 1.50000000 is scale 1 for a
    /// 2-decimal currency.
    pub fn check_scale(&self, amount: Decimal) -> Result<(), WalletError> {
        if amount.normalize().scale() > self.precision {
            Err(WalletError::AmountPrecision)
        } else {
            Ok(())
        }
    }
}

/// Trading pair reference data; used as the outbox partition key for
/// trade-scoped events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub id: Uuid,
    pub base_currency_id: Uuid,
    pub quote_currency_id: Uuid,
    pub price_precision: u32,
    pub amount_precision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pair {
    pub fn new(base_currency_id: Uuid, quote_currency_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            base_currency_id,
            quote_currency_id,
            price_precision: 8,
            amount_precision: 8,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_check_scale() {
        let usdt = Currency::new("USDT", "Tether", 2);
        assert!(usdt.check_scale(dec("10.25")).is_ok());
        assert!(usdt.check_scale(dec("10.250000")).is_ok()); // trailing zeros
        assert!(usdt.check_scale(dec("10.251")).is_err());

        let btc = Currency::new("BTC", "Bitcoin", 8);
        assert!(btc.check_scale(dec("0.00000001")).is_ok());
        assert!(btc.check_scale(dec("0.000000001")).is_err());
    }

    #[test]
    fn test_check_active() {
        let mut c = Currency::new("BTC", "Bitcoin", 8);
        assert!(c.check_active().is_ok());
        c.is_active = false;
        assert!(matches!(
            c.check_active(),
            Err(WalletError::CurrencyInactive)
        ));
    }
}
