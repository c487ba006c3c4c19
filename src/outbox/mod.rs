//! Transactional outbox
//!
//! An `OutboxEvent` row is written in the same database transaction as the
//! wallet mutation it reports, then published asynchronously by the
//! dispatcher. Dual-write inconsistency between the ledger and the message
//! channel is therefore impossible: either both committed or neither did.

pub mod dispatcher;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::wallet::error::WalletError;
use crate::wallet::models::WalletTransaction;

pub use dispatcher::{DispatcherConfig, EventPublisher, LogPublisher, OutboxDispatcher};

/// Delivery status of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    Sent,
    Error,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Sent => "sent",
            OutboxStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WalletError> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "sent" => Ok(OutboxStatus::Sent),
            "error" => Ok(OutboxStatus::Error),
            other => Err(WalletError::Store(format!("unknown outbox status: {other}"))),
        }
    }
}

/// Durable event record describing one applied mutation.
///
/// `(event_type, dedup_key)` is unique; re-enqueueing the same logical
/// event is a no-op. `sequence` is gapless and strictly increasing per
/// `pair_id` in commit order, assigned inside the mutation's transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub event_type: String,
    /// Content hash of the payload; consumers may also dedup on it.
    pub dedup_key: String,
    /// Partition key for ordered consumption. Falls back to the wallet id
    /// when the mutation carries no trading-pair context.
    pub pair_id: Uuid,
    /// Assigned by the store inside the enqueueing transaction.
    pub sequence: i64,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    /// Build a pending event; `sequence` is filled in by the store when the
    /// row is inserted.
    pub fn pending(event_type: &str, pair_id: Uuid, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            dedup_key: dedup_key(&payload),
            pair_id,
            sequence: 0,
            payload,
            status: OutboxStatus::Pending,
            retry_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
            sent_at: None,
        }
    }
}

/// Content-derived dedup key: md5 over the canonical JSON payload.
pub fn dedup_key(payload: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    hex::encode(md5::compute(&bytes).0)
}

/// Payload shape published for every applied wallet mutation. Consumers
/// dedup on `entry_id` (or the row's dedup_key) and order by `sequence`
/// within one `pair_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEventPayload {
    pub entry_id: Uuid,
    pub action_id: Option<Uuid>,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub kind: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub balance_after: Decimal,
    pub frozen_after: Decimal,
    pub order_id: Option<Uuid>,
    pub pair_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl WalletEventPayload {
    pub fn from_entry(entry: &WalletTransaction, pair_id: Option<Uuid>) -> Self {
        Self {
            entry_id: entry.id,
            action_id: entry.action_id,
            user_id: entry.user_id,
            wallet_id: entry.wallet_id,
            kind: entry.kind.as_str().to_string(),
            amount: entry.amount,
            fee: entry.fee,
            balance_after: entry.balance_after,
            frozen_after: entry.frozen_after,
            order_id: entry.refs.order_id,
            pair_id,
            occurred_at: entry.created_at,
        }
    }

    /// Event type string, e.g. `wallet.deposit`.
    pub fn event_type(&self) -> String {
        format!("wallet.{}", self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_is_content_derived() {
        let a = serde_json::json!({"entry_id": "x", "amount": "10"});
        let b = serde_json::json!({"entry_id": "x", "amount": "10"});
        let c = serde_json::json!({"entry_id": "y", "amount": "10"});
        assert_eq!(dedup_key(&a), dedup_key(&b));
        assert_ne!(dedup_key(&a), dedup_key(&c));
        assert_eq!(dedup_key(&a).len(), 32); // md5 hex
    }

    #[test]
    fn test_pending_event_defaults() {
        let pair = Uuid::new_v4();
        let ev = OutboxEvent::pending("wallet.deposit", pair, serde_json::json!({"k": 1}));
        assert_eq!(ev.status, OutboxStatus::Pending);
        assert_eq!(ev.retry_count, 0);
        assert_eq!(ev.sequence, 0);
        assert!(ev.sent_at.is_none());
        assert_eq!(ev.pair_id, pair);
    }

    #[test]
    fn test_outbox_status_round_trip() {
        for s in [OutboxStatus::Pending, OutboxStatus::Sent, OutboxStatus::Error] {
            assert_eq!(OutboxStatus::parse(s.as_str()).unwrap(), s);
        }
        assert!(OutboxStatus::parse("done").is_err());
    }
}
