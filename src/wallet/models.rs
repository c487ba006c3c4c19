//! Wallet data models
//!
//! Entities are plain structs with explicit constructors; ID and timestamp
//! assignment happens in the code path that creates them, never as a hidden
//! persistence hook.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::WalletError;
use super::funds::Funds;

/// Wallet lifecycle status
///
/// `Frozen` here is an administrative account state, distinct from frozen
/// *funds* (`Funds::frozen`): a frozen wallet still holds balances but
/// rejects debits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletStatus {
    Active,
    Inactive,
    Frozen,
}

impl WalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletStatus::Active => "active",
            WalletStatus::Inactive => "inactive",
            WalletStatus::Frozen => "frozen",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WalletError> {
        match s {
            "active" => Ok(WalletStatus::Active),
            "inactive" => Ok(WalletStatus::Inactive),
            "frozen" => Ok(WalletStatus::Frozen),
            other => Err(WalletError::InvalidWalletStatus(other.to_string())),
        }
    }

    /// Credits (deposit, unfreeze) are allowed unless the wallet is closed.
    pub fn allows_credit(&self) -> bool {
        !matches!(self, WalletStatus::Inactive)
    }

    /// Debits (withdraw, freeze, deduct, transfer-out, negative adjust)
    /// require a fully active wallet.
    pub fn allows_debit(&self) -> bool {
        matches!(self, WalletStatus::Active)
    }
}

/// One wallet per (user, currency). Mutated only by the mutation engine
/// under a row lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub currency_id: Uuid,
    pub funds: Funds,
    pub status: WalletStatus,
    pub meta: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Open a fresh wallet (first deposit-class action for this
    /// user/currency). Starts active with zero funds.
    pub fn open(user_id: Uuid, currency_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            currency_id,
            funds: Funds::default(),
            status: WalletStatus::Active,
            meta: None,
            last_activity: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Prepare for persist: refresh activity timestamps. Called by the
    /// engine right before `save_wallet`.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.last_activity = Some(now);
    }
}

/// Ledger entry kinds, one per applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Deposit,
    Withdraw,
    Freeze,
    Unfreeze,
    DeductFrozen,
    InternalTransfer,
    Trade,
    Fee,
    Adjust,
    /// Admin wallet status transition; zero-amount audit marker.
    StatusChange,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdraw => "withdraw",
            EntryKind::Freeze => "freeze",
            EntryKind::Unfreeze => "unfreeze",
            EntryKind::DeductFrozen => "deduct_frozen",
            EntryKind::InternalTransfer => "internal_transfer",
            EntryKind::Trade => "trade",
            EntryKind::Fee => "fee",
            EntryKind::Adjust => "adjust",
            EntryKind::StatusChange => "status_change",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WalletError> {
        match s {
            "deposit" => Ok(EntryKind::Deposit),
            "withdraw" => Ok(EntryKind::Withdraw),
            "freeze" => Ok(EntryKind::Freeze),
            "unfreeze" => Ok(EntryKind::Unfreeze),
            "deduct_frozen" => Ok(EntryKind::DeductFrozen),
            "internal_transfer" => Ok(EntryKind::InternalTransfer),
            "trade" => Ok(EntryKind::Trade),
            "fee" => Ok(EntryKind::Fee),
            "adjust" => Ok(EntryKind::Adjust),
            "status_change" => Ok(EntryKind::StatusChange),
            other => Err(WalletError::Store(format!("unknown entry kind: {other}"))),
        }
    }
}

/// Ledger entry status. The engine only ever writes `Completed`; the other
/// states exist for externally reconciled entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
    Canceled,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
            EntryStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, WalletError> {
        match s {
            "pending" => Ok(EntryStatus::Pending),
            "completed" => Ok(EntryStatus::Completed),
            "failed" => Ok(EntryStatus::Failed),
            "canceled" => Ok(EntryStatus::Canceled),
            other => Err(WalletError::Store(format!("unknown entry status: {other}"))),
        }
    }
}

/// Optional references carried by a ledger entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryRefs {
    /// Shared id linking entries created in one transaction (e.g. both legs
    /// of an internal transfer).
    pub transaction_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub ref_id: Option<Uuid>,
    pub ref_type: Option<String>,
    pub meta: Option<String>,
}

/// Append-only audit record for one applied balance mutation.
///
/// The before/after snapshots are always captured by the engine from the
/// locked wallet; callers never supply them. Together with `kind` and
/// `amount` they are sufficient to reconstruct any balance by replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Uuid,
    pub kind: EntryKind,
    pub status: EntryStatus,
    /// Operation magnitude. Positive for every kind except `Adjust`, which
    /// carries the signed admin delta.
    pub amount: Decimal,
    pub fee: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub frozen_before: Decimal,
    pub frozen_after: Decimal,
    /// Idempotency key of the WalletAction that produced this entry.
    pub action_id: Option<Uuid>,
    pub refs: EntryRefs,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Record a committed mutation from the wallet's funds snapshots taken
    /// around the arithmetic. Fee must be non-negative.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        user_id: Uuid,
        wallet_id: Uuid,
        kind: EntryKind,
        amount: Decimal,
        fee: Decimal,
        before: Funds,
        after: Funds,
        action_id: Option<Uuid>,
        refs: EntryRefs,
    ) -> Result<Self, WalletError> {
        if fee < Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            wallet_id,
            kind,
            status: EntryStatus::Completed,
            amount,
            fee,
            balance_before: before.balance(),
            balance_after: after.balance(),
            frozen_before: before.frozen(),
            frozen_after: after.frozen(),
            action_id,
            refs,
            created_at: Utc::now(),
        })
    }
}

/// Wallet action kinds accepted by the idempotent gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Deposit,
    Withdraw,
    Freeze,
    Unfreeze,
    DeductFrozen,
    InternalTransfer,
    /// Admin correction, signed nonzero amount.
    Adjust,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Deposit => "deposit",
            ActionKind::Withdraw => "withdraw",
            ActionKind::Freeze => "freeze",
            ActionKind::Unfreeze => "unfreeze",
            ActionKind::DeductFrozen => "deduct_frozen",
            ActionKind::InternalTransfer => "internal_transfer",
            ActionKind::Adjust => "adjust",
        }
    }
}

/// Idempotent instruction envelope submitted to the engine.
///
/// `action_id` is the idempotency key: applying the same id twice returns
/// the first result without re-mutating. Deposit-class actions target
/// (user, currency) and may create the wallet; all other kinds target an
/// existing wallet by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAction {
    pub action_id: Uuid,
    pub user_id: Uuid,
    pub wallet_id: Option<Uuid>,
    pub currency_id: Option<Uuid>,
    /// Destination wallet for `InternalTransfer`.
    pub dest_wallet_id: Option<Uuid>,
    pub amount: Decimal,
    pub kind: ActionKind,
    pub reason: String,
    pub order_id: Option<Uuid>,
    pub pair_id: Option<Uuid>,
    pub ref_code: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Distributed tracing correlation.
    pub trace_id: Option<String>,
    /// Emitting service or subsystem (e.g. "settlement-service").
    pub source: Option<String>,
}

impl WalletAction {
    fn base(kind: ActionKind, user_id: Uuid, amount: Decimal) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            user_id,
            wallet_id: None,
            currency_id: None,
            dest_wallet_id: None,
            amount,
            kind,
            reason: String::new(),
            order_id: None,
            pair_id: None,
            ref_code: None,
            created_at: Utc::now(),
            trace_id: None,
            source: None,
        }
    }

    pub fn deposit(user_id: Uuid, currency_id: Uuid, amount: Decimal) -> Self {
        let mut a = Self::base(ActionKind::Deposit, user_id, amount);
        a.currency_id = Some(currency_id);
        a
    }

    pub fn withdraw(user_id: Uuid, wallet_id: Uuid, amount: Decimal) -> Self {
        let mut a = Self::base(ActionKind::Withdraw, user_id, amount);
        a.wallet_id = Some(wallet_id);
        a
    }

    pub fn freeze(user_id: Uuid, wallet_id: Uuid, amount: Decimal) -> Self {
        let mut a = Self::base(ActionKind::Freeze, user_id, amount);
        a.wallet_id = Some(wallet_id);
        a
    }

    pub fn unfreeze(user_id: Uuid, wallet_id: Uuid, amount: Decimal) -> Self {
        let mut a = Self::base(ActionKind::Unfreeze, user_id, amount);
        a.wallet_id = Some(wallet_id);
        a
    }

    pub fn deduct_frozen(user_id: Uuid, wallet_id: Uuid, amount: Decimal) -> Self {
        let mut a = Self::base(ActionKind::DeductFrozen, user_id, amount);
        a.wallet_id = Some(wallet_id);
        a
    }

    pub fn internal_transfer(
        user_id: Uuid,
        from_wallet_id: Uuid,
        to_wallet_id: Uuid,
        amount: Decimal,
    ) -> Self {
        let mut a = Self::base(ActionKind::InternalTransfer, user_id, amount);
        a.wallet_id = Some(from_wallet_id);
        a.dest_wallet_id = Some(to_wallet_id);
        a
    }

    pub fn adjust(user_id: Uuid, wallet_id: Uuid, delta: Decimal) -> Self {
        let mut a = Self::base(ActionKind::Adjust, user_id, delta);
        a.wallet_id = Some(wallet_id);
        a
    }

    /// Validate shape before any lock is taken. Amount must be positive for
    /// every kind except adjust, which only has to be nonzero.
    pub fn validate(&self) -> Result<(), WalletError> {
        if self.action_id.is_nil() || self.user_id.is_nil() {
            return Err(WalletError::InvalidAction(
                "action_id and user_id must be set".to_string(),
            ));
        }
        match self.kind {
            ActionKind::Adjust => {
                if self.amount.is_zero() {
                    return Err(WalletError::ZeroAdjust);
                }
            }
            _ => {
                if self.amount <= Decimal::ZERO {
                    return Err(WalletError::InvalidAmount);
                }
            }
        }
        match self.kind {
            ActionKind::Deposit => {
                if self.currency_id.is_none() && self.wallet_id.is_none() {
                    return Err(WalletError::CurrencyNotFound);
                }
            }
            ActionKind::InternalTransfer => {
                let (from, to) = match (self.wallet_id, self.dest_wallet_id) {
                    (Some(f), Some(t)) => (f, t),
                    _ => return Err(WalletError::WalletNotFound),
                };
                if from == to {
                    return Err(WalletError::SameWallet);
                }
            }
            _ => {
                if self.wallet_id.is_none() {
                    return Err(WalletError::WalletNotFound);
                }
            }
        }
        Ok(())
    }
}

/// Admin envelope for bulk operations (airdrops, reconciliations): a wallet
/// action plus the operator who issued it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkWalletOp {
    pub action: WalletAction,
    pub operator_id: Uuid,
    pub note: Option<String>,
}
