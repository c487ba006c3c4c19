//! Bulk Operation Runner
//!
//! Applies a batch of wallet actions sequentially through the engine's
//! idempotency gate. Partial success is the contract: one rejected action
//! never rolls back its neighbours, and the report pairs every input with
//! its outcome in submission order. Because each action carries its own
//! action_id, resubmitting an entire failed batch is safe; already-applied
//! actions short-circuit to their original entries.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::engine::WalletEngine;
use super::error::WalletError;
use super::models::{BulkWalletOp, WalletTransaction};

/// Result of one action within a batch.
#[derive(Debug)]
pub enum BulkOutcome {
    Applied(WalletTransaction),
    Rejected(WalletError),
}

impl BulkOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, BulkOutcome::Applied(_))
    }
}

/// Per-batch report: one outcome per submitted op, in submission order.
#[derive(Debug)]
pub struct BulkReport {
    pub outcomes: Vec<(Uuid, BulkOutcome)>,
    pub applied: usize,
    pub rejected: usize,
}

impl BulkReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_applied(&self) -> bool {
        self.rejected == 0
    }
}

pub struct BulkRunner {
    engine: WalletEngine,
}

impl BulkRunner {
    pub fn new(engine: WalletEngine) -> Self {
        Self { engine }
    }

    /// Run a batch to completion. Never aborts early: a validation or
    /// conflict error on one op is recorded and the runner moves on.
    #[instrument(skip(self, ops), fields(batch = ops.len()))]
    pub async fn run(&self, ops: &[BulkWalletOp]) -> BulkReport {
        let mut outcomes = Vec::with_capacity(ops.len());
        let mut applied = 0usize;
        let mut rejected = 0usize;

        for op in ops {
            let action_id = op.action.action_id;
            match self.engine.apply(&op.action).await {
                Ok(entry) => {
                    applied += 1;
                    outcomes.push((action_id, BulkOutcome::Applied(entry)));
                }
                Err(e) => {
                    warn!(
                        action_id = %action_id,
                        operator_id = %op.operator_id,
                        code = e.code(),
                        "Bulk op rejected"
                    );
                    rejected += 1;
                    outcomes.push((action_id, BulkOutcome::Rejected(e)));
                }
            }
        }

        info!(applied, rejected, "Bulk batch finished");
        BulkReport {
            outcomes,
            applied,
            rejected,
        }
    }
}
