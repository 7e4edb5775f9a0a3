//! Reconciliation use case
//!
//! Works through the queue of enrollments whose record and history trail
//! disagree after a failed compensation. Each pending entry is compared
//! with the record as it stands now:
//!
//! - record at the attempted status: the missing history entry is appended
//! - record back at the previous status: nothing to repair
//! - anything else: left pending for a human
//!
//! Either repair also requires the recorded trail to still end at the
//! previous status with nothing recorded since the failure. Otherwise the
//! entry is treated as diverged.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    EnrollmentHistoryEntry, EnrollmentId, EnrollmentStatus, ReconciliationEntry, ReconciliationId,
    Resolution,
};
use crate::ports::{GatewayError, IPersistenceGateway};

use super::error::EnrollmentError;

/// What happened to one queue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum ReconcileAction {
    HistoryBackfilled,
    AlreadyReverted,
    /// The record or its trail moved on since the failed transition
    Diverged { current_status: EnrollmentStatus },
    /// The enrollment no longer exists
    Missing,
    /// A store call failed; the entry stays pending
    Failed { error: String },
}

/// Outcome for one queue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileItem {
    pub reconciliation_id: ReconciliationId,
    pub enrollment_id: EnrollmentId,
    pub action: ReconcileAction,
}

/// Totals for one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub examined: usize,
    pub backfilled: usize,
    pub already_reverted: usize,
    pub left_pending: usize,
    pub items: Vec<ReconcileItem>,
}

impl ReconcileSummary {
    fn record(&mut self, item: ReconcileItem) {
        self.examined += 1;
        match item.action {
            ReconcileAction::HistoryBackfilled => self.backfilled += 1,
            ReconcileAction::AlreadyReverted => self.already_reverted += 1,
            _ => self.left_pending += 1,
        }
        self.items.push(item);
    }

    pub fn is_clean(&self) -> bool {
        self.left_pending == 0
    }
}

/// Use case for repairing history trails from the reconciliation queue
pub struct ReconcileUseCase {
    gateway: Arc<dyn IPersistenceGateway + Send + Sync>,
}

impl ReconcileUseCase {
    pub fn new(gateway: Arc<dyn IPersistenceGateway + Send + Sync>) -> Self {
        Self { gateway }
    }

    /// Lists queue entries, oldest first
    pub async fn list(&self, pending_only: bool) -> Result<Vec<ReconciliationEntry>, EnrollmentError> {
        self.gateway
            .list_reconciliation(pending_only)
            .await
            .map_err(EnrollmentError::Persistence)
    }

    /// Processes every pending queue entry
    ///
    /// Backfilled history entries keep the actor and reason of the failed
    /// transition. A failure on one entry does not stop the pass.
    pub async fn reconcile_pending(&self) -> Result<ReconcileSummary, EnrollmentError> {
        let pending = self.list(true).await?;
        let mut summary = ReconcileSummary::default();

        for entry in pending {
            let action = match self.reconcile_one(&entry).await {
                Ok(action) => action,
                Err(e) => {
                    warn!(
                        reconciliation_id = %entry.id(),
                        enrollment_id = %entry.enrollment_id(),
                        error = %e,
                        "Reconciliation step failed"
                    );
                    ReconcileAction::Failed {
                        error: e.to_string(),
                    }
                }
            };
            summary.record(ReconcileItem {
                reconciliation_id: *entry.id(),
                enrollment_id: *entry.enrollment_id(),
                action,
            });
        }

        info!(
            examined = summary.examined,
            backfilled = summary.backfilled,
            already_reverted = summary.already_reverted,
            left_pending = summary.left_pending,
            "Reconciliation pass finished"
        );
        Ok(summary)
    }

    /// Closes an entry after an operator repaired the record by hand
    pub async fn resolve_manually(
        &self,
        id: &ReconciliationId,
    ) -> Result<ReconciliationEntry, EnrollmentError> {
        let resolved = self
            .gateway
            .resolve_reconciliation(id, Resolution::Manual)
            .await
            .map_err(|e| match e {
                GatewayError::NotFound { .. } => {
                    EnrollmentError::NotFound(id.to_string())
                }
                other => EnrollmentError::Persistence(other),
            })?;
        info!(reconciliation_id = %id, "Reconciliation entry resolved manually");
        Ok(resolved)
    }

    async fn reconcile_one(
        &self,
        entry: &ReconciliationEntry,
    ) -> Result<ReconcileAction, EnrollmentError> {
        let Some(enrollment) = self
            .gateway
            .fetch_enrollment(entry.enrollment_id())
            .await
            .map_err(EnrollmentError::Persistence)?
        else {
            return Ok(ReconcileAction::Missing);
        };

        let history = self
            .gateway
            .list_history(entry.enrollment_id())
            .await
            .map_err(EnrollmentError::Persistence)?;
        let recorded_since = history
            .iter()
            .any(|h| h.recorded_at() > entry.created_at());
        let trail_matches = !recorded_since
            && trail_end(enrollment.initial_status(), &history) == Some(entry.previous_status());

        let current = enrollment.status();
        if trail_matches && current == entry.attempted_status() {
            let backfill = EnrollmentHistoryEntry::new(
                *entry.enrollment_id(),
                entry.previous_status(),
                entry.attempted_status(),
                entry.reason().unwrap_or_default(),
                entry.actor().clone(),
            );
            self.gateway
                .insert_history(&backfill)
                .await
                .map_err(EnrollmentError::Persistence)?;
            self.resolve(entry, Resolution::HistoryBackfilled).await?;
            info!(
                enrollment_id = %entry.enrollment_id(),
                status = %current,
                "Missing history entry backfilled"
            );
            Ok(ReconcileAction::HistoryBackfilled)
        } else if trail_matches && current == entry.previous_status() {
            self.resolve(entry, Resolution::AlreadyReverted).await?;
            Ok(ReconcileAction::AlreadyReverted)
        } else {
            warn!(
                enrollment_id = %entry.enrollment_id(),
                current = %current,
                previous = %entry.previous_status(),
                attempted = %entry.attempted_status(),
                recorded_since,
                "Enrollment diverged, needs manual reconciliation"
            );
            Ok(ReconcileAction::Diverged {
                current_status: current,
            })
        }
    }

    async fn resolve(
        &self,
        entry: &ReconciliationEntry,
        resolution: Resolution,
    ) -> Result<(), EnrollmentError> {
        self.gateway
            .resolve_reconciliation(entry.id(), resolution)
            .await
            .map(|_| ())
            .map_err(EnrollmentError::Persistence)
    }
}

/// Status the recorded trail ends at, or `None` if a link is broken
///
/// `history` is most recent first, as the gateway lists it.
fn trail_end(
    initial_status: EnrollmentStatus,
    history: &[EnrollmentHistoryEntry],
) -> Option<EnrollmentStatus> {
    history.iter().rev().try_fold(initial_status, |at, h| {
        (h.previous_status() == at).then(|| h.new_status())
    })
}
