//! Enrollment state manager
//!
//! Changes an enrollment's status and appends the matching history entry.
//! The store has no transaction spanning both tables, so the two writes are
//! sequenced by hand:
//!
//! ```text
//!   fetch ──► same status? ──yes──► Unchanged (0 writes)
//!                 │ no
//!                 ▼
//!   write record (CAS on version) ──conflict──► re-read, retry
//!                 │ ok                └─other──► Persistence
//!                 ▼
//!   append history ──ok──► Applied
//!                 │ failed
//!                 ▼
//!   revert record ──ok──► AuditWriteFailed (degraded)
//!                 │ failed
//!                 ▼
//!   enqueue reconciliation ──► AuditFailedCompensationFailed (fatal)
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::TransitionsConfig;
use crate::domain::{
    ActorId, Enrollment, EnrollmentFieldsUpdate, EnrollmentHistoryEntry, EnrollmentId,
    EnrollmentPatch, EnrollmentStatus, ReconciliationEntry, ReconciliationId,
};
use crate::ports::{GatewayError, INotificationService, IPersistenceGateway, Notification};

use super::error::{EnrollmentError, TransitionOutcome, TransitionReport};

/// Use case for status transitions and field edits on enrollment records
pub struct EnrollmentStateManager {
    gateway: Arc<dyn IPersistenceGateway + Send + Sync>,
    notifier: Option<Arc<dyn INotificationService + Send + Sync>>,
    config: TransitionsConfig,
}

impl EnrollmentStateManager {
    /// Creates a new state manager
    ///
    /// # Arguments
    ///
    /// * `gateway` - Record store holding enrollments, history and the reconciliation queue
    /// * `notifier` - Optional operator alert channel for degraded and fatal outcomes
    /// * `config` - Retry and reconciliation settings
    pub fn new(
        gateway: Arc<dyn IPersistenceGateway + Send + Sync>,
        notifier: Option<Arc<dyn INotificationService + Send + Sync>>,
        config: TransitionsConfig,
    ) -> Self {
        Self {
            gateway,
            notifier,
            config,
        }
    }

    /// Moves an enrollment to `new_status` and records the transition
    ///
    /// # Returns
    ///
    /// A report with the record after the call and whether anything changed.
    /// Asking for the current status writes nothing.
    ///
    /// # Errors
    ///
    /// * `NotFound` - no enrollment with this id; nothing written
    /// * `Persistence` - the record write failed or kept conflicting; nothing written
    /// * `AuditWriteFailed` - the history append failed and the record was restored
    /// * `AuditFailedCompensationFailed` - the history append and the restore both
    ///   failed; the record shows `new_status` without a history entry
    pub async fn update_status(
        &self,
        enrollment_id: &EnrollmentId,
        new_status: EnrollmentStatus,
        reason: &str,
        actor: &ActorId,
    ) -> Result<TransitionReport, EnrollmentError> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            // Step 1: Read the current record
            let current = self.fetch_existing(enrollment_id).await?;
            let previous_status = current.status();

            // Step 2: Same status is a no-op
            if previous_status == new_status {
                debug!(
                    enrollment_id = %enrollment_id,
                    status = %new_status,
                    "Status unchanged, nothing to write"
                );
                return Ok(TransitionReport {
                    enrollment: current,
                    outcome: TransitionOutcome::Unchanged,
                    attempts,
                });
            }

            // Step 3: Write the record, guarded by the version we read
            let patch = current.plan_status_change(new_status, Utc::now().date_naive());
            let written = match self
                .gateway
                .update_enrollment(enrollment_id, &patch, Some(current.version()))
                .await
            {
                Ok(written) => written,
                Err(e) if e.is_conflict() && attempts <= self.config.max_conflict_retries => {
                    debug!(
                        enrollment_id = %enrollment_id,
                        attempt = attempts,
                        error = %e,
                        "Concurrent update detected, retrying"
                    );
                    continue;
                }
                Err(GatewayError::NotFound { .. }) => {
                    return Err(EnrollmentError::NotFound(enrollment_id.to_string()));
                }
                Err(e) => {
                    warn!(
                        enrollment_id = %enrollment_id,
                        attempt = attempts,
                        error = %e,
                        "Status write failed, no history attempted"
                    );
                    return Err(EnrollmentError::Persistence(e));
                }
            };

            // Step 4: Append the history entry
            let entry = EnrollmentHistoryEntry::new(
                *enrollment_id,
                previous_status,
                new_status,
                reason,
                actor.clone(),
            );
            return match self.gateway.insert_history(&entry).await {
                Ok(history_entry) => {
                    info!(
                        enrollment_id = %enrollment_id,
                        previous = %previous_status,
                        new = %new_status,
                        actor = %actor,
                        attempt = attempts,
                        "Enrollment status changed"
                    );
                    Ok(TransitionReport {
                        enrollment: written,
                        outcome: TransitionOutcome::Applied { history_entry },
                        attempts,
                    })
                }
                // Step 5: Undo the record write
                Err(audit_error) => Err(self.compensate(&current, written, &entry, audit_error).await),
            };
        }
    }

    /// Same as [`update_status`](Self::update_status) for raw caller input
    ///
    /// An unknown status or a blank actor is a `Validation` error. An id
    /// that cannot name any enrollment is reported as `NotFound`.
    pub async fn update_status_by_ref(
        &self,
        raw_id: &str,
        raw_status: &str,
        reason: &str,
        raw_actor: &str,
    ) -> Result<TransitionReport, EnrollmentError> {
        let new_status: EnrollmentStatus = raw_status.parse()?;
        let actor = ActorId::new(raw_actor)?;
        let enrollment_id: EnrollmentId = raw_id
            .parse()
            .map_err(|_| EnrollmentError::NotFound(raw_id.to_string()))?;

        self.update_status(&enrollment_id, new_status, reason, &actor)
            .await
    }

    /// Edits progress, notes or completion date without touching the status
    ///
    /// No history entry is written. An empty update returns the current
    /// record without writing.
    pub async fn update_fields(
        &self,
        enrollment_id: &EnrollmentId,
        update: EnrollmentFieldsUpdate,
        actor: &ActorId,
    ) -> Result<Enrollment, EnrollmentError> {
        let patch = update.into_patch()?;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let current = self.fetch_existing(enrollment_id).await?;
            if patch.is_empty() {
                return Ok(current);
            }

            match self
                .gateway
                .update_enrollment(enrollment_id, &patch, Some(current.version()))
                .await
            {
                Ok(updated) => {
                    info!(
                        enrollment_id = %enrollment_id,
                        actor = %actor,
                        version = updated.version(),
                        "Enrollment fields updated"
                    );
                    return Ok(updated);
                }
                Err(e) if e.is_conflict() && attempts <= self.config.max_conflict_retries => {
                    debug!(enrollment_id = %enrollment_id, attempt = attempts, "Retrying field update");
                }
                Err(GatewayError::NotFound { .. }) => {
                    return Err(EnrollmentError::NotFound(enrollment_id.to_string()));
                }
                Err(e) => return Err(EnrollmentError::Persistence(e)),
            }
        }
    }

    async fn fetch_existing(&self, enrollment_id: &EnrollmentId) -> Result<Enrollment, EnrollmentError> {
        self.gateway
            .fetch_enrollment(enrollment_id)
            .await
            .map_err(EnrollmentError::Persistence)?
            .ok_or_else(|| EnrollmentError::NotFound(enrollment_id.to_string()))
    }

    /// Reverts `written` to the status fields of `previous`
    ///
    /// Always returns the error to surface: degraded when the revert landed,
    /// fatal when it did not.
    async fn compensate(
        &self,
        previous: &Enrollment,
        written: Enrollment,
        entry: &EnrollmentHistoryEntry,
        audit_error: GatewayError,
    ) -> EnrollmentError {
        let revert: EnrollmentPatch = written.revert_patch(previous);
        let enrollment_id = *written.id();

        match self
            .gateway
            .update_enrollment(&enrollment_id, &revert, Some(written.version()))
            .await
        {
            Ok(restored) => {
                warn!(
                    enrollment_id = %enrollment_id,
                    attempted = %entry.new_status(),
                    restored = %restored.status(),
                    error = %audit_error,
                    "History write failed, status change reverted"
                );
                self.notify(Notification::degraded(
                    "Enrollment status change reverted",
                    format!(
                        "Could not record {} -> {} for enrollment {}: {}. The status was restored.",
                        entry.previous_status(),
                        entry.new_status(),
                        enrollment_id,
                        audit_error
                    ),
                ))
                .await;

                EnrollmentError::AuditWriteFailed {
                    enrollment: Box::new(restored),
                    attempted_status: entry.new_status(),
                    audit_error,
                }
            }
            Err(compensation_error) => {
                let reconciliation_id = if self.config.durable_reconciliation {
                    self.enqueue_reconciliation(entry, &audit_error, &compensation_error)
                        .await
                } else {
                    None
                };

                error!(
                    enrollment_id = %enrollment_id,
                    previous = %entry.previous_status(),
                    new = %entry.new_status(),
                    audit_error = %audit_error,
                    compensation_error = %compensation_error,
                    reconciliation_id = ?reconciliation_id,
                    "History write and compensation both failed, manual reconciliation required"
                );
                self.notify(Notification::invariant_violated(
                    "Enrollment history out of sync",
                    format!(
                        "Enrollment {} shows status {} with no history entry (was {}). \
                         History write: {}. Revert: {}. Reconciliation entry: {}.",
                        enrollment_id,
                        entry.new_status(),
                        entry.previous_status(),
                        audit_error,
                        compensation_error,
                        reconciliation_id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "none".to_string())
                    ),
                ))
                .await;

                EnrollmentError::AuditFailedCompensationFailed {
                    enrollment: Box::new(written),
                    previous_status: entry.previous_status(),
                    audit_error,
                    compensation_error,
                    reconciliation_id,
                }
            }
        }
    }

    async fn enqueue_reconciliation(
        &self,
        entry: &EnrollmentHistoryEntry,
        audit_error: &GatewayError,
        compensation_error: &GatewayError,
    ) -> Option<ReconciliationId> {
        let pending = ReconciliationEntry::new(
            *entry.enrollment_id(),
            entry.previous_status(),
            entry.new_status(),
            entry.reason().map(str::to_string),
            entry.actor().clone(),
            audit_error.to_string(),
            compensation_error.to_string(),
        );
        match self.gateway.enqueue_reconciliation(&pending).await {
            Ok(stored) => Some(*stored.id()),
            Err(e) => {
                error!(
                    enrollment_id = %entry.enrollment_id(),
                    error = %e,
                    "Failed to store reconciliation entry"
                );
                None
            }
        }
    }

    /// Best effort; a failed delivery is logged and otherwise ignored
    async fn notify(&self, notification: Notification) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&notification).await {
                warn!(title = %notification.title, error = %e, "Failed to deliver notification");
            }
        }
    }
}
