//! AuditLogger - operator audit trail for enrollment commands
//!
//! Turns the result of each use-case call into an `AuditRecord` and emits
//! it as a structured `tracing` event under the `matricula::audit` target.
//! All methods are non-fatal: a record that cannot be serialized is
//! reported via `tracing::warn!` and the command continues.
//!
//! This trail is separate from the enrollment history table. History is
//! the domain record of status changes; the audit trail records every
//! command an operator ran, including rejected and no-op ones.

use chrono::{DateTime, Utc};
use matricula_core::domain::{Enrollment, ReconciliationEntry};
use matricula_core::usecases::{EnrollmentError, ReconcileSummary, Severity, TransitionReport};
use serde::Serialize;
use serde_json::{json, Value};

use crate::reason::ReasonCode;

/// Target used for every audit event
pub const AUDIT_TARGET: &str = "matricula::audit";

/// Command that produced an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Enroll,
    StatusChange,
    FieldUpdate,
    Reconcile,
    ManualResolve,
}

/// How the command ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum AuditResult {
    Success,
    /// The command was valid but changed nothing
    Unchanged,
    Failed {
        reason: ReasonCode,
        severity: Severity,
        message: String,
    },
}

impl AuditResult {
    /// Builds a failed result from a use-case error
    pub fn failed(err: &EnrollmentError) -> Self {
        AuditResult::Failed {
            reason: ReasonCode::from_error(err),
            severity: err.severity(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, AuditResult::Failed { .. })
    }
}

/// One line of the audit trail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    #[serde(flatten)]
    pub result: AuditResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, result: AuditResult) -> Self {
        Self {
            action,
            result,
            enrollment_id: None,
            actor: None,
            details: Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_enrollment_id(mut self, id: impl Into<String>) -> Self {
        self.enrollment_id = Some(id.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Reason code when the command failed
    pub fn reason(&self) -> Option<ReasonCode> {
        match &self.result {
            AuditResult::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// High-level audit logger for the enrollment commands.
///
/// Each `log_*` method builds the record, emits it, and returns it so the
/// caller can reuse it (the CLI prints it in `--json` mode).
#[derive(Debug, Clone, Default)]
pub struct AuditLogger {
    _private: (),
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a record, swallowing serialization errors with a warning.
    pub fn emit(&self, record: &AuditRecord) {
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize audit record");
                return;
            }
        };

        match &record.result {
            AuditResult::Failed {
                severity: Severity::Fatal,
                ..
            } => tracing::error!(target: AUDIT_TARGET, action = ?record.action, record = %payload, "audit"),
            AuditResult::Failed {
                severity: Severity::Degraded,
                ..
            } => tracing::warn!(target: AUDIT_TARGET, action = ?record.action, record = %payload, "audit"),
            _ => tracing::info!(target: AUDIT_TARGET, action = ?record.action, record = %payload, "audit"),
        }
    }

    // ========================================================================
    // Enrollment commands
    // ========================================================================

    /// Log an enrollment creation.
    pub fn log_enrollment_created(
        &self,
        result: &Result<Enrollment, EnrollmentError>,
    ) -> AuditRecord {
        let record = match result {
            Ok(enrollment) => AuditRecord::new(AuditAction::Enroll, AuditResult::Success)
                .with_enrollment_id(enrollment.id().to_string())
                .with_details(json!({
                    "student_ref": enrollment.student_ref().as_str(),
                    "course_ref": enrollment.course_ref().as_str(),
                    "status": enrollment.status(),
                })),
            Err(e) => AuditRecord::new(AuditAction::Enroll, AuditResult::failed(e)),
        };
        self.emit(&record);
        record
    }

    /// Log a status change request.
    pub fn log_status_change(
        &self,
        enrollment_id: &str,
        actor: &str,
        result: &Result<TransitionReport, EnrollmentError>,
    ) -> AuditRecord {
        let record = match result {
            Ok(report) if report.is_unchanged() => {
                AuditRecord::new(AuditAction::StatusChange, AuditResult::Unchanged).with_details(
                    json!({ "status": report.enrollment.status() }),
                )
            }
            Ok(report) => {
                let mut details = json!({
                    "new_status": report.enrollment.status(),
                    "version": report.enrollment.version(),
                    "attempts": report.attempts,
                });
                if let Some(entry) = report.history_entry() {
                    details["previous_status"] = json!(entry.previous_status());
                }
                AuditRecord::new(AuditAction::StatusChange, AuditResult::Success)
                    .with_details(details)
            }
            Err(e) => {
                let mut record = AuditRecord::new(AuditAction::StatusChange, AuditResult::failed(e));
                if let EnrollmentError::AuditFailedCompensationFailed {
                    reconciliation_id, ..
                } = e
                {
                    record = record.with_details(json!({
                        "reconciliation_id": reconciliation_id.as_ref().map(|id| id.to_string()),
                    }));
                }
                record
            }
        };
        let record = record
            .with_enrollment_id(enrollment_id)
            .with_actor(actor);
        self.emit(&record);
        record
    }

    /// Log a non-status field update.
    pub fn log_fields_update(
        &self,
        enrollment_id: &str,
        actor: &str,
        result: &Result<Enrollment, EnrollmentError>,
    ) -> AuditRecord {
        let record = match result {
            Ok(enrollment) => AuditRecord::new(AuditAction::FieldUpdate, AuditResult::Success)
                .with_details(json!({
                    "progress": enrollment.progress(),
                    "version": enrollment.version(),
                })),
            Err(e) => AuditRecord::new(AuditAction::FieldUpdate, AuditResult::failed(e)),
        }
        .with_enrollment_id(enrollment_id)
        .with_actor(actor);
        self.emit(&record);
        record
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Log a reconciliation pass.
    pub fn log_reconcile(&self, result: &Result<ReconcileSummary, EnrollmentError>) -> AuditRecord {
        let record = match result {
            Ok(summary) => AuditRecord::new(AuditAction::Reconcile, AuditResult::Success)
                .with_details(json!({
                    "examined": summary.examined,
                    "backfilled": summary.backfilled,
                    "already_reverted": summary.already_reverted,
                    "left_pending": summary.left_pending,
                })),
            Err(e) => AuditRecord::new(AuditAction::Reconcile, AuditResult::failed(e)),
        };
        self.emit(&record);
        record
    }

    /// Log a manual resolution of a queue entry.
    pub fn log_manual_resolve(
        &self,
        reconciliation_id: &str,
        result: &Result<ReconciliationEntry, EnrollmentError>,
    ) -> AuditRecord {
        let record = match result {
            Ok(entry) => AuditRecord::new(AuditAction::ManualResolve, AuditResult::Success)
                .with_enrollment_id(entry.enrollment_id().to_string()),
            Err(e) => AuditRecord::new(AuditAction::ManualResolve, AuditResult::failed(e)),
        }
        .with_details(json!({ "reconciliation_id": reconciliation_id }));
        self.emit(&record);
        record
    }
}
