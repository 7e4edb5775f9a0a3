//! Failure taxonomy and outcomes returned by the enrollment use cases
//!
//! Every operation returns a tagged result. The variants are ordered by how
//! much the caller must care:
//!
//! | Variant                          | Severity      | Side effect                         |
//! |----------------------------------|---------------|-------------------------------------|
//! | `NotFound`, `Validation`         | Recoverable   | none, rejected before any write     |
//! | `Persistence`                    | Retryable     | none, safe to retry the whole call  |
//! | `AuditWriteFailed`               | Degraded      | record written, then restored       |
//! | `AuditFailedCompensationFailed`  | Fatal         | record left changed, no history row |

use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    DomainError, Enrollment, EnrollmentHistoryEntry, EnrollmentStatus, ReconciliationId,
};
use crate::ports::GatewayError;

/// How much attention an error needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Fix the input and call again
    Recoverable,
    /// Nothing was written; retrying the same call is safe
    Retryable,
    /// Warn the user; the history invariant still holds
    Degraded,
    /// Alert operators; the history invariant is violated
    Fatal,
}

/// Errors surfaced by the enrollment use cases
#[derive(Debug, Error)]
pub enum EnrollmentError {
    /// The enrollment does not exist
    #[error("enrollment {0} not found")]
    NotFound(String),

    /// Input rejected before any write
    #[error("validation failed: {0}")]
    Validation(#[from] DomainError),

    /// The store failed or rejected the record write; nothing changed
    #[error("persistence error: {0}")]
    Persistence(#[source] GatewayError),

    /// The history append failed and the record was reverted
    #[error(
        "history write failed for enrollment {}; status restored to {}",
        .enrollment.id(),
        .enrollment.status()
    )]
    AuditWriteFailed {
        /// The record after compensation
        enrollment: Box<Enrollment>,
        /// The status that was written and then reverted
        attempted_status: EnrollmentStatus,
        #[source]
        audit_error: GatewayError,
    },

    /// The history append failed and so did the revert
    #[error(
        "history write and compensation both failed for enrollment {}: record left at {} \
         without a history entry, manual reconciliation required",
        .enrollment.id(),
        .enrollment.status()
    )]
    AuditFailedCompensationFailed {
        /// The record as left in the store (showing the new status)
        enrollment: Box<Enrollment>,
        /// Status before the call
        previous_status: EnrollmentStatus,
        #[source]
        audit_error: GatewayError,
        compensation_error: GatewayError,
        /// Queue entry recording the violation, when one could be stored
        reconciliation_id: Option<ReconciliationId>,
    },
}

impl EnrollmentError {
    /// Classifies the error by recoverability
    pub fn severity(&self) -> Severity {
        match self {
            EnrollmentError::NotFound(_) | EnrollmentError::Validation(_) => Severity::Recoverable,
            EnrollmentError::Persistence(_) => Severity::Retryable,
            EnrollmentError::AuditWriteFailed { .. } => Severity::Degraded,
            EnrollmentError::AuditFailedCompensationFailed { .. } => Severity::Fatal,
        }
    }

    /// Returns true if the store was written to before the error surfaced
    pub fn wrote_anything(&self) -> bool {
        matches!(
            self,
            EnrollmentError::AuditWriteFailed { .. }
                | EnrollmentError::AuditFailedCompensationFailed { .. }
        )
    }

    /// Returns a stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            EnrollmentError::NotFound(_) => "NOT_FOUND",
            EnrollmentError::Validation(_) => "VALIDATION_ERROR",
            EnrollmentError::Persistence(_) => "PERSISTENCE_ERROR",
            EnrollmentError::AuditWriteFailed { .. } => "AUDIT_WRITE_FAILED",
            EnrollmentError::AuditFailedCompensationFailed { .. } => {
                "AUDIT_FAILED_COMPENSATION_FAILED"
            }
        }
    }

    /// The record attached to degraded and fatal errors
    pub fn enrollment(&self) -> Option<&Enrollment> {
        match self {
            EnrollmentError::AuditWriteFailed { enrollment, .. }
            | EnrollmentError::AuditFailedCompensationFailed { enrollment, .. } => {
                Some(enrollment)
            }
            _ => None,
        }
    }
}

/// Which branch a successful `update_status` call took
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TransitionOutcome {
    /// The record already had the requested status; nothing was written
    Unchanged,
    /// The status was written and its history entry appended
    Applied {
        history_entry: EnrollmentHistoryEntry,
    },
}

/// Result of a successful `update_status` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    /// The record after the call
    pub enrollment: Enrollment,
    pub outcome: TransitionOutcome,
    /// Number of compare-and-swap attempts made (1 when uncontended)
    pub attempts: u32,
}

impl TransitionReport {
    pub fn is_unchanged(&self) -> bool {
        matches!(self.outcome, TransitionOutcome::Unchanged)
    }

    pub fn history_entry(&self) -> Option<&EnrollmentHistoryEntry> {
        match &self.outcome {
            TransitionOutcome::Applied { history_entry } => Some(history_entry),
            TransitionOutcome::Unchanged => None,
        }
    }
}
