//! Reason codes for audit records
//!
//! Provides structured codes for categorizing why an enrollment operation
//! failed. Used by `AuditLogger` to enrich audit records and by the CLI in
//! JSON output.

use std::fmt;

use matricula_core::ports::GatewayError;
use matricula_core::usecases::EnrollmentError;
use serde::{Deserialize, Serialize};

/// Structured reason codes for failed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The enrollment or queue entry does not exist
    NotFound,
    /// Caller input was rejected before any write
    ValidationFailed,
    /// The record kept changing underneath the caller
    VersionConflict,
    /// The store refused the write (constraint, trigger, bad data)
    StoreRejected,
    /// The store could not be reached or timed out
    StoreUnavailable,
    /// The history append failed; the record was restored
    HistoryWriteFailed,
    /// The history append and the restore both failed
    CompensationFailed,
}

impl ReasonCode {
    /// Classifies a gateway failure
    pub fn from_gateway(err: &GatewayError) -> Self {
        match err {
            GatewayError::NotFound { .. } => ReasonCode::NotFound,
            GatewayError::VersionConflict { .. } => ReasonCode::VersionConflict,
            GatewayError::Rejected(_) => ReasonCode::StoreRejected,
            GatewayError::Unavailable(_) => ReasonCode::StoreUnavailable,
        }
    }

    /// Classifies a use-case failure
    pub fn from_error(err: &EnrollmentError) -> Self {
        match err {
            EnrollmentError::NotFound(_) => ReasonCode::NotFound,
            EnrollmentError::Validation(_) => ReasonCode::ValidationFailed,
            EnrollmentError::Persistence(e) => Self::from_gateway(e),
            EnrollmentError::AuditWriteFailed { .. } => ReasonCode::HistoryWriteFailed,
            EnrollmentError::AuditFailedCompensationFailed { .. } => ReasonCode::CompensationFailed,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::NotFound => "not_found",
            ReasonCode::ValidationFailed => "validation_failed",
            ReasonCode::VersionConflict => "version_conflict",
            ReasonCode::StoreRejected => "store_rejected",
            ReasonCode::StoreUnavailable => "store_unavailable",
            ReasonCode::HistoryWriteFailed => "history_write_failed",
            ReasonCode::CompensationFailed => "compensation_failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matricula_core::domain::DomainError;

    #[test]
    fn reason_code_display() {
        assert_eq!(ReasonCode::NotFound.to_string(), "not_found");
        assert_eq!(
            ReasonCode::HistoryWriteFailed.to_string(),
            "history_write_failed"
        );
        assert_eq!(
            ReasonCode::CompensationFailed.to_string(),
            "compensation_failed"
        );
    }

    #[test]
    fn reason_code_serialization() {
        let code = ReasonCode::VersionConflict;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"version_conflict\"");

        let deserialized: ReasonCode = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, code);
    }

    #[test]
    fn persistence_errors_use_gateway_reason() {
        let err = EnrollmentError::Persistence(GatewayError::VersionConflict {
            expected: 2,
            actual: 5,
        });
        assert_eq!(ReasonCode::from_error(&err), ReasonCode::VersionConflict);

        let err = EnrollmentError::Persistence(GatewayError::Unavailable("down".into()));
        assert_eq!(ReasonCode::from_error(&err), ReasonCode::StoreUnavailable);
    }

    #[test]
    fn validation_and_not_found() {
        let err = EnrollmentError::Validation(DomainError::InvalidStatus("x".into()));
        assert_eq!(ReasonCode::from_error(&err), ReasonCode::ValidationFailed);

        let err = EnrollmentError::NotFound("nonexistent-id".into());
        assert_eq!(ReasonCode::from_error(&err), ReasonCode::NotFound);
    }
}
