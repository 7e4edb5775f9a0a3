//! Reconciliation queue entries
//!
//! When a status write succeeded but both the history append and the
//! compensating revert failed, the record shows a status with no matching
//! history entry. A `ReconciliationEntry` makes that violation durable so
//! it can be repaired later instead of living only in a log line.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enrollment::EnrollmentStatus;
use super::newtypes::{ActorId, EnrollmentId, ReconciliationId};

/// How a reconciliation entry was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The record still showed the attempted status; the missing history
    /// entry was appended
    HistoryBackfilled,
    /// The record was already back at its previous status
    AlreadyReverted,
    /// An operator closed the entry by hand
    Manual,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::HistoryBackfilled => "history_backfilled",
            Resolution::AlreadyReverted => "already_reverted",
            Resolution::Manual => "manual",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resolution {
    type Err = super::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "history_backfilled" => Ok(Resolution::HistoryBackfilled),
            "already_reverted" => Ok(Resolution::AlreadyReverted),
            "manual" => Ok(Resolution::Manual),
            other => Err(super::DomainError::ValidationFailed(format!(
                "Unknown resolution: {other}"
            ))),
        }
    }
}

/// Lifecycle of a reconciliation entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ReconciliationState {
    Pending,
    Resolved {
        resolution: Resolution,
        resolved_at: DateTime<Utc>,
    },
}

/// A durable record of an enrollment whose history trail is missing an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    id: ReconciliationId,
    enrollment_id: EnrollmentId,
    previous_status: EnrollmentStatus,
    attempted_status: EnrollmentStatus,
    reason: Option<String>,
    actor: ActorId,
    audit_error: String,
    compensation_error: String,
    created_at: DateTime<Utc>,
    state: ReconciliationState,
}

impl ReconciliationEntry {
    /// Creates a new pending entry
    pub fn new(
        enrollment_id: EnrollmentId,
        previous_status: EnrollmentStatus,
        attempted_status: EnrollmentStatus,
        reason: Option<String>,
        actor: ActorId,
        audit_error: impl Into<String>,
        compensation_error: impl Into<String>,
    ) -> Self {
        Self {
            id: ReconciliationId::new(),
            enrollment_id,
            previous_status,
            attempted_status,
            reason,
            actor,
            audit_error: audit_error.into(),
            compensation_error: compensation_error.into(),
            created_at: Utc::now(),
            state: ReconciliationState::Pending,
        }
    }

    /// Rebuilds an entry from stored columns
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ReconciliationId,
        enrollment_id: EnrollmentId,
        previous_status: EnrollmentStatus,
        attempted_status: EnrollmentStatus,
        reason: Option<String>,
        actor: ActorId,
        audit_error: String,
        compensation_error: String,
        created_at: DateTime<Utc>,
        state: ReconciliationState,
    ) -> Self {
        Self {
            id,
            enrollment_id,
            previous_status,
            attempted_status,
            reason,
            actor,
            audit_error,
            compensation_error,
            created_at,
            state,
        }
    }

    pub fn id(&self) -> &ReconciliationId {
        &self.id
    }

    pub fn enrollment_id(&self) -> &EnrollmentId {
        &self.enrollment_id
    }

    pub fn previous_status(&self) -> EnrollmentStatus {
        self.previous_status
    }

    pub fn attempted_status(&self) -> EnrollmentStatus {
        self.attempted_status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn audit_error(&self) -> &str {
        &self.audit_error
    }

    pub fn compensation_error(&self) -> &str {
        &self.compensation_error
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ReconciliationState::Pending)
    }

    /// Closes the entry
    pub fn resolve(&mut self, resolution: Resolution, at: DateTime<Utc>) {
        self.state = ReconciliationState::Resolved {
            resolution,
            resolved_at: at,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_pending() {
        let entry = ReconciliationEntry::new(
            EnrollmentId::new(),
            EnrollmentStatus::Pending,
            EnrollmentStatus::Active,
            None,
            ActorId::new("admin1").unwrap(),
            "history insert rejected",
            "store unavailable",
        );
        assert!(entry.is_pending());
    }

    #[test]
    fn test_resolve() {
        let mut entry = ReconciliationEntry::new(
            EnrollmentId::new(),
            EnrollmentStatus::Pending,
            EnrollmentStatus::Active,
            None,
            ActorId::new("admin1").unwrap(),
            "a",
            "b",
        );
        entry.resolve(Resolution::HistoryBackfilled, Utc::now());
        assert!(!entry.is_pending());
        assert!(matches!(
            entry.state(),
            ReconciliationState::Resolved {
                resolution: Resolution::HistoryBackfilled,
                ..
            }
        ));
    }

    #[test]
    fn test_resolution_round_trips_through_str() {
        for r in [
            Resolution::HistoryBackfilled,
            Resolution::AlreadyReverted,
            Resolution::Manual,
        ] {
            assert_eq!(r.as_str().parse::<Resolution>().unwrap(), r);
        }
    }
}
