//! Enrollment history entries
//!
//! One entry is appended per status transition and never changed
//! afterwards, forming the audit trail of an enrollment. For an enrollment
//! whose status changed N times there are exactly N entries, each one's
//! `previous_status` equal to its predecessor's `new_status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enrollment::EnrollmentStatus;
use super::newtypes::{ActorId, EnrollmentId, HistoryId};

/// An immutable record of a single status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentHistoryEntry {
    /// Assigned by the store when the entry is persisted
    id: Option<HistoryId>,
    enrollment_id: EnrollmentId,
    previous_status: EnrollmentStatus,
    new_status: EnrollmentStatus,
    reason: Option<String>,
    actor: ActorId,
    /// Creation time; the store overwrites it with its own clock on insert
    recorded_at: DateTime<Utc>,
}

impl EnrollmentHistoryEntry {
    /// Creates a new, not yet persisted entry
    ///
    /// A blank reason is stored as `None`.
    ///
    /// # Example
    ///
    /// ```
    /// use matricula_core::domain::{ActorId, EnrollmentHistoryEntry, EnrollmentId, EnrollmentStatus};
    ///
    /// let entry = EnrollmentHistoryEntry::new(
    ///     EnrollmentId::new(),
    ///     EnrollmentStatus::Pending,
    ///     EnrollmentStatus::Active,
    ///     "  ",
    ///     ActorId::new("admin1").unwrap(),
    /// );
    /// assert!(entry.reason().is_none());
    /// assert!(entry.id().is_none());
    /// ```
    pub fn new(
        enrollment_id: EnrollmentId,
        previous_status: EnrollmentStatus,
        new_status: EnrollmentStatus,
        reason: impl Into<String>,
        actor: ActorId,
    ) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            None
        } else {
            Some(reason.trim().to_string())
        };
        Self {
            id: None,
            enrollment_id,
            previous_status,
            new_status,
            reason,
            actor,
            recorded_at: Utc::now(),
        }
    }

    /// Rebuilds a persisted entry from stored columns
    pub fn restore(
        id: HistoryId,
        enrollment_id: EnrollmentId,
        previous_status: EnrollmentStatus,
        new_status: EnrollmentStatus,
        reason: Option<String>,
        actor: ActorId,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            enrollment_id,
            previous_status,
            new_status,
            reason,
            actor,
            recorded_at,
        }
    }

    /// Marks the entry as persisted under `id` at `recorded_at`
    pub fn persisted(mut self, id: HistoryId, recorded_at: DateTime<Utc>) -> Self {
        self.id = Some(id);
        self.recorded_at = recorded_at;
        self
    }

    pub fn id(&self) -> Option<HistoryId> {
        self.id
    }

    pub fn enrollment_id(&self) -> &EnrollmentId {
        &self.enrollment_id
    }

    pub fn previous_status(&self) -> EnrollmentStatus {
        self.previous_status
    }

    pub fn new_status(&self) -> EnrollmentStatus {
        self.new_status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
