//! Enrollment domain entity
//!
//! An enrollment is a student's registration in a course, tracked by
//! status over time. Records are created once, mutated through the state
//! manager, and never physically deleted; `Inactive` is the soft end of
//! the lifecycle.
//!
//! ## Statuses
//!
//! ```text
//!   pending ──► active ──► completed
//!      │          │  ▲
//!      │          ▼  │
//!      │       suspended
//!      │          │
//!      └──────────┴──────► inactive
//! ```
//!
//! The diagram shows the usual flow only. Any status may move to any other
//! status; no transition graph is enforced.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{CourseRef, EnrollmentId, StudentRef};

/// Upper bound for `progress`
pub const MAX_PROGRESS: u8 = 100;

// ============================================================================
// EnrollmentStatus
// ============================================================================

/// Status of an enrollment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    /// Student is attending the course
    Active,
    /// Waiting on payment, documents or approval
    #[default]
    Pending,
    /// Temporarily blocked
    Suspended,
    /// Course finished
    Completed,
    /// Soft-deleted / withdrawn
    Inactive,
}

impl EnrollmentStatus {
    /// Every status, in declaration order
    pub const ALL: [EnrollmentStatus; 5] = [
        EnrollmentStatus::Active,
        EnrollmentStatus::Pending,
        EnrollmentStatus::Suspended,
        EnrollmentStatus::Completed,
        EnrollmentStatus::Inactive,
    ];

    /// Returns the lowercase storage/display name
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Suspended => "suspended",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Inactive => "inactive",
        }
    }

    /// Returns true for statuses that normally end an enrollment
    pub fn is_terminal_like(&self) -> bool {
        matches!(self, EnrollmentStatus::Completed | EnrollmentStatus::Inactive)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        EnrollmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| DomainError::InvalidStatus(s.to_string()))
    }
}

// ============================================================================
// EnrollmentPatch
// ============================================================================

/// A partial update to an enrollment's mutable fields
///
/// `None` leaves a field untouched. For nullable fields the inner option
/// distinguishes "set to this value" from "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentPatch {
    pub status: Option<EnrollmentStatus>,
    pub completion_date: Option<Option<NaiveDate>>,
    pub progress: Option<u8>,
    pub notes: Option<Option<String>>,
}

impl EnrollmentPatch {
    /// Creates an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.completion_date.is_none()
            && self.progress.is_none()
            && self.notes.is_none()
    }

    /// Applies the patch to a record's mutable fields
    ///
    /// Does not touch `version` or `updated_at`; those belong to the store.
    pub fn apply_to(&self, enrollment: &mut Enrollment) {
        if let Some(status) = self.status {
            enrollment.status = status;
        }
        if let Some(completion_date) = self.completion_date {
            enrollment.completion_date = completion_date;
        }
        if let Some(progress) = self.progress {
            enrollment.progress = progress;
        }
        if let Some(ref notes) = self.notes {
            enrollment.notes = notes.clone();
        }
    }
}

// ============================================================================
// EnrollmentFieldsUpdate
// ============================================================================

/// Caller input for non-status field edits
///
/// Monotonic progress and the coupling between `completion_date` and the
/// `completed` status are not enforced here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentFieldsUpdate {
    pub progress: Option<u8>,
    pub notes: Option<Option<String>>,
    pub completion_date: Option<Option<NaiveDate>>,
}

impl EnrollmentFieldsUpdate {
    /// Sets the progress value
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sets (or clears, with an empty string) the notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = Some(if notes.trim().is_empty() {
            None
        } else {
            Some(notes)
        });
        self
    }

    /// Sets or clears the completion date
    pub fn with_completion_date(mut self, date: Option<NaiveDate>) -> Self {
        self.completion_date = Some(date);
        self
    }

    /// Validates the update and converts it to a store patch
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ValidationFailed` if `progress` exceeds 100.
    pub fn into_patch(self) -> Result<EnrollmentPatch, DomainError> {
        if let Some(progress) = self.progress {
            if progress > MAX_PROGRESS {
                return Err(DomainError::ValidationFailed(format!(
                    "progress must be between 0 and {MAX_PROGRESS}, got {progress}"
                )));
            }
        }
        Ok(EnrollmentPatch {
            status: None,
            completion_date: self.completion_date,
            progress: self.progress,
            notes: self.notes,
        })
    }
}

// ============================================================================
// Enrollment
// ============================================================================

/// A student's registration in a course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    id: EnrollmentId,
    student_ref: StudentRef,
    course_ref: CourseRef,
    status: EnrollmentStatus,
    /// Status the record was created with; never changes
    initial_status: EnrollmentStatus,
    start_date: NaiveDate,
    completion_date: Option<NaiveDate>,
    progress: u8,
    notes: Option<String>,
    /// Optimistic concurrency counter, bumped by every stored update
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Creates a new, not yet persisted enrollment at version 1
    pub fn new(
        student_ref: StudentRef,
        course_ref: CourseRef,
        start_date: NaiveDate,
        initial_status: EnrollmentStatus,
    ) -> Self {
        let now = Utc::now();
        let completion_date = if initial_status == EnrollmentStatus::Completed {
            Some(now.date_naive())
        } else {
            None
        };
        Self {
            id: EnrollmentId::new(),
            student_ref,
            course_ref,
            status: initial_status,
            initial_status,
            start_date,
            completion_date,
            progress: 0,
            notes: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds an enrollment from stored columns
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: EnrollmentId,
        student_ref: StudentRef,
        course_ref: CourseRef,
        status: EnrollmentStatus,
        initial_status: EnrollmentStatus,
        start_date: NaiveDate,
        completion_date: Option<NaiveDate>,
        progress: u8,
        notes: Option<String>,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student_ref,
            course_ref,
            status,
            initial_status,
            start_date,
            completion_date,
            progress,
            notes,
            version,
            created_at,
            updated_at,
        }
    }

    // --- Getters ---

    pub fn id(&self) -> &EnrollmentId {
        &self.id
    }

    pub fn student_ref(&self) -> &StudentRef {
        &self.student_ref
    }

    pub fn course_ref(&self) -> &CourseRef {
        &self.course_ref
    }

    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    pub fn initial_status(&self) -> EnrollmentStatus {
        self.initial_status
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn completion_date(&self) -> Option<NaiveDate> {
        self.completion_date
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Records a stored write: bumps the version and the update time
    pub fn mark_stored(&mut self, at: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = at;
    }

    // --- Transition planning ---

    /// Computes the patch for moving to `new_status`, including derived fields
    ///
    /// Moving to `Completed` sets `completion_date` to `today` unless one is
    /// already recorded. No other field is derived.
    pub fn plan_status_change(&self, new_status: EnrollmentStatus, today: NaiveDate) -> EnrollmentPatch {
        let mut patch = EnrollmentPatch {
            status: Some(new_status),
            ..EnrollmentPatch::default()
        };
        if new_status == EnrollmentStatus::Completed && self.completion_date.is_none() {
            patch.completion_date = Some(Some(today));
        }
        patch
    }

    /// Computes the patch that restores the status-related fields of `previous`
    ///
    /// Used to compensate a status write whose audit entry could not be stored.
    pub fn revert_patch(&self, previous: &Enrollment) -> EnrollmentPatch {
        let mut patch = EnrollmentPatch {
            status: Some(previous.status),
            ..EnrollmentPatch::default()
        };
        if self.completion_date != previous.completion_date {
            patch.completion_date = Some(previous.completion_date);
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(status: EnrollmentStatus) -> Enrollment {
        Enrollment::new(
            StudentRef::new("stu-1").unwrap(),
            CourseRef::new("course-rust-101").unwrap(),
            date(2026, 3, 1),
            status,
        )
    }

    mod status_tests {
        use super::*;

        #[test]
        fn test_parse_case_insensitive() {
            assert_eq!(
                "ACTIVE".parse::<EnrollmentStatus>().unwrap(),
                EnrollmentStatus::Active
            );
            assert_eq!(
                " completed ".parse::<EnrollmentStatus>().unwrap(),
                EnrollmentStatus::Completed
            );
        }

        #[test]
        fn test_parse_unknown_is_validation_error() {
            let err = "graduated".parse::<EnrollmentStatus>().unwrap_err();
            assert_eq!(err, DomainError::InvalidStatus("graduated".to_string()));
        }

        #[test]
        fn test_display_matches_serde() {
            for status in EnrollmentStatus::ALL {
                let json = serde_json::to_string(&status).unwrap();
                assert_eq!(json, format!("\"{status}\""));
            }
        }

        #[test]
        fn test_terminal_like() {
            assert!(EnrollmentStatus::Completed.is_terminal_like());
            assert!(EnrollmentStatus::Inactive.is_terminal_like());
            assert!(!EnrollmentStatus::Suspended.is_terminal_like());
        }
    }

    mod enrollment_tests {
        use super::*;

        #[test]
        fn test_new_defaults() {
            let enrollment = sample(EnrollmentStatus::Pending);
            assert_eq!(enrollment.status(), EnrollmentStatus::Pending);
            assert_eq!(enrollment.version(), 1);
            assert_eq!(enrollment.progress(), 0);
            assert!(enrollment.completion_date().is_none());
        }

        #[test]
        fn test_new_completed_sets_completion_date() {
            let enrollment = sample(EnrollmentStatus::Completed);
            assert!(enrollment.completion_date().is_some());
        }

        #[test]
        fn test_plan_completion_sets_date() {
            let enrollment = sample(EnrollmentStatus::Active);
            let patch = enrollment.plan_status_change(EnrollmentStatus::Completed, date(2026, 6, 30));
            assert_eq!(patch.status, Some(EnrollmentStatus::Completed));
            assert_eq!(patch.completion_date, Some(Some(date(2026, 6, 30))));
        }

        #[test]
        fn test_plan_other_status_leaves_date_alone() {
            let enrollment = sample(EnrollmentStatus::Pending);
            let patch = enrollment.plan_status_change(EnrollmentStatus::Active, date(2026, 6, 30));
            assert_eq!(patch.completion_date, None);
        }

        #[test]
        fn test_revert_restores_completion_date() {
            let before = sample(EnrollmentStatus::Active);
            let mut after = before.clone();
            let patch = before.plan_status_change(EnrollmentStatus::Completed, date(2026, 6, 30));
            patch.apply_to(&mut after);

            let revert = after.revert_patch(&before);
            assert_eq!(revert.status, Some(EnrollmentStatus::Active));
            assert_eq!(revert.completion_date, Some(None));

            revert.apply_to(&mut after);
            assert_eq!(after.status(), before.status());
            assert_eq!(after.completion_date(), before.completion_date());
        }

        #[test]
        fn test_initial_status_survives_status_changes() {
            let mut enrollment = sample(EnrollmentStatus::Pending);
            enrollment
                .plan_status_change(EnrollmentStatus::Completed, date(2026, 6, 30))
                .apply_to(&mut enrollment);
            assert_eq!(enrollment.status(), EnrollmentStatus::Completed);
            assert_eq!(enrollment.initial_status(), EnrollmentStatus::Pending);
        }

        #[test]
        fn test_mark_stored_bumps_version() {
            let mut enrollment = sample(EnrollmentStatus::Pending);
            let at = Utc::now();
            enrollment.mark_stored(at);
            assert_eq!(enrollment.version(), 2);
            assert_eq!(enrollment.updated_at(), at);
        }
    }

    mod fields_update_tests {
        use super::*;

        #[test]
        fn test_progress_over_100_rejected() {
            let err = EnrollmentFieldsUpdate::default()
                .with_progress(101)
                .into_patch()
                .unwrap_err();
            assert!(matches!(err, DomainError::ValidationFailed(_)));
        }

        #[test]
        fn test_blank_notes_clear() {
            let patch = EnrollmentFieldsUpdate::default()
                .with_notes("   ")
                .into_patch()
                .unwrap();
            assert_eq!(patch.notes, Some(None));
            assert!(patch.status.is_none());
        }

        #[test]
        fn test_empty_update_is_empty_patch() {
            let patch = EnrollmentFieldsUpdate::default().into_patch().unwrap();
            assert!(patch.is_empty());
        }
    }
}
