//! Persistence gateway port (driven/secondary port)
//!
//! This module defines the interface to the record store holding the
//! `enrollments` and `enrollment_history` tables, plus the reconciliation
//! queue used when the history trail cannot be kept consistent.
//!
//! ## Design Notes
//!
//! - The store offers no transaction spanning a record write and a history
//!   append. Each method is one independent round-trip.
//! - `update_enrollment` supports compare-and-swap on the record version.
//!   Callers that pass `expected_version` get `GatewayError::VersionConflict`
//!   instead of silently overwriting a concurrent change.
//! - Unlike other adapters, errors here are classified (`GatewayError`)
//!   because the state manager branches on conflicts vs. hard failures.
//! - History is append-only: there is no method to update or delete it.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    Enrollment, EnrollmentHistoryEntry, EnrollmentId, EnrollmentPatch, EnrollmentStatus,
    ReconciliationEntry, ReconciliationId, Resolution, StudentRef, CourseRef,
};

// ============================================================================
// GatewayError
// ============================================================================

/// Errors reported by a persistence gateway
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The addressed row does not exist
    #[error("{table} row {id} not found")]
    NotFound {
        /// Table name
        table: &'static str,
        /// Row identifier
        id: String,
    },

    /// Compare-and-swap failed: the row changed since it was read
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the caller read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// The store rejected the write (constraint, permission, bad data)
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The store could not be reached or failed internally
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Returns true for compare-and-swap conflicts
    pub fn is_conflict(&self) -> bool {
        matches!(self, GatewayError::VersionConflict { .. })
    }
}

/// Result alias for gateway calls
pub type GatewayResult<T> = Result<T, GatewayError>;

// ============================================================================
// EnrollmentFilter
// ============================================================================

/// Filter criteria for listing enrollments
///
/// All fields are optional; when `None`, no filtering is applied for that
/// field. Multiple filters are combined with AND logic.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentFilter {
    pub student_ref: Option<StudentRef>,
    pub course_ref: Option<CourseRef>,
    pub status: Option<EnrollmentStatus>,
    /// Only records updated after this instant
    pub updated_since: Option<DateTime<Utc>>,
    /// Maximum number of rows to return
    pub limit: Option<u32>,
}

impl EnrollmentFilter {
    /// Creates a new empty filter (matches all enrollments)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_student(mut self, student_ref: StudentRef) -> Self {
        self.student_ref = Some(student_ref);
        self
    }

    pub fn with_course(mut self, course_ref: CourseRef) -> Self {
        self.course_ref = Some(course_ref);
        self
    }

    pub fn with_status(mut self, status: EnrollmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_updated_since(mut self, since: DateTime<Utc>) -> Self {
        self.updated_since = Some(since);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if `enrollment` satisfies every set criterion
    ///
    /// `limit` is not a per-row criterion and is ignored here.
    pub fn matches(&self, enrollment: &Enrollment) -> bool {
        self.student_ref
            .as_ref()
            .map_or(true, |s| s == enrollment.student_ref())
            && self
                .course_ref
                .as_ref()
                .map_or(true, |c| c == enrollment.course_ref())
            && self.status.map_or(true, |s| s == enrollment.status())
            && self
                .updated_since
                .map_or(true, |since| enrollment.updated_at() > since)
    }
}

// ============================================================================
// IPersistenceGateway trait
// ============================================================================

/// Port trait for the enrollment record store
///
/// ## Implementation Notes
///
/// - `insert_enrollment` stores the record as given (version included).
/// - `update_enrollment` applies the patch, increments `version`, refreshes
///   `updated_at`, and returns the stored row. With `expected_version` set,
///   it must fail with `VersionConflict` when the stored version differs.
/// - `insert_history` assigns the entry id and the server-side timestamp.
/// - `list_history` returns entries most-recent-first.
#[async_trait::async_trait]
pub trait IPersistenceGateway: Send + Sync {
    // --- Enrollment records ---

    /// Fetches one enrollment by id
    async fn fetch_enrollment(&self, id: &EnrollmentId) -> GatewayResult<Option<Enrollment>>;

    /// Inserts a new enrollment record
    async fn insert_enrollment(&self, enrollment: &Enrollment) -> GatewayResult<Enrollment>;

    /// Applies a patch to an enrollment record
    async fn update_enrollment(
        &self,
        id: &EnrollmentId,
        patch: &EnrollmentPatch,
        expected_version: Option<u64>,
    ) -> GatewayResult<Enrollment>;

    /// Lists enrollments matching the filter, most recently updated first
    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> GatewayResult<Vec<Enrollment>>;

    // --- History ---

    /// Appends a history entry
    async fn insert_history(
        &self,
        entry: &EnrollmentHistoryEntry,
    ) -> GatewayResult<EnrollmentHistoryEntry>;

    /// Lists the history of one enrollment, most-recent-first
    async fn list_history(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> GatewayResult<Vec<EnrollmentHistoryEntry>>;

    // --- Reconciliation queue ---

    /// Stores a reconciliation entry
    async fn enqueue_reconciliation(
        &self,
        entry: &ReconciliationEntry,
    ) -> GatewayResult<ReconciliationEntry>;

    /// Lists reconciliation entries, oldest first
    async fn list_reconciliation(&self, pending_only: bool)
        -> GatewayResult<Vec<ReconciliationEntry>>;

    /// Marks a reconciliation entry as resolved
    async fn resolve_reconciliation(
        &self,
        id: &ReconciliationId,
        resolution: Resolution,
    ) -> GatewayResult<ReconciliationEntry>;
}
