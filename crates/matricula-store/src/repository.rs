//! SQLite implementation of IPersistenceGateway
//!
//! This module provides the concrete SQLite-based implementation of the
//! persistence gateway port defined in matricula-core. It handles domain
//! type conversion and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type                   | SQL Type | Strategy                                      |
//! |-------------------------------|----------|-----------------------------------------------|
//! | EnrollmentId, HistoryId, ...  | TEXT     | UUID string via `.to_string()` / `FromStr`    |
//! | StudentRef, CourseRef, ActorId| TEXT     | String via `.as_str()` / `new()`              |
//! | EnrollmentStatus              | TEXT     | Lowercase name via `.as_str()` / `FromStr`    |
//! | NaiveDate                     | TEXT     | `YYYY-MM-DD`                                  |
//! | DateTime<Utc>                 | TEXT     | RFC 3339, microseconds, `Z` suffix            |
//! | u8 progress, u64 version      | INTEGER  | Widened to `i64`                              |
//! | ReconciliationState           | TEXT x2  | `resolution` + `resolved_at`, NULL if pending |
//!
//! ## Compare-and-swap
//!
//! `update_enrollment` runs a single `UPDATE ... WHERE id = ? AND version = ?
//! RETURNING *`, so the check and the write are one statement. When no row
//! comes back the current version is read to tell a missing row from a
//! conflict.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use matricula_core::domain::{
    ActorId, CourseRef, Enrollment, EnrollmentHistoryEntry, EnrollmentId, EnrollmentPatch,
    EnrollmentStatus, HistoryId, ReconciliationEntry, ReconciliationId, ReconciliationState,
    Resolution, StudentRef,
};
use matricula_core::ports::{EnrollmentFilter, GatewayError, GatewayResult, IPersistenceGateway};

use crate::StoreError;

/// SQLite-based implementation of the persistence gateway port
pub struct SqliteEnrollmentGateway {
    pool: SqlitePool,
}

impl SqliteEnrollmentGateway {
    /// Creates a new gateway over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, id: &str) -> Result<Option<i64>, StoreError> {
        let version = sqlx::query_scalar("SELECT version FROM enrollments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Format a timestamp so that string order matches time order
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's own datetime() format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| StoreError::SerializationError(format!("Failed to parse date '{}': {}", s, e)))
}

fn parse_optional_date(s: Option<String>) -> Result<Option<NaiveDate>, StoreError> {
    match s {
        Some(ref val) if !val.is_empty() => parse_date(val).map(Some),
        _ => Ok(None),
    }
}

fn parse_status(s: &str) -> Result<EnrollmentStatus, StoreError> {
    EnrollmentStatus::from_str(s)
        .map_err(|e| StoreError::SerializationError(format!("Unknown enrollment status: {}", e)))
}

/// Parse a domain value stored as TEXT
fn parse_column<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        StoreError::SerializationError(format!("Invalid value in column {}: {}", column, e))
    })
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn enrollment_from_row(row: &SqliteRow) -> Result<Enrollment, StoreError> {
    let id: String = row.try_get("id")?;
    let student_ref: String = row.try_get("student_ref")?;
    let course_ref: String = row.try_get("course_ref")?;
    let status: String = row.try_get("status")?;
    let initial_status: String = row.try_get("initial_status")?;
    let start_date: String = row.try_get("start_date")?;
    let completion_date: Option<String> = row.try_get("completion_date")?;
    let progress: i64 = row.try_get("progress")?;
    let notes: Option<String> = row.try_get("notes")?;
    let version: i64 = row.try_get("version")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let progress = u8::try_from(progress).map_err(|_| {
        StoreError::SerializationError(format!("progress out of range: {}", progress))
    })?;
    let version = u64::try_from(version).map_err(|_| {
        StoreError::SerializationError(format!("version out of range: {}", version))
    })?;

    Ok(Enrollment::restore(
        parse_column::<EnrollmentId>("id", &id)?,
        parse_column::<StudentRef>("student_ref", &student_ref)?,
        parse_column::<CourseRef>("course_ref", &course_ref)?,
        parse_status(&status)?,
        parse_status(&initial_status)?,
        parse_date(&start_date)?,
        parse_optional_date(completion_date)?,
        progress,
        notes,
        version,
        parse_datetime(&created_at)?,
        parse_datetime(&updated_at)?,
    ))
}

fn history_entry_from_row(row: &SqliteRow) -> Result<EnrollmentHistoryEntry, StoreError> {
    let id: String = row.try_get("id")?;
    let enrollment_id: String = row.try_get("enrollment_id")?;
    let previous_status: String = row.try_get("previous_status")?;
    let new_status: String = row.try_get("new_status")?;
    let reason: Option<String> = row.try_get("reason")?;
    let actor: String = row.try_get("actor")?;
    let recorded_at: String = row.try_get("recorded_at")?;

    Ok(EnrollmentHistoryEntry::restore(
        parse_column::<HistoryId>("id", &id)?,
        parse_column::<EnrollmentId>("enrollment_id", &enrollment_id)?,
        parse_status(&previous_status)?,
        parse_status(&new_status)?,
        reason,
        parse_column::<ActorId>("actor", &actor)?,
        parse_datetime(&recorded_at)?,
    ))
}

fn reconciliation_from_row(row: &SqliteRow) -> Result<ReconciliationEntry, StoreError> {
    let id: String = row.try_get("id")?;
    let enrollment_id: String = row.try_get("enrollment_id")?;
    let previous_status: String = row.try_get("previous_status")?;
    let attempted_status: String = row.try_get("attempted_status")?;
    let reason: Option<String> = row.try_get("reason")?;
    let actor: String = row.try_get("actor")?;
    let audit_error: String = row.try_get("audit_error")?;
    let compensation_error: String = row.try_get("compensation_error")?;
    let created_at: String = row.try_get("created_at")?;
    let resolution: Option<String> = row.try_get("resolution")?;
    let resolved_at: Option<String> = row.try_get("resolved_at")?;

    let state = match (resolution, resolved_at) {
        (Some(resolution), Some(resolved_at)) => ReconciliationState::Resolved {
            resolution: parse_column::<Resolution>("resolution", &resolution)?,
            resolved_at: parse_datetime(&resolved_at)?,
        },
        (None, None) => ReconciliationState::Pending,
        _ => {
            return Err(StoreError::SerializationError(format!(
                "reconciliation entry {} has a partial resolution",
                id
            )))
        }
    };

    Ok(ReconciliationEntry::restore(
        parse_column::<ReconciliationId>("id", &id)?,
        parse_column::<EnrollmentId>("enrollment_id", &enrollment_id)?,
        parse_status(&previous_status)?,
        parse_status(&attempted_status)?,
        reason,
        parse_column::<ActorId>("actor", &actor)?,
        audit_error,
        compensation_error,
        parse_datetime(&created_at)?,
        state,
    ))
}

// ============================================================================
// IPersistenceGateway implementation
// ============================================================================

#[async_trait::async_trait]
impl IPersistenceGateway for SqliteEnrollmentGateway {
    // --- Enrollment records ---

    async fn fetch_enrollment(&self, id: &EnrollmentId) -> GatewayResult<Option<Enrollment>> {
        let row = sqlx::query("SELECT * FROM enrollments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some(ref r) => Ok(Some(enrollment_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> GatewayResult<Enrollment> {
        let id = enrollment.id().to_string();

        sqlx::query(
            "INSERT INTO enrollments \
             (id, student_ref, course_ref, status, initial_status, start_date, \
              completion_date, progress, notes, version, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(enrollment.student_ref().as_str())
        .bind(enrollment.course_ref().as_str())
        .bind(enrollment.status().as_str())
        .bind(enrollment.initial_status().as_str())
        .bind(format_date(enrollment.start_date()))
        .bind(enrollment.completion_date().map(format_date))
        .bind(i64::from(enrollment.progress()))
        .bind(enrollment.notes())
        .bind(enrollment.version() as i64)
        .bind(format_datetime(enrollment.created_at()))
        .bind(format_datetime(enrollment.updated_at()))
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        tracing::trace!(enrollment_id = %id, "Inserted enrollment");
        Ok(enrollment.clone())
    }

    async fn update_enrollment(
        &self,
        id: &EnrollmentId,
        patch: &EnrollmentPatch,
        expected_version: Option<u64>,
    ) -> GatewayResult<Enrollment> {
        let id_str = id.to_string();
        let expected = expected_version.map(|v| v as i64);
        let completion_date = patch.completion_date.flatten().map(format_date);
        let notes = patch.notes.clone().flatten();

        // Nullable columns take a "set it" flag so that None can mean "clear"
        let row = sqlx::query(
            "UPDATE enrollments SET \
                status = COALESCE(?, status), \
                completion_date = CASE WHEN ? THEN ? ELSE completion_date END, \
                progress = COALESCE(?, progress), \
                notes = CASE WHEN ? THEN ? ELSE notes END, \
                version = version + 1, \
                updated_at = ? \
             WHERE id = ? AND (? IS NULL OR version = ?) \
             RETURNING *",
        )
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.completion_date.is_some())
        .bind(completion_date)
        .bind(patch.progress.map(i64::from))
        .bind(patch.notes.is_some())
        .bind(notes)
        .bind(format_datetime(Utc::now()))
        .bind(&id_str)
        .bind(expected)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        if let Some(ref r) = row {
            let updated = enrollment_from_row(r)?;
            tracing::trace!(
                enrollment_id = %id_str,
                version = updated.version(),
                "Updated enrollment"
            );
            return Ok(updated);
        }

        // Nothing matched: either the row is gone or the version moved on
        match (self.current_version(&id_str).await?, expected_version) {
            (None, _) => Err(GatewayError::NotFound {
                table: "enrollments",
                id: id_str,
            }),
            (Some(actual), Some(expected)) => {
                tracing::debug!(
                    enrollment_id = %id_str,
                    expected,
                    actual,
                    "Version conflict on enrollment update"
                );
                Err(GatewayError::VersionConflict {
                    expected,
                    actual: actual as u64,
                })
            }
            (Some(_), None) => Err(GatewayError::Unavailable(format!(
                "update of enrollment {} matched no row",
                id_str
            ))),
        }
    }

    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> GatewayResult<Vec<Enrollment>> {
        let mut sql = String::from("SELECT * FROM enrollments WHERE 1=1");
        let mut binds: Vec<String> = Vec::new();

        if let Some(ref student) = filter.student_ref {
            sql.push_str(" AND student_ref = ?");
            binds.push(student.as_str().to_string());
        }

        if let Some(ref course) = filter.course_ref {
            sql.push_str(" AND course_ref = ?");
            binds.push(course.as_str().to_string());
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(status.as_str().to_string());
        }

        if let Some(since) = filter.updated_since {
            sql.push_str(" AND updated_at > ?");
            binds.push(format_datetime(since));
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let mut enrollments = Vec::with_capacity(rows.len());
        for row in &rows {
            enrollments.push(enrollment_from_row(row)?);
        }
        Ok(enrollments)
    }

    // --- History ---

    async fn insert_history(
        &self,
        entry: &EnrollmentHistoryEntry,
    ) -> GatewayResult<EnrollmentHistoryEntry> {
        let id = HistoryId::new();
        let recorded_at = Utc::now();

        sqlx::query(
            "INSERT INTO enrollment_history \
             (id, enrollment_id, previous_status, new_status, reason, actor, recorded_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(entry.enrollment_id().to_string())
        .bind(entry.previous_status().as_str())
        .bind(entry.new_status().as_str())
        .bind(entry.reason())
        .bind(entry.actor().as_str())
        .bind(format_datetime(recorded_at))
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        tracing::trace!(
            enrollment_id = %entry.enrollment_id(),
            history_id = %id,
            "Appended history entry"
        );
        Ok(entry.clone().persisted(id, recorded_at))
    }

    async fn list_history(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> GatewayResult<Vec<EnrollmentHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM enrollment_history WHERE enrollment_id = ? ORDER BY seq DESC",
        )
        .bind(enrollment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(history_entry_from_row(row)?);
        }
        Ok(entries)
    }

    // --- Reconciliation queue ---

    async fn enqueue_reconciliation(
        &self,
        entry: &ReconciliationEntry,
    ) -> GatewayResult<ReconciliationEntry> {
        let (resolution, resolved_at) = match entry.state() {
            ReconciliationState::Pending => (None, None),
            ReconciliationState::Resolved {
                resolution,
                resolved_at,
            } => (Some(resolution.as_str()), Some(format_datetime(*resolved_at))),
        };

        sqlx::query(
            "INSERT INTO reconciliation_queue \
             (id, enrollment_id, previous_status, attempted_status, reason, actor, \
              audit_error, compensation_error, created_at, resolution, resolved_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id().to_string())
        .bind(entry.enrollment_id().to_string())
        .bind(entry.previous_status().as_str())
        .bind(entry.attempted_status().as_str())
        .bind(entry.reason())
        .bind(entry.actor().as_str())
        .bind(entry.audit_error())
        .bind(entry.compensation_error())
        .bind(format_datetime(entry.created_at()))
        .bind(resolution)
        .bind(resolved_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        tracing::trace!(
            reconciliation_id = %entry.id(),
            enrollment_id = %entry.enrollment_id(),
            "Queued reconciliation entry"
        );
        Ok(entry.clone())
    }

    async fn list_reconciliation(
        &self,
        pending_only: bool,
    ) -> GatewayResult<Vec<ReconciliationEntry>> {
        let sql = if pending_only {
            "SELECT * FROM reconciliation_queue WHERE resolution IS NULL ORDER BY seq ASC"
        } else {
            "SELECT * FROM reconciliation_queue ORDER BY seq ASC"
        };

        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(reconciliation_from_row(row)?);
        }
        Ok(entries)
    }

    async fn resolve_reconciliation(
        &self,
        id: &ReconciliationId,
        resolution: Resolution,
    ) -> GatewayResult<ReconciliationEntry> {
        let row = sqlx::query(
            "UPDATE reconciliation_queue SET resolution = ?, resolved_at = ? \
             WHERE id = ? RETURNING *",
        )
        .bind(resolution.as_str())
        .bind(format_datetime(Utc::now()))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        match row {
            Some(ref r) => Ok(reconciliation_from_row(r)?),
            None => Err(GatewayError::NotFound {
                table: "reconciliation_queue",
                id: id.to_string(),
            }),
        }
    }
}
