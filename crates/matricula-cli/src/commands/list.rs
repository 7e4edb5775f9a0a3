//! List command - Query enrollments
//!
//! Provides the `matricula list` CLI command which:
//! 1. Filters enrollments by student, course, status and update time
//! 2. Formats records in a table, most recently updated first
//! 3. Supports relative and absolute time parsing for the --since flag

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use matricula_core::domain::{CourseRef, EnrollmentStatus, StudentRef};
use matricula_core::ports::EnrollmentFilter;
use matricula_core::usecases::EnrollmentError;
use tracing::info;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

/// Arguments for the list subcommand
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Filter by student reference
    #[arg(long)]
    pub student: Option<String>,

    /// Filter by course reference
    #[arg(long)]
    pub course: Option<String>,

    /// Filter by status
    #[arg(long)]
    pub status: Option<String>,

    /// Only records updated since this time (e.g., "1h", "2d", "2026-01-01")
    #[arg(long)]
    pub since: Option<String>,

    /// Maximum number of records to show
    #[arg(long, default_value = "50")]
    pub limit: u32,
}

impl ListCommand {
    fn filter(&self) -> Result<EnrollmentFilter> {
        let mut filter = EnrollmentFilter::new().with_limit(self.limit);
        if let Some(raw) = &self.student {
            filter = filter.with_student(StudentRef::new(raw.as_str()).map_err(EnrollmentError::from)?);
        }
        if let Some(raw) = &self.course {
            filter = filter.with_course(CourseRef::new(raw.as_str()).map_err(EnrollmentError::from)?);
        }
        if let Some(raw) = &self.status {
            let status: EnrollmentStatus = raw.parse().map_err(EnrollmentError::from)?;
            filter = filter.with_status(status);
        }
        if let Some(raw) = &self.since {
            let since = parse_since(raw).context(format!(
                "Invalid --since value: '{}'. Expected formats: '1h', '30m', '2d', '1w', '2026-01-01', '2026-01-01T12:00:00'",
                raw
            ))?;
            info!(since = %since, "Filtering enrollments updated since");
            filter = filter.with_updated_since(since);
        }
        Ok(filter)
    }

    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let filter = self.filter()?;
        let enrollments = ctx.query().list_enrollments(&filter).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "limit": self.limit,
                "count": enrollments.len(),
                "enrollments": enrollments,
            }));
            return Ok(());
        }

        if enrollments.is_empty() {
            formatter.info("No enrollments found for the specified criteria.");
            return Ok(());
        }

        formatter.success(&format!("Enrollments ({} records)", enrollments.len()));
        formatter.info("");
        formatter.info("  ID                                    Student          Course           Status     Progress");
        formatter.info("  ------------------------------------ ---------------- ---------------- ---------- --------");
        for enrollment in &enrollments {
            formatter.info(&format!(
                "  {} {:<16} {:<16} {:<10} {:>3}%",
                enrollment.id(),
                truncate_string(enrollment.student_ref().as_str(), 16),
                truncate_string(enrollment.course_ref().as_str(), 16),
                enrollment.status(),
                enrollment.progress()
            ));
        }

        if enrollments.len() as u32 >= self.limit {
            formatter.info("");
            formatter.info(&format!(
                "Showing {} records (limit). Use --limit to show more.",
                self.limit
            ));
        }
        Ok(())
    }
}

/// Parse the --since argument into a DateTime<Utc>
///
/// Supports:
/// - Relative: "1h" (1 hour ago), "30m" (30 minutes), "2d" (2 days), "1w" (1 week)
/// - Absolute date: "2026-01-01"
/// - Absolute datetime: "2026-01-01T12:00:00"
fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Some(duration) = parse_relative_duration(input) {
        return Ok(Utc::now() - duration);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .context("Failed to create datetime from date")?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    anyhow::bail!(
        "Could not parse '{}' as a time. Use relative (1h, 30m, 2d, 1w) or absolute (2026-01-01) format.",
        input
    )
}

/// Parse relative duration strings like "1h", "30m", "2d", "1w"
fn parse_relative_duration(input: &str) -> Option<chrono::Duration> {
    if input.len() < 2 {
        return None;
    }

    let (num_str, unit) = input.split_at(input.len() - 1);
    let num: i64 = num_str.parse().ok()?;

    match unit {
        "m" => Some(chrono::Duration::minutes(num)),
        "h" => Some(chrono::Duration::hours(num)),
        "d" => Some(chrono::Duration::days(num)),
        "w" => Some(chrono::Duration::weeks(num)),
        _ => None,
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
