//! CLI subcommands

pub mod completions;
pub mod config;
pub mod enroll;
pub mod history;
pub mod list;
pub mod reconcile;
pub mod set_status;
pub mod show;
pub mod update;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use matricula_audit::ReasonCode;
use matricula_core::domain::{Enrollment, EnrollmentId};
use matricula_core::usecases::{EnrollmentError, Severity};
use serde_json::json;

use crate::output::{OutputFormat, OutputFormatter};

/// Parses an enrollment id; a malformed id cannot name a record.
pub fn parse_enrollment_id(raw: &str) -> Result<EnrollmentId, EnrollmentError> {
    raw.parse()
        .map_err(|_| EnrollmentError::NotFound(raw.to_string()))
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))
}

/// Prints the fields of one enrollment in human form.
pub fn print_enrollment(formatter: &dyn OutputFormatter, enrollment: &Enrollment) {
    formatter.info(&format!("ID:          {}", enrollment.id()));
    formatter.info(&format!("Student:     {}", enrollment.student_ref()));
    formatter.info(&format!("Course:      {}", enrollment.course_ref()));
    formatter.info(&format!("Status:      {}", enrollment.status()));
    formatter.info(&format!("Start:       {}", enrollment.start_date()));
    formatter.info(&format!(
        "Completed:   {}",
        enrollment
            .completion_date()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    formatter.info(&format!("Progress:    {}%", enrollment.progress()));
    if let Some(notes) = enrollment.notes() {
        formatter.info(&format!("Notes:       {}", notes));
    }
    formatter.info(&format!("Version:     {}", enrollment.version()));
    formatter.info(&format!(
        "Updated:     {}",
        enrollment.updated_at().format("%Y-%m-%d %H:%M:%S")
    ));
}

/// Renders a command failure.
///
/// Use-case errors get their code, severity and reason; a broken history
/// invariant additionally raises an operator alert. In JSON mode the error
/// document is the only error output.
pub fn render_error(format: OutputFormat, formatter: &dyn OutputFormatter, err: &anyhow::Error) {
    let Some(enrollment_err) = err.downcast_ref::<EnrollmentError>() else {
        formatter.error(&format!("{:#}", err));
        return;
    };

    if format.is_json() {
        let mut value = json!({
            "success": false,
            "code": enrollment_err.code(),
            "severity": enrollment_err.severity(),
            "reason": ReasonCode::from_error(enrollment_err),
            "wrote_anything": enrollment_err.wrote_anything(),
            "error": enrollment_err.to_string(),
        });
        if let Some(enrollment) = enrollment_err.enrollment() {
            value["enrollment"] = serde_json::to_value(enrollment).unwrap_or_default();
        }
        if let EnrollmentError::AuditFailedCompensationFailed {
            reconciliation_id, ..
        } = enrollment_err
        {
            value["reconciliation_id"] = json!(reconciliation_id.as_ref().map(|id| id.to_string()));
        }
        formatter.print_json(&value);
    }

    match enrollment_err.severity() {
        Severity::Fatal => {
            if !format.is_json() {
                formatter.error(&enrollment_err.to_string());
            }
            let queued = match enrollment_err {
                EnrollmentError::AuditFailedCompensationFailed {
                    reconciliation_id: Some(id),
                    ..
                } => format!("queued as {}; run 'matricula reconcile run' once the store recovers", id),
                _ => "could not be queued; repair the history by hand".to_string(),
            };
            formatter.alert(&format!("history invariant violated, {}", queued));
        }
        Severity::Degraded if !format.is_json() => {
            formatter.warn(&enrollment_err.to_string());
        }
        Severity::Recoverable | Severity::Retryable if !format.is_json() => {
            formatter.error(&enrollment_err.to_string());
        }
        _ => {}
    }
}
