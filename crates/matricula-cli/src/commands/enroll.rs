//! Enroll command - Register a student in a course
//!
//! Provides the `matricula enroll` CLI command which creates a new
//! enrollment record at version 1 with no history entries.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use super::{parse_date, print_enrollment};
use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

/// Arguments for the enroll subcommand
#[derive(Debug, Args)]
pub struct EnrollCommand {
    /// Student reference
    pub student: String,

    /// Course reference
    pub course: String,

    /// Start date (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    pub start: Option<String>,

    /// Initial status
    #[arg(long, default_value = "pending")]
    pub status: String,
}

impl EnrollCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let start_date = match &self.start {
            Some(raw) => parse_date(raw)?,
            None => Utc::now().date_naive(),
        };

        let result = ctx
            .creator()
            .create_enrollment_by_ref(&self.student, &self.course, start_date, &self.status)
            .await;
        let record = ctx.audit.log_enrollment_created(&result);
        let enrollment = result?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "enrollment": enrollment,
                "audit": record,
            }));
        } else {
            formatter.success(&format!(
                "Enrolled {} in {}",
                enrollment.student_ref(),
                enrollment.course_ref()
            ));
            print_enrollment(formatter.as_ref(), &enrollment);
        }
        Ok(())
    }
}
