//! Set-status command - Change an enrollment's status
//!
//! Provides the `matricula set-status` CLI command which:
//! 1. Writes the new status to the record (compare-and-swap on version)
//! 2. Appends the matching history entry
//! 3. Reports a restored record or an operator alert when the append fails

use anyhow::Result;
use clap::Args;
use matricula_core::usecases::TransitionOutcome;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

/// Arguments for the set-status subcommand
#[derive(Debug, Args)]
pub struct SetStatusCommand {
    /// Enrollment ID
    pub id: String,

    /// New status (active, pending, suspended, completed, inactive)
    pub status: String,

    /// Who is making the change
    #[arg(long)]
    pub actor: String,

    /// Free-text reason recorded in the history entry
    #[arg(long, default_value = "")]
    pub reason: String,
}

impl SetStatusCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let result = ctx
            .state_manager()
            .update_status_by_ref(&self.id, &self.status, &self.reason, &self.actor)
            .await;
        let record = ctx.audit.log_status_change(&self.id, &self.actor, &result);
        let report = result?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "enrollment": report.enrollment,
                "outcome": report.outcome,
                "attempts": report.attempts,
                "audit": record,
            }));
            return Ok(());
        }

        match &report.outcome {
            TransitionOutcome::Unchanged => {
                formatter.success(&format!(
                    "Enrollment {} is already {}; nothing written",
                    report.enrollment.id(),
                    report.enrollment.status()
                ));
            }
            TransitionOutcome::Applied { history_entry } => {
                formatter.success(&format!(
                    "Enrollment {}: {} \u{2192} {}",
                    report.enrollment.id(),
                    history_entry.previous_status(),
                    history_entry.new_status()
                ));
                formatter.info(&format!("Version: {}", report.enrollment.version()));
                if report.attempts > 1 {
                    formatter.info(&format!(
                        "Applied after {} attempts (concurrent writers)",
                        report.attempts
                    ));
                }
            }
        }
        Ok(())
    }
}
