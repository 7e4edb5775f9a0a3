//! Update command - Edit non-status enrollment fields
//!
//! Status changes go through `set-status`; this command only touches
//! progress, notes and the completion date, and writes no history.

use anyhow::Result;
use clap::Args;
use matricula_core::domain::{ActorId, EnrollmentFieldsUpdate};
use matricula_core::usecases::EnrollmentError;

use super::{parse_date, parse_enrollment_id, print_enrollment};
use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

/// Arguments for the update subcommand
#[derive(Debug, Args)]
pub struct UpdateCommand {
    /// Enrollment ID
    pub id: String,

    /// Who is making the change
    #[arg(long)]
    pub actor: String,

    /// Progress percentage (0-100)
    #[arg(long)]
    pub progress: Option<u8>,

    /// Replace the notes
    #[arg(long, conflicts_with = "clear_notes")]
    pub notes: Option<String>,

    /// Remove the notes
    #[arg(long)]
    pub clear_notes: bool,

    /// Set the completion date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "clear_completion_date")]
    pub completion_date: Option<String>,

    /// Remove the completion date
    #[arg(long)]
    pub clear_completion_date: bool,
}

impl UpdateCommand {
    /// Builds the field update from the flags
    fn fields(&self) -> Result<EnrollmentFieldsUpdate> {
        let mut update = EnrollmentFieldsUpdate::default();
        if let Some(progress) = self.progress {
            update = update.with_progress(progress);
        }
        if let Some(notes) = &self.notes {
            update = update.with_notes(notes.as_str());
        }
        if self.clear_notes {
            update = update.with_notes("");
        }
        if let Some(raw) = &self.completion_date {
            update = update.with_completion_date(Some(parse_date(raw)?));
        }
        if self.clear_completion_date {
            update = update.with_completion_date(None);
        }
        Ok(update)
    }

    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let fields = self.fields()?;
        let id = parse_enrollment_id(&self.id)?;
        let actor = ActorId::new(self.actor.as_str()).map_err(EnrollmentError::from)?;

        let result = ctx.state_manager().update_fields(&id, fields, &actor).await;
        let record = ctx.audit.log_fields_update(&self.id, &self.actor, &result);
        let enrollment = result?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "enrollment": enrollment,
                "audit": record,
            }));
        } else {
            formatter.success(&format!("Enrollment {} updated", enrollment.id()));
            print_enrollment(formatter.as_ref(), &enrollment);
        }
        Ok(())
    }
}
