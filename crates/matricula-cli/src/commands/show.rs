//! Show command - Display one enrollment record

use anyhow::Result;
use clap::Args;

use super::{parse_enrollment_id, print_enrollment};
use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

/// Arguments for the show subcommand
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Enrollment ID
    pub id: String,
}

impl ShowCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let id = parse_enrollment_id(&self.id)?;
        let enrollment = ctx.query().get_enrollment(&id).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&enrollment)?);
        } else {
            formatter.success(&format!("Enrollment {}", enrollment.id()));
            print_enrollment(formatter.as_ref(), &enrollment);
        }
        Ok(())
    }
}
