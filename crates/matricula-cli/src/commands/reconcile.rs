//! Reconcile command - Work the reconciliation queue
//!
//! Entries land in the queue when a status change was written but neither
//! its history entry nor the revert could be. `run` repairs what it can;
//! `resolve` closes an entry an operator fixed by hand.

use anyhow::Result;
use clap::Subcommand;
use matricula_core::domain::{ReconciliationId, ReconciliationState};
use matricula_core::usecases::{EnrollmentError, ReconcileAction};

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

/// Reconcile subcommands
#[derive(Debug, Subcommand)]
pub enum ReconcileCommand {
    /// List queue entries
    List {
        /// Include resolved entries
        #[arg(long)]
        all: bool,
    },
    /// Repair every pending entry the store state allows
    Run,
    /// Mark an entry as repaired by hand
    Resolve {
        /// Reconciliation entry ID
        id: String,
    },
}

impl ReconcileCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            ReconcileCommand::List { all } => self.execute_list(ctx, *all, format).await,
            ReconcileCommand::Run => self.execute_run(ctx, format).await,
            ReconcileCommand::Resolve { id } => self.execute_resolve(ctx, id, format).await,
        }
    }

    async fn execute_list(&self, ctx: &AppContext, all: bool, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let entries = ctx.reconciler().list(!all).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "count": entries.len(),
                "entries": entries,
            }));
            return Ok(());
        }

        if entries.is_empty() {
            formatter.success("Reconciliation queue is empty");
            return Ok(());
        }

        formatter.success(&format!("Reconciliation queue ({} entries)", entries.len()));
        for entry in &entries {
            let state = match entry.state() {
                ReconciliationState::Pending => "pending".to_string(),
                ReconciliationState::Resolved { resolution, .. } => {
                    format!("resolved ({})", resolution)
                }
            };
            formatter.info("");
            formatter.info(&format!("{}  [{}]", entry.id(), state));
            formatter.info(&format!(
                "  enrollment {}: {} \u{2192} {} by {}",
                entry.enrollment_id(),
                entry.previous_status(),
                entry.attempted_status(),
                entry.actor()
            ));
            formatter.info(&format!("  history error:      {}", entry.audit_error()));
            formatter.info(&format!("  compensation error: {}", entry.compensation_error()));
        }
        Ok(())
    }

    async fn execute_run(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let result = ctx.reconciler().reconcile_pending().await;
        let record = ctx.audit.log_reconcile(&result);
        let summary = result?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": summary.is_clean(),
                "summary": summary,
                "audit": record,
            }));
        } else {
            formatter.success(&format!(
                "Examined {} entries: {} backfilled, {} already reverted, {} left pending",
                summary.examined, summary.backfilled, summary.already_reverted, summary.left_pending
            ));
            for item in &summary.items {
                let line = match &item.action {
                    ReconcileAction::HistoryBackfilled => "history entry backfilled".to_string(),
                    ReconcileAction::AlreadyReverted => "record already reverted".to_string(),
                    ReconcileAction::Diverged { current_status } => {
                        format!("record moved on to {}; needs manual review", current_status)
                    }
                    ReconcileAction::Missing => "enrollment no longer exists".to_string(),
                    ReconcileAction::Failed { error } => format!("failed: {}", error),
                };
                formatter.info(&format!("{} ({}): {}", item.reconciliation_id, item.enrollment_id, line));
            }
        }

        if !summary.is_clean() {
            anyhow::bail!(
                "{} entr{} still pending",
                summary.left_pending,
                if summary.left_pending == 1 { "y" } else { "ies" }
            );
        }
        Ok(())
    }

    async fn execute_resolve(&self, ctx: &AppContext, raw: &str, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let result = match raw.parse::<ReconciliationId>() {
            Ok(id) => ctx.reconciler().resolve_manually(&id).await,
            Err(_) => Err(EnrollmentError::NotFound(raw.to_string())),
        };
        let record = ctx.audit.log_manual_resolve(raw, &result);
        let entry = result?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "entry": entry,
                "audit": record,
            }));
        } else {
            formatter.success(&format!("Reconciliation entry {} resolved", entry.id()));
            formatter.info(&format!(
                "Verify with 'matricula history {} --verify'",
                entry.enrollment_id()
            ));
        }
        Ok(())
    }
}
