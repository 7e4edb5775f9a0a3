//! History command - Show an enrollment's status history
//!
//! Entries are listed most recent first. With `--verify`, the trail is also
//! checked link by link and against the record's current status; a broken
//! trail makes the command fail.

use anyhow::Result;
use clap::Args;
use matricula_core::usecases::ChainBreak;

use super::parse_enrollment_id;
use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

/// Arguments for the history subcommand
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Enrollment ID
    pub id: String,

    /// Check that the trail is consistent with the record
    #[arg(long)]
    pub verify: bool,
}

impl HistoryCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let id = parse_enrollment_id(&self.id)?;
        let query = ctx.query();

        let entries = query.list_history(&id).await?;
        let chain = if self.verify {
            Some(query.verify_history_chain(&id).await?)
        } else {
            None
        };

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "enrollment_id": id.to_string(),
                "count": entries.len(),
                "entries": entries,
                "chain": chain,
            }));
        } else if entries.is_empty() {
            formatter.info(&format!("Enrollment {} has no status changes recorded.", id));
        } else {
            formatter.success(&format!("History for {} ({} entries)", id, entries.len()));
            formatter.info("");
            formatter.info("  Recorded             Change                   Actor            Reason");
            formatter.info("  ------------------- ------------------------ ---------------- ------");
            for entry in &entries {
                let change = format!("{} \u{2192} {}", entry.previous_status(), entry.new_status());
                formatter.info(&format!(
                    "  {} {:<24} {:<16} {}",
                    entry.recorded_at().format("%Y-%m-%d %H:%M:%S"),
                    change,
                    entry.actor(),
                    entry.reason().unwrap_or("-")
                ));
            }
        }

        let Some(chain) = chain else {
            return Ok(());
        };
        if chain.is_intact() {
            if !format.is_json() {
                formatter.info("");
                formatter.success("History trail is consistent with the record");
            }
            return Ok(());
        }

        for brk in &chain.breaks {
            formatter.warn(&describe_break(brk));
        }
        anyhow::bail!(
            "history trail for {} has {} inconsistenc{}; run 'matricula reconcile list'",
            id,
            chain.breaks.len(),
            if chain.breaks.len() == 1 { "y" } else { "ies" }
        )
    }
}

fn describe_break(brk: &ChainBreak) -> String {
    match brk {
        ChainBreak::Link {
            entry_id,
            expected_previous,
            found_previous,
        } => format!(
            "entry {} starts from {} but the previous entry ended at {}",
            entry_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "?".to_string()),
            found_previous,
            expected_previous
        ),
        ChainBreak::Head {
            latest_new_status,
            record_status,
        } => format!(
            "latest entry ends at {} but the record is {}",
            latest_new_status, record_status
        ),
        ChainBreak::Origin {
            entry_id,
            initial_status,
            found_previous,
        } => format!(
            "oldest entry {} starts from {} but the record was created {}",
            entry_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "?".to_string()),
            found_previous,
            initial_status
        ),
        ChainBreak::Unrecorded {
            initial_status,
            record_status,
        } => format!(
            "no entries, yet the record moved from {} to {}",
            initial_status, record_status
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matricula_core::domain::EnrollmentStatus;

    #[test]
    fn test_describe_head_break() {
        let text = describe_break(&ChainBreak::Head {
            latest_new_status: EnrollmentStatus::Pending,
            record_status: EnrollmentStatus::Active,
        });
        assert_eq!(text, "latest entry ends at pending but the record is active");
    }

    #[test]
    fn test_describe_link_break_without_id() {
        let text = describe_break(&ChainBreak::Link {
            entry_id: None,
            expected_previous: EnrollmentStatus::Active,
            found_previous: EnrollmentStatus::Pending,
        });
        assert!(text.starts_with("entry ? starts from pending"));
    }

    #[test]
    fn test_describe_origin_break() {
        let text = describe_break(&ChainBreak::Origin {
            entry_id: None,
            initial_status: EnrollmentStatus::Pending,
            found_previous: EnrollmentStatus::Active,
        });
        assert_eq!(
            text,
            "oldest entry ? starts from active but the record was created pending"
        );
    }

    #[test]
    fn test_describe_unrecorded_break() {
        let text = describe_break(&ChainBreak::Unrecorded {
            initial_status: EnrollmentStatus::Pending,
            record_status: EnrollmentStatus::Suspended,
        });
        assert_eq!(text, "no entries, yet the record moved from pending to suspended");
    }
}
