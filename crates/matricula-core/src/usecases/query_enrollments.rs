//! Enrollment query use case
//!
//! Read-only access to records and their history, plus a consistency
//! check that walks a history trail and reports where it breaks.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{Enrollment, EnrollmentHistoryEntry, EnrollmentId, EnrollmentStatus, HistoryId};
use crate::ports::{EnrollmentFilter, IPersistenceGateway};

use super::error::EnrollmentError;

/// A point where a history trail disagrees with itself or with the record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ChainBreak {
    /// An entry's `previous_status` is not its predecessor's `new_status`
    Link {
        entry_id: Option<HistoryId>,
        expected_previous: EnrollmentStatus,
        found_previous: EnrollmentStatus,
    },
    /// The latest entry's `new_status` is not the record's status
    Head {
        latest_new_status: EnrollmentStatus,
        record_status: EnrollmentStatus,
    },
    /// The oldest entry does not start from the status the record was created with
    Origin {
        entry_id: Option<HistoryId>,
        initial_status: EnrollmentStatus,
        found_previous: EnrollmentStatus,
    },
    /// No entries, yet the record left its initial status
    Unrecorded {
        initial_status: EnrollmentStatus,
        record_status: EnrollmentStatus,
    },
}

/// Result of checking one enrollment's history trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub enrollment_id: EnrollmentId,
    pub record_status: EnrollmentStatus,
    pub entries: usize,
    pub breaks: Vec<ChainBreak>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.breaks.is_empty()
    }

    /// Checks `history` (most-recent-first) against `enrollment`
    pub fn check(enrollment: &Enrollment, history: &[EnrollmentHistoryEntry]) -> Self {
        let mut breaks = Vec::new();

        match history.first() {
            Some(latest) if latest.new_status() != enrollment.status() => {
                breaks.push(ChainBreak::Head {
                    latest_new_status: latest.new_status(),
                    record_status: enrollment.status(),
                });
            }
            None if enrollment.status() != enrollment.initial_status() => {
                breaks.push(ChainBreak::Unrecorded {
                    initial_status: enrollment.initial_status(),
                    record_status: enrollment.status(),
                });
            }
            _ => {}
        }

        if let Some(oldest) = history.last() {
            if oldest.previous_status() != enrollment.initial_status() {
                breaks.push(ChainBreak::Origin {
                    entry_id: oldest.id(),
                    initial_status: enrollment.initial_status(),
                    found_previous: oldest.previous_status(),
                });
            }
        }

        // Walk oldest to newest
        let mut expected: Option<EnrollmentStatus> = None;
        for entry in history.iter().rev() {
            if let Some(expected_previous) = expected {
                if entry.previous_status() != expected_previous {
                    breaks.push(ChainBreak::Link {
                        entry_id: entry.id(),
                        expected_previous,
                        found_previous: entry.previous_status(),
                    });
                }
            }
            expected = Some(entry.new_status());
        }

        Self {
            enrollment_id: *enrollment.id(),
            record_status: enrollment.status(),
            entries: history.len(),
            breaks,
        }
    }
}

/// Use case for reading enrollments and their history
pub struct EnrollmentQueryUseCase {
    gateway: Arc<dyn IPersistenceGateway + Send + Sync>,
}

impl EnrollmentQueryUseCase {
    pub fn new(gateway: Arc<dyn IPersistenceGateway + Send + Sync>) -> Self {
        Self { gateway }
    }

    /// Fetches one enrollment
    pub async fn get_enrollment(&self, id: &EnrollmentId) -> Result<Enrollment, EnrollmentError> {
        self.gateway
            .fetch_enrollment(id)
            .await
            .map_err(EnrollmentError::Persistence)?
            .ok_or_else(|| EnrollmentError::NotFound(id.to_string()))
    }

    /// Lists enrollments matching `filter`, most recently updated first
    pub async fn list_enrollments(
        &self,
        filter: &EnrollmentFilter,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        self.gateway
            .list_enrollments(filter)
            .await
            .map_err(EnrollmentError::Persistence)
    }

    /// Lists an enrollment's history, most-recent-first
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the enrollment does not exist, so an empty
    /// list always means "no transitions yet".
    pub async fn list_history(
        &self,
        id: &EnrollmentId,
    ) -> Result<Vec<EnrollmentHistoryEntry>, EnrollmentError> {
        self.get_enrollment(id).await?;
        self.gateway
            .list_history(id)
            .await
            .map_err(EnrollmentError::Persistence)
    }

    /// Checks that the history trail starts at the record's initial status,
    /// chains, and ends at the record's current status
    pub async fn verify_history_chain(&self, id: &EnrollmentId) -> Result<ChainReport, EnrollmentError> {
        let enrollment = self.get_enrollment(id).await?;
        let history = self
            .gateway
            .list_history(id)
            .await
            .map_err(EnrollmentError::Persistence)?;

        let report = ChainReport::check(&enrollment, &history);
        if !report.is_intact() {
            tracing::warn!(
                enrollment_id = %id,
                breaks = report.breaks.len(),
                "History trail is inconsistent"
            );
        }
        Ok(report)
    }
}
