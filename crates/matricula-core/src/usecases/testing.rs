//! In-memory test doubles for the use-case tests
//!
//! `InMemoryGateway` behaves like a store with per-row compare-and-swap and
//! lets a test script failures: the next N record updates, every history
//! append, or every reconciliation enqueue. It also counts write calls so
//! tests can assert "zero writes".

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::domain::{
    CourseRef, Enrollment, EnrollmentHistoryEntry, EnrollmentId, EnrollmentPatch,
    EnrollmentStatus, HistoryId, ReconciliationEntry, ReconciliationId, Resolution, StudentRef,
};
use crate::ports::{
    EnrollmentFilter, GatewayError, GatewayResult, INotificationService, IPersistenceGateway,
    Notification,
};

/// What the next `update_enrollment` call does
pub(crate) enum UpdateFault {
    /// Behave normally
    Pass,
    /// Fail without touching the row
    Fail(GatewayError),
    /// Apply a competing write first, then proceed normally
    ConcurrentWrite(EnrollmentPatch),
}

#[derive(Default)]
struct Tables {
    enrollments: HashMap<EnrollmentId, Enrollment>,
    history: Vec<EnrollmentHistoryEntry>,
    reconciliation: Vec<ReconciliationEntry>,
}

#[derive(Default)]
pub(crate) struct InMemoryGateway {
    tables: Mutex<Tables>,
    writes: AtomicUsize,
    update_faults: Mutex<VecDeque<UpdateFault>>,
    history_fault: Mutex<Option<GatewayError>>,
    reconciliation_fault: Mutex<Option<GatewayError>>,
}

impl InMemoryGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores an enrollment directly, bypassing the write counter
    pub(crate) fn seed(&self, status: EnrollmentStatus) -> Enrollment {
        let enrollment = Enrollment::new(
            StudentRef::new("stu-1").unwrap(),
            CourseRef::new("course-1").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            status,
        );
        self.tables
            .lock()
            .unwrap()
            .enrollments
            .insert(*enrollment.id(), enrollment.clone());
        enrollment
    }

    pub(crate) fn enrollment(&self, id: &EnrollmentId) -> Option<Enrollment> {
        self.tables.lock().unwrap().enrollments.get(id).cloned()
    }

    pub(crate) fn history_for(&self, id: &EnrollmentId) -> Vec<EnrollmentHistoryEntry> {
        self.tables
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|e| e.enrollment_id() == id)
            .cloned()
            .collect()
    }

    pub(crate) fn reconciliation(&self) -> Vec<ReconciliationEntry> {
        self.tables.lock().unwrap().reconciliation.clone()
    }

    /// Number of write calls received, failed ones included
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn script_updates(&self, faults: impl IntoIterator<Item = UpdateFault>) {
        self.update_faults.lock().unwrap().extend(faults);
    }

    pub(crate) fn fail_history(&self, error: Option<GatewayError>) {
        *self.history_fault.lock().unwrap() = error;
    }

    pub(crate) fn fail_reconciliation(&self, error: Option<GatewayError>) {
        *self.reconciliation_fault.lock().unwrap() = error;
    }

    fn count_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn store_patch(tables: &mut Tables, id: &EnrollmentId, patch: &EnrollmentPatch) -> GatewayResult<Enrollment> {
    let row = tables
        .enrollments
        .get_mut(id)
        .ok_or_else(|| GatewayError::NotFound {
            table: "enrollments",
            id: id.to_string(),
        })?;
    patch.apply_to(row);
    row.mark_stored(Utc::now());
    Ok(row.clone())
}

#[async_trait]
impl IPersistenceGateway for InMemoryGateway {
    async fn fetch_enrollment(&self, id: &EnrollmentId) -> GatewayResult<Option<Enrollment>> {
        Ok(self.enrollment(id))
    }

    async fn insert_enrollment(&self, enrollment: &Enrollment) -> GatewayResult<Enrollment> {
        self.count_write();
        let mut tables = self.tables.lock().unwrap();
        if tables.enrollments.contains_key(enrollment.id()) {
            return Err(GatewayError::Rejected("duplicate enrollment id".into()));
        }
        tables
            .enrollments
            .insert(*enrollment.id(), enrollment.clone());
        Ok(enrollment.clone())
    }

    async fn update_enrollment(
        &self,
        id: &EnrollmentId,
        patch: &EnrollmentPatch,
        expected_version: Option<u64>,
    ) -> GatewayResult<Enrollment> {
        self.count_write();
        let fault = self
            .update_faults
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(UpdateFault::Pass);

        let mut tables = self.tables.lock().unwrap();
        match fault {
            UpdateFault::Pass => {}
            UpdateFault::Fail(error) => return Err(error),
            UpdateFault::ConcurrentWrite(competing) => {
                store_patch(&mut tables, id, &competing)?;
            }
        }

        if let Some(expected) = expected_version {
            let actual = tables
                .enrollments
                .get(id)
                .map(Enrollment::version)
                .ok_or_else(|| GatewayError::NotFound {
                    table: "enrollments",
                    id: id.to_string(),
                })?;
            if actual != expected {
                return Err(GatewayError::VersionConflict { expected, actual });
            }
        }
        store_patch(&mut tables, id, patch)
    }

    async fn list_enrollments(&self, filter: &EnrollmentFilter) -> GatewayResult<Vec<Enrollment>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<_> = tables
            .enrollments
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        rows.sort_by_key(|e| std::cmp::Reverse(e.updated_at()));
        if let Some(limit) = filter.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert_history(
        &self,
        entry: &EnrollmentHistoryEntry,
    ) -> GatewayResult<EnrollmentHistoryEntry> {
        self.count_write();
        if let Some(error) = self.history_fault.lock().unwrap().clone() {
            return Err(error);
        }
        let stored = entry.clone().persisted(HistoryId::new(), Utc::now());
        self.tables.lock().unwrap().history.push(stored.clone());
        Ok(stored)
    }

    async fn list_history(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> GatewayResult<Vec<EnrollmentHistoryEntry>> {
        let mut entries = self.history_for(enrollment_id);
        entries.reverse();
        Ok(entries)
    }

    async fn enqueue_reconciliation(
        &self,
        entry: &ReconciliationEntry,
    ) -> GatewayResult<ReconciliationEntry> {
        self.count_write();
        if let Some(error) = self.reconciliation_fault.lock().unwrap().clone() {
            return Err(error);
        }
        self.tables.lock().unwrap().reconciliation.push(entry.clone());
        Ok(entry.clone())
    }

    async fn list_reconciliation(
        &self,
        pending_only: bool,
    ) -> GatewayResult<Vec<ReconciliationEntry>> {
        Ok(self
            .reconciliation()
            .into_iter()
            .filter(|e| !pending_only || e.is_pending())
            .collect())
    }

    async fn resolve_reconciliation(
        &self,
        id: &ReconciliationId,
        resolution: Resolution,
    ) -> GatewayResult<ReconciliationEntry> {
        self.count_write();
        let mut tables = self.tables.lock().unwrap();
        let entry = tables
            .reconciliation
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or_else(|| GatewayError::NotFound {
                table: "reconciliation_queue",
                id: id.to_string(),
            })?;
        entry.resolve(resolution, Utc::now());
        Ok(entry.clone())
    }
}

/// Notifier that remembers what it was asked to deliver
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl INotificationService for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            anyhow::bail!("notification channel down");
        }
        Ok(())
    }
}
