//! End-to-end tests for the enrollment use cases over SQLite
//!
//! Failures are injected with plain SQL: renaming the history table makes
//! every history append fail, and a trigger on `enrollments` makes the
//! compensating revert fail.

use std::sync::Arc;

use chrono::NaiveDate;

use matricula_core::config::TransitionsConfig;
use matricula_core::domain::{ActorId, CourseRef, Enrollment, EnrollmentStatus, StudentRef};
use matricula_core::ports::IPersistenceGateway;
use matricula_core::usecases::{
    CreateEnrollmentUseCase, EnrollmentError, EnrollmentQueryUseCase, EnrollmentStateManager,
    ReconcileUseCase,
};
use matricula_store::{DatabasePool, SqliteEnrollmentGateway};

struct Harness {
    pool: DatabasePool,
    gateway: Arc<SqliteEnrollmentGateway>,
}

impl Harness {
    async fn new() -> Self {
        let pool = DatabasePool::in_memory().await.unwrap();
        let gateway = Arc::new(SqliteEnrollmentGateway::new(pool.pool().clone()));
        Self { pool, gateway }
    }

    fn manager(&self) -> EnrollmentStateManager {
        EnrollmentStateManager::new(self.gateway.clone(), None, TransitionsConfig::default())
    }

    fn query(&self) -> EnrollmentQueryUseCase {
        EnrollmentQueryUseCase::new(self.gateway.clone())
    }

    async fn enroll(&self, status: EnrollmentStatus) -> Enrollment {
        CreateEnrollmentUseCase::new(self.gateway.clone())
            .create_enrollment(
                StudentRef::new("stu-7").unwrap(),
                CourseRef::new("course-algebra").unwrap(),
                NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                status,
            )
            .await
            .unwrap()
    }

    async fn sql(&self, statement: &str) {
        sqlx::raw_sql(statement)
            .execute(self.pool.pool())
            .await
            .unwrap();
    }

    async fn break_history_table(&self) {
        self.sql("ALTER TABLE enrollment_history RENAME TO enrollment_history_offline;")
            .await;
    }

    async fn restore_history_table(&self) {
        self.sql("ALTER TABLE enrollment_history_offline RENAME TO enrollment_history;")
            .await;
    }

    async fn block_status(&self, status: EnrollmentStatus) {
        self.sql(&format!(
            "CREATE TRIGGER block_status BEFORE UPDATE ON enrollments \
             WHEN NEW.status = '{}' \
             BEGIN SELECT RAISE(ABORT, 'status blocked'); END;",
            status.as_str()
        ))
        .await;
    }

    async fn history_rows(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollment_history")
            .fetch_one(self.pool.pool())
            .await
            .unwrap()
    }
}

fn admin() -> ActorId {
    ActorId::new("admin1").unwrap()
}

#[tokio::test]
async fn test_e1_pending_to_active_then_repeat() {
    let h = Harness::new().await;
    let e1 = h.enroll(EnrollmentStatus::Pending).await;
    let manager = h.manager();

    let report = manager
        .update_status_by_ref(&e1.id().to_string(), "active", "payment confirmed", "admin1")
        .await
        .unwrap();
    assert_eq!(report.enrollment.status(), EnrollmentStatus::Active);

    let history = h.query().list_history(e1.id()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_status(), EnrollmentStatus::Pending);
    assert_eq!(history[0].new_status(), EnrollmentStatus::Active);

    let before = h.query().get_enrollment(e1.id()).await.unwrap();
    let again = manager
        .update_status_by_ref(&e1.id().to_string(), "active", "", "admin1")
        .await
        .unwrap();
    assert!(again.is_unchanged());
    assert_eq!(h.query().get_enrollment(e1.id()).await.unwrap(), before);
    assert_eq!(h.history_rows().await, 1);
}

#[tokio::test]
async fn test_nonexistent_id_is_not_found() {
    let h = Harness::new().await;
    let err = h
        .manager()
        .update_status_by_ref("nonexistent-id", "active", "", "admin1")
        .await
        .unwrap_err();
    assert!(matches!(err, EnrollmentError::NotFound(_)));
}

#[tokio::test]
async fn test_chain_holds_over_many_transitions() {
    let h = Harness::new().await;
    let e1 = h.enroll(EnrollmentStatus::Pending).await;
    let manager = h.manager();

    for status in [
        EnrollmentStatus::Active,
        EnrollmentStatus::Suspended,
        EnrollmentStatus::Suspended,
        EnrollmentStatus::Active,
        EnrollmentStatus::Completed,
    ] {
        manager
            .update_status(e1.id(), status, "", &admin())
            .await
            .unwrap();
    }

    let report = h.query().verify_history_chain(e1.id()).await.unwrap();
    assert!(report.is_intact());
    assert_eq!(report.entries, 4);

    let record = h.query().get_enrollment(e1.id()).await.unwrap();
    assert_eq!(record.version(), 5);
    assert!(record.completion_date().is_some());
}

#[tokio::test]
async fn test_history_failure_is_compensated() {
    let h = Harness::new().await;
    let e1 = h.enroll(EnrollmentStatus::Pending).await;
    h.break_history_table().await;

    let err = h
        .manager()
        .update_status(e1.id(), EnrollmentStatus::Active, "", &admin())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "AUDIT_WRITE_FAILED");
    let record = h.gateway.fetch_enrollment(e1.id()).await.unwrap().unwrap();
    assert_eq!(record.status(), EnrollmentStatus::Pending);
    // Two writes landed: the change and its revert
    assert_eq!(record.version(), 3);
}

#[tokio::test]
async fn test_double_failure_is_queued_and_reconciled() {
    let h = Harness::new().await;
    let e1 = h.enroll(EnrollmentStatus::Pending).await;
    h.break_history_table().await;
    h.block_status(EnrollmentStatus::Pending).await;

    let err = h
        .manager()
        .update_status(e1.id(), EnrollmentStatus::Active, "payment confirmed", &admin())
        .await
        .unwrap_err();

    match &err {
        EnrollmentError::AuditFailedCompensationFailed {
            enrollment,
            previous_status,
            reconciliation_id,
            ..
        } => {
            assert_eq!(enrollment.status(), EnrollmentStatus::Active);
            assert_eq!(*previous_status, EnrollmentStatus::Pending);
            assert!(reconciliation_id.is_some());
        }
        other => panic!("expected AuditFailedCompensationFailed, got {other:?}"),
    }
    let record = h.gateway.fetch_enrollment(e1.id()).await.unwrap().unwrap();
    assert_eq!(record.status(), EnrollmentStatus::Active);

    // Once the store recovers, the missing entry is backfilled
    h.restore_history_table().await;
    let summary = ReconcileUseCase::new(h.gateway.clone())
        .reconcile_pending()
        .await
        .unwrap();
    assert_eq!(summary.backfilled, 1);

    let report = h.query().verify_history_chain(e1.id()).await.unwrap();
    assert!(report.is_intact());
    assert_eq!(report.entries, 1);
}

#[tokio::test]
async fn test_transitions_after_double_failure_block_backfill() {
    let h = Harness::new().await;
    let e1 = h.enroll(EnrollmentStatus::Pending).await;
    h.break_history_table().await;
    h.block_status(EnrollmentStatus::Pending).await;
    h.manager()
        .update_status(e1.id(), EnrollmentStatus::Active, "payment confirmed", &admin())
        .await
        .unwrap_err();
    h.restore_history_table().await;

    // active -> suspended -> active lands back on the attempted status
    for status in [EnrollmentStatus::Suspended, EnrollmentStatus::Active] {
        h.manager()
            .update_status(e1.id(), status, "", &admin())
            .await
            .unwrap();
    }

    let reconciler = ReconcileUseCase::new(h.gateway.clone());
    let summary = reconciler.reconcile_pending().await.unwrap();
    assert_eq!(summary.backfilled, 0);
    assert_eq!(summary.left_pending, 1);
    assert_eq!(reconciler.list(true).await.unwrap().len(), 1);
    assert_eq!(h.history_rows().await, 2);

    let report = h.query().verify_history_chain(e1.id()).await.unwrap();
    assert_eq!(report.breaks.len(), 1);
}

#[tokio::test]
async fn test_record_write_failure_writes_no_history() {
    let h = Harness::new().await;
    let e1 = h.enroll(EnrollmentStatus::Active).await;
    h.block_status(EnrollmentStatus::Inactive).await;

    let err = h
        .manager()
        .update_status(e1.id(), EnrollmentStatus::Inactive, "", &admin())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PERSISTENCE_ERROR");
    assert_eq!(h.history_rows().await, 0);
}

#[tokio::test]
async fn test_concurrent_transitions_write_one_entry_per_change() {
    let h = Harness::new().await;
    let e1 = h.enroll(EnrollmentStatus::Pending).await;
    let manager = Arc::new(EnrollmentStateManager::new(
        h.gateway.clone(),
        None,
        TransitionsConfig {
            max_conflict_retries: 10,
            ..TransitionsConfig::default()
        },
    ));

    let targets = [
        EnrollmentStatus::Active,
        EnrollmentStatus::Suspended,
        EnrollmentStatus::Completed,
        EnrollmentStatus::Inactive,
    ];
    let mut handles = Vec::new();
    for status in targets {
        let manager = manager.clone();
        let id = *e1.id();
        handles.push(tokio::spawn(async move {
            manager.update_status(&id, status, "", &admin()).await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        if !report.is_unchanged() {
            applied += 1;
        }
    }

    let history = h.query().list_history(e1.id()).await.unwrap();
    assert_eq!(history.len(), applied);
    let record = h.query().get_enrollment(e1.id()).await.unwrap();
    assert_eq!(record.version(), 1 + applied as u64);
    assert!(targets.contains(&record.status()));
}
