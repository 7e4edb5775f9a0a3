//! Integration test: state manager → SQLite → audit trail
//!
//! Runs real transitions against an in-memory database with the
//! `TracingNotifier` wired in, then checks the audit records built from
//! each outcome.

use std::sync::Arc;

use chrono::NaiveDate;
use matricula_audit::{AuditLogger, AuditResult, ReasonCode, TracingNotifier};
use matricula_core::{
    config::{AlertsConfig, TransitionsConfig},
    domain::{ActorId, CourseRef, EnrollmentStatus, StudentRef},
    ports::INotificationService,
    usecases::{CreateEnrollmentUseCase, EnrollmentStateManager},
};
use matricula_store::{pool::DatabasePool, SqliteEnrollmentGateway};

async fn setup() -> (DatabasePool, Arc<SqliteEnrollmentGateway>, EnrollmentStateManager) {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let gateway = Arc::new(SqliteEnrollmentGateway::new(pool.pool().clone()));
    let notifier: Arc<dyn INotificationService + Send + Sync> =
        Arc::new(TracingNotifier::from_config(&AlertsConfig::default()));
    let manager = EnrollmentStateManager::new(
        gateway.clone(),
        Some(notifier),
        TransitionsConfig::default(),
    );
    (pool, gateway, manager)
}

#[tokio::test]
async fn test_audit_trail_for_successful_and_degraded_transitions() {
    let (pool, gateway, manager) = setup().await;
    let logger = AuditLogger::new();
    let actor = ActorId::new("admin1").unwrap();

    let created = CreateEnrollmentUseCase::new(gateway.clone())
        .create_enrollment(
            StudentRef::new("stu-9").unwrap(),
            CourseRef::new("course-physics").unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            EnrollmentStatus::Pending,
        )
        .await;
    let record = logger.log_enrollment_created(&created);
    assert!(record.result.is_success());
    let enrollment = created.unwrap();
    let id = enrollment.id().to_string();

    // Applied
    let result = manager
        .update_status(enrollment.id(), EnrollmentStatus::Active, "payment confirmed", &actor)
        .await;
    let record = logger.log_status_change(&id, actor.as_str(), &result);
    assert_eq!(record.result, AuditResult::Success);
    assert_eq!(record.details["previous_status"], "pending");
    assert_eq!(record.details["new_status"], "active");

    // Unchanged
    let result = manager
        .update_status(enrollment.id(), EnrollmentStatus::Active, "", &actor)
        .await;
    let record = logger.log_status_change(&id, actor.as_str(), &result);
    assert_eq!(record.result, AuditResult::Unchanged);

    // Degraded: history append fails, record is restored
    sqlx::raw_sql("ALTER TABLE enrollment_history RENAME TO enrollment_history_offline;")
        .execute(pool.pool())
        .await
        .unwrap();
    let result = manager
        .update_status(enrollment.id(), EnrollmentStatus::Suspended, "", &actor)
        .await;
    let record = logger.log_status_change(&id, actor.as_str(), &result);
    assert_eq!(record.reason(), Some(ReasonCode::HistoryWriteFailed));

    let err = result.unwrap_err();
    assert_eq!(err.enrollment().unwrap().status(), EnrollmentStatus::Active);
}

#[tokio::test]
async fn test_audit_trail_for_fatal_transition() {
    let (pool, gateway, manager) = setup().await;
    let logger = AuditLogger::new();
    let actor = ActorId::new("admin1").unwrap();

    let enrollment = CreateEnrollmentUseCase::new(gateway.clone())
        .create_enrollment(
            StudentRef::new("stu-9").unwrap(),
            CourseRef::new("course-physics").unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            EnrollmentStatus::Pending,
        )
        .await
        .unwrap();

    sqlx::raw_sql(
        "ALTER TABLE enrollment_history RENAME TO enrollment_history_offline; \
         CREATE TRIGGER block_revert BEFORE UPDATE ON enrollments \
         WHEN NEW.status = 'pending' \
         BEGIN SELECT RAISE(ABORT, 'revert blocked'); END;",
    )
    .execute(pool.pool())
    .await
    .unwrap();

    let result = manager
        .update_status(enrollment.id(), EnrollmentStatus::Active, "", &actor)
        .await;
    let record = logger.log_status_change(&enrollment.id().to_string(), actor.as_str(), &result);

    assert_eq!(record.reason(), Some(ReasonCode::CompensationFailed));
    assert!(record.details["reconciliation_id"].is_string());
}
