//! Enrollment creation use case
//!
//! Inserts a new record at version 1. No history entry is written; the
//! trail begins with the first status transition.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::domain::{CourseRef, Enrollment, EnrollmentStatus, StudentRef};
use crate::ports::IPersistenceGateway;

use super::error::EnrollmentError;

/// Use case for registering a student in a course
pub struct CreateEnrollmentUseCase {
    gateway: Arc<dyn IPersistenceGateway + Send + Sync>,
}

impl CreateEnrollmentUseCase {
    pub fn new(gateway: Arc<dyn IPersistenceGateway + Send + Sync>) -> Self {
        Self { gateway }
    }

    /// Creates and stores a new enrollment
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store rejects the insert.
    pub async fn create_enrollment(
        &self,
        student: StudentRef,
        course: CourseRef,
        start_date: NaiveDate,
        initial_status: EnrollmentStatus,
    ) -> Result<Enrollment, EnrollmentError> {
        let enrollment = Enrollment::new(student, course, start_date, initial_status);

        let stored = self
            .gateway
            .insert_enrollment(&enrollment)
            .await
            .map_err(EnrollmentError::Persistence)?;

        info!(
            enrollment_id = %stored.id(),
            student = %stored.student_ref(),
            course = %stored.course_ref(),
            status = %stored.status(),
            "Enrollment created"
        );
        Ok(stored)
    }

    /// Same as [`create_enrollment`](Self::create_enrollment) for raw caller input
    pub async fn create_enrollment_by_ref(
        &self,
        raw_student: &str,
        raw_course: &str,
        start_date: NaiveDate,
        raw_status: &str,
    ) -> Result<Enrollment, EnrollmentError> {
        let student = StudentRef::new(raw_student)?;
        let course = CourseRef::new(raw_course)?;
        let status: EnrollmentStatus = raw_status.parse()?;
        self.create_enrollment(student, course, start_date, status)
            .await
    }
}
