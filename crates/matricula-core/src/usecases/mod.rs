//! Use cases (interactors) for Matricula
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`EnrollmentStateManager`] - Status transitions with history and compensation
//! - [`CreateEnrollmentUseCase`] - Registering a student in a course
//! - [`EnrollmentQueryUseCase`] - Records, history, and history chain checks
//! - [`ReconcileUseCase`] - Repairing history trails from the reconciliation queue

pub mod create_enrollment;
pub mod error;
pub mod query_enrollments;
pub mod reconcile;
pub mod update_status;

#[cfg(test)]
pub(crate) mod testing;

pub use create_enrollment::CreateEnrollmentUseCase;
pub use error::{EnrollmentError, Severity, TransitionOutcome, TransitionReport};
pub use query_enrollments::{ChainBreak, ChainReport, EnrollmentQueryUseCase};
pub use reconcile::{ReconcileAction, ReconcileItem, ReconcileSummary, ReconcileUseCase};
pub use update_status::EnrollmentStateManager;
