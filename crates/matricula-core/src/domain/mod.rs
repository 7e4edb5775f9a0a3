//! Domain entities and business logic
//!
//! This module contains the core domain types for Matricula:
//! - Newtypes for identifiers and validated foreign references
//! - The enrollment record and its status enumeration
//! - History entries forming the per-enrollment audit trail
//! - Reconciliation entries for invariant violations
//! - Domain-specific error types

pub mod enrollment;
pub mod errors;
pub mod history;
pub mod newtypes;
pub mod reconciliation;

// Re-export commonly used types
pub use enrollment::{
    Enrollment, EnrollmentFieldsUpdate, EnrollmentPatch, EnrollmentStatus, MAX_PROGRESS,
};
pub use errors::DomainError;
pub use history::EnrollmentHistoryEntry;
pub use newtypes::*;
pub use reconciliation::{ReconciliationEntry, ReconciliationState, Resolution};
