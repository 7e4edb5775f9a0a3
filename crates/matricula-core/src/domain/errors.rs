//! Domain error types
//!
//! This module defines error types raised while constructing or validating
//! domain values: identifiers, references, statuses and field updates.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown enrollment status name
    #[error("Invalid enrollment status: {0}")]
    InvalidStatus(String),

    /// A reference (student, course, actor) is empty or malformed
    #[error("Invalid reference for {field}: {reason}")]
    InvalidReference {
        /// Which reference failed validation
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
