//! Domain newtypes with validation
//!
//! Strongly-typed identifiers for enrollments, history rows and
//! reconciliation entries, plus validated references to the foreign
//! entities (students, courses, actors) this core does not own.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Maximum length accepted for foreign references
pub const MAX_REFERENCE_LEN: usize = 255;

// ============================================================================
// UUID-based ID types
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Create a new random ", stringify!($name))]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a ", stringify!($name), " from an existing UUID")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID value
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|e| {
                    DomainError::InvalidId(format!("Invalid {}: {e}", stringify!($name)))
                })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier for an enrollment record (immutable once created)
    EnrollmentId
);

uuid_id!(
    /// Identifier for an enrollment history row
    HistoryId
);

uuid_id!(
    /// Identifier for a reconciliation queue entry
    ReconciliationId
);

// ============================================================================
// Foreign references
// ============================================================================

/// Trims and validates a reference value shared by all reference newtypes
fn validate_reference(field: &'static str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidReference {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if trimmed.chars().count() > MAX_REFERENCE_LEN {
        return Err(DomainError::InvalidReference {
            field,
            reason: format!("longer than {MAX_REFERENCE_LEN} characters"),
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(DomainError::InvalidReference {
            field,
            reason: "contains control characters".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

macro_rules! reference {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", stringify!($name))]
            ///
            /// # Errors
            /// Returns `DomainError::InvalidReference` if the value is empty,
            /// too long, or contains control characters
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                validate_reference($field, value.into()).map(Self)
            }

            /// Get the inner string reference
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

reference!(
    /// Reference to the student owning an enrollment
    StudentRef,
    "student"
);

reference!(
    /// Reference to the course an enrollment belongs to
    CourseRef,
    "course"
);

reference!(
    /// Identifier of whoever performed a change (user id, service name)
    ActorId,
    "actor"
);

// ============================================================================
// Tests
// ============================================================================
