//! Matricula Audit - Operator audit trail and alerting
//!
//! Provides:
//! - `AuditLogger`: Structured audit records for every enrollment command
//! - `ReasonCode`: Structured reason codes for failures
//! - `TracingNotifier`: `INotificationService` adapter that raises alerts
//!   through the tracing pipeline

pub mod logger;
pub mod notifier;
pub mod reason;

pub use logger::{AuditAction, AuditLogger, AuditRecord, AuditResult};
pub use notifier::TracingNotifier;
pub use reason::ReasonCode;
