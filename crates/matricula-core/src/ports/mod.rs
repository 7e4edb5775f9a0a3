//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the enrollment core depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IPersistenceGateway`] - Enrollment records, history trail, reconciliation queue
//! - [`INotificationService`] - Operator-visible alerts for degraded and failed transitions

pub mod notification;
pub mod persistence_gateway;

pub use notification::{INotificationService, Notification, NotificationPriority};
pub use persistence_gateway::{
    EnrollmentFilter, GatewayError, GatewayResult, IPersistenceGateway,
};
