//! Notification service port (driven/secondary port)
//!
//! Interface for raising operator-visible alerts when an enrollment
//! transition completes in a degraded state or breaks the history
//! invariant. Implementations may log, page, or post to a chat channel.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because delivery failures are adapter-specific.
//! - Notifications are fire-and-forget; a failed delivery never changes the
//!   outcome of the operation that raised it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Priority level for a notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Informational
    Low,
    /// Worth a look
    #[default]
    Normal,
    /// Caller should warn a human; no data loss
    High,
    /// Invariant violated; manual reconciliation required
    Critical,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
            NotificationPriority::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for NotificationPriority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(NotificationPriority::Low),
            "normal" => Ok(NotificationPriority::Normal),
            "high" => Ok(NotificationPriority::High),
            "critical" => Ok(NotificationPriority::Critical),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown notification priority: {other}"
            ))),
        }
    }
}

/// An alert to deliver to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short, descriptive title
    pub title: String,
    /// Details about the event
    pub body: String,
    /// Priority level
    pub priority: NotificationPriority,
    /// Category for grouping/filtering (e.g., "transition", "reconciliation")
    pub category: String,
}

impl Notification {
    /// Creates a new notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    /// Sets the priority level
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// A transition finished degraded: the history append failed but the
    /// record was restored
    pub fn degraded(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("transition")
    }

    /// The history invariant is broken and needs manual reconciliation
    pub fn invariant_violated(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::Critical)
            .with_category("reconciliation")
    }
}

/// Port trait for operator alerting
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Delivers a notification
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}
