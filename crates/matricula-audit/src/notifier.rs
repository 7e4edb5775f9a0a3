//! TracingNotifier - operator alerts as structured log events
//!
//! Implements `INotificationService` by emitting a `tracing` event under
//! the `matricula::alert` target. Log shippers can route that target to a
//! pager or chat channel without the core knowing about either.

use async_trait::async_trait;
use matricula_core::config::AlertsConfig;
use matricula_core::ports::{INotificationService, Notification, NotificationPriority};

/// Target used for every alert event
pub const ALERT_TARGET: &str = "matricula::alert";

/// Notification adapter that writes alerts to the tracing pipeline.
///
/// Priorities map to levels: `Low`/`Normal` → `info`, `High` → `warn`,
/// `Critical` → `error`. Notifications below `min_priority` are dropped.
#[derive(Debug, Clone)]
pub struct TracingNotifier {
    enabled: bool,
    min_priority: NotificationPriority,
}

impl TracingNotifier {
    /// Creates a notifier that delivers everything at or above `min_priority`.
    pub fn new(min_priority: NotificationPriority) -> Self {
        Self {
            enabled: true,
            min_priority,
        }
    }

    /// Creates a notifier from the `alerts` configuration section.
    pub fn from_config(config: &AlertsConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_priority: config.min_priority,
        }
    }

    /// Returns true if a notification of this priority would be emitted.
    pub fn accepts(&self, priority: NotificationPriority) -> bool {
        self.enabled && priority >= self.min_priority
    }
}

#[async_trait]
impl INotificationService for TracingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        if !self.accepts(notification.priority) {
            tracing::trace!(
                title = %notification.title,
                priority = %notification.priority,
                "Notification below alert threshold"
            );
            return Ok(());
        }

        let title = notification.title.as_str();
        let body = notification.body.as_str();
        let category = notification.category.as_str();
        match notification.priority {
            NotificationPriority::Critical => {
                tracing::error!(target: ALERT_TARGET, category, priority = "critical", body, "{title}")
            }
            NotificationPriority::High => {
                tracing::warn!(target: ALERT_TARGET, category, priority = "high", body, "{title}")
            }
            NotificationPriority::Normal | NotificationPriority::Low => {
                tracing::info!(target: ALERT_TARGET, category, priority = %notification.priority, body, "{title}")
            }
        }
        Ok(())
    }
}
