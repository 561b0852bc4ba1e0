//! Administrative notifications raised by the `notify` action

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    #[default]
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminNotification {
    pub rule_id: Uuid,
    pub rule_name: String,
    pub media_id: Option<Uuid>,
    pub level: NotificationLevel,
    pub message: String,
}

#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, notification: &AdminNotification) -> Result<()>;
}

/// Emits notifications as structured log events.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl AdminNotifier for TracingNotifier {
    async fn notify(&self, notification: &AdminNotification) -> Result<()> {
        match notification.level {
            NotificationLevel::Info => tracing::info!(
                rule_id = %notification.rule_id,
                rule_name = %notification.rule_name,
                media_id = ?notification.media_id,
                message = %notification.message,
                "Workflow notification"
            ),
            NotificationLevel::Warning => tracing::warn!(
                rule_id = %notification.rule_id,
                rule_name = %notification.rule_name,
                media_id = ?notification.media_id,
                message = %notification.message,
                "Workflow notification"
            ),
        }
        Ok(())
    }
}
