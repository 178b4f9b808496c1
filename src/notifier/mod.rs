// Notifier module: delivery channels and the delayed-notification scheduler.

pub mod scheduler;
pub mod telegram;

use crate::model::{NotificationPayload, NotifyError};
use async_trait::async_trait;
use tracing::info;

pub use scheduler::NotificationScheduler;
pub use telegram::TelegramNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// Fallback channel when no messenger is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        info!("🔔 {}: {}", payload.title, payload.message);
        Ok(())
    }
}
