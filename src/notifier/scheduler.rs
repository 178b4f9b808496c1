// One-shot delayed notifications that outlive the page that scheduled them.
use super::Notifier;
use crate::model::{NotificationPayload, NotifyError};
use crate::storage::SqliteStorage;
use crate::storage::history::{clear_pending_notification, load_pending_notification, save_pending_notification};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

#[derive(Clone)]
pub struct NotificationScheduler {
    storage: Arc<Mutex<SqliteStorage>>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationScheduler {
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, notifier: Arc<dyn Notifier>) -> Self {
        Self { storage, notifier }
    }

    /// Persists the payload and arms a timer. A newer schedule replaces a pending one.
    pub async fn schedule(
        &self,
        delay_seconds: u64,
        title: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<NotificationPayload, NotifyError> {
        let delay_ms = i64::try_from(delay_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        let payload = NotificationPayload {
            title: title.to_string(),
            message: message.to_string(),
            scheduled_for: now.timestamp_millis().saturating_add(delay_ms),
        };
        save_pending_notification(&*self.storage.lock().await, &payload)?;
        info!("⏰ Notification '{}' scheduled in {}s", payload.title, delay_seconds);

        self.spawn_timer(payload.clone(), Duration::from_secs(delay_seconds));
        Ok(payload)
    }

    /// Re-arms a payload left over from a previous run; overdue ones fire right away.
    pub async fn restore(&self, now: DateTime<Utc>) -> Result<Option<NotificationPayload>, NotifyError> {
        let pending = load_pending_notification(&*self.storage.lock().await)?;
        if let Some(payload) = &pending {
            let remaining_ms = (payload.scheduled_for - now.timestamp_millis()).max(0);
            info!("⏰ Restoring pending notification '{}' ({} ms left)", payload.title, remaining_ms);
            self.spawn_timer(payload.clone(), Duration::from_millis(remaining_ms as u64));
        }
        Ok(pending)
    }

    fn spawn_timer(&self, payload: NotificationPayload, delay: Duration) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if let Err(e) = scheduler.fire(&payload).await {
                warn!("❌ Scheduled notification failed: {:?}", e);
            }
        });
    }

    /// Delivers `payload` if it is still the pending one.
    async fn fire(&self, payload: &NotificationPayload) -> Result<bool, NotifyError> {
        {
            let storage = self.storage.lock().await;
            if load_pending_notification(&*storage)?.as_ref() != Some(payload) {
                info!("Notification '{}' was superseded, skipping", payload.title);
                return Ok(false);
            }
            clear_pending_notification(&*storage)?;
        }
        self.notifier.notify(payload).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: std::sync::Mutex<Vec<NotificationPayload>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (NotificationScheduler, Arc<RecordingNotifier>, Arc<Mutex<SqliteStorage>>) {
        let storage = Arc::new(Mutex::new(SqliteStorage::in_memory().unwrap()));
        let recorder = Arc::new(RecordingNotifier::default());
        let scheduler = NotificationScheduler::new(storage.clone(), recorder.clone());
        (scheduler, recorder, storage)
    }

    async fn advance(secs: u64) {
        sleep(Duration::from_secs(secs)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (scheduler, recorder, storage) = setup();
        let payload = scheduler.schedule(30, "Price check", "Look again", now()).await.unwrap();
        assert_eq!(payload.scheduled_for, now().timestamp_millis() + 30_000);

        advance(10).await;
        assert!(recorder.sent.lock().unwrap().is_empty());

        advance(25).await;
        assert_eq!(recorder.sent.lock().unwrap().as_slice(), &[payload]);
        assert_eq!(load_pending_notification(&*storage.lock().await).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_schedule_supersedes_pending() {
        let (scheduler, recorder, _storage) = setup();
        scheduler.schedule(20, "First", "a", now()).await.unwrap();
        let second = scheduler.schedule(40, "Second", "b", now()).await.unwrap();

        advance(60).await;
        assert_eq!(recorder.sent.lock().unwrap().as_slice(), &[second]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_fires_overdue_payload() {
        let (scheduler, recorder, storage) = setup();
        let payload = NotificationPayload {
            title: "Left over".into(),
            message: "from last run".into(),
            scheduled_for: now().timestamp_millis() - 5_000,
        };
        save_pending_notification(&*storage.lock().await, &payload).unwrap();

        assert_eq!(scheduler.restore(now()).await.unwrap(), Some(payload.clone()));
        advance(1).await;
        assert_eq!(recorder.sent.lock().unwrap().as_slice(), &[payload]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_without_pending() {
        let (scheduler, recorder, _storage) = setup();
        assert_eq!(scheduler.restore(now()).await.unwrap(), None);
        advance(5).await;
        assert!(recorder.sent.lock().unwrap().is_empty());
    }
}
