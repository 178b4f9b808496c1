use super::handler::PageController;
use super::protocol::PageEvent;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info};

/// Polls the host location and reloads the page when it changes.
pub async fn watch_navigation(
    controller: Arc<Mutex<PageController>>,
    mut location: watch::Receiver<String>,
    poll: Duration,
) {
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut loaded: Option<String> = None;

    loop {
        ticker.tick().await;
        if location.has_changed().is_err() {
            debug!("Location channel closed");
            break;
        }
        let current = location.borrow_and_update().clone();
        if current.is_empty() || loaded.as_deref() == Some(current.as_str()) {
            continue;
        }
        info!("🔀 Location changed to {}", current);
        let mut page = controller.lock().await;
        page.handle_event(PageEvent::Navigate { url: current.clone() }).await;
        // A failed load is retried on the next tick
        if page.is_ready() {
            loaded = Some(current);
        }
    }
}

pub fn spawn_navigation_watcher(
    controller: Arc<Mutex<PageController>>,
    location: watch::Receiver<String>,
    poll: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("▶️ Starting navigation watcher ({} ms)...", poll.as_millis());
        watch_navigation(controller, location, poll).await;
        info!("🛑 Navigation watcher ended.");
    })
}
