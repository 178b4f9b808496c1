mod analyzer;
mod co2;
mod config;
mod messaging;
mod model;
mod normalizer;
mod notifier;
mod page;
mod parser;
mod storage;

use chrono::Utc;
use co2::ClimatiqClient;
use config::{AppConfig, load_config};
use messaging::{PageController, listen_for_messages, spawn_navigation_watcher};
use notifier::{LogNotifier, NotificationScheduler, Notifier, TelegramNotifier};
use page::HttpFetcher;
use std::sync::Arc;
use storage::SqliteStorage;
use tokio::io::BufReader;
use tokio::sync::{Mutex, watch};
use tokio::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries responses only
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    std::panic::set_hook(Box::new(|panic_info| {
        error!("😱 Panic occurred: {:?}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: Arc<AppConfig> = match load_config(&config_path) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    let storage = match SqliteStorage::new(&config.database_path) {
        Ok(s) => Arc::new(Mutex::new(s)),
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            return;
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(tg) => match TelegramNotifier::new(tg.bot_token.clone(), tg.chat_id) {
            Ok(n) => Arc::new(n),
            Err(e) => {
                warn!("Telegram unavailable ({}), logging notifications instead", e);
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };
    let scheduler = NotificationScheduler::new(storage.clone(), notifier);
    if let Err(e) = scheduler.restore(Utc::now()).await {
        warn!("Could not restore pending notification: {:?}", e);
    }

    let fetcher = match HttpFetcher::new(&config.user_agent, Duration::from_secs(config.fetch_timeout_seconds)) {
        Ok(f) => f,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return;
        }
    };
    let estimator = match ClimatiqClient::new(&config.co2.api_key, &config.co2.base_url, &config.co2.data_version) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create CO2 client: {}", e);
            return;
        }
    };
    if config.co2.api_key.is_empty() {
        warn!("⚠️ No CO2 API key configured, CO2 estimates will fail");
    }

    let controller = Arc::new(Mutex::new(PageController::new(
        Arc::new(fetcher),
        Arc::new(estimator),
        storage.clone(),
        scheduler,
    )));

    let (location_tx, location_rx) = watch::channel(config.start_url.clone());
    spawn_navigation_watcher(
        controller.clone(),
        location_rx,
        Duration::from_millis(config.navigation_poll_ms.max(1)),
    );

    info!("🚀 PriceWatch started, reading messages from stdin");
    let stdin = BufReader::new(tokio::io::stdin());
    if let Err(e) = listen_for_messages(stdin, tokio::io::stdout(), controller, location_tx).await {
        error!("Listener failed: {}", e);
    }
}
