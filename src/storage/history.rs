// Per-product price history, snapshot slot and pending notification slot on top of the kv store.
use super::traits::KeyValueStore;
use crate::model::{
    Currency, HistoryStats, NotificationPayload, PriceCandidate, PricePoint, ProductId, ProductSnapshot,
    StorageError,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const PRICE_HISTORY_KEY: &str = "PRICE_HISTORY_BY_PRODUCT";
pub const SNAPSHOT_KEY: &str = "LAST_PRODUCT_SNAPSHOT";
pub const NOTIFICATION_KEY: &str = "NOTIF_PAYLOAD";

/// Oldest points are evicted past this many per product.
pub const MAX_POINTS_PER_PRODUCT: usize = 200;
/// Same value tracked again within this window is ignored.
pub const DEDUP_WINDOW_MS: i64 = 60_000;

pub type HistoryMap = BTreeMap<ProductId, Vec<PricePoint>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    Duplicate,
}

fn load_all<S: KeyValueStore>(store: &S) -> Result<HistoryMap, StorageError> {
    Ok(store.get_json::<HistoryMap>(PRICE_HISTORY_KEY)?.unwrap_or_default())
}

pub fn load_history<S: KeyValueStore>(store: &S, product_id: &ProductId) -> Result<Vec<PricePoint>, StorageError> {
    Ok(load_all(store)?.remove(product_id).unwrap_or_default())
}

/// Read-modify-write of the whole history map. Concurrent writers may lose an update.
pub fn append_price<S: KeyValueStore>(
    store: &S,
    product_id: &ProductId,
    candidate: PriceCandidate,
    source_url: &str,
    now: DateTime<Utc>,
) -> Result<AppendOutcome, StorageError> {
    let now_ms = now.timestamp_millis();
    let mut all = load_all(store)?;
    let points = all.entry(product_id.clone()).or_default();

    if let Some(last) = points.last() {
        if last.value == candidate.value && now_ms - last.timestamp_ms <= DEDUP_WINDOW_MS {
            debug!("Skipping duplicate {:.2} for {}", candidate.value, product_id);
            return Ok(AppendOutcome::Duplicate);
        }
    }

    points.push(PricePoint {
        value: candidate.value,
        currency: candidate.currency,
        timestamp_ms: now_ms,
        source_url: source_url.to_string(),
        product_id: product_id.clone(),
    });
    if points.len() > MAX_POINTS_PER_PRODUCT {
        let excess = points.len() - MAX_POINTS_PER_PRODUCT;
        points.drain(..excess);
    }
    let count = points.len();

    store.put_json(PRICE_HISTORY_KEY, &all)?;
    info!("📈 Tracked {:.2} {} for {} ({} points)", candidate.value, candidate.currency, product_id, count);
    Ok(AppendOutcome::Appended)
}

/// Lowest/highest over the points in `currency`; `None` when there are none.
pub fn summarize<S: KeyValueStore>(
    store: &S,
    product_id: &ProductId,
    currency: Currency,
) -> Result<Option<HistoryStats>, StorageError> {
    let history = load_history(store, product_id)?;
    Ok(stats_for(&history, currency))
}

pub fn stats_for(points: &[PricePoint], currency: Currency) -> Option<HistoryStats> {
    let values: Vec<f64> = points
        .iter()
        .filter(|p| p.currency == currency)
        .map(|p| p.value)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(HistoryStats {
        lowest: values.iter().copied().fold(f64::INFINITY, f64::min),
        highest: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        currency,
        point_count: values.len(),
    })
}

pub fn save_snapshot<S: KeyValueStore>(store: &S, snapshot: &ProductSnapshot) -> Result<(), StorageError> {
    store.put_json(SNAPSHOT_KEY, snapshot)
}

pub fn load_snapshot<S: KeyValueStore>(store: &S) -> Result<Option<ProductSnapshot>, StorageError> {
    store.get_json(SNAPSHOT_KEY)
}

pub fn save_pending_notification<S: KeyValueStore>(
    store: &S,
    payload: &NotificationPayload,
) -> Result<(), StorageError> {
    store.put_json(NOTIFICATION_KEY, payload)
}

pub fn load_pending_notification<S: KeyValueStore>(store: &S) -> Result<Option<NotificationPayload>, StorageError> {
    store.get_json(NOTIFICATION_KEY)
}

pub fn clear_pending_notification<S: KeyValueStore>(store: &S) -> Result<(), StorageError> {
    store.remove(NOTIFICATION_KEY)
}
