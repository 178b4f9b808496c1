// Core structs: PriceCandidate, PricePoint, ProductSnapshot, summaries and errors
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Sek,
    Eur,
    Usd,
    Gbp,
    Unknown,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Sek => "SEK",
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
            Currency::Gbp => "GBP",
            Currency::Unknown => "UNKNOWN",
        }
    }

    /// Maps an ISO code such as the one found in `priceCurrency`.
    pub fn from_code(code: &str) -> Currency {
        match code.trim().to_ascii_uppercase().as_str() {
            "SEK" | "KR" => Currency::Sek,
            "EUR" => Currency::Eur,
            "USD" => Currency::Usd,
            "GBP" => Currency::Gbp,
            _ => Currency::Unknown,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A provisionally parsed price. Never persisted directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceCandidate {
    pub value: f64,
    pub currency: Currency,
}

/// `{host}|{canonicalUrl}` key shared by every observation of one product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub value: f64,
    pub currency: Currency,
    pub timestamp_ms: i64,
    pub source_url: String,
    pub product_id: ProductId,
}

/// Lowest/highest over one product's history in a single currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub lowest: f64,
    pub highest: f64,
    pub currency: Currency,
    pub point_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    GoodTimeToBuy,
    FairPrice,
    ConsiderWaiting,
}

impl Signal {
    pub fn label(&self) -> &'static str {
        match self {
            Signal::GoodTimeToBuy => "Good time to buy",
            Signal::FairPrice => "Fair price",
            Signal::ConsiderWaiting => "Consider waiting",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Signal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// What the UI renders after a track action. `current` is always a live read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub current: f64,
    pub lowest: f64,
    pub highest: f64,
    pub currency: Currency,
    pub point_count: usize,
    pub signal: Signal,
    pub percent_vs_lowest: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Clothing,
    Footwear,
    Electronics,
    Furniture,
    Home,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub title: String,
    pub url: String,
    pub canonical_url: String,
    pub product_id: ProductId,
    pub category: Category,
    pub material: String,
    pub material_detected: bool,
    pub weight_kg: f64,
    pub confidence: Confidence,
    pub updated_at: i64,
}

/// Pending notification kept under `NOTIF_PAYLOAD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    pub scheduled_for: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Co2Estimate {
    pub co2e: f64,
    pub co2e_unit: String,
    pub factor_name: String,
    pub unit_type: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected response status {0}")]
    InvalidResponse(u16),
}

#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(String),
    #[error("corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification API error: {0}")]
    ApiError(String),
    #[error("notification endpoint unreachable")]
    Unreachable,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum Co2Error {
    #[error("CO2 API key is not configured")]
    MissingApiKey,
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Http(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("No weight-based emission factor found for \"{0}\"")]
    NoFactor(String),
}

/// Every failure that reaches the messaging boundary as `{ok: false, error}`.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("No price found on this page.")]
    NoPrice,
    #[error("Page not ready. Refresh the page and try again.")]
    NotReady,
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Co2(#[from] Co2Error),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}
