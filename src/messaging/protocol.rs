// Wire types of the JSON-lines channel: requests, host page events and responses.
use crate::model::{Co2Estimate, MessageError, PriceSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Ping,
    TrackPriceAuto,
    SelectPriceMode,
    OpenWidget,
    #[serde(rename = "CO2_ESTIMATE_REQUEST", rename_all = "camelCase")]
    Co2EstimateRequest { material: String, weight_kg: f64 },
    #[serde(rename_all = "camelCase")]
    ScheduleNotification { delay_seconds: u64, title: String, message: String },
}

/// What the host reports about the page it is showing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageEvent {
    Navigate { url: String },
    Click { x: f64, y: f64 },
    KeyDown { key: String },
}

const PAGE_EVENT_TYPES: &[&str] = &["NAVIGATE", "CLICK", "KEY_DOWN"];

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Request(Request),
    Event(PageEvent),
}

/// Routes a line to `PageEvent` or `Request` by its `type` tag.
pub fn parse_inbound(line: &str) -> Result<Inbound, MessageError> {
    let value: Value = serde_json::from_str(line).map_err(|e| MessageError::InvalidMessage(e.to_string()))?;
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
    if PAGE_EVENT_TYPES.contains(&kind) {
        serde_json::from_value(value)
            .map(Inbound::Event)
            .map_err(|e| MessageError::InvalidMessage(e.to_string()))
    } else {
        serde_json::from_value(value)
            .map(Inbound::Request)
            .map_err(|e| MessageError::InvalidMessage(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ready {
        ok: bool,
        ready: bool,
    },
    Tracked {
        ok: bool,
        summary: PriceSummary,
    },
    Co2 {
        ok: bool,
        result: Co2Estimate,
    },
    Scheduled {
        ok: bool,
        #[serde(rename = "scheduledFor")]
        scheduled_for: i64,
    },
    Error {
        ok: bool,
        error: String,
    },
    Ack {
        ok: bool,
    },
}

impl Response {
    pub fn ready() -> Self {
        Response::Ready { ok: true, ready: true }
    }

    pub fn ack() -> Self {
        Response::Ack { ok: true }
    }

    pub fn tracked(summary: PriceSummary) -> Self {
        Response::Tracked { ok: true, summary }
    }

    pub fn co2(result: Co2Estimate) -> Self {
        Response::Co2 { ok: true, result }
    }

    pub fn scheduled(scheduled_for: i64) -> Self {
        Response::Scheduled { ok: true, scheduled_for }
    }

    pub fn error(error: &MessageError) -> Self {
        Response::Error { ok: false, error: error.to_string() }
    }
}

impl From<Result<Response, MessageError>> for Response {
    fn from(result: Result<Response, MessageError>) -> Self {
        result.unwrap_or_else(|e| Response::error(&e))
    }
}
