//! Push message models and frame decoding
//!
//! Inbound frames are UTF-8 text carrying a JSON object with a `type` tag
//! and a `data` or `message` payload. Decoding produces a closed sum type
//! with an explicit `Unknown` fallback so a newly introduced server message
//! kind shows up in the log instead of disappearing.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{Account, MarketStatus, Order, Position, Trade};

#[derive(Error, Debug)]
pub enum EventError {
    #[error("invalid {tag} payload: {source}")]
    InvalidPayload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing payload for {0}")]
    MissingPayload(String),
    #[error("unknown message tag: {0}")]
    UnknownTag(String),
}

/// Raw wire envelope
#[derive(Debug, Clone, Deserialize)]
pub struct PushFrame {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Decoded push event, one variant per recognized tag plus the fallback
#[derive(Debug, Clone)]
pub enum PushEvent {
    AccountUpdate(Account),
    /// Full position set, replaced wholesale
    PositionsUpdate(Vec<Position>),
    /// Single order, upserted by id
    OrderUpdate(Order),
    /// Single trade, appended
    TradeUpdate(Trade),
    MarketStatusUpdate(MarketStatus),
    /// Server-side log/chat/error line for display
    LogLine(String),
    /// Unrecognized tag or undecodable frame, kept verbatim for the log
    Unknown { raw: String },
}

/// Decode one text frame.
///
/// Never fails: a frame that does not decode as structured data, or whose
/// payload does not match its tag, comes back as `Unknown` carrying the
/// raw text so the store can surface it.
pub fn decode_frame(text: &str) -> PushEvent {
    let frame: PushFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Frame is not a tagged JSON object, passing through raw");
            return PushEvent::Unknown {
                raw: text.to_string(),
            };
        }
    };

    match parse_event(&frame) {
        Ok(event) => event,
        Err(EventError::UnknownTag(tag)) => {
            debug!(tag = %tag, "Unknown push tag, surfacing raw frame");
            PushEvent::Unknown {
                raw: text.to_string(),
            }
        }
        Err(e) => {
            warn!(tag = %frame.tag, error = %e, "Failed to decode push payload");
            PushEvent::Unknown {
                raw: text.to_string(),
            }
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(frame: &PushFrame) -> Result<T, EventError> {
    let data = frame
        .data
        .clone()
        .ok_or_else(|| EventError::MissingPayload(frame.tag.clone()))?;
    serde_json::from_value(data).map_err(|source| EventError::InvalidPayload {
        tag: frame.tag.clone(),
        source,
    })
}

fn parse_event(frame: &PushFrame) -> Result<PushEvent, EventError> {
    match frame.tag.as_str() {
        "account_update" => payload::<Account>(frame).map(PushEvent::AccountUpdate),
        "positions_update" => payload::<Vec<Position>>(frame).map(PushEvent::PositionsUpdate),
        "orders_update" => payload::<Order>(frame).map(PushEvent::OrderUpdate),
        "trades_update" => payload::<Trade>(frame).map(PushEvent::TradeUpdate),
        "market_status_update" => {
            payload::<MarketStatus>(frame).map(PushEvent::MarketStatusUpdate)
        }
        "log" | "chat" | "error" => {
            let message = frame
                .message
                .clone()
                .or_else(|| frame.data.as_ref().map(|d| d.to_string()))
                .ok_or_else(|| EventError::MissingPayload(frame.tag.clone()))?;
            Ok(PushEvent::LogLine(message))
        }
        _ => Err(EventError::UnknownTag(frame.tag.clone())),
    }
}
