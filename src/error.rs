//! Error types.
//!
//! This module defines the consolidated error type for the gateway along with
//! the `reason_code` taxonomy that adapters map venue errors onto before
//! publishing an `exec.report`. The shape follows the teacher crate's
//! `ManjaError`: one `thiserror` enum with `#[from]` conversions for the
//! transport crates plus a handful of internal variants.

use std::fmt;

/// A `Result` alias where the `Err` case is [`GatewayError`].
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Consolidated error type for the execution gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("REST transport error: {0}")]
    RestTransport(String),

    #[error("WebSocket transport error: {0}")]
    WsTransport(String),

    #[error("DNS resolution error: {0}")]
    Dns(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("signing failed: {0}")]
    SignFailed(String),

    #[error("rate limited, retry after cooldown")]
    RateLimited,

    #[error("unknown venue symbol: {0}")]
    UnknownSymbol(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    Tungstenite(#[from] tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZeroMQ error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl From<&str> for GatewayError {
    fn from(value: &str) -> Self {
        GatewayError::Internal(value.to_string())
    }
}

impl From<String> for GatewayError {
    fn from(value: String) -> Self {
        GatewayError::Internal(value)
    }
}

/// The venue-agnostic `reason_code` taxonomy carried on `exec.report` (spec §7).
///
/// `Display` renders the wire string used in the JSON envelope (`"reason_code"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Ok,
    Canceled,
    InternalError,
    RestTransport,
    WsTransport,
    Dns,
    AuthFailed,
    SignFailed,
    RateLimited,
    RiskBlocked,
    PostOnlyViolation,
    ReduceOnlyViolation,
    PriceOutOfBounds,
    MinSize,
    InsufficientBalance,
    VenueReject,
    UnknownSymbol,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_string());
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_renders_snake_case_wire_strings() {
        assert_eq!(ReasonCode::Ok.to_string(), "ok");
        assert_eq!(ReasonCode::PriceOutOfBounds.to_string(), "price_out_of_bounds");
        assert_eq!(ReasonCode::InsufficientBalance.to_string(), "insufficient_balance");
    }

    #[test]
    fn string_conversions_produce_internal_variant() {
        let err: GatewayError = "boom".into();
        assert!(matches!(err, GatewayError::Internal(ref m) if m == "boom"));
    }
}
