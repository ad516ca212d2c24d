//! Canonical order/fill types shared by every venue adapter.
//!
//! These mirror the JSON envelopes in spec §3 and §6 exactly; venue adapters
//! translate to/from their own wire formats but never leak venue-specific
//! shapes past the adapter boundary. `tags` is a free-form passthrough map
//! propagated end-to-end (ingress -> tracker extras -> egress) so callers can
//! stash bookkeeping like parent/child TP-SL linkage without the gateway
//! needing to understand it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ReasonCode;

/// Venues this gateway knows how to route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Bybit,
    Hyperliquid,
}

/// Whether a venue is a centralized exchange (HMAC REST + private WS) or a
/// perpetuals DEX (EIP-712 actions + user-event WS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueType {
    Cex,
    Dex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "GTC")]
    Gtc,
    #[serde(rename = "IOC")]
    Ioc,
    #[serde(rename = "PO")]
    PostOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Spot,
    Linear,
    Inverse,
    Option,
    Perpetual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    Cross,
    Isolated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liquidity {
    Maker,
    Taker,
}

/// Order status as carried on an [`OrderUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Accepted,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Replaced,
}

impl OrderStatus {
    /// An order is removed from the tracker once it reaches a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected
        )
    }
}

/// Canonical order request (spec §3). Immutable after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    /// Decimal-as-string to avoid float precision loss across the wire.
    pub quantity: String,
    pub price: Option<String>,
    pub time_in_force: Option<TimeInForce>,
    #[serde(default)]
    pub reduce_only: bool,
    pub category: Option<Category>,
    pub margin_mode: Option<MarginMode>,
    #[serde(default)]
    pub extra: HashMap<String, String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Canonical order response, returned synchronously from place/cancel/modify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub success: bool,
    pub message: String,
    pub exchange_order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub status: Option<String>,
    pub reason_code: ReasonCode,
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl OrderResponse {
    pub fn ok(client_order_id: impl Into<String>, exchange_order_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message: "ok".to_string(),
            exchange_order_id: Some(exchange_order_id.into()),
            client_order_id: Some(client_order_id.into()),
            status: Some("accepted".to_string()),
            reason_code: ReasonCode::Ok,
            extra: HashMap::new(),
        }
    }

    pub fn failed(client_order_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            exchange_order_id: None,
            client_order_id: Some(client_order_id.into()),
            status: None,
            reason_code: ReasonCode::VenueReject,
            extra: HashMap::new(),
        }
    }

    /// Overrides the default `reason_code`, for adapters that have already
    /// classified the venue's error against their error-code table (e.g.
    /// `adapters::dex::errors::map_error_code`).
    pub fn with_reason_code(mut self, reason_code: ReasonCode) -> Self {
        self.reason_code = reason_code;
        self
    }
}

/// Canonical order update, pushed from the adapter's WS or REST catch-up path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub client_order_id: String,
    pub exchange_order_id: Option<String>,
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub timestamp_ms: u64,
}

/// Canonical fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillData {
    pub exec_id: String,
    pub client_order_id: String,
    pub exchange_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: String,
    pub quantity: String,
    pub fee: String,
    pub fee_currency: String,
    pub liquidity: Liquidity,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_terminal_states() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Accepted.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }

    #[test]
    fn order_response_round_trips_through_json() {
        let resp = OrderResponse::ok("C1", "X1");
        let json = serde_json::to_string(&resp).unwrap();
        let back: OrderResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.exchange_order_id.as_deref(), Some("X1"));
        assert!(back.success);
    }
}
