//! DEX user-events WS framing (spec §4.10/§6): subscribes to the
//! orderUpdates/userFills/userEvents channels keyed by user address and
//! routes frames into canonical order/fill events.

use std::sync::Arc;

use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::cursor::ExecutionCursor;
use crate::dedup::Deduplicator;
use crate::model::{FillData, Liquidity, OrderStatus, OrderUpdate, Side};
use crate::ws::{WsEvent, WsHooks};

pub struct DexWsHooks {
    user_address: String,
    dedup: Arc<Deduplicator>,
    cursor: Arc<ExecutionCursor>,
}

impl DexWsHooks {
    pub fn new(user_address: String, dedup: Arc<Deduplicator>, cursor: Arc<ExecutionCursor>) -> Self {
        Self {
            user_address,
            dedup,
            cursor,
        }
    }

    fn parse_order_update(&self, item: &Value) -> Option<WsEvent> {
        let order = item.get("order")?;
        let client_order_id = order.get("cloid").and_then(|v| v.as_str())?.to_string();
        let exchange_order_id = order.get("oid").map(|v| v.to_string());
        let status = match item.get("status").and_then(|v| v.as_str()).unwrap_or("") {
            "open" => OrderStatus::Accepted,
            "filled" => OrderStatus::Filled,
            "canceled" => OrderStatus::Canceled,
            "rejected" => OrderStatus::Rejected,
            "triggered" => OrderStatus::Accepted,
            _ => OrderStatus::Accepted,
        };
        let timestamp_ms = item.get("statusTimestamp").and_then(|v| v.as_u64()).unwrap_or(0);

        Some(WsEvent::Order(OrderUpdate {
            client_order_id,
            exchange_order_id,
            status,
            reason: None,
            timestamp_ms,
        }))
    }

    /// Parses one entry of the REST `openOrders` catch-up listing (spec
    /// §4.5 step 5). The flat `{coin, side, limitPx, sz, oid, cloid,
    /// timestamp}` shape differs from the WS `orderUpdates` envelope, so it
    /// gets its own parser; every listed order is, by definition, still
    /// resting, so it always maps to `Accepted`.
    pub(crate) fn parse_catchup_order(&self, item: &Value) -> Option<WsEvent> {
        let client_order_id = item.get("cloid").and_then(|v| v.as_str())?.to_string();
        let exchange_order_id = item.get("oid").map(|v| v.to_string());
        let timestamp_ms = item.get("timestamp").and_then(|v| v.as_u64()).unwrap_or(0);

        Some(WsEvent::Order(OrderUpdate {
            client_order_id,
            exchange_order_id,
            status: OrderStatus::Accepted,
            reason: None,
            timestamp_ms,
        }))
    }

    /// Shared by the WS `userFills` channel and the REST
    /// `userFillsByTime` catch-up listing, which emit fill objects with the
    /// same field names (spec §4.7's shared de-duplicator requirement).
    pub(crate) fn parse_fill(&self, item: &Value) -> Option<WsEvent> {
        let exec_id = item.get("hash").and_then(|v| v.as_str())?.to_string();
        if !self.dedup.try_admit(&exec_id) {
            return None;
        }

        let client_order_id = item.get("cloid").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let exchange_order_id = item.get("oid").map(|v| v.to_string()).unwrap_or_default();
        let symbol = item.get("coin").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let side = match item.get("side").and_then(|v| v.as_str()) {
            Some("B") => Side::Buy,
            _ => Side::Sell,
        };
        let price = item.get("px").and_then(|v| v.as_str()).unwrap_or("0").to_string();
        let quantity = item.get("sz").and_then(|v| v.as_str()).unwrap_or("0").to_string();
        let fee = item.get("fee").and_then(|v| v.as_str()).unwrap_or("0").to_string();
        let liquidity = match item.get("crossed").and_then(|v| v.as_bool()) {
            Some(true) => Liquidity::Taker,
            _ => Liquidity::Maker,
        };
        let timestamp_ms = item.get("time").and_then(|v| v.as_u64()).unwrap_or(0);
        self.cursor.maybe_advance(timestamp_ms);

        Some(WsEvent::Fill(FillData {
            exec_id,
            client_order_id,
            exchange_order_id,
            symbol,
            side,
            price,
            quantity,
            fee,
            fee_currency: "USDC".to_string(),
            liquidity,
            timestamp_ms,
            tags: Default::default(),
        }))
    }
}

impl WsHooks for DexWsHooks {
    fn auth_frame(&self) -> Message {
        // The venue has no discrete auth frame; subscribing to the
        // user-events channel keyed by address doubles as authentication.
        let frame = serde_json::json!({
            "method": "subscribe",
            "subscription": {"type": "userEvents", "user": self.user_address},
        });
        Message::Text(frame.to_string())
    }

    fn is_auth_ack(&self, text: &str) -> Option<bool> {
        let value: Value = serde_json::from_str(text).ok()?;
        if value.get("channel")?.as_str()? != "subscriptionResponse" {
            return None;
        }
        Some(true)
    }

    fn subscribe_frames(&self) -> Vec<Message> {
        vec![
            Message::Text(
                serde_json::json!({
                    "method": "subscribe",
                    "subscription": {"type": "orderUpdates", "user": self.user_address},
                })
                .to_string(),
            ),
            Message::Text(
                serde_json::json!({
                    "method": "subscribe",
                    "subscription": {"type": "userFills", "user": self.user_address},
                })
                .to_string(),
            ),
        ]
    }

    fn parse_frame(&self, text: &str) -> Vec<WsEvent> {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let channel = match value.get("channel").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return Vec::new(),
        };

        match channel {
            "orderUpdates" => value
                .get("data")
                .and_then(|v| v.as_array())
                .map(|items| items.iter().filter_map(|item| self.parse_order_update(item)).collect())
                .unwrap_or_default(),
            "userFills" => value
                .get("data")
                .and_then(|v| v.get("fills"))
                .and_then(|v| v.as_array())
                .map(|items| items.iter().filter_map(|item| self.parse_fill(item)).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hooks() -> DexWsHooks {
        DexWsHooks::new("0xabc".to_string(), Arc::new(Deduplicator::new(100)), Arc::new(ExecutionCursor::new()))
    }

    #[test]
    fn parses_user_fills_and_deduplicates_by_hash() {
        let hooks = hooks();
        let frame = serde_json::json!({
            "channel": "userFills",
            "data": {"fills": [{
                "hash": "0xhash1", "cloid": "0xcloid", "oid": 5, "coin": "BTC-USDT-PERP",
                "side": "B", "px": "65000", "sz": "0.01", "fee": "0.001", "crossed": true, "time": 1700000000000u64
            }]}
        })
        .to_string();

        let first = hooks.parse_frame(&frame);
        assert_eq!(first.len(), 1);
        let second = hooks.parse_frame(&frame);
        assert!(second.is_empty());
    }
}
