//! CEX private WS framing (spec §4.9/§6): auth frame, subscribe frames, and
//! topic routing (`order`/`order.*` -> order updates, `execution` -> fills).

use std::sync::Arc;

use secrecy::Secret;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::adapters::cex::status::map_status;
use crate::adapters::cex::symbols::SymbolTable;
use crate::cursor::ExecutionCursor;
use crate::dedup::Deduplicator;
use crate::model::{FillData, Liquidity, OrderUpdate, Side};
use crate::signing::CexSigner;
use crate::ws::{WsEvent, WsHooks};

pub struct CexWsHooks {
    api_key: String,
    api_secret: Secret<String>,
    symbols: Arc<SymbolTable>,
    dedup: Arc<Deduplicator>,
    cursor: Arc<ExecutionCursor>,
}

impl CexWsHooks {
    pub fn new(
        api_key: String,
        api_secret: Secret<String>,
        symbols: Arc<SymbolTable>,
        dedup: Arc<Deduplicator>,
        cursor: Arc<ExecutionCursor>,
    ) -> Self {
        Self {
            api_key,
            api_secret,
            symbols,
            dedup,
            cursor,
        }
    }

    /// Shared by the WS `order` topic and the REST catch-up open-orders
    /// listing — both carry the same field names (`orderLinkId`, `orderId`,
    /// `orderStatus`, `updatedTime`), so one parser serves both paths.
    pub(crate) fn parse_order(&self, item: &Value) -> Option<WsEvent> {
        let client_order_id = item.get("orderLinkId")?.as_str()?.to_string();
        let exchange_order_id = item.get("orderId").and_then(|v| v.as_str()).map(str::to_string);
        let venue_status = item.get("orderStatus")?.as_str()?;
        let status = map_status(venue_status);
        let reason = item
            .get("rejectReason")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let timestamp_ms = item
            .get("updatedTime")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        Some(WsEvent::Order(OrderUpdate {
            client_order_id,
            exchange_order_id,
            status,
            reason,
            timestamp_ms,
        }))
    }

    /// Shared by the WS `execution` topic and the REST catch-up executions
    /// listing, per spec §4.7's "shared across WS and REST catch-up paths".
    pub(crate) fn parse_fill(&self, item: &Value) -> Option<WsEvent> {
        let exec_id = item.get("execId")?.as_str()?.to_string();
        if !self.dedup.try_admit(&exec_id) {
            return None;
        }

        let client_order_id = item.get("orderLinkId")?.as_str()?.to_string();
        let exchange_order_id = item.get("orderId")?.as_str()?.to_string();
        let native_symbol = item.get("symbol")?.as_str()?;
        let symbol = self.symbols.to_canonical(native_symbol).unwrap_or_else(|_| native_symbol.to_string());
        let side = match item.get("side").and_then(|v| v.as_str()) {
            Some("Buy") => Side::Buy,
            _ => Side::Sell,
        };
        let price = item.get("execPrice")?.as_str()?.to_string();
        let quantity = item.get("execQty")?.as_str()?.to_string();
        let fee = item.get("execFee").and_then(|v| v.as_str()).unwrap_or("0").to_string();
        let fee_currency = item.get("feeCurrency").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let liquidity = match item.get("isMaker").and_then(|v| v.as_bool()) {
            Some(true) => Liquidity::Maker,
            _ => Liquidity::Taker,
        };
        let timestamp_ms = item
            .get("execTime")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

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
            fee_currency,
            liquidity,
            timestamp_ms,
            tags: Default::default(),
        }))
    }
}

impl WsHooks for CexWsHooks {
    fn auth_frame(&self) -> Message {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the unix epoch")
            .as_millis() as u64;
        let (expires_ms, signature) = CexSigner::sign_ws_auth(now_ms, &self.api_secret);
        let frame = serde_json::json!({
            "op": "auth",
            "args": [self.api_key, expires_ms, signature],
        });
        Message::Text(frame.to_string())
    }

    fn is_auth_ack(&self, text: &str) -> Option<bool> {
        let value: Value = serde_json::from_str(text).ok()?;
        if value.get("op")?.as_str()? != "auth" {
            return None;
        }
        Some(value.get("success").and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn subscribe_frames(&self) -> Vec<Message> {
        let frame = serde_json::json!({
            "op": "subscribe",
            "args": ["order", "execution"],
        });
        vec![Message::Text(frame.to_string())]
    }

    fn parse_frame(&self, text: &str) -> Vec<WsEvent> {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let topic = match value.get("topic").and_then(|v| v.as_str()) {
            Some(t) => t,
            None => return Vec::new(),
        };

        let items = match value.get("data").and_then(|v| v.as_array()) {
            Some(items) => items,
            None => return Vec::new(),
        };

        if topic == "order" || topic.starts_with("order.") {
            items.iter().filter_map(|item| self.parse_order(item)).collect()
        } else if topic == "execution" {
            items.iter().filter_map(|item| self.parse_fill(item)).collect()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hooks() -> CexWsHooks {
        CexWsHooks::new(
            "key".to_string(),
            Secret::new("secret".to_string()),
            Arc::new(SymbolTable::default()),
            Arc::new(Deduplicator::new(100)),
            Arc::new(ExecutionCursor::new()),
        )
    }

    #[test]
    fn parses_order_topic_into_order_update() {
        let hooks = hooks();
        let frame = serde_json::json!({
            "topic": "order",
            "data": [{"orderLinkId": "C1", "orderId": "X1", "orderStatus": "Filled", "updatedTime": "1700000000000"}]
        })
        .to_string();

        let events = hooks.parse_frame(&frame);
        assert_eq!(events.len(), 1);
        match &events[0] {
            WsEvent::Order(update) => {
                assert_eq!(update.client_order_id, "C1");
                assert_eq!(update.status, crate::model::OrderStatus::Filled);
            }
            _ => panic!("expected an order event"),
        }
    }

    #[test]
    fn parses_execution_topic_and_deduplicates_by_exec_id() {
        let hooks = hooks();
        let frame = serde_json::json!({
            "topic": "execution",
            "data": [{
                "execId": "E1", "orderLinkId": "C1", "orderId": "X1", "symbol": "BTCUSDT",
                "side": "Buy", "execPrice": "65000", "execQty": "0.004", "execFee": "0.01",
                "feeCurrency": "USDT", "isMaker": false, "execTime": "1700000000000"
            }]
        })
        .to_string();

        let first_pass = hooks.parse_frame(&frame);
        assert_eq!(first_pass.len(), 1);
        let second_pass = hooks.parse_frame(&frame);
        assert!(second_pass.is_empty(), "duplicate exec_id must be suppressed");
    }

    #[test]
    fn auth_ack_reads_success_flag() {
        let hooks = hooks();
        assert_eq!(hooks.is_auth_ack(r#"{"op":"auth","success":true}"#), Some(true));
        assert_eq!(hooks.is_auth_ack(r#"{"op":"auth","success":false}"#), Some(false));
        assert_eq!(hooks.is_auth_ack(r#"{"op":"subscribe","success":true}"#), None);
    }
}
