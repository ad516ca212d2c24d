//! Gateway egress (spec §4.11/§6): the `BusMessage` enum carried on the
//! publisher's MPSC queue, the `exec.report`/`exec.fill` wire envelopes, and
//! `GatewayCallbacks` — the `AdapterCallbacks` impl every adapter fires into,
//! wired to that queue. One dedicated publisher thread drains the queue and
//! owns the PUB socket exclusively (spec §5's "one publisher thread... drains
//! an MPSC queue to PUB").

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};

use serde::Serialize;

use crate::adapters::AdapterCallbacks;
use crate::error::ReasonCode;
use crate::marketdata::MarketTick;
use crate::model::{FillData, Liquidity, OrderStatus, OrderUpdate, Side};

const SCHEMA_VERSION: u32 = 1;

/// `exec.report` envelope (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct ExecReport {
    pub version: u32,
    pub cl_id: String,
    pub status: String,
    pub exchange_order_id: Option<String>,
    pub reason_code: ReasonCode,
    pub reason_text: String,
    pub ts_ns: u64,
    pub tags: HashMap<String, String>,
}

/// `exec.fill` envelope (spec §6).
#[derive(Debug, Clone, Serialize)]
pub struct ExecFill {
    pub version: u32,
    pub cl_id: String,
    pub exchange_order_id: String,
    pub exec_id: String,
    pub symbol_or_pair: String,
    pub side: String,
    pub price: f64,
    pub size: f64,
    pub fee_currency: String,
    pub fee_amount: f64,
    pub liquidity: String,
    pub ts_ns: u64,
    pub tags: HashMap<String, String>,
}

/// One item on the publisher's queue — anything destined for the PUB socket.
pub enum BusMessage {
    ExecReport(ExecReport),
    ExecFill(ExecFill),
    MarketTick(MarketTick),
}

impl BusMessage {
    pub fn topic(&self) -> String {
        match self {
            BusMessage::ExecReport(_) => "exec.report".to_string(),
            BusMessage::ExecFill(_) => "exec.fill".to_string(),
            BusMessage::MarketTick(tick) => tick.topic(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            BusMessage::ExecReport(report) => serde_json::to_string(report),
            BusMessage::ExecFill(fill) => serde_json::to_string(fill),
            BusMessage::MarketTick(tick) => serde_json::to_string(tick),
        }
    }
}

fn status_wire(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::New => "accepted",
        OrderStatus::Accepted => "accepted",
        OrderStatus::PartiallyFilled => "partially_filled",
        OrderStatus::Filled => "filled",
        OrderStatus::Canceled => "canceled",
        OrderStatus::Rejected => "rejected",
        OrderStatus::Replaced => "replaced",
    }
}

/// Best-effort `reason_code` for a venue-pushed `OrderUpdate`: adapters don't
/// attach a typed reason_code to WS status transitions (only the synchronous
/// place/cancel path does, via the venue's error-code table), so a rejection
/// maps to the taxonomy's catch-all and everything else maps to `ok` per
/// spec §7 ("normal venue outcomes map to ok").
fn order_update_reason_code(status: OrderStatus) -> ReasonCode {
    match status {
        OrderStatus::Rejected => ReasonCode::VenueReject,
        _ => ReasonCode::Ok,
    }
}

fn order_update_to_report(update: OrderUpdate) -> ExecReport {
    let reason_code = order_update_reason_code(update.status);
    ExecReport {
        version: SCHEMA_VERSION,
        cl_id: update.client_order_id,
        status: status_wire(update.status).to_string(),
        exchange_order_id: update.exchange_order_id,
        reason_code,
        reason_text: update.reason.unwrap_or_default(),
        ts_ns: update.timestamp_ms.saturating_mul(1_000_000),
        tags: HashMap::new(),
    }
}

fn side_wire(side: Side) -> &'static str {
    match side {
        Side::Buy => "buy",
        Side::Sell => "sell",
    }
}

fn liquidity_wire(liquidity: Liquidity) -> &'static str {
    match liquidity {
        Liquidity::Maker => "maker",
        Liquidity::Taker => "taker",
    }
}

/// Translates the synchronous `OrderResponse` from a `place`/`cancel`/
/// `modify` call into the `exec.report` egress envelope (spec §4.11 "publish
/// the synchronous OrderResponse as exec.report").
pub fn order_response_to_report(response: crate::model::OrderResponse, ts_ns: u64) -> ExecReport {
    let status = if response.success {
        response.status.unwrap_or_else(|| "accepted".to_string())
    } else {
        "rejected".to_string()
    };
    ExecReport {
        version: SCHEMA_VERSION,
        cl_id: response.client_order_id.unwrap_or_default(),
        status,
        exchange_order_id: response.exchange_order_id,
        reason_code: response.reason_code,
        reason_text: response.message,
        ts_ns,
        tags: HashMap::new(),
    }
}

fn fill_to_exec_fill(fill: FillData) -> ExecFill {
    ExecFill {
        version: SCHEMA_VERSION,
        cl_id: fill.client_order_id,
        exchange_order_id: fill.exchange_order_id,
        exec_id: fill.exec_id,
        symbol_or_pair: fill.symbol,
        side: side_wire(fill.side).to_string(),
        price: fill.price.parse().unwrap_or(0.0),
        size: fill.quantity.parse().unwrap_or(0.0),
        fee_currency: fill.fee_currency,
        fee_amount: fill.fee.parse().unwrap_or(0.0),
        liquidity: liquidity_wire(fill.liquidity).to_string(),
        ts_ns: fill.timestamp_ms.saturating_mul(1_000_000),
        tags: fill.tags,
    }
}

/// The `AdapterCallbacks` implementation wired into every adapter at
/// construction. Fired from whichever thread owns that adapter's WS session;
/// forwards onto the shared publisher queue without blocking on I/O itself.
pub struct GatewayCallbacks {
    tx: Sender<BusMessage>,
}

impl GatewayCallbacks {
    pub fn new(tx: Sender<BusMessage>) -> Self {
        Self { tx }
    }
}

impl AdapterCallbacks for GatewayCallbacks {
    fn on_order_update(&self, update: OrderUpdate) {
        let report = order_update_to_report(update);
        if self.tx.send(BusMessage::ExecReport(report)).is_err() {
            tracing::warn!("publisher queue closed, dropping exec.report");
        }
    }

    fn on_fill(&self, fill: FillData) {
        let exec_fill = fill_to_exec_fill(fill);
        if self.tx.send(BusMessage::ExecFill(exec_fill)).is_err() {
            tracing::warn!("publisher queue closed, dropping exec.fill");
        }
    }
}

/// Spawns the dedicated publisher thread: drains `rx` and writes each
/// message as a two-frame ZMQ message (`[topic, json]`) on `socket`. The PUB
/// socket is owned exclusively by this thread for the process lifetime.
pub fn spawn_publisher(socket: zmq::Socket, rx: Receiver<BusMessage>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(message) = rx.recv() {
            let topic = message.topic();
            let body = match message.to_json() {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to serialize bus message, dropping");
                    continue;
                }
            };
            if let Err(e) = socket.send_multipart([topic.as_bytes(), body.as_bytes()], 0) {
                tracing::error!(error = %e, "failed to publish on PUB socket");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderStatus;

    #[test]
    fn order_update_maps_to_accepted_report_with_ok_reason_code() {
        let update = OrderUpdate {
            client_order_id: "C1".to_string(),
            exchange_order_id: Some("X1".to_string()),
            status: OrderStatus::Accepted,
            reason: None,
            timestamp_ms: 1_700_000_000_000,
        };
        let report = order_update_to_report(update);
        assert_eq!(report.status, "accepted");
        assert_eq!(report.reason_code, ReasonCode::Ok);
        assert_eq!(report.ts_ns, 1_700_000_000_000_000_000);
    }

    #[test]
    fn rejected_update_maps_to_venue_reject_reason_code() {
        let update = OrderUpdate {
            client_order_id: "C1".to_string(),
            exchange_order_id: None,
            status: OrderStatus::Rejected,
            reason: Some("insufficient margin".to_string()),
            timestamp_ms: 0,
        };
        let report = order_update_to_report(update);
        assert_eq!(report.status, "rejected");
        assert_eq!(report.reason_code, ReasonCode::VenueReject);
        assert_eq!(report.reason_text, "insufficient margin");
    }

    #[test]
    fn fill_carries_tags_through_to_exec_fill() {
        let mut tags = HashMap::new();
        tags.insert("parent_cl_id".to_string(), "P1".to_string());
        let fill = FillData {
            exec_id: "E1".to_string(),
            client_order_id: "C1".to_string(),
            exchange_order_id: "X1".to_string(),
            symbol: "BTC-USDT".to_string(),
            side: Side::Buy,
            price: "65000".to_string(),
            quantity: "0.01".to_string(),
            fee: "0.01".to_string(),
            fee_currency: "USDT".to_string(),
            liquidity: Liquidity::Taker,
            timestamp_ms: 1,
            tags,
        };
        let exec_fill = fill_to_exec_fill(fill);
        assert_eq!(exec_fill.price, 65000.0);
        assert_eq!(exec_fill.tags.get("parent_cl_id").map(String::as_str), Some("P1"));
    }

    #[test]
    fn bus_message_topics_match_the_spec_s_wire_names() {
        let report = BusMessage::ExecReport(ExecReport {
            version: 1,
            cl_id: "C1".to_string(),
            status: "accepted".to_string(),
            exchange_order_id: None,
            reason_code: ReasonCode::Ok,
            reason_text: String::new(),
            ts_ns: 0,
            tags: HashMap::new(),
        });
        assert_eq!(report.topic(), "exec.report");
    }
}
