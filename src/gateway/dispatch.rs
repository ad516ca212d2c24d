//! Gateway ingress (spec §4.11/§6): the canonical order envelope, the
//! `venue -> adapter` table, and the dispatch loop that runs on the main
//! thread — owns the PULL socket, validates schema version, routes to the
//! right adapter, and publishes the synchronous `OrderResponse` as
//! `exec.report`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::adapters::Adapter;
use crate::error::{GatewayError, Result};
use crate::gateway::publisher::{order_response_to_report, BusMessage};
use crate::model::{Category, MarginMode, OrderRequest, OrderType, Side, TimeInForce, Venue, VenueType};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum IngressAction {
    Place,
    Cancel,
    Modify,
}

#[derive(Deserialize)]
struct IngressEnvelope {
    version: u32,
    cl_id: String,
    action: IngressAction,
    venue: Venue,
    #[allow(dead_code)]
    venue_type: VenueType,
    #[allow(dead_code)]
    #[serde(default)]
    product_type: Option<String>,
    #[serde(default)]
    details: serde_json::Value,
    #[serde(default)]
    ts_ns: u64,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Deserialize)]
struct PlaceDetails {
    symbol: String,
    side: Side,
    order_type: OrderType,
    qty: String,
    price: Option<String>,
    tif: Option<TimeInForce>,
    #[serde(default)]
    reduce_only: bool,
    category: Option<Category>,
    margin_mode: Option<MarginMode>,
    #[serde(default)]
    extra: HashMap<String, String>,
}

#[derive(Deserialize, Default)]
struct ModifyDetails {
    price: Option<String>,
    quantity: Option<String>,
}

/// The `venue -> adapter` table the dispatch loop routes against, populated
/// once at startup per the CLI's `--exchange` selection.
#[derive(Default)]
pub struct DispatchTable {
    adapters: HashMap<Venue, Arc<dyn Adapter>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, venue: Venue, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(venue, adapter);
    }

    fn get(&self, venue: Venue) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(&venue).cloned()
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_nanos() as u64
}

/// Runs the dispatch loop until `shutdown` is raised. Polls the PULL socket
/// with a short timeout so shutdown is observed promptly rather than
/// blocking forever on `recv`.
pub fn run_dispatch_loop(
    pull_socket: zmq::Socket,
    table: DispatchTable,
    publisher_tx: Sender<BusMessage>,
    runtime: &tokio::runtime::Runtime,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let mut items = [pull_socket.as_poll_item(zmq::POLLIN)];
        match zmq::poll(&mut items, 200) {
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "zmq poll failed on the ingress socket");
                continue;
            }
        }
        if !items[0].is_readable() {
            continue;
        }

        let bytes = match pull_socket.recv_bytes(0) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to receive from the ingress socket");
                continue;
            }
        };

        if let Err(e) = dispatch_one(&bytes, &table, &publisher_tx, runtime) {
            tracing::warn!(error = %e, "dropping malformed or undeliverable ingress message");
        }
    }

    drain_remaining(&pull_socket, &table, &publisher_tx, runtime);
}

/// On shutdown, drains any already-queued ingress messages within a bounded
/// timeout rather than dropping them silently (spec §4.11 "drains in-flight
/// orders within a bounded timeout, then closes sockets").
fn drain_remaining(pull_socket: &zmq::Socket, table: &DispatchTable, publisher_tx: &Sender<BusMessage>, runtime: &tokio::runtime::Runtime) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        let mut items = [pull_socket.as_poll_item(zmq::POLLIN)];
        if zmq::poll(&mut items, 50).unwrap_or(0) == 0 || !items[0].is_readable() {
            break;
        }
        let bytes = match pull_socket.recv_bytes(zmq::DONTWAIT) {
            Ok(bytes) => bytes,
            Err(_) => break,
        };
        let _ = dispatch_one(&bytes, table, publisher_tx, runtime);
    }
}

fn dispatch_one(bytes: &[u8], table: &DispatchTable, publisher_tx: &Sender<BusMessage>, runtime: &tokio::runtime::Runtime) -> Result<()> {
    let envelope: IngressEnvelope = serde_json::from_slice(bytes).map_err(GatewayError::Json)?;
    if envelope.version != SCHEMA_VERSION {
        return Err(GatewayError::Internal(format!(
            "unsupported ingress schema version {}",
            envelope.version
        )));
    }

    let adapter = table
        .get(envelope.venue)
        .ok_or_else(|| GatewayError::Config(format!("no adapter configured for venue {:?}", envelope.venue)))?;

    let cl_id = envelope.cl_id.clone();
    let response = runtime.block_on(async {
        match envelope.action {
            IngressAction::Place => {
                let details: PlaceDetails = serde_json::from_value(envelope.details.clone()).map_err(GatewayError::Json)?;
                let request = OrderRequest {
                    client_order_id: envelope.cl_id.clone(),
                    symbol: details.symbol,
                    side: details.side,
                    order_type: details.order_type,
                    quantity: details.qty,
                    price: details.price,
                    time_in_force: details.tif,
                    reduce_only: details.reduce_only,
                    category: details.category,
                    margin_mode: details.margin_mode,
                    extra: details.extra,
                    tags: envelope.tags.clone(),
                };
                adapter.place(request).await
            }
            IngressAction::Cancel => adapter.cancel(&envelope.cl_id).await,
            IngressAction::Modify => {
                let details: ModifyDetails = if envelope.details.is_null() {
                    ModifyDetails::default()
                } else {
                    serde_json::from_value(envelope.details.clone()).map_err(GatewayError::Json)?
                };
                adapter.modify(&envelope.cl_id, details.price, details.quantity).await
            }
        }
    });

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, cl_id = %cl_id, "adapter call failed");
            crate::model::OrderResponse::failed(cl_id, e.to_string())
        }
    };

    let report = order_response_to_report(response, now_ns());
    if publisher_tx.send(BusMessage::ExecReport(report)).is_err() {
        tracing::warn!("publisher queue closed, dropping exec.report");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_envelopes_with_an_unsupported_schema_version() {
        let table = DispatchTable::new();
        let (tx, _rx) = std::sync::mpsc::channel();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let body = serde_json::json!({
            "version": 2, "cl_id": "C1", "action": "place", "venue": "bybit",
            "venue_type": "cex", "details": {}, "ts_ns": 0
        })
        .to_string();

        let err = dispatch_one(body.as_bytes(), &table, &tx, &runtime).unwrap_err();
        assert!(matches!(err, GatewayError::Internal(_)));
    }

    #[test]
    fn rejects_an_envelope_for_an_unconfigured_venue() {
        let table = DispatchTable::new();
        let (tx, _rx) = std::sync::mpsc::channel();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let body = serde_json::json!({
            "version": 1, "cl_id": "C1", "action": "cancel", "venue": "hyperliquid",
            "venue_type": "dex", "details": {}, "ts_ns": 0
        })
        .to_string();

        let err = dispatch_one(body.as_bytes(), &table, &tx, &runtime).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }
}
