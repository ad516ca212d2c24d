//! Drives `gateway::dispatch::run_dispatch_loop` end-to-end over a real
//! ZeroMQ PUSH/PULL pair against a stub `Adapter`, covering the place->ack
//! path (spec §8 scenario 1) and graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use latentspeed_gateway::adapters::Adapter;
use latentspeed_gateway::error::Result;
use latentspeed_gateway::gateway::dispatch::{run_dispatch_loop, DispatchTable};
use latentspeed_gateway::gateway::publisher::BusMessage;
use latentspeed_gateway::model::{OrderRequest, OrderResponse, Venue};

struct StubAdapter;

#[async_trait]
impl Adapter for StubAdapter {
    async fn place(&self, request: OrderRequest) -> Result<OrderResponse> {
        Ok(OrderResponse::ok(request.client_order_id, "EXCH-1"))
    }

    async fn cancel(&self, client_order_id: &str) -> Result<OrderResponse> {
        Ok(OrderResponse::ok(client_order_id.to_string(), "EXCH-1"))
    }

    async fn modify(&self, client_order_id: &str, _price: Option<String>, _quantity: Option<String>) -> Result<OrderResponse> {
        Ok(OrderResponse::ok(client_order_id.to_string(), "EXCH-1"))
    }

    async fn query(&self, client_order_id: &str) -> Result<OrderResponse> {
        Ok(OrderResponse::ok(client_order_id.to_string(), "EXCH-1"))
    }
}

#[test]
fn a_place_envelope_produces_an_accepted_exec_report() {
    let context = zmq::Context::new();
    let addr = "inproc://dispatch-test-place";

    let pull = context.socket(zmq::PULL).unwrap();
    pull.bind(addr).unwrap();
    let push = context.socket(zmq::PUSH).unwrap();
    push.connect(addr).unwrap();

    let mut table = DispatchTable::new();
    table.insert(Venue::Bybit, Arc::new(StubAdapter) as Arc<dyn Adapter>);

    let (tx, rx) = mpsc::channel();
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let shutdown = Arc::new(AtomicBool::new(false));
    let loop_shutdown = shutdown.clone();

    let handle = std::thread::spawn(move || {
        run_dispatch_loop(pull, table, tx, &runtime, loop_shutdown);
    });

    let envelope = serde_json::json!({
        "version": 1,
        "cl_id": "C-100",
        "action": "place",
        "venue": "bybit",
        "venue_type": "cex",
        "details": {
            "symbol": "BTC-USDT",
            "side": "buy",
            "order_type": "limit",
            "qty": "0.01",
            "price": "65000",
            "tif": "GTC",
            "category": "spot"
        },
        "ts_ns": 0,
        "tags": {}
    });
    push.send(envelope.to_string().as_bytes(), 0).unwrap();

    let message = rx.recv_timeout(Duration::from_secs(2)).expect("expected an exec.report within 2s");
    match message {
        BusMessage::ExecReport(report) => {
            assert_eq!(report.cl_id, "C-100");
            assert_eq!(report.status, "accepted");
            assert_eq!(report.exchange_order_id.as_deref(), Some("EXCH-1"));
        }
        _ => panic!("expected an ExecReport"),
    }

    shutdown.store(true, Ordering::Relaxed);
    handle.join().unwrap();
}
