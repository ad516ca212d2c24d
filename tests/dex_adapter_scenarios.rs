//! Integration tests for the Hyperliquid-shaped DEX adapter (spec §8
//! scenario 4: price canonicalization, and the venue error-code -> reason
//! code mapping on the synchronous place path).

use std::sync::{Arc, Mutex};

use latentspeed_gateway::adapters::dex::DexAdapter;
use latentspeed_gateway::adapters::{Adapter, AdapterCallbacks};
use latentspeed_gateway::error::ReasonCode;
use latentspeed_gateway::model::{FillData, OrderRequest, OrderType, OrderUpdate, Side, TimeInForce};
use secrecy::Secret;

#[derive(Default)]
struct RecordingCallbacks {
    orders: Mutex<Vec<OrderUpdate>>,
    fills: Mutex<Vec<FillData>>,
}

impl AdapterCallbacks for RecordingCallbacks {
    fn on_order_update(&self, update: OrderUpdate) {
        self.orders.lock().unwrap().push(update);
    }

    fn on_fill(&self, fill: FillData) {
        self.fills.lock().unwrap().push(fill);
    }
}

const DEAD_WS_URL: &str = "ws://127.0.0.1:1";

fn place_request(cl_id: &str, price: &str) -> OrderRequest {
    OrderRequest {
        client_order_id: cl_id.to_string(),
        symbol: "BTC-USDT-PERP".to_string(),
        side: Side::Buy,
        order_type: OrderType::Limit,
        quantity: "0.01000".to_string(),
        price: Some(price.to_string()),
        time_in_force: Some(TimeInForce::Gtc),
        reduce_only: false,
        category: None,
        margin_mode: None,
        extra: Default::default(),
        tags: Default::default(),
    }
}

fn adapter(rest_url: String) -> DexAdapter {
    let callbacks = Arc::new(RecordingCallbacks::default());
    DexAdapter::new(rest_url, DEAD_WS_URL.to_string(), "0xabc".to_string(), Secret::new("0xdead".to_string()), true, callbacks).unwrap()
}

#[tokio::test]
async fn a_resting_limit_order_is_acknowledged_with_the_venue_oid() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"resting":{"oid":99887766}}]}}}"#)
        .create_async()
        .await;

    let adapter = adapter(server.url());
    let response = Adapter::place(&adapter, place_request("D-001", "65000.0")).await.unwrap();

    assert!(response.success);
    assert_eq!(response.exchange_order_id.as_deref(), Some("99887766"));
    mock.assert_async().await;
}

#[tokio::test]
async fn tick_violation_maps_to_price_out_of_bounds() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"error":"Tick"}]}}}"#)
        .create_async()
        .await;

    let adapter = adapter(server.url());
    // An off-tick price (more than 5 significant figures) still round-trips
    // through formatting; the venue's own `Tick` rejection is what this test
    // exercises, not the formatter.
    let response = Adapter::place(&adapter, place_request("D-002", "65000.12345")).await.unwrap();

    assert!(!response.success);
    assert_eq!(response.reason_code, ReasonCode::PriceOutOfBounds);
    assert_eq!(response.message, "Tick");
}

#[tokio::test]
async fn insufficient_margin_maps_to_insufficient_balance() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"error":"PerpMargin"}]}}}"#)
        .create_async()
        .await;

    let adapter = adapter(server.url());
    let response = Adapter::place(&adapter, place_request("D-003", "65000")).await.unwrap();

    assert!(!response.success);
    assert_eq!(response.reason_code, ReasonCode::InsufficientBalance);
}

#[tokio::test]
async fn an_ioc_that_does_not_cross_is_not_surfaced_as_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/exchange")
        .with_status(200)
        .with_body(r#"{"status":"ok","response":{"type":"order","data":{"statuses":[{"error":"IocCancel"}]}}}"#)
        .create_async()
        .await;

    let adapter = adapter(server.url());
    let mut request = place_request("D-004", "65000");
    request.time_in_force = Some(TimeInForce::Ioc);
    let response = Adapter::place(&adapter, request).await.unwrap();

    assert!(response.success, "an IOC that simply didn't fill is not a rejection");
    assert_eq!(response.reason_code, ReasonCode::Ok);
}
