//! Integration tests for the Bybit-shaped CEX adapter against a mocked REST
//! venue (spec §8's concrete scenarios 1 and 2).

use std::sync::{Arc, Mutex};

use latentspeed_gateway::adapters::cex::CexAdapter;
use latentspeed_gateway::adapters::{Adapter, AdapterCallbacks};
use latentspeed_gateway::model::{Category, FillData, OrderRequest, OrderType, OrderUpdate, Side};
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

fn place_request(cl_id: &str) -> OrderRequest {
    OrderRequest {
        client_order_id: cl_id.to_string(),
        symbol: "BTC-USDT".to_string(),
        side: Side::Buy,
        order_type: OrderType::Limit,
        quantity: "0.01".to_string(),
        price: Some("65000".to_string()),
        time_in_force: Some(latentspeed_gateway::model::TimeInForce::Gtc),
        reduce_only: false,
        category: Some(Category::Spot),
        margin_mode: None,
        extra: Default::default(),
        tags: Default::default(),
    }
}

/// An unreachable-but-well-formed WS URL: the adapter's WS thread will spin
/// on connection failures in the background for the lifetime of the test,
/// exactly as it would against a genuinely down venue. It never touches the
/// synchronous REST-driven `place`/`cancel` path under test here.
const DEAD_WS_URL: &str = "ws://127.0.0.1:1";

#[tokio::test]
async fn place_ack_then_rest_backfills_exchange_order_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v5/order/create")
        .with_status(200)
        .with_body(r#"{"retCode":0,"retMsg":"OK","result":{"orderId":"X-001"}}"#)
        .create_async()
        .await;

    let callbacks = Arc::new(RecordingCallbacks::default());
    let adapter = CexAdapter::new(
        server.url(),
        DEAD_WS_URL.to_string(),
        "test-key".to_string(),
        Secret::new("test-secret".to_string()),
        callbacks,
    )
    .unwrap();

    let response = Adapter::place(&adapter, place_request("C-001")).await.unwrap();

    assert!(response.success);
    assert_eq!(response.exchange_order_id.as_deref(), Some("X-001"));
    assert_eq!(response.status.as_deref(), Some("accepted"));
    mock.assert_async().await;
}

#[tokio::test]
async fn venue_rejection_surfaces_as_a_failed_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v5/order/create")
        .with_status(200)
        .with_body(r#"{"retCode":110007,"retMsg":"ab not enough for new order"}"#)
        .create_async()
        .await;

    let callbacks = Arc::new(RecordingCallbacks::default());
    let adapter = CexAdapter::new(
        server.url(),
        DEAD_WS_URL.to_string(),
        "test-key".to_string(),
        Secret::new("test-secret".to_string()),
        callbacks,
    )
    .unwrap();

    let response = Adapter::place(&adapter, place_request("C-002")).await.unwrap();

    assert!(!response.success);
    assert_eq!(response.message, "ab not enough for new order");
    assert!(response.exchange_order_id.is_none());
}

#[tokio::test]
async fn cancel_of_an_already_canceled_order_is_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v5/order/create")
        .with_status(200)
        .with_body(r#"{"retCode":0,"retMsg":"OK","result":{"orderId":"X-003"}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/v5/order/cancel")
        .with_status(200)
        .with_body(r#"{"retCode":110001,"retMsg":"order not exists or too late to cancel"}"#)
        .create_async()
        .await;

    let callbacks = Arc::new(RecordingCallbacks::default());
    let adapter = CexAdapter::new(
        server.url(),
        DEAD_WS_URL.to_string(),
        "test-key".to_string(),
        Secret::new("test-secret".to_string()),
        callbacks,
    )
    .unwrap();

    Adapter::place(&adapter, place_request("C-003")).await.unwrap();
    let response = Adapter::cancel(&adapter, "C-003").await.unwrap();

    assert!(response.success, "canceling an already-canceled order must not be surfaced as an error");
}

#[tokio::test]
async fn rate_limit_response_maps_to_a_rate_limited_error() {
    let mut server = mockito::Server::new_async().await;
    server.mock("POST", "/v5/order/create").with_status(429).create_async().await;

    let callbacks = Arc::new(RecordingCallbacks::default());
    let adapter = CexAdapter::new(
        server.url(),
        DEAD_WS_URL.to_string(),
        "test-key".to_string(),
        Secret::new("test-secret".to_string()),
        callbacks,
    )
    .unwrap();

    let err = Adapter::place(&adapter, place_request("C-004")).await.unwrap_err();
    assert!(matches!(err, latentspeed_gateway::GatewayError::RateLimited));
}
