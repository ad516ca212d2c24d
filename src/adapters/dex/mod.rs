//! Hyperliquid-shaped DEX adapter (spec §4.10): adds asset resolution,
//! number canonicalization, cloid coercion, batching, and market-order
//! slippage emulation on top of the CEX adapter's shape.

pub mod assets;
pub mod batcher;
pub mod cloid;
pub mod errors;
pub mod format;
pub mod rest;
pub mod ws;
pub mod ws_post;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secrecy::Secret;

use crate::adapters::dex::assets::AssetTable;
use crate::adapters::dex::cloid::CloidRegistry;
use crate::adapters::dex::format::{format_order_price, format_order_size};
use crate::adapters::dex::rest::DexRestClient;
use crate::adapters::dex::ws::DexWsHooks;
use crate::adapters::{Adapter, AdapterCallbacks};
use crate::cursor::ExecutionCursor;
use crate::dedup::Deduplicator;
use crate::error::{GatewayError, Result};
use crate::model::{OrderRequest, OrderResponse, OrderType, Side, TimeInForce};
use crate::ratelimit::{CooldownGate, RateLimiter};
use crate::rest::RestSession;
use crate::signing::{LocalDexSigner, OrderLeg, SignerBridge};
use crate::tracker::{OrderTracker, TrackerEntry};
use crate::ws::{WsSession, WsSessionConfig};

const DEDUP_CAPACITY: usize = 50_000;

/// Default slippage band applied to market orders, emulated as IOC limits
/// around the last known price (spec §4.10).
const DEFAULT_SLIPPAGE_BPS: u32 = 10;

pub struct DexAdapter {
    rest: Arc<DexRestClient>,
    tracker: Arc<OrderTracker>,
    assets: Arc<AssetTable>,
    cloids: Arc<CloidRegistry>,
    ws_shutdown: Arc<AtomicBool>,
    slippage_bps: u32,
}

impl DexAdapter {
    pub fn new(
        rest_base_url: String,
        ws_url: String,
        user_address: String,
        private_key: Secret<String>,
        use_testnet: bool,
        callbacks: Arc<dyn AdapterCallbacks>,
    ) -> Result<Self> {
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_secs(1), 20));
        let cooldown_gate = Arc::new(CooldownGate::new());
        let rest_session = RestSession::new(rest_base_url, rate_limiter, cooldown_gate, Duration::from_secs(10))?;
        let signer: Arc<dyn SignerBridge> = Arc::new(LocalDexSigner::new(private_key, use_testnet));
        let rest = Arc::new(DexRestClient::new(rest_session, signer, None));

        let assets = Arc::new(AssetTable::new());
        let cloids = Arc::new(CloidRegistry::new());
        let tracker = Arc::new(OrderTracker::new());
        let dedup = Arc::new(Deduplicator::new(DEDUP_CAPACITY));
        let cursor = Arc::new(ExecutionCursor::new());
        let ws_shutdown = Arc::new(AtomicBool::new(false));

        Self::spawn_ws_thread(
            ws_url,
            user_address,
            dedup,
            cursor,
            rest.clone(),
            tracker.clone(),
            callbacks,
            ws_shutdown.clone(),
        );

        Ok(Self {
            rest,
            tracker,
            assets,
            cloids,
            ws_shutdown,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_ws_thread(
        ws_url: String,
        user_address: String,
        dedup: Arc<Deduplicator>,
        cursor: Arc<ExecutionCursor>,
        rest: Arc<DexRestClient>,
        tracker: Arc<OrderTracker>,
        callbacks: Arc<dyn AdapterCallbacks>,
        shutdown: Arc<AtomicBool>,
    ) {
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build per-adapter tokio runtime");

            runtime.block_on(async move {
                let hooks = DexWsHooks::new(user_address.clone(), dedup, cursor.clone());
                let config = WsSessionConfig {
                    url: ws_url,
                    ping_interval: Duration::from_secs(20),
                    pong_timeout: Duration::from_secs(60),
                    resubscribe_quiet: Duration::from_secs(30),
                    reconnect_quiet: Duration::from_secs(90),
                    backoff_base: Duration::from_millis(500),
                    backoff_cap: Duration::from_secs(30),
                };
                let session = WsSession::new(config, shutdown);
                let catchup_tracker = tracker.clone();
                let catchup_callbacks = callbacks.clone();

                session
                    .run(
                        &hooks,
                        |event| match event {
                            crate::ws::WsEvent::Order(update) => {
                                tracker.apply_update(&update);
                                callbacks.on_order_update(update);
                            }
                            crate::ws::WsEvent::Fill(fill) => {
                                callbacks.on_fill(fill);
                            }
                        },
                        || {
                            Self::run_catchup(&rest, &hooks, &user_address, &cursor, &catchup_tracker, catchup_callbacks.as_ref())
                        },
                    )
                    .await;
            });
        });
    }

    /// One-shot REST catch-up (spec §4.5 step 5): lists resting orders and
    /// fills since the execution-time cursor. Hyperliquid's `openOrders`
    /// response is a flat array with no WS-style status wrapper, so it gets
    /// its own parser; `userFillsByTime` shares the WS fill shape.
    async fn run_catchup(
        rest: &DexRestClient,
        hooks: &DexWsHooks,
        user_address: &str,
        cursor: &ExecutionCursor,
        tracker: &OrderTracker,
        callbacks: &dyn AdapterCallbacks,
    ) {
        match rest.open_orders(user_address).await {
            Ok(response) => {
                let orders = response.as_array().cloned().unwrap_or_default();
                for item in &orders {
                    if let Some(crate::ws::WsEvent::Order(update)) = hooks.parse_catchup_order(item) {
                        tracker.apply_update(&update);
                        callbacks.on_order_update(update);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "catch-up open-orders listing failed"),
        }

        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the unix epoch")
            .as_millis() as u64;
        let since = cursor.since_or_default(now_ms);

        match rest.user_fills_since(user_address, since).await {
            Ok(response) => {
                let fills = response.as_array().cloned().unwrap_or_default();
                for item in &fills {
                    if let Some(crate::ws::WsEvent::Fill(fill)) = hooks.parse_fill(item) {
                        callbacks.on_fill(fill);
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "catch-up user-fills listing failed"),
        }
    }

    /// Resolves the price a market order should limit at: the caller's last
    /// known fill price or top-of-book, widened by `slippage_bps`.
    fn market_order_limit_price(&self, reference_price: &str, side: Side) -> Result<String> {
        use rust_decimal::Decimal;
        use std::str::FromStr;

        let reference = Decimal::from_str(reference_price)
            .map_err(|e| GatewayError::Internal(format!("invalid reference price: {e}")))?;
        let band = reference * Decimal::new(self.slippage_bps as i64, 4);
        let limit = match side {
            Side::Buy => reference + band,
            Side::Sell => reference - band,
        };
        format_order_price(&limit.to_string())
    }

    pub async fn place(&self, request: OrderRequest) -> Result<OrderResponse> {
        let meta = self.assets.resolve(&request.symbol)?;
        let cloid = self.cloids.cloid_for(&request.client_order_id);

        let limit_price = match request.order_type {
            OrderType::Limit => {
                let raw = request
                    .price
                    .as_deref()
                    .ok_or_else(|| GatewayError::Internal("limit order missing price".to_string()))?;
                format_order_price(raw)?
            }
            OrderType::Market => {
                let reference = request
                    .extra
                    .get("reference_price")
                    .cloned()
                    .ok_or_else(|| GatewayError::Internal("market order missing reference_price".to_string()))?;
                self.market_order_limit_price(&reference, request.side)?
            }
        };
        let size = format_order_size(&request.quantity, meta.sz_decimals)?;

        let tif = match (request.order_type, request.time_in_force) {
            (OrderType::Market, _) => "Ioc",
            (_, Some(TimeInForce::Ioc)) => "Ioc",
            (_, Some(TimeInForce::PostOnly)) => "Alo",
            _ => "Gtc",
        };

        self.tracker.start_tracking(TrackerEntry {
            client_order_id: request.client_order_id.clone(),
            exchange_order_id: None,
            category: None,
            symbol: request.symbol.clone(),
            side: request.side,
            price: Some(limit_price.clone()),
            quantity: size.clone(),
            reduce_only: request.reduce_only,
            margin_mode: None,
            status: crate::model::OrderStatus::New,
            extra: request.tags.clone(),
        });

        let leg = OrderLeg {
            asset: meta.asset_index,
            is_buy: request.side == Side::Buy,
            limit_px: limit_price,
            size,
            reduce_only: request.reduce_only,
            time_in_force: match tif {
                "Ioc" => "Ioc",
                "Alo" => "Alo",
                _ => "Gtc",
            },
        };

        let response = self.rest.place_order(leg).await?;
        self.interpret_place_response(&request.client_order_id, &cloid, response)
    }

    fn interpret_place_response(
        &self,
        client_order_id: &str,
        cloid: &str,
        response: serde_json::Value,
    ) -> Result<OrderResponse> {
        let status = response
            .get("response")
            .and_then(|r| r.get("data"))
            .and_then(|d| d.get("statuses"))
            .and_then(|s| s.as_array())
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        if let Some(resting) = status.get("resting") {
            let oid = resting.get("oid").and_then(|v| v.as_u64()).unwrap_or(0);
            self.cloids.register_exchange_oid(oid, client_order_id);
            self.tracker.backfill_exchange_id(client_order_id, &oid.to_string());
            return Ok(OrderResponse::ok(client_order_id.to_string(), oid.to_string()));
        }

        if let Some(error) = status.get("error").and_then(|v| v.as_str()) {
            let reason_code = crate::adapters::dex::errors::map_error_code(error);
            if reason_code == crate::error::ReasonCode::Ok {
                return Ok(OrderResponse::ok(client_order_id.to_string(), cloid.to_string()));
            }
            return Ok(OrderResponse::failed(client_order_id.to_string(), error.to_string()).with_reason_code(reason_code));
        }

        // A filled-on-arrival IOC has no "resting" entry; treat presence of
        // the status object without an error as accepted.
        Ok(OrderResponse::ok(client_order_id.to_string(), cloid.to_string()))
    }

    pub async fn cancel(&self, client_order_id: &str) -> Result<OrderResponse> {
        let entry = self
            .tracker
            .get_by_client_id(client_order_id)
            .ok_or_else(|| GatewayError::Internal(format!("unknown client_order_id {client_order_id}")))?;
        let meta = self.assets.resolve(&entry.symbol)?;
        let exchange_oid: u64 = entry
            .exchange_order_id
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| GatewayError::Internal("cancel requires a known exchange order id".to_string()))?;

        let response = self.rest.cancel_order(meta.asset_index, exchange_oid).await?;
        let status = response
            .get("response")
            .and_then(|r| r.get("data"))
            .and_then(|d| d.get("statuses"))
            .and_then(|s| s.as_array())
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        if let Some(error) = status.get("error").and_then(|v| v.as_str()) {
            if error.to_lowercase().contains("already canceled") || error.to_lowercase().contains("unknown oid") {
                return Ok(OrderResponse::ok(client_order_id.to_string(), exchange_oid.to_string()));
            }
            return Ok(OrderResponse::failed(client_order_id.to_string(), error.to_string()));
        }

        Ok(OrderResponse::ok(client_order_id.to_string(), exchange_oid.to_string()))
    }

    pub async fn modify(&self, client_order_id: &str, price: Option<String>, quantity: Option<String>) -> Result<OrderResponse> {
        // The venue has no in-place amend; a modify is a cancel followed by
        // a fresh place at the new price/quantity.
        let entry = self
            .tracker
            .get_by_client_id(client_order_id)
            .ok_or_else(|| GatewayError::Internal(format!("unknown client_order_id {client_order_id}")))?;
        let cancel_response = self.cancel(client_order_id).await?;
        if !cancel_response.success {
            return Ok(cancel_response);
        }

        let new_request = OrderRequest {
            client_order_id: client_order_id.to_string(),
            symbol: entry.symbol,
            side: entry.side,
            order_type: OrderType::Limit,
            quantity: quantity.unwrap_or(entry.quantity),
            price: price.or(entry.price),
            time_in_force: Some(TimeInForce::Gtc),
            reduce_only: entry.reduce_only,
            category: None,
            margin_mode: None,
            extra: Default::default(),
            tags: entry.extra,
        };
        self.place(new_request).await
    }

    pub async fn query(&self, client_order_id: &str) -> Result<OrderResponse> {
        let entry = self
            .tracker
            .get_by_client_id(client_order_id)
            .ok_or_else(|| GatewayError::Internal(format!("unknown client_order_id {client_order_id}")))?;
        Ok(OrderResponse::ok(
            client_order_id.to_string(),
            entry.exchange_order_id.unwrap_or_default(),
        ))
    }

    pub fn shutdown(&self) {
        self.ws_shutdown.store(true, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl Adapter for DexAdapter {
    async fn place(&self, request: OrderRequest) -> Result<OrderResponse> {
        DexAdapter::place(self, request).await
    }

    async fn cancel(&self, client_order_id: &str) -> Result<OrderResponse> {
        DexAdapter::cancel(self, client_order_id).await
    }

    async fn modify(&self, client_order_id: &str, price: Option<String>, quantity: Option<String>) -> Result<OrderResponse> {
        DexAdapter::modify(self, client_order_id, price, quantity).await
    }

    async fn query(&self, client_order_id: &str) -> Result<OrderResponse> {
        DexAdapter::query(self, client_order_id).await
    }
}
