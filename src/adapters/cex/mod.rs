//! Bybit-shaped CEX adapter (spec §4.9): composes the signer, rate limiter,
//! REST session, WS session and tracker into the venue's `Adapter` surface.

pub mod rest;
pub mod status;
pub mod symbols;
pub mod ws;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secrecy::Secret;

use crate::adapters::cex::rest::CexRestClient;
use crate::adapters::cex::symbols::SymbolTable;
use crate::adapters::cex::ws::CexWsHooks;
use crate::adapters::{Adapter, AdapterCallbacks};
use crate::cursor::ExecutionCursor;
use crate::dedup::Deduplicator;
use crate::error::{GatewayError, Result};
use crate::model::{Category, OrderRequest, OrderResponse};
use crate::ratelimit::{CooldownGate, RateLimiter};
use crate::rest::RestSession;
use crate::tracker::{OrderTracker, TrackerEntry};
use crate::ws::{WsSession, WsSessionConfig};

/// `exec_id` capacity shared by the WS and REST catch-up paths. Sized at the
/// catch-up path's larger burst since one instance backs both — see
/// DESIGN.md.
const DEDUP_CAPACITY: usize = 50_000;

/// Categories fanned out over during open-order/execution catch-up, per
/// spec §4.9's "issues a set of venue-valid category... queries".
const CATCHUP_CATEGORIES: [Category; 3] = [Category::Linear, Category::Spot, Category::Inverse];

pub struct CexAdapter {
    rest: Arc<CexRestClient>,
    tracker: Arc<OrderTracker>,
    symbols: Arc<SymbolTable>,
    ws_shutdown: Arc<AtomicBool>,
}

impl CexAdapter {
    pub fn new(
        rest_base_url: String,
        ws_url: String,
        api_key: String,
        api_secret: Secret<String>,
        callbacks: Arc<dyn AdapterCallbacks>,
    ) -> Result<Self> {
        let rate_limiter = Arc::new(RateLimiter::new(Duration::from_secs(5), 120));
        let cooldown_gate = Arc::new(CooldownGate::new());
        let rest_session = RestSession::new(rest_base_url, rate_limiter, cooldown_gate, Duration::from_secs(10))?;
        let rest = Arc::new(CexRestClient::new(rest_session, api_key.clone(), api_secret.clone()));

        let symbols = Arc::new(SymbolTable::default());
        let tracker = Arc::new(OrderTracker::new());
        let dedup = Arc::new(Deduplicator::new(DEDUP_CAPACITY));
        let cursor = Arc::new(ExecutionCursor::new());
        let ws_shutdown = Arc::new(AtomicBool::new(false));

        Self::spawn_ws_thread(
            ws_url,
            api_key,
            api_secret,
            symbols.clone(),
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
            symbols,
            ws_shutdown,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_ws_thread(
        ws_url: String,
        api_key: String,
        api_secret: Secret<String>,
        symbols: Arc<SymbolTable>,
        dedup: Arc<Deduplicator>,
        cursor: Arc<ExecutionCursor>,
        rest: Arc<CexRestClient>,
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
                let hooks = CexWsHooks::new(api_key, api_secret, symbols, dedup, cursor.clone());
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
                        || Self::run_catchup(&rest, &hooks, &cursor, &catchup_tracker, catchup_callbacks.as_ref()),
                    )
                    .await;
            });
        });
    }

    /// One-shot REST catch-up (spec §4.5 step 5): snapshots open orders and
    /// fetches executions since the execution-time cursor, fanned out over
    /// every venue category. Invoked strictly once per successful reconnect,
    /// never on a failed-attempt retry — that gating lives in `WsSession`.
    async fn run_catchup(
        rest: &CexRestClient,
        hooks: &CexWsHooks,
        cursor: &ExecutionCursor,
        tracker: &OrderTracker,
        callbacks: &dyn AdapterCallbacks,
    ) {
        for category in CATCHUP_CATEGORIES {
            match rest.list_open_orders(category).await {
                Ok(orders) => {
                    for item in &orders {
                        if let Some(crate::ws::WsEvent::Order(update)) = hooks.parse_order(item) {
                            tracker.apply_update(&update);
                            callbacks.on_order_update(update);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, ?category, "catch-up open-orders listing failed"),
            }
        }

        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock is after the unix epoch")
            .as_millis() as u64;
        let since = cursor.since_or_default(now_ms);

        for category in CATCHUP_CATEGORIES {
            match rest.list_executions(category, since).await {
                Ok(executions) => {
                    for item in &executions {
                        if let Some(crate::ws::WsEvent::Fill(fill)) = hooks.parse_fill(item) {
                            callbacks.on_fill(fill);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, ?category, "catch-up execution listing failed"),
            }
        }
    }

    pub async fn place(&self, native_symbol: String, category: Category, request: OrderRequest) -> Result<OrderResponse> {
        self.tracker.start_tracking(TrackerEntry {
            client_order_id: request.client_order_id.clone(),
            exchange_order_id: None,
            category: Some(category),
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price.clone(),
            quantity: request.quantity.clone(),
            reduce_only: request.reduce_only,
            margin_mode: request.margin_mode,
            status: crate::model::OrderStatus::New,
            extra: request.tags.clone(),
        });

        let response = self.rest.place_order(&native_symbol, &request).await?;
        let ret_code = response.get("retCode").and_then(|v| v.as_i64()).unwrap_or(-1);
        if ret_code != 0 {
            let message = response
                .get("retMsg")
                .and_then(|v| v.as_str())
                .unwrap_or("venue rejected order")
                .to_string();
            return Ok(OrderResponse::failed(request.client_order_id, message));
        }

        let exchange_order_id = response
            .get("result")
            .and_then(|r| r.get("orderId"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::Internal("place response missing orderId".to_string()))?;

        self.tracker.backfill_exchange_id(&request.client_order_id, exchange_order_id);
        Ok(OrderResponse::ok(request.client_order_id, exchange_order_id))
    }

    pub async fn cancel(&self, client_order_id: &str) -> Result<OrderResponse> {
        let entry = self
            .tracker
            .get_by_client_id(client_order_id)
            .ok_or_else(|| GatewayError::Internal(format!("unknown client_order_id {client_order_id}")))?;
        let native_symbol = self.symbols.to_native(&entry.symbol, entry.category)?;

        let response = self
            .rest
            .cancel_order(&native_symbol, entry.category, client_order_id)
            .await?;
        let ret_code = response.get("retCode").and_then(|v| v.as_i64()).unwrap_or(-1);
        if ret_code != 0 {
            let message = response
                .get("retMsg")
                .and_then(|v| v.as_str())
                .unwrap_or("venue rejected cancel")
                .to_string();
            // A cancel of an already-canceled order is not an error (spec §8).
            if message.to_lowercase().contains("order not exists") || message.to_lowercase().contains("already cancel") {
                return Ok(OrderResponse::ok(client_order_id.to_string(), entry.exchange_order_id.unwrap_or_default()));
            }
            return Ok(OrderResponse::failed(client_order_id.to_string(), message));
        }

        Ok(OrderResponse::ok(
            client_order_id.to_string(),
            entry.exchange_order_id.unwrap_or_default(),
        ))
    }

    pub async fn modify(&self, client_order_id: &str, price: Option<String>, quantity: Option<String>) -> Result<OrderResponse> {
        let entry = self
            .tracker
            .get_by_client_id(client_order_id)
            .ok_or_else(|| GatewayError::Internal(format!("unknown client_order_id {client_order_id}")))?;
        let native_symbol = self.symbols.to_native(&entry.symbol, entry.category)?;

        let response = self
            .rest
            .modify_order(&native_symbol, entry.category, client_order_id, price.as_deref(), quantity.as_deref())
            .await?;
        let ret_code = response.get("retCode").and_then(|v| v.as_i64()).unwrap_or(-1);
        if ret_code != 0 {
            let message = response
                .get("retMsg")
                .and_then(|v| v.as_str())
                .unwrap_or("venue rejected amend")
                .to_string();
            return Ok(OrderResponse::failed(client_order_id.to_string(), message));
        }

        Ok(OrderResponse::ok(
            client_order_id.to_string(),
            entry.exchange_order_id.unwrap_or_default(),
        ))
    }

    pub async fn query(&self, client_order_id: &str) -> Result<OrderResponse> {
        let entry = self
            .tracker
            .get_by_client_id(client_order_id)
            .ok_or_else(|| GatewayError::Internal(format!("unknown client_order_id {client_order_id}")))?;
        let native_symbol = self.symbols.to_native(&entry.symbol, entry.category)?;

        let response = self.rest.query_order(&native_symbol, entry.category, client_order_id).await?;
        let mut resp = OrderResponse::ok(client_order_id.to_string(), entry.exchange_order_id.unwrap_or_default());
        resp.extra.insert("raw".to_string(), response.to_string());
        Ok(resp)
    }

    pub fn shutdown(&self) {
        self.ws_shutdown.store(true, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl Adapter for CexAdapter {
    async fn place(&self, request: OrderRequest) -> Result<OrderResponse> {
        let category = request.category.unwrap_or(Category::Linear);
        let native_symbol = self.symbols.to_native(&request.symbol, Some(category))?;
        CexAdapter::place(self, native_symbol, category, request).await
    }

    async fn cancel(&self, client_order_id: &str) -> Result<OrderResponse> {
        CexAdapter::cancel(self, client_order_id).await
    }

    async fn modify(&self, client_order_id: &str, price: Option<String>, quantity: Option<String>) -> Result<OrderResponse> {
        CexAdapter::modify(self, client_order_id, price, quantity).await
    }

    async fn query(&self, client_order_id: &str) -> Result<OrderResponse> {
        CexAdapter::query(self, client_order_id).await
    }
}
