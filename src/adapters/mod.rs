//! Venue adapters (spec §4.9/§4.10): the seam between the gateway dispatch
//! loop and a specific venue's REST/WS machinery. All ownership below an
//! adapter is tree-shaped — `Adapter -> {RestSession, WsSession thread,
//! Tracker, Deduplicator, ExecutionCursor, RateLimiter}` — per spec §9's
//! "no cyclic references" note.

pub mod cex;
pub mod dex;

use crate::error::Result;
use crate::model::{FillData, OrderRequest, OrderUpdate};

/// Callbacks an adapter fires asynchronously from its WS thread, wired by
/// the gateway to its MPSC publisher queue.
pub trait AdapterCallbacks: Send + Sync {
    fn on_order_update(&self, update: OrderUpdate);
    fn on_fill(&self, fill: FillData);
}

/// One venue's synchronous order-management surface.
#[async_trait::async_trait]
pub trait Adapter: Send + Sync {
    async fn place(&self, request: OrderRequest) -> Result<crate::model::OrderResponse>;
    async fn cancel(&self, client_order_id: &str) -> Result<crate::model::OrderResponse>;
    async fn modify(
        &self,
        client_order_id: &str,
        price: Option<String>,
        quantity: Option<String>,
    ) -> Result<crate::model::OrderResponse>;
    async fn query(&self, client_order_id: &str) -> Result<crate::model::OrderResponse>;
}
