//! Order tracker (spec §4.6): the in-memory record of every order this
//! gateway has placed, keyed by client order id with a secondary index by
//! exchange order id.
//!
//! Both maps live under one `parking_lot::Mutex` rather than two, so
//! `start_tracking`, `backfill_exchange_id`, and the secondary-index update
//! are atomic together — spec §4.6 requires the secondary index be
//! "maintained under the same mutex" as the primary map, which a two-mutex
//! design could not guarantee without external lock ordering.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::{Category, MarginMode, OrderStatus, OrderUpdate, Side};

/// Everything the tracker needs to service a cancel without a round-trip to
/// the venue: a cancel request only carries `client_order_id`, so the
/// tracker must be able to supply `category`/`symbol` on its own.
#[derive(Debug, Clone)]
pub struct TrackerEntry {
    pub client_order_id: String,
    pub exchange_order_id: Option<String>,
    pub category: Option<Category>,
    pub symbol: String,
    pub side: Side,
    pub price: Option<String>,
    pub quantity: String,
    pub reduce_only: bool,
    pub margin_mode: Option<MarginMode>,
    pub status: OrderStatus,
    pub extra: HashMap<String, String>,
}

struct TrackerState {
    by_client_id: HashMap<String, TrackerEntry>,
    by_exchange_id: HashMap<String, String>,
}

pub struct OrderTracker {
    state: Mutex<TrackerState>,
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                by_client_id: HashMap::new(),
                by_exchange_id: HashMap::new(),
            }),
        }
    }
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new entry. Called before the outbound REST POST so a
    /// racing WS event can match against it; panics if the key is already
    /// present, since that would indicate a client-order-id collision the
    /// caller should have prevented upstream.
    pub fn start_tracking(&self, entry: TrackerEntry) {
        let mut state = self.state.lock();
        assert!(
            !state.by_client_id.contains_key(&entry.client_order_id),
            "client_order_id {} is already tracked",
            entry.client_order_id
        );
        if let Some(exchange_id) = &entry.exchange_order_id {
            state
                .by_exchange_id
                .insert(exchange_id.clone(), entry.client_order_id.clone());
        }
        state.by_client_id.insert(entry.client_order_id.clone(), entry);
    }

    /// Idempotent: sets `exchange_order_id` if it was absent, or no-ops if
    /// it was already set to the same value. A REST response that arrives
    /// after a WS fill has already backfilled the same id is the common case
    /// this guards against.
    pub fn backfill_exchange_id(&self, client_order_id: &str, exchange_order_id: &str) {
        let mut state = self.state.lock();
        if let Some(entry) = state.by_client_id.get_mut(client_order_id) {
            match &entry.exchange_order_id {
                Some(existing) if existing == exchange_order_id => return,
                Some(_) => return,
                None => {
                    entry.exchange_order_id = Some(exchange_order_id.to_string());
                }
            }
        } else {
            return;
        }
        state
            .by_exchange_id
            .insert(exchange_order_id.to_string(), client_order_id.to_string());
    }

    pub fn get_by_client_id(&self, client_order_id: &str) -> Option<TrackerEntry> {
        self.state.lock().by_client_id.get(client_order_id).cloned()
    }

    pub fn get_by_exchange_id(&self, exchange_order_id: &str) -> Option<TrackerEntry> {
        let state = self.state.lock();
        let client_id = state.by_exchange_id.get(exchange_order_id)?;
        state.by_client_id.get(client_id).cloned()
    }

    /// Applies a status/reason update, returning the prior status for
    /// transition logic. Removes the entry (from both maps) once the new
    /// status is terminal, since a terminal order has nothing left to track.
    pub fn apply_update(&self, update: &OrderUpdate) -> Option<OrderStatus> {
        let mut state = self.state.lock();
        let prior = {
            let entry = state.by_client_id.get_mut(&update.client_order_id)?;
            let prior = entry.status;
            entry.status = update.status;
            if let Some(exchange_id) = &update.exchange_order_id {
                entry.exchange_order_id = Some(exchange_id.clone());
            }
            prior
        };

        if update.status.is_terminal() {
            if let Some(entry) = state.by_client_id.remove(&update.client_order_id) {
                if let Some(exchange_id) = entry.exchange_order_id {
                    state.by_exchange_id.remove(&exchange_id);
                }
            }
        } else if let Some(exchange_id) = &update.exchange_order_id {
            state
                .by_exchange_id
                .insert(exchange_id.clone(), update.client_order_id.clone());
        }

        Some(prior)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(client_order_id: &str) -> TrackerEntry {
        TrackerEntry {
            client_order_id: client_order_id.to_string(),
            exchange_order_id: None,
            category: Some(Category::Linear),
            symbol: "BTC-USDT-PERP".to_string(),
            side: Side::Buy,
            price: Some("65000".to_string()),
            quantity: "0.01".to_string(),
            reduce_only: false,
            margin_mode: None,
            status: OrderStatus::New,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn start_tracking_then_get_by_client_id_round_trips() {
        let tracker = OrderTracker::new();
        tracker.start_tracking(entry("c-1"));
        let found = tracker.get_by_client_id("c-1").unwrap();
        assert_eq!(found.symbol, "BTC-USDT-PERP");
    }

    #[test]
    #[should_panic]
    fn start_tracking_twice_with_same_id_panics() {
        let tracker = OrderTracker::new();
        tracker.start_tracking(entry("c-1"));
        tracker.start_tracking(entry("c-1"));
    }

    #[test]
    fn backfill_exchange_id_is_idempotent_and_populates_secondary_index() {
        let tracker = OrderTracker::new();
        tracker.start_tracking(entry("c-1"));
        tracker.backfill_exchange_id("c-1", "e-1");
        tracker.backfill_exchange_id("c-1", "e-1");

        let found = tracker.get_by_exchange_id("e-1").unwrap();
        assert_eq!(found.client_order_id, "c-1");
    }

    #[test]
    fn apply_update_returns_prior_status_and_removes_on_terminal() {
        let tracker = OrderTracker::new();
        tracker.start_tracking(entry("c-1"));
        tracker.backfill_exchange_id("c-1", "e-1");

        let prior = tracker
            .apply_update(&OrderUpdate {
                client_order_id: "c-1".to_string(),
                exchange_order_id: Some("e-1".to_string()),
                status: OrderStatus::Filled,
                reason: None,
                timestamp_ms: 1,
            })
            .unwrap();

        assert_eq!(prior, OrderStatus::New);
        assert!(tracker.get_by_client_id("c-1").is_none());
        assert!(tracker.get_by_exchange_id("e-1").is_none());
    }
}
