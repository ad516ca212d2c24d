//! Client-order-id coercion (spec §4.10): when the upstream client id is not
//! in the venue's required `0x` + 32-hex format, a bijective `cloid_hex` is
//! generated and both directions of the mapping (`cloid_hex <-> upstream_id`,
//! `exchange_oid <-> upstream_id`) are maintained, since fills may reference
//! either one.

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

struct CloidState {
    cloid_to_upstream: HashMap<String, String>,
    upstream_to_cloid: HashMap<String, String>,
    exchange_oid_to_upstream: HashMap<u64, String>,
}

pub struct CloidRegistry {
    state: Mutex<CloidState>,
}

impl Default for CloidRegistry {
    fn default() -> Self {
        Self {
            state: Mutex::new(CloidState {
                cloid_to_upstream: HashMap::new(),
                upstream_to_cloid: HashMap::new(),
                exchange_oid_to_upstream: HashMap::new(),
            }),
        }
    }
}

impl CloidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the venue-valid cloid to use for `upstream_id`, generating one
    /// deterministically-random and registering it if `upstream_id` is not
    /// already in the venue's `0x` + 32-hex format.
    pub fn cloid_for(&self, upstream_id: &str) -> String {
        if is_venue_cloid(upstream_id) {
            return upstream_id.to_string();
        }

        let mut state = self.state.lock();
        if let Some(existing) = state.upstream_to_cloid.get(upstream_id) {
            return existing.clone();
        }

        let cloid = format!("0x{}", Uuid::new_v4().simple());
        state.cloid_to_upstream.insert(cloid.clone(), upstream_id.to_string());
        state.upstream_to_cloid.insert(upstream_id.to_string(), cloid.clone());
        cloid
    }

    pub fn upstream_for_cloid(&self, cloid: &str) -> Option<String> {
        self.state.lock().cloid_to_upstream.get(cloid).cloned()
    }

    pub fn register_exchange_oid(&self, exchange_oid: u64, upstream_id: &str) {
        self.state
            .lock()
            .exchange_oid_to_upstream
            .insert(exchange_oid, upstream_id.to_string());
    }

    pub fn upstream_for_exchange_oid(&self, exchange_oid: u64) -> Option<String> {
        self.state.lock().exchange_oid_to_upstream.get(&exchange_oid).cloned()
    }
}

/// `0x` followed by exactly 32 hex characters, per spec's `cloid` glossary entry.
fn is_venue_cloid(id: &str) -> bool {
    id.len() == 34 && id.starts_with("0x") && id[2..].chars().all(|c| c.is_ascii_hexdigit())
}
