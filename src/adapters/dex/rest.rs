//! Hyperliquid-shaped DEX REST transport (spec §4.10): signs an action
//! through the shared [`SignerBridge`] and posts the `{action, nonce,
//! signature, vaultAddress}` envelope via the shared [`RestSession`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;

use crate::error::{GatewayError, Result};
use crate::rest::RestSession;
use crate::signing::{CancelOrderAction, OrderLeg, PlaceOrderAction, SignerBridge};

/// Monotonic millisecond nonce, unique across requests from one signer
/// (spec §4.10). Backed by an atomic max-with-now so concurrent callers
/// never reuse or reorder a nonce.
pub struct NonceGenerator {
    last: AtomicU64,
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self { last: AtomicU64::new(0) }
    }
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is after the unix epoch")
            .as_millis() as u64;

        let mut prior = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(prior + 1);
            match self
                .last
                .compare_exchange_weak(prior, candidate, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(observed) => prior = observed,
            }
        }
    }
}

pub struct DexRestClient {
    session: RestSession,
    signer: Arc<dyn SignerBridge>,
    nonce: NonceGenerator,
    vault_address: Option<String>,
}

impl DexRestClient {
    pub fn new(session: RestSession, signer: Arc<dyn SignerBridge>, vault_address: Option<String>) -> Self {
        Self {
            session,
            signer,
            nonce: NonceGenerator::new(),
            vault_address,
        }
    }

    pub async fn place_order(&self, leg: OrderLeg) -> Result<serde_json::Value> {
        let nonce = self.nonce.next();
        let action = PlaceOrderAction { orders: vec![leg] };
        let (signature, action_json) = self
            .signer
            .sign_order(&action, nonce, self.vault_address.as_deref())
            .await?;

        let envelope = json!({
            "action": action_json,
            "nonce": nonce,
            "signature": {"r": signature.r, "s": signature.s, "v": signature.v},
            "vaultAddress": self.vault_address,
        });

        let body = envelope.to_string();
        let response = self
            .session
            .perform(reqwest::Method::POST, "/exchange", vec![("Content-Type".to_string(), "application/json".to_string())], Some(body))
            .await?;
        serde_json::from_str(&response).map_err(GatewayError::Json)
    }

    pub async fn cancel_order(&self, asset: u32, exchange_oid: u64) -> Result<serde_json::Value> {
        let nonce = self.nonce.next();
        let action = CancelOrderAction {
            cancels: vec![(asset, exchange_oid)],
        };
        let (signature, action_json) = self.signer.sign_cancel(&action, nonce).await?;

        let envelope = json!({
            "action": action_json,
            "nonce": nonce,
            "signature": {"r": signature.r, "s": signature.s, "v": signature.v},
            "vaultAddress": self.vault_address,
        });

        let body = envelope.to_string();
        let response = self
            .session
            .perform(reqwest::Method::POST, "/exchange", vec![("Content-Type".to_string(), "application/json".to_string())], Some(body))
            .await?;
        serde_json::from_str(&response).map_err(GatewayError::Json)
    }

    pub async fn open_orders(&self, user_address: &str) -> Result<serde_json::Value> {
        let body = json!({"type": "openOrders", "user": user_address}).to_string();
        let response = self
            .session
            .perform(reqwest::Method::POST, "/info", vec![("Content-Type".to_string(), "application/json".to_string())], Some(body))
            .await?;
        serde_json::from_str(&response).map_err(GatewayError::Json)
    }

    pub async fn user_fills_since(&self, user_address: &str, start_time_ms: u64) -> Result<serde_json::Value> {
        let body = json!({"type": "userFillsByTime", "user": user_address, "startTime": start_time_ms}).to_string();
        let response = self
            .session
            .perform(reqwest::Method::POST, "/info", vec![("Content-Type".to_string(), "application/json".to_string())], Some(body))
            .await?;
        serde_json::from_str(&response).map_err(GatewayError::Json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_generator_is_monotonic_under_repeated_calls() {
        let gen = NonceGenerator::new();
        let first = gen.next();
        let second = gen.next();
        assert!(second > first);
    }
}
