//! Optional WS-trading request/response correlation (spec §4.10): the same
//! signed action can be delivered over the private WS with a request id; the
//! adapter correlates the response by id with a configurable timeout and
//! falls back to REST on timeout.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{GatewayError, Result};

pub struct WsPostCorrelator {
    pending: Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>,
    timeout: Duration,
}

impl WsPostCorrelator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Registers a pending request id and waits for its response (or a
    /// timeout). The caller is responsible for actually sending the framed
    /// request over the WS stream after registering.
    pub async fn wait_for(&self, request_id: u64) -> Result<serde_json::Value> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);

        let outcome = tokio::time::timeout(self.timeout, rx).await;
        self.pending.lock().remove(&request_id);

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(GatewayError::WsTransport("ws-post correlator dropped".to_string())),
            Err(_) => Err(GatewayError::WsTransport("ws-post response timed out".to_string())),
        }
    }

    /// Called from the WS read loop when a response frame with a matching
    /// request id arrives. No-ops if nothing is waiting on that id (it may
    /// have already timed out and fallen back to REST).
    pub fn resolve(&self, request_id: u64, response: serde_json::Value) {
        if let Some(tx) = self.pending.lock().remove(&request_id) {
            let _ = tx.send(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_a_waiter_by_request_id() {
        let correlator = std::sync::Arc::new(WsPostCorrelator::new(Duration::from_millis(200)));
        let correlator_clone = correlator.clone();

        let waiter = tokio::spawn(async move { correlator_clone.wait_for(7).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        correlator.resolve(7, serde_json::json!({"ok": true}));

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result["ok"], true);
    }

    #[tokio::test]
    async fn times_out_and_falls_back_when_no_response_arrives() {
        let correlator = WsPostCorrelator::new(Duration::from_millis(20));
        let err = correlator.wait_for(1).await.unwrap_err();
        assert!(matches!(err, GatewayError::WsTransport(_)));
    }
}
