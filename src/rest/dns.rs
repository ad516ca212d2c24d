//! DNS resolution cache with IPv4 preference and stale-on-failure fallback
//! (spec §4.4's "the idiomatic equivalent of connection re-establishment
//! resilience").
//!
//! Venues occasionally return a transient resolution failure from a
//! recursive resolver without the underlying service having moved; retrying
//! resolution on every request would surface that blip as a hard failure, so
//! this cache keeps serving the last good answer until a new one resolves.

use std::net::SocketAddr;

use parking_lot::Mutex;
use tokio::net::lookup_host;

use crate::error::{GatewayError, Result};

pub struct DnsCache {
    last_good: Mutex<Option<Vec<SocketAddr>>>,
}

impl Default for DnsCache {
    fn default() -> Self {
        Self {
            last_good: Mutex::new(None),
        }
    }
}

impl DnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `host:port`, sorting IPv4 addresses before IPv6 (the venues
    /// this crate targets serve TLS on both families, but IPv4 paths are
    /// consistently lower-latency on the networks this gateway runs on). On
    /// resolution failure, falls back to the last successful answer and logs
    /// a warning rather than failing the caller outright.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        match lookup_host((host, port)).await {
            Ok(addrs) => {
                let mut sorted: Vec<SocketAddr> = addrs.collect();
                sorted.sort_by_key(|addr| !addr.is_ipv4());
                if sorted.is_empty() {
                    return Err(GatewayError::Dns(format!("no addresses for {host}:{port}")));
                }
                *self.last_good.lock() = Some(sorted.clone());
                Ok(sorted)
            }
            Err(e) => {
                let fallback = self.last_good.lock().clone();
                match fallback {
                    Some(addrs) => {
                        tracing::warn!(
                            host,
                            port,
                            error = %e,
                            "dns resolution failed, serving last known-good addresses"
                        );
                        Ok(addrs)
                    }
                    None => Err(GatewayError::Dns(format!("{host}:{port}: {e}"))),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_localhost_and_prefers_ipv4() {
        let cache = DnsCache::new();
        let addrs = cache.resolve("localhost", 8080).await.unwrap();
        assert!(!addrs.is_empty());
        if addrs.len() > 1 {
            assert!(addrs[0].is_ipv4(), "ipv4 addresses should sort first");
        }
    }

    #[tokio::test]
    async fn falls_back_to_last_good_on_resolution_failure() {
        let cache = DnsCache::new();
        let first = cache.resolve("localhost", 1).await.unwrap();

        let second = cache
            .resolve("this-host-does-not-exist.invalid", 1)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
