//! The per-venue, per-environment endpoint matrix (spec §4.1).
//!
//! `EndpointMatrix` is the single source of truth for REST/WS hosts. Every
//! other module receives a resolved [`VenueEndpoints`] rather than a literal
//! string, so no host is hard-coded outside this file.

use std::collections::HashMap;

use crate::error::{GatewayError, Result};
use crate::model::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Mainnet,
    Testnet,
    /// Some venues (Bybit) additionally expose a demo-trading environment.
    Demo,
}

#[derive(Debug, Clone)]
pub struct VenueEndpoints {
    pub rest_host: String,
    pub rest_port: u16,
    pub ws_host: String,
    pub ws_port: u16,
    pub ws_path: String,
}

impl VenueEndpoints {
    pub fn rest_base_url(&self) -> String {
        format!("https://{}:{}", self.rest_host, self.rest_port)
    }

    pub fn ws_url(&self) -> String {
        format!("wss://{}:{}{}", self.ws_host, self.ws_port, self.ws_path)
    }
}

pub struct EndpointMatrix {
    table: HashMap<(Venue, Environment), VenueEndpoints>,
}

impl Default for EndpointMatrix {
    fn default() -> Self {
        let mut table = HashMap::new();

        table.insert(
            (Venue::Bybit, Environment::Mainnet),
            VenueEndpoints {
                rest_host: "api.bybit.com".to_string(),
                rest_port: 443,
                ws_host: "stream.bybit.com".to_string(),
                ws_port: 443,
                ws_path: "/v5/private".to_string(),
            },
        );
        table.insert(
            (Venue::Bybit, Environment::Testnet),
            VenueEndpoints {
                rest_host: "api-testnet.bybit.com".to_string(),
                rest_port: 443,
                ws_host: "stream-testnet.bybit.com".to_string(),
                ws_port: 443,
                ws_path: "/v5/private".to_string(),
            },
        );
        table.insert(
            (Venue::Bybit, Environment::Demo),
            VenueEndpoints {
                rest_host: "api-demo.bybit.com".to_string(),
                rest_port: 443,
                ws_host: "stream-demo.bybit.com".to_string(),
                ws_port: 443,
                ws_path: "/v5/private".to_string(),
            },
        );
        table.insert(
            (Venue::Hyperliquid, Environment::Mainnet),
            VenueEndpoints {
                rest_host: "api.hyperliquid.xyz".to_string(),
                rest_port: 443,
                ws_host: "api.hyperliquid.xyz".to_string(),
                ws_port: 443,
                ws_path: "/ws".to_string(),
            },
        );
        table.insert(
            (Venue::Hyperliquid, Environment::Testnet),
            VenueEndpoints {
                rest_host: "api.hyperliquid-testnet.xyz".to_string(),
                rest_port: 443,
                ws_host: "api.hyperliquid-testnet.xyz".to_string(),
                ws_port: 443,
                ws_path: "/ws".to_string(),
            },
        );

        Self { table }
    }
}

impl EndpointMatrix {
    pub fn resolve(&self, venue: Venue, env: Environment) -> Result<VenueEndpoints> {
        self.table
            .get(&(venue, env))
            .cloned()
            .ok_or_else(|| {
                GatewayError::Config(format!("no endpoints registered for {venue:?}/{env:?}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_venue_environment_pairs() {
        let matrix = EndpointMatrix::default();
        let ep = matrix.resolve(Venue::Bybit, Environment::Testnet).unwrap();
        assert_eq!(ep.rest_host, "api-testnet.bybit.com");
        assert_eq!(ep.ws_path, "/v5/private");
    }

    #[test]
    fn unknown_pair_is_a_config_error() {
        let matrix = EndpointMatrix::default();
        let err = matrix.resolve(Venue::Hyperliquid, Environment::Demo).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }
}
