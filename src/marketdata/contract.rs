//! Public market-data republish contract (spec overview, §4.12).
//!
//! The heavy lifting (rolling statistics, L2 book reconstruction) is an
//! external preprocessor's job; this crate's obligation is only the wire
//! contract it publishes under the `md.*` topic namespace.

use serde::{Deserialize, Serialize};

use crate::model::Venue;

/// A normalized top-of-book snapshot, published on `md.tick.<venue>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketTick {
    pub venue: Venue,
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub ts_ns: u64,
}

impl MarketTick {
    /// The PUB topic this tick is framed under, e.g. `md.tick.bybit`.
    pub fn topic(&self) -> String {
        format!("md.tick.{}", venue_topic_segment(self.venue))
    }
}

pub fn venue_topic_segment(venue: Venue) -> &'static str {
    match venue {
        Venue::Bybit => "bybit",
        Venue::Hyperliquid => "hyperliquid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_namespaced_by_venue() {
        let tick = MarketTick {
            venue: Venue::Bybit,
            symbol: "BTC-USDT".to_string(),
            bid: 64999.5,
            ask: 65000.5,
            last: 65000.0,
            ts_ns: 1,
        };
        assert_eq!(tick.topic(), "md.tick.bybit");
    }
}
