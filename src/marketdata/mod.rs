//! Public market-data republish contract (spec overview, §4.12). This
//! crate's obligation stops at the publish-side contract: normalizing and
//! forwarding ticks onto `md.*` topics. Rolling statistics and L2 book
//! reconstruction are the external preprocessor's job, not this crate's.

pub mod collector;
pub mod contract;

pub use collector::{BybitTickerCollector, HyperliquidBboCollector, MarketDataCollector};
pub use contract::MarketTick;
