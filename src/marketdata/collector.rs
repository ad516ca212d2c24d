//! Public market-data collectors (spec overview, §4.12).
//!
//! Each collector subscribes to one venue's public ticker channel and
//! forwards [`MarketTick`]s onto the gateway's publisher queue. The
//! reconnect/backoff shape mirrors [`crate::ws::session::WsSession`] (spec
//! §4.5) rather than extending it: that engine's `WsHooks` trait is wired to
//! `WsEvent::{Order,Fill}`, which a ticker stream has no use for, and adding a
//! third variant nothing else in the crate needs would widen that seam for
//! one caller. No rolling statistics or order-book reconstruction happens
//! here — that remains the external preprocessor's job, per the Non-goal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::gateway::publisher::BusMessage;
use crate::marketdata::contract::MarketTick;
use crate::model::Venue;

/// One venue's public-ticker collector.
#[async_trait::async_trait]
pub trait MarketDataCollector: Send + Sync {
    fn venue(&self) -> Venue;

    /// Runs the reconnect-forever loop until `shutdown` is raised.
    async fn run(&self, shutdown: Arc<AtomicBool>);
}

fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exp = base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    let capped = exp.min(cap);
    let jitter_ms = rand::thread_rng().gen_range(0..=250);
    capped + Duration::from_millis(jitter_ms)
}

/// Bybit public ticker collector: subscribes to `tickers.<symbol>` for each
/// configured symbol on the venue's public WS endpoint.
pub struct BybitTickerCollector {
    ws_url: String,
    symbols: Vec<String>,
    publisher_tx: Sender<BusMessage>,
}

impl BybitTickerCollector {
    pub fn new(ws_url: String, symbols: Vec<String>, publisher_tx: Sender<BusMessage>) -> Self {
        Self {
            ws_url,
            symbols,
            publisher_tx,
        }
    }

    fn parse_tick(&self, text: &str) -> Option<MarketTick> {
        let value: Value = serde_json::from_str(text).ok()?;
        let topic = value.get("topic")?.as_str()?;
        if !topic.starts_with("tickers.") {
            return None;
        }
        let data = value.get("data")?;
        let symbol = topic.trim_start_matches("tickers.").to_string();
        let bid = data.get("bid1Price")?.as_str()?.parse().ok()?;
        let ask = data.get("ask1Price")?.as_str()?.parse().ok()?;
        let last = data.get("lastPrice")?.as_str()?.parse().ok()?;
        let ts_ns = value
            .get("ts")
            .and_then(|v| v.as_u64())
            .map(|ms| ms * 1_000_000)
            .unwrap_or(0);

        Some(MarketTick {
            venue: Venue::Bybit,
            symbol,
            bid,
            ask,
            last,
            ts_ns,
        })
    }
}

#[async_trait::async_trait]
impl MarketDataCollector for BybitTickerCollector {
    fn venue(&self) -> Venue {
        Venue::Bybit
    }

    async fn run(&self, shutdown: Arc<AtomicBool>) {
        let mut attempt: u32 = 0;
        while !shutdown.load(Ordering::Relaxed) {
            match self.connect_and_stream(&shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(error = %e, venue = "bybit", "market-data collector disconnected");
                }
            }
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let delay = backoff_delay(attempt, Duration::from_millis(500), Duration::from_secs(30));
            attempt = attempt.saturating_add(1);
            tokio::time::sleep(delay).await;
        }
    }
}

impl BybitTickerCollector {
    async fn connect_and_stream(&self, shutdown: &Arc<AtomicBool>) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        use futures_util::SinkExt;

        let (mut stream, _response) = tokio_tungstenite::connect_async(&self.ws_url).await?;
        let args: Vec<String> = self.symbols.iter().map(|s| format!("tickers.{s}")).collect();
        let subscribe = serde_json::json!({"op": "subscribe", "args": args});
        stream.send(Message::Text(subscribe.to_string())).await?;

        while let Some(message) = stream.next().await {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
            if let Message::Text(text) = message? {
                if let Some(tick) = self.parse_tick(&text) {
                    let _ = self.publisher_tx.send(BusMessage::MarketTick(tick));
                }
            }
        }
        Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
    }
}

/// Hyperliquid public best-bid-offer collector: subscribes to the `bbo`
/// channel for each configured coin.
pub struct HyperliquidBboCollector {
    ws_url: String,
    coins: Vec<String>,
    publisher_tx: Sender<BusMessage>,
}

impl HyperliquidBboCollector {
    pub fn new(ws_url: String, coins: Vec<String>, publisher_tx: Sender<BusMessage>) -> Self {
        Self {
            ws_url,
            coins,
            publisher_tx,
        }
    }

    fn parse_tick(&self, text: &str) -> Option<MarketTick> {
        let value: Value = serde_json::from_str(text).ok()?;
        if value.get("channel")?.as_str()? != "bbo" {
            return None;
        }
        let data = value.get("data")?;
        let symbol = data.get("coin")?.as_str()?.to_string();
        let levels = data.get("bbo")?.as_array()?;
        let bid: f64 = levels.first()?.get("px")?.as_str()?.parse().ok()?;
        let ask: f64 = levels.get(1)?.get("px")?.as_str()?.parse().ok()?;
        let ts_ns = data.get("time").and_then(|v| v.as_u64()).map(|ms| ms * 1_000_000).unwrap_or(0);

        Some(MarketTick {
            venue: Venue::Hyperliquid,
            symbol,
            bid,
            ask,
            last: (bid + ask) / 2.0,
            ts_ns,
        })
    }
}

#[async_trait::async_trait]
impl MarketDataCollector for HyperliquidBboCollector {
    fn venue(&self) -> Venue {
        Venue::Hyperliquid
    }

    async fn run(&self, shutdown: Arc<AtomicBool>) {
        let mut attempt: u32 = 0;
        while !shutdown.load(Ordering::Relaxed) {
            match self.connect_and_stream(&shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(error = %e, venue = "hyperliquid", "market-data collector disconnected");
                }
            }
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let delay = backoff_delay(attempt, Duration::from_millis(500), Duration::from_secs(30));
            attempt = attempt.saturating_add(1);
            tokio::time::sleep(delay).await;
        }
    }
}

impl HyperliquidBboCollector {
    async fn connect_and_stream(&self, shutdown: &Arc<AtomicBool>) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        use futures_util::SinkExt;

        let (mut stream, _response) = tokio_tungstenite::connect_async(&self.ws_url).await?;
        for coin in &self.coins {
            let subscribe = serde_json::json!({"method": "subscribe", "subscription": {"type": "bbo", "coin": coin}});
            stream.send(Message::Text(subscribe.to_string())).await?;
        }

        while let Some(message) = stream.next().await {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
            if let Message::Text(text) = message? {
                if let Some(tick) = self.parse_tick(&text) {
                    let _ = self.publisher_tx.send(BusMessage::MarketTick(tick));
                }
            }
        }
        Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bybit_parses_ticker_frame_into_market_tick() {
        let (tx, _rx) = std::sync::mpsc::channel();
        let collector = BybitTickerCollector::new("wss://example.invalid".to_string(), vec!["BTCUSDT".to_string()], tx);
        let frame = serde_json::json!({
            "topic": "tickers.BTCUSDT",
            "ts": 1700000000000u64,
            "data": {"bid1Price": "64999.5", "ask1Price": "65000.5", "lastPrice": "65000"}
        })
        .to_string();

        let tick = collector.parse_tick(&frame).unwrap();
        assert_eq!(tick.symbol, "BTCUSDT");
        assert_eq!(tick.bid, 64999.5);
        assert_eq!(tick.ts_ns, 1_700_000_000_000_000_000);
    }

    #[test]
    fn hyperliquid_parses_bbo_frame_into_market_tick() {
        let (tx, _rx) = std::sync::mpsc::channel();
        let collector = HyperliquidBboCollector::new("wss://example.invalid".to_string(), vec!["BTC".to_string()], tx);
        let frame = serde_json::json!({
            "channel": "bbo",
            "data": {"coin": "BTC", "time": 1700000000000u64, "bbo": [{"px": "64999.5"}, {"px": "65000.5"}]}
        })
        .to_string();

        let tick = collector.parse_tick(&frame).unwrap();
        assert_eq!(tick.symbol, "BTC");
        assert_eq!(tick.last, 65000.0);
    }
}
