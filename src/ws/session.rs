//! Private WebSocket session state machine (spec §4.5).
//!
//! The lifecycle is connect -> authenticate -> subscribe -> one-shot REST
//! catch-up (only right after a *successful* reconnect) -> read loop with
//! ping/pong liveness and quiet-window resubscribe/reconnect thresholds ->
//! jittered exponential backoff -> reconnect, until a shutdown flag is
//! raised. Each venue adapter supplies the venue-specific framing via
//! [`WsHooks`]; this module owns only the reliability machinery.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use socket2::SockRef;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{client_async_tls, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::model::{FillData, OrderUpdate};

/// Either shape of event a venue WS frame can carry, post-parsing.
#[derive(Debug, Clone)]
pub enum WsEvent {
    Order(OrderUpdate),
    Fill(FillData),
}

/// Venue-specific framing glue for the generic [`WsSession`] engine.
///
/// All methods are synchronous — parsing a text frame never itself performs
/// I/O, matching spec §4.5's "parses JSON, routes by topic/channel" step.
pub trait WsHooks: Send + Sync {
    /// The frame sent immediately after the WS handshake completes.
    fn auth_frame(&self) -> Message;

    /// Inspects a frame for the auth acknowledgement. `None` if the frame is
    /// unrelated to auth (e.g. a subscription ack arriving out of order).
    fn is_auth_ack(&self, text: &str) -> Option<bool>;

    /// Frames sent once authentication succeeds (order/execution channels
    /// for a CEX, orderUpdates/userFills/userEvents for a DEX).
    fn subscribe_frames(&self) -> Vec<Message>;

    /// Parses one text frame into zero or more canonical events.
    fn parse_frame(&self, text: &str) -> Vec<WsEvent>;

    /// Whether an event counts toward the "quiet window" liveness check —
    /// a connection ack or subscription response does not reset the quiet
    /// timer, only a genuine order/fill event does.
    fn is_private_event(&self, event: &WsEvent) -> bool {
        matches!(event, WsEvent::Order(_) | WsEvent::Fill(_))
    }
}

#[derive(Debug, Clone)]
pub struct WsSessionConfig {
    pub url: String,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub resubscribe_quiet: Duration,
    pub reconnect_quiet: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

pub struct WsSession {
    config: WsSessionConfig,
    shutdown: Arc<AtomicBool>,
}

type TlsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

impl WsSession {
    pub fn new(config: WsSessionConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self { config, shutdown }
    }

    /// Runs the full reconnect-forever loop until `shutdown` is raised.
    /// `on_event` is invoked for every parsed event; `run_catchup` is invoked
    /// exactly once per successful reconnect, strictly after subscribe.
    pub async fn run<H, OnEvent, Catchup, CatchupFut>(&self, hooks: &H, on_event: OnEvent, run_catchup: Catchup)
    where
        H: WsHooks,
        OnEvent: Fn(WsEvent),
        Catchup: Fn() -> CatchupFut,
        CatchupFut: std::future::Future<Output = ()>,
    {
        let attempt = AtomicU32::new(0);

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.connect_and_run(hooks, &on_event, &run_catchup, &attempt).await {
                Ok(()) => {
                    // clean shutdown requested mid-loop
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt = attempt.load(Ordering::Relaxed), "ws session exited, backing off before reconnect");
                }
            }

            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            let current = attempt.load(Ordering::Relaxed);
            let delay = self.backoff_delay(current);
            attempt.store(current.saturating_add(1), Ordering::Relaxed);
            tokio::time::sleep(delay).await;
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.config.backoff_base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        let capped = exp.min(self.config.backoff_cap);
        let jitter_ms = rand::thread_rng().gen_range(0..=250);
        capped + Duration::from_millis(jitter_ms)
    }

    async fn connect_and_run<H, OnEvent, Catchup, CatchupFut>(
        &self,
        hooks: &H,
        on_event: &OnEvent,
        run_catchup: &Catchup,
        attempt: &AtomicU32,
    ) -> Result<(), tungstenite::Error>
    where
        H: WsHooks,
        OnEvent: Fn(WsEvent),
        Catchup: Fn() -> CatchupFut,
        CatchupFut: std::future::Future<Output = ()>,
    {
        let mut stream = self.connect().await?;

        stream.send(hooks.auth_frame()).await?;
        if !self.wait_for_auth_ack(&mut stream, hooks).await? {
            return Err(tungstenite::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "venue rejected auth frame",
            )));
        }

        for frame in hooks.subscribe_frames() {
            stream.send(frame).await?;
        }

        // Auth + subscribe succeeded: reset the backoff counter (spec §4.5,
        // "Attempt counter resets to zero on successful auth+subscribe"),
        // before catch-up/read_loop run so a later failure backs off from
        // the base delay again rather than the accumulated attempt count.
        attempt.store(0, Ordering::Relaxed);

        run_catchup().await;

        self.read_loop(&mut stream, hooks, on_event).await
    }

    async fn connect(&self) -> Result<TlsStream, tungstenite::Error> {
        let url = Url::parse(&self.config.url).map_err(|e| {
            tungstenite::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
        })?;
        let host = url.host_str().ok_or_else(|| {
            tungstenite::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "ws url has no host",
            ))
        })?;
        let port = url.port_or_known_default().unwrap_or(443);

        let tcp = TcpStream::connect((host, port)).await.map_err(tungstenite::Error::Io)?;
        Self::enable_keepalive(&tcp);

        let (ws_stream, _response) = client_async_tls(self.config.url.as_str(), tcp).await?;
        Ok(ws_stream)
    }

    /// Sets `SO_KEEPALIVE` on the lowest-layer socket, matching spec §4.5's
    /// "TCP keep-alive is enabled on the lowest layer".
    fn enable_keepalive(tcp: &TcpStream) {
        let _ = SockRef::from(tcp).set_keepalive(true);
    }

    async fn wait_for_auth_ack<H: WsHooks>(&self, stream: &mut TlsStream, hooks: &H) -> Result<bool, tungstenite::Error> {
        while let Some(message) = stream.next().await {
            let message = message?;
            if let Message::Text(text) = &message {
                if let Some(ok) = hooks.is_auth_ack(text) {
                    return Ok(ok);
                }
            }
        }
        Ok(false)
    }

    async fn read_loop<H, OnEvent>(
        &self,
        stream: &mut TlsStream,
        hooks: &H,
        on_event: &OnEvent,
    ) -> Result<(), tungstenite::Error>
    where
        H: WsHooks,
        OnEvent: Fn(WsEvent),
    {
        let mut last_rx = Instant::now();
        let mut last_pong = Instant::now();
        let mut last_private_event = Instant::now();
        let mut resubscribed_for_quiet = false;
        let mut ping_tick = tokio::time::interval(self.config.ping_interval);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                let _ = stream
                    .send(Message::Close(Some(CloseFrame {
                        code: tungstenite::protocol::frame::coding::CloseCode::Normal,
                        reason: "shutdown".into(),
                    })))
                    .await;
                return Ok(());
            }

            tokio::select! {
                _ = ping_tick.tick() => {
                    stream.send(Message::Ping(Vec::new())).await?;
                }
                maybe_message = stream.next() => {
                    let message = match maybe_message {
                        Some(m) => m?,
                        None => return Err(tungstenite::Error::ConnectionClosed),
                    };
                    last_rx = Instant::now();
                    match message {
                        Message::Text(text) => {
                            for event in hooks.parse_frame(&text) {
                                if hooks.is_private_event(&event) {
                                    last_private_event = Instant::now();
                                    resubscribed_for_quiet = false;
                                }
                                on_event(event);
                            }
                        }
                        Message::Pong(_) => {
                            last_pong = Instant::now();
                        }
                        Message::Close(_) => {
                            return Err(tungstenite::Error::ConnectionClosed);
                        }
                        _ => {}
                    }
                }
            }

            let liveness_deadline = last_pong.max(last_rx);
            if liveness_deadline.elapsed() > self.config.pong_timeout {
                tracing::warn!("ws health check failed, no data or pong within pong_timeout");
                return Err(tungstenite::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "no data or pong within pong_timeout",
                )));
            }

            let quiet = last_private_event.elapsed();
            if quiet > self.config.reconnect_quiet {
                tracing::warn!("no private event within reconnect_quiet window, forcing reconnect");
                return Err(tungstenite::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "reconnect_quiet window exceeded",
                )));
            }
            if quiet > self.config.resubscribe_quiet && !resubscribed_for_quiet {
                tracing::debug!("no private event within resubscribe_quiet window, resubscribing");
                for frame in hooks.subscribe_frames() {
                    stream.send(frame).await?;
                }
                resubscribed_for_quiet = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_is_capped_and_grows_with_attempt() {
        let session = WsSession::new(
            WsSessionConfig {
                url: "wss://example.invalid/ws".to_string(),
                ping_interval: Duration::from_secs(20),
                pong_timeout: Duration::from_secs(60),
                resubscribe_quiet: Duration::from_secs(30),
                reconnect_quiet: Duration::from_secs(90),
                backoff_base: Duration::from_millis(500),
                backoff_cap: Duration::from_secs(30),
            },
            Arc::new(AtomicBool::new(false)),
        );

        let small = session.backoff_delay(0);
        let large = session.backoff_delay(10);
        assert!(small >= Duration::from_millis(500));
        assert!(large <= Duration::from_secs(30) + Duration::from_millis(250));
    }
}
