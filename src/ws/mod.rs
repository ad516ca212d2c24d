//! Private WebSocket session engine (spec §4.5), generic over a venue-
//! specific [`WsHooks`] implementation.

pub mod session;

pub use session::{WsEvent, WsHooks, WsSession, WsSessionConfig};
