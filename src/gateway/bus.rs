//! ZeroMQ transport setup (spec §5): one PULL socket for ingress, one PUB
//! socket for egress, both owned by a single `zmq::Context` for the process
//! lifetime.

use crate::error::{GatewayError, Result};

/// The two sockets the gateway binds at startup.
pub struct Bus {
    pub pull: zmq::Socket,
    pub pub_: zmq::Socket,
}

/// Binds the PULL (ingress) and PUB (egress) sockets at the given addresses,
/// e.g. `tcp://127.0.0.1:5555` / `tcp://127.0.0.1:5556`.
pub fn bind(context: &zmq::Context, pull_addr: &str, pub_addr: &str) -> Result<Bus> {
    let pull = context.socket(zmq::PULL).map_err(GatewayError::Zmq)?;
    pull.bind(pull_addr).map_err(GatewayError::Zmq)?;

    let pub_ = context.socket(zmq::PUB).map_err(GatewayError::Zmq)?;
    pub_.bind(pub_addr).map_err(GatewayError::Zmq)?;

    tracing::info!(pull_addr, pub_addr, "bound ZeroMQ ingress/egress sockets");
    Ok(Bus { pull, pub_ })
}
