//! The gateway process proper (spec §4.11/§5): binds the ZeroMQ bus, wires
//! the publisher thread and the dispatch loop together, and shuts both down
//! cleanly on Ctrl-C.

pub mod bus;
pub mod dispatch;
pub mod publisher;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use crate::error::Result;
use bus::Bus;
use dispatch::DispatchTable;
use publisher::BusMessage;

/// Ties the bus, dispatch table, and publisher queue together into one
/// runnable unit.
///
/// Adapters and their `GatewayCallbacks` are constructed by the caller (the
/// CLI entrypoint) since their concrete types vary per venue. The caller
/// creates one `mpsc::channel`, hands a clone of the sender to every
/// `GatewayCallbacks` it builds, and passes that same sender plus the
/// receiver here: the sender doubles as the dispatch loop's synchronous
/// `exec.report` outlet, the receiver feeds the publisher thread.
pub struct GatewayService {
    bus: Bus,
    table: DispatchTable,
    publisher_tx: Sender<BusMessage>,
    publisher_rx: Receiver<BusMessage>,
    runtime: tokio::runtime::Runtime,
}

impl GatewayService {
    pub fn new(
        bus: Bus,
        table: DispatchTable,
        publisher_tx: Sender<BusMessage>,
        publisher_rx: Receiver<BusMessage>,
        runtime: tokio::runtime::Runtime,
    ) -> Self {
        Self { bus, table, publisher_tx, publisher_rx, runtime }
    }

    /// Runs until Ctrl-C, then drains in-flight ingress messages and joins
    /// the publisher thread before returning. Blocks the calling thread.
    pub fn run(self) -> Result<()> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let Bus { pull, pub_ } = self.bus;

        let publisher_handle = publisher::spawn_publisher(pub_, self.publisher_rx);

        let signal_shutdown = shutdown.clone();
        let signal_handle = self.runtime.handle().clone();
        std::thread::spawn(move || {
            signal_handle.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("received Ctrl-C, shutting down");
                    signal_shutdown.store(true, Ordering::Relaxed);
                }
            });
        });

        dispatch::run_dispatch_loop(pull, self.table, self.publisher_tx.clone(), &self.runtime, shutdown);

        // Dropping the dispatch loop's sender clone leaves the publisher's
        // `recv()` blocked on any other outstanding senders (one per adapter's
        // `GatewayCallbacks`); those are dropped when the adapters themselves
        // go out of scope in the caller, which closes the channel and lets
        // the publisher thread exit its `while let Ok(..) = rx.recv()` loop.
        drop(self.publisher_tx);
        let _ = publisher_handle.join();
        Ok(())
    }
}
