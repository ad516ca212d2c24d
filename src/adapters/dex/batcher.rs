//! DEX send-queue batching and pacing (spec §4.10): two queues — one for
//! fast time-in-force orders (IOC/GTC), one for post-only (ALO) — each
//! drained by a background thread at a configurable cadence to respect the
//! venue's batch semantics. Deferred entirely while a rate-limit cooldown is
//! active.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::ratelimit::CooldownGate;

pub enum TifClass {
    Fast,
    PostOnly,
}

pub struct PendingSend<T> {
    pub class: TifClass,
    pub payload: T,
}

/// Spawns the drain thread and returns the two queue senders. `drain` is
/// invoked once per dequeued item, from the background thread — callers
/// typically have it issue the signed REST/WS-post request.
pub fn spawn_batcher<T, F>(cadence: Duration, cooldown: Arc<CooldownGate>, drain: F) -> (Sender<T>, Sender<T>)
where
    T: Send + 'static,
    F: Fn(T) + Send + 'static,
{
    let (fast_tx, fast_rx) = mpsc::channel::<T>();
    let (alo_tx, alo_rx) = mpsc::channel::<T>();

    std::thread::spawn(move || {
        drain_loop(cadence, cooldown, fast_rx, alo_rx, drain);
    });

    (fast_tx, alo_tx)
}

fn drain_loop<T, F>(cadence: Duration, cooldown: Arc<CooldownGate>, fast_rx: Receiver<T>, alo_rx: Receiver<T>, drain: F)
where
    F: Fn(T),
{
    loop {
        std::thread::sleep(cadence);
        cooldown.wait_if_active();

        while let Ok(item) = fast_rx.try_recv() {
            drain(item);
        }
        while let Ok(item) = alo_rx.try_recv() {
            drain(item);
        }

        // both senders dropped: nothing left to drain, thread can retire
        if fast_rx_disconnected(&fast_rx) && fast_rx_disconnected(&alo_rx) {
            break;
        }
    }
}

fn fast_rx_disconnected<T>(rx: &Receiver<T>) -> bool {
    matches!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn drains_both_queues_at_the_configured_cadence() {
        let drained = Arc::new(AtomicUsize::new(0));
        let drained_clone = drained.clone();
        let cooldown = Arc::new(CooldownGate::new());

        let (fast_tx, alo_tx) = spawn_batcher(Duration::from_millis(10), cooldown, move |_item: u32| {
            drained_clone.fetch_add(1, Ordering::SeqCst);
        });

        fast_tx.send(1).unwrap();
        alo_tx.send(2).unwrap();

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(drained.load(Ordering::SeqCst), 2);
    }
}
