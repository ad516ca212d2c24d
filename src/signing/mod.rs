//! Venue signers (spec §4.2). Both variants are pure functions of their
//! inputs — no I/O, no shared state — so signature determinism (spec §8
//! property 4) falls out of the type signature rather than needing a test
//! harness to enforce it.

pub mod cex;
pub mod dex;

pub use cex::CexSigner;
pub use dex::{CancelOrderAction, LocalDexSigner, OrderLeg, PlaceOrderAction, Signature, SignerBridge, SubprocessDexSigner};
