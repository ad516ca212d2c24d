//! Credential resolution and the per-venue/per-environment endpoint matrix.
//!
//! Resolves `(api_public, api_secret, use_testnet)` (CEX) or
//! `(user_address, private_key, use_testnet)` (DEX) from a CLI-then-environment
//! precedence list, and looks up REST/WS hosts from a static matrix keyed by
//! `(venue, environment)`. No other module in this crate hard-codes a host.

pub mod credentials;
pub mod endpoints;
pub mod tuning;

pub use credentials::{CliOverrides, CredentialResolver, VenueCredentials};
pub use endpoints::{EndpointMatrix, Environment, VenueEndpoints};
pub use tuning::AdapterTuning;
