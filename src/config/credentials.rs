//! Per-venue credential resolution.
//!
//! Mirrors the teacher crate's `KiteCredentials`: secrets are wrapped in
//! [`secrecy::Secret`] so they don't leak into `Debug`/log output, and
//! [`CredentialResolver::resolve`] applies the CLI-then-environment
//! precedence described in spec §4.1 and §6.
//!
//! # Environment variables
//!
//! - `LATENTSPEED_<VENUE>_API_KEY` / `LATENTSPEED_<VENUE>_API_SECRET` (CEX)
//! - `LATENTSPEED_<VENUE>_USER_ADDRESS` / `LATENTSPEED_<VENUE>_PRIVATE_KEY` (DEX)
//! - `LATENTSPEED_<VENUE>_USE_TESTNET` (`0`/`1`, either venue type)

use secrecy::Secret;

use crate::error::{GatewayError, Result};
use crate::model::Venue;

/// CEX credentials: an API key/secret pair.
#[derive(Clone)]
pub struct CexCredentials {
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
}

/// DEX credentials: a wallet/user address and an agent private key.
#[derive(Clone)]
pub struct DexCredentials {
    pub user_address: Secret<String>,
    pub private_key: Secret<String>,
}

/// The resolved credential triple for a venue: `(secrets, use_testnet)`.
#[derive(Clone)]
pub enum VenueCredentials {
    Cex {
        creds: CexCredentials,
        use_testnet: bool,
    },
    Dex {
        creds: DexCredentials,
        use_testnet: bool,
    },
}

impl VenueCredentials {
    pub fn use_testnet(&self) -> bool {
        match self {
            VenueCredentials::Cex { use_testnet, .. } => *use_testnet,
            VenueCredentials::Dex { use_testnet, .. } => *use_testnet,
        }
    }
}

/// CLI-supplied overrides, taking precedence over environment variables.
///
/// `--live-trade` is the only flag that flips `use_testnet`'s *default*
/// (defaulting to testnet unless explicitly asked for live trading); an
/// explicit `LATENTSPEED_<VENUE>_USE_TESTNET` env var always wins over the
/// CLI default when `--live-trade` was not passed.
#[derive(Default, Clone)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub live_trade: bool,
}

/// Resolves venue credentials from CLI args, then environment variables.
pub struct CredentialResolver;

impl CredentialResolver {
    fn env_var(venue: &str, suffix: &str) -> std::result::Result<String, std::env::VarError> {
        std::env::var(format!("LATENTSPEED_{venue}_{suffix}"))
    }

    /// Resolves a CEX venue's credentials.
    pub fn resolve_cex(
        venue: Venue,
        cli: &CliOverrides,
    ) -> Result<VenueCredentials> {
        let venue_env = venue_env_prefix(venue);

        let api_key = cli
            .api_key
            .clone()
            .or_else(|| Self::env_var(venue_env, "API_KEY").ok())
            .ok_or_else(|| {
                GatewayError::Config(format!("missing API key for venue {venue_env}"))
            })?;
        let api_secret = cli
            .api_secret
            .clone()
            .or_else(|| Self::env_var(venue_env, "API_SECRET").ok())
            .ok_or_else(|| {
                GatewayError::Config(format!("missing API secret for venue {venue_env}"))
            })?;

        let use_testnet = resolve_use_testnet(venue_env, cli.live_trade);

        Ok(VenueCredentials::Cex {
            creds: CexCredentials {
                api_key: Secret::new(api_key),
                api_secret: Secret::new(api_secret),
            },
            use_testnet,
        })
    }

    /// Resolves a DEX venue's credentials.
    pub fn resolve_dex(
        venue: Venue,
        cli: &CliOverrides,
    ) -> Result<VenueCredentials> {
        let venue_env = venue_env_prefix(venue);

        let user_address = Self::env_var(venue_env, "USER_ADDRESS").map_err(|_| {
            GatewayError::Config(format!("missing user address for venue {venue_env}"))
        })?;
        let private_key = Self::env_var(venue_env, "PRIVATE_KEY").map_err(|_| {
            GatewayError::Config(format!("missing private key for venue {venue_env}"))
        })?;

        let use_testnet = resolve_use_testnet(venue_env, cli.live_trade);

        Ok(VenueCredentials::Dex {
            creds: DexCredentials {
                user_address: Secret::new(user_address),
                private_key: Secret::new(private_key),
            },
            use_testnet,
        })
    }
}

fn venue_env_prefix(venue: Venue) -> &'static str {
    match venue {
        Venue::Bybit => "BYBIT",
        Venue::Hyperliquid => "HYPERLIQUID",
    }
}

fn resolve_use_testnet(venue_env: &str, live_trade_flag: bool) -> bool {
    match CredentialResolver::env_var(venue_env, "USE_TESTNET") {
        Ok(v) => v == "1",
        Err(_) => !live_trade_flag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    // Tests in this module mutate process-wide env vars; serialize them so
    // they don't stomp on each other under cargo's default parallel runner.
    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "LATENTSPEED_BYBIT_API_KEY",
            "LATENTSPEED_BYBIT_API_SECRET",
            "LATENTSPEED_BYBIT_USE_TESTNET",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn cli_overrides_take_precedence_over_env() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_env();
        std::env::set_var("LATENTSPEED_BYBIT_API_KEY", "env-key");
        std::env::set_var("LATENTSPEED_BYBIT_API_SECRET", "env-secret");

        let cli = CliOverrides {
            api_key: Some("cli-key".to_string()),
            api_secret: None,
            live_trade: false,
        };
        let resolved = CredentialResolver::resolve_cex(Venue::Bybit, &cli).unwrap();
        match resolved {
            VenueCredentials::Cex { creds, use_testnet } => {
                assert_eq!(creds.api_key.expose_secret(), "cli-key");
                assert_eq!(creds.api_secret.expose_secret(), "env-secret");
                assert!(use_testnet, "defaults to testnet without --live-trade");
            }
            _ => panic!("expected CEX credentials"),
        }
        clear_env();
    }

    #[test]
    fn missing_credentials_is_a_config_error() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_env();
        let cli = CliOverrides::default();
        let err = CredentialResolver::resolve_cex(Venue::Bybit, &cli).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
    }

    #[test]
    fn explicit_env_testnet_flag_wins_over_live_trade_default() {
        let _guard = ENV_GUARD.lock().unwrap();
        clear_env();
        std::env::set_var("LATENTSPEED_BYBIT_API_KEY", "k");
        std::env::set_var("LATENTSPEED_BYBIT_API_SECRET", "s");
        std::env::set_var("LATENTSPEED_BYBIT_USE_TESTNET", "1");

        let cli = CliOverrides {
            live_trade: true,
            ..Default::default()
        };
        let resolved = CredentialResolver::resolve_cex(Venue::Bybit, &cli).unwrap();
        assert!(resolved.use_testnet());
        clear_env();
    }
}
