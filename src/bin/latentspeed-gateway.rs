//! CLI entrypoint (spec §6): `--exchange <name> --api-key <key> --api-secret
//! <secret> [--live-trade]`. Exit codes: `0` clean shutdown, `2` config
//! error, `1` fatal runtime error.

use std::sync::Arc;

use clap::Parser;

use latentspeed_gateway::adapters::cex::CexAdapter;
use latentspeed_gateway::adapters::dex::DexAdapter;
use latentspeed_gateway::adapters::Adapter;
use latentspeed_gateway::config::{CliOverrides, CredentialResolver, EndpointMatrix, Environment, VenueCredentials};
use latentspeed_gateway::error::GatewayError;
use latentspeed_gateway::gateway::dispatch::DispatchTable;
use latentspeed_gateway::gateway::publisher::{BusMessage, GatewayCallbacks};
use latentspeed_gateway::gateway::{bus, GatewayService};
use latentspeed_gateway::marketdata::{BybitTickerCollector, HyperliquidBboCollector, MarketDataCollector};
use latentspeed_gateway::model::Venue;
use secrecy::ExposeSecret;

/// Latentspeed execution gateway.
#[derive(Parser, Debug)]
#[command(name = "latentspeed-gateway", version, about)]
struct Cli {
    /// Venue to connect to.
    #[arg(long, value_enum)]
    exchange: CliVenue,

    /// CEX API key. Ignored for DEX venues, which read credentials from
    /// `LATENTSPEED_<VENUE>_USER_ADDRESS`/`_PRIVATE_KEY` instead.
    #[arg(long)]
    api_key: Option<String>,

    /// CEX API secret. Ignored for DEX venues.
    #[arg(long)]
    api_secret: Option<String>,

    /// Trade against the venue's live/mainnet environment instead of testnet.
    #[arg(long, default_value_t = false)]
    live_trade: bool,

    /// Address the ingress PULL socket binds to.
    #[arg(long, default_value = "tcp://127.0.0.1:5555")]
    pull_addr: String,

    /// Address the egress PUB socket binds to.
    #[arg(long, default_value = "tcp://127.0.0.1:5556")]
    pub_addr: String,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliVenue {
    Bybit,
    Hyperliquid,
}

impl From<CliVenue> for Venue {
    fn from(value: CliVenue) -> Self {
        match value {
            CliVenue::Bybit => Venue::Bybit,
            CliVenue::Hyperliquid => Venue::Hyperliquid,
        }
    }
}

fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => std::process::exit(0),
        Err(e @ GatewayError::Config(_)) => {
            tracing::error!(error = %e, "configuration error");
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!(error = %e, "fatal gateway error");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> latentspeed_gateway::Result<()> {
    let venue: Venue = cli.exchange.into();
    let overrides = CliOverrides {
        api_key: cli.api_key.clone(),
        api_secret: cli.api_secret.clone(),
        live_trade: cli.live_trade,
    };

    let endpoints_matrix = EndpointMatrix::default();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    let (publisher_tx, publisher_rx) = std::sync::mpsc::channel();
    let mut table = DispatchTable::new();

    match venue {
        Venue::Bybit => {
            let credentials = CredentialResolver::resolve_cex(venue, &overrides)?;
            let VenueCredentials::Cex { creds, use_testnet } = credentials else {
                unreachable!("resolve_cex always returns VenueCredentials::Cex")
            };
            let env = if use_testnet { Environment::Testnet } else { Environment::Mainnet };
            let endpoints = endpoints_matrix.resolve(venue, env)?;

            let callbacks = Arc::new(GatewayCallbacks::new(publisher_tx.clone()));
            let adapter = CexAdapter::new(
                endpoints.rest_base_url(),
                endpoints.ws_url(),
                creds.api_key.expose_secret().clone(),
                creds.api_secret,
                callbacks,
            )?;
            table.insert(venue, Arc::new(adapter) as Arc<dyn Adapter>);
        }
        Venue::Hyperliquid => {
            let credentials = CredentialResolver::resolve_dex(venue, &overrides)?;
            let VenueCredentials::Dex { creds, use_testnet } = credentials else {
                unreachable!("resolve_dex always returns VenueCredentials::Dex")
            };
            let env = if use_testnet { Environment::Testnet } else { Environment::Mainnet };
            let endpoints = endpoints_matrix.resolve(venue, env)?;

            let callbacks = Arc::new(GatewayCallbacks::new(publisher_tx.clone()));
            let adapter = DexAdapter::new(
                endpoints.rest_base_url(),
                endpoints.ws_url(),
                creds.user_address.expose_secret().clone(),
                creds.private_key,
                use_testnet,
                callbacks,
            )?;
            table.insert(venue, Arc::new(adapter) as Arc<dyn Adapter>);
        }
    }

    spawn_market_data_collector(venue, &endpoints_matrix, publisher_tx.clone())?;

    let context = zmq::Context::new();
    let bound = bus::bind(&context, &cli.pull_addr, &cli.pub_addr)?;

    let service = GatewayService::new(bound, table, publisher_tx, publisher_rx, runtime);
    service.run()
}

/// Spawns the venue's public market-data collector (spec §4.12) on its own
/// thread, re-using the same resolved mainnet/testnet endpoint as the
/// order-management adapter. Runs for the lifetime of the process; there is
/// no separate shutdown path for it beyond process exit, matching how an
/// adapter's own WS thread is never explicitly joined either.
fn spawn_market_data_collector(
    venue: Venue,
    endpoints_matrix: &EndpointMatrix,
    publisher_tx: std::sync::mpsc::Sender<BusMessage>,
) -> latentspeed_gateway::Result<()> {
    let endpoints = endpoints_matrix.resolve(venue, Environment::Mainnet)?;
    let ws_url = endpoints.ws_url();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build market-data collector runtime");
        let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));

        runtime.block_on(async move {
            match venue {
                Venue::Bybit => {
                    let collector = BybitTickerCollector::new(ws_url, vec!["BTCUSDT".to_string()], publisher_tx);
                    collector.run(shutdown).await;
                }
                Venue::Hyperliquid => {
                    let collector = HyperliquidBboCollector::new(ws_url, vec!["BTC".to_string()], publisher_tx);
                    collector.run(shutdown).await;
                }
            }
        });
    });

    Ok(())
}
