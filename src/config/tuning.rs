//! Per-adapter tuning knobs (spec §6's "optional tuning" environment variables).

use std::time::Duration;

/// Tuning parameters for one adapter instance. All fields have defaults
/// matching the values called out in spec §4.5/§4.10/§5; each may be
/// overridden by a `LATENTSPEED_<VENUE>_*` environment variable at startup.
#[derive(Debug, Clone)]
pub struct AdapterTuning {
    pub ws_ping_interval: Duration,
    pub ws_pong_timeout: Duration,
    pub resubscribe_quiet: Duration,
    pub reconnect_quiet: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub batch_cadence: Duration,
    pub ws_post_timeout: Duration,
    pub slippage_bps: u32,
    pub rate_limit_cooldown: Duration,
    pub catchup_lookback: Duration,
}

impl Default for AdapterTuning {
    fn default() -> Self {
        Self {
            ws_ping_interval: Duration::from_secs(20),
            ws_pong_timeout: Duration::from_secs(60),
            resubscribe_quiet: Duration::from_secs(30),
            reconnect_quiet: Duration::from_secs(90),
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(30),
            batch_cadence: Duration::from_millis(100),
            ws_post_timeout: Duration::from_millis(1500),
            slippage_bps: 10,
            rate_limit_cooldown: Duration::from_secs(2),
            catchup_lookback: Duration::from_secs(120),
        }
    }
}

impl AdapterTuning {
    /// Overlays environment variables of the form `LATENTSPEED_<VENUE>_<FIELD>_MS`
    /// (or `_BPS` for `slippage_bps`) onto the defaults.
    pub fn from_env(venue_env: &str) -> Self {
        let mut tuning = Self::default();

        let ms = |suffix: &str| -> Option<Duration> {
            std::env::var(format!("LATENTSPEED_{venue_env}_{suffix}_MS"))
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        if let Some(v) = ms("BACKOFF_BASE") {
            tuning.backoff_base = v;
        }
        if let Some(v) = ms("BACKOFF_CAP") {
            tuning.backoff_cap = v;
        }
        if let Some(v) = ms("BATCH_CADENCE") {
            tuning.batch_cadence = v;
        }
        if let Some(v) = ms("WS_POST_TIMEOUT") {
            tuning.ws_post_timeout = v;
        }
        if let Some(v) = ms("RESUBSCRIBE_QUIET") {
            tuning.resubscribe_quiet = v;
        }
        if let Some(v) = ms("RECONNECT_QUIET") {
            tuning.reconnect_quiet = v;
        }
        if let Ok(v) = std::env::var(format!("LATENTSPEED_{venue_env}_SLIPPAGE_BPS")) {
            if let Ok(parsed) = v.parse::<u32>() {
                tuning.slippage_bps = parsed;
            }
        }

        tuning
    }
}
