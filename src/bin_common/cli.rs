//! Environment-driven settings for binaries.
//!
//! Everything comes from env vars (with `.env` support via dotenv) so
//! the same binary runs against any feed without a rebuild.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default polling cadence when only a REST endpoint is configured
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default location for persisted user preferences
const DEFAULT_PREFS_PATH: &str = "config/tickergrid_prefs.json";

/// Runtime settings shared by the binaries
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// WebSocket feed endpoint; preferred when set
    pub feed_url: Option<String>,
    /// REST fallback endpoint, polled on a fixed interval
    pub poll_url: Option<String>,
    pub poll_interval: Duration,
    /// Where sort/pin/column preferences persist
    pub prefs_path: PathBuf,
    /// Optional subscription payload sent after connect
    pub subscription: Option<String>,
}

impl AppSettings {
    /// Load settings from the environment. At least one of
    /// `TICKER_FEED_URL` / `TICKER_POLL_URL` must be set.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let feed_url = std::env::var("TICKER_FEED_URL").ok();
        let poll_url = std::env::var("TICKER_POLL_URL").ok();
        if feed_url.is_none() && poll_url.is_none() {
            bail!("Set TICKER_FEED_URL or TICKER_POLL_URL");
        }

        let poll_interval = std::env::var("TICKER_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));

        let prefs_path = std::env::var("TICKER_PREFS_PATH")
            .unwrap_or_else(|_| DEFAULT_PREFS_PATH.to_string())
            .into();

        Ok(Self {
            feed_url,
            poll_url,
            poll_interval,
            prefs_path,
            subscription: std::env::var("TICKER_SUBSCRIBE").ok(),
        })
    }
}
