//! Engine tuning knobs.
//!
//! The decay budgets and staleness window are deliberate configuration,
//! not derived values: they bound how long a movement stays visible to
//! something a reader can perceive.

use std::time::Duration;

/// Numeric dead zone below which a move does not count
pub const DEFAULT_HIGHLIGHT_EPSILON: f64 = 1e-4;

/// Render passes a highlight or freshness mark survives after change stops
pub const DEFAULT_PERSISTENCE_BUDGET: u32 = 8;

/// Event age beyond which a row is stale
pub const DEFAULT_STALENESS_THRESHOLD_SECS: i64 = 60;

/// Display refresh cadence: one flush per tick at most
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum gap between full re-sorts
pub const DEFAULT_RESORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub highlight_epsilon: f64,
    pub persistence_budget: u32,
    pub staleness_threshold: chrono::Duration,
    pub frame_interval: Duration,
    pub resort_interval: Duration,
    pub max_pinned: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            highlight_epsilon: DEFAULT_HIGHLIGHT_EPSILON,
            persistence_budget: DEFAULT_PERSISTENCE_BUDGET,
            staleness_threshold: chrono::Duration::seconds(DEFAULT_STALENESS_THRESHOLD_SECS),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            resort_interval: DEFAULT_RESORT_INTERVAL,
            max_pinned: crate::sort::MAX_PINNED_KEYS,
        }
    }
}
