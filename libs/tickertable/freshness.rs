//! Freshness classifier for timestamp fields.
//!
//! Same decay shape as the highlight engine but keyed on identity change
//! rather than numeric delta, with one hard override: an event older than
//! the staleness threshold is Stale no matter what the decay state says.

use crate::model::Key;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Freshness class applied to a rendered timestamp cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessClass {
    Fresh,
    Stale,
    Neutral,
}

#[derive(Debug, Clone, Copy)]
struct FreshState {
    updates_remaining: u32,
}

/// Per-key freshness decay state
pub struct FreshnessClassifier {
    /// Events older than this are Stale unconditionally
    staleness_threshold: Duration,
    /// Render passes the Fresh class persists after the timestamp stops changing
    persistence: u32,
    previous: HashMap<Key, DateTime<Utc>>,
    states: HashMap<Key, FreshState>,
}

impl FreshnessClassifier {
    pub fn new(staleness_threshold: Duration, persistence: u32) -> Self {
        Self {
            staleness_threshold,
            persistence,
            previous: HashMap::new(),
            states: HashMap::new(),
        }
    }

    /// Classify a key's event timestamp against wall-clock `now`.
    pub fn classify(&mut self, key: &Key, raw_ts: DateTime<Utc>, now: DateTime<Utc>) -> FreshnessClass {
        // Staleness always wins, and wipes any decay state
        if now - raw_ts > self.staleness_threshold {
            self.states.remove(key);
            self.previous.insert(key.clone(), raw_ts);
            return FreshnessClass::Stale;
        }

        let changed = match self.previous.insert(key.clone(), raw_ts) {
            Some(prev) => prev != raw_ts,
            None => true,
        };

        if changed {
            self.states.insert(
                key.clone(),
                FreshState {
                    updates_remaining: self.persistence,
                },
            );
            return FreshnessClass::Fresh;
        }

        match self.states.get_mut(key) {
            Some(state) => {
                state.updates_remaining -= 1;
                if state.updates_remaining == 0 {
                    self.states.remove(key);
                }
                FreshnessClass::Fresh
            }
            None => FreshnessClass::Neutral,
        }
    }

    /// Drop all state for a key that left the visible set
    pub fn forget_key(&mut self, key: &Key) {
        self.previous.remove(key);
        self.states.remove(key);
    }

    /// Drop everything (snapshot replacement)
    pub fn clear(&mut self) {
        self.previous.clear();
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn classifier(persistence: u32) -> FreshnessClassifier {
        FreshnessClassifier::new(Duration::seconds(60), persistence)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn first_sight_of_a_recent_timestamp_is_fresh() {
        let mut c = classifier(8);
        let key = Key::from("BTCUSDT");
        assert_eq!(c.classify(&key, at(0), at(5)), FreshnessClass::Fresh);
    }

    #[test]
    fn changed_timestamp_resets_the_budget() {
        let mut c = classifier(3);
        let key = Key::from("BTCUSDT");

        c.classify(&key, at(0), at(1));
        assert_eq!(c.classify(&key, at(10), at(11)), FreshnessClass::Fresh);

        // Unchanged for exactly N renders, then Neutral
        assert_eq!(c.classify(&key, at(10), at(12)), FreshnessClass::Fresh);
        assert_eq!(c.classify(&key, at(10), at(13)), FreshnessClass::Fresh);
        assert_eq!(c.classify(&key, at(10), at(14)), FreshnessClass::Fresh);
        assert_eq!(c.classify(&key, at(10), at(15)), FreshnessClass::Neutral);
    }

    #[test]
    fn staleness_overrides_active_decay() {
        let mut c = classifier(8);
        let key = Key::from("ETHUSDT");

        // Freshly changed, full decay budget
        assert_eq!(c.classify(&key, at(0), at(1)), FreshnessClass::Fresh);

        // Over 60 seconds of wall clock later: Stale regardless of budget
        assert_eq!(c.classify(&key, at(0), at(61)), FreshnessClass::Stale);

        // And the decay state is gone: a later in-window render is Neutral
        // because the timestamp itself did not change
        assert_eq!(c.classify(&key, at(0), at(30)), FreshnessClass::Neutral);
    }

    #[test]
    fn boundary_age_is_not_stale() {
        let mut c = classifier(8);
        let key = Key::from("BTCUSDT");
        // Exactly the threshold: not yet stale
        assert_eq!(c.classify(&key, at(0), at(60)), FreshnessClass::Fresh);
    }
}
