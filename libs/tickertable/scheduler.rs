//! Update batching scheduler.
//!
//! Coalesces a burst of per-key updates into one flush per frame tick
//! and throttles full re-sorts so the table does not reorder under a
//! reader more than once per interval. The scheduler is passive: the
//! engine's frame loop drives it by calling [`UpdateScheduler::tick`]
//! once per display-refresh interval.

use crate::model::{Key, RowUpdate};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What one frame tick should do
#[derive(Debug)]
pub struct FlushPlan {
    /// Latest pending update per key, drained
    pub batch: HashMap<Key, RowUpdate>,
    /// Run the sort engine and reorder rows this pass
    pub resort: bool,
    /// The key set changed shape: rebuild the row set instead of patching
    pub rebuild: bool,
}

pub struct UpdateScheduler {
    pending: HashMap<Key, RowUpdate>,
    resort_interval: Duration,
    last_resort: Option<Instant>,
    rebuild_requested: bool,
}

impl UpdateScheduler {
    pub fn new(resort_interval: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            resort_interval,
            last_resort: None,
            rebuild_requested: false,
        }
    }

    /// Queue one update. Within a tick window the newest update per key
    /// wins; arrival order is preserved by the transport, so overwriting
    /// is safe.
    pub fn schedule(&mut self, update: RowUpdate) {
        self.pending.insert(update.key.clone(), update);
    }

    pub fn schedule_all(&mut self, updates: impl IntoIterator<Item = RowUpdate>) {
        for update in updates {
            self.schedule(update);
        }
    }

    /// Force a full row-set rebuild on the next tick (snapshot received,
    /// or keys appeared/disappeared). Rebuilds bypass the resort throttle.
    pub fn request_rebuild(&mut self) {
        self.rebuild_requested = true;
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.rebuild_requested
    }

    /// Drain the pending batch for this frame. Returns `None` when there
    /// is nothing to do, so an idle table skips render work entirely.
    pub fn tick(&mut self, now: Instant) -> Option<FlushPlan> {
        if self.pending.is_empty() && !self.rebuild_requested {
            return None;
        }

        let rebuild = std::mem::take(&mut self.rebuild_requested);
        let resort = rebuild || self.resort_due(now);
        if resort {
            self.last_resort = Some(now);
        }

        Some(FlushPlan {
            batch: std::mem::take(&mut self.pending),
            resort,
            rebuild,
        })
    }

    fn resort_due(&self, now: Instant) -> bool {
        match self.last_resort {
            Some(at) => now.duration_since(at) >= self.resort_interval,
            None => true,
        }
    }

    /// Teardown: drop anything queued so a cancelled view is never touched
    pub fn clear(&mut self) {
        self.pending.clear();
        self.rebuild_requested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldName, RawValue};
    use chrono::Utc;

    fn update(key: &str, price: f64) -> RowUpdate {
        RowUpdate::new(Key::from(key), Utc::now())
            .with_field("price", RawValue::Number(price))
    }

    fn scheduler() -> UpdateScheduler {
        UpdateScheduler::new(Duration::from_secs(1))
    }

    #[test]
    fn burst_coalesces_to_one_flush_with_latest_values() {
        let mut s = scheduler();
        s.schedule(update("BTCUSDT", 100.0));
        s.schedule(update("ETHUSDT", 3000.0));
        s.schedule(update("BTCUSDT", 101.0));
        s.schedule(update("BTCUSDT", 102.0));

        let plan = s.tick(Instant::now()).unwrap();
        assert_eq!(plan.batch.len(), 2);
        assert_eq!(
            plan.batch[&Key::from("BTCUSDT")]
                .fields
                .get(&FieldName::from("price")),
            Some(&RawValue::Number(102.0))
        );

        // Nothing left for the next frame
        assert!(s.tick(Instant::now()).is_none());
    }

    #[test]
    fn idle_ticks_do_nothing() {
        let mut s = scheduler();
        assert!(s.tick(Instant::now()).is_none());
        assert!(s.tick(Instant::now()).is_none());
    }

    #[test]
    fn resort_is_throttled_within_the_interval() {
        let mut s = scheduler();
        let t0 = Instant::now();

        s.schedule(update("BTCUSDT", 100.0));
        let first = s.tick(t0).unwrap();
        assert!(first.resort);

        // 200ms later: flush happens, resort does not
        s.schedule(update("BTCUSDT", 101.0));
        let second = s.tick(t0 + Duration::from_millis(200)).unwrap();
        assert!(!second.resort);

        // Past the interval: resort again
        s.schedule(update("BTCUSDT", 102.0));
        let third = s.tick(t0 + Duration::from_millis(1200)).unwrap();
        assert!(third.resort);
    }

    #[test]
    fn rebuild_bypasses_the_resort_throttle() {
        let mut s = scheduler();
        let t0 = Instant::now();

        s.schedule(update("BTCUSDT", 100.0));
        assert!(s.tick(t0).unwrap().resort);

        // Inside the throttle window, but the key set changed
        s.schedule(update("SOLUSDT", 145.0));
        s.request_rebuild();
        let plan = s.tick(t0 + Duration::from_millis(100)).unwrap();
        assert!(plan.rebuild);
        assert!(plan.resort);
    }

    #[test]
    fn rebuild_flushes_even_with_an_empty_batch() {
        let mut s = scheduler();
        s.request_rebuild();
        let plan = s.tick(Instant::now()).unwrap();
        assert!(plan.rebuild);
        assert!(plan.batch.is_empty());
    }

    #[test]
    fn clear_cancels_pending_work() {
        let mut s = scheduler();
        s.schedule(update("BTCUSDT", 100.0));
        s.request_rebuild();
        s.clear();
        assert!(!s.has_pending());
        assert!(s.tick(Instant::now()).is_none());
    }
}
