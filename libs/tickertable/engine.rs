//! Ticker engine: owns every piece of reconciliation state and the frame
//! loop that serializes all mutation onto one task.
//!
//! [`EngineCore`] is the synchronous heart: feed it source events and
//! drive [`EngineCore::frame`] once per display tick. [`TickerEngine`]
//! wraps it in a spawned task with an explicit start/stop lifecycle so
//! teardown cancels the pending flush and the source's timers.

use crate::config::EngineConfig;
use crate::freshness::FreshnessClassifier;
use crate::highlight::HighlightEngine;
use crate::model::{Key, RowUpdate, StreamMessage};
use crate::prefs::{PreferenceStore, Preferences};
use crate::render::{default_columns, Renderer, TableView};
use crate::scheduler::UpdateScheduler;
use crate::sort::{PinBoard, SortEngine, SortSpec};
use crate::source::{SourceEvent, UpdateSource};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// Core
// ============================================================================

/// All reconciliation state, mutated from exactly one place.
pub struct EngineCore {
    rows: HashMap<Key, RowUpdate>,
    keys: Vec<Key>,
    scheduler: UpdateScheduler,
    sort: SortEngine,
    renderer: Renderer,
    prefs_store: Arc<dyn PreferenceStore>,
    current_order: Vec<Key>,
    /// Set once the source reports an exhausted retry budget
    feed_failed: bool,
}

impl EngineCore {
    pub fn new(config: &EngineConfig, prefs_store: Arc<dyn PreferenceStore>) -> Self {
        let prefs = Preferences::load_from(prefs_store.as_ref());
        let columns = prefs.columns.clone().unwrap_or_else(default_columns);
        let pins = PinBoard::restore(config.max_pinned, prefs.pinned);

        Self {
            rows: HashMap::new(),
            keys: Vec::new(),
            scheduler: UpdateScheduler::new(config.resort_interval),
            sort: SortEngine::new(prefs.sort, pins),
            renderer: Renderer::new(
                columns,
                HighlightEngine::new(config.highlight_epsilon, config.persistence_budget),
                FreshnessClassifier::new(config.staleness_threshold, config.persistence_budget),
            ),
            prefs_store,
            current_order: Vec::new(),
            feed_failed: false,
        }
    }

    /// Apply one source event. Messages only queue work; nothing touches
    /// the view until the next frame.
    pub fn handle_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Message(message) => self.handle_message(message),
            SourceEvent::Connected => info!("[Engine] Feed connected"),
            SourceEvent::Disconnected => info!("[Engine] Feed disconnected"),
            SourceEvent::Reconnecting(attempt) => {
                info!("[Engine] Feed reconnecting, attempt {}", attempt)
            }
            SourceEvent::Failed => {
                warn!("[Engine] Feed gave up reconnecting; table shows last good state");
                self.feed_failed = true;
            }
        }
    }

    fn handle_message(&mut self, message: StreamMessage) {
        match message {
            StreamMessage::Snapshot { payload, .. } => {
                debug!("[Engine] Snapshot with {} rows", payload.len());
                self.rows.clear();
                self.keys.clear();
                self.renderer.reset();
                for update in payload {
                    self.keys.push(update.key.clone());
                    self.scheduler.schedule(update.clone());
                    self.rows.insert(update.key.clone(), update);
                }
                self.scheduler.request_rebuild();
            }
            StreamMessage::Update { payload, .. } => {
                for update in payload {
                    self.apply_update(update);
                }
            }
            StreamMessage::Alert { payload, .. } => {
                info!("[Engine] Alert [{}]: {}", payload.level, payload.message);
            }
        }
    }

    /// Merge one delta into the cumulative row state and queue a flush
    fn apply_update(&mut self, update: RowUpdate) {
        match self.rows.get_mut(&update.key) {
            Some(existing) => {
                existing
                    .fields
                    .extend(update.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                existing.timestamp = update.timestamp;
            }
            None => {
                // New instrument: key set changed shape
                self.keys.push(update.key.clone());
                self.rows.insert(update.key.clone(), update.clone());
                self.scheduler.request_rebuild();
            }
        }
        self.scheduler.schedule(update);
    }

    /// Pin or unpin a key, reordering immediately and persisting the pin list
    pub fn toggle_pin(&mut self, key: Key) {
        let pinned = self.sort.pins_mut().toggle(&key);
        debug!("[Engine] {} is now {}", key, if pinned { "pinned" } else { "unpinned" });
        self.scheduler.request_rebuild();
        self.persist();
    }

    pub fn set_sort(&mut self, spec: SortSpec) {
        self.sort.set_spec(spec);
        self.scheduler.request_rebuild();
        self.persist();
    }

    /// Run one frame: at most one flush and, throttled, one re-sort
    pub fn frame(&mut self, view: &mut dyn TableView, now: Instant, wall: DateTime<Utc>) {
        let plan = match self.scheduler.tick(now) {
            Some(plan) => plan,
            None => return,
        };

        let mut force_rebuild = plan.rebuild;
        if plan.resort {
            let order = self.sort.order(&self.keys, &self.rows);
            if order != self.current_order {
                // No move-row primitive on the view, so a reorder is a rebuild
                force_rebuild = true;
                self.current_order = order;
            }
        }

        self.renderer
            .render(view, &plan.batch, &self.rows, &self.current_order, force_rebuild, wall);
    }

    /// Cancel all queued work; safe to call before tearing down the view
    pub fn teardown(&mut self) {
        self.scheduler.clear();
        self.persist();
    }

    pub fn order(&self) -> &[Key] {
        &self.current_order
    }

    pub fn feed_failed(&self) -> bool {
        self.feed_failed
    }

    pub fn row_state(&self, key: &Key) -> Option<&RowUpdate> {
        self.rows.get(key)
    }

    fn persist(&self) {
        let prefs = Preferences {
            sort: self.sort.spec().clone(),
            pinned: self.sort.pins().keys().to_vec(),
            columns: Some(self.renderer.columns().to_vec()),
        };
        if let Err(e) = prefs.save_to(self.prefs_store.as_ref()) {
            warn!("[Engine] Failed to persist preferences: {}", e);
        }
    }
}

// ============================================================================
// Task wrapper
// ============================================================================

enum EngineCommand {
    TogglePin(Key),
    SetSort(SortSpec),
}

/// Running engine handle. Dropping it does not stop the task; call
/// [`TickerEngine::stop`] so teardown runs.
pub struct TickerEngine {
    running: Arc<AtomicBool>,
    command_tx: Sender<EngineCommand>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TickerEngine {
    /// Spawn the frame loop over a source and a view.
    pub fn start<V>(
        config: EngineConfig,
        source: Box<dyn UpdateSource>,
        view: V,
        prefs_store: Arc<dyn PreferenceStore>,
    ) -> Self
    where
        V: TableView + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (command_tx, command_rx) = unbounded();

        let task = {
            let running = Arc::clone(&running);
            tokio::spawn(run_engine(config, source, view, prefs_store, running, command_rx))
        };

        Self {
            running,
            command_tx,
            task: Some(task),
        }
    }

    pub fn toggle_pin(&self, key: Key) {
        let _ = self.command_tx.send(EngineCommand::TogglePin(key));
    }

    pub fn set_sort(&self, spec: SortSpec) {
        let _ = self.command_tx.send(EngineCommand::SetSort(spec));
    }

    /// Stop the frame loop, cancel pending work, and shut the source down
    pub async fn stop(mut self) {
        info!("[Engine] Stopping");
        self.running.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("[Engine] Stopped");
    }
}

async fn run_engine<V>(
    config: EngineConfig,
    mut source: Box<dyn UpdateSource>,
    mut view: V,
    prefs_store: Arc<dyn PreferenceStore>,
    running: Arc<AtomicBool>,
    command_rx: Receiver<EngineCommand>,
) where
    V: TableView + Send + 'static,
{
    let mut core = EngineCore::new(&config, prefs_store);
    let mut frame = tokio::time::interval(config.frame_interval);
    frame.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!("[Engine] Frame loop started");

    while running.load(Ordering::Acquire) {
        frame.tick().await;
        if !running.load(Ordering::Acquire) {
            break;
        }

        while let Ok(command) = command_rx.try_recv() {
            match command {
                EngineCommand::TogglePin(key) => core.toggle_pin(key),
                EngineCommand::SetSort(spec) => core.set_sort(spec),
            }
        }

        for event in source.drain() {
            core.handle_event(event);
        }

        core.frame(&mut view, Instant::now(), Utc::now());
    }

    core.teardown();
    source.shutdown().await;
    info!("[Engine] Frame loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertEvent, FieldName, RawValue};
    use crate::prefs::MemoryPreferenceStore;
    use crate::render::{CellClass, CellHandle, RowHandle};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingView {
        next: u64,
        rows: Vec<Key>,
        text_writes: usize,
    }

    impl TableView for CountingView {
        fn create_row(&mut self, key: &Key) -> RowHandle {
            self.next += 1;
            self.rows.push(key.clone());
            RowHandle(self.next)
        }
        fn create_cell(&mut self, _row: RowHandle, _field: &FieldName) -> CellHandle {
            self.next += 1;
            CellHandle(self.next)
        }
        fn set_cell_text(&mut self, _cell: CellHandle, _text: &str) {
            self.text_writes += 1;
        }
        fn set_cell_class(&mut self, _cell: CellHandle, _class: CellClass) {}
        fn remove_all_rows(&mut self) {
            self.rows.clear();
        }
        fn row_count(&self) -> usize {
            self.rows.len()
        }
    }

    fn core() -> EngineCore {
        EngineCore::new(
            &EngineConfig::default(),
            Arc::new(MemoryPreferenceStore::new()),
        )
    }

    fn update_msg(key: &str, price: f64) -> StreamMessage {
        StreamMessage::Update {
            payload: vec![RowUpdate::new(Key::from(key), Utc::now())
                .with_field("symbol", RawValue::Text(key.into()))
                .with_field("price", RawValue::Number(price))],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn updates_render_on_the_next_frame() {
        let mut c = core();
        let mut view = CountingView::default();

        c.handle_event(SourceEvent::Message(update_msg("BTCUSDT", 64000.0)));
        assert_eq!(view.row_count(), 0);

        c.frame(&mut view, Instant::now(), Utc::now());
        assert_eq!(view.row_count(), 1);
    }

    #[test]
    fn snapshot_replaces_the_key_set() {
        let mut c = core();
        let mut view = CountingView::default();

        c.handle_event(SourceEvent::Message(update_msg("BTCUSDT", 64000.0)));
        c.handle_event(SourceEvent::Message(update_msg("ETHUSDT", 3100.0)));
        c.frame(&mut view, Instant::now(), Utc::now());
        assert_eq!(view.row_count(), 2);

        let snapshot = StreamMessage::Snapshot {
            payload: vec![RowUpdate::new(Key::from("SOLUSDT"), Utc::now())
                .with_field("price", RawValue::Number(145.0))],
            timestamp: Utc::now(),
        };
        c.handle_event(SourceEvent::Message(snapshot));
        c.frame(&mut view, Instant::now(), Utc::now());

        assert_eq!(view.rows, vec![Key::from("SOLUSDT")]);
        assert!(c.row_state(&Key::from("BTCUSDT")).is_none());
    }

    #[test]
    fn partial_updates_merge_into_row_state() {
        let mut c = core();

        c.handle_event(SourceEvent::Message(update_msg("BTCUSDT", 64000.0)));
        let delta = StreamMessage::Update {
            payload: vec![RowUpdate::new(Key::from("BTCUSDT"), Utc::now())
                .with_field("volume", RawValue::Number(1_000_000.0))],
            timestamp: Utc::now(),
        };
        c.handle_event(SourceEvent::Message(delta));

        let row = c.row_state(&Key::from("BTCUSDT")).unwrap();
        assert_eq!(
            row.fields.get(&FieldName::from("price")),
            Some(&RawValue::Number(64000.0))
        );
        assert_eq!(
            row.fields.get(&FieldName::from("volume")),
            Some(&RawValue::Number(1_000_000.0))
        );
    }

    #[test]
    fn pin_toggle_reorders_immediately_and_persists() {
        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        let mut c = EngineCore::new(&EngineConfig::default(), Arc::clone(&store));
        let mut view = CountingView::default();

        c.handle_event(SourceEvent::Message(update_msg("AAA", 1.0)));
        c.handle_event(SourceEvent::Message(update_msg("ZZZ", 2.0)));
        c.frame(&mut view, Instant::now(), Utc::now());
        assert_eq!(view.rows, vec![Key::from("AAA"), Key::from("ZZZ")]);

        // ZZZ sorts last by symbol ascending; pinning lifts it first,
        // inside the resort throttle window
        c.toggle_pin(Key::from("ZZZ"));
        c.frame(&mut view, Instant::now(), Utc::now());
        assert_eq!(view.rows, vec![Key::from("ZZZ"), Key::from("AAA")]);

        let prefs = Preferences::load_from(store.as_ref());
        assert_eq!(prefs.pinned, vec![Key::from("ZZZ")]);
    }

    #[test]
    fn alerts_and_lifecycle_events_touch_no_row_state() {
        let mut c = core();
        c.handle_event(SourceEvent::Message(update_msg("BTCUSDT", 64000.0)));

        c.handle_event(SourceEvent::Message(StreamMessage::Alert {
            payload: AlertEvent {
                level: "warn".into(),
                message: "dislocation".into(),
            },
            timestamp: Utc::now(),
        }));
        c.handle_event(SourceEvent::Disconnected);
        c.handle_event(SourceEvent::Failed);

        assert!(c.feed_failed());
        assert!(c.row_state(&Key::from("BTCUSDT")).is_some());
    }

    #[test]
    fn persisted_sort_spec_survives_restart() {
        let store: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferenceStore::new());
        {
            let mut c = EngineCore::new(&EngineConfig::default(), Arc::clone(&store));
            c.set_sort(SortSpec {
                field: FieldName::from("price"),
                direction: crate::sort::SortDirection::Descending,
            });
        }

        let _restarted = EngineCore::new(&EngineConfig::default(), Arc::clone(&store));
        let prefs = Preferences::load_from(store.as_ref());
        assert_eq!(prefs.sort.field, FieldName::from("price"));
    }

    #[tokio::test]
    async fn engine_lifecycle_start_stop() {
        struct EmptySource;

        #[async_trait::async_trait]
        impl UpdateSource for EmptySource {
            fn drain(&mut self) -> Vec<SourceEvent> {
                Vec::new()
            }
            async fn shutdown(self: Box<Self>) {}
        }

        let config = EngineConfig {
            frame_interval: Duration::from_millis(10),
            ..EngineConfig::default()
        };
        let engine = TickerEngine::start(
            config,
            Box::new(EmptySource),
            CountingView::default(),
            Arc::new(MemoryPreferenceStore::new()),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_secs(1), engine.stop())
            .await
            .expect("engine should stop promptly");
    }
}
