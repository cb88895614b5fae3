//! View renderer.
//!
//! Consumes the handle cache, the sort order, the formatter, and the
//! highlight/freshness engines to keep the view in sync: existing cells
//! are patched in place, and only when the key set itself changed shape
//! is the visible row set rebuilt. Handles are opaque; the renderer does
//! not assume any particular rendering technology behind [`TableView`].

use crate::cache::{CacheEntry, HandleCache};
use crate::format;
use crate::freshness::{FreshnessClass, FreshnessClassifier};
use crate::highlight::{HighlightClass, HighlightEngine};
use crate::model::{FieldName, Key, RawValue, RowUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

// ============================================================================
// View abstraction
// ============================================================================

/// Opaque handle to a rendered row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle(pub u64);

/// Opaque handle to a rendered cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellHandle(pub u64);

/// Visual class applied to a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellClass {
    Up,
    Down,
    Fresh,
    Stale,
    #[default]
    Neutral,
}

impl From<HighlightClass> for CellClass {
    fn from(class: HighlightClass) -> Self {
        match class {
            HighlightClass::Up => CellClass::Up,
            HighlightClass::Down => CellClass::Down,
            HighlightClass::Neutral => CellClass::Neutral,
        }
    }
}

impl From<FreshnessClass> for CellClass {
    fn from(class: FreshnessClass) -> Self {
        match class {
            FreshnessClass::Fresh => CellClass::Fresh,
            FreshnessClass::Stale => CellClass::Stale,
            FreshnessClass::Neutral => CellClass::Neutral,
        }
    }
}

/// The rendering surface the engine drives. Implementations own the real
/// widgets; the engine only ever sees handles.
pub trait TableView {
    fn create_row(&mut self, key: &Key) -> RowHandle;
    fn create_cell(&mut self, row: RowHandle, field: &FieldName) -> CellHandle;
    fn set_cell_text(&mut self, cell: CellHandle, text: &str);
    fn set_cell_class(&mut self, cell: CellHandle, class: CellClass);
    fn remove_all_rows(&mut self);
    /// Number of rows currently rendered, used to detect a corrupt render
    fn row_count(&self) -> usize;
}

// ============================================================================
// Columns
// ============================================================================

/// Display treatment for one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnFormat {
    Currency,
    Percent,
    Compact,
    Duration,
    Text,
    /// Rendered as text but classified by the freshness engine
    Timestamp,
}

impl ColumnFormat {
    fn render(&self, value: &RawValue) -> String {
        match self {
            ColumnFormat::Currency => format::format_currency(value),
            ColumnFormat::Percent => format::format_percent(value),
            ColumnFormat::Compact => format::format_compact(value),
            ColumnFormat::Duration => format::format_duration(value),
            ColumnFormat::Text | ColumnFormat::Timestamp => format::format_text(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub field: FieldName,
    pub format: ColumnFormat,
}

impl ColumnSpec {
    pub fn new(field: impl Into<FieldName>, format: ColumnFormat) -> Self {
        Self {
            field: field.into(),
            format,
        }
    }
}

/// Default ticker table layout
pub fn default_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("symbol", ColumnFormat::Text),
        ColumnSpec::new("price", ColumnFormat::Currency),
        ColumnSpec::new("change_pct", ColumnFormat::Percent),
        ColumnSpec::new("volume", ColumnFormat::Compact),
        ColumnSpec::new("timestamp", ColumnFormat::Timestamp),
    ]
}

// ============================================================================
// Renderer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct RenderedCell {
    text: String,
    class: CellClass,
}

/// Incremental renderer. Owns the handle cache, the decay engines, and
/// the last-written text/class per cell so unchanged cells cost nothing.
pub struct Renderer {
    columns: Vec<ColumnSpec>,
    cache: HandleCache,
    highlights: HighlightEngine,
    freshness: FreshnessClassifier,
    rendered: HashMap<CellHandle, RenderedCell>,
    last_key_count: usize,
}

impl Renderer {
    pub fn new(
        columns: Vec<ColumnSpec>,
        highlights: HighlightEngine,
        freshness: FreshnessClassifier,
    ) -> Self {
        Self {
            columns,
            cache: HandleCache::new(),
            highlights,
            freshness,
            rendered: HashMap::new(),
            last_key_count: 0,
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn set_columns(&mut self, columns: Vec<ColumnSpec>) {
        self.columns = columns;
        // Column shape changed under us; next pass must rebuild
        self.cache.invalidate();
    }

    /// Apply one flushed batch to the view.
    ///
    /// Incremental when every batch key already has cached handles and
    /// the key count is unchanged; otherwise a full rebuild in `order`.
    pub fn render(
        &mut self,
        view: &mut dyn TableView,
        batch: &HashMap<Key, RowUpdate>,
        rows: &HashMap<Key, RowUpdate>,
        order: &[Key],
        force_rebuild: bool,
        now: DateTime<Utc>,
    ) {
        let needs_rebuild = force_rebuild
            || order.len() != self.last_key_count
            || batch.keys().any(|k| self.cache.get(k).is_none());

        if needs_rebuild {
            self.rebuild(view, rows, order, now);
        } else {
            for key in batch.keys() {
                self.patch_row(view, key, rows, now);
            }
        }
    }

    /// Drop all per-key state (snapshot replaced the world)
    pub fn reset(&mut self) {
        self.cache.invalidate();
        self.rendered.clear();
        self.highlights.clear();
        self.freshness.clear();
        self.last_key_count = 0;
    }

    /// Forget decay and cache state for keys that left the visible set
    pub fn forget_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a Key>) {
        for key in keys {
            if let Some(entry) = self.cache.remove(key) {
                for cell in entry.cells.values() {
                    self.rendered.remove(cell);
                }
            }
            self.highlights.forget_key(key);
            self.freshness.forget_key(key);
        }
    }

    fn rebuild(
        &mut self,
        view: &mut dyn TableView,
        rows: &HashMap<Key, RowUpdate>,
        order: &[Key],
        now: DateTime<Utc>,
    ) {
        self.rebuild_once(view, rows, order, now);

        // Zero rows out of a non-empty input is a corrupt render; retry
        // once, then surface and keep going
        if view.row_count() == 0 && !order.is_empty() {
            warn!("[Renderer] Rebuild produced no rows for {} keys, retrying", order.len());
            self.rebuild_once(view, rows, order, now);
            if view.row_count() == 0 {
                warn!("[Renderer] Retry also produced no rows, leaving view empty");
            }
        }
    }

    fn rebuild_once(
        &mut self,
        view: &mut dyn TableView,
        rows: &HashMap<Key, RowUpdate>,
        order: &[Key],
        now: DateTime<Utc>,
    ) {
        view.remove_all_rows();
        self.cache.invalidate();
        self.rendered.clear();

        for key in order {
            let row_handle = view.create_row(key);
            let mut cells = HashMap::with_capacity(self.columns.len());
            for column in &self.columns {
                let cell = view.create_cell(row_handle, &column.field);
                cells.insert(column.field.clone(), cell);
            }
            self.cache.insert(
                key.clone(),
                CacheEntry {
                    row: row_handle,
                    cells,
                },
            );
            self.patch_row(view, key, rows, now);
        }

        self.last_key_count = order.len();
        debug!("[Renderer] Rebuilt view with {} rows", order.len());
    }

    /// Write one key's cells, touching only cells whose text or class
    /// actually changed.
    fn patch_row(
        &mut self,
        view: &mut dyn TableView,
        key: &Key,
        rows: &HashMap<Key, RowUpdate>,
        now: DateTime<Utc>,
    ) {
        let row = match rows.get(key) {
            Some(row) => row,
            None => return,
        };

        // Columns are iterated by index so `self` stays borrowable for
        // the classify calls below
        for i in 0..self.columns.len() {
            let (field, fmt) = {
                let c = &self.columns[i];
                (c.field.clone(), c.format)
            };
            let cell = match self.cache.get(key).and_then(|e| e.cells.get(&field)) {
                Some(cell) => *cell,
                None => continue,
            };
            let value = row.fields.get(&field).cloned().unwrap_or(RawValue::Absent);

            let class = match fmt {
                ColumnFormat::Timestamp => {
                    CellClass::from(self.freshness.classify(key, row.timestamp, now))
                }
                ColumnFormat::Text => CellClass::Neutral,
                _ => CellClass::from(self.highlights.classify(key, &field, &value)),
            };
            let text = fmt.render(&value);

            let next = RenderedCell { text, class };
            if self.rendered.get(&cell) == Some(&next) {
                continue;
            }
            let prev = self.rendered.insert(cell, next.clone());
            if prev.as_ref().map(|p| p.text.as_str()) != Some(next.text.as_str()) {
                view.set_cell_text(cell, &next.text);
            }
            if prev.as_ref().map(|p| p.class) != Some(next.class) {
                view.set_cell_class(cell, next.class);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Records every call so tests can assert on write traffic
    #[derive(Default)]
    struct RecordingView {
        next_handle: u64,
        rows: Vec<Key>,
        text_writes: Vec<(CellHandle, String)>,
        class_writes: Vec<(CellHandle, CellClass)>,
        cell_fields: HashMap<CellHandle, FieldName>,
    }

    impl TableView for RecordingView {
        fn create_row(&mut self, key: &Key) -> RowHandle {
            self.next_handle += 1;
            self.rows.push(key.clone());
            RowHandle(self.next_handle)
        }

        fn create_cell(&mut self, _row: RowHandle, field: &FieldName) -> CellHandle {
            self.next_handle += 1;
            let cell = CellHandle(self.next_handle);
            self.cell_fields.insert(cell, field.clone());
            cell
        }

        fn set_cell_text(&mut self, cell: CellHandle, text: &str) {
            self.text_writes.push((cell, text.to_string()));
        }

        fn set_cell_class(&mut self, cell: CellHandle, class: CellClass) {
            self.class_writes.push((cell, class));
        }

        fn remove_all_rows(&mut self) {
            self.rows.clear();
        }

        fn row_count(&self) -> usize {
            self.rows.len()
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(
            vec![
                ColumnSpec::new("symbol", ColumnFormat::Text),
                ColumnSpec::new("price", ColumnFormat::Currency),
            ],
            HighlightEngine::new(1e-4, 8),
            FreshnessClassifier::new(Duration::seconds(60), 8),
        )
    }

    fn row(key: &str, price: f64) -> RowUpdate {
        RowUpdate::new(Key::from(key), Utc::now())
            .with_field("symbol", RawValue::Text(key.to_string()))
            .with_field("price", RawValue::Number(price))
    }

    fn world(entries: &[RowUpdate]) -> HashMap<Key, RowUpdate> {
        entries.iter().map(|r| (r.key.clone(), r.clone())).collect()
    }

    #[test]
    fn first_render_builds_rows_in_order() {
        let mut r = renderer();
        let mut view = RecordingView::default();
        let rows = world(&[row("BTCUSDT", 64000.0), row("ETHUSDT", 3100.0)]);
        let order: Vec<Key> = vec!["ETHUSDT".into(), "BTCUSDT".into()];

        r.render(&mut view, &rows, &rows, &order, false, Utc::now());
        assert_eq!(view.rows, vec![Key::from("ETHUSDT"), Key::from("BTCUSDT")]);
    }

    #[test]
    fn unchanged_values_produce_no_writes() {
        let mut r = renderer();
        let mut view = RecordingView::default();
        let rows = world(&[row("BTCUSDT", 64000.0)]);
        let order: Vec<Key> = vec!["BTCUSDT".into()];

        r.render(&mut view, &rows, &rows, &order, false, Utc::now());
        let writes_after_build = view.text_writes.len();

        // Same values again, incremental path
        r.render(&mut view, &rows, &rows, &order, false, Utc::now());
        assert_eq!(view.text_writes.len(), writes_after_build);
    }

    #[test]
    fn a_price_move_patches_only_the_price_cell() {
        let mut r = renderer();
        let mut view = RecordingView::default();
        let mut rows = world(&[row("BTCUSDT", 64000.0)]);
        let order: Vec<Key> = vec!["BTCUSDT".into()];

        r.render(&mut view, &rows, &rows, &order, false, Utc::now());
        view.text_writes.clear();
        view.class_writes.clear();

        rows.insert(Key::from("BTCUSDT"), row("BTCUSDT", 64100.0));
        let batch = rows.clone();
        r.render(&mut view, &batch, &rows, &order, false, Utc::now());

        assert_eq!(view.text_writes.len(), 1);
        assert_eq!(
            view.cell_fields[&view.text_writes[0].0],
            FieldName::from("price")
        );
        // And the cell went Up
        assert!(view
            .class_writes
            .iter()
            .any(|(_, class)| *class == CellClass::Up));
    }

    #[test]
    fn new_key_triggers_a_rebuild() {
        let mut r = renderer();
        let mut view = RecordingView::default();
        let mut rows = world(&[row("BTCUSDT", 64000.0)]);
        let order: Vec<Key> = vec!["BTCUSDT".into()];
        r.render(&mut view, &rows, &rows, &order, false, Utc::now());

        let newcomer = row("SOLUSDT", 145.0);
        rows.insert(newcomer.key.clone(), newcomer.clone());
        let batch: HashMap<Key, RowUpdate> =
            [(newcomer.key.clone(), newcomer)].into_iter().collect();
        let order: Vec<Key> = vec!["BTCUSDT".into(), "SOLUSDT".into()];

        r.render(&mut view, &batch, &rows, &order, false, Utc::now());
        assert_eq!(view.row_count(), 2);
    }

    #[test]
    fn corrupt_render_retries_once() {
        /// A view that swallows row creation for the first rebuild pass
        struct FlakyView {
            inner: RecordingView,
            broken_passes: usize,
            pass: usize,
        }

        impl TableView for FlakyView {
            fn create_row(&mut self, key: &Key) -> RowHandle {
                if self.pass <= self.broken_passes {
                    return RowHandle(0);
                }
                self.inner.create_row(key)
            }
            fn create_cell(&mut self, row: RowHandle, field: &FieldName) -> CellHandle {
                self.inner.create_cell(row, field)
            }
            fn set_cell_text(&mut self, cell: CellHandle, text: &str) {
                self.inner.set_cell_text(cell, text)
            }
            fn set_cell_class(&mut self, cell: CellHandle, class: CellClass) {
                self.inner.set_cell_class(cell, class)
            }
            fn remove_all_rows(&mut self) {
                self.pass += 1;
                self.inner.remove_all_rows()
            }
            fn row_count(&self) -> usize {
                self.inner.row_count()
            }
        }

        let mut r = renderer();
        let mut view = FlakyView {
            inner: RecordingView::default(),
            broken_passes: 1,
            pass: 0,
        };
        let rows = world(&[row("BTCUSDT", 64000.0)]);
        let order: Vec<Key> = vec!["BTCUSDT".into()];

        r.render(&mut view, &rows, &rows, &order, false, Utc::now());
        // The retry pass rendered the row
        assert_eq!(view.row_count(), 1);
    }

    #[test]
    fn absent_fields_render_as_empty_text() {
        let mut r = renderer();
        let mut view = RecordingView::default();
        let bare = RowUpdate::new(Key::from("BTCUSDT"), Utc::now())
            .with_field("symbol", RawValue::Text("BTCUSDT".into()));
        let rows = world(&[bare]);
        let order: Vec<Key> = vec!["BTCUSDT".into()];

        r.render(&mut view, &rows, &rows, &order, false, Utc::now());
        let price_write = view
            .text_writes
            .iter()
            .find(|(cell, _)| view.cell_fields[cell] == FieldName::from("price"));
        // Absent degrades to an empty string, never a panic
        assert_eq!(price_write.map(|(_, t)| t.as_str()), Some(""));
    }
}
