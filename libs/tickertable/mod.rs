//! Incremental stream-to-view reconciliation for a live ticker table.
//!
//! A high-frequency feed of keyed row updates is coalesced into bounded
//! view refreshes: per-field highlight and freshness decay, an O(1)
//! key-to-handle cache, stable sort with pinning, and a batching
//! scheduler that never flushes more than once per display frame. The
//! rendering surface is abstract; supply a [`render::TableView`] and an
//! [`source::UpdateSource`] and the engine does the rest.

pub mod cache;
pub mod config;
pub mod engine;
pub mod format;
pub mod freshness;
pub mod highlight;
pub mod model;
pub mod prefs;
pub mod render;
pub mod scheduler;
pub mod sort;
pub mod source;

pub use config::EngineConfig;
pub use engine::{EngineCore, TickerEngine};
pub use model::{AlertEvent, FieldName, Key, RawValue, RowUpdate, StreamMessage};
pub use prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
pub use render::{CellClass, CellHandle, ColumnFormat, ColumnSpec, RowHandle, TableView};
pub use sort::{PinBoard, SortDirection, SortEngine, SortSpec};
pub use source::{PollSource, SourceEvent, StreamSource, TickerWireParser, UpdateSource};
