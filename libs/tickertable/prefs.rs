//! Persisted user preferences: sort spec, pin list, column layout.
//!
//! The store is an opaque blob of serialized JSON behind a small trait;
//! anything absent or malformed falls back to defaults without error,
//! so a corrupt preference file can never take the table down.

use crate::model::Key;
use crate::render::ColumnSpec;
use crate::sort::SortSpec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Backing storage for serialized preferences
pub trait PreferenceStore: Send + Sync {
    /// Raw serialized blob, `None` if nothing was ever stored
    fn load(&self) -> Option<String>;
    fn store(&self, raw: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Preferences {
    #[serde(default)]
    pub sort: SortSpec,
    #[serde(default)]
    pub pinned: Vec<Key>,
    /// `None` means "use the built-in column layout"
    #[serde(default)]
    pub columns: Option<Vec<ColumnSpec>>,
}

impl Preferences {
    /// Load from a store, degrading to defaults on anything unexpected
    pub fn load_from(store: &dyn PreferenceStore) -> Self {
        match store.load() {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!("[Prefs] Stored preferences are corrupt ({}), using defaults", e);
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    pub fn save_to(&self, store: &dyn PreferenceStore) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        store.store(&raw)
    }
}

// ============================================================================
// Store implementations
// ============================================================================

/// JSON file on disk, the normal production store
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Option<String> {
        fs::read_to_string(&self.path).ok()
    }

    fn store(&self, raw: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryPreferenceStore {
    blob: parking_lot::Mutex<Option<String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a raw blob, bypassing serialization
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            blob: parking_lot::Mutex::new(Some(raw.into())),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Option<String> {
        self.blob.lock().clone()
    }

    fn store(&self, raw: &str) -> anyhow::Result<()> {
        *self.blob.lock() = Some(raw.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDirection;

    #[test]
    fn round_trip_through_memory_store() {
        let store = MemoryPreferenceStore::new();
        let prefs = Preferences {
            sort: SortSpec {
                field: "price".into(),
                direction: SortDirection::Descending,
            },
            pinned: vec![Key::from("BTCUSDT"), Key::from("ETHUSDT")],
            columns: None,
        };

        prefs.save_to(&store).unwrap();
        assert_eq!(Preferences::load_from(&store), prefs);
    }

    #[test]
    fn empty_store_yields_defaults() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(Preferences::load_from(&store), Preferences::default());
    }

    #[test]
    fn corrupt_blob_yields_defaults() {
        let store = MemoryPreferenceStore::with_raw("{not json");
        assert_eq!(Preferences::load_from(&store), Preferences::default());

        let wrong_shape = MemoryPreferenceStore::with_raw(r#"{"sort": 42}"#);
        assert_eq!(Preferences::load_from(&wrong_shape), Preferences::default());
    }

    #[test]
    fn missing_fields_fill_with_defaults() {
        let store = MemoryPreferenceStore::with_raw(r#"{"pinned": ["SOLUSDT"]}"#);
        let prefs = Preferences::load_from(&store);
        assert_eq!(prefs.pinned, vec![Key::from("SOLUSDT")]);
        assert_eq!(prefs.sort, SortSpec::default());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("prefs.json"));
        assert!(store.load().is_none());

        let prefs = Preferences {
            pinned: vec![Key::from("BTCUSDT")],
            ..Preferences::default()
        };
        prefs.save_to(&store).unwrap();
        assert_eq!(Preferences::load_from(&store), prefs);
    }
}
