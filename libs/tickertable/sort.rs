//! Sort & pinning engine.
//!
//! Pinned keys always render first, in the order they were pinned. The
//! remainder is ordered by the active sort spec, with type-aware
//! comparison per field: the identity column compares as text, the
//! timestamp column by parsed time, and everything else by a best-effort
//! numeric parse that understands currency/percent decoration and
//! magnitude suffixes.

use crate::model::{FieldName, Key, RawValue, RowUpdate};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::warn;

/// Hard cap on the pinned set; pinning beyond it is rejected, not evicted
pub const MAX_PINNED_KEYS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

/// Single global sort choice: one field, one direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: FieldName,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: FieldName::from("symbol"),
            direction: SortDirection::Ascending,
        }
    }
}

// ============================================================================
// Pinned set
// ============================================================================

/// Ordered pinned subset: insertion order is render order
#[derive(Debug, Clone)]
pub struct PinBoard {
    capacity: usize,
    pinned: Vec<Key>,
}

impl Default for PinBoard {
    fn default() -> Self {
        Self::new(MAX_PINNED_KEYS)
    }
}

impl PinBoard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pinned: Vec::new(),
        }
    }

    /// Restore a persisted pin list, truncated to capacity
    pub fn restore(capacity: usize, mut keys: Vec<Key>) -> Self {
        keys.truncate(capacity);
        Self {
            capacity,
            pinned: keys,
        }
    }

    /// Pin a key, appending it to the pin order. Returns false when the
    /// board is full or the key is already pinned.
    pub fn pin(&mut self, key: Key) -> bool {
        if self.pinned.contains(&key) {
            return false;
        }
        if self.pinned.len() >= self.capacity {
            warn!("[PinBoard] Pin limit of {} reached, rejecting {}", self.capacity, key);
            return false;
        }
        self.pinned.push(key);
        true
    }

    /// Unpin a key; the remaining pins keep their relative order
    pub fn unpin(&mut self, key: &Key) -> bool {
        let before = self.pinned.len();
        self.pinned.retain(|k| k != key);
        self.pinned.len() != before
    }

    /// Pin if unpinned, unpin if pinned. Returns the new pinned status.
    pub fn toggle(&mut self, key: &Key) -> bool {
        if self.is_pinned(key) {
            self.unpin(key);
            false
        } else {
            self.pin(key.clone())
        }
    }

    pub fn is_pinned(&self, key: &Key) -> bool {
        self.pinned.contains(key)
    }

    pub fn keys(&self) -> &[Key] {
        &self.pinned
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

// ============================================================================
// Field comparison
// ============================================================================

/// How a field's values compare against each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Identity,
    Timestamp,
    Numeric,
}

fn field_kind(field: &FieldName) -> FieldKind {
    match field.as_str() {
        "symbol" | "name" | "status" => FieldKind::Identity,
        "timestamp" | "updated_at" | "last_update" => FieldKind::Timestamp,
        _ => FieldKind::Numeric,
    }
}

/// Comparable form of one field value. Numeric always orders before
/// non-numeric regardless of sort direction; missing values order last.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Numeric(f64),
    Time(i64),
    Text(String),
    Missing,
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Numeric(_) => 0,
            SortKey::Time(_) => 0,
            SortKey::Text(_) => 1,
            SortKey::Missing => 2,
        }
    }

    fn compare(&self, other: &Self, direction: SortDirection) -> Ordering {
        // Parseable-before-unparseable is absolute, direction applies
        // only within the same rank
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match (self, other) {
            (SortKey::Numeric(a), SortKey::Numeric(b)) => {
                direction.apply(a.partial_cmp(b).unwrap_or(Ordering::Equal))
            }
            (SortKey::Time(a), SortKey::Time(b)) => direction.apply(a.cmp(b)),
            (SortKey::Numeric(a), SortKey::Time(b)) => {
                direction.apply(a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal))
            }
            (SortKey::Time(a), SortKey::Numeric(b)) => {
                direction.apply((*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal))
            }
            (SortKey::Text(a), SortKey::Text(b)) => direction.apply(a.cmp(b)),
            _ => Ordering::Equal,
        }
    }
}

/// Best-effort numeric parse: strips `$`, `%`, thousands separators, and
/// scales trailing K/M/B/T magnitude suffixes.
fn parse_decorated_number(text: &str) -> Option<f64> {
    let trimmed = text.trim().trim_start_matches('$').trim_end_matches('%');
    let trimmed = trimmed.replace(',', "");
    if trimmed.is_empty() {
        return None;
    }

    let (body, multiplier) = match trimmed.chars().last() {
        Some('K') | Some('k') => (&trimmed[..trimmed.len() - 1], 1e3),
        Some('M') | Some('m') => (&trimmed[..trimmed.len() - 1], 1e6),
        Some('B') | Some('b') => (&trimmed[..trimmed.len() - 1], 1e9),
        Some('T') | Some('t') => (&trimmed[..trimmed.len() - 1], 1e12),
        _ => (trimmed.as_str(), 1.0),
    };
    body.parse::<f64>().ok().map(|n| n * multiplier)
}

fn timestamp_sort_key(value: &RawValue) -> SortKey {
    match value {
        RawValue::Number(n) => SortKey::Time(*n as i64),
        RawValue::Text(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(ts) => SortKey::Time(ts.timestamp_millis()),
            // Unparsable timestamps fall back to string comparison
            Err(_) => SortKey::Text(s.to_lowercase()),
        },
        RawValue::Absent => SortKey::Missing,
    }
}

fn sort_key_for(field: &FieldName, value: Option<&RawValue>) -> SortKey {
    let value = match value {
        Some(v) if !v.is_absent() => v,
        _ => return SortKey::Missing,
    };
    match field_kind(field) {
        FieldKind::Identity => match value.as_text() {
            Some(s) if !s.is_empty() => SortKey::Text(s.to_lowercase()),
            _ => SortKey::Missing,
        },
        FieldKind::Timestamp => timestamp_sort_key(value),
        FieldKind::Numeric => match value {
            RawValue::Number(n) => SortKey::Numeric(*n),
            RawValue::Text(s) => match parse_decorated_number(s) {
                Some(n) => SortKey::Numeric(n),
                None => SortKey::Text(s.to_lowercase()),
            },
            RawValue::Absent => SortKey::Missing,
        },
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Produces the full render order: pinned keys first (pin order), then
/// the rest by the active sort spec.
#[derive(Debug, Default)]
pub struct SortEngine {
    spec: SortSpec,
    pins: PinBoard,
}

impl SortEngine {
    pub fn new(spec: SortSpec, pins: PinBoard) -> Self {
        Self { spec, pins }
    }

    pub fn spec(&self) -> &SortSpec {
        &self.spec
    }

    pub fn set_spec(&mut self, spec: SortSpec) {
        self.spec = spec;
    }

    pub fn pins(&self) -> &PinBoard {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut PinBoard {
        &mut self.pins
    }

    /// Full ordering over `keys`. Deterministic for unchanged inputs:
    /// ties break on the key itself, so repeated calls agree.
    pub fn order(&self, keys: &[Key], rows: &HashMap<Key, RowUpdate>) -> Vec<Key> {
        let pinned: Vec<Key> = self
            .pins
            .keys()
            .iter()
            .filter(|k| keys.contains(k))
            .cloned()
            .collect();

        let mut remainder: Vec<(Key, SortKey)> = keys
            .iter()
            .filter(|k| !self.pins.is_pinned(k))
            .map(|k| {
                let value = rows.get(k).and_then(|row| row.fields.get(&self.spec.field));
                (k.clone(), sort_key_for(&self.spec.field, value))
            })
            .collect();

        remainder.sort_by(|(key_a, a), (key_b, b)| {
            a.compare(b, self.spec.direction).then_with(|| key_a.cmp(key_b))
        });

        let mut out = pinned;
        out.extend(remainder.into_iter().map(|(k, _)| k));
        out
    }
}
