//! Comparison & highlight engine.
//!
//! Tracks per (key, field) movement: a value that just moved stays marked
//! Up or Down for the next N render passes even if it stops moving, then
//! fades back to Neutral. A value that keeps moving in the same direction
//! keeps resetting the budget; the counter only decays on no-change
//! renders.

use crate::model::{FieldName, Key, RawValue};
use std::collections::HashMap;

/// Direction class applied to a rendered cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightClass {
    Up,
    Down,
    Neutral,
}

/// Decay state for one (key, field)
#[derive(Debug, Clone, Copy)]
struct HighlightState {
    class: HighlightClass,
    updates_remaining: u32,
}

/// Owns previous values and decay counters for every (key, field) pair.
///
/// Mutated exclusively during a render pass; the scheduler guarantees a
/// single mutation thread.
pub struct HighlightEngine {
    /// Dead zone below which a numeric move does not count
    epsilon: f64,
    /// Render passes a highlight persists after movement stops
    persistence: u32,
    previous: HashMap<(Key, FieldName), f64>,
    states: HashMap<(Key, FieldName), HighlightState>,
}

impl HighlightEngine {
    pub fn new(epsilon: f64, persistence: u32) -> Self {
        Self {
            epsilon,
            persistence,
            previous: HashMap::new(),
            states: HashMap::new(),
        }
    }

    /// Classify a field's new value against its recorded previous value.
    ///
    /// Called once per rendered field per pass; also advances the decay
    /// counter for unchanged values.
    pub fn classify(&mut self, key: &Key, field: &FieldName, new_value: &RawValue) -> HighlightClass {
        let slot = (key.clone(), field.clone());

        let new_num = match new_value.as_number() {
            Some(n) => n,
            None => {
                // Non-numeric: any lingering highlight is cleared
                self.states.remove(&slot);
                self.previous.remove(&slot);
                return HighlightClass::Neutral;
            }
        };

        let prev = match self.previous.insert(slot.clone(), new_num) {
            Some(p) => p,
            None => return HighlightClass::Neutral,
        };

        let delta = new_num - prev;
        if delta > self.epsilon {
            self.states.insert(
                slot,
                HighlightState {
                    class: HighlightClass::Up,
                    updates_remaining: self.persistence,
                },
            );
            HighlightClass::Up
        } else if delta < -self.epsilon {
            self.states.insert(
                slot,
                HighlightState {
                    class: HighlightClass::Down,
                    updates_remaining: self.persistence,
                },
            );
            HighlightClass::Down
        } else {
            // Effectively unchanged: decay, never reset
            match self.states.get_mut(&slot) {
                Some(state) => {
                    state.updates_remaining -= 1;
                    let class = state.class;
                    if state.updates_remaining == 0 {
                        self.states.remove(&slot);
                    }
                    class
                }
                None => HighlightClass::Neutral,
            }
        }
    }

    /// Remaining decay budget for a (key, field), if any
    pub fn remaining(&self, key: &Key, field: &FieldName) -> Option<u32> {
        self.states
            .get(&(key.clone(), field.clone()))
            .map(|s| s.updates_remaining)
    }

    /// Drop all state for a key that left the visible set
    pub fn forget_key(&mut self, key: &Key) {
        self.previous.retain(|(k, _), _| k != key);
        self.states.retain(|(k, _), _| k != key);
    }

    /// Drop everything (snapshot replacement)
    pub fn clear(&mut self) {
        self.previous.clear();
        self.states.clear();
    }
}
