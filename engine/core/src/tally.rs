//! Failure tally
//!
//! Counts consecutive shell misses (no builtin, and the model fallback said
//! "not found" too). Reaching the threshold offers help once per session;
//! entering the guided assistant clears both the count and the latch.

use serde::{Deserialize, Serialize};

use crate::store::{keys, KeyValueStore, StoreError, StoreExt};

/// Misses in a row before help is offered
pub const DEFAULT_HELP_THRESHOLD: u32 = 3;

/// Consecutive misses and the one-time offer latch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureTally {
    /// Misses since the last resolved command
    pub count: u32,
    /// Whether help was already offered
    pub already_prompted: bool,
}

impl FailureTally {
    /// Count a miss; `true` exactly when help should be offered now
    pub fn record_miss(&mut self, threshold: u32) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count >= threshold && !self.already_prompted {
            self.already_prompted = true;
            return true;
        }
        false
    }

    /// A command resolved; the offer latch stays set
    pub fn record_success(&mut self) {
        self.count = 0;
    }

    /// Forget everything (guided assistant entered)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Stored tally, or a fresh one
    #[must_use]
    pub fn load(store: &dyn KeyValueStore) -> Self {
        store.get_json(keys::FAILURE_TALLY).unwrap_or_default()
    }

    /// Persist this tally
    ///
    /// # Errors
    ///
    /// Fails if the store cannot persist it.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.set_json(keys::FAILURE_TALLY, self)
    }
}
