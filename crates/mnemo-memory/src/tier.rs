use chrono::{DateTime, Duration, Utc};
use mnemo_core::{ItemId, Tier};
use serde::{Deserialize, Serialize};

/// Count and salience summary of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub count: usize,
    pub average_strength: f64,
    /// `count / capacity`.
    pub utilization: f64,
}

/// Operations every tier supports, used by the coordinator for status and decay sweeps.
pub trait MemoryTier: Send + Sync {
    fn tier(&self) -> Tier;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    /// Mean strength (or importance) across all items; 0 when empty.
    fn average_strength(&self) -> f64;

    fn contains(&self, id: &ItemId) -> bool;

    /// Apply `elapsed` worth of decay as of `now` and return the ids that fell below the floor.
    fn decay(&mut self, elapsed: Duration, now: DateTime<Utc>) -> Vec<ItemId>;

    fn stats(&self) -> TierStats {
        let count = self.len();
        let capacity = self.capacity().max(1);
        TierStats {
            count,
            average_strength: self.average_strength(),
            utilization: count as f64 / capacity as f64,
        }
    }
}
