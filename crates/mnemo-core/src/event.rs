use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::{ItemId, Tier};

/// Why an item left its tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Strength or importance fell below the tier's floor during decay.
    Decayed,
    /// Purged by consolidation after being summarised into a longer-lived tier.
    Consolidated,
    /// Removed explicitly by a caller.
    Explicit,
}

/// Telemetry emitted by the memory coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryEvent {
    Stored {
        id: ItemId,
        tier: Tier,
    },
    /// Capacity eviction. Informational: this is steady-state behavior, not a failure.
    Evicted {
        id: ItemId,
        tier: Tier,
    },
    Removed {
        id: ItemId,
        tier: Tier,
        reason: RemovalReason,
    },
    Consolidated {
        episode_id: Uuid,
        concepts: Vec<ItemId>,
        purged_traces: usize,
    },
    SweepCompleted {
        at: DateTime<Utc>,
        removed: usize,
    },
}

/// A broadcast-based event bus for memory telemetry.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<MemoryEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: MemoryEvent) {
        // A send error only means nobody is subscribed.
        if self.sender.send(event).is_err() {
            tracing::trace!("memory event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MemoryEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
