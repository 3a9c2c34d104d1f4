//! ============================================================================
//! Builder Metrics - Typed events for every design mutation
//! ============================================================================
//! The engine reports each mutating operation to a `MetricsSink` injected at
//! construction. There is no process-wide registry; tests hand the engine a
//! `RecordingSink` and inspect what it captured.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::types::{OrderItem, SlotIndex};

/// How a trinket arrived in a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMethod {
    Tap,
    Drag,
    Swap,
}

/// How a trinket left a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMethod {
    Tap,
    Controls,
    Toolbar,
}

impl PlacementMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::Drag => "drag",
            Self::Swap => "swap",
        }
    }
}

impl RemovalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::Controls => "controls",
            Self::Toolbar => "toolbar",
        }
    }
}

/// One builder event, tagged by name for offline analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "name",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum BuilderEvent {
    TrinketAdd {
        index: SlotIndex,
        trinket_id: String,
        replaced_id: Option<String>,
        method: PlacementMethod,
    },
    TrinketRemove {
        index: SlotIndex,
        trinket_id: String,
        method: RemovalMethod,
    },
    TrinketMove {
        from: SlotIndex,
        to: SlotIndex,
        trinket_id: String,
        replaced_id: Option<String>,
    },
    TrinketDuplicate {
        from: SlotIndex,
        to: SlotIndex,
        trinket_id: String,
    },
    StyleChange {
        index: SlotIndex,
        trinket_id: String,
    },
    Randomize {
        count: usize,
        in_pack: bool,
    },
    DesignReset {
        slot_count: usize,
    },
    CheckoutUnlocked {
        placed_count: usize,
    },
    CheckoutStart {
        total: f64,
        placed_count: usize,
        items: Vec<OrderItem>,
        pack_id: Option<String>,
        budget: f64,
    },
    CheckoutSubmit {
        total: f64,
        placed_count: usize,
        items: Vec<OrderItem>,
        pack_id: Option<String>,
        budget: f64,
    },
}

impl BuilderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrinketAdd { .. } => "trinket_add",
            Self::TrinketRemove { .. } => "trinket_remove",
            Self::TrinketMove { .. } => "trinket_move",
            Self::TrinketDuplicate { .. } => "trinket_duplicate",
            Self::StyleChange { .. } => "style_change",
            Self::Randomize { .. } => "randomize",
            Self::DesignReset { .. } => "design_reset",
            Self::CheckoutUnlocked { .. } => "checkout_unlocked",
            Self::CheckoutStart { .. } => "checkout_start",
            Self::CheckoutSubmit { .. } => "checkout_submit",
        }
    }
}

/// Event plus the time it was recorded (unix millis)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    #[serde(flatten)]
    pub event: BuilderEvent,
    pub timestamp: i64,
}

impl MetricEvent {
    pub fn now(event: BuilderEvent) -> Self {
        Self {
            event,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Receiver for builder events
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: &MetricEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&self, _event: &MetricEvent) {}
}

/// Logs each event as a structured tracing record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, event: &MetricEvent) {
        let payload = serde_json::to_string(&event.event).unwrap_or_default();
        info!(target: "caselab_core::metrics", event = event.event.name(), %payload, "builder event");
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<MetricEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<MetricEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Recorded events without timestamps
    pub fn builder_events(&self) -> Vec<BuilderEvent> {
        self.events().into_iter().map(|e| e.event).collect()
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl MetricsSink for RecordingSink {
    fn record(&self, event: &MetricEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
