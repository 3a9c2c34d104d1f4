// ============================================================================
// Snapshot Store - Best-effort persistence of the current design
// ============================================================================
// The store never fails toward the engine: corrupt or missing data loads as
// an all-empty grid, and write errors are logged and swallowed.
// Backends: in-memory (tests, no durable storage) and redb.
// ============================================================================

mod redb_store;

pub use redb_store::RedbBackend;

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::style::{normalize_style, StylePatch};
use crate::types::{Design, SlotMap, SlotStyleMap};

/// Key holding slot contents
pub const DESIGN_KEY: &str = "design-v1";

/// Key holding per-slot styles
pub const STYLES_KEY: &str = "design-styles-v1";

/// Raw durable key-value storage
pub trait SnapshotBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Volatile backend for tests and environments without durable storage
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory backend lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory backend lock poisoned"))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory backend lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Load/save/reset for slot contents and styles
pub struct SnapshotStore {
    backend: Box<dyn SnapshotBackend>,
}

impl SnapshotStore {
    pub fn new(backend: impl SnapshotBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Store backed by memory only
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Slots normalized to `slot_count` entries; all-empty on any failure
    pub fn load_slots(&self, slot_count: usize) -> SlotMap {
        let Some(raw) = self.read_json(DESIGN_KEY) else {
            return SlotMap::empty(slot_count);
        };
        let entries = match raw {
            Value::Array(items) => items.iter().map(slot_entry).collect(),
            Value::Object(map) => {
                let mut entries = vec![None; slot_count];
                for (k, v) in &map {
                    if let Some(slot) = k.parse::<usize>().ok().and_then(|i| entries.get_mut(i)) {
                        *slot = slot_entry(v);
                    }
                }
                entries
            }
            _ => {
                warn!("Ignoring saved design with unexpected shape");
                Vec::new()
            }
        };
        SlotMap::from_entries(entries, slot_count)
    }

    pub fn save_slots(&self, slots: &SlotMap) {
        self.write_json(DESIGN_KEY, slots);
    }

    pub fn reset_slots(&self) {
        self.remove(DESIGN_KEY);
    }

    /// Styles with every entry normalized; empty on any failure
    pub fn load_styles(&self) -> SlotStyleMap {
        let mut styles = SlotStyleMap::new();
        let Some(Value::Object(map)) = self.read_json(STYLES_KEY) else {
            return styles;
        };
        for (k, v) in map {
            let Ok(index) = k.parse::<usize>() else {
                continue;
            };
            if let Ok(patch) = serde_json::from_value::<StylePatch>(v) {
                styles.insert(index, normalize_style(&patch));
            }
        }
        styles
    }

    pub fn save_styles(&self, styles: &SlotStyleMap) {
        self.write_json(STYLES_KEY, styles);
    }

    pub fn reset_styles(&self) {
        self.remove(STYLES_KEY);
    }

    /// Slots and styles together; styles on empty or missing slots are dropped
    pub fn load_design(&self, slot_count: usize) -> Design {
        let slots = self.load_slots(slot_count);
        let mut styles = self.load_styles();
        styles.retain(|i, _| slots.get(*i).is_some());
        Design { slots, styles }
    }

    pub fn save_design(&self, design: &Design) {
        self.save_slots(&design.slots);
        self.save_styles(&design.styles);
    }

    pub fn reset_design(&self) {
        self.reset_slots();
        self.reset_styles();
    }

    fn read_json(&self, key: &str) -> Option<Value> {
        let bytes = match self.backend.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding corrupt {}: {}", key, e);
                None
            }
        }
    }

    fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to serialize {}: {}", key, e);
                return;
            }
        };
        match self.backend.put(key, &bytes) {
            Ok(()) => debug!("Saved {} ({} bytes)", key, bytes.len()),
            Err(e) => warn!("Failed to save {}: {}", key, e),
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.backend.delete(key) {
            warn!("Failed to reset {}: {}", key, e);
        }
    }
}

fn slot_entry(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
