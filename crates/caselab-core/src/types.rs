//! ============================================================================
//! Core Types for Case Lab
//! ============================================================================
//! Defines the data structures shared by the builder engine, the catalog
//! client and the snapshot store. Field names serialize in camelCase so the
//! JSON matches what the catalog API and the web builder exchange.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of one position in the fixed-size case grid
pub type SlotIndex = usize;

/// Default number of slots on the case grid
pub const DEFAULT_SLOT_COUNT: usize = 20;

/// Default number of grid columns
pub const DEFAULT_COLS: usize = 4;

/// A purchasable sticker/charm definition.
/// Reference data supplied by the catalog; identified by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trinket {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Trinket {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            icon: None,
            tags: None,
        }
    }

    /// Tags as a slice (empty when the trinket has none)
    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

/// Visual transform applied to a placed trinket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerStyle {
    /// 0.6 - 1.6
    pub scale: f64,
    /// Degrees, -180 - 180
    pub rotate: f64,
    /// 0 - 3 (drop-shadow intensity)
    pub depth: f64,
    pub z_index: i64,
}

/// Slot contents for the whole grid.
///
/// Every index in `0..len()` has an explicit entry; `None` means the slot is
/// empty, not that it was never allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotMap(Vec<Option<String>>);

impl SlotMap {
    /// All-empty grid with `slot_count` slots
    pub fn empty(slot_count: usize) -> Self {
        Self(vec![None; slot_count])
    }

    /// Build from raw entries, padding or truncating to `slot_count`.
    pub fn from_entries(mut entries: Vec<Option<String>>, slot_count: usize) -> Self {
        entries.resize(slot_count, None);
        Self(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trinket id at `index`, `None` when empty or out of range
    pub fn get(&self, index: SlotIndex) -> Option<&str> {
        self.0.get(index).and_then(|s| s.as_deref())
    }

    /// Set the slot contents. Out-of-range indices are ignored.
    pub fn set(&mut self, index: SlotIndex, trinket_id: Option<String>) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = trinket_id;
        }
    }

    /// Take the slot contents, leaving it empty
    pub fn take(&mut self, index: SlotIndex) -> Option<String> {
        self.0.get_mut(index).and_then(Option::take)
    }

    /// Iterate `(index, trinket id)` pairs for every slot
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, Option<&str>)> {
        self.0.iter().enumerate().map(|(i, s)| (i, s.as_deref()))
    }

    /// Iterate only the occupied slots
    pub fn occupied(&self) -> impl Iterator<Item = (SlotIndex, &str)> {
        self.iter().filter_map(|(i, s)| s.map(|id| (i, id)))
    }

    /// First empty slot by ascending index
    pub fn first_empty(&self) -> Option<SlotIndex> {
        self.0.iter().position(Option::is_none)
    }

    /// Number of occupied slots
    pub fn placed_count(&self) -> usize {
        self.0.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn swap(&mut self, a: SlotIndex, b: SlotIndex) {
        self.0.swap(a, b);
    }
}

/// Per-slot styles. Only occupied slots carry an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotStyleMap(BTreeMap<SlotIndex, StickerStyle>);

impl SlotStyleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: SlotIndex) -> Option<&StickerStyle> {
        self.0.get(&index)
    }

    pub fn insert(&mut self, index: SlotIndex, style: StickerStyle) {
        self.0.insert(index, style);
    }

    pub fn remove(&mut self, index: SlotIndex) -> Option<StickerStyle> {
        self.0.remove(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &StickerStyle)> {
        self.0.iter().map(|(i, s)| (*i, s))
    }

    /// Highest z-index over all styled slots (0 when there are none)
    pub fn max_z_index(&self) -> i64 {
        self.0.values().map(|s| s.z_index).max().unwrap_or(0)
    }

    /// Lowest z-index over all styled slots (0 when there are none)
    pub fn min_z_index(&self) -> i64 {
        self.0.values().map(|s| s.z_index).min().unwrap_or(0)
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&SlotIndex, &mut StickerStyle) -> bool) {
        self.0.retain(f);
    }
}

/// One undoable design: slot contents plus their styles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub slots: SlotMap,
    pub styles: SlotStyleMap,
}

impl Design {
    /// All-empty design for a grid of `slot_count` slots
    pub fn empty(slot_count: usize) -> Self {
        Self {
            slots: SlotMap::empty(slot_count),
            styles: SlotStyleMap::new(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Clear a slot and drop its style
    pub fn clear_slot(&mut self, index: SlotIndex) -> Option<String> {
        self.styles.remove(index);
        self.slots.take(index)
    }

    /// True when every style entry belongs to an occupied slot
    pub fn is_consistent(&self) -> bool {
        self.styles.iter().all(|(i, _)| self.slots.get(i).is_some())
    }
}

/// Catalog contents: case base price plus purchasable trinkets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogData {
    pub case_price: f64,
    pub trinkets: Vec<Trinket>,
}

impl CatalogData {
    pub fn find(&self, id: &str) -> Option<&Trinket> {
        self.trinkets.iter().find(|t| t.id == id)
    }
}

/// Aggregated order line derived from the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub qty: u32,
}

/// Order lines plus totals for checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub items: Vec<OrderItem>,
    pub placed_count: usize,
    pub total: f64,
}
