//! ============================================================================
//! Builder Engine - Grid placement, layering and randomize
//! ============================================================================
//! Owns the case design (slot contents + per-slot styles) as one undoable
//! value. Every mutating operation:
//! 1. settles the history (new turn, suppression lifted)
//! 2. validates slot indices; errors leave the design untouched
//! 3. commits the next design (identical designs are not recorded)
//! 4. persists it through the snapshot store (best-effort)
//! 5. reports a `BuilderEvent` to the injected metrics sink
//!
//! Slot lifecycle: `Empty --place--> Filled`, `Filled --place(other)-->
//! Filled` (replaced), `Filled --remove--> Empty`, `Filled --move-out-->
//! Empty` paired with another slot's move-in. A style exists only for a
//! filled slot.
//! ============================================================================

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::bundled_catalog;
use crate::error::{EngineError, EngineResult};
use crate::history::{History, DEFAULT_MAX_HISTORY};
use crate::metrics::{BuilderEvent, MetricEvent, MetricsSink, PlacementMethod, RemovalMethod};
use crate::order::{self, MAX_BUDGET};
use crate::pack::{active_pool, Pack};
use crate::store::SnapshotStore;
use crate::style::{default_style, normalize_style, StylePatch};
use crate::types::{
    CatalogData, Design, OrderSummary, SlotIndex, SlotMap, SlotStyleMap, StickerStyle, Trinket,
    DEFAULT_COLS, DEFAULT_SLOT_COUNT,
};

/// Grid shape and history depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub slot_count: usize,
    pub cols: usize,
    pub max_history: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            cols: DEFAULT_COLS,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

/// Result of a move/swap request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Source and destination were the same slot
    Selected(SlotIndex),
    Moved {
        trinket_id: String,
        replaced_id: Option<String>,
    },
}

/// Trinket taken off the grid by `remove_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub trinket_id: String,
    /// Still in the active pool, so it became the tray selection again
    pub reselected: bool,
}

pub struct BuilderEngine {
    history: History<Design>,
    store: SnapshotStore,
    sink: Arc<dyn MetricsSink>,
    settings: EngineSettings,
    catalog: CatalogData,
    pack: Option<Pack>,
    pool: Vec<Trinket>,
    selected: Option<String>,
    unlocked: bool,
}

impl BuilderEngine {
    /// Engine over the design saved in `store`, priced from the bundled
    /// catalog until `set_catalog` supplies a fresher one.
    pub fn new(settings: EngineSettings, store: SnapshotStore, sink: Arc<dyn MetricsSink>) -> Self {
        let design = store.load_design(settings.slot_count);
        let catalog = bundled_catalog().clone();
        let pool = active_pool(&catalog.trinkets, None);
        let unlocked = order::checkout_unlocked(design.slots.placed_count());

        debug!(
            "Builder engine ready: {} slots, {} placed",
            settings.slot_count,
            design.slots.placed_count()
        );

        Self {
            history: History::with_max_history(design, settings.max_history),
            store,
            sink,
            settings,
            catalog,
            pack: None,
            pool,
            selected: None,
            unlocked,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn design(&self) -> &Design {
        self.history.present()
    }

    pub fn slots(&self) -> &SlotMap {
        &self.design().slots
    }

    pub fn styles(&self) -> &SlotStyleMap {
        &self.design().styles
    }

    pub fn slot_count(&self) -> usize {
        self.settings.slot_count
    }

    pub fn cols(&self) -> usize {
        self.settings.cols.max(1)
    }

    pub fn rows(&self) -> usize {
        self.slot_count().div_ceil(self.cols())
    }

    pub fn catalog(&self) -> &CatalogData {
        &self.catalog
    }

    pub fn pack(&self) -> Option<&Pack> {
        self.pack.as_ref()
    }

    /// Trinkets usable right now (catalog narrowed by the active pack)
    pub fn pool(&self) -> &[Trinket] {
        &self.pool
    }

    pub fn find_trinket(&self, id: &str) -> Option<&Trinket> {
        self.pool.iter().find(|t| t.id == id)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn checkout_unlocked(&self) -> bool {
        self.unlocked
    }

    // ========================================================================
    // Catalog / Pack
    // ========================================================================

    /// Swap in a new catalog. Placed trinkets that left the pool are cleared.
    pub fn set_catalog(&mut self, catalog: CatalogData) -> Vec<SlotIndex> {
        self.catalog = catalog;
        self.refresh_pool()
    }

    /// Activate a bundled pack (or none). Placed trinkets outside the pack
    /// are cleared.
    pub fn set_pack(&mut self, pack_id: Option<&str>) -> EngineResult<Vec<SlotIndex>> {
        self.pack = match pack_id {
            Some(id) => Some(
                Pack::find(id)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownPack(id.to_string()))?,
            ),
            None => None,
        };
        Ok(self.refresh_pool())
    }

    fn refresh_pool(&mut self) -> Vec<SlotIndex> {
        self.pool = active_pool(&self.catalog.trinkets, self.pack.as_ref());
        if let Some(selected) = self.selected.as_deref() {
            if self.find_trinket(selected).is_none() {
                self.selected = None;
            }
        }
        self.prune_for_active_pool()
    }

    /// Tray selection. Only trinkets in the active pool can be selected.
    pub fn select(&mut self, trinket_id: Option<&str>) -> bool {
        match trinket_id {
            Some(id) if self.find_trinket(id).is_some() => {
                self.selected = Some(id.to_string());
                true
            }
            Some(_) => false,
            None => {
                self.selected = None;
                true
            }
        }
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Put `trinket_id` in `index` (or clear it with `None`).
    /// Returns the previous occupant.
    pub fn place_at(
        &mut self,
        index: SlotIndex,
        trinket_id: Option<&str>,
        method: PlacementMethod,
    ) -> EngineResult<Option<String>> {
        self.history.settle();
        self.check_index(index)?;

        let previous = self.slots().get(index).map(str::to_string);
        let mut next = self.design().clone();
        match trinket_id {
            Some(id) => {
                next.slots.set(index, Some(id.to_string()));
                next.styles.insert(index, default_style());
            }
            None => {
                next.clear_slot(index);
            }
        }
        self.commit(next);

        match trinket_id {
            Some(id) => self.emit(BuilderEvent::TrinketAdd {
                index,
                trinket_id: id.to_string(),
                replaced_id: previous.clone(),
                method,
            }),
            None => {
                if let Some(removed) = &previous {
                    self.emit(BuilderEvent::TrinketRemove {
                        index,
                        trinket_id: removed.clone(),
                        method: RemovalMethod::Tap,
                    });
                }
            }
        }
        Ok(previous)
    }

    /// Move the trinket at `from` to `to`, swapping with whatever was there.
    /// Styles travel with their trinkets.
    pub fn move_or_swap(&mut self, from: SlotIndex, to: SlotIndex) -> EngineResult<MoveOutcome> {
        self.history.settle();
        self.check_index(from)?;
        self.check_index(to)?;

        if from == to {
            return Ok(MoveOutcome::Selected(to));
        }
        let trinket_id = self
            .slots()
            .get(from)
            .map(str::to_string)
            .ok_or(EngineError::EmptySlot(from))?;
        let replaced_id = self.slots().get(to).map(str::to_string);

        let mut next = self.design().clone();
        swap_slots(&mut next, from, to);
        self.commit(next);

        self.emit(BuilderEvent::TrinketMove {
            from,
            to,
            trinket_id: trinket_id.clone(),
            replaced_id: replaced_id.clone(),
        });
        Ok(MoveOutcome::Moved {
            trinket_id,
            replaced_id,
        })
    }

    /// Clear a slot. The removed trinket becomes the tray selection when it
    /// is still in the active pool.
    pub fn remove_at(
        &mut self,
        index: SlotIndex,
        method: RemovalMethod,
    ) -> EngineResult<Option<Removal>> {
        self.history.settle();
        self.check_index(index)?;

        let mut next = self.design().clone();
        let Some(removed) = next.clear_slot(index) else {
            return Ok(None);
        };
        self.commit(next);

        let reselected = self.find_trinket(&removed).is_some();
        if reselected {
            self.selected = Some(removed.clone());
        }
        self.emit(BuilderEvent::TrinketRemove {
            index,
            trinket_id: removed.clone(),
            method,
        });
        Ok(Some(Removal {
            trinket_id: removed,
            reselected,
        }))
    }

    /// Copy the sticker at `index` into the first empty slot, one layer up.
    /// Returns the destination, or `None` when the source slot is empty.
    pub fn duplicate(&mut self, index: SlotIndex) -> EngineResult<Option<SlotIndex>> {
        self.history.settle();
        self.check_index(index)?;

        let Some(trinket_id) = self.slots().get(index).map(str::to_string) else {
            return Ok(None);
        };
        let target = self.slots().first_empty().ok_or(EngineError::NoEmptySlots)?;

        let mut style = self.styles().get(index).copied().unwrap_or_else(default_style);
        style.z_index = style.z_index.saturating_add(1);

        let mut next = self.design().clone();
        next.slots.set(target, Some(trinket_id.clone()));
        next.styles.insert(target, style);
        self.commit(next);

        self.emit(BuilderEvent::TrinketDuplicate {
            from: index,
            to: target,
            trinket_id,
        });
        Ok(Some(target))
    }

    // ========================================================================
    // Styling
    // ========================================================================

    /// Merge `patch` over the slot's style and clamp the result
    pub fn update_style(&mut self, index: SlotIndex, patch: StylePatch) -> EngineResult<StickerStyle> {
        self.history.settle();
        self.check_index(index)?;
        let trinket_id = self
            .slots()
            .get(index)
            .map(str::to_string)
            .ok_or(EngineError::EmptySlot(index))?;

        let base = self.styles().get(index).copied().unwrap_or_else(default_style);
        let style = normalize_style(&patch.apply_to(&base));

        let mut next = self.design().clone();
        next.styles.insert(index, style);
        self.commit(next);

        self.emit(BuilderEvent::StyleChange { index, trinket_id });
        Ok(style)
    }

    /// Raise the slot above every styled slot. Returns the new z-index.
    pub fn bring_to_front(&mut self, index: SlotIndex) -> EngineResult<i64> {
        let z_index = self.styles().max_z_index().saturating_add(1);
        self.update_style(index, z_patch(z_index)).map(|s| s.z_index)
    }

    /// Drop the slot below every styled slot. Returns the new z-index.
    pub fn send_to_back(&mut self, index: SlotIndex) -> EngineResult<i64> {
        let z_index = self.styles().min_z_index().saturating_sub(1);
        self.update_style(index, z_patch(z_index)).map(|s| s.z_index)
    }

    // ========================================================================
    // Bulk Operations
    // ========================================================================

    /// Replace the design with a random one drawn from the active pool.
    /// With a pack active each pool item is used at most once.
    /// Returns the number of slots filled.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        self.history.settle();
        let in_pack = self.pack.is_some();
        let next = randomize_design(&self.pool, self.slot_count(), in_pack, rng);
        let count = next.slots.placed_count();
        self.commit(next);

        info!("Randomized {} {}", count, if in_pack { "from pack" } else { "stickers" });
        self.emit(BuilderEvent::Randomize { count, in_pack });
        count
    }

    /// Clear every slot holding a trinket outside the active pool.
    /// Returns the cleared indices.
    pub fn prune_for_active_pool(&mut self) -> Vec<SlotIndex> {
        self.history.settle();
        let allowed: HashSet<&str> = self.pool.iter().map(|t| t.id.as_str()).collect();
        let mut next = self.design().clone();
        let cleared = prune_design(&mut next, &allowed);
        if !cleared.is_empty() {
            debug!("Pruned {} slots outside the active pool", cleared.len());
            self.commit(next);
        }
        cleared
    }

    /// Clear the whole design. Not undoable.
    pub fn reset(&mut self) {
        self.history.settle();
        let slot_count = self.slot_count();
        self.history.reset(Design::empty(slot_count));
        self.store.reset_design();
        self.after_change();
        info!("Cleared design");
        self.emit(BuilderEvent::DesignReset { slot_count });
    }

    // ========================================================================
    // History
    // ========================================================================

    pub fn undo(&mut self) -> bool {
        self.history.settle();
        let changed = self.history.undo();
        if changed {
            self.store.save_design(self.history.present());
            self.after_change();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        self.history.settle();
        let changed = self.history.redo();
        if changed {
            self.store.save_design(self.history.present());
            self.after_change();
        }
        changed
    }

    // ========================================================================
    // Totals / Checkout
    // ========================================================================

    pub fn totals(&self) -> OrderSummary {
        order::derive_totals(
            self.slots(),
            |id| self.find_trinket(id),
            self.catalog.case_price,
        )
    }

    /// Open checkout: summarize the order and report it
    pub fn checkout(&self) -> OrderSummary {
        let summary = self.totals();
        self.emit(BuilderEvent::CheckoutStart {
            total: summary.total,
            placed_count: summary.placed_count,
            items: summary.items.clone(),
            pack_id: self.pack.as_ref().map(|p| p.id.clone()),
            budget: MAX_BUDGET,
        });
        summary
    }

    /// Submit the (mock) order
    pub fn submit_checkout(&self) -> OrderSummary {
        let summary = self.totals();
        self.emit(BuilderEvent::CheckoutSubmit {
            total: summary.total,
            placed_count: summary.placed_count,
            items: summary.items.clone(),
            pack_id: self.pack.as_ref().map(|p| p.id.clone()),
            budget: MAX_BUDGET,
        });
        summary
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_index(&self, index: SlotIndex) -> EngineResult<()> {
        if index < self.slot_count() {
            Ok(())
        } else {
            Err(EngineError::SlotOutOfRange {
                index,
                slot_count: self.slot_count(),
            })
        }
    }

    fn commit(&mut self, next: Design) {
        if self.history.set(next) {
            self.store.save_design(self.history.present());
        }
        self.after_change();
    }

    /// Fire the unlock event on the locked -> unlocked transition
    fn after_change(&mut self) {
        let placed_count = self.slots().placed_count();
        let unlocked = order::checkout_unlocked(placed_count);
        if unlocked && !self.unlocked {
            self.emit(BuilderEvent::CheckoutUnlocked { placed_count });
        }
        self.unlocked = unlocked;
    }

    fn emit(&self, event: BuilderEvent) {
        self.sink.record(&MetricEvent::now(event));
    }
}

fn z_patch(z_index: i64) -> StylePatch {
    StylePatch {
        z_index: Some(z_index as f64),
        ..StylePatch::default()
    }
}

/// Exchange two slots' contents and styles. Applying it twice is identity.
pub fn swap_slots(design: &mut Design, a: SlotIndex, b: SlotIndex) {
    if a == b {
        return;
    }
    design.slots.swap(a, b);
    let style_a = design.styles.remove(a);
    let style_b = design.styles.remove(b);
    if let Some(style) = style_a {
        design.styles.insert(b, style);
    }
    if let Some(style) = style_b {
        design.styles.insert(a, style);
    }
}

/// Clear slots holding ids outside `allowed`, styles included.
/// Returns the cleared indices.
pub fn prune_design(design: &mut Design, allowed: &HashSet<&str>) -> Vec<SlotIndex> {
    let doomed: Vec<SlotIndex> = design
        .slots
        .occupied()
        .filter(|(_, id)| !allowed.contains(id))
        .map(|(i, _)| i)
        .collect();
    for &index in &doomed {
        design.clear_slot(index);
    }
    doomed
}

/// Fresh random design.
///
/// - constrained: `min(slot_count, pool.len())` slots, each pool item at
///   most once (shuffled pool prefix into shuffled slot prefix)
/// - unconstrained: floor(40%) of the slots, each an independent draw
pub fn randomize_design<R: Rng + ?Sized>(
    pool: &[Trinket],
    slot_count: usize,
    constrain_to_pool: bool,
    rng: &mut R,
) -> Design {
    let mut design = Design::empty(slot_count);
    if pool.is_empty() {
        return design;
    }

    let count = if constrain_to_pool {
        slot_count.min(pool.len())
    } else {
        slot_count * 2 / 5
    };

    let mut indices: Vec<SlotIndex> = (0..slot_count).collect();
    indices.shuffle(rng);
    let chosen = &indices[..count];

    if constrain_to_pool {
        let mut items: Vec<&Trinket> = pool.iter().collect();
        items.shuffle(rng);
        for (&index, trinket) in chosen.iter().zip(items) {
            design.slots.set(index, Some(trinket.id.clone()));
            design.styles.insert(index, default_style());
        }
    } else {
        for &index in chosen {
            if let Some(trinket) = pool.choose(rng) {
                design.slots.set(index, Some(trinket.id.clone()));
                design.styles.insert(index, default_style());
            }
        }
    }
    design
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RecordingSink;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine() -> (BuilderEngine, RecordingSink) {
        let sink = RecordingSink::new();
        let engine = BuilderEngine::new(
            EngineSettings::default(),
            SnapshotStore::in_memory(),
            Arc::new(sink.clone()),
        );
        (engine, sink)
    }

    fn pool(n: usize) -> Vec<Trinket> {
        (0..n)
            .map(|i| Trinket::new(format!("t{}", i), format!("T{}", i), 1.0))
            .collect()
    }

    #[test]
    fn test_place_creates_default_style() {
        let (mut engine, sink) = engine();
        let previous = engine.place_at(3, Some("bear"), PlacementMethod::Tap).unwrap();
        assert_eq!(previous, None);
        assert_eq!(engine.slots().get(3), Some("bear"));
        assert_eq!(engine.styles().get(3), Some(&default_style()));
        assert_eq!(
            sink.builder_events(),
            vec![BuilderEvent::TrinketAdd {
                index: 3,
                trinket_id: "bear".into(),
                replaced_id: None,
                method: PlacementMethod::Tap,
            }]
        );
    }

    #[test]
    fn test_place_reports_replaced() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        let previous = engine.place_at(0, Some("moon"), PlacementMethod::Drag).unwrap();
        assert_eq!(previous.as_deref(), Some("bear"));
        assert_eq!(engine.slots().get(0), Some("moon"));
    }

    #[test]
    fn test_place_same_trinket_twice_no_extra_undo_step() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        assert!(engine.undo());
        assert!(engine.redo());
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        assert!(engine.undo());
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_place_none_always_drops_style() {
        let (mut engine, sink) = engine();
        engine.place_at(2, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(2, None, PlacementMethod::Tap).unwrap();
        assert!(engine.styles().get(2).is_none());
        assert_eq!(engine.slots().get(2), None);

        engine.place_at(5, None, PlacementMethod::Tap).unwrap();
        assert!(engine.styles().get(5).is_none());
        assert!(matches!(
            sink.builder_events().last(),
            Some(BuilderEvent::TrinketRemove { index: 2, .. })
        ));
    }

    #[test]
    fn test_out_of_range_is_error_without_change() {
        let (mut engine, sink) = engine();
        let err = engine.place_at(20, Some("bear"), PlacementMethod::Tap).unwrap_err();
        assert_eq!(
            err,
            EngineError::SlotOutOfRange {
                index: 20,
                slot_count: 20
            }
        );
        assert_eq!(engine.slots().placed_count(), 0);
        assert!(engine.move_or_swap(0, 99).is_err());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_move_to_empty_slot() {
        let (mut engine, _) = engine();
        engine.place_at(1, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.update_style(1, StylePatch { scale: Some(1.5), ..Default::default() }).unwrap();

        let outcome = engine.move_or_swap(1, 6).unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                trinket_id: "bear".into(),
                replaced_id: None
            }
        );
        assert_eq!(engine.slots().get(1), None);
        assert_eq!(engine.slots().get(6), Some("bear"));
        assert!(engine.styles().get(1).is_none());
        assert_eq!(engine.styles().get(6).unwrap().scale, 1.5);
    }

    #[test]
    fn test_swap_is_self_inverse() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(4, Some("moon"), PlacementMethod::Tap).unwrap();
        engine.update_style(4, StylePatch { rotate: Some(45.0), ..Default::default() }).unwrap();
        let before = engine.design().clone();

        engine.move_or_swap(0, 4).unwrap();
        assert_eq!(engine.slots().get(0), Some("moon"));
        assert_eq!(engine.slots().get(4), Some("bear"));
        assert_eq!(engine.styles().get(0).unwrap().rotate, 45.0);

        engine.move_or_swap(0, 4).unwrap();
        assert_eq!(engine.design(), &before);
    }

    #[test]
    fn test_move_same_slot_is_selection() {
        let (mut engine, sink) = engine();
        engine.place_at(3, Some("bear"), PlacementMethod::Tap).unwrap();
        sink.clear();
        assert_eq!(engine.move_or_swap(3, 3).unwrap(), MoveOutcome::Selected(3));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_move_from_empty_rejected() {
        let (mut engine, _) = engine();
        assert_eq!(engine.move_or_swap(0, 1), Err(EngineError::EmptySlot(0)));
    }

    #[test]
    fn test_remove_reselects_pool_trinket() {
        let (mut engine, sink) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        let removal = engine.remove_at(0, RemovalMethod::Toolbar).unwrap().unwrap();
        assert!(removal.reselected);
        assert_eq!(engine.selected(), Some("bear"));
        assert!(engine.styles().is_empty());
        assert!(matches!(
            sink.builder_events().last(),
            Some(BuilderEvent::TrinketRemove { method: RemovalMethod::Toolbar, .. })
        ));

        engine.place_at(1, Some("not-in-catalog"), PlacementMethod::Tap).unwrap();
        let removal = engine.remove_at(1, RemovalMethod::Tap).unwrap().unwrap();
        assert!(!removal.reselected);
        assert_eq!(engine.selected(), Some("bear"));

        assert_eq!(engine.remove_at(1, RemovalMethod::Tap).unwrap(), None);
    }

    #[test]
    fn test_duplicate_into_first_empty() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(1, Some("moon"), PlacementMethod::Tap).unwrap();
        engine.update_style(1, StylePatch { z_index: Some(4.0), ..Default::default() }).unwrap();

        assert_eq!(engine.duplicate(1).unwrap(), Some(2));
        assert_eq!(engine.slots().get(2), Some("moon"));
        assert_eq!(engine.styles().get(2).unwrap().z_index, 5);
    }

    #[test]
    fn test_duplicate_empty_source_is_noop() {
        let (mut engine, sink) = engine();
        assert_eq!(engine.duplicate(7).unwrap(), None);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_duplicate_full_grid_reports_no_capacity() {
        let (mut engine, _) = engine();
        let full = pool(20);
        for (i, t) in full.iter().enumerate() {
            engine.place_at(i, Some(&t.id), PlacementMethod::Tap).unwrap();
        }
        let before = engine.design().clone();
        assert_eq!(engine.duplicate(0), Err(EngineError::NoEmptySlots));
        assert_eq!(engine.design(), &before);
    }

    #[test]
    fn test_front_and_back() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(1, Some("moon"), PlacementMethod::Tap).unwrap();
        engine.place_at(2, Some("star"), PlacementMethod::Tap).unwrap();

        assert_eq!(engine.bring_to_front(0).unwrap(), 1);
        assert_eq!(engine.bring_to_front(1).unwrap(), 2);
        assert_eq!(engine.send_to_back(2).unwrap(), -1);
        assert_eq!(engine.send_to_back(0).unwrap(), -2);
        assert_eq!(engine.bring_to_front(7), Err(EngineError::EmptySlot(7)));
    }

    #[test]
    fn test_layering_saturates_at_extreme_z_index() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(1, Some("moon"), PlacementMethod::Tap).unwrap();
        let top = engine
            .update_style(0, StylePatch { z_index: Some(1e19), ..Default::default() })
            .unwrap();
        assert_eq!(top.z_index, i64::MAX);

        assert_eq!(engine.bring_to_front(1).unwrap(), i64::MAX);
        assert_eq!(engine.duplicate(0).unwrap(), Some(2));
        assert_eq!(engine.styles().get(2).unwrap().z_index, i64::MAX);

        engine
            .update_style(0, StylePatch { z_index: Some(-1e19), ..Default::default() })
            .unwrap();
        assert_eq!(engine.send_to_back(1).unwrap(), i64::MIN);
    }

    #[test]
    fn test_front_with_no_styled_slots_is_one() {
        let store = SnapshotStore::in_memory();
        let mut slots = SlotMap::empty(20);
        slots.set(5, Some("bear".into()));
        store.save_slots(&slots);

        let mut engine =
            BuilderEngine::new(EngineSettings::default(), store, Arc::new(RecordingSink::new()));
        assert!(engine.styles().is_empty());
        assert_eq!(engine.bring_to_front(5).unwrap(), 1);
    }

    #[test]
    fn test_undo_redo_restores_design() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(1, Some("moon"), PlacementMethod::Tap).unwrap();
        let after_two = engine.design().clone();

        assert!(engine.undo());
        assert_eq!(engine.slots().get(1), None);
        assert!(engine.styles().get(1).is_none());
        assert!(engine.redo());
        assert_eq!(engine.design(), &after_two);
        assert!(!engine.redo());
    }

    #[test]
    fn test_randomize_constrained_counts() {
        let mut rng = StdRng::seed_from_u64(7);
        let design = randomize_design(&pool(5), 20, true, &mut rng);
        let placed: Vec<_> = design.slots.occupied().map(|(_, id)| id.to_string()).collect();
        assert_eq!(placed.len(), 5);
        let distinct: HashSet<_> = placed.iter().collect();
        assert_eq!(distinct.len(), 5);
        assert_eq!(design.slots.iter().filter(|(_, s)| s.is_none()).count(), 15);
        assert!(design.is_consistent());
        assert_eq!(design.styles.len(), 5);
    }

    #[test]
    fn test_randomize_constrained_pool_larger_than_grid() {
        let mut rng = StdRng::seed_from_u64(11);
        let design = randomize_design(&pool(30), 20, true, &mut rng);
        let distinct: HashSet<_> = design.slots.occupied().map(|(_, id)| id).collect();
        assert_eq!(distinct.len(), 20);
    }

    #[test]
    fn test_randomize_unconstrained_fills_forty_percent() {
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let design = randomize_design(&pool(3), 20, false, &mut rng);
            assert_eq!(design.slots.placed_count(), 8);
            assert_eq!(design.styles.len(), 8);
        }
    }

    #[test]
    fn test_randomize_empty_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        let design = randomize_design(&[], 20, false, &mut rng);
        assert_eq!(design, Design::empty(20));
    }

    #[test]
    fn test_randomize_replaces_previous_content() {
        let (mut engine, sink) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.set_pack(Some("dreamy-sky")).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let count = engine.randomize(&mut rng);
        assert_eq!(count, 5);
        assert_eq!(engine.slots().placed_count(), 5);
        for (_, id) in engine.slots().occupied() {
            assert!(engine.pack().unwrap().contains(id));
        }
        assert!(sink
            .builder_events()
            .contains(&BuilderEvent::Randomize { count: 5, in_pack: true }));
        assert!(engine.undo());
    }

    #[test]
    fn test_set_pack_prunes_outside_items() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(1, Some("moon"), PlacementMethod::Tap).unwrap();
        engine.select(Some("bear"));

        let cleared = engine.set_pack(Some("dreamy-sky")).unwrap();
        assert_eq!(cleared, vec![0]);
        assert_eq!(engine.slots().get(0), None);
        assert!(engine.styles().get(0).is_none());
        assert_eq!(engine.slots().get(1), Some("moon"));
        assert_eq!(engine.selected(), None);
        assert!(engine.design().is_consistent());
    }

    #[test]
    fn test_unknown_pack_rejected() {
        let (mut engine, _) = engine();
        assert_eq!(
            engine.set_pack(Some("nope")),
            Err(EngineError::UnknownPack("nope".into()))
        );
    }

    #[test]
    fn test_prune_design_cascades_styles() {
        let mut design = Design::empty(4);
        for (i, id) in ["a", "b", "a", "c"].iter().enumerate() {
            design.slots.set(i, Some(id.to_string()));
            design.styles.insert(i, default_style());
        }
        let allowed: HashSet<&str> = ["a"].into_iter().collect();
        assert_eq!(prune_design(&mut design, &allowed), vec![1, 3]);
        assert!(design.is_consistent());
        assert_eq!(design.styles.len(), 2);
    }

    #[test]
    fn test_set_catalog_without_changes_adds_no_history() {
        let (mut engine, _) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        let catalog = engine.catalog().clone();
        assert!(engine.set_catalog(catalog).is_empty());
        assert!(engine.undo());
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_reset_is_not_undoable() {
        let (mut engine, sink) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.reset();
        assert_eq!(engine.design(), &Design::empty(20));
        assert!(!engine.can_undo());
        assert!(!engine.undo());
        assert!(matches!(
            sink.builder_events().last(),
            Some(BuilderEvent::DesignReset { slot_count: 20 })
        ));
    }

    #[test]
    fn test_design_persists_between_engines() {
        let store = SnapshotStore::in_memory();
        let mut engine =
            BuilderEngine::new(EngineSettings::default(), store, Arc::new(RecordingSink::new()));
        engine.place_at(4, Some("bear"), PlacementMethod::Tap).unwrap();
        let saved = engine.design().clone();
        let BuilderEngine { store, .. } = engine;

        let reopened =
            BuilderEngine::new(EngineSettings::default(), store, Arc::new(RecordingSink::new()));
        assert_eq!(reopened.design(), &saved);
    }

    #[test]
    fn test_checkout_unlock_fires_once() {
        let (mut engine, sink) = engine();
        for (i, id) in ["bear", "moon", "star", "heart"].iter().enumerate() {
            engine.place_at(i, Some(id), PlacementMethod::Tap).unwrap();
        }
        let unlocks = sink
            .builder_events()
            .into_iter()
            .filter(|e| matches!(e, BuilderEvent::CheckoutUnlocked { .. }))
            .count();
        assert_eq!(unlocks, 1);
        assert!(engine.checkout_unlocked());

        engine.remove_at(0, RemovalMethod::Tap).unwrap();
        engine.remove_at(1, RemovalMethod::Tap).unwrap();
        assert!(!engine.checkout_unlocked());
    }

    #[test]
    fn test_totals_and_checkout() {
        let (mut engine, sink) = engine();
        engine.place_at(0, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(1, Some("bear"), PlacementMethod::Tap).unwrap();
        engine.place_at(2, Some("rainbow"), PlacementMethod::Tap).unwrap();

        let summary = engine.checkout();
        assert_eq!(summary.placed_count, 3);
        assert_eq!(summary.total, 18.0 + 2.5 * 2.0 + 4.0);
        match sink.builder_events().last() {
            Some(BuilderEvent::CheckoutStart { budget, pack_id, items, .. }) => {
                assert_eq!(*budget, MAX_BUDGET);
                assert_eq!(*pack_id, None);
                assert_eq!(items.len(), 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_grid_shape() {
        let (engine, _) = engine();
        assert_eq!(engine.slot_count(), 20);
        assert_eq!(engine.cols(), 4);
        assert_eq!(engine.rows(), 5);
    }
}
