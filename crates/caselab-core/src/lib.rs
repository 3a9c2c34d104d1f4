//! ============================================================================
//! CASELAB-CORE: Phone-case sticker builder engine
//! ============================================================================
//! Everything behind the case builder, independent of any UI:
//! - Fixed grid of slots holding trinket stickers, each with a style
//! - Composite undo/redo over contents + styles
//! - Randomize (free or pack-constrained), order totals, checkout gating
//! - Catalog fetch with bundled fallback, bundled packs
//! - Best-effort snapshot persistence (memory or redb)
//! - Typed builder metrics through an injected sink
//! - Admin API client for catalog management
//! ============================================================================

pub mod admin;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod metrics;
pub mod order;
pub mod pack;
pub mod store;
pub mod style;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use admin::{AdminClient, CharmPayload, CharmPayloadError};
pub use catalog::{bundled_catalog, normalize_catalog_response, CatalogClient, CatalogStatus};
pub use config::CaseLabConfig;
pub use engine::{BuilderEngine, EngineSettings, MoveOutcome, Removal};
pub use error::{EngineError, EngineResult};
pub use history::History;
pub use metrics::{
    BuilderEvent, MetricEvent, MetricsSink, NullSink, PlacementMethod, RecordingSink,
    RemovalMethod, TracingSink,
};
pub use pack::{Pack, TrayFilter};
pub use store::{MemoryBackend, RedbBackend, SnapshotBackend, SnapshotStore};
pub use style::{default_style, normalize_style, StylePatch};
