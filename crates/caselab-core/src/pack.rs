//! ============================================================================
//! Packs - Curated trinket subsets and tray filtering
//! ============================================================================
//! A pack narrows the active pool: the tray, randomize and pruning all work
//! against the pool, not the full catalog.
//! ============================================================================

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

use crate::types::Trinket;

const BUNDLED_PACKS_JSON: &str = include_str!("../data/packs.json");

static PACKS: Lazy<Vec<Pack>> = Lazy::new(|| {
    serde_json::from_str(BUNDLED_PACKS_JSON).unwrap_or_else(|e| {
        warn!("Bundled packs are not valid JSON: {}", e);
        Vec::new()
    })
});

/// A named, curated set of trinket ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    pub id: String,
    pub name: String,
    pub trinkets: Vec<String>,
}

impl Pack {
    /// All bundled packs
    pub fn all() -> &'static [Pack] {
        &PACKS
    }

    /// Look up a bundled pack by id
    pub fn find(id: &str) -> Option<&'static Pack> {
        PACKS.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, trinket_id: &str) -> bool {
        self.trinkets.iter().any(|t| t == trinket_id)
    }
}

/// Trinkets usable under `pack`; the whole catalog when there is no pack
pub fn active_pool(all: &[Trinket], pack: Option<&Pack>) -> Vec<Trinket> {
    match pack {
        Some(pack) => {
            let allowed: HashSet<&str> = pack.trinkets.iter().map(String::as_str).collect();
            all.iter()
                .filter(|t| allowed.contains(t.id.as_str()))
                .cloned()
                .collect()
        }
        None => all.to_vec(),
    }
}

/// Sorted distinct tags across `trinkets`
pub fn all_tags(trinkets: &[Trinket]) -> Vec<String> {
    trinkets
        .iter()
        .flat_map(|t| t.tags().iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tray search: free-text query plus an optional tag
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrayFilter {
    pub query: String,
    pub tag: Option<String>,
}

impl TrayFilter {
    pub fn new(query: impl Into<String>, tag: Option<String>) -> Self {
        Self {
            query: query.into(),
            tag,
        }
    }

    pub fn matches(&self, trinket: &Trinket) -> bool {
        let q = self.query.trim().to_lowercase();
        let matches_query =
            q.is_empty() || trinket.name.to_lowercase().contains(&q) || trinket.id.contains(&q);
        let matches_tag = match self.tag.as_deref() {
            None | Some("") => true,
            Some(tag) => trinket.tags().iter().any(|t| t == tag),
        };
        matches_query && matches_tag
    }

    pub fn apply<'a>(&self, trinkets: &'a [Trinket]) -> Vec<&'a Trinket> {
        trinkets.iter().filter(|t| self.matches(t)).collect()
    }
}
