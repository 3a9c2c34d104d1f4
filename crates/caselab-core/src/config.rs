// ============================================================================
// Configuration - Environment-driven settings
// ============================================================================
//   CASELAB_API_URL      admin/catalog API base (default http://localhost:4000)
//   CASELAB_DB_PATH      snapshot database (default ~/.caselab/design.redb)
//   CASELAB_SLOT_COUNT   grid slots (default 20)
//   CASELAB_COLS         grid columns (default 4)
//   CASELAB_MAX_HISTORY  undo depth (default 50)
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::EngineSettings;
use crate::history::DEFAULT_MAX_HISTORY;
use crate::types::{DEFAULT_COLS, DEFAULT_SLOT_COUNT};

pub const DEFAULT_API_URL: &str = "http://localhost:4000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseLabConfig {
    pub api_url: String,
    /// `None` lets the redb backend pick its default path
    pub db_path: Option<String>,
    pub slot_count: usize,
    pub cols: usize,
    pub max_history: usize,
}

impl Default for CaseLabConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            db_path: None,
            slot_count: DEFAULT_SLOT_COUNT,
            cols: DEFAULT_COLS,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl CaseLabConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or invalid values use the defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            api_url: text("CASELAB_API_URL").unwrap_or(defaults.api_url),
            db_path: text("CASELAB_DB_PATH"),
            slot_count: positive(&lookup, "CASELAB_SLOT_COUNT", defaults.slot_count),
            cols: positive(&lookup, "CASELAB_COLS", defaults.cols),
            max_history: positive(&lookup, "CASELAB_MAX_HISTORY", defaults.max_history),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            slot_count: self.slot_count,
            cols: self.cols,
            max_history: self.max_history,
        }
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!("Invalid {}={:?}, using {}", key, raw, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> CaseLabConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CaseLabConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(config(&[]), CaseLabConfig::default());
        assert_eq!(config(&[]).engine_settings(), EngineSettings::default());
    }

    #[test]
    fn test_values_from_lookup() {
        let cfg = config(&[
            ("CASELAB_API_URL", "https://shop.example"),
            ("CASELAB_DB_PATH", "/tmp/case.redb"),
            ("CASELAB_SLOT_COUNT", "12"),
            ("CASELAB_COLS", " 3 "),
            ("CASELAB_MAX_HISTORY", "10"),
        ]);
        assert_eq!(cfg.api_url, "https://shop.example");
        assert_eq!(cfg.db_path.as_deref(), Some("/tmp/case.redb"));
        assert_eq!(cfg.slot_count, 12);
        assert_eq!(cfg.cols, 3);
        assert_eq!(cfg.max_history, 10);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let cfg = config(&[
            ("CASELAB_SLOT_COUNT", "lots"),
            ("CASELAB_COLS", "0"),
            ("CASELAB_MAX_HISTORY", "-5"),
            ("CASELAB_DB_PATH", "  "),
        ]);
        assert_eq!(cfg.slot_count, DEFAULT_SLOT_COUNT);
        assert_eq!(cfg.cols, DEFAULT_COLS);
        assert_eq!(cfg.max_history, DEFAULT_MAX_HISTORY);
        assert_eq!(cfg.db_path, None);
    }
}
