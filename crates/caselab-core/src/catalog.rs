//! ============================================================================
//! Catalog Client - Trinket definitions and pricing from the admin API
//! ============================================================================
//! The builder always has a catalog in hand: the bundled one until a fetch
//! succeeds, then the latest good response. Payloads are parsed defensively;
//! a bad case price or an empty set of valid trinkets falls back to the
//! bundled values field by field.
//! ============================================================================

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::admin::SESSION_COOKIE;
use crate::types::{CatalogData, Trinket};

/// Case price used when the bundled catalog cannot supply one
pub const DEFAULT_CASE_PRICE: f64 = 18.0;

/// Catalog endpoint path, relative to the API base URL
pub const CATALOG_PATH: &str = "/api/catalog";

const BUNDLED_CATALOG_JSON: &str = include_str!("../data/catalog.json");

static BUNDLED: Lazy<CatalogData> = Lazy::new(|| {
    match serde_json::from_str::<Value>(BUNDLED_CATALOG_JSON) {
        Ok(raw) => parse_catalog(&raw, DEFAULT_CASE_PRICE, &[]),
        Err(e) => {
            warn!("Bundled catalog is not valid JSON: {}", e);
            CatalogData {
                case_price: DEFAULT_CASE_PRICE,
                trinkets: Vec::new(),
            }
        }
    }
});

/// Catalog shipped with the crate
pub fn bundled_catalog() -> &'static CatalogData {
    &BUNDLED
}

/// Validate a raw catalog payload, falling back to the bundled catalog.
///
/// - non-object payload: bundled catalog
/// - `casePrice` not a finite positive number: bundled case price
/// - trinkets: keep every entry with a non-empty id and name and a finite
///   price; when none survive, use the bundled trinkets
pub fn normalize_catalog_response(raw: &Value) -> CatalogData {
    let bundled = bundled_catalog();
    if !raw.is_object() {
        return bundled.clone();
    }
    parse_catalog(raw, bundled.case_price, &bundled.trinkets)
}

fn parse_catalog(raw: &Value, fallback_price: f64, fallback_trinkets: &[Trinket]) -> CatalogData {
    let case_price = raw
        .get("casePrice")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(fallback_price);

    let trinkets: Vec<Trinket> = raw
        .get("trinkets")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(parse_trinket).collect())
        .unwrap_or_default();

    if trinkets.is_empty() {
        debug!("No valid trinkets in payload, using bundled trinkets");
    }

    CatalogData {
        case_price,
        trinkets: if trinkets.is_empty() {
            fallback_trinkets.to_vec()
        } else {
            trinkets
        },
    }
}

fn parse_trinket(candidate: &Value) -> Option<Trinket> {
    let record = candidate.as_object()?;
    let id = scalar_text(record.get("id"))?;
    let name = scalar_text(record.get("name"))?;
    let price = numeric(record.get("price"))?;

    let icon = record
        .get("icon")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let tags = record.get("tags").and_then(Value::as_array).and_then(|tags| {
        let cleaned: Vec<String> = tags
            .iter()
            .filter_map(|t| scalar_text(Some(t)))
            .collect();
        (!cleaned.is_empty()).then_some(cleaned)
    });

    Some(Trinket {
        id,
        name,
        price,
        icon,
        tags,
    })
}

/// Trimmed, non-empty text from a string or number
fn scalar_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Finite number from a JSON number or numeric string
pub(crate) fn numeric(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Fetch state for optional UI indication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

/// Holds the current catalog and refreshes it from the API
pub struct CatalogClient {
    client: Client,
    base_url: String,
    data: CatalogData,
    status: CatalogStatus,
    session: Option<String>,
}

impl CatalogClient {
    /// Client starting from the bundled catalog
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            data: bundled_catalog().clone(),
            status: CatalogStatus::Idle,
            session: None,
        }
    }

    /// Send the admin session cookie with catalog requests
    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    pub fn data(&self) -> &CatalogData {
        &self.data
    }

    pub fn status(&self) -> CatalogStatus {
        self.status
    }

    pub fn catalog_url(&self) -> String {
        format!("{}{}", self.base_url, CATALOG_PATH)
    }

    fn request(&self) -> RequestBuilder {
        let request = self.client.get(self.catalog_url());
        match &self.session {
            Some(token) => request.header(COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => request,
        }
    }

    /// GET the catalog and normalize it. Does not touch the held data.
    pub async fn fetch(&self) -> Result<CatalogData> {
        let url = self.catalog_url();
        debug!("Fetching catalog from {}", url);

        let response = self
            .request()
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send catalog request: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Request failed with status {}", status));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse catalog response: {}", e))?;

        Ok(normalize_catalog_response(&payload))
    }

    /// Refresh the held catalog. On failure the previous data stays in
    /// place and the status becomes `Error`.
    pub async fn refresh(&mut self) -> Option<&CatalogData> {
        self.status = CatalogStatus::Loading;
        match self.fetch().await {
            Ok(data) => {
                info!(
                    "Catalog refreshed: {} trinkets, case price {:.2}",
                    data.trinkets.len(),
                    data.case_price
                );
                self.data = data;
                self.status = CatalogStatus::Idle;
                Some(&self.data)
            }
            Err(e) => {
                warn!("Failed to fetch catalog from API, continuing with current data: {}", e);
                self.status = CatalogStatus::Error;
                None
            }
        }
    }
}
