//! ============================================================================
//! Admin API Client - Catalog management over the admin HTTP API
//! ============================================================================
//! Talks to the admin endpoints that maintain charms (catalog trinkets) and
//! the case price. Login returns an `admin_token` cookie which the client
//! replays on every later call.
//!
//! Payload rules are checked client-side before anything is sent, so a bad
//! form never costs a round trip:
//! - name: trimmed, required
//! - price: finite and > 0 (numbers or numeric strings)
//! - icon: trimmed, optional
//! - tags: list or comma-separated string, trimmed, empties dropped
//! ============================================================================

use anyhow::{anyhow, Result};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::catalog::numeric;
use crate::types::Trinket;

/// Session cookie set by the login endpoint
pub const SESSION_COOKIE: &str = "admin_token";

/// Longest generated charm id
pub const MAX_SLUG_LEN: usize = 60;

const FALLBACK_SLUG: &str = "charm";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CharmPayloadError {
    #[error("Name is required")]
    MissingName,

    #[error("Price must be greater than zero")]
    InvalidPrice,

    #[error("Case price must be a positive number")]
    InvalidCasePrice,

    #[error("Charm id already exists: {0}")]
    IdTaken(String),
}

/// Validated charm fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharmPayload {
    pub name: String,
    pub price: f64,
    pub icon: Option<String>,
    pub tags: Vec<String>,
}

/// Id chosen for a new charm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharmId {
    pub id: String,
    /// Derived from the name rather than supplied
    pub generated: bool,
}

/// Validate a raw charm form body
pub fn sanitize_charm_payload(body: &Value) -> std::result::Result<CharmPayload, CharmPayloadError> {
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if name.is_empty() {
        return Err(CharmPayloadError::MissingName);
    }

    let price = numeric(body.get("price"))
        .filter(|p| *p > 0.0)
        .ok_or(CharmPayloadError::InvalidPrice)?;

    let icon = body
        .get("icon")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let tags = match body.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Ok(CharmPayload {
        name,
        price,
        icon,
        tags,
    })
}

/// Lowercase, collapse runs of non-alphanumerics to `-`, trim dashes, cap at
/// 60 chars. Falls back to `charm` when nothing is left.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Pick an id for a new charm.
///
/// An explicit id is slugified and must be unused. Otherwise the name's slug
/// is used, suffixed `-1`, `-2`, ... until `exists` says it is free.
pub fn derive_charm_id(
    raw_id: Option<&str>,
    name: &str,
    exists: impl Fn(&str) -> bool,
) -> std::result::Result<CharmId, CharmPayloadError> {
    if let Some(raw) = raw_id.map(str::trim).filter(|s| !s.is_empty()) {
        let id = slugify(raw);
        if exists(&id) {
            return Err(CharmPayloadError::IdTaken(id));
        }
        return Ok(CharmId {
            id,
            generated: false,
        });
    }

    let base = slugify(name);
    let mut candidate = base.clone();
    let mut suffix = 1;
    while exists(&candidate) {
        candidate = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    Ok(CharmId {
        id: candidate,
        generated: true,
    })
}

pub fn validate_case_price(value: &Value) -> std::result::Result<f64, CharmPayloadError> {
    numeric(Some(value))
        .filter(|p| *p > 0.0)
        .ok_or(CharmPayloadError::InvalidCasePrice)
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AdminUser {
    username: String,
}

#[derive(Debug, Serialize)]
struct NewCharm<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(flatten)]
    payload: &'a CharmPayload,
}

#[derive(Debug, Deserialize)]
struct CharmEnvelope {
    charm: Trinket,
}

#[derive(Debug, Deserialize)]
struct CharmList {
    charms: Vec<Trinket>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CasePriceBody {
    case_price: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Client for the admin endpoints
pub struct AdminClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl AdminClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Current session token, for other clients that need the cookie
    pub fn session_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/admin{}", self.base_url, path)
    }

    /// `/charms/{id}` with the id percent-encoded as one path segment
    fn charm_url(&self, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url("/charms"))
            .map_err(|e| anyhow!("Invalid admin API URL: {}", e))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Admin API URL cannot hold a path"))?
            .push(id);
        Ok(url)
    }

    /// Authenticate and keep the session cookie
    pub async fn login(&mut self, username: &str, password: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send login request: {}", e))?;
        let response = check(response).await?;

        self.token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(session_token);
        if self.token.is_none() {
            return Err(anyhow!("Login response did not set {}", SESSION_COOKIE));
        }

        let user: AdminUser = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse login response: {}", e))?;
        info!("Logged in to admin API as {}", user.username);
        Ok(user.username)
    }

    pub async fn logout(&mut self) -> Result<()> {
        let request = self.authed(self.client.post(self.url("/logout")));
        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send logout request: {}", e))?;
        check(response).await?;
        self.token = None;
        debug!("Admin session closed");
        Ok(())
    }

    /// Username of the current session
    pub async fn me(&self) -> Result<String> {
        let response = self
            .authed(self.client.get(self.url("/me")))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send session request: {}", e))?;
        let user: AdminUser = check(response)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse session response: {}", e))?;
        Ok(user.username)
    }

    pub async fn list_charms(&self) -> Result<Vec<Trinket>> {
        let response = self
            .authed(self.client.get(self.url("/charms")))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to list charms: {}", e))?;
        let list: CharmList = check(response)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse charm list: {}", e))?;
        Ok(list.charms)
    }

    /// Id a new charm will get, checked against the charms already stored
    pub async fn next_charm_id(&self, raw_id: Option<&str>, name: &str) -> Result<CharmId> {
        let existing: HashSet<String> = self
            .list_charms()
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let id = derive_charm_id(raw_id, name, |candidate| existing.contains(candidate))?;
        debug!("Resolved charm id {} (generated: {})", id.id, id.generated);
        Ok(id)
    }

    pub async fn create_charm(&self, id: Option<&str>, payload: &CharmPayload) -> Result<Trinket> {
        let response = self
            .authed(self.client.post(self.url("/charms")))
            .json(&NewCharm { id, payload })
            .send()
            .await
            .map_err(|e| anyhow!("Failed to create charm: {}", e))?;
        let created: CharmEnvelope = check(response)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse created charm: {}", e))?;
        info!("Created charm {}", created.charm.id);
        Ok(created.charm)
    }

    pub async fn update_charm(&self, id: &str, payload: &CharmPayload) -> Result<Trinket> {
        let response = self
            .authed(self.client.put(self.url(&format!("/charms/{}", id))))
            .json(payload)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to update charm {}: {}", id, e))?;
        let updated: CharmEnvelope = check(response)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse updated charm: {}", e))?;
        Ok(updated.charm)
    }

    pub async fn delete_charm(&self, id: &str) -> Result<()> {
        let response = self
            .authed(self.client.delete(self.url(&format!("/charms/{}", id))))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to delete charm {}: {}", id, e))?;
        check(response).await?;
        info!("Deleted charm {}", id);
        Ok(())
    }

    /// Returns the price the server stored
    pub async fn set_case_price(&self, case_price: f64) -> Result<f64> {
        if !case_price.is_finite() || case_price <= 0.0 {
            return Err(CharmPayloadError::InvalidCasePrice.into());
        }
        let response = self
            .authed(self.client.put(self.url("/catalog/case-price")))
            .json(&CasePriceBody { case_price })
            .send()
            .await
            .map_err(|e| anyhow!("Failed to update case price: {}", e))?;
        let body: CasePriceBody = check(response)
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse case price response: {}", e))?;
        Ok(body.case_price)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => request,
        }
    }
}

/// Map a non-2xx response to an error carrying the server's message
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| "Unknown error".to_string());
    Err(anyhow!("Admin API error ({}): {}", status, message))
}

/// Token value from a `Set-Cookie` header, if it is the session cookie
fn session_token(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name.trim() == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_trims_fields() {
        let payload = sanitize_charm_payload(&json!({
            "name": "  Lucky Star ",
            "price": "3.5",
            "icon": "  ",
            "tags": " sky, ,night "
        }))
        .unwrap();
        assert_eq!(payload.name, "Lucky Star");
        assert_eq!(payload.price, 3.5);
        assert_eq!(payload.icon, None);
        assert_eq!(payload.tags, vec!["sky", "night"]);
    }

    #[test]
    fn test_sanitize_tag_list() {
        let payload = sanitize_charm_payload(&json!({
            "name": "Bow",
            "price": 2,
            "icon": " 🎀 ",
            "tags": ["pink ", "", 7, "cute"]
        }))
        .unwrap();
        assert_eq!(payload.icon.as_deref(), Some("🎀"));
        assert_eq!(payload.tags, vec!["pink", "cute"]);
    }

    #[test]
    fn test_sanitize_rejects_bad_input() {
        assert_eq!(
            sanitize_charm_payload(&json!({"name": "  ", "price": 1})),
            Err(CharmPayloadError::MissingName)
        );
        assert_eq!(
            sanitize_charm_payload(&json!({"name": "Bear", "price": 0})),
            Err(CharmPayloadError::InvalidPrice)
        );
        assert_eq!(
            sanitize_charm_payload(&json!({"name": "Bear", "price": "abc"})),
            Err(CharmPayloadError::InvalidPrice)
        );
        assert_eq!(
            sanitize_charm_payload(&json!({"name": "Bear"})),
            Err(CharmPayloadError::InvalidPrice)
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Lucky Star!"), "lucky-star");
        assert_eq!(slugify("--Pink__Bow--"), "pink-bow");
        assert_eq!(slugify("!!!"), "charm");
        assert_eq!(slugify(""), "charm");
        assert_eq!(slugify(&"a".repeat(80)).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_derive_id_from_name_with_suffix() {
        let taken = ["star", "star-1"];
        let id = derive_charm_id(None, "Star", |c| taken.contains(&c)).unwrap();
        assert_eq!(
            id,
            CharmId {
                id: "star-2".into(),
                generated: true
            }
        );
    }

    #[test]
    fn test_derive_explicit_id() {
        let id = derive_charm_id(Some(" My Bear "), "ignored", |_| false).unwrap();
        assert_eq!(id.id, "my-bear");
        assert!(!id.generated);

        assert_eq!(
            derive_charm_id(Some("bear"), "Bear", |c| c == "bear"),
            Err(CharmPayloadError::IdTaken("bear".into()))
        );

        let blank = derive_charm_id(Some("   "), "Moon Light", |_| false).unwrap();
        assert_eq!(blank.id, "moon-light");
        assert!(blank.generated);
    }

    #[test]
    fn test_validate_case_price() {
        assert_eq!(validate_case_price(&json!(19.5)), Ok(19.5));
        assert_eq!(validate_case_price(&json!("20")), Ok(20.0));
        assert!(validate_case_price(&json!(0)).is_err());
        assert!(validate_case_price(&json!(-3)).is_err());
        assert!(validate_case_price(&json!(null)).is_err());
    }

    #[test]
    fn test_session_token_parsing() {
        assert_eq!(
            session_token("admin_token=abc.def; Path=/; HttpOnly"),
            Some("abc.def".to_string())
        );
        assert_eq!(session_token("other=1; Path=/"), None);
        assert_eq!(session_token("admin_token=; Max-Age=0"), None);
    }

    #[test]
    fn test_new_charm_body() {
        let payload = CharmPayload {
            name: "Bear".into(),
            price: 2.5,
            icon: None,
            tags: vec![],
        };
        let body = serde_json::to_value(NewCharm { id: Some("bear"), payload: &payload }).unwrap();
        assert_eq!(body["id"], "bear");
        assert_eq!(body["name"], "Bear");
        assert_eq!(body["price"], 2.5);
    }

    #[test]
    fn test_client_urls() {
        let client = AdminClient::new("http://localhost:4000/");
        assert_eq!(client.url("/charms"), "http://localhost:4000/api/admin/charms");
        assert!(!client.is_logged_in());
        assert_eq!(client.session_token(), None);
    }

    #[test]
    fn test_charm_url_encodes_id() {
        let client = AdminClient::new("http://localhost:4000");
        assert_eq!(
            client.charm_url("bear").unwrap().as_str(),
            "http://localhost:4000/api/admin/charms/bear"
        );
        assert_eq!(
            client.charm_url("a b/c?d").unwrap().as_str(),
            "http://localhost:4000/api/admin/charms/a%20b%2Fc%3Fd"
        );
    }

    #[tokio::test]
    async fn test_login_unreachable_server() {
        let mut client = AdminClient::new("http://127.0.0.1:1");
        assert!(client.login("admin", "secret").await.is_err());
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_case_price_checked_before_request() {
        let client = AdminClient::new("http://127.0.0.1:1");
        let err = client.set_case_price(-1.0).await.unwrap_err();
        assert!(err.to_string().contains("positive"));
    }
}
