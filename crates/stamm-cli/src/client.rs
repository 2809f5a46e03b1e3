//! Async HTTP client wrapping the Stamm JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use stamm_core::{
  ids::KeyKind,
  record::{AuditEvent, CascadeOutcome, Record},
};

/// Connection settings for the Stamm API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

/// One edge of the entity graph as reported by `GET /entities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
  pub entity: String,
  pub column: String,
}

/// An entity type as reported by `GET /entities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
  pub name:     String,
  pub key:      KeyKind,
  pub aliases:  Vec<String>,
  pub parents:  Vec<Edge>,
  pub children: Vec<Edge>,
}

/// Async HTTP client for the Stamm JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  // ── Entities ──────────────────────────────────────────────────────────────

  /// `GET /api/entities`
  pub async fn entities(&self) -> Result<Vec<EntitySummary>> {
    let resp = self
      .auth(self.client.get(self.url("/entities")))
      .send()
      .await
      .context("GET /entities failed")?;
    let resp = ensure_success(resp, "GET /entities").await?;
    resp.json().await.context("deserialising entities")
  }

  // ── Records ───────────────────────────────────────────────────────────────

  /// `GET /api/records/<entity>?state=active|archived`
  pub async fn list_records(&self, entity: &str, archived: bool) -> Result<Vec<Record>> {
    let state = if archived { "archived" } else { "active" };
    let resp = self
      .auth(self.client.get(self.url(&format!("/records/{entity}"))))
      .query(&[("state", state)])
      .send()
      .await
      .with_context(|| format!("GET /records/{entity} failed"))?;
    let resp = ensure_success(resp, &format!("GET /records/{entity}")).await?;
    resp.json().await.context("deserialising records")
  }

  /// `GET /api/records/<entity>/<id>`; `None` on 404.
  pub async fn get_record(&self, entity: &str, id: &str) -> Result<Option<Record>> {
    let resp = self
      .auth(self.client.get(self.url(&format!("/records/{entity}/{id}"))))
      .send()
      .await
      .with_context(|| format!("GET /records/{entity}/{id} failed"))?;
    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let resp = ensure_success(resp, &format!("GET /records/{entity}/{id}")).await?;
    resp.json().await.map(Some).context("deserialising record")
  }

  // ── Cascades ──────────────────────────────────────────────────────────────

  /// `DELETE /api/records/<entity>/<id>`
  pub async fn archive(&self, entity: &str, id: &str) -> Result<CascadeOutcome> {
    let resp = self
      .auth(self.client.delete(self.url(&format!("/records/{entity}/{id}"))))
      .send()
      .await
      .with_context(|| format!("DELETE /records/{entity}/{id} failed"))?;
    let resp = ensure_success(resp, &format!("archive {entity} {id}")).await?;
    resp.json().await.context("deserialising cascade outcome")
  }

  /// `POST /api/records/<entity>/<id>/restore`
  pub async fn restore(&self, entity: &str, id: &str) -> Result<CascadeOutcome> {
    let resp = self
      .auth(self.client.post(self.url(&format!("/records/{entity}/{id}/restore"))))
      .send()
      .await
      .with_context(|| format!("POST /records/{entity}/{id}/restore failed"))?;
    let resp = ensure_success(resp, &format!("restore {entity} {id}")).await?;
    resp.json().await.context("deserialising cascade outcome")
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  /// `GET /api/audit[?entity=<e>][&limit=<n>]`
  pub async fn audit(&self, entity: Option<&str>, limit: Option<usize>) -> Result<Vec<AuditEvent>> {
    let mut query = Vec::new();
    if let Some(entity) = entity {
      query.push(("entity", entity.to_owned()));
    }
    if let Some(limit) = limit {
      query.push(("limit", limit.to_string()));
    }
    let resp = self
      .auth(self.client.get(self.url("/audit")))
      .query(&query)
      .send()
      .await
      .context("GET /audit failed")?;
    let resp = ensure_success(resp, "GET /audit").await?;
    resp.json().await.context("deserialising audit events")
  }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn ensure_success(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<serde_json::Value>()
    .await
    .ok()
    .and_then(|body| body["error"].as_str().map(str::to_owned))
    .unwrap_or_else(|| status.to_string());
  Err(anyhow!("{what} → {status}: {message}"))
}
