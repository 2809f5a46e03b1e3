//! Handlers for `/records` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/records/:alias` | Optional `?state=active\|archived&limit&offset` |
//! | `POST`   | `/records/:alias` | Body: [`NewRecord`]; returns 201 + stored record |
//! | `GET`    | `/records/:alias/:id` | 404 if not found |
//! | `DELETE` | `/records/:alias/:id` | Archive cascade; 404 if not found |
//! | `POST`   | `/records/:alias/:id/restore` | Restore cascade; 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use stamm_core::{
  record::{ArchiveState, CascadeOutcome, NewRecord, Record},
  store::{MasterDataStore, RecordQuery},
};

use crate::{Actor, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub state:  Option<ArchiveState>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /records/:alias[?state=<state>][&limit=<n>][&offset=<n>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(alias): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Record>>, ApiError>
where
  S: MasterDataStore,
{
  let query = RecordQuery {
    state:  params.state,
    limit:  params.limit,
    offset: params.offset,
  };
  let records = store
    .list_records(&alias, &query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /records/:alias`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path(alias): Path<String>,
  Json(body): Json<NewRecord>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MasterDataStore,
{
  let record = store
    .create_record(&alias, body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /records/:alias/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((alias, id)): Path<(String, String)>,
) -> Result<Json<Record>, ApiError>
where
  S: MasterDataStore,
{
  store
    .get_record(&alias, &id)
    .await
    .map_err(ApiError::from_store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("{alias} {id} not found")))
}

// ─── Cascades ─────────────────────────────────────────────────────────────────

/// `DELETE /records/:alias/:id` archives the record and its active
/// descendants.
pub async fn archive_one<S>(
  State(store): State<Arc<S>>,
  Path((alias, id)): Path<(String, String)>,
  Actor(actor): Actor,
) -> Result<Json<CascadeOutcome>, ApiError>
where
  S: MasterDataStore,
{
  let outcome = store
    .archive(&alias, &id, &actor)
    .await
    .map_err(ApiError::from_store)?;
  found(outcome, &alias, &id)
}

/// `POST /records/:alias/:id/restore`
pub async fn restore_one<S>(
  State(store): State<Arc<S>>,
  Path((alias, id)): Path<(String, String)>,
  Actor(actor): Actor,
) -> Result<Json<CascadeOutcome>, ApiError>
where
  S: MasterDataStore,
{
  let outcome = store
    .restore(&alias, &id, &actor)
    .await
    .map_err(ApiError::from_store)?;
  found(outcome, &alias, &id)
}

fn found(
  outcome: CascadeOutcome,
  alias: &str,
  id: &str,
) -> Result<Json<CascadeOutcome>, ApiError> {
  if outcome.found {
    Ok(Json(outcome))
  } else {
    Err(ApiError::NotFound(format!("{alias} {id} not found")))
  }
}
