//! Handler for `GET /audit`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use stamm_core::{
  record::AuditEvent,
  store::{AuditQuery, MasterDataStore},
};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AuditParams {
  /// Any alias of the entity type.
  pub entity:    Option<String>,
  pub record_id: Option<String>,
  pub limit:     Option<usize>,
}

/// `GET /audit[?entity=<alias>][&record_id=<id>][&limit=<n>]`, newest first.
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<AuditParams>,
) -> Result<Json<Vec<AuditEvent>>, ApiError>
where
  S: MasterDataStore,
{
  let query = AuditQuery {
    entity:    params.entity,
    record_id: params.record_id,
    limit:     params.limit,
  };
  let events = store
    .audit_trail(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(events))
}
