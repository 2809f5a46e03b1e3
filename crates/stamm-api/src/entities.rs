//! Handlers for `/entities` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/entities` | Every entity type with its key kind and edges |
//! | `GET`  | `/entities/:alias` | Resolves an alias; 404 if unsupported |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Serialize;
use stamm_core::{registry::EntityType, store::MasterDataStore};

use crate::error::ApiError;

/// `GET /entities`
pub async fn list<S>(State(store): State<Arc<S>>) -> Json<Vec<EntityType>>
where
  S: MasterDataStore,
{
  Json(store.registry().entity_types().cloned().collect())
}

/// Response body for `GET /entities/:alias`.
#[derive(Debug, Serialize)]
pub struct EntityInfo {
  /// The alias as requested.
  pub alias:          String,
  pub canonical_name: &'static str,
  pub entity:         EntityType,
}

/// `GET /entities/:alias`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(alias): Path<String>,
) -> Result<Json<EntityInfo>, ApiError>
where
  S: MasterDataStore,
{
  let registry = store.registry();
  if !registry.supports(&alias) {
    return Err(ApiError::NotFound(format!("unknown entity type {alias:?}")));
  }
  let entity = registry.resolve(&alias).map_err(ApiError::from_store)?;
  Ok(Json(EntityInfo {
    canonical_name: entity.name,
    entity: entity.clone(),
    alias,
  }))
}
