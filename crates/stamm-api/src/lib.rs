//! JSON REST API for Stamm.
//!
//! Exposes an axum [`Router`] backed by any [`stamm_core::store::MasterDataStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility; the
//! caller identifies who is archiving by inserting an [`Actor`] extension.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", stamm_api::api_router(store.clone()))
//! ```

pub mod audit;
pub mod entities;
pub mod error;
pub mod records;

use std::{convert::Infallible, sync::Arc};

use axum::{
  Router,
  extract::FromRequestParts,
  http::request::Parts,
  routing::{get, post},
};
use stamm_core::store::MasterDataStore;

pub use error::ApiError;

/// Actor recorded when no [`Actor`] extension is present.
pub const ANONYMOUS: &str = "anonymous";

/// The user an archive or restore is attributed to.
///
/// Read from the request extensions, where the hosting server puts it after
/// authenticating the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    Ok(
      parts
        .extensions
        .get::<Actor>()
        .cloned()
        .unwrap_or_else(|| Actor(ANONYMOUS.to_owned())),
    )
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: MasterDataStore + 'static,
{
  Router::new()
    // Registry
    .route("/entities", get(entities::list::<S>))
    .route("/entities/{alias}", get(entities::get_one::<S>))
    // Records
    .route(
      "/records/{alias}",
      get(records::list::<S>).post(records::create::<S>),
    )
    .route(
      "/records/{alias}/{id}",
      get(records::get_one::<S>).delete(records::archive_one::<S>),
    )
    .route("/records/{alias}/{id}/restore", post(records::restore_one::<S>))
    // Audit
    .route("/audit", get(audit::list::<S>))
    .with_state(store)
}
