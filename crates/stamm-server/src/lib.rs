//! HTTP server for Stamm.
//!
//! Mounts the [`stamm_api`] router under `/api` behind HTTP Basic auth. The
//! authenticated user becomes the actor stamped on archived records.

pub mod auth;
pub mod error;
pub mod startup;

pub use error::Error;
pub use startup::ServerConfig;

use std::sync::Arc;

use axum::{Router, middleware};
use stamm_core::store::MasterDataStore;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_auth};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state the router is built from.
#[derive(Clone)]
pub struct AppState<S: MasterDataStore> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: MasterDataStore + 'static,
{
  let api = stamm_api::api_router(state.store)
    .layer(middleware::from_fn_with_state(state.auth, require_auth));

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
