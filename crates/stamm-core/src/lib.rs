//! Core types and the cascading archive/restore engine for the Stamm
//! master-data store.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement [`gateway::Gateway`] (the narrow contract the cascade
//! executors walk the entity graph through) and [`store::MasterDataStore`]
//! (the async surface the API and server depend on).

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cascade;
pub mod catalog;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod record;
pub mod registry;
pub mod store;

pub use error::{Error, Result};
