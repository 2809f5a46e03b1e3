//! The master-data entity catalogue.
//!
//! This registration pass is the single source of truth for the cascade
//! graph. A table missing here still exists physically but is invisible to
//! archive and restore.
//!
//! ```text
//! country ─► city ─► address ─┬─► site ─► server ──┐
//!                             │                    ├─► deployment
//!                             └─► client ─► project┘
//!                                     └──► contact
//! ```

use std::sync::LazyLock;

use crate::{Result, ids::KeyKind, registry::Registry};

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
  master_data()
    .expect("the built-in entity catalogue is internally consistent")
});

/// The process-wide registry, built on first use.
pub fn registry() -> &'static Registry { &REGISTRY }

/// Build a fresh copy of the master-data registry.
pub fn master_data() -> Result<Registry> {
  Registry::builder()
    // ── Geography ──────────────────────────────────────────────────────
    .entity("country", "countries", KeyKind::Code)
    .entity("city", "cities", KeyKind::Code)
    .entity("address", "addresses", KeyKind::Token)
    // ── Infrastructure ─────────────────────────────────────────────────
    .entity("site", "sites", KeyKind::Token)
    .entity("server", "servers", KeyKind::Token)
    // ── Organisation ───────────────────────────────────────────────────
    .entity("client", "clients", KeyKind::Token)
    .entity("contact", "contacts", KeyKind::Token)
    .entity("project", "projects", KeyKind::Token)
    .entity("deployment", "deployments", KeyKind::Token)
    .alias("working_position", "client")
    .alias("location", "site")
    // ── Edges ──────────────────────────────────────────────────────────
    .reference("city", "country_code", "country")
    .reference("address", "city_code", "city")
    .reference("site", "address_id", "address")
    .reference("server", "site_id", "site")
    .reference("client", "address_id", "address")
    .reference("contact", "client_id", "client")
    .reference("project", "client_id", "client")
    .reference("deployment", "project_id", "project")
    .reference("deployment", "server_id", "server")
    .build()
}
