//! The `MasterDataStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `stamm-store-sqlite`).
//! Higher layers (`stamm-api`, `stamm-server`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use crate::{
  record::{ArchiveState, AuditEvent, CascadeOutcome, NewRecord, Record},
  registry::Registry,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`MasterDataStore::list_records`].
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
  /// Restrict to active or archived records; both when `None`.
  pub state:  Option<ArchiveState>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// Parameters for [`MasterDataStore::audit_trail`].
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
  /// Any alias of the entity type; matched on its canonical name.
  pub entity:    Option<String>,
  pub record_id: Option<String>,
  pub limit:     Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Stamm master-data backend.
///
/// Records are never physically deleted. `archive` and `restore` each run as
/// one all-or-nothing transaction over the entity graph described by
/// [`MasterDataStore::registry`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait MasterDataStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The entity graph this store was opened with.
  fn registry(&self) -> &Registry;

  // ── Records ───────────────────────────────────────────────────────────

  /// Insert a new, active record. Token identifiers are generated when
  /// `input.id` is `None`.
  fn create_record<'a>(
    &'a self,
    alias: &'a str,
    input: NewRecord,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + 'a;

  /// Retrieve a record by identifier. Returns `None` if not found.
  fn get_record<'a>(
    &'a self,
    alias: &'a str,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + 'a;

  /// List records of one entity type, ordered by identifier.
  fn list_records<'a>(
    &'a self,
    alias: &'a str,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + 'a;

  // ── Cascades ──────────────────────────────────────────────────────────

  /// Archive a record and every active descendant.
  fn archive<'a>(
    &'a self,
    alias: &'a str,
    id: &'a str,
    actor: &'a str,
  ) -> impl Future<Output = Result<CascadeOutcome, Self::Error>> + Send + 'a;

  /// Restore a record, its archived ancestors and its archived descendants.
  fn restore<'a>(
    &'a self,
    alias: &'a str,
    id: &'a str,
    actor: &'a str,
  ) -> impl Future<Output = Result<CascadeOutcome, Self::Error>> + Send + 'a;

  // ── Audit ─────────────────────────────────────────────────────────────

  /// Audit events, newest first.
  fn audit_trail<'a>(
    &'a self,
    query: &'a AuditQuery,
  ) -> impl Future<Output = Result<Vec<AuditEvent>, Self::Error>> + Send + 'a;
}
