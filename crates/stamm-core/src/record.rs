//! Records, their archive state, and the results of cascades.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, ids::Identifier};

// ─── Archive state ───────────────────────────────────────────────────────────

/// The archived flag on its own: what queries filter on and what a
/// transition targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveState {
  Active,
  Archived,
}

impl ArchiveState {
  pub fn from_flag(archived: bool) -> Self {
    if archived { Self::Archived } else { Self::Active }
  }

  pub fn is_archived(self) -> bool { matches!(self, Self::Archived) }
}

/// The full archive state of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
  Active,
  Archived {
    at: DateTime<Utc>,
    by: String,
  },
}

impl RecordStatus {
  /// Rebuild the status from the three stored columns, rejecting any
  /// combination other than (false, null, null) and (true, set, set).
  pub fn from_columns(
    archived: bool,
    at: Option<DateTime<Utc>>,
    by: Option<String>,
  ) -> Result<Self> {
    match (archived, at, by) {
      (false, None, None) => Ok(Self::Active),
      (true, Some(at), Some(by)) => Ok(Self::Archived { at, by }),
      (archived, at, by) => Err(Error::InconsistentState(format!(
        "archived={archived} archived_at={at:?} archived_by={by:?}"
      ))),
    }
  }

  pub fn state(&self) -> ArchiveState {
    match self {
      Self::Active => ArchiveState::Active,
      Self::Archived { .. } => ArchiveState::Archived,
    }
  }

  pub fn is_active(&self) -> bool { matches!(self, Self::Active) }
}

/// Who archived a record and when. One stamp is taken per cascade, so every
/// row archived by the same call carries the same timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
  pub actor: String,
  pub at:    DateTime<Utc>,
}

impl Stamp {
  pub fn now(actor: impl Into<String>) -> Self {
    Self { actor: actor.into(), at: Utc::now() }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A stored instance of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
  /// Canonical entity type name.
  pub entity:     String,
  pub id:         Identifier,
  /// Parent reference column → stored identifier text.
  pub references: BTreeMap<String, Option<String>>,
  /// Free-form master-data fields; never interpreted by the cascade.
  pub attributes: serde_json::Value,
  pub created_at: DateTime<Utc>,
  #[serde(flatten)]
  pub status:     RecordStatus,
}

/// Input to [`crate::store::MasterDataStore::create_record`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRecord {
  /// Required for code-keyed types; generated for token-keyed ones if absent.
  #[serde(default)]
  pub id:         Option<String>,
  #[serde(default)]
  pub references: BTreeMap<String, String>,
  #[serde(default)]
  pub attributes: serde_json::Value,
}

impl NewRecord {
  pub fn with_id(id: impl Into<String>) -> Self {
    Self { id: Some(id.into()), ..Self::default() }
  }

  /// Builder-style helper for setting one parent reference.
  pub fn reference(
    mut self,
    column: impl Into<String>,
    parent_id: impl ToString,
  ) -> Self {
    self.references.insert(column.into(), parent_id.to_string());
    self
  }
}

// ─── Cascade results ─────────────────────────────────────────────────────────

/// A (canonical entity name, identifier) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
  pub entity: String,
  pub id:     Identifier,
}

impl RecordKey {
  pub fn new(entity: impl Into<String>, id: Identifier) -> Self {
    Self { entity: entity.into(), id }
  }
}

/// What an archive or restore call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeOutcome {
  /// Whether the target record existed.
  pub found:   bool,
  /// Records whose state actually changed, in transition order. Empty when
  /// every record was already in the target state.
  pub changed: Vec<RecordKey>,
}

impl CascadeOutcome {
  pub fn not_found() -> Self { Self::default() }
}

// ─── Audit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
  Archived,
  Restored,
  Failed,
}

impl AuditAction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Archived => "archived",
      Self::Restored => "restored",
      Self::Failed => "failed",
    }
  }
}

/// One line of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
  pub event_id:    Uuid,
  pub entity:      String,
  pub record_id:   String,
  pub action:      AuditAction,
  pub actor:       String,
  pub recorded_at: DateTime<Utc>,
  /// Error text for [`AuditAction::Failed`] events.
  pub detail:      Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_from_valid_columns() {
    assert_eq!(RecordStatus::from_columns(false, None, None).unwrap(), RecordStatus::Active);

    let at = Utc::now();
    let status = RecordStatus::from_columns(true, Some(at), Some("ops".into())).unwrap();
    assert_eq!(status, RecordStatus::Archived { at, by: "ops".into() });
    assert_eq!(status.state(), ArchiveState::Archived);
  }

  #[test]
  fn status_rejects_half_states() {
    assert!(RecordStatus::from_columns(true, None, Some("ops".into())).is_err());
    assert!(RecordStatus::from_columns(true, Some(Utc::now()), None).is_err());
    assert!(RecordStatus::from_columns(false, Some(Utc::now()), None).is_err());
    assert!(RecordStatus::from_columns(false, None, Some("ops".into())).is_err());
  }

  #[test]
  fn record_status_is_flattened() {
    let record = Record {
      entity:     "country".into(),
      id:         Identifier::Code("AT".into()),
      references: BTreeMap::new(),
      attributes: serde_json::json!({ "name": "Austria" }),
      created_at: Utc::now(),
      status:     RecordStatus::Active,
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["status"], "active");
    assert_eq!(json["id"], "AT");

    let back: Record = serde_json::from_value(json).unwrap();
    assert!(back.status.is_active());
  }
}
