//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Identifiers are stored in
//! their canonical text form (hyphenated lowercase UUIDs, codes verbatim).
//! Attributes are compact JSON.

use chrono::{DateTime, Utc};
use stamm_core::{
  ids,
  record::{AuditAction, AuditEvent, Record, RecordStatus},
  registry::EntityType,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── AuditAction ─────────────────────────────────────────────────────────────

pub fn encode_audit_action(a: AuditAction) -> &'static str { a.as_str() }

pub fn decode_audit_action(s: &str) -> Result<AuditAction> {
  match s {
    "archived" => Ok(AuditAction::Archived),
    "restored" => Ok(AuditAction::Restored),
    "failed" => Ok(AuditAction::Failed),
    other => Err(Error::UnknownAuditAction(other.to_owned())),
  }
}

// ─── Record rows ─────────────────────────────────────────────────────────────

/// Select list matching [`read_raw_record`].
pub fn record_columns(entity: &EntityType) -> String {
  let mut cols = vec!["id"];
  cols.extend(entity.parents.iter().map(|p| p.column));
  cols.extend(["attributes", "created_at", "archived", "archived_at", "archived_by"]);
  cols.join(", ")
}

/// Raw values read directly from an entity table row.
pub struct RawRecord {
  pub id:          String,
  pub references:  Vec<(String, Option<String>)>,
  pub attributes:  String,
  pub created_at:  String,
  pub archived:    bool,
  pub archived_at: Option<String>,
  pub archived_by: Option<String>,
}

pub fn read_raw_record(
  row: &rusqlite::Row<'_>,
  entity: &EntityType,
) -> rusqlite::Result<RawRecord> {
  let n = entity.parents.len();
  let references = entity
    .parents
    .iter()
    .enumerate()
    .map(|(i, p)| -> rusqlite::Result<(String, Option<String>)> {
      Ok((p.column.to_owned(), row.get(i + 1)?))
    })
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(RawRecord {
    id: row.get(0)?,
    references,
    attributes: row.get(n + 1)?,
    created_at: row.get(n + 2)?,
    archived: row.get(n + 3)?,
    archived_at: row.get(n + 4)?,
    archived_by: row.get(n + 5)?,
  })
}

impl RawRecord {
  pub fn into_record(self, entity: &EntityType) -> Result<Record> {
    let archived_at = self.archived_at.as_deref().map(decode_dt).transpose()?;
    Ok(Record {
      entity:     entity.name.to_owned(),
      id:         ids::parse(entity, &self.id)?,
      references: self.references.into_iter().collect(),
      attributes: serde_json::from_str(&self.attributes)?,
      created_at: decode_dt(&self.created_at)?,
      status:     RecordStatus::from_columns(self.archived, archived_at, self.archived_by)?,
    })
  }
}

// ─── Audit rows ──────────────────────────────────────────────────────────────

pub const AUDIT_COLUMNS: &str =
  "event_id, entity, record_id, action, actor, recorded_at, detail";

pub struct RawAuditEvent {
  pub event_id:    String,
  pub entity:      String,
  pub record_id:   String,
  pub action:      String,
  pub actor:       String,
  pub recorded_at: String,
  pub detail:      Option<String>,
}

pub fn read_raw_audit_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAuditEvent> {
  Ok(RawAuditEvent {
    event_id:    row.get(0)?,
    entity:      row.get(1)?,
    record_id:   row.get(2)?,
    action:      row.get(3)?,
    actor:       row.get(4)?,
    recorded_at: row.get(5)?,
    detail:      row.get(6)?,
  })
}

impl RawAuditEvent {
  pub fn into_event(self) -> Result<AuditEvent> {
    Ok(AuditEvent {
      event_id:    Uuid::parse_str(&self.event_id)?,
      entity:      self.entity,
      record_id:   self.record_id,
      action:      decode_audit_action(&self.action)?,
      actor:       self.actor,
      recorded_at: decode_dt(&self.recorded_at)?,
      detail:      self.detail,
    })
  }
}
