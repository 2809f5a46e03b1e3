//! [`SqliteStore`], the SQLite implementation of [`MasterDataStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params};
use stamm_core::{
  cascade, catalog,
  gateway::Gateway as _,
  ids::{self, Identifier, KeyKind},
  record::{
    ArchiveState, AuditAction, AuditEvent, CascadeOutcome, NewRecord, Record,
    RecordStatus, Stamp,
  },
  registry::{EntityType, Registry},
  store::{AuditQuery, MasterDataStore, RecordQuery},
};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    AUDIT_COLUMNS, RawAuditEvent, RawRecord, encode_audit_action, encode_dt,
    read_raw_audit_event, read_raw_record, record_columns,
  },
  gateway::SqlGateway,
  schema::schema,
};

type CoreResult<T> = stamm_core::Result<T>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Stamm master-data store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:     tokio_rusqlite::Connection,
  registry: &'static Registry,
}

impl SqliteStore {
  /// Open (or create) a store at `path` for the built-in catalogue.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, catalog::registry()).await
  }

  /// Open (or create) a store at `path` whose tables follow `registry`.
  pub async fn open_with(
    path: impl AsRef<Path>,
    registry: &'static Registry,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, registry };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for the built-in catalogue.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, registry: catalog::registry() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let ddl = schema(self.registry);
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run one archive or restore walk in its own transaction.
  ///
  /// On success the audit events for every changed record are written in the
  /// same transaction. On failure the transaction is rolled back and a single
  /// `failed` event is written for the target.
  async fn run_cascade(
    &self,
    op: CascadeOp,
    alias: &str,
    raw_id: &str,
    actor: &str,
  ) -> Result<CascadeOutcome> {
    let registry = self.registry;
    // Structural errors surface before the connection is touched.
    let entity = registry.resolve(alias)?;
    let id = ids::parse(entity, raw_id)?;
    let stamp = Stamp::now(actor);

    let entity_name = entity.name;
    let id_text = id.to_string();

    let result: CoreResult<CascadeOutcome> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let walked = {
          let gateway = SqlGateway::new(&tx);
          match op {
            CascadeOp::Archive => {
              cascade::archive(registry, &gateway, entity_name, &id_text, &stamp)
            }
            CascadeOp::Restore => {
              cascade::restore(registry, &gateway, entity_name, &id_text, &stamp)
            }
          }
        };

        match walked {
          Ok(outcome) => {
            for key in &outcome.changed {
              insert_audit(
                &tx,
                &audit_event(&key.entity, key.id.to_string(), op.audit_action(), &stamp, None),
              )?;
            }
            tx.commit()?;
            Ok(Ok(outcome))
          }
          Err(err) => {
            tx.rollback()?;
            let failed = audit_event(
              entity_name,
              id_text.clone(),
              AuditAction::Failed,
              &stamp,
              Some(err.to_string()),
            );
            if let Err(audit_err) = insert_audit(conn, &failed) {
              error!(entity = entity_name, id = id_text.as_str(), %audit_err, "could not record failed cascade");
            }
            Ok(Err(err))
          }
        }
      })
      .await?;

    match result {
      Ok(outcome) => {
        info!(
          op = op.name(),
          entity = entity.name,
          %id,
          actor,
          found = outcome.found,
          changed = outcome.changed.len(),
          "cascade committed"
        );
        Ok(outcome)
      }
      Err(err) => {
        error!(op = op.name(), entity = entity.name, %id, actor, %err, "cascade rolled back");
        Err(err.into())
      }
    }
  }
}

#[derive(Debug, Clone, Copy)]
enum CascadeOp {
  Archive,
  Restore,
}

impl CascadeOp {
  fn name(self) -> &'static str {
    match self {
      Self::Archive => "archive",
      Self::Restore => "restore",
    }
  }

  fn audit_action(self) -> AuditAction {
    match self {
      Self::Archive => AuditAction::Archived,
      Self::Restore => AuditAction::Restored,
    }
  }
}

fn audit_event(
  entity: &str,
  record_id: String,
  action: AuditAction,
  stamp: &Stamp,
  detail: Option<String>,
) -> AuditEvent {
  AuditEvent {
    event_id: Uuid::new_v4(),
    entity: entity.to_owned(),
    record_id,
    action,
    actor: stamp.actor.clone(),
    recorded_at: stamp.at,
    detail,
  }
}

/// SQLite binds LIMIT/OFFSET as i64; anything larger saturates.
fn sql_count(value: Option<usize>, default: usize) -> i64 {
  i64::try_from(value.unwrap_or(default)).unwrap_or(i64::MAX)
}

fn insert_audit(conn: &rusqlite::Connection, event: &AuditEvent) -> rusqlite::Result<()> {
  conn.execute(
    &format!("INSERT INTO audit_events ({AUDIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
    params![
      event.event_id.hyphenated().to_string(),
      event.entity,
      event.record_id,
      encode_audit_action(event.action),
      event.actor,
      encode_dt(event.recorded_at),
      event.detail,
    ],
  )?;
  Ok(())
}

/// Insert one entity row; `record.references` must list every parent column.
fn insert_record(
  conn: &rusqlite::Connection,
  entity: &EntityType,
  record: &Record,
) -> rusqlite::Result<()> {
  let mut columns = vec!["id"];
  let mut values = vec![Some(record.id.to_string())];
  for parent_ref in &entity.parents {
    columns.push(parent_ref.column);
    values.push(record.references.get(parent_ref.column).cloned().flatten());
  }
  columns.extend(["attributes", "created_at"]);
  values.push(Some(record.attributes.to_string()));
  values.push(Some(encode_dt(record.created_at)));

  let placeholders = (1..=values.len())
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");
  conn.execute(
    &format!(
      "INSERT INTO {} ({}) VALUES ({placeholders})",
      entity.table,
      columns.join(", ")
    ),
    rusqlite::params_from_iter(values),
  )?;
  Ok(())
}

// ─── MasterDataStore impl ────────────────────────────────────────────────────

impl MasterDataStore for SqliteStore {
  type Error = crate::Error;

  fn registry(&self) -> &Registry { self.registry }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn create_record(&self, alias: &str, input: NewRecord) -> Result<Record> {
    let registry = self.registry;
    let entity = registry.resolve(alias)?;
    let id = match input.id.as_deref() {
      Some(raw) => ids::parse(entity, raw)?,
      None if entity.key == KeyKind::Token => Identifier::Token(Uuid::new_v4()),
      None => return Err(stamm_core::Error::MissingIdentifier(entity.name).into()),
    };

    let mut references: BTreeMap<String, Option<String>> = entity
      .parents
      .iter()
      .map(|p| (p.column.to_owned(), None))
      .collect();
    let mut parents: Vec<(&'static EntityType, Identifier)> = Vec::new();
    for (column, raw) in input.references {
      let parent_ref = entity.parent_by_column(&column).ok_or_else(|| {
        stamm_core::Error::UnknownReference { entity: entity.name, column: column.clone() }
      })?;
      let parent = registry.entity(parent_ref.entity)?;
      let parent_id = ids::parse(parent, &raw)?;
      references.insert(column, Some(parent_id.to_string()));
      parents.push((parent, parent_id));
    }

    let attributes = match input.attributes {
      serde_json::Value::Null => serde_json::json!({}),
      other => other,
    };
    let record = Record {
      entity: entity.name.to_owned(),
      id,
      references,
      attributes,
      created_at: Utc::now(),
      status: RecordStatus::Active,
    };

    let row = record.clone();
    let inserted: CoreResult<()> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let gateway = SqlGateway::new(&tx);
          if gateway.exists(entity, &row.id)? {
            return Ok(Err(stamm_core::Error::AlreadyExists {
              entity: entity.name,
              id:     row.id.to_string(),
            }));
          }
          // A new record may not hang off an archived parent.
          for (parent, parent_id) in &parents {
            match gateway.load_state(parent, parent_id)? {
              Some(ArchiveState::Active) => {}
              Some(ArchiveState::Archived) => {
                return Ok(Err(stamm_core::Error::ParentArchived {
                  entity: parent.name,
                  id:     parent_id.to_string(),
                }));
              }
              None => {
                return Ok(Err(stamm_core::Error::ParentNotFound {
                  entity: parent.name,
                  id:     parent_id.to_string(),
                }));
              }
            }
          }
        }
        insert_record(&tx, entity, &row)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;
    inserted?;

    Ok(record)
  }

  async fn get_record(&self, alias: &str, raw_id: &str) -> Result<Option<Record>> {
    let registry = self.registry;
    let entity = registry.resolve(alias)?;
    let id_text = ids::parse(entity, raw_id)?.to_string();
    let sql = format!(
      "SELECT {} FROM {} WHERE id = ?1",
      record_columns(entity),
      entity.table
    );

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, params![id_text], |row| read_raw_record(row, entity))
            .optional()?,
        )
      })
      .await?;

    raw.map(|r| r.into_record(entity)).transpose()
  }

  async fn list_records(&self, alias: &str, query: &RecordQuery) -> Result<Vec<Record>> {
    let registry = self.registry;
    let entity = registry.resolve(alias)?;
    let archived = query.state.map(ArchiveState::is_archived);
    let limit_val = sql_count(query.limit, 100);
    let offset_val = sql_count(query.offset, 0);
    let sql = format!(
      "SELECT {} FROM {}
       WHERE (?1 IS NULL OR archived = ?1)
       ORDER BY id
       LIMIT ?2 OFFSET ?3",
      record_columns(entity),
      entity.table
    );

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![archived, limit_val, offset_val], |row| {
            read_raw_record(row, entity)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|r| r.into_record(entity)).collect()
  }

  // ── Cascades ──────────────────────────────────────────────────────────────

  async fn archive(&self, alias: &str, id: &str, actor: &str) -> Result<CascadeOutcome> {
    self.run_cascade(CascadeOp::Archive, alias, id, actor).await
  }

  async fn restore(&self, alias: &str, id: &str, actor: &str) -> Result<CascadeOutcome> {
    self.run_cascade(CascadeOp::Restore, alias, id, actor).await
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  async fn audit_trail(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>> {
    let entity = query
      .entity
      .as_deref()
      .map(|alias| self.registry.canonical_name(alias))
      .transpose()?;
    let record_id = query.record_id.as_deref().map(|r| r.trim().to_owned());
    let limit_val = sql_count(query.limit, 100);
    let sql = format!(
      "SELECT {AUDIT_COLUMNS} FROM audit_events
       WHERE (?1 IS NULL OR entity = ?1)
         AND (?2 IS NULL OR record_id = ?2)
       ORDER BY seq DESC
       LIMIT ?3"
    );

    let raws: Vec<RawAuditEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![entity, record_id, limit_val], read_raw_audit_event)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEvent::into_event).collect()
  }
}
