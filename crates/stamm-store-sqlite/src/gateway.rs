//! [`SqlGateway`]: the cascade [`Gateway`] over one SQLite connection.
//!
//! Table and column names come from the registry, which only admits plain
//! lowercase identifiers, so they are spliced into the SQL directly. All
//! values are bound as parameters.

use std::collections::BTreeMap;

use rusqlite::{OptionalExtension as _, params};
use stamm_core::{
  gateway::Gateway,
  ids::Identifier,
  record::{ArchiveState, Stamp},
  registry::EntityType,
};

use crate::encode::encode_dt;

/// A gateway borrowing a connection, normally an open
/// [`rusqlite::Transaction`] (which derefs to one).
pub struct SqlGateway<'c> {
  conn: &'c rusqlite::Connection,
}

impl<'c> SqlGateway<'c> {
  pub fn new(conn: &'c rusqlite::Connection) -> Self { Self { conn } }
}

impl Gateway for SqlGateway<'_> {
  type Error = rusqlite::Error;

  fn load_state(
    &self,
    entity: &EntityType,
    id: &Identifier,
  ) -> rusqlite::Result<Option<ArchiveState>> {
    let sql = format!("SELECT archived FROM {} WHERE id = ?1", entity.table);
    let archived: Option<bool> = self
      .conn
      .query_row(&sql, [id.to_string()], |row| row.get(0))
      .optional()?;
    Ok(archived.map(ArchiveState::from_flag))
  }

  fn transition_self(
    &self,
    entity: &EntityType,
    id: &Identifier,
    target: ArchiveState,
    stamp: &Stamp,
  ) -> rusqlite::Result<bool> {
    let changed = match target {
      ArchiveState::Archived => self.conn.execute(
        &format!(
          "UPDATE {} SET archived = 1, archived_at = ?2, archived_by = ?3
           WHERE id = ?1 AND archived = 0",
          entity.table
        ),
        params![id.to_string(), encode_dt(stamp.at), stamp.actor],
      )?,
      ArchiveState::Active => self.conn.execute(
        &format!(
          "UPDATE {} SET archived = 0, archived_at = NULL, archived_by = NULL
           WHERE id = ?1 AND archived = 1",
          entity.table
        ),
        params![id.to_string()],
      )?,
    };
    Ok(changed > 0)
  }

  fn find_child_identifiers(
    &self,
    child: &EntityType,
    column: &str,
    parent: &Identifier,
    state: ArchiveState,
  ) -> rusqlite::Result<Vec<String>> {
    // Only declared reference columns may reach the SQL text.
    if child.parent_by_column(column).is_none() {
      return Err(rusqlite::Error::InvalidColumnName(column.to_owned()));
    }
    let sql = format!(
      "SELECT id FROM {} WHERE {column} = ?1 AND archived = ?2 ORDER BY id",
      child.table
    );
    let mut stmt = self.conn.prepare(&sql)?;
    let ids = stmt
      .query_map(params![parent.to_string(), state.is_archived()], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
  }

  fn read_foreign_key_values(
    &self,
    entity: &EntityType,
    id: &Identifier,
  ) -> rusqlite::Result<BTreeMap<String, Option<String>>> {
    if entity.parents.is_empty() {
      return Ok(BTreeMap::new());
    }
    let columns = entity
      .parents
      .iter()
      .map(|p| p.column)
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!("SELECT {columns} FROM {} WHERE id = ?1", entity.table);

    let values = self
      .conn
      .query_row(&sql, [id.to_string()], |row| {
        entity
          .parents
          .iter()
          .enumerate()
          .map(|(i, p)| -> rusqlite::Result<(String, Option<String>)> {
            Ok((p.column.to_owned(), row.get(i)?))
          })
          .collect::<rusqlite::Result<BTreeMap<_, _>>>()
      })
      .optional()?;
    Ok(values.unwrap_or_default())
  }
}
