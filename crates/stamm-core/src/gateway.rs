//! The persistence contract the cascade executors walk the graph through.
//!
//! A [`Gateway`] is bound to one open transaction. Every call is a blocking
//! round-trip; the executors issue them sequentially and never retry.

use std::collections::BTreeMap;

use crate::{
  ids::Identifier,
  record::{ArchiveState, Stamp},
  registry::EntityType,
};

pub trait Gateway {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The record's archive flag, or `None` if no such record exists.
  fn load_state(
    &self,
    entity: &EntityType,
    id: &Identifier,
  ) -> Result<Option<ArchiveState>, Self::Error>;

  fn exists(&self, entity: &EntityType, id: &Identifier) -> Result<bool, Self::Error> {
    Ok(self.load_state(entity, id)?.is_some())
  }

  /// Conditionally move a record into `target`.
  ///
  /// Only applies when the record is currently in the opposite state.
  /// Archiving stamps `stamp`; restoring clears timestamp and actor. Returns
  /// whether a row actually changed.
  fn transition_self(
    &self,
    entity: &EntityType,
    id: &Identifier,
    target: ArchiveState,
    stamp: &Stamp,
  ) -> Result<bool, Self::Error>;

  /// Raw identifiers of `child` records whose `column` equals `parent` and
  /// whose archive flag equals `state`.
  fn find_child_identifiers(
    &self,
    child: &EntityType,
    column: &str,
    parent: &Identifier,
    state: ArchiveState,
  ) -> Result<Vec<String>, Self::Error>;

  /// The record's parent-reference columns and their stored values. Empty if
  /// the record does not exist.
  fn read_foreign_key_values(
    &self,
    entity: &EntityType,
    id: &Identifier,
  ) -> Result<BTreeMap<String, Option<String>>, Self::Error>;
}
