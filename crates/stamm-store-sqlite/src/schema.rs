//! SQL schema for the Stamm SQLite store.
//!
//! Entity tables are generated from the registry, so the schema and the
//! cascade graph cannot drift apart. Executed once at connection startup;
//! idempotent thanks to `IF NOT EXISTS`.

use stamm_core::registry::{EntityType, Registry};

const PRELUDE: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// Append-only trail of cascade results.
const AUDIT: &str = "
CREATE TABLE IF NOT EXISTS audit_events (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id    TEXT NOT NULL UNIQUE,
    entity      TEXT NOT NULL,   -- canonical entity name
    record_id   TEXT NOT NULL,
    action      TEXT NOT NULL,   -- 'archived' | 'restored' | 'failed'
    actor       TEXT NOT NULL,
    recorded_at TEXT NOT NULL,   -- ISO 8601 UTC
    detail      TEXT
);

CREATE INDEX IF NOT EXISTS audit_events_record_idx ON audit_events(entity, record_id);
";

/// Full DDL for `registry`.
pub fn schema(registry: &Registry) -> String {
  let mut sql = String::from(PRELUDE);
  for entity in registry.entity_types() {
    sql.push_str(&entity_table(registry, entity));
  }
  sql.push_str(AUDIT);
  sql.push_str("\nPRAGMA user_version = 1;\n");
  sql
}

fn entity_table(registry: &Registry, entity: &EntityType) -> String {
  let table = entity.table;
  let mut columns = String::new();
  let mut indexes = String::new();

  for parent_ref in &entity.parents {
    let column = parent_ref.column;
    let references = registry
      .get(parent_ref.entity)
      .map(|parent| format!(" REFERENCES {}(id)", parent.table))
      .unwrap_or_default();
    columns.push_str(&format!("    {column} TEXT{references},\n"));
    indexes.push_str(&format!(
      "CREATE INDEX IF NOT EXISTS {table}_{column}_idx ON {table}({column});\n"
    ));
  }

  // Archive-state columns change only through cascades; the CHECK keeps
  // every row in exactly one of the two states.
  format!(
    "
CREATE TABLE IF NOT EXISTS {table} (
    id          TEXT PRIMARY KEY,
{columns}    attributes  TEXT NOT NULL DEFAULT '{{}}',
    created_at  TEXT NOT NULL,
    archived    INTEGER NOT NULL DEFAULT 0,
    archived_at TEXT,
    archived_by TEXT,
    CHECK ((archived = 0 AND archived_at IS NULL AND archived_by IS NULL)
        OR (archived = 1 AND archived_at IS NOT NULL AND archived_by IS NOT NULL))
);
CREATE INDEX IF NOT EXISTS {table}_archived_idx ON {table}(archived);
{indexes}"
  )
}
