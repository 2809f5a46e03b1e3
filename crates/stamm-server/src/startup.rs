//! Boot sequence: layered configuration, locating and opening the store
//! against the entity catalogue, and announcing that catalogue in the log.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use stamm_core::registry::{EntityType, Registry};
use stamm_store_sqlite::SqliteStore;
use tracing::{info, warn};

use crate::auth::AuthConfig;

/// `store_path` value that keeps the whole store in memory.
pub const IN_MEMORY: &str = ":memory:";

const DEFAULT_STORE_PATH: &str = "~/.local/share/stamm/stamm.db";

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration: `config.toml`, then `STAMM_*` variables,
/// then command-line overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
}

/// Values given on the command line; they win over every other layer.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub store: Option<PathBuf>,
  pub host:  Option<String>,
  pub port:  Option<u16>,
}

impl ServerConfig {
  /// Load from `file` (optional on disk) plus the environment.
  pub fn load(file: &Path, overrides: &Overrides) -> anyhow::Result<Self> {
    Self::load_from(
      config::File::from(file.to_path_buf()).required(false),
      overrides,
    )
    .with_context(|| format!("failed to load configuration from {file:?}"))
  }

  fn load_from<S>(file: S, overrides: &Overrides) -> anyhow::Result<Self>
  where
    S: config::Source + Send + Sync + 'static,
  {
    let store = overrides
      .store
      .as_ref()
      .map(|p| p.to_string_lossy().into_owned());
    let settings = config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", DEFAULT_STORE_PATH)?
      .add_source(file)
      .add_source(config::Environment::with_prefix("STAMM"))
      .set_override_option("store_path", store)?
      .set_override_option("host", overrides.host.clone())?
      .set_override_option("port", overrides.port.map(i64::from))?
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.auth_username.clone(),
      password_hash: self.auth_password_hash.clone(),
    }
  }

  pub fn bind_address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Store location ───────────────────────────────────────────────────────────

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
  Memory,
  File(PathBuf),
}

impl StoreLocation {
  /// Interpret a configured `store_path`, expanding a leading `~/`.
  pub fn resolve(raw: &Path) -> Self {
    if raw == Path::new(IN_MEMORY) {
      return Self::Memory;
    }
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (raw.strip_prefix("~"), home) {
      (Ok(rest), Some(home)) => Self::File(home.join(rest)),
      _ => Self::File(raw.to_path_buf()),
    }
  }

  /// Open the store, creating its directory first, with tables laid out for
  /// every entity type in `registry`.
  pub async fn open(&self, registry: &'static Registry) -> anyhow::Result<SqliteStore> {
    let path = match self {
      Self::Memory => {
        warn!("store is in memory; nothing survives a restart");
        Path::new(IN_MEMORY)
      }
      Self::File(path) => {
        if let Some(dir) = path.parent()
          && !dir.as_os_str().is_empty()
        {
          std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {dir:?}"))?;
        }
        path.as_path()
      }
    };
    let store = SqliteStore::open_with(path, registry)
      .await
      .with_context(|| format!("failed to open store at {path:?}"))?;
    info!(store = ?self, entity_types = registry.entity_types().count(), "opened store");
    Ok(store)
  }
}

// ─── Catalogue ────────────────────────────────────────────────────────────────

/// Log one line per entity type so operators can see the cascade graph the
/// server is running with.
pub fn log_catalogue(registry: &Registry) {
  for entity in registry.entity_types() {
    info!(
      entity   = entity.name,
      table    = entity.table,
      key      = ?entity.key,
      parents  = %parent_columns(entity),
      children = entity.children.len(),
      "entity type"
    );
  }
}

/// `project_id->project, server_id->server`, or `-` for a root type.
pub fn parent_columns(entity: &EntityType) -> String {
  if entity.parents.is_empty() {
    return "-".to_owned();
  }
  entity
    .parents
    .iter()
    .map(|p| format!("{}->{}", p.column, p.entity))
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use stamm_core::{catalog, record::NewRecord, store::MasterDataStore as _};

  const TOML: &str = r#"
    port               = 9000
    store_path         = "/srv/stamm/stamm.db"
    auth_username      = "clerk"
    auth_password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
  "#;

  fn toml() -> impl config::Source + Send + Sync + 'static {
    config::File::from_str(TOML, config::FileFormat::Toml)
  }

  #[test]
  fn file_values_fill_in_over_defaults() {
    let cfg = ServerConfig::load_from(toml(), &Overrides::default()).unwrap();
    assert_eq!(cfg.bind_address(), "127.0.0.1:9000");
    assert_eq!(cfg.store_path, PathBuf::from("/srv/stamm/stamm.db"));
    assert_eq!(cfg.auth().username, "clerk");
  }

  #[test]
  fn command_line_overrides_win() {
    let overrides = Overrides {
      store: Some(PathBuf::from(IN_MEMORY)),
      host:  Some("0.0.0.0".into()),
      port:  Some(7000),
    };
    let cfg = ServerConfig::load_from(toml(), &overrides).unwrap();
    assert_eq!(cfg.bind_address(), "0.0.0.0:7000");
    assert_eq!(StoreLocation::resolve(&cfg.store_path), StoreLocation::Memory);
  }

  #[test]
  fn credentials_are_required() {
    let file = config::File::from_str("port = 1", config::FileFormat::Toml);
    assert!(ServerConfig::load_from(file, &Overrides::default()).is_err());
  }

  #[test]
  fn plain_paths_resolve_unchanged() {
    assert_eq!(
      StoreLocation::resolve(Path::new("data/stamm.db")),
      StoreLocation::File(PathBuf::from("data/stamm.db"))
    );
  }

  #[test]
  fn deployment_lists_both_parents() {
    let deployment = catalog::registry().entity("deployment").unwrap();
    assert_eq!(
      parent_columns(deployment),
      "project_id->project, server_id->server"
    );
    let country = catalog::registry().entity("country").unwrap();
    assert_eq!(parent_columns(country), "-");
  }

  #[tokio::test]
  async fn in_memory_store_follows_the_catalogue() {
    let store = StoreLocation::Memory
      .open(catalog::registry())
      .await
      .unwrap();
    store
      .create_record("country", NewRecord::with_id("AT"))
      .await
      .unwrap();
    assert!(store.get_record("country", "AT").await.unwrap().is_some());
  }
}
