//! `stamm`, the command-line client for the Stamm master-data server.
//!
//! # Usage
//!
//! ```
//! stamm --url http://localhost:8080 --user alice --password secret entities
//! stamm archive country AT
//! stamm --json audit --entity site --limit 20
//! ```

mod client;
mod render;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::{Deserialize, Serialize};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "stamm", about = "Command-line client for the Stamm master-data server")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the Stamm server (default: http://localhost:8080).
  #[arg(long, env = "STAMM_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "STAMM_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "STAMM_PASSWORD", hide_env_values = true)]
  password: Option<String>,

  /// Print raw JSON instead of a summary.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the archivable entity types and their references.
  Entities,
  /// List records of one entity type.
  List {
    entity:   String,
    /// Show archived records instead of active ones.
    #[arg(long)]
    archived: bool,
  },
  /// Show one record.
  Show { entity: String, id: String },
  /// Archive a record and everything that depends on it.
  Archive { entity: String, id: String },
  /// Restore a record, its archived ancestors and its archived dependents.
  Restore { entity: String, id: String },
  /// Show the audit trail, newest first.
  Audit {
    #[arg(long)]
    entity: Option<String>,
    #[arg(long)]
    limit:  Option<usize>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

const DEFAULT_URL: &str = "http://localhost:8080";

/// CLI flags (and their env vars) override the config file, which overrides
/// defaults.
fn merge_config(args: &Args, file_cfg: ConfigFile) -> ApiConfig {
  fn pick(flag: &Option<String>, file: String) -> Option<String> {
    flag.clone().or_else(|| (!file.is_empty()).then_some(file))
  }
  ApiConfig {
    base_url: pick(&args.url, file_cfg.url).unwrap_or_else(|| DEFAULT_URL.to_string()),
    username: pick(&args.user, file_cfg.username).unwrap_or_default(),
    password: pick(&args.password, file_cfg.password).unwrap_or_default(),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let client = ApiClient::new(merge_config(&args, file_cfg))?;
  let json = args.json;

  match args.command {
    Command::Entities => {
      let entities = client.entities().await?;
      if json {
        print_json(&entities)?;
      } else {
        print!("{}", render::entities(&entities));
      }
    }
    Command::List { entity, archived } => {
      let records = client.list_records(&entity, archived).await?;
      if json {
        print_json(&records)?;
      } else {
        print!("{}", render::records(&records));
      }
    }
    Command::Show { entity, id } => {
      let Some(record) = client.get_record(&entity, &id).await? else {
        bail!("{entity} {id} not found");
      };
      if json {
        print_json(&record)?;
      } else {
        print!("{}", render::record(&record));
      }
    }
    Command::Archive { entity, id } => {
      let outcome = client.archive(&entity, &id).await?;
      if json {
        print_json(&outcome)?;
      } else {
        print!("{}", render::outcome("archived", &outcome));
      }
    }
    Command::Restore { entity, id } => {
      let outcome = client.restore(&entity, &id).await?;
      if json {
        print_json(&outcome)?;
      } else {
        print!("{}", render::outcome("restored", &outcome));
      }
    }
    Command::Audit { entity, limit } => {
      let events = client.audit(entity.as_deref(), limit).await?;
      if json {
        print_json(&events)?;
      } else {
        print!("{}", render::audit(&events));
      }
    }
  }

  Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
