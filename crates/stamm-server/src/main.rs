//! stamm-server binary.
//!
//! `stamm-server serve` opens the store described by `config.toml` and the
//! `STAMM_*` environment, logs the entity catalogue it will cascade over and
//! serves the JSON API. `stamm-server hash-password` prints the argon2 PHC
//! string to paste into `auth_password_hash`.

use std::{io::BufRead as _, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use stamm_core::catalog;
use stamm_server::{
  AppState, ServerConfig,
  auth::hash_password,
  startup::{Overrides, StoreLocation, log_catalogue},
};
use tokio::net::TcpListener;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Stamm master-data server")]
struct Cli {
  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the API (the default).
  Serve(ServeArgs),
  /// Read a password from stdin and print its argon2 hash.
  HashPassword,
}

#[derive(clap::Args, Default)]
struct ServeArgs {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
  /// SQLite file to use instead of `store_path`; `:memory:` for a scratch store.
  #[arg(long)]
  store:  Option<PathBuf>,
  #[arg(long)]
  host:   Option<String>,
  #[arg(long)]
  port:   Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  match Cli::parse().command {
    Some(Command::HashPassword) => print_hash(),
    Some(Command::Serve(args)) => serve(args).await,
    None => {
      serve(ServeArgs { config: "config.toml".into(), ..Default::default() }).await
    }
  }
}

fn print_hash() -> anyhow::Result<()> {
  eprint!("Password: ");
  let mut line = String::new();
  std::io::stdin().lock().read_line(&mut line)?;
  let hash = hash_password(line.trim_end_matches(['\n', '\r']))
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
  println!("{hash}");
  Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
  let overrides = Overrides { store: args.store, host: args.host, port: args.port };
  let config = ServerConfig::load(&args.config, &overrides)?;

  let registry = catalog::registry();
  log_catalogue(registry);

  let store = StoreLocation::resolve(&config.store_path)
    .open(registry)
    .await?;

  let app = stamm_server::router(AppState {
    store: Arc::new(store),
    auth:  Arc::new(config.auth()),
  });

  let address = config.bind_address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  info!(user = %config.auth_username, "listening on http://{address}");

  axum::serve(listener, app).await.context("server error")
}
