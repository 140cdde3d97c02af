//! kcsync-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! configured user directory, and serves the Keycloak event webhook over HTTP.
//!
//! # Replaying captured events
//!
//! ```sh
//! cargo run -p kcsync-server -- --replay events.jsonl
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use kcsync_core::{
  directory::UserDirectory,
  memory::MemoryDirectory,
  service::EventService,
};
use kcsync_server::{ServerConfig, replay};
use kcsync_store_sqlite::SqliteDirectory;
use tokio::{io::BufReader, net::TcpListener};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Keycloak event listener and user directory sync")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Ingest the JSON-lines event file at this path and exit.
  #[arg(long, value_name = "FILE")]
  replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("KCSYNC"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  match &server_cfg.store_path {
    Some(path) => {
      // Expand `~` in store path.
      let store_path = expand_tilde(path);
      let directory =
        SqliteDirectory::open(&store_path, &server_cfg.users_service_path)
          .await
          .with_context(|| format!("failed to open store at {store_path:?}"))?;
      tracing::info!(path = ?store_path, table = directory.table(), "using SQLite directory");
      run(cli, server_cfg, directory).await
    }
    None => {
      tracing::warn!("no store_path configured, users are kept in memory only");
      run(cli, server_cfg, MemoryDirectory::new()).await
    }
  }
}

async fn run<D>(cli: Cli, server_cfg: ServerConfig, directory: D) -> anyhow::Result<()>
where
  D: UserDirectory + 'static,
{
  let service = EventService::new(server_cfg.service_config(), Arc::new(directory))
    .context("invalid service configuration")?;

  // Helper mode: replay a capture and exit.
  if let Some(path) = cli.replay {
    let file = tokio::fs::File::open(&path)
      .await
      .with_context(|| format!("failed to open {path:?}"))?;
    let summary = replay(&service, BufReader::new(file))
      .await
      .with_context(|| format!("failed to read {path:?}"))?;
    tracing::info!(
      applied = summary.applied,
      ignored = summary.ignored,
      failed = summary.failed,
      "replay finished"
    );
    return Ok(());
  }

  let app = kcsync_server::router(Arc::new(service));
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
