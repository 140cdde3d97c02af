//! HTTP server assembly for kcsync.
//!
//! Wires configuration, the chosen directory backend and the API router
//! together. The binary in `main.rs` is a thin shell over this crate.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use kcsync_core::{
  directory::UserDirectory,
  event::RawEvent,
  handlers::Outcome,
  service::{EventService, ServiceConfig},
};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `KCSYNC_*` environment.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  /// SQLite file for the directory; in-memory when absent.
  pub store_path:         Option<PathBuf>,
  #[serde(default = "default_users_service_path")]
  pub users_service_path: String,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 3333 }

fn default_users_service_path() -> String {
  ServiceConfig::default().users_service_path
}

impl ServerConfig {
  pub fn service_config(&self) -> ServiceConfig {
    ServiceConfig { users_service_path: self.users_service_path.clone() }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's router: the API plus request tracing.
pub fn router<D>(service: Arc<EventService<D>>) -> Router
where
  D: UserDirectory + 'static,
{
  kcsync_api::api_router(service).layer(TraceLayer::new_for_http())
}

// ─── Replay ───────────────────────────────────────────────────────────────────

/// Counters reported by [`replay`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
  /// Events that changed the directory.
  pub applied: usize,
  /// Events accepted without any handler acting.
  pub ignored: usize,
  /// Events rejected or failed by a handler.
  pub failed:  usize,
}

/// Ingest a JSON-lines stream of events, one event per line, in order.
///
/// Blank lines are skipped. A failing event is logged and counted; it does
/// not stop the replay.
pub async fn replay<D, R>(
  service: &EventService<D>,
  input: R,
) -> std::io::Result<ReplaySummary>
where
  D: UserDirectory,
  R: AsyncBufRead + Unpin,
{
  let mut summary = ReplaySummary::default();
  let mut lines = input.lines();
  let mut line_no = 0usize;

  while let Some(line) = lines.next_line().await? {
    line_no += 1;
    if line.trim().is_empty() {
      continue;
    }

    let event: RawEvent = match serde_json::from_str(&line) {
      Ok(event) => event,
      Err(e) => {
        tracing::warn!(line = line_no, error = %e, "skipping unparseable event");
        summary.failed += 1;
        continue;
      }
    };

    match service.process(event).await {
      Ok(dispatch) if dispatch.is_noop() => summary.ignored += 1,
      Ok(dispatch) => {
        for (handler, outcome) in &dispatch.applied {
          let user = match outcome {
            Outcome::Created(u) | Outcome::Updated(u) | Outcome::Removed(u) => u,
            Outcome::Skipped => continue,
          };
          tracing::info!(
            line = line_no,
            handler = handler.name(),
            keycloak_id = %user.external_id,
            "replayed"
          );
        }
        summary.applied += 1;
      }
      Err(e) => {
        tracing::warn!(line = line_no, error = %e, "event failed");
        summary.failed += 1;
      }
    }
  }

  Ok(summary)
}
