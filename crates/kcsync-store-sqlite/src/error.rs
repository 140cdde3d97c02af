//! Error type for `kcsync-store-sqlite`.

use kcsync_core::directory::DirectoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] kcsync_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Rejected by the `UNIQUE` constraint on `external_id`.
  #[error("a user with keycloakId {0:?} already exists")]
  DuplicateExternalId(String),

  #[error("user not found: {0}")]
  UserNotFound(uuid::Uuid),
}

impl DirectoryError for Error {
  fn is_conflict(&self) -> bool {
    matches!(self, Self::DuplicateExternalId(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
