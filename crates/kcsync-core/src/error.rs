//! Error types for `kcsync-core`.

use thiserror::Error;

use crate::directory::DirectoryError;

#[derive(Debug, Error)]
pub enum Error {
  /// The service was configured with an unusable option.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// The event is missing a field the classifier or a handler requires.
  #[error("invalid event: {0}")]
  Validation(String),

  #[error("cannot find user with keycloakId {0:?}")]
  UserNotFound(String),

  /// The directory refused a write that would break external-id uniqueness.
  #[error("conflict: {0}")]
  Conflict(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("directory error: {0}")]
  Directory(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a directory failure, keeping conflicts distinguishable.
  pub fn directory<E: DirectoryError>(err: E) -> Self {
    if err.is_conflict() {
      Self::Conflict(Box::new(err))
    } else {
      Self::Directory(Box::new(err))
    }
  }

  pub(crate) fn missing(handler: &str, field: &str) -> Self {
    Self::Validation(format!("'{handler}': missing '{field}'"))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
