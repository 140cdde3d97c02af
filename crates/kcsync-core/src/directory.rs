//! The `UserDirectory` trait and supporting query types.
//!
//! The trait is implemented by storage backends (the in-memory
//! [`crate::memory::MemoryDirectory`] and `kcsync-store-sqlite`). The
//! synchronization handlers depend on this abstraction only.

use std::future::Future;

use uuid::Uuid;

use crate::user::{NewUser, UserPatch, UserRecord};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`UserDirectory::list`].
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
  pub external_id: Option<String>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Error bound for directory backends.
pub trait DirectoryError: std::error::Error + Send + Sync + 'static {
  /// `true` when the failure is a refused duplicate external id.
  fn is_conflict(&self) -> bool { false }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the local user directory.
///
/// Implementations must enforce external-id uniqueness atomically in
/// [`create`](UserDirectory::create): inserting a second record for a taken
/// external id fails with an error whose
/// [`is_conflict`](DirectoryError::is_conflict) is `true`.
///
/// All methods return `Send` futures so directories can be shared across a
/// multi-threaded runtime.
pub trait UserDirectory: Send + Sync {
  type Error: DirectoryError;

  /// The first record whose external id equals `external_id`.
  fn find_by_external_id<'a>(
    &'a self,
    external_id: &'a str,
  ) -> impl Future<Output = Result<Option<UserRecord>, Self::Error>> + Send + 'a;

  /// Insert a new record. The directory assigns `id` and timestamps.
  fn create(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<UserRecord, Self::Error>> + Send + '_;

  /// Merge `patch` into record `id` and return the updated record.
  fn patch(
    &self,
    id: Uuid,
    patch: UserPatch,
  ) -> impl Future<Output = Result<UserRecord, Self::Error>> + Send + '_;

  /// Delete record `id` and return it.
  fn remove(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<UserRecord, Self::Error>> + Send + '_;

  /// Retrieve a record by id. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<UserRecord>, Self::Error>> + Send + '_;

  /// List records in creation order.
  fn list<'a>(
    &'a self,
    query: &'a UserQuery,
  ) -> impl Future<Output = Result<Vec<UserRecord>, Self::Error>> + Send + 'a;
}
