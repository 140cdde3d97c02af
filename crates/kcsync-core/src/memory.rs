//! An in-process [`UserDirectory`], used when no database is configured and
//! throughout the tests.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
  directory::{DirectoryError, UserDirectory, UserQuery},
  user::{NewUser, UserPatch, UserRecord},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("a user with keycloakId {0:?} already exists")]
  DuplicateExternalId(String),

  #[error("user not found: {0}")]
  NotFound(Uuid),
}

impl DirectoryError for MemoryError {
  fn is_conflict(&self) -> bool {
    matches!(self, Self::DuplicateExternalId(_))
  }
}

/// A directory held in memory, in insertion order.
///
/// Cloning is cheap; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
  users: Arc<RwLock<Vec<UserRecord>>>,
}

impl MemoryDirectory {
  pub fn new() -> Self { Self::default() }

  pub async fn len(&self) -> usize { self.users.read().await.len() }

  pub async fn is_empty(&self) -> bool { self.users.read().await.is_empty() }
}

impl UserDirectory for MemoryDirectory {
  type Error = MemoryError;

  async fn find_by_external_id(
    &self,
    external_id: &str,
  ) -> Result<Option<UserRecord>, MemoryError> {
    let users = self.users.read().await;
    Ok(users.iter().find(|u| u.external_id == external_id).cloned())
  }

  async fn create(&self, input: NewUser) -> Result<UserRecord, MemoryError> {
    // Check and insert under one write lock.
    let mut users = self.users.write().await;
    if users.iter().any(|u| u.external_id == input.external_id) {
      return Err(MemoryError::DuplicateExternalId(input.external_id));
    }
    let user = UserRecord::new(input, Utc::now());
    users.push(user.clone());
    Ok(user)
  }

  async fn patch(
    &self,
    id: Uuid,
    patch: UserPatch,
  ) -> Result<UserRecord, MemoryError> {
    let mut users = self.users.write().await;
    let user = users
      .iter_mut()
      .find(|u| u.id == id)
      .ok_or(MemoryError::NotFound(id))?;
    user.apply(patch, Utc::now());
    Ok(user.clone())
  }

  async fn remove(&self, id: Uuid) -> Result<UserRecord, MemoryError> {
    let mut users = self.users.write().await;
    let index = users
      .iter()
      .position(|u| u.id == id)
      .ok_or(MemoryError::NotFound(id))?;
    Ok(users.remove(index))
  }

  async fn get(&self, id: Uuid) -> Result<Option<UserRecord>, MemoryError> {
    let users = self.users.read().await;
    Ok(users.iter().find(|u| u.id == id).cloned())
  }

  async fn list(&self, query: &UserQuery) -> Result<Vec<UserRecord>, MemoryError> {
    let users = self.users.read().await;
    Ok(
      users
        .iter()
        .filter(|u| {
          query
            .external_id
            .as_deref()
            .is_none_or(|id| u.external_id == id)
        })
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use serde_json::Map;

  use super::*;

  fn new_user(external_id: &str) -> NewUser {
    NewUser {
      external_id: external_id.into(),
      name:        Some("john".into()),
      profile:     Map::new(),
    }
  }

  #[tokio::test]
  async fn create_then_find() {
    let dir = MemoryDirectory::new();
    let user = dir.create(new_user("abc-123")).await.unwrap();

    let found = dir.find_by_external_id("abc-123").await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert!(dir.find_by_external_id("other").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn duplicate_external_id_is_a_conflict() {
    let dir = MemoryDirectory::new();
    dir.create(new_user("abc-123")).await.unwrap();

    let err = dir.create(new_user("abc-123")).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(dir.len().await, 1);
  }

  #[tokio::test]
  async fn patch_and_remove_missing_ids_fail() {
    let dir = MemoryDirectory::new();
    let id = Uuid::new_v4();
    assert!(matches!(
      dir.patch(id, UserPatch::default()).await,
      Err(MemoryError::NotFound(_))
    ));
    assert!(matches!(dir.remove(id).await, Err(MemoryError::NotFound(_))));
  }

  #[tokio::test]
  async fn list_filters_and_pages() {
    let dir = MemoryDirectory::new();
    for id in ["a", "b", "c"] {
      dir.create(new_user(id)).await.unwrap();
    }

    let all = dir.list(&UserQuery::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let page = dir
      .list(&UserQuery { limit: Some(1), offset: Some(1), ..Default::default() })
      .await
      .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].external_id, "b");

    let only_c = dir
      .list(&UserQuery { external_id: Some("c".into()), ..Default::default() })
      .await
      .unwrap();
    assert_eq!(only_c.len(), 1);
  }
}
