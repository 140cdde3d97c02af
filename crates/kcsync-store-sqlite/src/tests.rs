//! Integration tests for `SqliteDirectory` against an in-memory database.

use std::sync::Arc;

use kcsync_core::{
  Error as CoreError,
  directory::{DirectoryError as _, UserDirectory, UserQuery},
  event::RawEvent,
  memory::MemoryDirectory,
  service::{EventService, ServiceConfig},
  user::{NewUser, UserPatch},
};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{Error, SqliteDirectory};

async fn store() -> SqliteDirectory {
  SqliteDirectory::open_in_memory("users")
    .await
    .expect("in-memory store")
}

fn object(value: Value) -> Map<String, Value> {
  value.as_object().cloned().unwrap()
}

fn john(external_id: &str) -> NewUser {
  NewUser::from_payload(
    external_id,
    &object(json!({ "username": "john", "email": "j@x.io", "lastName": "Smith" })),
  )
}

// ─── Directory operations ────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_find() {
  let s = store().await;
  let user = s.create(john("abc-123")).await.unwrap();
  assert_eq!(user.external_id, "abc-123");

  let found = s.find_by_external_id("abc-123").await.unwrap().unwrap();
  assert_eq!(found, user);
  assert!(s.find_by_external_id("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_external_id_is_rejected() {
  let s = store().await;
  s.create(john("abc-123")).await.unwrap();

  let err = s.create(john("abc-123")).await.unwrap_err();
  assert!(matches!(err, Error::DuplicateExternalId(ref id) if id == "abc-123"));
  assert!(err.is_conflict());
  assert_eq!(s.list(&UserQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn patch_merges_profile_shallowly() {
  let s = store().await;
  let user = s.create(john("abc-123")).await.unwrap();

  let patched = s
    .patch(user.id, UserPatch::from_payload(&object(json!({ "lastName": "Doe" }))))
    .await
    .unwrap();
  assert_eq!(patched.profile["lastName"], "Doe");
  assert_eq!(patched.profile["email"], "j@x.io");
  assert_eq!(patched.name.as_deref(), Some("john"));
  assert!(patched.updated_at >= user.updated_at);

  let stored = s.get(user.id).await.unwrap().unwrap();
  assert_eq!(stored, patched);
}

#[tokio::test]
async fn patch_sets_and_clears_session() {
  let s = store().await;
  let user = s.create(john("abc-123")).await.unwrap();

  let with_session = s
    .patch(user.id, UserPatch::session(Some(object(json!({ "sessionId": "s-1" })))))
    .await
    .unwrap();
  assert_eq!(with_session.session.unwrap()["sessionId"], "s-1");

  // Profile-only patches keep the session.
  let still = s
    .patch(user.id, UserPatch::from_payload(&object(json!({ "firstName": "John" }))))
    .await
    .unwrap();
  assert!(still.session.is_some());

  let cleared = s.patch(user.id, UserPatch::session(None)).await.unwrap();
  assert!(cleared.session.is_none());
}

#[tokio::test]
async fn patch_and_remove_missing_ids_fail() {
  let s = store().await;
  let id = Uuid::new_v4();
  assert!(matches!(
    s.patch(id, UserPatch::default()).await,
    Err(Error::UserNotFound(_))
  ));
  assert!(matches!(s.remove(id).await, Err(Error::UserNotFound(_))));
}

#[tokio::test]
async fn remove_returns_deleted_record() {
  let s = store().await;
  let user = s.create(john("abc-123")).await.unwrap();

  let removed = s.remove(user.id).await.unwrap();
  assert_eq!(removed.id, user.id);
  assert!(s.get(user.id).await.unwrap().is_none());
  assert!(s.find_by_external_id("abc-123").await.unwrap().is_none());
}

#[tokio::test]
async fn list_in_creation_order_with_paging() {
  let s = store().await;
  for id in ["a", "b", "c", "d"] {
    s.create(john(id)).await.unwrap();
  }

  let all = s.list(&UserQuery::default()).await.unwrap();
  let ids: Vec<_> = all.iter().map(|u| u.external_id.as_str()).collect();
  assert_eq!(ids, ["a", "b", "c", "d"]);

  let page = s
    .list(&UserQuery { limit: Some(2), offset: Some(1), ..Default::default() })
    .await
    .unwrap();
  let ids: Vec<_> = page.iter().map(|u| u.external_id.as_str()).collect();
  assert_eq!(ids, ["b", "c"]);

  let one = s
    .list(&UserQuery { external_id: Some("d".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(one.len(), 1);
}

#[tokio::test]
async fn huge_paging_bounds_match_memory_directory() {
  let s = store().await;
  let memory = MemoryDirectory::new();
  for id in ["a", "b"] {
    s.create(john(id)).await.unwrap();
    memory.create(john(id)).await.unwrap();
  }

  let past_end = UserQuery { offset: Some(usize::MAX), ..Default::default() };
  assert!(s.list(&past_end).await.unwrap().is_empty());
  assert!(memory.list(&past_end).await.unwrap().is_empty());

  let unbounded = UserQuery { limit: Some(usize::MAX), ..Default::default() };
  assert_eq!(s.list(&unbounded).await.unwrap().len(), 2);
  assert_eq!(memory.list(&unbounded).await.unwrap().len(), 2);
}

#[tokio::test]
async fn table_name_must_be_an_identifier() {
  let err = SqliteDirectory::open_in_memory("users; DROP TABLE users")
    .await
    .err()
    .unwrap();
  assert!(matches!(err, Error::Core(CoreError::Configuration(_))));

  let s = SqliteDirectory::open_in_memory("kc_users").await.unwrap();
  assert_eq!(s.table(), "kc_users");
}

// ─── End to end through the service ─────────────────────────────────────────

fn raw(value: Value) -> RawEvent { RawEvent::try_from(value).unwrap() }

#[tokio::test]
async fn service_lifecycle_on_sqlite() {
  let dir = Arc::new(store().await);
  let svc = EventService::new(ServiceConfig::default(), dir.clone()).unwrap();

  svc
    .ingest(raw(json!({
      "eventClass": "AdminEvent", "operationType": "CREATE", "resourceType": "USER",
      "resourcePath": "users/abc-123",
      "value": { "username": "john", "email": "j@x.io" },
    })))
    .await
    .unwrap();

  let user = dir.find_by_external_id("abc-123").await.unwrap().unwrap();
  assert_eq!(user.name.as_deref(), Some("john"));
  assert_eq!(user.profile["email"], "j@x.io");

  svc
    .ingest(raw(json!({
      "eventClass": "Event", "type": "LOGIN", "userId": "abc-123",
      "username": "john", "error": null, "ipAddress": "10.0.0.1",
    })))
    .await
    .unwrap();
  let session = dir
    .find_by_external_id("abc-123")
    .await
    .unwrap()
    .unwrap()
    .session
    .unwrap();
  assert_eq!(session["ipAddress"], "10.0.0.1");
  assert!(!session.contains_key("username"));

  let err = svc
    .ingest(raw(json!({
      "eventClass": "AdminEvent", "operationType": "DELETE", "resourceType": "USER",
      "resourcePath": "users/someone-else",
    })))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::UserNotFound(_)));
  assert_eq!(dir.list(&UserQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_duplicate_creates_on_sqlite() {
  let dir = Arc::new(store().await);
  let svc = Arc::new(EventService::new(ServiceConfig::default(), dir.clone()).unwrap());

  let tasks: Vec<_> = (0..4)
    .map(|_| {
      let svc = svc.clone();
      tokio::spawn(async move {
        svc
          .ingest(raw(json!({
            "eventClass": "AdminEvent", "operationType": "CREATE", "resourceType": "USER",
            "resourcePath": "users/abc-123", "value": { "username": "john" },
          })))
          .await
      })
    })
    .collect();

  let mut ok = 0;
  for task in tasks {
    match task.await.unwrap() {
      Ok(_) => ok += 1,
      Err(e) => assert!(matches!(e, CoreError::Conflict(_)), "{e}"),
    }
  }
  assert_eq!(ok, 1);
  assert_eq!(dir.list(&UserQuery::default()).await.unwrap().len(), 1);
}
