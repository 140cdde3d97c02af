//! The ingestion entry point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  directory::UserDirectory,
  dispatcher::{Dispatch, Dispatcher},
  event::{RawEvent, normalize},
  handlers::SyncHandler,
};

/// Options recognised by [`EventService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
  /// Names the directory collaborator the handlers target. Backends use it
  /// as their collection name, so it must be a plain identifier.
  ///
  /// [`EventService`] only validates it. The directory is injected, so the
  /// name selects something only where a backend is opened with it, as the
  /// SQLite table name. The in-memory directory ignores it.
  #[serde(default = "default_users_service_path")]
  pub users_service_path: String,
}

fn default_users_service_path() -> String { "users".to_owned() }

impl Default for ServiceConfig {
  fn default() -> Self {
    Self { users_service_path: default_users_service_path() }
  }
}

impl ServiceConfig {
  pub fn validate(&self) -> Result<()> {
    validate_identifier(&self.users_service_path)
  }
}

/// Check that `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<()> {
  let mut chars = name.chars();
  let valid = chars
    .next()
    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid {
    Ok(())
  } else {
    Err(Error::Configuration(format!(
      "users_service_path {name:?} is not a plain identifier"
    )))
  }
}

/// The acknowledgement returned for every accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
  pub success: bool,
}

/// Normalizes incoming events and pushes them through the dispatch chain.
pub struct EventService<D> {
  dispatcher: Dispatcher<D>,
}

impl<D: UserDirectory> EventService<D> {
  /// Build a service with the standard handler chain.
  pub fn new(config: ServiceConfig, directory: Arc<D>) -> Result<Self> {
    config.validate()?;
    Ok(Self { dispatcher: Dispatcher::with_default_chain(directory) })
  }

  /// Build a service with a custom handler chain.
  pub fn with_handlers(
    config: ServiceConfig,
    directory: Arc<D>,
    handlers: impl IntoIterator<Item = SyncHandler>,
  ) -> Result<Self> {
    config.validate()?;
    Ok(Self { dispatcher: Dispatcher::new(directory, handlers) })
  }

  pub fn directory(&self) -> &Arc<D> { self.dispatcher.directory() }

  /// Classify and dispatch `event`, returning the full dispatch report.
  pub async fn process(&self, event: RawEvent) -> Result<Dispatch> {
    let event = normalize(event).inspect_err(|e| {
      tracing::warn!(error = %e, "rejected event");
    })?;
    self.dispatcher.dispatch(event).await
  }

  /// Classify and dispatch `event`, acknowledging success.
  pub async fn ingest(&self, event: RawEvent) -> Result<Ack> {
    self.process(event).await?;
    Ok(Ack { success: true })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::{Value, json};

  use super::*;
  use crate::{directory::UserQuery, memory::MemoryDirectory};

  fn raw(value: Value) -> RawEvent { RawEvent::try_from(value).unwrap() }

  fn service() -> EventService<MemoryDirectory> {
    EventService::new(ServiceConfig::default(), Arc::new(MemoryDirectory::new())).unwrap()
  }

  #[test]
  fn default_path_is_users() {
    assert_eq!(ServiceConfig::default().users_service_path, "users");
    let cfg: ServiceConfig = serde_json::from_value(json!({})).unwrap();
    assert_eq!(cfg.users_service_path, "users");
  }

  #[test]
  fn invalid_path_is_a_configuration_error() {
    for bad in ["", "users; DROP TABLE x", "9users", "kc-users"] {
      let cfg = ServiceConfig { users_service_path: bad.into() };
      assert!(matches!(cfg.validate(), Err(Error::Configuration(_))), "{bad:?}");
    }
    let cfg = ServiceConfig { users_service_path: "kc_users".into() };
    assert!(cfg.validate().is_ok());

    let err = EventService::new(
      ServiceConfig { users_service_path: "no way".into() },
      Arc::new(MemoryDirectory::new()),
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::Configuration(_)));
  }

  #[tokio::test]
  async fn full_lifecycle() {
    let svc = service();
    let dir = svc.directory().clone();

    let ack = svc
      .ingest(raw(json!({
        "eventClass": "AdminEvent",
        "operationType": "CREATE",
        "resourceType": "USER",
        "resourcePath": "users/abc-123",
        "value": { "username": "john", "email": "j@x.io", "firstName": "John", "lastName": "Smith" },
      })))
      .await
      .unwrap();
    assert_eq!(ack, Ack { success: true });

    let user = dir.find_by_external_id("abc-123").await.unwrap().unwrap();
    assert_eq!(user.name.as_deref(), Some("john"));
    assert_eq!(user.profile["email"], "j@x.io");

    svc
      .ingest(raw(json!({
        "eventClass": "Event", "type": "LOGIN", "userId": "abc-123",
        "username": "john", "sessionId": "s-1",
      })))
      .await
      .unwrap();
    let user = dir.find_by_external_id("abc-123").await.unwrap().unwrap();
    assert!(user.session.is_some());

    svc
      .ingest(raw(json!({ "eventClass": "Event", "type": "LOGOUT", "userId": "abc-123" })))
      .await
      .unwrap();
    let user = dir.find_by_external_id("abc-123").await.unwrap().unwrap();
    assert!(user.session.is_none());

    svc
      .ingest(raw(json!({
        "eventClass": "AdminEvent", "operationType": "UPDATE", "resourceType": "USER",
        "resourcePath": "users/abc-123", "value": { "lastName": "Doe" },
      })))
      .await
      .unwrap();
    let user = dir.find_by_external_id("abc-123").await.unwrap().unwrap();
    assert_eq!(user.profile["lastName"], "Doe");
    assert_eq!(user.profile["firstName"], "John");

    svc
      .ingest(raw(json!({
        "eventClass": "AdminEvent", "operationType": "DELETE", "resourceType": "USER",
        "resourcePath": "users/abc-123",
      })))
      .await
      .unwrap();
    assert!(dir.list(&UserQuery::default()).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn missing_event_class_is_rejected_before_dispatch() {
    let svc = service();
    let err = svc
      .ingest(raw(json!({
        "operationType": "CREATE", "resourceType": "USER",
        "resourcePath": "users/abc-123", "value": { "username": "john" },
      })))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(svc.directory().is_empty().await);
  }

  #[tokio::test]
  async fn process_reports_applied_handlers() {
    let svc = service();
    let dispatch = svc
      .process(raw(json!({
        "eventClass": "AdminEvent", "operationType": "CREATE", "resourceType": "USER",
        "resourcePath": "users/abc-123", "value": { "username": "john" },
      })))
      .await
      .unwrap();
    assert_eq!(dispatch.applied[0].0, SyncHandler::CreateUser);
  }
}
