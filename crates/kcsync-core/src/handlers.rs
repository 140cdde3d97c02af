//! Synchronization handlers.
//!
//! Every handler has the same shape: guard on its trigger, extract the
//! external id, resolve the target record, mutate it through the
//! [`UserDirectory`], return what changed.
//!
//! | Handler | Trigger | Mutation |
//! |---------|---------|----------|
//! | [`CreateUser`](SyncHandler::CreateUser) | `AdminEvent.CREATE.USER` | create from `value` |
//! | [`UpdateUser`](SyncHandler::UpdateUser) | `AdminEvent.UPDATE.USER` | patch with `value` |
//! | [`DeleteUser`](SyncHandler::DeleteUser) | `AdminEvent.DELETE.USER` | remove |
//! | [`SetSession`](SyncHandler::SetSession) | `Event.LOGIN` | `session` = login event |
//! | [`UnsetSession`](SyncHandler::UnsetSession) | `Event.LOGOUT` | `session` = null |

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  directory::UserDirectory,
  event::{EventKind, NormalizedEvent, external_id_from_path},
  user::{NewUser, UserPatch, UserRecord},
};

/// One link of the dispatch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncHandler {
  CreateUser,
  UpdateUser,
  DeleteUser,
  SetSession,
  UnsetSession,
}

/// The standard chain, in dispatch order.
pub const DEFAULT_CHAIN: [SyncHandler; 5] = [
  SyncHandler::CreateUser,
  SyncHandler::UpdateUser,
  SyncHandler::DeleteUser,
  SyncHandler::SetSession,
  SyncHandler::UnsetSession,
];

/// What a handler did with an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "user", rename_all = "snake_case")]
pub enum Outcome {
  /// The event's classification did not match the handler's trigger.
  Skipped,
  Created(UserRecord),
  Updated(UserRecord),
  Removed(UserRecord),
}

impl Outcome {
  pub fn is_skipped(&self) -> bool { matches!(self, Self::Skipped) }
}

impl SyncHandler {
  pub fn name(self) -> &'static str {
    match self {
      Self::CreateUser => "createUser",
      Self::UpdateUser => "updateUser",
      Self::DeleteUser => "deleteUser",
      Self::SetSession => "setSession",
      Self::UnsetSession => "unsetSession",
    }
  }

  /// The classification this handler acts on.
  pub fn trigger(self) -> EventKind {
    match self {
      Self::CreateUser => EventKind::CreateUser,
      Self::UpdateUser => EventKind::UpdateUser,
      Self::DeleteUser => EventKind::DeleteUser,
      Self::SetSession => EventKind::Login,
      Self::UnsetSession => EventKind::Logout,
    }
  }

  pub fn applies_to(self, event: &NormalizedEvent) -> bool {
    *event.kind() == self.trigger()
  }

  /// Apply this handler to `event`. A mismatched trigger is a no-op.
  pub async fn apply<D: UserDirectory>(
    self,
    directory: &D,
    event: &NormalizedEvent,
  ) -> Result<Outcome> {
    if !self.applies_to(event) {
      return Ok(Outcome::Skipped);
    }
    match self {
      Self::CreateUser => create_user(directory, event).await,
      Self::UpdateUser => update_user(directory, event).await,
      Self::DeleteUser => delete_user(directory, event).await,
      Self::SetSession => set_session(directory, event).await,
      Self::UnsetSession => unset_session(directory, event).await,
    }
  }
}

// ─── Admin events ────────────────────────────────────────────────────────────

async fn create_user<D: UserDirectory>(
  directory: &D,
  event: &NormalizedEvent,
) -> Result<Outcome> {
  let handler = SyncHandler::CreateUser.name();
  let keycloak_id = admin_target(handler, event)?;
  let value = admin_value(handler, event)?;

  let input = NewUser::from_payload(keycloak_id, value);
  tracing::debug!(handler, keycloak_id, name = ?input.name, "creating user");
  let user = directory.create(input).await.map_err(Error::directory)?;

  tracing::info!(handler, keycloak_id, user_id = %user.id, "user created");
  Ok(Outcome::Created(user))
}

async fn update_user<D: UserDirectory>(
  directory: &D,
  event: &NormalizedEvent,
) -> Result<Outcome> {
  let handler = SyncHandler::UpdateUser.name();
  let keycloak_id = admin_target(handler, event)?;
  let value = admin_value(handler, event)?;

  tracing::debug!(handler, keycloak_id, "updating user");
  let user = resolve(directory, keycloak_id).await?;
  let user = directory
    .patch(user.id, UserPatch::from_payload(value))
    .await
    .map_err(Error::directory)?;

  tracing::info!(handler, keycloak_id, user_id = %user.id, "user updated");
  Ok(Outcome::Updated(user))
}

async fn delete_user<D: UserDirectory>(
  directory: &D,
  event: &NormalizedEvent,
) -> Result<Outcome> {
  let handler = SyncHandler::DeleteUser.name();
  let keycloak_id = admin_target(handler, event)?;

  tracing::debug!(handler, keycloak_id, "deleting user");
  let user = resolve(directory, keycloak_id).await?;
  let user = directory.remove(user.id).await.map_err(Error::directory)?;

  tracing::info!(handler, keycloak_id, user_id = %user.id, "user removed");
  Ok(Outcome::Removed(user))
}

// ─── User events ─────────────────────────────────────────────────────────────

async fn set_session<D: UserDirectory>(
  directory: &D,
  event: &NormalizedEvent,
) -> Result<Outcome> {
  let handler = SyncHandler::SetSession.name();
  let keycloak_id = event
    .user_id()
    .ok_or_else(|| Error::missing(handler, "userId"))?;

  tracing::debug!(handler, keycloak_id, "storing session");
  let user = resolve(directory, keycloak_id).await?;
  let user = directory
    .patch(user.id, UserPatch::session(Some(event.session_snapshot())))
    .await
    .map_err(Error::directory)?;

  tracing::info!(handler, keycloak_id, user_id = %user.id, "session set");
  Ok(Outcome::Updated(user))
}

async fn unset_session<D: UserDirectory>(
  directory: &D,
  event: &NormalizedEvent,
) -> Result<Outcome> {
  let handler = SyncHandler::UnsetSession.name();
  let keycloak_id = event
    .user_id()
    .ok_or_else(|| Error::missing(handler, "userId"))?;

  tracing::debug!(handler, keycloak_id, "clearing session");
  let user = resolve(directory, keycloak_id).await?;
  let user = directory
    .patch(user.id, UserPatch::session(None))
    .await
    .map_err(Error::directory)?;

  tracing::info!(handler, keycloak_id, user_id = %user.id, "session cleared");
  Ok(Outcome::Updated(user))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// The external id named by an admin event's `resourcePath`.
fn admin_target<'e>(handler: &str, event: &'e NormalizedEvent) -> Result<&'e str> {
  let path = event
    .resource_path()
    .ok_or_else(|| Error::missing(handler, "resourcePath"))?;
  external_id_from_path(path)
}

fn admin_value<'e>(
  handler: &str,
  event: &'e NormalizedEvent,
) -> Result<&'e Map<String, Value>> {
  event
    .value()
    .ok_or_else(|| Error::missing(handler, "value"))?
    .as_object()
    .ok_or_else(|| Error::Validation(format!("'{handler}': 'value' must be an object")))
}

async fn resolve<D: UserDirectory>(
  directory: &D,
  keycloak_id: &str,
) -> Result<UserRecord> {
  directory
    .find_by_external_id(keycloak_id)
    .await
    .map_err(Error::directory)?
    .ok_or_else(|| Error::UserNotFound(keycloak_id.to_owned()))
}
