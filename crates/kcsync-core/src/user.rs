//! Local user records kept in sync with the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Record-owned keys that a provider payload can never overwrite.
///
/// `name` is handled separately: a string `name` in a payload updates
/// [`UserRecord::name`].
pub const RESERVED_KEYS: [&str; 6] =
  ["id", "keycloakId", "name", "session", "createdAt", "updatedAt"];

/// A stored session: the login event minus its envelope fields.
pub type Session = Map<String, Value>;

// ─── UserRecord ──────────────────────────────────────────────────────────────

/// A local user, keyed by the provider's external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
  /// Directory-assigned identifier.
  pub id:          Uuid,
  /// The provider's subject id; unique within a directory.
  #[serde(rename = "keycloakId")]
  pub external_id: String,
  pub name:        Option<String>,
  /// `None` while logged out.
  pub session:     Option<Session>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
  /// Every other field merged from provider payloads.
  #[serde(flatten)]
  pub profile:     Map<String, Value>,
}

impl UserRecord {
  /// Build a fresh record for `input`, stamped with `now`.
  pub fn new(input: NewUser, now: DateTime<Utc>) -> Self {
    Self {
      id:          Uuid::new_v4(),
      external_id: input.external_id,
      name:        input.name,
      session:     None,
      created_at:  now,
      updated_at:  now,
      profile:     input.profile,
    }
  }

  /// Shallow-merge `patch` into this record.
  pub fn apply(&mut self, patch: UserPatch, now: DateTime<Utc>) {
    if let Some(name) = patch.name {
      self.name = Some(name);
    }
    self.profile.extend(patch.profile);
    if let Some(session) = patch.session {
      self.session = session;
    }
    self.updated_at = now;
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::directory::UserDirectory::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
  pub external_id: String,
  pub name:        Option<String>,
  pub profile:     Map<String, Value>,
}

impl NewUser {
  /// Build a user from an admin event's `value`: `name` comes from
  /// `value.username` unless the payload names the user explicitly.
  pub fn from_payload(external_id: &str, value: &Map<String, Value>) -> Self {
    let (explicit_name, profile) = split_payload(value);
    let name = explicit_name.or_else(|| {
      value
        .get("username")
        .and_then(Value::as_str)
        .map(str::to_owned)
    });
    Self { external_id: external_id.to_owned(), name, profile }
  }
}

/// A partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
  pub name:    Option<String>,
  pub profile: Map<String, Value>,
  /// `Some(None)` clears the session; `None` leaves it alone.
  pub session: Option<Option<Session>>,
}

impl UserPatch {
  pub fn from_payload(value: &Map<String, Value>) -> Self {
    let (name, profile) = split_payload(value);
    Self { name, profile, session: None }
  }

  pub fn session(session: Option<Session>) -> Self {
    Self { session: Some(session), ..Self::default() }
  }
}

/// Separate an explicit string `name` from the mergeable profile fields.
fn split_payload(
  value: &Map<String, Value>,
) -> (Option<String>, Map<String, Value>) {
  let name = value.get("name").and_then(Value::as_str).map(str::to_owned);
  let profile = value
    .iter()
    .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
    .map(|(k, v)| (k.clone(), v.clone()))
    .collect();
  (name, profile)
}
