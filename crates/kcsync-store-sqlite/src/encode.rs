//! Encoding and decoding helpers between [`UserRecord`] and the plain-text
//! columns stored in SQLite.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase, profile and
//! session compact JSON objects.

use chrono::{DateTime, Utc};
use kcsync_core::user::{Session, UserRecord};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JSON objects ────────────────────────────────────────────────────────────

pub fn encode_object(map: &Map<String, Value>) -> Result<String> {
  Ok(serde_json::to_string(map)?)
}

pub fn decode_object(s: &str) -> Result<Map<String, Value>> {
  Ok(serde_json::from_str(s)?)
}

/// Shallow-merge `patch` into the JSON object stored in `stored`.
///
/// Runs inside the connection thread, so it reports plain serde errors.
pub fn merge_objects(
  stored: &str,
  patch: Map<String, Value>,
) -> serde_json::Result<String> {
  let mut merged: Map<String, Value> = serde_json::from_str(stored)?;
  merged.extend(patch);
  serde_json::to_string(&merged)
}

// ─── Row type ────────────────────────────────────────────────────────────────

/// Raw strings read directly from a user row.
#[derive(Debug)]
pub struct RawUser {
  pub id:           String,
  pub external_id:  String,
  pub name:         Option<String>,
  pub profile_json: String,
  pub session_json: Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawUser {
  /// Read a row selected with [`crate::schema::USER_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      external_id:  row.get(1)?,
      name:         row.get(2)?,
      profile_json: row.get(3)?,
      session_json: row.get(4)?,
      created_at:   row.get(5)?,
      updated_at:   row.get(6)?,
    })
  }

  pub fn from_user(user: &UserRecord) -> Result<Self> {
    Ok(Self {
      id:           encode_uuid(user.id),
      external_id:  user.external_id.clone(),
      name:         user.name.clone(),
      profile_json: encode_object(&user.profile)?,
      session_json: user.session.as_ref().map(encode_object).transpose()?,
      created_at:   encode_dt(user.created_at),
      updated_at:   encode_dt(user.updated_at),
    })
  }

  pub fn into_user(self) -> Result<UserRecord> {
    let session: Option<Session> = self
      .session_json
      .as_deref()
      .map(decode_object)
      .transpose()?;

    Ok(UserRecord {
      id: decode_uuid(&self.id)?,
      external_id: self.external_id,
      name: self.name,
      session,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      profile: decode_object(&self.profile_json)?,
    })
  }
}
