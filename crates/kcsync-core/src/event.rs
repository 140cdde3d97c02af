//! Keycloak events and their classification.
//!
//! Keycloak posts two families of events: admin events (an administrator
//! created, updated or deleted a resource) and user events (an end user logged
//! in or out). Both arrive as loosely structured JSON objects. Classification
//! derives a dotted `eventType` string from the payload once, upstream of every
//! handler, and tags the event with a typed [`EventKind`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// `eventClass` value carried by every admin event.
pub const ADMIN_EVENT_CLASS: &str = "AdminEvent";

// ─── Raw payload ─────────────────────────────────────────────────────────────

/// An untyped event payload exactly as posted by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(Map<String, Value>);

impl RawEvent {
  pub fn get(&self, key: &str) -> Option<&Value> { self.0.get(key) }

  pub fn into_fields(self) -> Map<String, Value> { self.0 }
}

impl From<Map<String, Value>> for RawEvent {
  fn from(fields: Map<String, Value>) -> Self { Self(fields) }
}

impl TryFrom<Value> for RawEvent {
  type Error = Error;

  fn try_from(value: Value) -> Result<Self> {
    match value {
      Value::Object(fields) => Ok(Self(fields)),
      other => Err(Error::Validation(format!(
        "event must be a JSON object, got {other}"
      ))),
    }
  }
}

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The typed tag assigned to an event by classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
  /// `AdminEvent.CREATE.USER`
  CreateUser,
  /// `AdminEvent.UPDATE.USER`
  UpdateUser,
  /// `AdminEvent.DELETE.USER`
  DeleteUser,
  /// `Event.LOGIN`
  Login,
  /// `Event.LOGOUT`
  Logout,
  /// Any classification no handler knows about.
  Other(String),
}

impl EventKind {
  pub fn from_classification(classification: &str) -> Self {
    match classification {
      "AdminEvent.CREATE.USER" => Self::CreateUser,
      "AdminEvent.UPDATE.USER" => Self::UpdateUser,
      "AdminEvent.DELETE.USER" => Self::DeleteUser,
      "Event.LOGIN" => Self::Login,
      "Event.LOGOUT" => Self::Logout,
      other => Self::Other(other.to_owned()),
    }
  }

  /// The canonical dotted classification string for this kind.
  pub fn classification(&self) -> &str {
    match self {
      Self::CreateUser => "AdminEvent.CREATE.USER",
      Self::UpdateUser => "AdminEvent.UPDATE.USER",
      Self::DeleteUser => "AdminEvent.DELETE.USER",
      Self::Login => "Event.LOGIN",
      Self::Logout => "Event.LOGOUT",
      Self::Other(s) => s,
    }
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.classification())
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Derive the `eventType` classification of `event`.
///
/// - admin events: `AdminEvent.<operationType>.<resourceType>`
/// - user events: `<eventClass>.<type>`
///
/// Fails only when `eventClass` is missing. Absent parts are rendered as
/// `undefined` and simply match no handler downstream.
pub fn classify(event: &RawEvent) -> Result<String> {
  let event_class = event
    .get("eventClass")
    .filter(|v| is_truthy(v))
    .ok_or_else(|| Error::Validation("missing 'eventClass'".into()))?;
  let event_class = render(Some(event_class));

  if event_class == ADMIN_EVENT_CLASS {
    Ok(format!(
      "{event_class}.{}.{}",
      render(event.get("operationType")),
      render(event.get("resourceType")),
    ))
  } else {
    Ok(format!("{event_class}.{}", render(event.get("type"))))
  }
}

/// Classify `event` and return it enriched with its `eventType`.
pub fn normalize(event: RawEvent) -> Result<NormalizedEvent> {
  let event_type = classify(&event)?;
  let mut payload = event.into_fields();
  // The derived classification always wins over a client-supplied one.
  payload.remove("eventType");
  tracing::debug!(%event_type, "classified event");
  Ok(NormalizedEvent {
    kind: EventKind::from_classification(&event_type),
    event_type,
    payload,
  })
}

/// Render a JSON value the way string concatenation would.
fn render(value: Option<&Value>) -> String {
  match value {
    None => "undefined".to_owned(),
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
  }
}

fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::String(s) => !s.is_empty(),
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::Array(_) | Value::Object(_) => true,
  }
}

// ─── Normalized event ────────────────────────────────────────────────────────

/// A classified event. Only [`normalize`] can build one, so every handler is
/// guaranteed to see a committed `eventType`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
  #[serde(rename = "eventType")]
  event_type: String,
  #[serde(skip)]
  kind:       EventKind,
  #[serde(flatten)]
  payload:    Map<String, Value>,
}

impl NormalizedEvent {
  pub fn event_type(&self) -> &str { &self.event_type }

  pub fn kind(&self) -> &EventKind { &self.kind }

  /// The original payload, without `eventType`.
  pub fn payload(&self) -> &Map<String, Value> { &self.payload }

  /// A non-empty string field, or `None`.
  pub fn str_field(&self, key: &str) -> Option<&str> {
    self
      .payload
      .get(key)
      .and_then(Value::as_str)
      .filter(|s| !s.is_empty())
  }

  pub fn resource_path(&self) -> Option<&str> { self.str_field("resourcePath") }

  pub fn user_id(&self) -> Option<&str> { self.str_field("userId") }

  /// The admin event `value`, if present and truthy.
  pub fn value(&self) -> Option<&Value> {
    self.payload.get("value").filter(|v| is_truthy(v))
  }

  /// The external id this event concerns, when it can be determined.
  ///
  /// Admin events name it in `resourcePath`; user events in `userId`.
  pub fn subject_key(&self) -> Option<&str> {
    if self.str_field("eventClass") == Some(ADMIN_EVENT_CLASS) {
      self
        .resource_path()
        .and_then(|p| external_id_from_path(p).ok())
    } else {
      self.user_id()
    }
  }

  /// The event as stored on a user's `session`: the full event, including
  /// `eventType`, minus the provider envelope fields.
  pub fn session_snapshot(&self) -> Map<String, Value> {
    const ENVELOPE: [&str; 4] = ["type", "username", "error", "userId"];

    let mut session: Map<String, Value> = self
      .payload
      .iter()
      .filter(|(k, _)| !ENVELOPE.contains(&k.as_str()))
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect();
    session.insert("eventType".into(), Value::String(self.event_type.clone()));
    session
  }
}

/// Extract the external id from a `resourcePath` of the form
/// `<segment>/<id>`.
pub fn external_id_from_path(path: &str) -> Result<&str> {
  match path.split_once('/') {
    Some((segment, id))
      if !segment.is_empty() && !id.is_empty() && !id.contains('/') =>
    {
      Ok(id)
    }
    _ => Err(Error::Validation(format!(
      "malformed 'resourcePath' {path:?}, expected '<resource>/<id>'"
    ))),
  }
}
