//! SQL schema for the kcsync SQLite directory.
//!
//! Executed once at connection startup. The table name is the configured
//! `users_service_path`, validated as a plain identifier before it gets here.

/// Full schema DDL for the user table `table`; idempotent thanks to
/// `CREATE TABLE IF NOT EXISTS`.
pub fn schema(table: &str) -> String {
  format!(
    "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS {table} (
    id            TEXT PRIMARY KEY,
    external_id   TEXT NOT NULL UNIQUE,   -- the Keycloak subject id
    name          TEXT,
    profile_json  TEXT NOT NULL DEFAULT '{{}}',
    session_json  TEXT,                   -- NULL while logged out
    created_at    TEXT NOT NULL,          -- ISO 8601 UTC
    updated_at    TEXT NOT NULL
);

PRAGMA user_version = 1;
"
  )
}

/// Columns selected for every full-row read, in [`crate::encode::RawUser`]
/// order.
pub const USER_COLUMNS: &str =
  "id, external_id, name, profile_json, session_json, created_at, updated_at";
