//! [`SqliteDirectory`]: the SQLite implementation of [`UserDirectory`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use kcsync_core::{
  directory::{UserDirectory, UserQuery},
  service::validate_identifier,
  user::{NewUser, UserPatch, UserRecord},
};

use crate::{
  Error, Result,
  encode::{RawUser, encode_dt, encode_object, encode_uuid, merge_objects},
  schema::{USER_COLUMNS, schema},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A user directory backed by one table of a SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteDirectory {
  conn:  tokio_rusqlite::Connection,
  table: Arc<str>,
}

impl SqliteDirectory {
  /// Open (or create) a directory at `path` stored in table `table`.
  pub async fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
    validate_identifier(table)?;
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, table: table.into() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory directory, mostly for tests.
  pub async fn open_in_memory(table: &str) -> Result<Self> {
    validate_identifier(table)?;
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, table: table.into() };
    store.init_schema().await?;
    Ok(store)
  }

  pub fn table(&self) -> &str { &self.table }

  async fn init_schema(&self) -> Result<()> {
    let ddl = schema(&self.table);
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    tracing::debug!(table = %self.table, "directory schema ready");
    Ok(())
  }

  fn select_sql(&self, filter: &str) -> String {
    format!("SELECT {USER_COLUMNS} FROM {} {filter}", self.table)
  }
}

/// Whether `err` is the `UNIQUE` constraint on `external_id` rejecting an
/// insert. Other constraint failures are plain database errors.
fn is_duplicate_external_id(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

fn saturating_i64(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

fn json_error(e: serde_json::Error) -> rusqlite::Error {
  rusqlite::Error::ToSqlConversionFailure(Box::new(e))
}

// ─── UserDirectory impl ──────────────────────────────────────────────────────

impl UserDirectory for SqliteDirectory {
  type Error = Error;

  async fn find_by_external_id(&self, external_id: &str) -> Result<Option<UserRecord>> {
    let sql = self.select_sql("WHERE external_id = ?1 ORDER BY rowid LIMIT 1");
    let external_id = external_id.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![external_id], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn create(&self, input: NewUser) -> Result<UserRecord> {
    let user = UserRecord::new(input, Utc::now());
    let raw = RawUser::from_user(&user)?;
    let sql = format!(
      "INSERT INTO {} ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      self.table
    );

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          &sql,
          rusqlite::params![
            raw.id,
            raw.external_id,
            raw.name,
            raw.profile_json,
            raw.session_json,
            raw.created_at,
            raw.updated_at,
          ],
        );
        match result {
          Ok(_) => Ok(true),
          Err(e) if is_duplicate_external_id(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateExternalId(user.external_id));
    }
    Ok(user)
  }

  async fn patch(&self, id: Uuid, patch: UserPatch) -> Result<UserRecord> {
    let id_str = encode_uuid(id);
    let now_str = encode_dt(Utc::now());
    let UserPatch { name, profile, session } = patch;
    // (touch session?, new session JSON)
    let (set_session, session_json) = match session {
      Some(s) => (true, s.as_ref().map(encode_object).transpose()?),
      None => (false, None),
    };

    let select = self.select_sql("WHERE id = ?1");
    let read_profile = format!("SELECT profile_json FROM {} WHERE id = ?1", self.table);
    let update = format!(
      "UPDATE {} SET
         name         = COALESCE(?2, name),
         profile_json = ?3,
         session_json = CASE WHEN ?4 THEN ?5 ELSE session_json END,
         updated_at   = ?6
       WHERE id = ?1",
      self.table
    );

    // Read, merge and write back inside one transaction.
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let stored: Option<String> = tx
          .query_row(&read_profile, rusqlite::params![id_str], |r| r.get(0))
          .optional()?;
        let Some(stored) = stored else {
          return Ok(None);
        };
        let merged = merge_objects(&stored, profile).map_err(json_error)?;

        tx.execute(
          &update,
          rusqlite::params![id_str, name, merged, set_session, session_json, now_str],
        )?;
        let raw = tx.query_row(&select, rusqlite::params![id_str], RawUser::from_row)?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.ok_or(Error::UserNotFound(id))?.into_user()
  }

  async fn remove(&self, id: Uuid) -> Result<UserRecord> {
    let id_str = encode_uuid(id);
    let select = self.select_sql("WHERE id = ?1");
    let delete = format!("DELETE FROM {} WHERE id = ?1", self.table);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(&select, rusqlite::params![id_str], RawUser::from_row)
          .optional()?;
        if raw.is_some() {
          tx.execute(&delete, rusqlite::params![id_str])?;
        }
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.ok_or(Error::UserNotFound(id))?.into_user()
  }

  async fn get(&self, id: Uuid) -> Result<Option<UserRecord>> {
    let id_str = encode_uuid(id);
    let sql = self.select_sql("WHERE id = ?1");

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawUser::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn list(&self, query: &UserQuery) -> Result<Vec<UserRecord>> {
    let sql = self.select_sql(
      "WHERE (?1 IS NULL OR external_id = ?1) ORDER BY rowid LIMIT ?2 OFFSET ?3",
    );
    let external_id = query.external_id.clone();
    // A negative LIMIT means no limit in SQLite. Out-of-range values
    // saturate rather than wrap.
    let limit_val = query.limit.map_or(-1, saturating_i64);
    let offset_val = saturating_i64(query.offset.unwrap_or(0));

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![external_id, limit_val, offset_val],
            RawUser::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }
}
