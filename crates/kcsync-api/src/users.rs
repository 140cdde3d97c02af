//! Read-only handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users` | Optional `?keycloak_id`, `limit`, `offset` |
//! | `GET`  | `/users/:id` | 404 if not found |
//!
//! Writes only ever happen through `POST /events`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use kcsync_core::{
  directory::{UserDirectory, UserQuery},
  service::EventService,
  user::UserRecord,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  /// Restrict to the user with this Keycloak subject id.
  pub keycloak_id: Option<String>,
  pub limit:       Option<usize>,
  pub offset:      Option<usize>,
}

/// `GET /users[?keycloak_id=...][&limit=...][&offset=...]`
pub async fn list<D>(
  State(service): State<Arc<EventService<D>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<UserRecord>>, ApiError>
where
  D: UserDirectory + 'static,
{
  let query = UserQuery {
    external_id: params.keycloak_id,
    limit:       params.limit,
    offset:      params.offset,
  };
  let users = service
    .directory()
    .list(&query)
    .await
    .map_err(|e| ApiError::Internal(Box::new(e)))?;
  Ok(Json(users))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/:id`
pub async fn get_one<D>(
  State(service): State<Arc<EventService<D>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<UserRecord>, ApiError>
where
  D: UserDirectory + 'static,
{
  let user = service
    .directory()
    .get(id)
    .await
    .map_err(|e| ApiError::Internal(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("user {id} not found")))?;
  Ok(Json(user))
}
