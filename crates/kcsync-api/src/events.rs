//! Handler for `POST /events`, the webhook ingestion endpoint.
//!
//! The body is one Keycloak event object. On success the response is
//! `{"success": true}`; classification and handler failures map to 4xx/5xx
//! through [`ApiError`].

use std::sync::Arc;

use axum::{Json, extract::State};
use kcsync_core::{
  directory::UserDirectory,
  event::RawEvent,
  service::{Ack, EventService},
};

use crate::error::ApiError;

/// `POST /events`
pub async fn ingest<D>(
  State(service): State<Arc<EventService<D>>>,
  Json(event): Json<RawEvent>,
) -> Result<Json<Ack>, ApiError>
where
  D: UserDirectory + 'static,
{
  let ack = service.ingest(event).await?;
  Ok(Json(ack))
}
