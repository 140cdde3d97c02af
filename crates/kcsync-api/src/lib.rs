//! JSON HTTP API for kcsync.
//!
//! Exposes an axum [`Router`] backed by an [`EventService`] over any
//! [`UserDirectory`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(kcsync_api::api_router(service.clone()))
//! ```

pub mod error;
pub mod events;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use kcsync_core::{directory::UserDirectory, service::EventService};

pub use error::ApiError;

/// Build the API router for `service`.
///
/// The returned `Router<()>` can be merged or nested into any parent router
/// regardless of its own state type.
pub fn api_router<D>(service: Arc<EventService<D>>) -> Router<()>
where
  D: UserDirectory + 'static,
{
  Router::new()
    .route("/events", post(events::ingest::<D>))
    .route("/users", get(users::list::<D>))
    .route("/users/{id}", get(users::get_one::<D>))
    .with_state(service)
}
