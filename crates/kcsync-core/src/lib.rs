//! Event normalization and user-directory synchronization for Keycloak
//! webhooks.
//!
//! Raw provider events are classified once by [`event::normalize`], then
//! offered to an ordered chain of [`handlers::SyncHandler`]s by the
//! [`dispatcher::Dispatcher`]. Each handler mutates a
//! [`directory::UserDirectory`] supplied at construction time.
//!
//! This crate is free of HTTP and database dependencies.

pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handlers;
pub mod locks;
pub mod memory;
pub mod service;
pub mod user;

pub use error::{Error, Result};
