//! The dispatch chain.
//!
//! A [`Dispatcher`] owns an immutable, ordered list of [`SyncHandler`]s and the
//! directory they write to. Each normalized event is offered to every handler
//! in order; the first failure aborts the rest of the chain. Handlers that
//! already succeeded are not rolled back.
//!
//! Dispatches for the same external id are serialized through [`KeyLocks`], so
//! an update racing a delete for one user is applied in arrival order at the
//! lock rather than interleaved.

use std::sync::Arc;

use crate::{
  Result,
  directory::UserDirectory,
  event::NormalizedEvent,
  handlers::{DEFAULT_CHAIN, Outcome, SyncHandler},
  locks::KeyLocks,
};

/// The result of pushing one event through the chain.
#[derive(Debug, Clone)]
pub struct Dispatch {
  pub event:   NormalizedEvent,
  /// Outcomes of the handlers that acted, in chain order.
  pub applied: Vec<(SyncHandler, Outcome)>,
}

impl Dispatch {
  /// `true` if no handler matched the event.
  pub fn is_noop(&self) -> bool { self.applied.is_empty() }
}

pub struct Dispatcher<D> {
  directory: Arc<D>,
  handlers:  Vec<SyncHandler>,
  locks:     KeyLocks,
}

impl<D: UserDirectory> Dispatcher<D> {
  /// Build a dispatcher running `handlers` in the given order.
  pub fn new(directory: Arc<D>, handlers: impl IntoIterator<Item = SyncHandler>) -> Self {
    Self {
      directory,
      handlers: handlers.into_iter().collect(),
      locks: KeyLocks::new(),
    }
  }

  /// A dispatcher running the full standard chain.
  pub fn with_default_chain(directory: Arc<D>) -> Self {
    Self::new(directory, DEFAULT_CHAIN)
  }

  pub fn directory(&self) -> &Arc<D> { &self.directory }

  /// Offer `event` to each handler in registration order.
  pub async fn dispatch(&self, event: NormalizedEvent) -> Result<Dispatch> {
    let _guard = match event.subject_key() {
      Some(key) => Some(self.locks.lock(key).await),
      None => None,
    };

    let mut applied = Vec::new();
    for &handler in &self.handlers {
      let outcome = handler
        .apply(self.directory.as_ref(), &event)
        .await
        .inspect_err(|e| {
          tracing::warn!(
            handler = handler.name(),
            event_type = event.event_type(),
            error = %e,
            "handler failed, aborting chain"
          );
        })?;
      if !outcome.is_skipped() {
        applied.push((handler, outcome));
      }
    }

    if applied.is_empty() {
      tracing::debug!(event_type = event.event_type(), "no handler matched");
    }
    Ok(Dispatch { event, applied })
  }
}
