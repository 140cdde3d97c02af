//! Per-external-id critical sections.
//!
//! Events for the same external id are applied one at a time; events for
//! different ids proceed independently.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A set of async mutexes keyed by external id.
///
/// Entries are created on demand and dropped once nobody holds or waits on
/// them.
#[derive(Debug, Default)]
pub struct KeyLocks {
  locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
  pub fn new() -> Self { Self::default() }

  /// Wait for exclusive access to `key`. Access is released when the guard
  /// is dropped.
  pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
    let entry = {
      let mut locks = self.locks.lock().await;
      // Only the map holds an idle entry.
      locks.retain(|_, lock| Arc::strong_count(lock) > 1);
      locks.entry(key.to_owned()).or_default().clone()
    };
    entry.lock_owned().await
  }

  /// Number of keys currently held or awaited.
  pub async fn active(&self) -> usize {
    let locks = self.locks.lock().await;
    locks
      .values()
      .filter(|lock| Arc::strong_count(lock) > 1)
      .count()
  }
}
