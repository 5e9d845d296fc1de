//! Per-record mutual exclusion.
//!
//! Appending a version is a read-close-insert sequence; two writers on the
//! same id must not interleave. Writers on different ids never contend.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::record::RecordId;

/// Lazily created async mutexes, one per [`RecordId`].
///
/// Entries nobody holds or waits on are dropped on the next acquisition, so
/// the table only grows with the number of ids being written concurrently.
#[derive(Debug, Default)]
pub struct LockTable {
  locks: Mutex<HashMap<RecordId, Arc<AsyncMutex<()>>>>,
}

impl LockTable {
  pub fn new() -> Self { Self::default() }

  /// Wait until `id` is free and hold it until the guard is dropped.
  pub async fn acquire(&self, id: RecordId) -> OwnedMutexGuard<()> {
    let lock = {
      // The map is only mutated under this guard and nothing in here panics,
      // so a poisoned map is still usable.
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      locks.retain(|_, lock| Arc::strong_count(lock) > 1);
      locks.entry(id).or_default().clone()
    };
    lock.lock_owned().await
  }

  /// Number of ids currently tracked.
  pub fn len(&self) -> usize {
    self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  fn id(n: i64) -> RecordId { RecordId::new(n).unwrap() }

  #[tokio::test]
  async fn same_id_is_exclusive() {
    let table = Arc::new(LockTable::new());
    let guard = table.acquire(id(1)).await;

    let waiter = {
      let table = table.clone();
      tokio::spawn(async move {
        let _g = table.acquire(id(1)).await;
      })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(guard);
    waiter.await.unwrap();
  }

  #[tokio::test]
  async fn different_ids_do_not_contend() {
    let table = LockTable::new();
    let _a = table.acquire(id(1)).await;
    let _b = tokio::time::timeout(Duration::from_millis(100), table.acquire(id(2)))
      .await
      .expect("id 2 must not wait on id 1");
  }

  #[tokio::test]
  async fn idle_entries_are_pruned() {
    let table = LockTable::new();
    drop(table.acquire(id(1)).await);
    drop(table.acquire(id(2)).await);
    let _c = table.acquire(id(3)).await;
    assert_eq!(table.len(), 1);
  }
}
