//! [`MemoryBackend`] — an in-process [`Backend`] over a sorted map.
//!
//! Useful for tests and for deployments that do not need durability.

use std::{
  collections::BTreeMap,
  sync::{Arc, PoisonError, RwLock},
};

use thiserror::Error;

use crate::{
  backend::{Backend, CloseVersion},
  record::{RecordId, RecordVersion, StoredRow},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("row ({0}, {1}) already exists")]
  Duplicate(RecordId, u32),

  #[error("row ({0}, {1}) does not exist")]
  MissingRow(RecordId, u32),

  #[error("row ({0}, {1}) is already closed")]
  AlreadyClosed(RecordId, u32),

  #[error("memory backend lock poisoned")]
  Poisoned,

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl<T> From<PoisonError<T>> for MemoryError {
  fn from(_: PoisonError<T>) -> Self { Self::Poisoned }
}

type Rows = BTreeMap<(RecordId, u32), RecordVersion>;

/// Rows keyed by `(id, version)`.
///
/// Cloning is cheap; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
  rows: Arc<RwLock<Rows>>,
}

impl MemoryBackend {
  pub fn new() -> Self { Self::default() }
}

fn chain(rows: &Rows, id: RecordId) -> impl DoubleEndedIterator<Item = &RecordVersion> {
  rows.range((id, 0)..=(id, u32::MAX)).map(|(_, row)| row)
}

fn close_in(rows: &mut Rows, close: CloseVersion) -> Result<(), MemoryError> {
  let row = rows
    .get_mut(&(close.id, close.version))
    .ok_or(MemoryError::MissingRow(close.id, close.version))?;
  if row.end.is_some() {
    return Err(MemoryError::AlreadyClosed(close.id, close.version));
  }
  row.end = Some(close.end);
  Ok(())
}

impl Backend for MemoryBackend {
  type Error = MemoryError;

  async fn insert_version(&self, row: RecordVersion) -> Result<(), MemoryError> {
    let mut rows = self.rows.write()?;
    let key = (row.id, row.version);
    if rows.contains_key(&key) {
      return Err(MemoryError::Duplicate(row.id, row.version));
    }
    rows.insert(key, row);
    Ok(())
  }

  async fn update_end(&self, close: CloseVersion) -> Result<(), MemoryError> {
    close_in(&mut *self.rows.write()?, close)
  }

  async fn read_latest(&self, id: RecordId) -> Result<Option<RecordVersion>, MemoryError> {
    Ok(chain(&*self.rows.read()?, id).next_back().cloned())
  }

  async fn read_one(
    &self,
    id: RecordId,
    version: u32,
  ) -> Result<Option<RecordVersion>, MemoryError> {
    Ok(self.rows.read()?.get(&(id, version)).cloned())
  }

  async fn read_all(&self, id: RecordId) -> Result<Vec<RecordVersion>, MemoryError> {
    Ok(chain(&*self.rows.read()?, id).cloned().collect())
  }

  async fn read_everything(&self) -> Result<Vec<StoredRow>, MemoryError> {
    let rows = self.rows.read()?;
    Ok(rows.values().map(StoredRow::encode).collect::<Result<_, _>>()?)
  }

  async fn commit_append(
    &self,
    close: Option<CloseVersion>,
    next: RecordVersion,
  ) -> Result<(), MemoryError> {
    let mut rows = self.rows.write()?;
    if rows.contains_key(&(next.id, next.version)) {
      return Err(MemoryError::Duplicate(next.id, next.version));
    }
    if let Some(close) = close {
      close_in(&mut rows, close)?;
    }
    rows.insert((next.id, next.version), next);
    Ok(())
  }
}
