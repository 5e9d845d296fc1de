//! The persistence substrate contract consumed by
//! [`HistoryStore`](crate::store::HistoryStore).
//!
//! A substrate is a row store keyed by `(id, version)`. It knows nothing about
//! merge-patch or chain invariants; it only has to insert rows, close a row
//! once, and read rows back.

use std::future::Future;

use crate::record::{RecordId, RecordVersion, StoredRow, Timestamp};

/// Instruction to set the `end` of an open row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseVersion {
  pub id:      RecordId,
  pub version: u32,
  pub end:     Timestamp,
}

/// Abstraction over a row-oriented version store.
///
/// All methods return `Send` futures so backends can sit behind an axum
/// router on a multi-threaded runtime.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert a new row. Fails if `(row.id, row.version)` already exists.
  fn insert_version(
    &self,
    row: RecordVersion,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Set the `end` of an existing, still open row. Fails if the row is
  /// missing or already closed.
  fn update_end(
    &self,
    close: CloseVersion,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The row with the highest version for `id`.
  fn read_latest(
    &self,
    id: RecordId,
  ) -> impl Future<Output = Result<Option<RecordVersion>, Self::Error>> + Send + '_;

  /// The row with exactly `(id, version)`.
  fn read_one(
    &self,
    id: RecordId,
    version: u32,
  ) -> impl Future<Output = Result<Option<RecordVersion>, Self::Error>> + Send + '_;

  /// Every row for `id`, ordered by version ascending.
  fn read_all(
    &self,
    id: RecordId,
  ) -> impl Future<Output = Result<Vec<RecordVersion>, Self::Error>> + Send + '_;

  /// Every row in the store, undecoded, in no particular order.
  fn read_everything(
    &self,
  ) -> impl Future<Output = Result<Vec<StoredRow>, Self::Error>> + Send + '_;

  /// Close the current row (if any) and insert its successor.
  ///
  /// The default runs the two writes one after the other, so a failure of the
  /// insert leaves a closed row with no successor behind. Backends that
  /// support transactions should override this and make both writes atomic.
  fn commit_append(
    &self,
    close: Option<CloseVersion>,
    next: RecordVersion,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    async move {
      if let Some(close) = close {
        self.update_end(close).await?;
      }
      self.insert_version(next).await
    }
  }
}
