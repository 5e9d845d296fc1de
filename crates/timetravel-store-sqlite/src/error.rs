//! Error type for `timetravel-store-sqlite`.

use thiserror::Error;
use timetravel_core::record::RecordId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] timetravel_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("timestamp parse error: {0}")]
  Timestamp(#[from] chrono::ParseError),

  #[error("stored version number out of range: {0}")]
  VersionRange(i64),

  #[error("row ({0}, {1}) already exists")]
  Duplicate(RecordId, u32),

  /// `update_end` found no open row to close.
  #[error("row ({0}, {1}) is missing or already closed")]
  NotOpen(RecordId, u32),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
