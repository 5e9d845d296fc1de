//! Error types for `timetravel-core`.

use thiserror::Error;

use crate::record::RecordId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid identifier: {0}")]
  InvalidIdentifier(String),

  #[error("record {0} does not exist")]
  NotFound(RecordId),

  #[error("record {id} has no version {version}")]
  VersionNotFound { id: RecordId, version: u32 },

  #[error("record {0} already exists")]
  AlreadyExists(RecordId),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The stored chain breaks an invariant, usually left behind by an append
  /// whose second write never landed.
  #[error("record {id} has an inconsistent version chain: {reason}")]
  ChainInconsistency { id: RecordId, reason: String },
}

impl Error {
  /// Wrap a substrate error.
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
