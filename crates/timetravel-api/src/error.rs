//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use timetravel_core::Error as StoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("invalid id; id must be a positive number")]
  InvalidId,

  #[error("invalid version; version must be a positive number")]
  InvalidVersion,

  #[error("invalid input; could not parse json")]
  InvalidBody(#[source] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[from] StoreError),
}

impl ApiError {
  fn status_and_message(&self) -> (StatusCode, String) {
    match self {
      ApiError::InvalidId | ApiError::InvalidVersion | ApiError::InvalidBody(_) => {
        (StatusCode::BAD_REQUEST, self.to_string())
      }
      ApiError::Store(StoreError::InvalidIdentifier(m)) => {
        (StatusCode::BAD_REQUEST, m.clone())
      }
      ApiError::Store(StoreError::NotFound(id)) => (
        StatusCode::NOT_FOUND,
        format!("record of id {id} does not exist"),
      ),
      ApiError::Store(StoreError::VersionNotFound { id, version }) => (
        StatusCode::NOT_FOUND,
        format!("record of id {id} version {version} does not exist"),
      ),
      ApiError::Store(StoreError::AlreadyExists(id)) => (
        StatusCode::CONFLICT,
        format!("record of id {id} already exists"),
      ),
      ApiError::Store(
        e @ (StoreError::Storage(_) | StoreError::ChainInconsistency { .. }),
      ) => {
        tracing::error!(error = %e, "request failed in the record store");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = self.status_and_message();
    (status, Json(json!({ "error": message }))).into_response()
  }
}
