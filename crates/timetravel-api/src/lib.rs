//! JSON REST API for the timetravel record store.
//!
//! Exposes an axum [`Router`] with two API generations:
//!
//! - `/api/v1` — backed by a single-version store (no history).
//! - `/api/v2` — backed by a full-history store, with version reads.
//!
//! Both are generic over [`VersionedRecordStore`]; which concrete store sits
//! behind each prefix is the caller's choice.

pub mod error;
pub mod records;

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use timetravel_core::store::VersionedRecordStore;

pub use error::ApiError;

/// `/records` routes of the v1 API: latest read and create-or-update.
pub fn v1_router<S>(store: Arc<S>) -> Router<()>
where
  S: VersionedRecordStore + 'static,
{
  Router::new()
    .route(
      "/records/{id}",
      get(records::get_record::<S>).post(records::put_record::<S>),
    )
    .with_state(store)
}

/// `/records` routes of the v2 API, including history reads.
pub fn v2_router<S>(store: Arc<S>) -> Router<()>
where
  S: VersionedRecordStore + 'static,
{
  Router::new()
    .route(
      "/records/{id}",
      get(records::get_latest::<S>)
        .post(records::create_or_update::<S>)
        .put(records::create::<S>),
    )
    .route("/records/{id}/list", get(records::list_versions::<S>))
    .route("/records/{id}/versions/{version}", get(records::get_version::<S>))
    .with_state(store)
}

/// Build the full API: `/health`, `/api/v1` over `snapshot` and `/api/v2`
/// over `history`.
pub fn api_router<H, S>(history: Arc<H>, snapshot: Arc<S>) -> Router<()>
where
  H: VersionedRecordStore + 'static,
  S: VersionedRecordStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api/v1", v1_router(snapshot))
    .nest("/api/v2", v2_router(history))
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "ok": true })) }
