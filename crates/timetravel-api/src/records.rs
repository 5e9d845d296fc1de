//! Handlers for `/records` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/records/{id}` | Current version |
//! | `POST` | `/records/{id}` | Body: `{"field": "value" \| null}`; creates or updates |
//! | `PUT`  | `/records/{id}` | Body: `{"field": "value"}`; create only, 409 if present |
//! | `GET`  | `/records/{id}/list` | Every version, oldest first |
//! | `GET`  | `/records/{id}/versions/{version}` | One version |
//!
//! Path segments are taken as strings and validated here so that malformed
//! ids get the same JSON error body as non-positive ones. Bodies are decoded
//! as JSON whatever their `Content-Type` says.
//!
//! The v1 API has no history, so its routes answer with [`Record`] instead of
//! the full [`RecordVersion`].

use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Serialize, de::DeserializeOwned};
use timetravel_core::{
  record::{EditSet, FieldMap, RecordId, RecordVersion, parse_version},
  store::VersionedRecordStore,
};

use crate::error::ApiError;

fn parse_id(raw: &str) -> Result<RecordId, ApiError> {
  raw.parse().map_err(|_| ApiError::InvalidId)
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
  serde_json::from_slice(body).map_err(ApiError::InvalidBody)
}

/// The v1 view of a record: its id and current fields.
#[derive(Debug, Serialize)]
pub struct Record {
  pub id:   RecordId,
  pub data: FieldMap,
}

impl From<RecordVersion> for Record {
  fn from(v: RecordVersion) -> Self { Self { id: v.id, data: v.data } }
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /records/{id}`
pub async fn get_latest<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<RecordVersion>, ApiError>
where
  S: VersionedRecordStore,
{
  let id = parse_id(&id)?;
  Ok(Json(store.get_latest(id).await?))
}

/// `GET /records/{id}/versions/{version}`
pub async fn get_version<S>(
  State(store): State<Arc<S>>,
  Path((id, version)): Path<(String, String)>,
) -> Result<Json<RecordVersion>, ApiError>
where
  S: VersionedRecordStore,
{
  let id = parse_id(&id)?;
  let version = parse_version(&version).map_err(|_| ApiError::InvalidVersion)?;
  Ok(Json(store.get_version(id, version).await?))
}

/// `GET /records/{id}/list`
pub async fn list_versions<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<RecordVersion>>, ApiError>
where
  S: VersionedRecordStore,
{
  let id = parse_id(&id)?;
  Ok(Json(store.list_versions(id).await?))
}

// ─── Writes ───────────────────────────────────────────────────────────────────

/// `POST /records/{id}` — string values set a field, `null` deletes it.
///
/// On a new id the deletions are dropped and version 1 holds the remaining
/// fields.
pub async fn create_or_update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  body: Bytes,
) -> Result<Json<RecordVersion>, ApiError>
where
  S: VersionedRecordStore,
{
  let id = parse_id(&id)?;
  let edits: EditSet = parse_body(&body)?;
  Ok(Json(store.create_or_update(id, edits).await?))
}

/// `PUT /records/{id}` — returns 201 + version 1, or 409 if the id is taken.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: VersionedRecordStore,
{
  let id = parse_id(&id)?;
  let fields: FieldMap = parse_body(&body)?;
  let record = store.create_if_absent(id, fields).await?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── v1 ───────────────────────────────────────────────────────────────────────

/// `GET /api/v1/records/{id}`
pub async fn get_record<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Record>, ApiError>
where
  S: VersionedRecordStore,
{
  let id = parse_id(&id)?;
  Ok(Json(store.get_latest(id).await?.into()))
}

/// `POST /api/v1/records/{id}` — same edit semantics as v2, no history kept
/// by the store behind it.
pub async fn put_record<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  body: Bytes,
) -> Result<Json<Record>, ApiError>
where
  S: VersionedRecordStore,
{
  let id = parse_id(&id)?;
  let edits: EditSet = parse_body(&body)?;
  Ok(Json(store.create_or_update(id, edits).await?.into()))
}
