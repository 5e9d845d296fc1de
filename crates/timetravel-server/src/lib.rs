//! Server bootstrap for timetravel: configuration, app assembly and export.
//!
//! The binary in `main.rs` only parses arguments and picks a backend; the
//! pieces it wires together live here so they can be tested in-process.

use std::{
  io::Write,
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use serde::Deserialize;
use timetravel_core::{
  backend::Backend,
  snapshot::SnapshotStore,
  store::{HistoryStore, VersionedRecordStore},
};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Which substrate backs the v2 history store.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
  #[default]
  Sqlite,
  Memory,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `TIMETRAVEL_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub backend:    BackendKind,
  pub store_path: PathBuf,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_owned(),
      port:       8000,
      backend:    BackendKind::Sqlite,
      store_path: PathBuf::from("timetravel.db"),
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `store_path` with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Build the full HTTP app: v2 over a [`HistoryStore`] on `backend`, v1
/// over a fresh in-process [`SnapshotStore`].
pub fn app<B>(backend: B) -> Router
where
  B: Backend + 'static,
{
  timetravel_api::api_router(
    Arc::new(HistoryStore::new(backend)),
    Arc::new(SnapshotStore::new()),
  )
  .layer(TraceLayer::new_for_http())
}

// ─── Export ───────────────────────────────────────────────────────────────────

/// Write every stored row of `store` to `out` as JSON lines. Returns the
/// number of rows written.
pub async fn export<S, W>(store: &S, mut out: W) -> anyhow::Result<usize>
where
  S: VersionedRecordStore,
  W: Write,
{
  let rows = store.export_all().await?;
  let mut written = 0;
  for row in rows {
    serde_json::to_writer(&mut out, &row)?;
    out.write_all(b"\n")?;
    written += 1;
  }
  out.flush()?;
  tracing::debug!(rows = written, "export finished");
  Ok(written)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
