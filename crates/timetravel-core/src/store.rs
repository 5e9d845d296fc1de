//! The [`VersionedRecordStore`] trait and the full-history [`HistoryStore`].
//!
//! Higher layers (`timetravel-api`, the server binary) depend on the trait;
//! the concrete store is chosen once at construction time.

use std::future::Future;

use crate::{
  Error, Result,
  backend::Backend,
  chain,
  lock::LockTable,
  patch,
  record::{EditSet, FieldMap, RecordId, RecordVersion, StoredRow, Timestamp, version_number},
};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Create, read and update operations over per-id version chains.
///
/// Every returned [`RecordVersion`] is an owned copy; mutating it never
/// affects what is stored.
pub trait VersionedRecordStore: Send + Sync {
  /// The current (open-ended) version of `id`.
  fn get_latest(
    &self,
    id: RecordId,
  ) -> impl Future<Output = Result<RecordVersion>> + Send + '_;

  /// A specific version of `id`. Fails with [`Error::NotFound`] for an
  /// unknown id and [`Error::VersionNotFound`] for a known id whose chain has
  /// no such version.
  fn get_version(
    &self,
    id: RecordId,
    version: u32,
  ) -> impl Future<Output = Result<RecordVersion>> + Send + '_;

  /// Every version of `id`, oldest first.
  fn list_versions(
    &self,
    id: RecordId,
  ) -> impl Future<Output = Result<Vec<RecordVersion>>> + Send + '_;

  /// Derive a new version by merge-patching the current one. Starts a new
  /// chain from an empty field map if `id` has none.
  fn append(
    &self,
    id: RecordId,
    edits: EditSet,
  ) -> impl Future<Output = Result<RecordVersion>> + Send + '_;

  /// Start a chain for `id` with exactly `fields`. First write wins: fails
  /// with [`Error::AlreadyExists`] if a chain is already there.
  fn create_if_absent(
    &self,
    id: RecordId,
    fields: FieldMap,
  ) -> impl Future<Output = Result<RecordVersion>> + Send + '_;

  /// Create version 1 from the `Set` edits (deletions are dropped) if `id`
  /// is new, otherwise [`append`](Self::append).
  fn create_or_update(
    &self,
    id: RecordId,
    edits: EditSet,
  ) -> impl Future<Output = Result<RecordVersion>> + Send + '_;

  /// A snapshot of every stored row across all ids. Each call takes a fresh
  /// one.
  fn export_all(&self) -> impl Future<Output = Result<Export>> + Send + '_;
}

// ─── Export ──────────────────────────────────────────────────────────────────

/// Iterator over raw rows returned by [`VersionedRecordStore::export_all`].
///
/// Rows are read into a snapshot when `export_all` is called; writes that
/// land afterwards are not seen by this iterator.
#[derive(Debug)]
pub struct Export {
  rows: std::vec::IntoIter<StoredRow>,
}

impl Export {
  pub fn new(rows: Vec<StoredRow>) -> Self { Self { rows: rows.into_iter() } }
}

impl Iterator for Export {
  type Item = StoredRow;

  fn next(&mut self) -> Option<StoredRow> { self.rows.next() }

  fn size_hint(&self) -> (usize, Option<usize>) { self.rows.size_hint() }
}

impl ExactSizeIterator for Export {}

// ─── HistoryStore ────────────────────────────────────────────────────────────

/// The full-history store: every update closes the current version and
/// appends a new one to the backend.
///
/// Writes to the same id are serialised through a [`LockTable`]; writes to
/// different ids run in parallel.
#[derive(Debug)]
pub struct HistoryStore<B> {
  backend: B,
  locks:   LockTable,
}

impl<B: Backend> HistoryStore<B> {
  pub fn new(backend: B) -> Self { Self { backend, locks: LockTable::new() } }

  pub fn backend(&self) -> &B { &self.backend }

  async fn latest(&self, id: RecordId) -> Result<Option<RecordVersion>> {
    self.backend.read_latest(id).await.map_err(Error::storage)
  }

  /// Insert version 1. Caller holds the lock for `id`.
  async fn start_chain(&self, id: RecordId, fields: FieldMap) -> Result<RecordVersion> {
    let row = chain::first(id, fields, Timestamp::now());
    self
      .backend
      .insert_version(row.clone())
      .await
      .map_err(Error::storage)?;
    tracing::debug!(%id, "started record chain");
    Ok(row)
  }

  /// Close `current` and append its successor. Caller holds the lock.
  async fn extend_chain(
    &self,
    current: &RecordVersion,
    edits: &EditSet,
  ) -> Result<RecordVersion> {
    let transition =
      chain::successor(current, edits, Timestamp::now()).inspect_err(warn_inconsistent)?;
    let next = transition.next.clone();
    self
      .backend
      .commit_append(Some(transition.close), transition.next)
      .await
      .map_err(Error::storage)?;
    tracing::debug!(id = %next.id, version = next.version, "appended record version");
    Ok(next)
  }
}

fn warn_inconsistent(e: &Error) {
  if let Error::ChainInconsistency { id, reason } = e {
    tracing::warn!(%id, %reason, "version chain is inconsistent");
  }
}

impl<B: Backend> VersionedRecordStore for HistoryStore<B> {
  async fn get_latest(&self, id: RecordId) -> Result<RecordVersion> {
    let row = self.latest(id).await?.ok_or(Error::NotFound(id))?;
    chain::check_latest(&row).inspect_err(warn_inconsistent)?;
    Ok(row)
  }

  async fn get_version(&self, id: RecordId, version: u32) -> Result<RecordVersion> {
    let version = version_number(i64::from(version))?;
    if let Some(row) = self
      .backend
      .read_one(id, version)
      .await
      .map_err(Error::storage)?
    {
      return Ok(row);
    }
    match self.latest(id).await? {
      Some(_) => Err(Error::VersionNotFound { id, version }),
      None => Err(Error::NotFound(id)),
    }
  }

  async fn list_versions(&self, id: RecordId) -> Result<Vec<RecordVersion>> {
    let rows = self.backend.read_all(id).await.map_err(Error::storage)?;
    if rows.is_empty() {
      return Err(Error::NotFound(id));
    }
    chain::verify(id, &rows).inspect_err(warn_inconsistent)?;
    Ok(rows)
  }

  async fn append(&self, id: RecordId, edits: EditSet) -> Result<RecordVersion> {
    let _guard = self.locks.acquire(id).await;
    match self.latest(id).await? {
      Some(current) => self.extend_chain(&current, &edits).await,
      None => self.start_chain(id, patch::apply(&FieldMap::new(), &edits)).await,
    }
  }

  async fn create_if_absent(&self, id: RecordId, fields: FieldMap) -> Result<RecordVersion> {
    let _guard = self.locks.acquire(id).await;
    if self.latest(id).await?.is_some() {
      return Err(Error::AlreadyExists(id));
    }
    self.start_chain(id, fields).await
  }

  async fn create_or_update(&self, id: RecordId, edits: EditSet) -> Result<RecordVersion> {
    let _guard = self.locks.acquire(id).await;
    match self.latest(id).await? {
      Some(current) => self.extend_chain(&current, &edits).await,
      None => self.start_chain(id, edits.into_fields()).await,
    }
  }

  async fn export_all(&self) -> Result<Export> {
    let rows = self.backend.read_everything().await.map_err(Error::storage)?;
    Ok(Export::new(rows))
  }
}
