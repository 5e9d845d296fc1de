//! [`SnapshotStore`] — the single-version store.
//!
//! Keeps no history: each id has exactly one version, which updates
//! overwrite in place. Only `get_latest` and `create_or_update` are really
//! meaningful here; the other operations answer as if the chain had length
//! one.

use std::{
  collections::HashMap,
  sync::{PoisonError, RwLock},
};

use crate::{
  Error, Result, chain, patch,
  record::{EditSet, FieldMap, RecordId, RecordVersion, StoredRow, Timestamp, version_number},
  store::{Export, VersionedRecordStore},
};

#[derive(Debug, Default)]
pub struct SnapshotStore {
  records: RwLock<HashMap<RecordId, RecordVersion>>,
}

fn poisoned<T>(_: PoisonError<T>) -> Error {
  Error::Storage("snapshot store lock poisoned".into())
}

impl SnapshotStore {
  pub fn new() -> Self { Self::default() }

  fn read(&self, id: RecordId) -> Result<Option<RecordVersion>> {
    Ok(self.records.read().map_err(poisoned)?.get(&id).cloned())
  }

  /// Patch the stored version in place, or start one from an empty map.
  fn overwrite(&self, id: RecordId, edits: &EditSet) -> Result<RecordVersion> {
    let mut records = self.records.write().map_err(poisoned)?;
    let now = Timestamp::now();
    let row = records
      .entry(id)
      .and_modify(|row| {
        row.data = patch::apply(&row.data, edits);
        row.start = now;
      })
      .or_insert_with(|| chain::first(id, patch::apply(&FieldMap::new(), edits), now));
    Ok(row.clone())
  }

  fn insert_new(&self, id: RecordId, fields: FieldMap) -> Result<RecordVersion> {
    let mut records = self.records.write().map_err(poisoned)?;
    if records.contains_key(&id) {
      return Err(Error::AlreadyExists(id));
    }
    let row = chain::first(id, fields, Timestamp::now());
    records.insert(id, row.clone());
    Ok(row)
  }
}

impl VersionedRecordStore for SnapshotStore {
  async fn get_latest(&self, id: RecordId) -> Result<RecordVersion> {
    self.read(id)?.ok_or(Error::NotFound(id))
  }

  async fn get_version(&self, id: RecordId, version: u32) -> Result<RecordVersion> {
    let version = version_number(i64::from(version))?;
    let row = self.read(id)?.ok_or(Error::NotFound(id))?;
    if row.version == version {
      Ok(row)
    } else {
      Err(Error::VersionNotFound { id, version })
    }
  }

  async fn list_versions(&self, id: RecordId) -> Result<Vec<RecordVersion>> {
    Ok(vec![self.read(id)?.ok_or(Error::NotFound(id))?])
  }

  async fn append(&self, id: RecordId, edits: EditSet) -> Result<RecordVersion> {
    self.overwrite(id, &edits)
  }

  async fn create_if_absent(&self, id: RecordId, fields: FieldMap) -> Result<RecordVersion> {
    self.insert_new(id, fields)
  }

  async fn create_or_update(&self, id: RecordId, edits: EditSet) -> Result<RecordVersion> {
    // Both steps run under one write lock so concurrent first writes cannot
    // both take the create branch.
    let mut records = self.records.write().map_err(poisoned)?;
    let now = Timestamp::now();
    let row = match records.get_mut(&id) {
      Some(row) => {
        row.data = patch::apply(&row.data, &edits);
        row.start = now;
        row.clone()
      }
      None => {
        let row = chain::first(id, edits.into_fields(), now);
        records.insert(id, row.clone());
        row
      }
    };
    Ok(row)
  }

  async fn export_all(&self) -> Result<Export> {
    let records = self.records.read().map_err(poisoned)?;
    let mut rows = records
      .values()
      .map(StoredRow::encode)
      .collect::<Result<Vec<_>, _>>()
      .map_err(Error::storage)?;
    rows.sort_by_key(|r| r.id);
    Ok(Export::new(rows))
  }
}
