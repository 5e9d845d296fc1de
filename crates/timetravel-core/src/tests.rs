//! `HistoryStore` behaviour against the in-memory backend.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use crate::{
  Error,
  backend::{Backend, CloseVersion},
  memory::MemoryBackend,
  patch,
  memory::MemoryError,
  record::{EditSet, FieldMap, RecordId, RecordVersion, StoredRow, Timestamp},
  store::{HistoryStore, VersionedRecordStore},
};

fn store() -> HistoryStore<MemoryBackend> { HistoryStore::new(MemoryBackend::new()) }

fn id(n: i64) -> RecordId { RecordId::new(n).unwrap() }

fn fields(pairs: &[(&str, &str)]) -> FieldMap {
  pairs
    .iter()
    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
    .collect()
}

// ─── Scenario ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_update_then_delete_fields() {
  let s = store();

  let v1 = s
    .create_or_update(id(1), EditSet::new().set("key1", "value1").set("key2", "222"))
    .await
    .unwrap();
  assert_eq!(v1.version, 1);
  assert_eq!(v1.data, fields(&[("key1", "value1"), ("key2", "222")]));

  let v2 = s
    .create_or_update(id(1), EditSet::new().set("key1", "value2").set("status", "ok"))
    .await
    .unwrap();
  assert_eq!(v2.version, 2);
  assert_eq!(
    v2.data,
    fields(&[("key1", "value2"), ("key2", "222"), ("status", "ok")])
  );

  let v3 = s
    .create_or_update(id(1), EditSet::new().delete("key1").delete("status"))
    .await
    .unwrap();
  assert_eq!(v3.version, 3);
  assert_eq!(v3.data, fields(&[("key2", "222")]));

  assert_eq!(s.get_latest(id(1)).await.unwrap(), v3);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
  let s = store();
  assert!(matches!(s.get_latest(id(15)).await, Err(Error::NotFound(_))));
  assert!(matches!(s.list_versions(id(15)).await, Err(Error::NotFound(_))));
  assert!(matches!(s.get_version(id(15), 1).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn out_of_range_version_is_version_not_found() {
  let s = store();
  s.create_or_update(id(1), EditSet::new().set("a", "1")).await.unwrap();

  assert!(matches!(
    s.get_version(id(1), 2).await,
    Err(Error::VersionNotFound { version: 2, .. })
  ));
  assert!(matches!(
    s.get_version(id(1), 0).await,
    Err(Error::InvalidIdentifier(_))
  ));
}

// ─── Chain invariants ────────────────────────────────────────────────────────

#[tokio::test]
async fn versions_are_gapless_and_contiguous() {
  let s = store();
  for i in 0..6 {
    s.create_or_update(id(7), EditSet::new().set("i", i.to_string()))
      .await
      .unwrap();
  }

  let rows = s.list_versions(id(7)).await.unwrap();
  assert_eq!(rows.len(), 6);
  for (idx, row) in rows.iter().enumerate() {
    assert_eq!(row.version as usize, idx + 1);
    assert_eq!(row.is_current(), idx == rows.len() - 1);
  }
  for pair in rows.windows(2) {
    assert_eq!(pair[0].end, Some(pair[1].start));
  }
}

#[tokio::test]
async fn stored_snapshots_match_independent_patch_chain() {
  let s = store();
  let edit_sets = [
    EditSet::new().set("a", "0").set("b", "2").set("c", "3"),
    EditSet::new().set("a", "1").delete("b"),
    EditSet::new().set("d", "4"),
    EditSet::new().delete("a").delete("ghost"),
  ];

  let mut expected = Vec::new();
  let mut current = FieldMap::new();
  for edits in &edit_sets {
    s.append(id(3), edits.clone()).await.unwrap();
    current = patch::apply(&current, edits);
    expected.push(current.clone());
  }

  for (idx, want) in expected.iter().enumerate() {
    let got = s.get_version(id(3), idx as u32 + 1).await.unwrap();
    assert_eq!(&got.data, want);
  }
}

#[tokio::test]
async fn repeated_reads_are_identical() {
  let s = store();
  s.create_or_update(id(1), EditSet::new().set("k", "v")).await.unwrap();

  let a = s.get_latest(id(1)).await.unwrap();
  let b = s.get_latest(id(1)).await.unwrap();
  assert_eq!(a, b);
}

#[tokio::test]
async fn returned_rows_do_not_alias_storage() {
  let s = store();
  let mut row = s
    .create_or_update(id(1), EditSet::new().set("k", "v"))
    .await
    .unwrap();
  row.data.clear();

  assert_eq!(s.get_latest(id(1)).await.unwrap().data, fields(&[("k", "v")]));
}

// ─── Create semantics ────────────────────────────────────────────────────────

#[tokio::test]
async fn first_write_drops_deletions_but_update_applies_them() {
  let s = store();
  let created = s
    .create_or_update(id(1), EditSet::new().set("a", "1").delete("b"))
    .await
    .unwrap();
  assert_eq!(created.data, fields(&[("a", "1")]));

  let updated = s
    .create_or_update(id(1), EditSet::new().delete("a"))
    .await
    .unwrap();
  assert!(updated.data.is_empty());
}

#[tokio::test]
async fn append_on_new_id_starts_chain() {
  let s = store();
  let row = s
    .append(id(4), EditSet::new().set("x", "1").delete("y"))
    .await
    .unwrap();
  assert_eq!(row.version, 1);
  assert_eq!(row.data, fields(&[("x", "1")]));
}

#[tokio::test]
async fn create_if_absent_is_first_write_wins() {
  let s = store();
  let row = s.create_if_absent(id(1), fields(&[("a", "1")])).await.unwrap();
  assert_eq!(row.version, 1);

  let err = s.create_if_absent(id(1), fields(&[("a", "2")])).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyExists(_)));
  assert_eq!(s.get_latest(id(1)).await.unwrap().data, fields(&[("a", "1")]));
}

// ─── Partial writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_tail_is_reported_not_hidden() {
  let s = store();
  s.create_or_update(id(1), EditSet::new().set("a", "1")).await.unwrap();

  // Simulate an append whose insert never landed.
  s.backend()
    .update_end(CloseVersion { id: id(1), version: 1, end: Timestamp::now() })
    .await
    .unwrap();

  assert!(matches!(
    s.get_latest(id(1)).await,
    Err(Error::ChainInconsistency { .. })
  ));
  assert!(matches!(
    s.list_versions(id(1)).await,
    Err(Error::ChainInconsistency { .. })
  ));
  assert!(matches!(
    s.create_or_update(id(1), EditSet::new().set("a", "2")).await,
    Err(Error::ChainInconsistency { .. })
  ));
}

/// A backend without transactions: keeps the default two-step
/// `commit_append` and can be told to fail its next insert.
#[derive(Default)]
struct TwoStepBackend {
  rows:        MemoryBackend,
  fail_insert: AtomicBool,
}

impl Backend for TwoStepBackend {
  type Error = MemoryError;

  async fn insert_version(&self, row: RecordVersion) -> Result<(), MemoryError> {
    if self.fail_insert.swap(false, Ordering::SeqCst) {
      return Err(MemoryError::Poisoned);
    }
    self.rows.insert_version(row).await
  }

  async fn update_end(&self, close: CloseVersion) -> Result<(), MemoryError> {
    self.rows.update_end(close).await
  }

  async fn read_latest(&self, id: RecordId) -> Result<Option<RecordVersion>, MemoryError> {
    self.rows.read_latest(id).await
  }

  async fn read_one(
    &self,
    id: RecordId,
    version: u32,
  ) -> Result<Option<RecordVersion>, MemoryError> {
    self.rows.read_one(id, version).await
  }

  async fn read_all(&self, id: RecordId) -> Result<Vec<RecordVersion>, MemoryError> {
    self.rows.read_all(id).await
  }

  async fn read_everything(&self) -> Result<Vec<StoredRow>, MemoryError> {
    self.rows.read_everything().await
  }
}

#[tokio::test]
async fn two_step_append_works_when_both_writes_land() {
  let s = HistoryStore::new(TwoStepBackend::default());
  s.create_or_update(id(1), EditSet::new().set("a", "1")).await.unwrap();
  let v2 = s
    .create_or_update(id(1), EditSet::new().set("a", "2"))
    .await
    .unwrap();

  assert_eq!(v2.version, 2);
  let rows = s.list_versions(id(1)).await.unwrap();
  assert_eq!(rows[0].end, Some(rows[1].start));
}

#[tokio::test]
async fn failed_insert_after_close_surfaces_as_inconsistency() {
  let s = HistoryStore::new(TwoStepBackend::default());
  s.create_or_update(id(1), EditSet::new().set("a", "1")).await.unwrap();

  s.backend().fail_insert.store(true, Ordering::SeqCst);
  assert!(matches!(
    s.create_or_update(id(1), EditSet::new().set("a", "2")).await,
    Err(Error::Storage(_))
  ));

  // The close landed, the successor did not.
  assert!(!s.backend().rows.read_one(id(1), 1).await.unwrap().unwrap().is_current());
  assert!(s.backend().rows.read_one(id(1), 2).await.unwrap().is_none());
  assert!(matches!(
    s.get_latest(id(1)).await,
    Err(Error::ChainInconsistency { .. })
  ));
}

// ─── Export ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn export_covers_all_ids_and_is_restartable() {
  let s = store();
  s.create_or_update(id(1), EditSet::new().set("a", "1")).await.unwrap();
  s.create_or_update(id(1), EditSet::new().set("a", "2")).await.unwrap();
  s.create_or_update(id(2), EditSet::new().set("b", "1")).await.unwrap();

  let first: Vec<_> = s.export_all().await.unwrap().collect();
  let second: Vec<_> = s.export_all().await.unwrap().collect();
  assert_eq!(first.len(), 3);
  assert_eq!(first, second);
  assert!(first.iter().any(|r| r.id == 2 && r.data == r#"{"b":"1"}"#));
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_to_one_id_lose_nothing() {
  const WRITERS: usize = 32;
  let s = Arc::new(store());

  let handles: Vec<_> = (0..WRITERS)
    .map(|i| {
      let s = s.clone();
      tokio::spawn(async move {
        s.create_or_update(id(1), EditSet::new().set(format!("k{i}"), "v"))
          .await
      })
    })
    .collect();
  for h in handles {
    h.await.unwrap().unwrap();
  }

  let rows = s.list_versions(id(1)).await.unwrap();
  assert_eq!(rows.len(), WRITERS);
  let latest = rows.last().unwrap();
  for i in 0..WRITERS {
    assert!(latest.data.contains_key(&format!("k{i}")), "lost edit k{i}");
  }
}
