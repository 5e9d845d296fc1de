//! [`SqliteBackend`] — the SQLite implementation of [`Backend`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use timetravel_core::{
  backend::{Backend, CloseVersion},
  record::{RecordId, RecordVersion, StoredRow},
};

use crate::{
  Error, Result,
  encode::{COLUMNS, RawRow, encode_data, encode_ts},
  schema::SCHEMA,
};

const INSERT: &str = "INSERT INTO records (id, version, start_dt, end_dt, data)
   VALUES (?1, ?2, ?3, ?4, ?5)
   ON CONFLICT (id, version) DO NOTHING";

const CLOSE: &str = "UPDATE records SET end_dt = ?1
   WHERE id = ?2 AND version = ?3 AND end_dt IS NULL";

/// Column values for one `INSERT`, encoded up front so the closure handed to
/// the connection thread owns everything it touches.
struct Insert {
  id:      i64,
  version: i64,
  start:   String,
  end:     Option<String>,
  data:    String,
}

impl Insert {
  fn encode(row: &RecordVersion) -> Result<Self> {
    Ok(Self {
      id:      row.id.get(),
      version: i64::from(row.version),
      start:   encode_ts(row.start),
      end:     row.end.map(encode_ts),
      data:    encode_data(&row.data)?,
    })
  }

  /// Returns `false` if the key was already taken.
  fn run(&self, conn: &rusqlite::Connection) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
      INSERT,
      rusqlite::params![self.id, self.version, self.start, self.end, self.data],
    )?;
    Ok(inserted == 1)
  }
}

enum Commit {
  Done,
  NotOpen(RecordId, u32),
  Duplicate,
}

// ─── Backend ─────────────────────────────────────────────────────────────────

/// A version store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteBackend {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteBackend {
  /// Open (or create) a database at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    tracing::debug!(?path, "opened sqlite store");
    let backend = Self { conn };
    backend.init_schema().await?;
    Ok(backend)
  }

  /// Open an in-memory database — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let backend = Self { conn };
    backend.init_schema().await?;
    Ok(backend)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn select(&self, sql: String, id: i64) -> Result<Vec<RawRow>> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }
}

impl Backend for SqliteBackend {
  type Error = Error;

  async fn insert_version(&self, row: RecordVersion) -> Result<()> {
    let (id, version) = (row.id, row.version);
    let insert = Insert::encode(&row)?;

    let inserted = self.conn.call(move |conn| Ok(insert.run(conn)?)).await?;
    if !inserted {
      return Err(Error::Duplicate(id, version));
    }
    Ok(())
  }

  async fn update_end(&self, close: CloseVersion) -> Result<()> {
    let end = encode_ts(close.end);
    let id = close.id.get();
    let version = i64::from(close.version);

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(CLOSE, rusqlite::params![end, id, version])?))
      .await?;
    if changed == 0 {
      return Err(Error::NotOpen(close.id, close.version));
    }
    Ok(())
  }

  async fn read_latest(&self, id: RecordId) -> Result<Option<RecordVersion>> {
    let sql = format!(
      "SELECT {COLUMNS} FROM records WHERE id = ?1 ORDER BY version DESC LIMIT 1"
    );
    self
      .select(sql, id.get())
      .await?
      .into_iter()
      .next()
      .map(RawRow::into_version)
      .transpose()
  }

  async fn read_one(&self, id: RecordId, version: u32) -> Result<Option<RecordVersion>> {
    let sql = format!("SELECT {COLUMNS} FROM records WHERE id = ?1 AND version = ?2");
    let key = (id.get(), i64::from(version));

    let raw: Option<RawRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![key.0, key.1], RawRow::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRow::into_version).transpose()
  }

  async fn read_all(&self, id: RecordId) -> Result<Vec<RecordVersion>> {
    let sql = format!("SELECT {COLUMNS} FROM records WHERE id = ?1 ORDER BY version ASC");
    self
      .select(sql, id.get())
      .await?
      .into_iter()
      .map(RawRow::into_version)
      .collect()
  }

  async fn read_everything(&self) -> Result<Vec<StoredRow>> {
    let sql = format!("SELECT {COLUMNS} FROM records");
    let raws: Vec<RawRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawRow::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawRow::into_stored).collect())
  }

  /// Close and insert inside one transaction; either both rows change or
  /// neither does.
  async fn commit_append(
    &self,
    close: Option<CloseVersion>,
    next: RecordVersion,
  ) -> Result<()> {
    let (id, version) = (next.id, next.version);
    let insert = Insert::encode(&next)?;
    let close_params = close.map(|c| (encode_ts(c.end), c.id, c.version));

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Some((end, close_id, close_version)) = close_params {
          let changed = tx.execute(
            CLOSE,
            rusqlite::params![end, close_id.get(), i64::from(close_version)],
          )?;
          if changed == 0 {
            return Ok(Commit::NotOpen(close_id, close_version));
          }
        }
        if !insert.run(&tx)? {
          return Ok(Commit::Duplicate);
        }
        tx.commit()?;
        Ok(Commit::Done)
      })
      .await?;

    match outcome {
      Commit::Done => Ok(()),
      Commit::Duplicate => {
        tracing::warn!(%id, version, "append rolled back: version already stored");
        Err(Error::Duplicate(id, version))
      }
      Commit::NotOpen(close_id, close_version) => {
        tracing::warn!(
          id = %close_id,
          version = close_version,
          "append rolled back: predecessor missing or already closed"
        );
        Err(Error::NotOpen(close_id, close_version))
      }
    }
  }
}
