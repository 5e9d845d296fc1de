//! Encoding and decoding helpers between core record types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored in the core's compact `YYYYMMDDhhmmss` form and the
//! field map as a compact JSON object.

use timetravel_core::record::{FieldMap, RecordId, RecordVersion, StoredRow, Timestamp};

use crate::{Error, Result};

/// Column list shared by every `SELECT` over `records`.
pub const COLUMNS: &str = "id, version, start_dt, end_dt, data";

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_ts(ts: Timestamp) -> String { ts.to_string() }

pub fn decode_ts(s: &str) -> Result<Timestamp> { Ok(Timestamp::parse(s)?) }

pub fn encode_data(data: &FieldMap) -> Result<String> { Ok(serde_json::to_string(data)?) }

pub fn decode_data(s: &str) -> Result<FieldMap> { Ok(serde_json::from_str(s)?) }

pub fn decode_version(raw: i64) -> Result<u32> {
  u32::try_from(raw)
    .ok()
    .filter(|v| *v > 0)
    .ok_or(Error::VersionRange(raw))
}

// ─── Row type ────────────────────────────────────────────────────────────────

/// Raw values read directly from a `records` row.
pub struct RawRow {
  pub id:      i64,
  pub version: i64,
  pub start:   String,
  pub end:     Option<String>,
  pub data:    String,
}

impl RawRow {
  /// Map a row selected with [`COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:      row.get(0)?,
      version: row.get(1)?,
      start:   row.get(2)?,
      end:     row.get(3)?,
      data:    row.get(4)?,
    })
  }

  pub fn into_version(self) -> Result<RecordVersion> {
    Ok(RecordVersion {
      id:      RecordId::new(self.id)?,
      version: decode_version(self.version)?,
      start:   decode_ts(&self.start)?,
      end:     self.end.as_deref().map(decode_ts).transpose()?,
      data:    decode_data(&self.data)?,
    })
  }

  pub fn into_stored(self) -> StoredRow {
    StoredRow {
      id:      self.id,
      version: self.version,
      start:   self.start,
      end:     self.end,
      data:    self.data,
    }
  }
}
