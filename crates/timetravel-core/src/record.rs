//! Record types — identifiers, timestamps, field maps, edit sets and the
//! persisted [`RecordVersion`].
//!
//! A record is a chain of immutable versions. Each version carries a full
//! snapshot of the record's fields plus the interval during which it was the
//! current one.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// A positive integer naming a record. Zero and negative values cannot be
/// constructed.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct RecordId(i64);

impl RecordId {
  pub fn new(raw: i64) -> Result<Self> {
    if raw <= 0 {
      return Err(Error::InvalidIdentifier(format!(
        "record id must be positive, got {raw}"
      )));
    }
    Ok(Self(raw))
  }

  pub fn get(self) -> i64 { self.0 }
}

impl TryFrom<i64> for RecordId {
  type Error = Error;

  fn try_from(raw: i64) -> Result<Self> { Self::new(raw) }
}

impl From<RecordId> for i64 {
  fn from(id: RecordId) -> Self { id.0 }
}

impl FromStr for RecordId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let raw = s.trim().parse::<i64>().map_err(|_| {
      Error::InvalidIdentifier(format!("record id is not an integer: {s:?}"))
    })?;
    Self::new(raw)
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Validate a caller-supplied version number.
pub fn version_number(raw: i64) -> Result<u32> {
  u32::try_from(raw)
    .ok()
    .filter(|v| *v > 0)
    .ok_or_else(|| {
      Error::InvalidIdentifier(format!("version must be positive, got {raw}"))
    })
}

/// Parse a version number from its textual form (e.g. a URL segment).
pub fn parse_version(s: &str) -> Result<u32> {
  let raw = s.trim().parse::<i64>().map_err(|_| {
    Error::InvalidIdentifier(format!("version is not an integer: {s:?}"))
  })?;
  version_number(raw)
}

// ─── Timestamp ───────────────────────────────────────────────────────────────

/// Textual layout of every stored and serialised timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// A UTC instant with whole-second resolution.
///
/// Sub-second precision is dropped on construction so that a value survives
/// a trip through [`TIMESTAMP_FORMAT`] unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
  pub fn now() -> Self { Self::from_datetime(Utc::now()) }

  pub fn from_datetime(dt: DateTime<Utc>) -> Self {
    Self(dt.with_nanosecond(0).unwrap_or(dt))
  }

  pub fn as_datetime(&self) -> DateTime<Utc> { self.0 }

  pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map(|n| Self(n.and_utc()))
  }
}

impl fmt::Display for Timestamp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
  }
}

impl Serialize for Timestamp {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Timestamp {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Self::parse(&s).map_err(serde::de::Error::custom)
  }
}

// ─── Fields and edits ────────────────────────────────────────────────────────

/// The user-visible payload of a record version.
pub type FieldMap = BTreeMap<String, String>;

/// A single field-level instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
  Set(String),
  Delete,
}

impl From<Option<String>> for Edit {
  fn from(value: Option<String>) -> Self {
    match value {
      Some(v) => Self::Set(v),
      None => Self::Delete,
    }
  }
}

/// Field name → [`Edit`]. Deserialises from a JSON object whose values are
/// strings (set) or `null` (delete).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BTreeMap<String, Option<String>>")]
pub struct EditSet(BTreeMap<String, Edit>);

impl EditSet {
  pub fn new() -> Self { Self::default() }

  pub fn set(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
    self.0.insert(field.into(), Edit::Set(value.into()));
    self
  }

  pub fn delete(mut self, field: impl Into<String>) -> Self {
    self.0.insert(field.into(), Edit::Delete);
    self
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Edit)> { self.0.iter() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Keep only the `Set` edits, as plain fields. Deletions are dropped.
  pub fn into_fields(self) -> FieldMap {
    self
      .0
      .into_iter()
      .filter_map(|(field, edit)| match edit {
        Edit::Set(value) => Some((field, value)),
        Edit::Delete => None,
      })
      .collect()
  }
}

impl From<BTreeMap<String, Option<String>>> for EditSet {
  fn from(raw: BTreeMap<String, Option<String>>) -> Self {
    Self(raw.into_iter().map(|(k, v)| (k, Edit::from(v))).collect())
  }
}

impl FromIterator<(String, Edit)> for EditSet {
  fn from_iter<I: IntoIterator<Item = (String, Edit)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

// ─── RecordVersion ───────────────────────────────────────────────────────────

/// One immutable snapshot in a record's history.
///
/// Only `end` ever changes after the row is written, and only once: from
/// `None` (current) to the instant the next version took over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersion {
  pub id:      RecordId,
  pub version: u32,
  #[serde(rename = "start_dt")]
  pub start:   Timestamp,
  #[serde(rename = "end_dt", default, skip_serializing_if = "Option::is_none")]
  pub end:     Option<Timestamp>,
  pub data:    FieldMap,
}

impl RecordVersion {
  pub fn is_current(&self) -> bool { self.end.is_none() }
}

// ─── StoredRow ───────────────────────────────────────────────────────────────

/// A persisted row exactly as the substrate holds it, for bulk export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRow {
  pub id:      i64,
  pub version: i64,
  pub start:   String,
  pub end:     Option<String>,
  /// The serialised field map, verbatim.
  pub data:    String,
}

impl StoredRow {
  pub fn encode(row: &RecordVersion) -> serde_json::Result<Self> {
    Ok(Self {
      id:      row.id.get(),
      version: i64::from(row.version),
      start:   row.start.to_string(),
      end:     row.end.map(|e| e.to_string()),
      data:    serde_json::to_string(&row.data)?,
    })
  }
}
