//! Version chain rules.
//!
//! A chain for one id is numbered `1..=N` with no gaps. Only version `N` is
//! open (`end == None`), and every closed version ends at the exact instant
//! its successor starts. The functions here derive new versions that keep
//! those rules and check stored chains against them. None of them do I/O.

use crate::{
  Error, Result,
  backend::CloseVersion,
  patch,
  record::{EditSet, FieldMap, RecordId, RecordVersion, Timestamp},
};

/// The two writes that move a chain forward by one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
  pub close: CloseVersion,
  pub next:  RecordVersion,
}

/// Version 1 of a new chain, open-ended.
pub fn first(id: RecordId, fields: FieldMap, at: Timestamp) -> RecordVersion {
  RecordVersion { id, version: 1, start: at, end: None, data: fields }
}

/// Close `current` at `at` and derive its successor by applying `edits`.
///
/// The close instant is never earlier than `current.start`, so a clock that
/// steps backwards cannot produce an inverted interval.
pub fn successor(
  current: &RecordVersion,
  edits: &EditSet,
  at: Timestamp,
) -> Result<Transition> {
  check_latest(current)?;

  let version = current
    .version
    .checked_add(1)
    .ok_or_else(|| inconsistent(current.id, "version counter exhausted"))?;
  let end = at.max(current.start);

  Ok(Transition {
    close: CloseVersion { id: current.id, version: current.version, end },
    next:  RecordVersion {
      id: current.id,
      version,
      start: end,
      end: None,
      data: patch::apply(&current.data, edits),
    },
  })
}

/// The highest stored version must still be open.
pub fn check_latest(row: &RecordVersion) -> Result<()> {
  match row.end {
    None => Ok(()),
    Some(end) => Err(inconsistent(
      row.id,
      format!(
        "latest version {} was closed at {end} but has no successor",
        row.version
      ),
    )),
  }
}

/// Check a full chain, as returned by a substrate's ordered scan.
pub fn verify(id: RecordId, rows: &[RecordVersion]) -> Result<()> {
  for (idx, row) in rows.iter().enumerate() {
    if row.id != id {
      return Err(inconsistent(
        id,
        format!("row for record {} found in chain", row.id),
      ));
    }

    let expected = u32::try_from(idx + 1)
      .map_err(|_| inconsistent(id, "chain longer than the version space"))?;
    if row.version != expected {
      return Err(inconsistent(
        id,
        format!("expected version {expected}, found {}", row.version),
      ));
    }

    match (row.end, rows.get(idx + 1)) {
      (None, Some(_)) => {
        return Err(inconsistent(
          id,
          format!("version {} is open but is not the latest", row.version),
        ));
      }
      (Some(end), Some(next)) if next.start != end => {
        return Err(inconsistent(
          id,
          format!(
            "version {} ends at {end} but version {} starts at {}",
            row.version, next.version, next.start
          ),
        ));
      }
      (Some(_), None) => check_latest(row)?,
      _ => {}
    }
  }
  Ok(())
}

fn inconsistent(id: RecordId, reason: impl Into<String>) -> Error {
  Error::ChainInconsistency { id, reason: reason.into() }
}
