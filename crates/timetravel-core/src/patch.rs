//! Merge-patch: derive a new field map from a prior one and an [`EditSet`].

use crate::record::{Edit, EditSet, FieldMap};

/// Apply `edits` to `base` and return the resulting map.
///
/// `base` is never touched; the result is always a fresh copy. Deleting a
/// field that `base` does not have is a no-op.
pub fn apply(base: &FieldMap, edits: &EditSet) -> FieldMap {
  let mut result = base.clone();
  for (field, edit) in edits.iter() {
    match edit {
      Edit::Set(value) => {
        result.insert(field.clone(), value.clone());
      }
      Edit::Delete => {
        result.remove(field);
      }
    }
  }
  result
}
