//! Tri-state message fields.
//!
//! Upstream messages distinguish a field that was not sent from one that was
//! sent empty. Only the latter may clear a stored value.

use serde::{Deserialize, Serialize};

/// A field value as carried by an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum FieldValue<T> {
  /// The message says nothing about this field.
  Unknown,
  /// The message carries a new value.
  Save(T),
  /// The message explicitly clears the field.
  Delete,
}

impl<T> Default for FieldValue<T> {
  fn default() -> Self { Self::Unknown }
}

impl<T> FieldValue<T> {
  pub fn is_unknown(&self) -> bool { matches!(self, Self::Unknown) }

  /// `None` when nothing should change, otherwise the value to store.
  pub fn into_update(self) -> Option<Option<T>> {
    match self {
      Self::Unknown => None,
      Self::Save(v) => Some(Some(v)),
      Self::Delete => Some(None),
    }
  }

  /// The carried value, if the message saves one.
  pub fn saved(&self) -> Option<&T> {
    match self {
      Self::Save(v) => Some(v),
      _ => None,
    }
  }
}
