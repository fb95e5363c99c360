//! Partial-update inputs and the merge documents built from them.
//!
//! Edit endpoints accept sparse JSON.  Each editable field is a
//! [`Patch`], which distinguishes three cases:
//!
//! | JSON                      | `Patch`     | effect on the stored field |
//! |---------------------------|-------------|----------------------------|
//! | field absent              | `Unchanged` | untouched                  |
//! | zero value (`""`)         | `Unchanged` | untouched                  |
//! | `null`                    | `Clear`     | set to the zero value      |
//! | any other value           | `Set(v)`    | overwritten with `v`       |
//!
//! Zero values keep their historical "not supplied" meaning so older
//! clients that always send every field never wipe data; `null` is the
//! explicit way to clear.
//!
//! A [`MergeDocument`] collects the resolved fields into a flat partial
//! document that the metadata store applies as a top-level field merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::metadata::store::Document;

/// Name of the field every merge stamps with the update time.
pub const UPDATED_AT: &str = "updated_at";
/// Name of the field every merge stamps with the updater's id.
pub const UPDATED_BY: &str = "updated_by";

/// Values that can appear in a [`Patch`].
pub trait PatchValue: Sized {
    /// Whether this is the type's zero value.
    fn is_zero(&self) -> bool;
    /// The value a cleared field is stored as.
    fn zero() -> Self;
    /// Convert into the stored JSON representation.
    fn into_json(self) -> Value;
}

impl PatchValue for String {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn zero() -> Self {
        String::new()
    }

    fn into_json(self) -> Value {
        Value::String(self)
    }
}

/// A tri-state field in a partial update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Patch<T> {
    /// Not supplied (or supplied as the zero value).
    #[default]
    Unchanged,
    /// Overwrite with this value.
    Set(T),
    /// Reset to the zero value.
    Clear,
}

impl<T> Patch<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Patch::Unchanged)
    }
}

impl<T: PatchValue> Patch<T> {
    /// Build a patch from a plain value, applying zero-means-absent.
    pub fn from_value(value: T) -> Self {
        if value.is_zero() {
            Patch::Unchanged
        } else {
            Patch::Set(value)
        }
    }

    /// The value to store, or `None` when the field is left alone.
    pub fn resolve(self) -> Option<T> {
        match self {
            Patch::Unchanged => None,
            Patch::Set(v) => Some(v),
            Patch::Clear => Some(T::zero()),
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de> + PatchValue,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Absent fields never reach here; `#[serde(default)]` yields `Unchanged`.
        Ok(match Option::<T>::deserialize(deserializer)? {
            None => Patch::Clear,
            Some(v) => Patch::from_value(v),
        })
    }
}

/// A flat partial document applied with field-level `$set` semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeDocument(Document);

impl MergeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `field` if the patch touches it.
    pub fn apply<T: PatchValue>(&mut self, field: &str, patch: Patch<T>) -> &mut Self {
        if let Some(value) = patch.resolve() {
            self.0.insert(field.to_string(), value.into_json());
        }
        self
    }

    /// Unconditionally set `field`.
    pub fn set(&mut self, field: &str, value: impl Serialize) -> &mut Self {
        // Serializing strings, enums and timestamps into a Value cannot fail.
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.insert(field.to_string(), value);
        self
    }

    /// Force-populate the updater fields so they are never dropped.
    pub fn stamp(&mut self, updated_by: &str, at: DateTime<Utc>) -> &mut Self {
        self.set(UPDATED_AT, at).set(UPDATED_BY, updated_by)
    }

    /// Whether any caller-supplied or stamped field is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

/// Apply `patch` onto `target` as a top-level field merge.
///
/// Fields in `patch` overwrite the target's value entirely (no deep merge);
/// every other field of `target` is left as it was.
pub fn merge_into(target: &mut Document, patch: Document) {
    for (field, value) in patch {
        target.insert(field, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Edit {
        #[serde(default)]
        title: Patch<String>,
        #[serde(default)]
        body: Patch<String>,
    }

    #[test]
    fn test_absent_field_is_unchanged() {
        let edit: Edit = serde_json::from_value(json!({"body": "new"})).unwrap();
        assert_eq!(edit.title, Patch::Unchanged);
        assert_eq!(edit.body, Patch::Set("new".to_string()));
    }

    #[test]
    fn test_zero_value_is_unchanged() {
        let edit: Edit = serde_json::from_value(json!({"title": "", "body": "x"})).unwrap();
        assert_eq!(edit.title, Patch::Unchanged);
    }

    #[test]
    fn test_null_clears() {
        let edit: Edit = serde_json::from_value(json!({"title": null})).unwrap();
        assert_eq!(edit.title, Patch::Clear);
        assert_eq!(edit.title.resolve(), Some(String::new()));
    }

    #[test]
    fn test_merge_document_only_carries_touched_fields() {
        let edit: Edit = serde_json::from_value(json!({"body": "b", "title": ""})).unwrap();
        let mut merge = MergeDocument::new();
        merge.apply("title", edit.title).apply("body", edit.body);
        let doc = merge.into_document();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc["body"], json!("b"));
    }

    #[test]
    fn test_stamp_always_present() {
        let mut merge = MergeDocument::new();
        merge.stamp("u-1", Utc::now());
        assert!(merge.contains(UPDATED_AT));
        assert!(merge.contains(UPDATED_BY));
    }

    #[test]
    fn test_merge_into_is_shallow() {
        let mut target = json!({
            "title": "Old",
            "body": "Keep",
            "nested": {"a": 1, "b": 2}
        })
        .as_object()
        .cloned()
        .unwrap();
        let patch = json!({"title": "New", "nested": {"a": 9}})
            .as_object()
            .cloned()
            .unwrap();

        merge_into(&mut target, patch);

        assert_eq!(target["title"], json!("New"));
        assert_eq!(target["body"], json!("Keep"));
        assert_eq!(target["nested"], json!({"a": 9}));
    }
}
