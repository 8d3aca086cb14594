// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Preferences/defaults document: section id -> field key -> value.
//!
//! The document is schema-agnostic. Field values are opaque JSON; only the
//! two-level shape is enforced. Writes are whole-document replacements, so
//! the last full write wins.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Field values for a single section.
pub type SectionValues = Map<String, Value>;

/// Prefix of a host-sealed secret as it appears in a document.
///
/// Only the host can produce values carrying it; replicas store them opaquely.
pub const SEALED_PREFIX: &str = "enc:v1:";

/// Shape violations found while accepting a document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Top-level value is not a mapping.
    #[error("preferences document must be an object, got {0}")]
    NotAnObject(&'static str),
    /// A section entry is not a mapping.
    #[error("section `{section}` must be an object, got {found}")]
    SectionNotAnObject {
        /// Offending section id.
        section: String,
        /// JSON type that was found instead.
        found: &'static str,
    },
}

/// Mapping from section id to that section's field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(BTreeMap<String, SectionValues>);

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Preferences {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the two-level shape of an untyped document.
    ///
    /// Nothing is partially accepted: any section with the wrong shape
    /// rejects the whole document.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let Value::Object(top) = value else {
            return Err(DocumentError::NotAnObject(json_kind(&value)));
        };
        let mut sections = BTreeMap::new();
        for (id, entry) in top {
            match entry {
                Value::Object(fields) => {
                    sections.insert(id, fields);
                }
                other => {
                    return Err(DocumentError::SectionNotAnObject {
                        section: id,
                        found: json_kind(&other),
                    })
                }
            }
        }
        Ok(Self(sections))
    }

    /// Untyped JSON view of the document.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(id, fields)| (id.clone(), Value::Object(fields.clone())))
                .collect(),
        )
    }

    /// Values for one section.
    pub fn section(&self, id: &str) -> Option<&SectionValues> {
        self.0.get(id)
    }

    /// Whether a section entry exists (even if empty).
    pub fn contains_section(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    /// Single field value.
    pub fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.0.get(section).and_then(|s| s.get(key))
    }

    /// Iterate sections in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SectionValues)> {
        self.0.iter()
    }

    /// Number of section entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no section entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert an empty mapping for each id that has no entry yet.
    /// Returns true if anything was inserted.
    pub fn ensure_sections<'a, I>(&mut self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut changed = false;
        for id in ids {
            if !self.0.contains_key(id) {
                self.0.insert(id.to_owned(), SectionValues::new());
                changed = true;
            }
        }
        changed
    }

    /// Fill missing sections and missing field keys from `defaults`.
    ///
    /// Presence-based: existing entries are never touched, even when their
    /// value differs from the default. Returns true if anything was added.
    pub fn merge_defaults(&mut self, defaults: &Preferences) -> bool {
        let mut changed = false;
        for (id, default_fields) in &defaults.0 {
            let fields = self.0.entry(id.clone()).or_insert_with(|| {
                changed = true;
                SectionValues::new()
            });
            for (key, value) in default_fields {
                if !fields.contains_key(key) {
                    fields.insert(key.clone(), value.clone());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Copy of this document with `section.key` set to `value`.
    ///
    /// The section mapping is rebuilt rather than edited in place so earlier
    /// snapshots stay valid.
    pub fn with_field(&self, section: &str, key: &str, value: Value) -> Preferences {
        let mut next = self.clone();
        next.set_field(section, key, value);
        next
    }

    /// Set `section.key`, creating the section entry if needed.
    pub fn set_field(&mut self, section: &str, key: &str, value: Value) {
        let mut fields = self.0.get(section).cloned().unwrap_or_default();
        fields.insert(key.to_owned(), value);
        self.0.insert(section.to_owned(), fields);
    }
}

impl FromIterator<(String, SectionValues)> for Preferences {
    fn from_iter<T: IntoIterator<Item = (String, SectionValues)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
