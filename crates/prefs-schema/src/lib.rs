// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Static description of preference sections and fields.
//!
//! The schema is plain data: icons and styles are symbolic and resolved by
//! the UI through its own registries. Nothing in a [`SchemaDocument`] is ever
//! evaluated on the receiving side.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Current version of the serialized schema format.
pub const SCHEMA_FORMAT: u32 = 1;

/// A named, ordered group of fields shown together in the UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Section {
    /// Stable identifier; also the key into the preferences document.
    pub id: String,
    /// Human-readable label.
    pub label: String,
    /// Symbolic icon name, resolved by the UI.
    #[serde(default)]
    pub icon: String,
    /// `Some(false)` hides the section; absent means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Fields in display order.
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Section {
    /// A section is enabled unless explicitly disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled != Some(false)
    }

    /// Look up a field by key.
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// A single named, typed preference value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Field {
    /// Key within the owning section's preference mapping.
    pub key: String,
    /// Dispatch tag into the field registry (e.g. `"text"`, `"map"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Optional help text rendered under the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Inline style hints; values may be strings or numbers (`{"width": 100}`).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub style: Map<String, Value>,
    /// Type-specific options (choices, labels, dialog filters, ...).
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl Field {
    /// Key used by the field dispatch registry.
    pub fn dispatch_key(&self) -> &str {
        &self.kind
    }

    /// String-valued option, if present.
    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(Value::as_str)
    }

    /// Numeric option, if present.
    pub fn option_f64(&self, name: &str) -> Option<f64> {
        self.options.get(name).and_then(Value::as_f64)
    }
}

/// Schema validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Two sections share an id.
    #[error("duplicate section id `{0}`")]
    DuplicateSection(String),
    /// Two fields in one section share a key.
    #[error("duplicate field key `{key}` in section `{section}`")]
    DuplicateField {
        /// Owning section.
        section: String,
        /// Repeated key.
        key: String,
    },
    /// Section id is empty.
    #[error("section id must not be empty")]
    EmptySectionId,
    /// Serialized schema uses a format this build does not understand.
    #[error("unsupported schema format {0}")]
    UnsupportedFormat(u32),
    /// Schema JSON could not be parsed.
    #[error("malformed schema: {0}")]
    Malformed(String),
}

/// Serialized form of the schema as carried across the process boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaDocument {
    /// Format version; see [`SCHEMA_FORMAT`].
    pub format: u32,
    /// Ordered sections.
    pub sections: Vec<Section>,
}

impl SchemaDocument {
    /// Wrap sections in the current format.
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            format: SCHEMA_FORMAT,
            sections,
        }
    }

    /// Check the format version and section/field uniqueness, returning the sections.
    pub fn into_sections(self) -> Result<Vec<Section>, SchemaError> {
        if self.format != SCHEMA_FORMAT {
            return Err(SchemaError::UnsupportedFormat(self.format));
        }
        validate(&self.sections)?;
        Ok(self.sections)
    }

    /// Parse a JSON schema file (either a bare section array or a full document).
    pub fn from_json(bytes: &[u8]) -> Result<Self, SchemaError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        let doc = if value.is_array() {
            let sections: Vec<Section> = serde_json::from_value(value)
                .map_err(|e| SchemaError::Malformed(e.to_string()))?;
            Self::new(sections)
        } else {
            serde_json::from_value(value).map_err(|e| SchemaError::Malformed(e.to_string()))?
        };
        Ok(doc)
    }
}

fn validate(sections: &[Section]) -> Result<(), SchemaError> {
    let mut ids = HashSet::new();
    for section in sections {
        if section.id.is_empty() {
            return Err(SchemaError::EmptySectionId);
        }
        if !ids.insert(section.id.as_str()) {
            return Err(SchemaError::DuplicateSection(section.id.clone()));
        }
        let mut keys = HashSet::new();
        for field in &section.fields {
            if !keys.insert(field.key.as_str()) {
                return Err(SchemaError::DuplicateField {
                    section: section.id.clone(),
                    key: field.key.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Keep only enabled sections, preserving order.
pub fn enabled_sections(sections: &[Section]) -> Vec<Section> {
    sections.iter().filter(|s| s.is_enabled()).cloned().collect()
}

/// Host-owned registry of the current schema.
///
/// UI replicas never hold one of these; they receive [`SchemaDocument`]s over
/// the push channel. Mutation is host-only via [`SchemaRegistry::replace`].
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    sections: Vec<Section>,
    revision: u64,
}

impl SchemaRegistry {
    /// Build a registry after validating uniqueness constraints.
    pub fn new(sections: Vec<Section>) -> Result<Self, SchemaError> {
        validate(&sections)?;
        Ok(Self {
            sections,
            revision: 0,
        })
    }

    /// All sections in declaration order (including disabled ones).
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Find a section by id.
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Find a field by section id and key.
    pub fn field(&self, section: &str, key: &str) -> Option<&Field> {
        self.section(section).and_then(|s| s.field(key))
    }

    /// Ids of enabled sections in order.
    pub fn enabled_ids(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| s.id.clone())
            .collect()
    }

    /// Number of successful [`replace`](Self::replace) calls.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the whole schema. The previous schema is kept on error.
    pub fn replace(&mut self, sections: Vec<Section>) -> Result<(), SchemaError> {
        validate(&sections)?;
        self.sections = sections;
        self.revision += 1;
        Ok(())
    }

    /// Serialize the current schema for transport.
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument::new(self.sections.clone())
    }
}
