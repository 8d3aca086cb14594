// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Builders for sections and fields.

use prefs_schema::{Field, Section};
use serde_json::{Map, Value};

/// Builder for [`Field`].
pub struct FieldBuilder {
    field: Field,
}

impl FieldBuilder {
    /// Field with the given key and dispatch tag; label defaults to the key.
    pub fn new(key: &str, kind: &str) -> Self {
        Self {
            field: Field {
                key: key.into(),
                kind: kind.into(),
                label: key.into(),
                help: None,
                style: Default::default(),
                options: Map::new(),
            },
        }
    }

    /// Set the label.
    pub fn label(mut self, label: &str) -> Self {
        self.field.label = label.into();
        self
    }

    /// Set help text.
    pub fn help(mut self, help: &str) -> Self {
        self.field.help = Some(help.into());
        self
    }

    /// Add a type-specific option.
    pub fn option(mut self, name: &str, value: Value) -> Self {
        self.field.options.insert(name.into(), value);
        self
    }

    /// Finish.
    pub fn build(self) -> Field {
        self.field
    }
}

/// Builder for [`Section`].
pub struct SectionBuilder {
    section: Section,
}

impl SectionBuilder {
    /// Enabled section whose label and icon default to the id.
    pub fn new(id: &str) -> Self {
        Self {
            section: Section {
                id: id.into(),
                label: id.into(),
                icon: id.into(),
                enabled: None,
                fields: Vec::new(),
            },
        }
    }

    /// Set the explicit enabled flag.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.section.enabled = Some(enabled);
        self
    }

    /// Set the icon name.
    pub fn icon(mut self, icon: &str) -> Self {
        self.section.icon = icon.into();
        self
    }

    /// Append a field.
    pub fn field(mut self, field: Field) -> Self {
        self.section.fields.push(field);
        self
    }

    /// Append a `map` field.
    pub fn map_field(self, key: &str) -> Self {
        self.field(FieldBuilder::new(key, "map").build())
    }

    /// Append a `text` field.
    pub fn text_field(self, key: &str) -> Self {
        self.field(FieldBuilder::new(key, "text").build())
    }

    /// Finish.
    pub fn build(self) -> Section {
        self.section
    }
}
