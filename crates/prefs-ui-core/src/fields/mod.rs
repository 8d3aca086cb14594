// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Field dispatch: a field's `type` tag selects the editor contract.
//!
//! Each [`FieldKind`] knows the empty value of its type, how to check a
//! proposed value and how to describe its editor as a [`Widget`]. Tags with
//! no registered kind render as [`Widget::Unknown`] instead of failing.

mod builtin;
mod map;

pub use builtin::{
    Button, Checkbox, Choice, ChoiceStyle, List, MapKind, Number, PathPicker, Secret, Text,
};
pub use map::{EditorKey, MapEditor, MapView, NO_ENTRIES};

use prefs_schema::Field;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// A proposed value was refused by the field's editor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    /// Value has the wrong JSON type for this field.
    #[error("field `{key}` expects {expected}")]
    WrongShape {
        /// Field key.
        key: String,
        /// Expected shape, for messages.
        expected: &'static str,
    },
    /// Number outside the declared bounds.
    #[error("field `{key}`: {value} is outside [{min}, {max}]")]
    OutOfRange {
        /// Field key.
        key: String,
        /// Rejected value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Choice not among the declared options.
    #[error("field `{key}`: `{value}` is not one of the options")]
    NotAnOption {
        /// Field key.
        key: String,
        /// Rejected value.
        value: String,
    },
    /// Secret fields only take host-sealed envelopes (or empty to clear).
    #[error("field `{0}` only accepts a value sealed by the host")]
    NotSealed(String),
    /// Map entry with a blank or untrimmed key or value.
    #[error("field `{key}`: entry `{entry}` must have a trimmed, non-empty key and value")]
    BadEntry {
        /// Field key.
        key: String,
        /// Offending entry key.
        entry: String,
    },
    /// Buttons carry no value.
    #[error("field `{0}` does not hold a value")]
    NoValue(String),
}

impl FieldError {
    pub(crate) fn shape(field: &Field, expected: &'static str) -> Self {
        Self::WrongShape {
            key: field.key.clone(),
            expected,
        }
    }
}

/// One selectable option of a dropdown or radio group.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    /// Display text.
    pub label: String,
    /// Stored value.
    pub value: String,
}

/// Description of an editor, independent of any toolkit.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    /// Single-line text input.
    Text {
        /// Current text.
        value: String,
    },
    /// Secret input; only ever shows whether a sealed value is stored.
    Secret {
        /// A sealed value is present.
        has_value: bool,
    },
    /// Numeric input.
    Number {
        /// Current value.
        value: Option<f64>,
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
    /// Boolean toggle.
    Checkbox {
        /// Current state.
        checked: bool,
    },
    /// One-of-many selection.
    Choice {
        /// Dropdown or radio group.
        style: ChoiceStyle,
        /// Options in declared order.
        options: Vec<ChoiceOption>,
        /// Currently stored value.
        selected: Option<String>,
    },
    /// Path chosen through the host's open dialog.
    Path {
        /// Current path.
        value: Option<String>,
        /// Directory rather than file.
        directory: bool,
    },
    /// Host-side action.
    Button {
        /// Button text.
        label: String,
        /// Click channel.
        channel: String,
    },
    /// Ordered list of strings.
    List {
        /// Current items.
        items: Vec<String>,
    },
    /// Key/value map editor.
    Map(MapView),
    /// No editor registered for this type tag; shown inert.
    Unknown {
        /// The unrecognised tag.
        type_tag: String,
    },
}

/// Render-ready description of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    /// Field key.
    pub key: String,
    /// Label.
    pub label: String,
    /// Help text.
    pub help: Option<String>,
    /// Editor.
    pub widget: Widget,
}

/// Editor contract for one field type.
pub trait FieldKind: Send + Sync {
    /// Dispatch tag this kind handles (the field's `type`).
    fn type_tag(&self) -> &'static str;
    /// Value used when the document has none.
    fn empty_value(&self) -> Value;
    /// Check a proposed value before it enters the document.
    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError>;
    /// Describe the editor for the current value (absent means empty).
    fn render(&self, field: &Field, value: Option<&Value>) -> Widget;
}

/// Type tag → [`FieldKind`].
pub struct FieldRegistry {
    kinds: HashMap<&'static str, Box<dyn FieldKind>>,
    reported: Mutex<BTreeSet<String>>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FieldRegistry {
    /// Registry with no kinds.
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
            reported: Mutex::new(BTreeSet::new()),
        }
    }

    /// Registry with every built-in kind.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register(Text);
        reg.register(Secret);
        reg.register(Number);
        reg.register(Checkbox);
        reg.register(Choice::dropdown());
        reg.register(Choice::radio());
        reg.register(PathPicker::file());
        reg.register(PathPicker::directory());
        reg.register(Button);
        reg.register(List);
        reg.register(MapKind);
        reg
    }

    /// Add or replace the kind for its tag.
    pub fn register<K: FieldKind + 'static>(&mut self, kind: K) {
        self.kinds.insert(kind.type_tag(), Box::new(kind));
    }

    /// Kind registered for `tag`.
    pub fn get(&self, tag: &str) -> Option<&dyn FieldKind> {
        self.kinds.get(tag).map(AsRef::as_ref)
    }

    /// Tags that have a kind, sorted.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.kinds.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Render `field` with its current value.
    pub fn render(&self, field: &Field, value: Option<&Value>) -> FieldView {
        let widget = match self.get(field.dispatch_key()) {
            Some(kind) => kind.render(field, value),
            None => {
                self.report_unknown(field);
                Widget::Unknown {
                    type_tag: field.dispatch_key().to_owned(),
                }
            }
        };
        FieldView {
            key: field.key.clone(),
            label: field.label.clone(),
            help: field.help.clone(),
            widget,
        }
    }

    /// Validate a value for `field`. Unknown tags accept nothing.
    pub fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        match self.get(field.dispatch_key()) {
            Some(kind) => kind.validate(field, value),
            None => {
                self.report_unknown(field);
                Err(FieldError::NoValue(field.key.clone()))
            }
        }
    }

    /// Empty value for `field`, `null` for unknown tags.
    pub fn empty_value(&self, field: &Field) -> Value {
        self.get(field.dispatch_key())
            .map_or(Value::Null, |kind| kind.empty_value())
    }

    fn report_unknown(&self, field: &Field) {
        let tag = field.dispatch_key();
        let first = self
            .reported
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tag.to_owned());
        if first {
            warn!(type_tag = tag, key = %field.key, "no editor for field type; rendering inert");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefs_dry_tests::FieldBuilder;
    use serde_json::json;

    #[test]
    fn builtins_cover_every_documented_tag() {
        let reg = FieldRegistry::with_builtins();
        assert_eq!(
            reg.tags(),
            vec![
                "button", "checkbox", "directory", "dropdown", "file", "list", "map", "number",
                "radio", "secret", "text"
            ]
        );
    }

    #[test]
    fn unknown_tag_renders_inert_and_refuses_values() {
        let reg = FieldRegistry::with_builtins();
        let field = FieldBuilder::new("c", "color").label("Colour").build();
        let view = reg.render(&field, Some(&json!("#fff")));
        assert_eq!(view.label, "Colour");
        assert_eq!(
            view.widget,
            Widget::Unknown {
                type_tag: "color".into()
            }
        );
        assert!(reg.validate(&field, &json!("#fff")).is_err());
        assert_eq!(reg.empty_value(&field), Value::Null);
    }

    #[test]
    fn custom_kind_can_replace_builtin() {
        struct Upper;
        impl FieldKind for Upper {
            fn type_tag(&self) -> &'static str {
                "text"
            }
            fn empty_value(&self) -> Value {
                json!("")
            }
            fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
                match value.as_str() {
                    Some(s) if s == s.to_uppercase() => Ok(()),
                    _ => Err(FieldError::shape(field, "upper-case text")),
                }
            }
            fn render(&self, _field: &Field, value: Option<&Value>) -> Widget {
                Widget::Text {
                    value: value.and_then(Value::as_str).unwrap_or_default().to_uppercase(),
                }
            }
        }
        let mut reg = FieldRegistry::with_builtins();
        reg.register(Upper);
        let field = FieldBuilder::new("n", "text").build();
        assert!(reg.validate(&field, &json!("abc")).is_err());
        assert!(reg.validate(&field, &json!("ABC")).is_ok());
    }
}
