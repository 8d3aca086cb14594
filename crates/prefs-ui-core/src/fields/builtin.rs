// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Built-in field kinds.

use prefs_app_core::SEALED_PREFIX;
use prefs_schema::Field;
use serde_json::{json, Value};

use super::map::MapView;
use super::{ChoiceOption, FieldError, FieldKind, Widget};

fn string_of(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_owned)
}

/// `text`: free-form string.
pub struct Text;

impl FieldKind for Text {
    fn type_tag(&self) -> &'static str {
        "text"
    }

    fn empty_value(&self) -> Value {
        json!("")
    }

    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        if value.is_string() {
            Ok(())
        } else {
            Err(FieldError::shape(field, "a string"))
        }
    }

    fn render(&self, _field: &Field, value: Option<&Value>) -> Widget {
        Widget::Text {
            value: string_of(value).unwrap_or_default(),
        }
    }
}

/// `secret`: holds the host-sealed envelope, never plaintext.
pub struct Secret;

impl FieldKind for Secret {
    fn type_tag(&self) -> &'static str {
        "secret"
    }

    fn empty_value(&self) -> Value {
        json!("")
    }

    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        match value.as_str() {
            Some(s) if s.is_empty() || s.starts_with(SEALED_PREFIX) => Ok(()),
            Some(_) => Err(FieldError::NotSealed(field.key.clone())),
            None => Err(FieldError::shape(field, "a sealed string")),
        }
    }

    fn render(&self, _field: &Field, value: Option<&Value>) -> Widget {
        Widget::Secret {
            has_value: value.and_then(Value::as_str).is_some_and(|s| !s.is_empty()),
        }
    }
}

/// `number`: optional `min`/`max` options bound the value.
pub struct Number;

impl FieldKind for Number {
    fn type_tag(&self) -> &'static str {
        "number"
    }

    fn empty_value(&self) -> Value {
        Value::Null
    }

    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        let n = value
            .as_f64()
            .ok_or_else(|| FieldError::shape(field, "a number"))?;
        let min = field.option_f64("min").unwrap_or(f64::NEG_INFINITY);
        let max = field.option_f64("max").unwrap_or(f64::INFINITY);
        if n < min || n > max {
            return Err(FieldError::OutOfRange {
                key: field.key.clone(),
                value: n,
                min,
                max,
            });
        }
        Ok(())
    }

    fn render(&self, field: &Field, value: Option<&Value>) -> Widget {
        Widget::Number {
            value: value.and_then(Value::as_f64),
            min: field.option_f64("min"),
            max: field.option_f64("max"),
        }
    }
}

/// `checkbox`: boolean.
pub struct Checkbox;

impl FieldKind for Checkbox {
    fn type_tag(&self) -> &'static str {
        "checkbox"
    }

    fn empty_value(&self) -> Value {
        json!(false)
    }

    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        if value.is_boolean() {
            Ok(())
        } else {
            Err(FieldError::shape(field, "a boolean"))
        }
    }

    fn render(&self, _field: &Field, value: Option<&Value>) -> Widget {
        Widget::Checkbox {
            checked: value.and_then(Value::as_bool).unwrap_or(false),
        }
    }
}

/// How a [`Choice`] is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceStyle {
    /// Drop-down list (`dropdown`).
    Dropdown,
    /// Radio group (`radio`).
    Radio,
}

/// `dropdown` / `radio`: one of the declared `options`.
///
/// Options are `{label, value}` objects or bare strings (label = value).
pub struct Choice {
    style: ChoiceStyle,
}

impl Choice {
    /// The `dropdown` kind.
    pub fn dropdown() -> Self {
        Self {
            style: ChoiceStyle::Dropdown,
        }
    }

    /// The `radio` kind.
    pub fn radio() -> Self {
        Self {
            style: ChoiceStyle::Radio,
        }
    }

    fn options(field: &Field) -> Vec<ChoiceOption> {
        let Some(Value::Array(items)) = field.options.get("options") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(ChoiceOption {
                    label: s.clone(),
                    value: s.clone(),
                }),
                Value::Object(o) => {
                    let value = o.get("value")?.as_str()?.to_owned();
                    let label = o
                        .get("label")
                        .and_then(Value::as_str)
                        .map_or_else(|| value.clone(), str::to_owned);
                    Some(ChoiceOption { label, value })
                }
                _ => None,
            })
            .collect()
    }
}

impl FieldKind for Choice {
    fn type_tag(&self) -> &'static str {
        match self.style {
            ChoiceStyle::Dropdown => "dropdown",
            ChoiceStyle::Radio => "radio",
        }
    }

    fn empty_value(&self) -> Value {
        Value::Null
    }

    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        let chosen = value
            .as_str()
            .ok_or_else(|| FieldError::shape(field, "an option value"))?;
        if Self::options(field).iter().any(|o| o.value == chosen) {
            Ok(())
        } else {
            Err(FieldError::NotAnOption {
                key: field.key.clone(),
                value: chosen.to_owned(),
            })
        }
    }

    fn render(&self, field: &Field, value: Option<&Value>) -> Widget {
        Widget::Choice {
            style: self.style,
            options: Self::options(field),
            selected: string_of(value),
        }
    }
}

/// `file` / `directory`: a path picked through the host dialog.
pub struct PathPicker {
    directory: bool,
}

impl PathPicker {
    /// The `file` kind.
    pub fn file() -> Self {
        Self { directory: false }
    }

    /// The `directory` kind.
    pub fn directory() -> Self {
        Self { directory: true }
    }
}

impl FieldKind for PathPicker {
    fn type_tag(&self) -> &'static str {
        if self.directory {
            "directory"
        } else {
            "file"
        }
    }

    fn empty_value(&self) -> Value {
        json!("")
    }

    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        if value.is_string() {
            Ok(())
        } else {
            Err(FieldError::shape(field, "a path"))
        }
    }

    fn render(&self, _field: &Field, value: Option<&Value>) -> Widget {
        Widget::Path {
            value: string_of(value).filter(|s| !s.is_empty()),
            directory: self.directory,
        }
    }
}

/// `button`: triggers a host handler; stores nothing.
pub struct Button;

impl Button {
    /// Click channel: the `channel` option, else the field key.
    pub fn channel(field: &Field) -> &str {
        field.option_str("channel").unwrap_or(&field.key)
    }
}

impl FieldKind for Button {
    fn type_tag(&self) -> &'static str {
        "button"
    }

    fn empty_value(&self) -> Value {
        Value::Null
    }

    fn validate(&self, field: &Field, _value: &Value) -> Result<(), FieldError> {
        Err(FieldError::NoValue(field.key.clone()))
    }

    fn render(&self, field: &Field, _value: Option<&Value>) -> Widget {
        Widget::Button {
            label: field
                .option_str("button_label")
                .unwrap_or(&field.label)
                .to_owned(),
            channel: Self::channel(field).to_owned(),
        }
    }
}

/// `list`: ordered strings.
pub struct List;

impl FieldKind for List {
    fn type_tag(&self) -> &'static str {
        "list"
    }

    fn empty_value(&self) -> Value {
        json!([])
    }

    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        match value {
            Value::Array(items) if items.iter().all(Value::is_string) => Ok(()),
            _ => Err(FieldError::shape(field, "a list of strings")),
        }
    }

    fn render(&self, _field: &Field, value: Option<&Value>) -> Widget {
        let items = match value {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
            _ => Vec::new(),
        };
        Widget::List { items }
    }
}

/// `map`: string → string entries, edited through [`super::MapEditor`].
pub struct MapKind;

impl FieldKind for MapKind {
    fn type_tag(&self) -> &'static str {
        "map"
    }

    fn empty_value(&self) -> Value {
        json!({})
    }

    // Same rules the editor applies on add: trimmed, non-empty key and value.
    fn validate(&self, field: &Field, value: &Value) -> Result<(), FieldError> {
        let Value::Object(entries) = value else {
            return Err(FieldError::shape(field, "a map of strings"));
        };
        for (k, v) in entries {
            let Some(v) = v.as_str() else {
                return Err(FieldError::shape(field, "a map of strings"));
            };
            let clean = |s: &str| !s.is_empty() && s.trim() == s;
            if !clean(k) || !clean(v) {
                return Err(FieldError::BadEntry {
                    key: field.key.clone(),
                    entry: k.clone(),
                });
            }
        }
        Ok(())
    }

    fn render(&self, field: &Field, value: Option<&Value>) -> Widget {
        Widget::Map(MapView::new(field, value))
    }
}
