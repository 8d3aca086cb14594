// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference editor for `map` fields.
//!
//! Entries are string → string. Adding trims both sides and requires both to
//! be non-empty; an existing key is overwritten. Every accepted edit builds a
//! new map and hands it to `on_change`; the previous value is never touched.

use prefs_schema::Field;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Placeholder shown when the map has no entries.
pub const NO_ENTRIES: &str = "No entries yet";

fn label(field: &Field, names: [&str; 2], fallback: &str) -> String {
    names
        .iter()
        .find_map(|n| field.option_str(n))
        .unwrap_or(fallback)
        .to_owned()
}

fn entries_of(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect()
}

/// Render-only snapshot of a map field.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    /// Entries in stable (key) order.
    pub entries: Vec<(String, String)>,
    /// Label above the key input.
    pub key_label: String,
    /// Label above the value input.
    pub value_label: String,
    /// Add button text.
    pub add_label: String,
    /// Shown instead of the list when empty.
    pub placeholder: Option<&'static str>,
}

impl MapView {
    /// Snapshot `value` (absent or non-object reads as empty).
    pub fn new(field: &Field, value: Option<&Value>) -> Self {
        let entries: Vec<_> = entries_of(value).into_iter().collect();
        Self {
            placeholder: entries.is_empty().then_some(NO_ENTRIES),
            entries,
            key_label: label(field, ["key_label", "keyLabel"], "Key"),
            value_label: label(field, ["value_label", "valueLabel"], "Value"),
            add_label: label(field, ["add_button_label", "addButtonLabel"], "Add"),
        }
    }
}

/// Keys the editor reacts to while composing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    /// Confirm: same as pressing Add.
    Enter,
    /// Clear both pending inputs.
    Escape,
    /// Anything else.
    Other,
}

/// Interactive map editor.
pub struct MapEditor<F> {
    entries: BTreeMap<String, String>,
    pending_key: String,
    pending_value: String,
    view: MapView,
    on_change: F,
}

impl<F> MapEditor<F>
where
    F: FnMut(Value),
{
    /// Editor over the current value of `field`.
    pub fn new(field: &Field, value: Option<&Value>, on_change: F) -> Self {
        Self {
            entries: entries_of(value),
            pending_key: String::new(),
            pending_value: String::new(),
            view: MapView::new(field, value),
            on_change,
        }
    }

    /// Current entries.
    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Labels and placeholder for the current entries.
    pub fn view(&self) -> &MapView {
        &self.view
    }

    /// Pending key input.
    pub fn set_pending_key(&mut self, text: impl Into<String>) {
        self.pending_key = text.into();
    }

    /// Pending value input.
    pub fn set_pending_value(&mut self, text: impl Into<String>) {
        self.pending_value = text.into();
    }

    /// Pending inputs, as typed.
    pub fn pending(&self) -> (&str, &str) {
        (&self.pending_key, &self.pending_value)
    }

    /// Whether Add is enabled.
    pub fn can_add(&self) -> bool {
        !self.pending_key.trim().is_empty() && !self.pending_value.trim().is_empty()
    }

    /// Insert the pending entry. Returns `false` (and changes nothing) when disabled.
    pub fn add(&mut self) -> bool {
        if !self.can_add() {
            return false;
        }
        let mut next = self.entries.clone();
        next.insert(
            self.pending_key.trim().to_owned(),
            self.pending_value.trim().to_owned(),
        );
        self.pending_key.clear();
        self.pending_value.clear();
        self.commit(next);
        true
    }

    /// Remove `key`. Returns `false` when it was not present.
    pub fn delete(&mut self, key: &str) -> bool {
        if !self.entries.contains_key(key) {
            return false;
        }
        let mut next = self.entries.clone();
        next.remove(key);
        self.commit(next);
        true
    }

    /// Keyboard handling while an input has focus.
    pub fn key_press(&mut self, key: EditorKey) -> bool {
        match key {
            EditorKey::Enter => self.add(),
            EditorKey::Escape => {
                self.pending_key.clear();
                self.pending_value.clear();
                false
            }
            EditorKey::Other => false,
        }
    }

    /// Current entries as a JSON object.
    pub fn value(&self) -> Value {
        to_value(&self.entries)
    }

    fn commit(&mut self, next: BTreeMap<String, String>) {
        let value = to_value(&next);
        self.view.entries = next.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.view.placeholder = next.is_empty().then_some(NO_ENTRIES);
        self.entries = next;
        (self.on_change)(value);
    }
}

fn to_value(entries: &BTreeMap<String, String>) -> Value {
    let map: Map<String, Value> = entries
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefs_dry_tests::FieldBuilder;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tags() -> Field {
        FieldBuilder::new("tags", "map").build()
    }

    fn recording(value: Option<&Value>) -> (MapEditor<impl FnMut(Value)>, Rc<RefCell<Vec<Value>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let editor = MapEditor::new(&tags(), value, move |v| sink.borrow_mut().push(v));
        (editor, seen)
    }

    #[test]
    fn adding_same_entry_twice_keeps_one() {
        let (mut ed, seen) = recording(None);
        for _ in 0..2 {
            ed.set_pending_key("a");
            ed.set_pending_value("1");
            assert!(ed.add());
        }
        assert_eq!(ed.value(), json!({"a": "1"}));
        assert_eq!(seen.borrow().last(), Some(&json!({"a": "1"})));
    }

    #[test]
    fn blank_key_or_value_is_rejected() {
        let (mut ed, seen) = recording(Some(&json!({"x": "y"})));
        for (k, v) in [(" ", "1"), ("a", ""), ("", ""), ("a", "   ")] {
            ed.set_pending_key(k);
            ed.set_pending_value(v);
            assert!(!ed.can_add());
            assert!(!ed.add());
            assert!(!ed.key_press(EditorKey::Enter));
        }
        assert_eq!(ed.value(), json!({"x": "y"}));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn entries_are_trimmed_and_duplicates_overwrite() {
        let (mut ed, _) = recording(Some(&json!({"color": "red"})));
        ed.set_pending_key("  color ");
        ed.set_pending_value(" blue\t");
        assert!(ed.key_press(EditorKey::Enter));
        assert_eq!(ed.value(), json!({"color": "blue"}));
        assert_eq!(ed.pending(), ("", ""));
    }

    #[test]
    fn previous_value_is_never_mutated() {
        let original = json!({"a": "1"});
        let (mut ed, seen) = recording(Some(&original));
        ed.set_pending_key("b");
        ed.set_pending_value("2");
        ed.add();
        assert!(ed.delete("a"));
        assert_eq!(original, json!({"a": "1"}));
        assert_eq!(
            *seen.borrow(),
            vec![json!({"a": "1", "b": "2"}), json!({"b": "2"})]
        );
        assert!(!ed.delete("missing"));
    }

    #[test]
    fn view_labels_default_and_placeholder_tracks_emptiness() {
        let (mut ed, _) = recording(Some(&json!({"k": "v"})));
        assert_eq!(ed.view().key_label, "Key");
        assert_eq!(ed.view().value_label, "Value");
        assert_eq!(ed.view().add_label, "Add");
        assert_eq!(ed.view().placeholder, None);
        ed.delete("k");
        assert_eq!(ed.view().placeholder, Some(NO_ENTRIES));
    }

    #[test]
    fn custom_labels_and_non_string_values() {
        let field = FieldBuilder::new("env", "map")
            .option("keyLabel", json!("Variable"))
            .option("add_button_label", json!("Set"))
            .build();
        let view = MapView::new(&field, Some(&json!({"n": 3, "s": "x"})));
        assert_eq!(view.key_label, "Variable");
        assert_eq!(view.add_label, "Set");
        assert_eq!(
            view.entries,
            vec![("n".into(), "3".into()), ("s".into(), "x".into())]
        );
        assert_eq!(MapView::new(&field, Some(&json!("junk"))).placeholder, Some(NO_ENTRIES));
    }

    #[test]
    fn escape_clears_pending_inputs() {
        let (mut ed, _) = recording(None);
        ed.set_pending_key("a");
        ed.set_pending_value("b");
        assert!(!ed.key_press(EditorKey::Escape));
        assert_eq!(ed.pending(), ("", ""));
        assert!(!ed.key_press(EditorKey::Other));
    }
}
