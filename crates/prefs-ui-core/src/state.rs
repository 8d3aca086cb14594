// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pure state transitions for a preferences window (sections, active section, replica document).

use prefs_app_core::Preferences;
use prefs_schema::{enabled_sections, Section};
use serde_json::Value;

/// Replica-side view state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    sections: Vec<Section>,
    active: Option<String>,
    preferences: Preferences,
}

/// Inputs to [`reduce`].
#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Host pushed a new schema.
    SectionsUpdated(Vec<Section>),
    /// Host pushed a new canonical document.
    PreferencesUpdated(Preferences),
    /// A field editor accepted a new value.
    FieldEdited {
        /// Section id.
        section: String,
        /// Field key.
        key: String,
        /// New value.
        value: Value,
    },
    /// Sidebar click.
    SectionSelected(String),
}

/// Side effects requested by [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    /// Hand the full document to the debounced writer.
    Persist(Preferences),
}

/// Give every enabled section in `sections` an entry in `doc`.
pub fn reconcile(sections: &[Section], mut doc: Preferences) -> Preferences {
    doc.ensure_sections(
        sections
            .iter()
            .filter(|s| s.is_enabled())
            .map(|s| s.id.as_str()),
    );
    doc
}

impl UiState {
    /// Initial load: enabled sections only, first one active, empty entries filled in.
    ///
    /// Filled-in entries are not persisted until an actual edit happens.
    pub fn load(sections: &[Section], preferences: Preferences) -> Self {
        let sections = enabled_sections(sections);
        let active = sections.first().map(|s| s.id.clone());
        let preferences = reconcile(&sections, preferences);
        Self {
            sections,
            active,
            preferences,
        }
    }

    /// Enabled sections in schema order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Id of the selected section, if any section is enabled.
    pub fn active_section(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The selected section.
    pub fn active(&self) -> Option<&Section> {
        let id = self.active.as_deref()?;
        self.sections.iter().find(|s| s.id == id)
    }

    /// Local copy of the document.
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }
}

/// Apply one event, returning the next state and any effects to run.
pub fn reduce(ui: &UiState, ev: UiEvent) -> (UiState, Vec<UiEffect>) {
    let mut next = ui.clone();
    let mut fx = Vec::new();
    match ev {
        UiEvent::SectionsUpdated(all) => {
            next.sections = enabled_sections(&all);
            next.preferences = reconcile(&next.sections, next.preferences);
            let still_there = next
                .active
                .as_deref()
                .is_some_and(|id| next.sections.iter().any(|s| s.id == id));
            if !still_there {
                next.active = next.sections.first().map(|s| s.id.clone());
            }
        }
        UiEvent::PreferencesUpdated(doc) => {
            // wholesale replacement; local unsaved edits lose to the push
            next.preferences = reconcile(&next.sections, doc);
        }
        UiEvent::FieldEdited {
            section,
            key,
            value,
        } => {
            next.preferences = next.preferences.with_field(&section, &key, value);
            fx.push(UiEffect::Persist(next.preferences.clone()));
        }
        UiEvent::SectionSelected(id) => {
            if next.sections.iter().any(|s| s.id == id) {
                next.active = Some(id);
            }
        }
    }
    (next, fx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefs_dry_tests::SectionBuilder;
    use proptest::prelude::*;
    use serde_json::json;

    fn doc(v: Value) -> Preferences {
        Preferences::from_value(v).unwrap()
    }

    #[test]
    fn load_filters_disabled_and_fills_entries() {
        let sections = vec![
            SectionBuilder::new("a").enabled(false).build(),
            SectionBuilder::new("b").build(),
            SectionBuilder::new("c").enabled(true).build(),
        ];
        let ui = UiState::load(&sections, doc(json!({"a": {"x": 1}})));
        let ids: Vec<_> = ui.sections().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
        assert_eq!(ui.active_section(), Some("b"));
        assert_eq!(
            ui.preferences(),
            &doc(json!({"a": {"x": 1}, "b": {}, "c": {}}))
        );
    }

    #[test]
    fn load_with_no_enabled_sections_has_no_active() {
        let ui = UiState::load(&[SectionBuilder::new("a").enabled(false).build()], Preferences::new());
        assert_eq!(ui.active_section(), None);
        assert!(ui.active().is_none());
    }

    #[test]
    fn active_section_falls_back_to_first_enabled() {
        let ui = UiState::load(
            &[
                SectionBuilder::new("A").build(),
                SectionBuilder::new("B").enabled(false).build(),
            ],
            Preferences::new(),
        );
        assert_eq!(ui.active_section(), Some("A"));

        let (ui, fx) = reduce(
            &ui,
            UiEvent::SectionsUpdated(vec![
                SectionBuilder::new("B").enabled(true).build(),
                SectionBuilder::new("C").build(),
            ]),
        );
        assert!(fx.is_empty());
        assert_eq!(ui.active_section(), Some("B"));
        assert!(ui.preferences().contains_section("C"));
    }

    #[test]
    fn sections_update_keeps_active_when_still_enabled() {
        let ui = UiState::load(
            &[SectionBuilder::new("a").build(), SectionBuilder::new("b").build()],
            Preferences::new(),
        );
        let (ui, _) = reduce(&ui, UiEvent::SectionSelected("b".into()));
        let (ui, _) = reduce(
            &ui,
            UiEvent::SectionsUpdated(vec![
                SectionBuilder::new("z").build(),
                SectionBuilder::new("b").build(),
            ]),
        );
        assert_eq!(ui.active_section(), Some("b"));
    }

    #[test]
    fn sections_update_to_nothing_clears_active() {
        let ui = UiState::load(&[SectionBuilder::new("a").build()], Preferences::new());
        let (ui, _) = reduce(&ui, UiEvent::SectionsUpdated(vec![]));
        assert_eq!(ui.active_section(), None);
    }

    #[test]
    fn field_edit_copies_section_and_requests_persist() {
        let ui = UiState::load(&[SectionBuilder::new("g").build()], doc(json!({"g": {"k": 1}})));
        let before = ui.preferences().clone();
        let (next, fx) = reduce(
            &ui,
            UiEvent::FieldEdited {
                section: "g".into(),
                key: "j".into(),
                value: json!(2),
            },
        );
        let expected = doc(json!({"g": {"k": 1, "j": 2}}));
        assert_eq!(next.preferences(), &expected);
        assert_eq!(fx, vec![UiEffect::Persist(expected)]);
        assert_eq!(ui.preferences(), &before);
    }

    #[test]
    fn pushed_preferences_replace_local_copy() {
        let ui = UiState::load(&[SectionBuilder::new("g").build()], Preferences::new());
        let (ui, _) = reduce(
            &ui,
            UiEvent::FieldEdited {
                section: "g".into(),
                key: "local".into(),
                value: json!(true),
            },
        );
        let (ui, fx) = reduce(&ui, UiEvent::PreferencesUpdated(doc(json!({"g": {"remote": 1}}))));
        assert!(fx.is_empty());
        assert_eq!(ui.preferences(), &doc(json!({"g": {"remote": 1}})));
    }

    #[test]
    fn selecting_unknown_section_is_ignored() {
        let ui = UiState::load(&[SectionBuilder::new("a").build()], Preferences::new());
        let (next, fx) = reduce(&ui, UiEvent::SectionSelected("nope".into()));
        assert_eq!(next, ui);
        assert!(fx.is_empty());
    }

    fn arb_section() -> impl Strategy<Value = Section> {
        ("[a-e]", proptest::option::of(any::<bool>())).prop_map(|(id, enabled)| {
            let b = SectionBuilder::new(&id);
            match enabled {
                Some(e) => b.enabled(e).build(),
                None => b.build(),
            }
        })
    }

    fn arb_doc() -> impl Strategy<Value = Preferences> {
        proptest::collection::btree_map("[a-h]", proptest::collection::btree_map("[xy]", 0i64..3, 0..3), 0..5)
            .prop_map(|m| {
                m.into_iter()
                    .map(|(id, fields)| {
                        let values = fields.into_iter().map(|(k, v)| (k, json!(v))).collect();
                        (id, values)
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn reconcile_covers_every_enabled_section(
            sections in proptest::collection::vec(arb_section(), 0..6),
            d in arb_doc(),
        ) {
            let out = reconcile(&sections, d.clone());
            for s in sections.iter().filter(|s| s.is_enabled()) {
                prop_assert!(out.contains_section(&s.id));
            }
            // existing entries are never altered
            for (id, values) in d.iter() {
                prop_assert_eq!(out.section(id), Some(values));
            }
        }

        #[test]
        fn active_section_is_always_enabled_or_empty(
            first in proptest::collection::vec(arb_section(), 0..6),
            second in proptest::collection::vec(arb_section(), 0..6),
        ) {
            let ui = UiState::load(&first, Preferences::new());
            let (ui, _) = reduce(&ui, UiEvent::SectionsUpdated(second.clone()));
            match ui.active_section() {
                Some(id) => prop_assert!(second.iter().any(|s| s.id == id && s.is_enabled())),
                None => prop_assert!(second.iter().all(|s| !s.is_enabled())),
            }
        }
    }
}
