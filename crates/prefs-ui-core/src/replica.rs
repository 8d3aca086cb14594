// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One preferences window: state reducer, debounced writer and field
//! registry wired to a [`PreferencesApi`].

use prefs_app_core::{Config, Preferences};
use prefs_schema::{Field, Section};
use prefs_session_client::{ChannelError, PreferencesApi, PushEvent, PushKind};
use prefs_session_proto::{DialogOptions, DialogProperty, FileFilter, OpenDialogResult};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::debounce::{DebouncedWriter, SaveState};
use crate::fields::{Button, FieldError, FieldRegistry, FieldView};
use crate::icons::IconRegistry;
use crate::state::{reduce, UiEffect, UiEvent, UiState};

/// Failures of replica operations. Local state is unchanged when one is returned.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// Host round trip failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// The field editor refused the value.
    #[error(transparent)]
    Field(#[from] FieldError),
    /// No such field in an enabled section.
    #[error("no field `{key}` in section `{section}`")]
    UnknownField {
        /// Section id.
        section: String,
        /// Field key.
        key: String,
    },
    /// The field exists but does not support the operation.
    #[error("field `{key}` is a `{type_tag}` field")]
    WrongKind {
        /// Field key.
        key: String,
        /// Its type tag.
        type_tag: String,
    },
}

/// Sidebar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarItem {
    /// Section id.
    pub id: String,
    /// Label.
    pub label: String,
    /// Resolved icon asset.
    pub icon: String,
    /// Currently selected.
    pub active: bool,
}

/// A UI replica of the host's preferences.
pub struct Replica<A> {
    api: Arc<A>,
    ui: UiState,
    config: Config,
    writer: DebouncedWriter,
    fields: FieldRegistry,
    icons: IconRegistry,
    last_push: Option<u64>,
}

impl<A> Replica<A>
where
    A: PreferencesApi + 'static,
{
    /// Initial load with the built-in field kinds and default icons.
    pub async fn load(api: Arc<A>) -> Result<Self, ChannelError> {
        Self::load_with(api, FieldRegistry::with_builtins(), IconRegistry::default()).await
    }

    /// Initial load: sections, preferences and config are fetched once.
    pub async fn load_with(
        api: Arc<A>,
        fields: FieldRegistry,
        icons: IconRegistry,
    ) -> Result<Self, ChannelError> {
        let sections = api.get_sections().await?;
        let preferences = api.get_preferences().await?;
        let config = api.get_config().await?;
        api.apply_config(&config);
        let ui = UiState::load(&sections, preferences);
        let writer = DebouncedWriter::spawn(Arc::clone(&api), config.debounce());
        info!(
            sections = ui.sections().len(),
            active = ?ui.active_section(),
            debounce_ms = config.debounce,
            "preferences replica loaded"
        );
        Ok(Self {
            api,
            ui,
            config,
            writer,
            fields,
            icons,
            last_push: None,
        })
    }

    fn dispatch(&mut self, ev: UiEvent) {
        let (next, fx) = reduce(&self.ui, ev);
        self.ui = next;
        for effect in fx {
            match effect {
                UiEffect::Persist(doc) => self.writer.propose(doc),
            }
        }
    }

    /// Apply a host push. Returns `false` for stale or non-state events.
    pub fn apply_push(&mut self, event: PushEvent) -> bool {
        if let PushKind::WriteRejected(err) = &event.kind {
            warn!(code = %err.name, message = %err.message, "host rejected our write");
            self.writer.mark_rejected(err.message.clone());
            return false;
        }
        if self.last_push.is_some_and(|last| event.ts <= last) {
            debug!(ts = event.ts, last = ?self.last_push, "ignoring stale push");
            return false;
        }
        self.last_push = Some(event.ts);
        let ev = match event.kind {
            PushKind::PreferencesUpdated(doc) => {
                // the pushed document wins over edits not yet written
                self.writer.discard();
                UiEvent::PreferencesUpdated(doc)
            }
            PushKind::SectionsUpdated(sections) => UiEvent::SectionsUpdated(sections),
            PushKind::WriteRejected(_) => return false,
        };
        self.dispatch(ev);
        true
    }

    /// Field `key` of enabled section `section`.
    pub fn field(&self, section: &str, key: &str) -> Option<&Field> {
        self.ui
            .sections()
            .iter()
            .find(|s| s.id == section)
            .and_then(|s| s.field(key))
    }

    fn require_field(&self, section: &str, key: &str) -> Result<Field, ReplicaError> {
        self.field(section, key)
            .cloned()
            .ok_or_else(|| ReplicaError::UnknownField {
                section: section.to_owned(),
                key: key.to_owned(),
            })
    }

    /// Local edit: validated by the field's editor, applied at once, persisted after the debounce window.
    pub fn edit(&mut self, section: &str, key: &str, value: Value) -> Result<(), ReplicaError> {
        let field = self.require_field(section, key)?;
        self.fields.validate(&field, &value)?;
        self.dispatch(UiEvent::FieldEdited {
            section: section.to_owned(),
            key: key.to_owned(),
            value,
        });
        Ok(())
    }

    /// Select a sidebar section. Unknown or disabled ids are ignored.
    pub fn select_section(&mut self, id: &str) -> bool {
        self.dispatch(UiEvent::SectionSelected(id.to_owned()));
        self.ui.active_section() == Some(id)
    }

    /// Seal `plaintext` on the host and store the envelope.
    pub async fn set_secret(
        &mut self,
        section: &str,
        key: &str,
        plaintext: &str,
    ) -> Result<(), ReplicaError> {
        let field = self.require_field(section, key)?;
        if field.dispatch_key() != "secret" {
            return Err(wrong_kind(&field));
        }
        let sealed = self.api.encrypt(plaintext).await?;
        self.edit(section, key, Value::String(sealed))
    }

    /// Let the user pick a path for a `file`/`directory` field.
    ///
    /// Returns `false` when the dialog was cancelled.
    pub async fn choose_path(&mut self, section: &str, key: &str) -> Result<bool, ReplicaError> {
        let field = self.require_field(section, key)?;
        let property = match field.dispatch_key() {
            "file" => DialogProperty::OpenFile,
            "directory" => DialogProperty::OpenDirectory,
            _ => return Err(wrong_kind(&field)),
        };
        let filters: Vec<FileFilter> = field
            .options
            .get("filters")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let options = DialogOptions {
            title: Some(field.label.clone()),
            default_path: self
                .ui
                .preferences()
                .value(section, key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            button_label: field.option_str("button_label").map(str::to_owned),
            filters,
            properties: vec![property],
        };
        match self.api.show_open_dialog(options).await? {
            OpenDialogResult::Selected(paths) => match paths.into_iter().next() {
                Some(path) => {
                    self.edit(section, key, Value::String(path))?;
                    Ok(true)
                }
                None => Ok(false),
            },
            OpenDialogResult::Cancelled => Ok(false),
        }
    }

    /// Press a `button` field.
    pub fn click(&self, section: &str, key: &str) -> Result<(), ReplicaError> {
        let field = self.require_field(section, key)?;
        if field.dispatch_key() != "button" {
            return Err(wrong_kind(&field));
        }
        self.api.send_button_click(Button::channel(&field))?;
        Ok(())
    }

    /// Sidebar model in schema order.
    pub fn sidebar(&self) -> Vec<SidebarItem> {
        let active = self.ui.active_section();
        self.ui
            .sections()
            .iter()
            .map(|s| SidebarItem {
                id: s.id.clone(),
                label: s.label.clone(),
                icon: self.icons.resolve(&s.icon),
                active: active == Some(s.id.as_str()),
            })
            .collect()
    }

    /// Editors for the selected section.
    pub fn active_fields(&self) -> Vec<FieldView> {
        let Some(section) = self.ui.active() else {
            return Vec::new();
        };
        section
            .fields
            .iter()
            .map(|f| {
                self.fields
                    .render(f, self.ui.preferences().value(&section.id, &f.key))
            })
            .collect()
    }

    /// Current value of one field in the local copy.
    pub fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.ui.preferences().value(section, key)
    }

    /// Enabled sections.
    pub fn sections(&self) -> &[Section] {
        self.ui.sections()
    }

    /// Selected section id.
    pub fn active_section(&self) -> Option<&str> {
        self.ui.active_section()
    }

    /// Local copy of the document.
    pub fn preferences(&self) -> &Preferences {
        self.ui.preferences()
    }

    /// Config fetched at load.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Save status for an indicator.
    pub fn save_state(&self) -> watch::Receiver<SaveState> {
        self.writer.state()
    }

    /// Write any pending edit now.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Flush pending edits, then ask the host to close this window.
    pub async fn close(self) -> Result<(), ChannelError> {
        let Self { api, writer, .. } = self;
        writer.shutdown().await;
        api.close_preferences().await
    }
}

fn wrong_kind(field: &Field) -> ReplicaError {
    ReplicaError::WrongKind {
        key: field.key.clone(),
        type_tag: field.dispatch_key().to_owned(),
    }
}
