// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording fake of the host side of a preferences session.
//!
//! [`FakeHost`] answers [`PreferencesApi`] calls from canned state, records
//! every write and click, and can emit pushes into an attached inbox so
//! replica logic can be tested without sockets.

use prefs_app_core::{Config, Preferences};
use prefs_schema::Section;
use prefs_session_client::tool::PushSender;
use prefs_session_client::{
    push_channel, ChannelError, PreferenceSink, PreferencesApi, PushEvent, PushInbox, PushKind,
};
use prefs_session_proto::{DialogOptions, ErrorPayload, OpenDialogResult};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct State {
    sections: Vec<Section>,
    preferences: Preferences,
    defaults: Preferences,
    config: Config,
    applied_config: Option<Config>,
    dialog: Option<OpenDialogResult>,
    writes: Vec<Preferences>,
    clicks: Vec<String>,
    dialogs: Vec<DialogOptions>,
    close_requests: usize,
    request_error: Option<ChannelError>,
    reject_writes: Option<ErrorPayload>,
    transport_down: bool,
    pushes: Option<PushSender>,
    ts: u64,
}

/// Canned, recording [`PreferencesApi`]. Clones share state.
#[derive(Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<State>>,
}

impl FakeHost {
    /// Host with no sections, an empty document and default config.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the schema returned by `get_sections`.
    pub fn with_sections(self, sections: Vec<Section>) -> Self {
        self.lock().sections = sections;
        self
    }

    /// Replace the canonical document returned by `get_preferences`.
    pub fn with_preferences(self, doc: Preferences) -> Self {
        self.lock().preferences = doc;
        self
    }

    /// Replace the defaults document.
    pub fn with_defaults(self, doc: Preferences) -> Self {
        self.lock().defaults = doc;
        self
    }

    /// Replace the config.
    pub fn with_config(self, config: Config) -> Self {
        self.lock().config = config;
        self
    }

    /// Result returned by `show_open_dialog`; cancelled when unset.
    pub fn with_dialog_result(self, result: OpenDialogResult) -> Self {
        self.lock().dialog = Some(result);
        self
    }

    /// Attach a fresh push inbox, replacing any previous one.
    pub fn subscribe(&self) -> PushInbox {
        let (tx, inbox) = push_channel();
        self.lock().pushes = Some(tx);
        inbox
    }

    /// Fail every request-style call with `err` (or stop failing with `None`).
    pub fn fail_requests(&self, err: Option<ChannelError>) {
        self.lock().request_error = err;
    }

    /// Reject subsequent writes: each one produces a `WriteRejected` push.
    pub fn reject_writes(&self, err: Option<ErrorPayload>) {
        self.lock().reject_writes = err;
    }

    /// Make fire-and-forget sends fail as if the transport had closed.
    pub fn set_transport_down(&self, down: bool) {
        self.lock().transport_down = down;
    }

    /// Emit a push with the next host timestamp. Returns that timestamp.
    pub fn push(&self, kind: PushKind) -> u64 {
        let mut st = self.lock();
        st.ts += 1;
        let ts = st.ts;
        if let Some(tx) = &st.pushes {
            let _ = tx.send(PushEvent { ts, kind });
        }
        ts
    }

    /// Replace the canonical document and push it, as another replica's write would.
    pub fn publish_preferences(&self, doc: Preferences) -> u64 {
        self.lock().preferences = doc.clone();
        self.push(PushKind::PreferencesUpdated(doc))
    }

    /// Replace the schema and push it.
    pub fn publish_sections(&self, sections: Vec<Section>) -> u64 {
        self.lock().sections = sections.clone();
        self.push(PushKind::SectionsUpdated(sections))
    }

    /// Every document accepted by `set_preferences`, oldest first.
    pub fn writes(&self) -> Vec<Preferences> {
        self.lock().writes.clone()
    }

    /// Every click channel sent, oldest first.
    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    /// Every dialog request, oldest first.
    pub fn dialogs(&self) -> Vec<DialogOptions> {
        self.lock().dialogs.clone()
    }

    /// Config most recently passed to `apply_config`.
    pub fn applied_config(&self) -> Option<Config> {
        self.lock().applied_config
    }

    /// Number of `close_preferences` calls.
    pub fn close_requests(&self) -> usize {
        self.lock().close_requests
    }

    /// Current canonical document.
    pub fn preferences(&self) -> Preferences {
        self.lock().preferences.clone()
    }

    fn check_request(&self) -> Result<MutexGuard<'_, State>, ChannelError> {
        let st = self.lock();
        match &st.request_error {
            Some(err) => Err(err.clone()),
            None => Ok(st),
        }
    }
}

impl PreferenceSink for FakeHost {
    fn set_preferences(&self, doc: &Preferences) -> Result<(), ChannelError> {
        let rejection = {
            let mut st = self.lock();
            if st.transport_down {
                return Err(ChannelError::Closed);
            }
            match st.reject_writes.clone() {
                Some(err) => Some(err),
                None => {
                    st.writes.push(doc.clone());
                    st.preferences = doc.clone();
                    None
                }
            }
        };
        if let Some(err) = rejection {
            self.push(PushKind::WriteRejected(err));
        }
        Ok(())
    }
}

impl PreferencesApi for FakeHost {
    async fn get_sections(&self) -> Result<Vec<Section>, ChannelError> {
        Ok(self.check_request()?.sections.clone())
    }

    async fn get_preferences(&self) -> Result<Preferences, ChannelError> {
        Ok(self.check_request()?.preferences.clone())
    }

    async fn get_defaults(&self) -> Result<Preferences, ChannelError> {
        Ok(self.check_request()?.defaults.clone())
    }

    async fn get_config(&self) -> Result<Config, ChannelError> {
        Ok(self.check_request()?.config)
    }

    fn apply_config(&self, config: &Config) {
        self.lock().applied_config = Some(*config);
    }

    async fn close_preferences(&self) -> Result<(), ChannelError> {
        self.check_request()?.close_requests += 1;
        Ok(())
    }

    async fn show_open_dialog(
        &self,
        options: DialogOptions,
    ) -> Result<OpenDialogResult, ChannelError> {
        let mut st = self.check_request()?;
        st.dialogs.push(options);
        Ok(st.dialog.clone().unwrap_or(OpenDialogResult::Cancelled))
    }

    async fn encrypt(&self, secret: &str) -> Result<String, ChannelError> {
        drop(self.check_request()?);
        Ok(format!("enc:v1:fake:{secret}"))
    }

    fn send_button_click(&self, channel: &str) -> Result<(), ChannelError> {
        let mut st = self.lock();
        if st.transport_down {
            return Err(ChannelError::Closed);
        }
        st.clicks.push(channel.to_string());
        Ok(())
    }
}
