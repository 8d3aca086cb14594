// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! UI-facing session adapter: the `PreferencesApi` port plus the push inbox.
//!
//! UI code (reconciler, debounced writer, field editors) depends on these
//! traits only, never on socket framing, so tests can swap in a fake host.

use prefs_app_core::{Config, Preferences};
use prefs_schema::Section;
use prefs_session_proto::{DialogOptions, ErrorPayload, OpenDialogResult};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::ChannelError;

/// Terminus of the debounced writer: a fire-and-forget whole-document write.
pub trait PreferenceSink: Send + Sync {
    /// Queue `doc` for the host. Returns once the frame is handed to the transport.
    fn set_preferences(&self, doc: &Preferences) -> Result<(), ChannelError>;
}

/// Every host operation a UI replica may invoke.
#[allow(async_fn_in_trait)]
pub trait PreferencesApi: PreferenceSink {
    /// Ordered sections (all of them; filtering happens in the replica).
    async fn get_sections(&self) -> Result<Vec<Section>, ChannelError>;
    /// Canonical document with enabled sections filled in.
    async fn get_preferences(&self) -> Result<Preferences, ChannelError>;
    /// Defaults document.
    async fn get_defaults(&self) -> Result<Preferences, ChannelError>;
    /// Process config.
    async fn get_config(&self) -> Result<Config, ChannelError>;
    /// Adopt transport settings (request timeout) from the host's config.
    fn apply_config(&self, _config: &Config) {}
    /// Ask the host to close this surface.
    async fn close_preferences(&self) -> Result<(), ChannelError>;
    /// Show the native open dialog.
    async fn show_open_dialog(
        &self,
        options: DialogOptions,
    ) -> Result<OpenDialogResult, ChannelError>;
    /// Seal a secret on the host.
    async fn encrypt(&self, secret: &str) -> Result<String, ChannelError>;
    /// Invoke the host handler registered under `channel` (fire-and-forget).
    fn send_button_click(&self, channel: &str) -> Result<(), ChannelError>;
}

/// Host-initiated event, in host emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    /// Host logical timestamp; strictly increasing per host.
    pub ts: u64,
    /// Event body.
    pub kind: PushKind,
}

/// Body of a [`PushEvent`].
#[derive(Debug, Clone, PartialEq)]
pub enum PushKind {
    /// Canonical document replaced.
    PreferencesUpdated(Preferences),
    /// Schema replaced (already validated).
    SectionsUpdated(Vec<Section>),
    /// A fire-and-forget write from this replica was rejected.
    WriteRejected(ErrorPayload),
}

/// Sending half handed to the transport reader (or a test host).
pub type PushSender = UnboundedSender<PushEvent>;

/// Ordered queue of push events for one replica.
pub struct PushInbox {
    rx: UnboundedReceiver<PushEvent>,
}

/// Create a connected sender/inbox pair.
pub fn push_channel() -> (PushSender, PushInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, PushInbox { rx })
}

impl PushInbox {
    /// Wait for the next event; `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.rx.recv().await
    }

    /// Drain up to `max` already-delivered events without waiting.
    pub fn drain(&mut self, max: usize) -> Vec<PushEvent> {
        let mut out = Vec::new();
        for _ in 0..max {
            match self.rx.try_recv() {
                Ok(ev) => out.push(ev),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}
