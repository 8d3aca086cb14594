// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-side collaborators the hub calls out to.
//!
//! Windowing and native dialogs belong to the embedding application; the hub
//! only sees these ports. Save and click notifications go through an
//! ordered listener registry so several subscribers can observe the same
//! event.

use prefs_app_core::Preferences;
use prefs_session_proto::{DialogOptions, OpenDialogResult};
use tracing::{debug, info};

/// Native open dialog.
pub trait DialogPort: Send + Sync {
    /// Show the dialog for `replica` and return the selection.
    fn show_open_dialog(&self, replica: u64, options: &DialogOptions) -> OpenDialogResult;
}

/// Window lifecycle for preference surfaces.
pub trait WindowPort: Send + Sync {
    /// Close the surface backing `replica`.
    fn close(&self, replica: u64);
}

/// Dialog port for hosts without a display: every dialog is cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessDialog;

impl DialogPort for HeadlessDialog {
    fn show_open_dialog(&self, replica: u64, options: &DialogOptions) -> OpenDialogResult {
        debug!(replica, title = ?options.title, "no display; cancelling open dialog");
        OpenDialogResult::Cancelled
    }
}

/// Window port that only records the request in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWindow;

impl WindowPort for LogWindow {
    fn close(&self, replica: u64) {
        info!(replica, "preference surface closed");
    }
}

type SaveListener = Box<dyn Fn(&Preferences) + Send + Sync>;
type ClickListener = Box<dyn Fn(&str) + Send + Sync>;

/// Ordered listener lists for host-observable events.
#[derive(Default)]
pub struct HostEvents {
    save: Vec<SaveListener>,
    click: Vec<ClickListener>,
}

impl HostEvents {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe every accepted write, after it has been persisted.
    pub fn on_save<F>(&mut self, listener: F)
    where
        F: Fn(&Preferences) + Send + Sync + 'static,
    {
        self.save.push(Box::new(listener));
    }

    /// Observe button clicks; the listener receives the channel identifier.
    pub fn on_click<F>(&mut self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.click.push(Box::new(listener));
    }

    pub(crate) fn emit_save(&self, doc: &Preferences) {
        for listener in &self.save {
            listener(doc);
        }
    }

    pub(crate) fn emit_click(&self, channel: &str) {
        if self.click.is_empty() {
            debug!(channel, "button click with no listeners");
        }
        for listener in &self.click {
            listener(channel);
        }
    }
}

/// Everything the hub needs from the embedding application.
pub struct HostPorts {
    /// Native dialog.
    pub dialog: Box<dyn DialogPort>,
    /// Window lifecycle.
    pub window: Box<dyn WindowPort>,
    /// Save/click listeners.
    pub events: HostEvents,
}

impl Default for HostPorts {
    fn default() -> Self {
        Self {
            dialog: Box::new(HeadlessDialog),
            window: Box::new(LogWindow),
            events: HostEvents::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn listeners_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut events = HostEvents::new();
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            events.on_click(move |channel| seen.lock().unwrap().push(format!("{tag}:{channel}")));
        }
        events.emit_click("do-action-on-main");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:do-action-on-main", "second:do-action-on-main"]
        );
    }

    #[test]
    fn headless_dialog_cancels() {
        let out = HeadlessDialog.show_open_dialog(1, &DialogOptions::default());
        assert_eq!(out, OpenDialogResult::Cancelled);
    }
}
