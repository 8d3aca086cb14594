// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Debounced persistence writer.
//!
//! Every local edit proposes the full document; only the latest proposal is
//! written, once no newer proposal arrived for the configured window.

use prefs_app_core::Preferences;
use prefs_session_client::PreferenceSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Outcome of the most recent write, for a status indicator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveState {
    /// Nothing written yet.
    #[default]
    Idle,
    /// A proposal is waiting for the quiet period.
    Pending,
    /// Latest document handed to the host.
    Saved,
    /// Latest write failed or was rejected; not retried.
    Failed(String),
}

enum Command {
    Propose(Preferences),
    Flush(oneshot::Sender<()>),
    Discard,
    Rejected(String),
}

/// Handle to the writer task. Dropping it flushes the pending document.
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SaveState>,
    task: JoinHandle<()>,
}

impl DebouncedWriter {
    /// Spawn the writer task on the current runtime.
    pub fn spawn<K>(sink: Arc<K>, window: Duration) -> Self
    where
        K: PreferenceSink + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SaveState::Idle);
        let task = tokio::spawn(run(sink, window, rx, state_tx));
        Self { tx, state, task }
    }

    /// Replace the pending document and restart the quiet period.
    pub fn propose(&self, doc: Preferences) {
        if self.tx.send(Command::Propose(doc)).is_err() {
            warn!("debounced writer is gone; edit not persisted");
        }
    }

    /// Write the pending document now, if any.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Drop the pending document without writing it.
    ///
    /// Used when a host push supersedes local edits that have not been written yet.
    pub fn discard(&self) {
        let _ = self.tx.send(Command::Discard);
    }

    /// Record that the host rejected the last write.
    pub fn mark_rejected(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Command::Rejected(reason.into()));
    }

    /// Subscribe to save-state changes.
    pub fn state(&self) -> watch::Receiver<SaveState> {
        self.state.clone()
    }

    /// Flush and wait for the task to finish.
    pub async fn shutdown(self) {
        let Self { tx, task, .. } = self;
        drop(tx);
        if let Err(err) = task.await {
            warn!(%err, "debounced writer task ended abnormally");
        }
    }
}

async fn run<K>(
    sink: Arc<K>,
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<SaveState>,
) where
    K: PreferenceSink + ?Sized,
{
    let mut pending: Option<Preferences> = None;
    let timer = sleep(window);
    tokio::pin!(timer);
    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Propose(doc)) => {
                    pending = Some(doc);
                    timer.as_mut().reset(Instant::now() + window);
                    state.send_replace(SaveState::Pending);
                }
                Some(Command::Flush(done)) => {
                    write(sink.as_ref(), pending.take(), &state);
                    let _ = done.send(());
                }
                Some(Command::Discard) => {
                    if pending.take().is_some() {
                        debug!("pending write superseded by host push");
                        state.send_replace(SaveState::Idle);
                    }
                }
                Some(Command::Rejected(reason)) => {
                    state.send_replace(SaveState::Failed(reason));
                }
                None => {
                    write(sink.as_ref(), pending.take(), &state);
                    return;
                }
            },
            () = &mut timer, if pending.is_some() => {
                write(sink.as_ref(), pending.take(), &state);
            }
        }
    }
}

fn write<K>(sink: &K, doc: Option<Preferences>, state: &watch::Sender<SaveState>)
where
    K: PreferenceSink + ?Sized,
{
    let Some(doc) = doc else { return };
    match sink.set_preferences(&doc) {
        Ok(()) => {
            debug!(sections = doc.len(), "preferences written");
            state.send_replace(SaveState::Saved);
        }
        Err(err) => {
            warn!(%err, "preferences write failed; waiting for the next edit");
            state.send_replace(SaveState::Failed(err.to_string()));
        }
    }
}
