// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client for talking to the preferences host over Unix sockets
//! (CBOR-framed), plus the UI-facing port (`PreferencesApi`) and push inbox.

use prefs_app_core::{runtime::DEFAULT_REQUEST_TIMEOUT_MS, Config, Preferences};
use prefs_schema::Section;
use prefs_session_proto::{
    wire::{decode_message, encode_message, packet_len, Frame, HEADER_BYTES},
    AckStatus, ButtonClickPayload, DialogOptions, EncryptPayload, HandshakePayload, Message,
    OpenDialogResult, PROTOCOL_VERSION,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

mod error;
pub mod tool;

pub use error::ChannelError;
pub use tool::{push_channel, PreferenceSink, PreferencesApi, PushEvent, PushInbox, PushKind};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Message>>>>;

/// Connected UI replica session.
///
/// A reader task routes correlated replies to their waiting request and
/// everything else to the [`PushInbox`]; a writer task serializes outgoing
/// frames so fire-and-forget sends never block the caller.
pub struct SessionClient {
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_corr: AtomicU64,
    timeout_ms: AtomicU64,
    replica_id: u64,
}

impl SessionClient {
    /// Connect to the host at the given Unix socket path and handshake.
    pub async fn connect(
        path: impl AsRef<Path>,
        label: Option<String>,
    ) -> Result<(Self, PushInbox), ChannelError> {
        let stream = UnixStream::connect(path).await?;
        Self::over(stream, label).await
    }

    /// Run the session over an already-connected stream and handshake.
    pub async fn over<T>(
        stream: T,
        label: Option<String>,
    ) -> Result<(Self, PushInbox), ChannelError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbox, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let pending: Pending = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let (push_tx, inbox) = push_channel();

        tokio::spawn(async move {
            let mut ws = writer;
            while let Some(buf) = rx.recv().await {
                if ws.write_all(&buf).await.is_err() {
                    return;
                }
            }
            // Client dropped: half-close so the host sees EOF and detaches us.
            let _ = ws.shutdown().await;
        });
        tokio::spawn(read_loop(reader, pending.clone(), closed.clone(), push_tx));

        let mut client = Self {
            outbox,
            pending,
            closed,
            next_corr: AtomicU64::new(1),
            timeout_ms: AtomicU64::new(DEFAULT_REQUEST_TIMEOUT_MS),
            replica_id: 0,
        };
        let ack = client
            .request(Message::Handshake(HandshakePayload {
                client_version: PROTOCOL_VERSION,
                label,
            }))
            .await?;
        match ack {
            Message::HandshakeAck(ack) if ack.status == AckStatus::Ok => {
                client.replica_id = ack.replica_id;
            }
            Message::HandshakeAck(ack) => {
                return Err(ack.error.map_or(ChannelError::Closed, ChannelError::Host));
            }
            other => {
                return Err(ChannelError::UnexpectedReply {
                    request: "handshake",
                    got: other.op_name(),
                })
            }
        }
        Ok((client, inbox))
    }

    /// Identifier the host assigned during handshake.
    pub fn replica_id(&self) -> u64 {
        self.replica_id
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Message>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One request/reply round trip. Error replies become [`ChannelError::Host`].
    async fn request(&self, msg: Message) -> Result<Message, ChannelError> {
        let op = msg.op_name();
        let corr = self.next_corr.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(corr, tx);
        if self.closed.load(Ordering::SeqCst) {
            self.lock_pending().remove(&corr);
            return Err(ChannelError::Closed);
        }

        let sent = encode_message(&msg, 0, Some(corr))
            .map_err(ChannelError::from)
            .and_then(|pkt| self.outbox.send(pkt).map_err(|_| ChannelError::Closed));
        if let Err(err) = sent {
            self.lock_pending().remove(&corr);
            return Err(err);
        }

        match tokio::time::timeout(self.timeout(), rx).await {
            Ok(Ok(Message::Error(e))) => Err(ChannelError::Host(e)),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => {
                self.lock_pending().remove(&corr);
                Err(ChannelError::Timeout(op))
            }
        }
    }

    // Carries a correlation id so a host rejection can be attributed, but nobody waits on it.
    fn send(&self, msg: &Message) -> Result<(), ChannelError> {
        let corr = self.next_corr.fetch_add(1, Ordering::Relaxed);
        let pkt = encode_message(msg, 0, Some(corr))?;
        self.outbox.send(pkt).map_err(|_| ChannelError::Closed)
    }
}

fn unexpected(request: &'static str, got: &Message) -> ChannelError {
    ChannelError::UnexpectedReply {
        request,
        got: got.op_name(),
    }
}

impl PreferenceSink for SessionClient {
    fn set_preferences(&self, doc: &Preferences) -> Result<(), ChannelError> {
        self.send(&Message::SetPreferences(doc.to_value()))
    }
}

impl PreferencesApi for SessionClient {
    async fn get_sections(&self) -> Result<Vec<Section>, ChannelError> {
        match self.request(Message::GetSections).await? {
            Message::Sections(doc) => Ok(doc.into_sections()?),
            other => Err(unexpected("get_sections", &other)),
        }
    }

    async fn get_preferences(&self) -> Result<Preferences, ChannelError> {
        match self.request(Message::GetPreferences).await? {
            Message::Preferences(doc) => Ok(doc),
            other => Err(unexpected("get_preferences", &other)),
        }
    }

    async fn get_defaults(&self) -> Result<Preferences, ChannelError> {
        match self.request(Message::GetDefaults).await? {
            Message::Defaults(doc) => Ok(doc),
            other => Err(unexpected("get_defaults", &other)),
        }
    }

    async fn get_config(&self) -> Result<Config, ChannelError> {
        match self.request(Message::GetConfig).await? {
            Message::Config(cfg) => Ok(cfg),
            other => Err(unexpected("get_config", &other)),
        }
    }

    fn apply_config(&self, config: &Config) {
        debug!(timeout_ms = config.request_timeout_ms, "adopting host request timeout");
        self.timeout_ms
            .store(config.request_timeout_ms, Ordering::Relaxed);
    }

    async fn close_preferences(&self) -> Result<(), ChannelError> {
        match self.request(Message::ClosePreferences).await? {
            Message::Closed => Ok(()),
            other => Err(unexpected("close_preferences", &other)),
        }
    }

    async fn show_open_dialog(
        &self,
        options: DialogOptions,
    ) -> Result<OpenDialogResult, ChannelError> {
        match self.request(Message::ShowOpenDialog(options)).await? {
            Message::DialogResult(result) => Ok(result),
            other => Err(unexpected("show_open_dialog", &other)),
        }
    }

    async fn encrypt(&self, secret: &str) -> Result<String, ChannelError> {
        let msg = Message::Encrypt(EncryptPayload {
            secret: secret.to_owned(),
        });
        match self.request(msg).await? {
            Message::Encrypted(p) => Ok(p.ciphertext),
            other => Err(unexpected("encrypt", &other)),
        }
    }

    fn send_button_click(&self, channel: &str) -> Result<(), ChannelError> {
        self.send(&Message::SendButtonClick(ButtonClickPayload {
            channel: channel.to_owned(),
        }))
    }
}

/// Read one frame. Returns Ok(None) when the stream is closed before any bytes are read.
/// Reads until a full frame header is buffered so short reads cannot desynchronize framing.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, ChannelError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_BYTES];
    let mut read = 0usize;
    while read < header.len() {
        let n = reader.read(&mut header[read..]).await?;
        if n == 0 {
            if read == 0 {
                return Ok(None);
            }
            return Err(ChannelError::Io(format!(
                "truncated frame header: read {} of {} bytes",
                read,
                header.len()
            )));
        }
        read += n;
    }
    let total = packet_len(&header)?;
    let mut packet = vec![0u8; total];
    packet[..HEADER_BYTES].copy_from_slice(&header);
    reader.read_exact(&mut packet[HEADER_BYTES..]).await?;
    let (frame, _) = decode_message(&packet)?;
    Ok(Some(frame))
}

async fn read_loop<R>(
    mut reader: R,
    pending: Pending,
    closed: Arc<AtomicBool>,
    pushes: tool::PushSender,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => route(frame, &pending, &pushes),
            Ok(None) => break,
            Err(err) => {
                warn!(?err, "session read failed");
                break;
            }
        }
    }
    // Dropping the senders wakes every waiter with `Closed`.
    closed.store(true, Ordering::SeqCst);
    pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
}

fn route(frame: Frame, pending: &Pending, pushes: &tool::PushSender) {
    if let Some(corr) = frame.corr {
        let waiter = pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&corr);
        if let Some(tx) = waiter {
            let _ = tx.send(frame.message);
            return;
        }
    }
    let kind = match frame.message {
        Message::PreferencesUpdated(doc) => PushKind::PreferencesUpdated(doc),
        Message::SectionsUpdated(doc) => match doc.into_sections() {
            Ok(sections) => PushKind::SectionsUpdated(sections),
            Err(err) => {
                warn!(%err, ts = frame.ts, "dropping unusable sections push");
                return;
            }
        },
        Message::Error(e) => PushKind::WriteRejected(e),
        other => {
            debug!(op = other.op_name(), "ignoring uncorrelated frame");
            return;
        }
    };
    let _ = pushes.send(PushEvent { ts: frame.ts, kind });
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefs_session_proto::{ErrorPayload, HandshakeAckPayload};
    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio::task;

    async fn reply(server: &mut UnixStream, msg: Message, ts: u64, corr: Option<u64>) {
        let pkt = encode_message(&msg, ts, corr).unwrap();
        server.write_all(&pkt).await.unwrap();
    }

    // Accept the handshake on the host end and return the connected client.
    async fn connected() -> (SessionClient, PushInbox, UnixStream) {
        let (client_stream, mut server) = UnixStream::pair().unwrap();
        let client = task::spawn(SessionClient::over(client_stream, Some("test".into())));
        let hello = read_frame(&mut server).await.unwrap().unwrap();
        assert!(matches!(hello.message, Message::Handshake(_)));
        reply(
            &mut server,
            Message::HandshakeAck(HandshakeAckPayload {
                status: AckStatus::Ok,
                server_version: PROTOCOL_VERSION,
                replica_id: 7,
                error: None,
            }),
            0,
            hello.corr,
        )
        .await;
        let (client, inbox) = client.await.unwrap().unwrap();
        (client, inbox, server)
    }

    #[tokio::test]
    async fn read_frame_handles_partial_header_without_losing_bytes() {
        let (mut client_stream, mut server_stream) = UnixStream::pair().unwrap();
        let msg = Message::Error(ErrorPayload::bad_request("partial-header"));
        let encoded = encode_message(&msg, 42, None).unwrap();

        let reader = task::spawn(async move { read_frame(&mut client_stream).await });
        server_stream.write_all(&encoded[..5]).await.unwrap();
        task::yield_now().await;
        server_stream.write_all(&encoded[5..]).await.unwrap();

        let frame = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(frame.ts, 42);
        assert_eq!(frame.message, msg);
    }

    #[tokio::test]
    async fn replies_are_matched_by_correlation_and_pushes_go_to_inbox() {
        let (client, mut inbox, mut server) = connected().await;
        assert_eq!(client.replica_id(), 7);

        let waiter = task::spawn(async move {
            let result = client.get_preferences().await;
            (client, result)
        });
        let req = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(req.message, Message::GetPreferences);

        let pushed = Preferences::from_value(json!({"general": {"a": 1}})).unwrap();
        reply(&mut server, Message::PreferencesUpdated(pushed.clone()), 5, None).await;
        let answer = Preferences::from_value(json!({"general": {}})).unwrap();
        reply(&mut server, Message::Preferences(answer.clone()), 6, req.corr).await;

        let (_client, result) = waiter.await.unwrap();
        assert_eq!(result.unwrap(), answer);
        let ev = inbox.recv().await.unwrap();
        assert_eq!(ev.ts, 5);
        assert_eq!(ev.kind, PushKind::PreferencesUpdated(pushed));
    }

    #[tokio::test]
    async fn rejected_fire_and_forget_write_surfaces_as_push() {
        let (client, mut inbox, mut server) = connected().await;
        client.set_preferences(&Preferences::new()).unwrap();
        let req = read_frame(&mut server).await.unwrap().unwrap();
        assert!(matches!(req.message, Message::SetPreferences(_)));

        let err = ErrorPayload::persist_failed("disk full");
        reply(&mut server, Message::Error(err.clone()), 9, req.corr).await;
        let ev = inbox.recv().await.unwrap();
        assert_eq!(ev.kind, PushKind::WriteRejected(err));
    }

    #[tokio::test]
    async fn host_error_reply_is_reported_to_caller() {
        let (client, _inbox, mut server) = connected().await;
        let waiter = task::spawn(async move { client.encrypt("pw").await });
        let req = read_frame(&mut server).await.unwrap().unwrap();
        let err = ErrorPayload::seal_failed("no key");
        reply(&mut server, Message::Error(err.clone()), 1, req.corr).await;
        assert_eq!(waiter.await.unwrap(), Err(ChannelError::Host(err)));
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let (client, _inbox, _server) = connected().await;
        client.apply_config(&Config {
            request_timeout_ms: 20,
            ..Config::default()
        });
        assert_eq!(
            client.get_config().await,
            Err(ChannelError::Timeout("get_config"))
        );
    }

    #[tokio::test]
    async fn closed_host_fails_pending_requests() {
        let (client, _inbox, server) = connected().await;
        drop(server);
        assert_eq!(client.get_defaults().await, Err(ChannelError::Closed));
    }
}
