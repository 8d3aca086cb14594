// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Connection registry, request dispatch and push fan-out.
//!
//! Every inbound frame is handled while holding the hub lock, so writes and
//! pushes are totally ordered and `set_preferences` calls queue in arrival
//! order. Outbound frames get their timestamp from the same lock.

use anyhow::{anyhow, Result};
use prefs_app_core::{BlobStore, Preferences};
use prefs_schema::Section;
use prefs_session_proto::{
    wire::{decode_message, encode_message, packet_len, Frame, WireError, HEADER_BYTES},
    AckStatus, EncryptedPayload, ErrorPayload, HandshakeAckPayload, Message, PROTOCOL_VERSION,
};
use prefs_store::{PreferenceStore, PreferenceStoreError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::host::HostPorts;

const OUTBOX_DEPTH: usize = 256;

struct ConnState {
    tx: mpsc::Sender<Vec<u8>>,
    label: Option<String>,
    handshaken: bool,
    detached: Arc<Notify>,
}

struct HubState<S> {
    next_conn_id: u64,
    next_ts: u64,
    conns: BTreeMap<u64, ConnState>,
    store: PreferenceStore<S>,
    ports: HostPorts,
    echo_to_origin: bool,
}

impl<S> HubState<S>
where
    S: BlobStore,
{
    fn alloc_ts(&mut self) -> u64 {
        let t = self.next_ts;
        self.next_ts += 1;
        t
    }

    /// Queue `pkt` without waiting. A replica whose outbox is full or gone is
    /// detached so it cannot stall the hub lock for everyone else.
    fn deliver(&mut self, conn_id: u64, pkt: Vec<u8>) -> bool {
        let Some(conn) = self.conns.get(&conn_id) else {
            return false;
        };
        let reason = match conn.tx.try_send(pkt) {
            Ok(()) => return true,
            Err(TrySendError::Full(_)) => "outbox full",
            Err(TrySendError::Closed(_)) => "outbox closed",
        };
        if let Some(conn) = self.conns.remove(&conn_id) {
            warn!(conn_id, label = ?conn.label, reason, "detaching lagging replica");
            conn.detached.notify_one();
        }
        false
    }

    async fn reply(&mut self, conn_id: u64, msg: Message, corr: Option<u64>) -> Result<()> {
        let ts = self.alloc_ts();
        let pkt = encode_message(&msg, ts, corr)?;
        if !self.conns.contains_key(&conn_id) {
            return Err(anyhow!("missing conn {conn_id}"));
        }
        self.deliver(conn_id, pkt);
        Ok(())
    }

    /// Send `msg` to every handshaken replica, skipping `origin` unless echo is on.
    async fn broadcast(&mut self, msg: &Message, origin: Option<u64>) -> Result<()> {
        let ts = self.alloc_ts();
        let pkt = encode_message(msg, ts, None)?;
        let skip = if self.echo_to_origin { None } else { origin };
        let targets: Vec<u64> = self
            .conns
            .iter()
            .filter(|(id, conn)| conn.handshaken && Some(**id) != skip)
            .map(|(id, _)| *id)
            .collect();
        let mut delivered = 0usize;
        for id in targets {
            if self.deliver(id, pkt.clone()) {
                delivered += 1;
            }
        }
        debug!(op = msg.op_name(), ts, delivered, "push fanned out");
        Ok(())
    }

    async fn accepted(&mut self, doc: Preferences, origin: Option<u64>) -> Result<()> {
        self.ports.events.emit_save(&doc);
        self.broadcast(&Message::PreferencesUpdated(doc), origin).await
    }

    async fn handle(&mut self, frame: Frame, conn_id: u64) -> Result<()> {
        let Frame { message, corr, .. } = frame;
        if !matches!(message, Message::Handshake(_))
            && !self.conns.get(&conn_id).is_some_and(|c| c.handshaken)
        {
            let err = ErrorPayload::bad_request("handshake required");
            return self.reply(conn_id, Message::Error(err), corr).await;
        }
        match message {
            Message::Handshake(hs) => {
                let conn = self
                    .conns
                    .get_mut(&conn_id)
                    .ok_or_else(|| anyhow!("missing conn {conn_id}"))?;
                conn.handshaken = true;
                conn.label.clone_from(&hs.label);
                info!(conn_id, label = ?hs.label, client_version = hs.client_version, "replica attached");
                let ack = Message::HandshakeAck(HandshakeAckPayload {
                    status: AckStatus::Ok,
                    server_version: PROTOCOL_VERSION,
                    replica_id: conn_id,
                    error: None,
                });
                self.reply(conn_id, ack, corr).await
            }
            Message::GetSections => {
                let doc = self.store.schema_document();
                self.reply(conn_id, Message::Sections(doc), corr).await
            }
            Message::GetPreferences => {
                let doc = self.store.get_preferences().clone();
                self.reply(conn_id, Message::Preferences(doc), corr).await
            }
            Message::GetDefaults => {
                let doc = self.store.get_defaults().clone();
                self.reply(conn_id, Message::Defaults(doc), corr).await
            }
            Message::GetConfig => {
                let config = self.store.get_config();
                self.reply(conn_id, Message::Config(config), corr).await
            }
            Message::ClosePreferences => {
                self.ports.window.close(conn_id);
                self.reply(conn_id, Message::Closed, corr).await
            }
            Message::ShowOpenDialog(options) => {
                let result = self.ports.dialog.show_open_dialog(conn_id, &options);
                self.reply(conn_id, Message::DialogResult(result), corr).await
            }
            Message::Encrypt(payload) => {
                let reply = match self.store.encrypt(&payload.secret) {
                    Ok(ciphertext) => Message::Encrypted(EncryptedPayload { ciphertext }),
                    Err(err) => {
                        warn!(conn_id, %err, "encrypt failed");
                        Message::Error(ErrorPayload::seal_failed(err.to_string()))
                    }
                };
                self.reply(conn_id, reply, corr).await
            }
            Message::SetPreferences(raw) => {
                let outcome = self.store.set_preferences(raw).map(Preferences::clone);
                match outcome {
                    Ok(doc) => {
                        debug!(conn_id, sections = doc.len(), "write accepted");
                        self.accepted(doc, Some(conn_id)).await
                    }
                    Err(err) => {
                        warn!(conn_id, %err, "write rejected; keeping previous document");
                        self.reply(conn_id, Message::Error(rejection(&err)), corr).await
                    }
                }
            }
            Message::SendButtonClick(payload) => {
                debug!(conn_id, channel = %payload.channel, "button click");
                self.ports.events.emit_click(&payload.channel);
                Ok(())
            }
            // replies and pushes only travel host to replica
            other => {
                let err = ErrorPayload::bad_request(format!(
                    "`{}` is not accepted from replicas",
                    other.op_name()
                ));
                self.reply(conn_id, Message::Error(err), corr).await
            }
        }
    }
}

fn rejection(err: &PreferenceStoreError) -> ErrorPayload {
    match err {
        PreferenceStoreError::Invalid(_) => ErrorPayload::invalid_document(err.to_string()),
        PreferenceStoreError::Persist(_) => ErrorPayload::persist_failed(err.to_string()),
        PreferenceStoreError::Seal(_) => ErrorPayload::seal_failed(err.to_string()),
        PreferenceStoreError::Schema(_) => ErrorPayload::bad_request(err.to_string()),
    }
}

/// Shared handle to the host hub. Clones refer to the same hub.
pub struct Hub<S> {
    state: Arc<Mutex<HubState<S>>>,
}

impl<S> Clone for Hub<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S> Hub<S>
where
    S: BlobStore + Send + Sync + 'static,
{
    /// Hub serving `store`, calling out through `ports`.
    pub fn new(store: PreferenceStore<S>, ports: HostPorts, echo_to_origin: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                next_conn_id: 1,
                next_ts: 0,
                conns: BTreeMap::new(),
                store,
                ports,
                echo_to_origin,
            })),
        }
    }

    /// Add a connection. The returned [`Notify`] fires if the hub detaches it.
    pub(crate) async fn register(&self, tx: mpsc::Sender<Vec<u8>>) -> (u64, Arc<Notify>) {
        let mut h = self.state.lock().await;
        let id = h.next_conn_id;
        h.next_conn_id += 1;
        let detached = Arc::new(Notify::new());
        h.conns.insert(
            id,
            ConnState {
                tx,
                label: None,
                handshaken: false,
                detached: Arc::clone(&detached),
            },
        );
        (id, detached)
    }

    async fn unregister(&self, conn_id: u64) {
        let mut h = self.state.lock().await;
        if let Some(conn) = h.conns.remove(&conn_id) {
            info!(conn_id, label = ?conn.label, "replica detached");
        }
    }

    /// Handle one inbound frame from `conn_id`.
    pub async fn handle_message(&self, frame: Frame, conn_id: u64) -> Result<()> {
        let mut h = self.state.lock().await;
        h.handle(frame, conn_id).await
    }

    /// Number of attached connections.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.conns.len()
    }

    /// Replace the schema and push it to every replica.
    pub async fn publish_sections(&self, sections: Vec<Section>) -> Result<()> {
        let mut h = self.state.lock().await;
        h.store.replace_sections(sections)?;
        let doc = h.store.schema_document();
        h.broadcast(&Message::SectionsUpdated(doc), None).await
    }

    /// Re-read the durable document; push it when it changed on disk.
    pub async fn reload_preferences(&self) -> Result<bool> {
        let mut h = self.state.lock().await;
        if !h.store.reload()? {
            return Ok(false);
        }
        let doc = h.store.get_preferences().clone();
        h.accepted(doc, None).await?;
        Ok(true)
    }

    /// Host-side read of one value.
    pub async fn value(&self, section: &str, key: &str) -> Option<Value> {
        self.state.lock().await.store.value(section, key).cloned()
    }

    /// Host-side write of one value, pushed to every replica.
    pub async fn set_value(&self, section: &str, key: &str, value: Value) -> Result<()> {
        let mut h = self.state.lock().await;
        let doc = h.store.set_value(section, key, value)?.clone();
        h.accepted(doc, None).await
    }

    /// Replace the document with the defaults and push it.
    pub async fn reset_to_defaults(&self) -> Result<()> {
        let mut h = self.state.lock().await;
        let doc = h.store.reset_to_defaults()?.clone();
        h.accepted(doc, None).await
    }

    /// Unseal a value produced by `encrypt`.
    pub async fn decrypt(&self, sealed: &str) -> Result<String> {
        Ok(self.state.lock().await.store.decrypt(sealed)?)
    }

    /// Accept connections forever.
    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        loop {
            let (stream, _) = listener.accept().await?;
            let hub = self.clone();
            tokio::spawn(async move {
                if let Err(err) = hub.serve_connection(stream).await {
                    warn!(?err, "client handler error");
                }
            });
        }
    }

    /// Drive one replica connection until it closes.
    pub async fn serve_connection<T>(&self, stream: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTBOX_DEPTH);
        let (conn_id, detached) = self.register(tx).await;

        tokio::spawn(async move {
            while let Some(buf) = rx.recv().await {
                if writer.write_all(&buf).await.is_err() {
                    break;
                }
            }
        });

        let outcome = tokio::select! {
            res = self.pump(&mut reader, conn_id) => res,
            () = detached.notified() => Ok(()),
        };
        self.unregister(conn_id).await;
        outcome
    }

    async fn pump<R>(&self, reader: &mut R, conn_id: u64) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut read_buf = vec![0u8; 16 * 1024];
        let mut acc: Vec<u8> = Vec::with_capacity(32 * 1024);
        loop {
            let n = reader.read(&mut read_buf).await?;
            if n == 0 {
                return Ok(());
            }
            acc.extend_from_slice(&read_buf[..n]);

            // process as many frames as available
            while let Some(header) = acc.get(..HEADER_BYTES) {
                let header: [u8; HEADER_BYTES] = header.try_into()?;
                let frame_len = match packet_len(&header) {
                    Ok(len) => len,
                    Err(err) => {
                        warn!(conn_id, %err, "unframeable input; dropping connection");
                        return Ok(());
                    }
                };
                if acc.len() < frame_len {
                    break;
                }
                let packet: Vec<u8> = acc.drain(..frame_len).collect();
                match decode_message(&packet) {
                    Ok((frame, _)) => self.handle_message(frame, conn_id).await?,
                    Err(WireError::UnknownOp(op)) => {
                        let err = ErrorPayload::bad_request(format!("unknown op `{op}`"));
                        let mut h = self.state.lock().await;
                        h.reply(conn_id, Message::Error(err), None).await?;
                    }
                    Err(err) => {
                        warn!(conn_id, %err, "failed to decode packet; dropping connection");
                        return Ok(());
                    }
                }
            }
        }
    }
}
