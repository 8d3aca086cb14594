// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session wire schema between the preferences host and its UI replicas.
//!
//! Three traffic classes share one framed CBOR channel:
//! * request/reply (`get_sections`, `get_preferences`, ..., `encrypt`), where the
//!   reply carries the request's correlation id;
//! * fire-and-forget (`set_preferences`, `send_button_click`);
//! * host pushes (`preferences_updated`, `sections_updated`) stamped with the
//!   host's logical clock.

use prefs_app_core::{Config, Preferences};
use prefs_schema::SchemaDocument;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod wire;

/// Implementation version exchanged during handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default Unix socket path for the preferences host.
///
/// Prefers a per-user runtime dir (XDG_RUNTIME_DIR) and falls back to `/tmp`
/// when unavailable.
pub fn default_socket_path() -> PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join("prefs-host.sock")
}

/// Envelope carried as the payload of a packet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpEnvelope<P> {
    /// Operation name (see [`Message::op_name`]).
    pub op: String,
    /// Logical timestamp (authoritative on the host side, 0 from replicas).
    pub ts: u64,
    /// Correlation id linking a reply to its request.
    #[serde(default)]
    pub corr: Option<u64>,
    /// Operation-specific body.
    pub payload: P,
}

/// Stable error codes reported in [`ErrorPayload`].
pub mod codes {
    /// Document did not have the section/field shape.
    pub const INVALID_DOCUMENT: u32 = 1;
    /// Request was not valid in this direction or state.
    pub const BAD_REQUEST: u32 = 2;
    /// Durable write failed; previous state retained.
    pub const PERSIST_FAILED: u32 = 3;
    /// Secret could not be sealed.
    pub const SEAL_FAILED: u32 = 4;
}

/// Error reply / rejection notice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Numeric error code (see [`codes`]).
    pub code: u32,
    /// Stable identifier (e.g., "E_INVALID_DOCUMENT").
    pub name: String,
    /// Human readable message.
    pub message: String,
}

impl ErrorPayload {
    /// Malformed preferences document.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_DOCUMENT, "E_INVALID_DOCUMENT", message)
    }

    /// Unexpected message for this direction.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(codes::BAD_REQUEST, "E_BAD_REQUEST", message)
    }

    /// Durable write failed.
    pub fn persist_failed(message: impl Into<String>) -> Self {
        Self::new(codes::PERSIST_FAILED, "E_PERSIST_FAILED", message)
    }

    /// Sealing failed.
    pub fn seal_failed(message: impl Into<String>) -> Self {
        Self::new(codes::SEAL_FAILED, "E_SEAL_FAILED", message)
    }

    fn new(code: u32, name: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            name: name.to_owned(),
            message: message.into(),
        }
    }
}

/// Handshake request payload (replica → host).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakePayload {
    /// Implementation version (not wire version).
    pub client_version: u32,
    /// Optional label for logs (e.g. window name).
    pub label: Option<String>,
}

/// Status enumeration for handshake ack.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AckStatus {
    /// Handshake succeeded.
    #[serde(rename = "OK")]
    Ok,
    /// Handshake failed.
    #[serde(rename = "ERROR")]
    Error,
}

/// Handshake acknowledgement payload (host → replica).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeAckPayload {
    /// Status of the handshake.
    pub status: AckStatus,
    /// Host implementation version.
    pub server_version: u32,
    /// Identifier the host assigned to this replica.
    pub replica_id: u64,
    /// Set when status == Error.
    pub error: Option<ErrorPayload>,
}

/// File filter for the native open dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFilter {
    /// Display name (e.g. "Images").
    pub name: String,
    /// Extensions without dot.
    pub extensions: Vec<String>,
}

/// Behavior flags for the open dialog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DialogProperty {
    /// Allow selecting files.
    OpenFile,
    /// Allow selecting directories.
    OpenDirectory,
    /// Allow more than one selection.
    MultiSelections,
    /// Show dotfiles.
    ShowHiddenFiles,
}

/// Options for `show_open_dialog`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogOptions {
    /// Window title.
    pub title: Option<String>,
    /// Initial path.
    pub default_path: Option<String>,
    /// Confirm button label.
    pub button_label: Option<String>,
    /// File filters.
    #[serde(default)]
    pub filters: Vec<FileFilter>,
    /// Behavior flags.
    #[serde(default)]
    pub properties: Vec<DialogProperty>,
}

/// Outcome of the native open dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "paths", rename_all = "snake_case")]
pub enum OpenDialogResult {
    /// User dismissed the dialog.
    Cancelled,
    /// Selected paths (at least one).
    Selected(Vec<String>),
}

/// Payload for `encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptPayload {
    /// Plaintext secret.
    pub secret: String,
}

/// Payload for `encrypted`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// Sealed envelope.
    pub ciphertext: String,
}

/// Payload for `send_button_click`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ButtonClickPayload {
    /// Host-side handler identifier.
    pub channel: String,
}

/// How a message participates in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Connection setup.
    Control,
    /// Replica → host, expects exactly one reply.
    Request,
    /// Replica → host, no reply on success.
    FireAndForget,
    /// Host → replica answer to a request.
    Reply,
    /// Host → replica unsolicited update.
    Push,
}

/// Wire message kinds carried inside [`OpEnvelope`] payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Handshake request (op = "handshake").
    Handshake(HandshakePayload),
    /// Handshake acknowledgement (op = "handshake_ack").
    HandshakeAck(HandshakeAckPayload),
    /// Error reply or write rejection (op = "error").
    Error(ErrorPayload),
    /// Request the schema (op = "get_sections").
    GetSections,
    /// Request the canonical document (op = "get_preferences").
    GetPreferences,
    /// Request the defaults document (op = "get_defaults").
    GetDefaults,
    /// Request the process config (op = "get_config").
    GetConfig,
    /// Ask the host to close this surface (op = "close_preferences").
    ClosePreferences,
    /// Ask the host to show a native open dialog (op = "show_open_dialog").
    ShowOpenDialog(DialogOptions),
    /// Ask the host to seal a secret (op = "encrypt").
    Encrypt(EncryptPayload),
    /// Whole-document write, validated on the host (op = "set_preferences").
    SetPreferences(serde_json::Value),
    /// Button press routed to a host handler (op = "send_button_click").
    SendButtonClick(ButtonClickPayload),
    /// Reply to `get_sections` (op = "sections").
    Sections(SchemaDocument),
    /// Reply to `get_preferences` (op = "preferences").
    Preferences(Preferences),
    /// Reply to `get_defaults` (op = "defaults").
    Defaults(Preferences),
    /// Reply to `get_config` (op = "config").
    Config(Config),
    /// Reply to `close_preferences` (op = "closed").
    Closed,
    /// Reply to `show_open_dialog` (op = "dialog_result").
    DialogResult(OpenDialogResult),
    /// Reply to `encrypt` (op = "encrypted").
    Encrypted(EncryptedPayload),
    /// Push: canonical document changed (op = "preferences_updated").
    PreferencesUpdated(Preferences),
    /// Push: schema changed (op = "sections_updated").
    SectionsUpdated(SchemaDocument),
}

impl Message {
    /// Canonical op string for this message variant.
    pub fn op_name(&self) -> &'static str {
        match self {
            Message::Handshake(_) => "handshake",
            Message::HandshakeAck(_) => "handshake_ack",
            Message::Error(_) => "error",
            Message::GetSections => "get_sections",
            Message::GetPreferences => "get_preferences",
            Message::GetDefaults => "get_defaults",
            Message::GetConfig => "get_config",
            Message::ClosePreferences => "close_preferences",
            Message::ShowOpenDialog(_) => "show_open_dialog",
            Message::Encrypt(_) => "encrypt",
            Message::SetPreferences(_) => "set_preferences",
            Message::SendButtonClick(_) => "send_button_click",
            Message::Sections(_) => "sections",
            Message::Preferences(_) => "preferences",
            Message::Defaults(_) => "defaults",
            Message::Config(_) => "config",
            Message::Closed => "closed",
            Message::DialogResult(_) => "dialog_result",
            Message::Encrypted(_) => "encrypted",
            Message::PreferencesUpdated(_) => "preferences_updated",
            Message::SectionsUpdated(_) => "sections_updated",
        }
    }

    /// Traffic class of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Handshake(_) | Message::HandshakeAck(_) => MessageKind::Control,
            Message::GetSections
            | Message::GetPreferences
            | Message::GetDefaults
            | Message::GetConfig
            | Message::ClosePreferences
            | Message::ShowOpenDialog(_)
            | Message::Encrypt(_) => MessageKind::Request,
            Message::SetPreferences(_) | Message::SendButtonClick(_) => {
                MessageKind::FireAndForget
            }
            Message::Error(_)
            | Message::Sections(_)
            | Message::Preferences(_)
            | Message::Defaults(_)
            | Message::Config(_)
            | Message::Closed
            | Message::DialogResult(_)
            | Message::Encrypted(_) => MessageKind::Reply,
            Message::PreferencesUpdated(_) | Message::SectionsUpdated(_) => MessageKind::Push,
        }
    }
}
