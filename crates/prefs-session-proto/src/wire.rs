// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Framing and CBOR helpers.
//!
//! Packet layout:
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || LENGTH(4) || PAYLOAD || CHECKSUM(32)``
//!
//! * PAYLOAD is a CBOR [`OpEnvelope`]
//! * CHECKSUM = blake3-256 over HEADER (first 12 bytes) || PAYLOAD

use blake3::Hasher;
use ciborium::Value;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{ButtonClickPayload, EncryptPayload, EncryptedPayload, Message, OpEnvelope};

/// Protocol magic constant "PRF!".
pub const MAGIC: [u8; 4] = [0x50, 0x52, 0x46, 0x21];
/// Wire protocol version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Reserved flags (set to zero for v1).
pub const FLAGS: u16 = 0x0000;
/// Header length in bytes.
pub const HEADER_BYTES: usize = 12;
/// Trailing checksum length in bytes.
pub const CHECKSUM_BYTES: usize = 32;
/// Largest payload either side accepts.
pub const MAX_PAYLOAD: usize = 8 * 1024 * 1024;

/// Framing and codec failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Fewer bytes than the header or declared length require.
    #[error("incomplete packet")]
    Incomplete,
    /// Packet does not start with [`MAGIC`].
    #[error("bad magic")]
    BadMagic,
    /// Peer speaks another wire version.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),
    /// Declared payload exceeds [`MAX_PAYLOAD`].
    #[error("payload too large: {0} bytes")]
    TooLarge(usize),
    /// blake3 over header||payload did not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// Envelope named an op this build does not know.
    #[error("unknown op {0}")]
    UnknownOp(String),
    /// CBOR encoding failed.
    #[error("encode error: {0}")]
    Encode(String),
    /// CBOR decoding failed.
    #[error("decode error: {0}")]
    Decode(String),
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Decoded message.
    pub message: Message,
    /// Host logical timestamp.
    pub ts: u64,
    /// Correlation id, if any.
    pub corr: Option<u64>,
}

/// Encode to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(out)
}

/// Decode from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    ciborium::de::from_reader(bytes).map_err(|e| WireError::Decode(e.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, WireError> {
    Value::serialized(value).map_err(|e| WireError::Encode(e.to_string()))
}

fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, WireError> {
    value
        .deserialized()
        .map_err(|e| WireError::Decode(e.to_string()))
}

fn checksum(header: &[u8], payload: &[u8]) -> [u8; CHECKSUM_BYTES] {
    let mut hasher = Hasher::new();
    hasher.update(header);
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}

/// Total packet length announced by a header, validating magic, version and size.
pub fn packet_len(header: &[u8; HEADER_BYTES]) -> Result<usize, WireError> {
    if header[0..4] != MAGIC {
        return Err(WireError::BadMagic);
    }
    let version = u16::from_be_bytes([header[4], header[5]]);
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
    if len > MAX_PAYLOAD {
        return Err(WireError::TooLarge(len));
    }
    Ok(HEADER_BYTES + len + CHECKSUM_BYTES)
}

/// Wrap a CBOR payload into a full packet.
pub fn encode_packet(payload: &[u8]) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(WireError::TooLarge(payload.len()));
    }
    let len = u32::try_from(payload.len()).map_err(|_| WireError::TooLarge(payload.len()))?;
    let mut header = [0u8; HEADER_BYTES];
    header[0..4].copy_from_slice(&MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_be_bytes());
    header[6..8].copy_from_slice(&FLAGS.to_be_bytes());
    header[8..12].copy_from_slice(&len.to_be_bytes());

    let mut out = Vec::with_capacity(HEADER_BYTES + payload.len() + CHECKSUM_BYTES);
    out.extend_from_slice(&header);
    out.extend_from_slice(payload);
    out.extend_from_slice(&checksum(&header, payload));
    Ok(out)
}

/// Verify a packet and return its payload slice plus bytes consumed.
pub fn decode_packet(bytes: &[u8]) -> Result<(&[u8], usize), WireError> {
    let header: &[u8; HEADER_BYTES] = bytes
        .get(..HEADER_BYTES)
        .and_then(|h| h.try_into().ok())
        .ok_or(WireError::Incomplete)?;
    let total = packet_len(header)?;
    if bytes.len() < total {
        return Err(WireError::Incomplete);
    }
    let payload = &bytes[HEADER_BYTES..total - CHECKSUM_BYTES];
    let sum = &bytes[total - CHECKSUM_BYTES..total];
    if checksum(header, payload) != sum {
        return Err(WireError::ChecksumMismatch);
    }
    Ok((payload, total))
}

/// Encode a [`Message`] with the given logical timestamp and correlation id.
pub fn encode_message(msg: &Message, ts: u64, corr: Option<u64>) -> Result<Vec<u8>, WireError> {
    let payload = match msg {
        Message::Handshake(p) => to_value(p)?,
        Message::HandshakeAck(p) => to_value(p)?,
        Message::Error(p) => to_value(p)?,
        Message::GetSections
        | Message::GetPreferences
        | Message::GetDefaults
        | Message::GetConfig
        | Message::ClosePreferences
        | Message::Closed => Value::Null,
        Message::ShowOpenDialog(p) => to_value(p)?,
        Message::Encrypt(p) => to_value(p)?,
        Message::SetPreferences(doc) => to_value(doc)?,
        Message::SendButtonClick(p) => to_value(p)?,
        Message::Sections(s) | Message::SectionsUpdated(s) => to_value(s)?,
        Message::Preferences(d) | Message::Defaults(d) | Message::PreferencesUpdated(d) => {
            to_value(d)?
        }
        Message::Config(c) => to_value(c)?,
        Message::DialogResult(r) => to_value(r)?,
        Message::Encrypted(p) => to_value(p)?,
    };
    let env = OpEnvelope {
        op: msg.op_name().to_owned(),
        ts,
        corr,
        payload,
    };
    encode_packet(&to_cbor(&env)?)
}

/// Decode one packet into a [`Frame`], returning bytes consumed.
pub fn decode_message(bytes: &[u8]) -> Result<(Frame, usize), WireError> {
    let (payload, used) = decode_packet(bytes)?;
    let env: OpEnvelope<Value> = from_cbor(payload)?;
    let p = &env.payload;
    let message = match env.op.as_str() {
        "handshake" => Message::Handshake(from_value(p)?),
        "handshake_ack" => Message::HandshakeAck(from_value(p)?),
        "error" => Message::Error(from_value(p)?),
        "get_sections" => Message::GetSections,
        "get_preferences" => Message::GetPreferences,
        "get_defaults" => Message::GetDefaults,
        "get_config" => Message::GetConfig,
        "close_preferences" => Message::ClosePreferences,
        "show_open_dialog" => Message::ShowOpenDialog(from_value(p)?),
        "encrypt" => Message::Encrypt(from_value::<EncryptPayload>(p)?),
        "set_preferences" => Message::SetPreferences(from_value(p)?),
        "send_button_click" => Message::SendButtonClick(from_value::<ButtonClickPayload>(p)?),
        "sections" => Message::Sections(from_value(p)?),
        "preferences" => Message::Preferences(from_value(p)?),
        "defaults" => Message::Defaults(from_value(p)?),
        "config" => Message::Config(from_value(p)?),
        "closed" => Message::Closed,
        "dialog_result" => Message::DialogResult(from_value(p)?),
        "encrypted" => Message::Encrypted(from_value::<EncryptedPayload>(p)?),
        "preferences_updated" => Message::PreferencesUpdated(from_value(p)?),
        "sections_updated" => Message::SectionsUpdated(from_value(p)?),
        other => return Err(WireError::UnknownOp(other.to_owned())),
    };
    Ok((
        Frame {
            message,
            ts: env.ts,
            corr: env.corr,
        },
        used,
    ))
}

// --- Unit tests -----------------------------------------------------------
