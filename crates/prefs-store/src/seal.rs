// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-side sealing of sensitive field values.
//!
//! Sealed values look like `enc:v1:<key_id>:<nonce>:<ciphertext>` with
//! URL-safe unpadded base64 parts. Replicas only ever see the envelope.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use std::fmt;
use thiserror::Error;

pub use prefs_app_core::SEALED_PREFIX;
const NONCE_BYTES: usize = 12;

/// Sealing/unsealing failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SealError {
    /// Key material is not 32 bytes of base64.
    #[error("invalid sealing key: {0}")]
    InvalidKey(String),
    /// Key ids may not be empty or contain `:`.
    #[error("invalid key id `{0}`")]
    InvalidKeyId(String),
    /// Envelope is not in the expected layout.
    #[error("sealed value is malformed: {0}")]
    Envelope(&'static str),
    /// Envelope was sealed with a key this host does not hold.
    #[error("sealed value uses unknown key id `{0}`")]
    UnknownKey(String),
    /// AEAD failure (tampering or wrong key).
    #[error("cipher failure")]
    Cipher,
    /// Plaintext was not UTF-8.
    #[error("sealed plaintext is not utf-8")]
    Utf8,
}

/// ChaCha20-Poly1305 sealer keyed by a host secret.
#[derive(Clone)]
pub struct SecretSealer {
    key_id: String,
    key: [u8; 32],
}

impl fmt::Debug for SecretSealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSealer")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl SecretSealer {
    /// Build from raw key material.
    pub fn new(key_id: impl Into<String>, key: [u8; 32]) -> Result<Self, SealError> {
        let key_id = key_id.into();
        if key_id.is_empty() || key_id.contains(':') {
            return Err(SealError::InvalidKeyId(key_id));
        }
        Ok(Self { key_id, key })
    }

    /// Fresh random key.
    pub fn generate(key_id: impl Into<String>) -> Result<Self, SealError> {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut material = [0u8; 32];
        material.copy_from_slice(key.as_slice());
        Self::new(key_id, material)
    }

    /// Decode key material from base64 (URL-safe or standard).
    pub fn from_base64(key_id: impl Into<String>, encoded: &str) -> Result<Self, SealError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .or_else(|_| base64::engine::general_purpose::STANDARD.decode(encoded.trim()))
            .map_err(|e| SealError::InvalidKey(e.to_string()))?;
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SealError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Self::new(key_id, key)
    }

    /// Key material as URL-safe base64, for persisting alongside host settings.
    pub fn key_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.key)
    }

    /// Identifier embedded in every envelope.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// True if `value` already carries the sealed prefix.
    pub fn is_sealed(value: &str) -> bool {
        value.starts_with(SEALED_PREFIX)
    }

    fn cipher(&self) -> Result<ChaCha20Poly1305, SealError> {
        ChaCha20Poly1305::new_from_slice(&self.key).map_err(|e| SealError::InvalidKey(e.to_string()))
    }

    /// Seal `plaintext`. Already sealed input is returned unchanged.
    pub fn seal(&self, plaintext: &str) -> Result<String, SealError> {
        if Self::is_sealed(plaintext) {
            return Ok(plaintext.to_owned());
        }
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()?
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SealError::Cipher)?;
        Ok(format!(
            "{SEALED_PREFIX}{}:{}:{}",
            self.key_id,
            URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    /// Recover the plaintext of a sealed value. Unsealed input is returned unchanged.
    pub fn open(&self, stored: &str) -> Result<String, SealError> {
        let Some(rest) = stored.strip_prefix(SEALED_PREFIX) else {
            return Ok(stored.to_owned());
        };
        let mut parts = rest.splitn(3, ':');
        let key_id = parts.next().ok_or(SealError::Envelope("missing key id"))?;
        let nonce_b64 = parts.next().ok_or(SealError::Envelope("missing nonce"))?;
        let ct_b64 = parts.next().ok_or(SealError::Envelope("missing ciphertext"))?;
        if key_id != self.key_id {
            return Err(SealError::UnknownKey(key_id.to_owned()));
        }
        let nonce_raw = URL_SAFE_NO_PAD
            .decode(nonce_b64)
            .map_err(|_| SealError::Envelope("nonce is not base64"))?;
        if nonce_raw.len() != NONCE_BYTES {
            return Err(SealError::Envelope("nonce length"));
        }
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ct_b64)
            .map_err(|_| SealError::Envelope("ciphertext is not base64"))?;
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_raw), ciphertext.as_ref())
            .map_err(|_| SealError::Cipher)?;
        String::from_utf8(plaintext).map_err(|_| SealError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealer() -> SecretSealer {
        SecretSealer::new("v1", [7u8; 32]).unwrap()
    }

    #[test]
    fn sealed_value_hides_plaintext_and_opens_back() {
        let s = sealer();
        let sealed = s.seal("hunter2").unwrap();
        assert!(sealed.starts_with("enc:v1:v1:"));
        assert!(!sealed.contains("hunter2"));
        assert_eq!(s.open(&sealed).unwrap(), "hunter2");
    }

    #[test]
    fn sealing_twice_is_a_no_op() {
        let s = sealer();
        let once = s.seal("token").unwrap();
        assert_eq!(s.seal(&once).unwrap(), once);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let s = sealer();
        let mut sealed = s.seal("token").unwrap();
        let last = sealed.pop().unwrap();
        sealed.push(if last == 'A' { 'B' } else { 'A' });
        assert!(s.open(&sealed).is_err());
    }

    #[test]
    fn other_key_id_is_unknown() {
        let a = sealer();
        let b = SecretSealer::new("v2", [7u8; 32]).unwrap();
        let sealed = a.seal("x").unwrap();
        assert_eq!(b.open(&sealed), Err(SealError::UnknownKey("v1".into())));
    }

    #[test]
    fn key_round_trips_through_base64() {
        let s = SecretSealer::generate("host").unwrap();
        let restored = SecretSealer::from_base64("host", &s.key_base64()).unwrap();
        let sealed = s.seal("secret").unwrap();
        assert_eq!(restored.open(&sealed).unwrap(), "secret");
        assert!(matches!(
            SecretSealer::from_base64("host", "c2hvcnQ"),
            Err(SealError::InvalidKey(_))
        ));
        assert!(SecretSealer::new("a:b", [0; 32]).is_err());
    }
}
