// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host settings persisted next to the preference documents.

use anyhow::{Context, Result};
use prefs_app_core::{BlobStore, Config, DocumentService};
use prefs_session_proto::default_socket_path;
use prefs_store::SecretSealer;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Blob key the settings live under.
pub const HOST_KEY: &str = "host";

const SEALING_KEY_ID: &str = "host";

/// Settings of the host process (not shown to replicas).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Unix socket the hub listens on.
    pub socket_path: String,
    /// Base64 ChaCha20-Poly1305 key used by `encrypt`; generated on first run.
    #[serde(default)]
    pub sealing_key: String,
    /// Also push an accepted write back to the replica that sent it.
    #[serde(default)]
    pub echo_to_origin: bool,
    /// Config served to replicas.
    #[serde(default)]
    pub config: Config,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path().display().to_string(),
            sealing_key: String::new(),
            echo_to_origin: false,
            config: Config::default(),
        }
    }
}

impl HostSettings {
    /// Load settings, generating and persisting a sealing key when none exists.
    pub fn load_or_init<S: BlobStore>(docs: &DocumentService<S>) -> Result<Self> {
        let stored = docs
            .load::<HostSettings>(HOST_KEY)
            .context("reading host settings")?;
        let needs_save = match &stored {
            Some(s) => s.sealing_key.is_empty(),
            None => true,
        };
        let mut settings = stored.unwrap_or_default();
        if settings.sealing_key.is_empty() {
            settings.sealing_key = SecretSealer::generate(SEALING_KEY_ID)?.key_base64();
            info!("generated a new sealing key");
        }
        if needs_save {
            docs.save(HOST_KEY, &settings)
                .context("persisting host settings")?;
        }
        Ok(settings)
    }

    /// Sealer built from the persisted key.
    pub fn sealer(&self) -> Result<SecretSealer> {
        SecretSealer::from_base64(SEALING_KEY_ID, &self.sealing_key)
            .context("host sealing key is unusable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefs_dry_tests::InMemoryBlobStore;

    #[test]
    fn first_run_generates_and_persists_key_once() {
        let blobs = InMemoryBlobStore::new();
        let docs = DocumentService::new(blobs.clone());
        let first = HostSettings::load_or_init(&docs).unwrap();
        assert!(!first.sealing_key.is_empty());
        assert_eq!(blobs.save_count(), 1);

        let second = HostSettings::load_or_init(&docs).unwrap();
        assert_eq!(first, second);
        assert_eq!(blobs.save_count(), 1);
        assert!(second.sealer().is_ok());
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let blobs = InMemoryBlobStore::new();
        let docs = DocumentService::new(blobs.clone());
        docs.save(HOST_KEY, &serde_json::json!({"socket_path": "/tmp/x.sock"}))
            .unwrap();
        let s = HostSettings::load_or_init(&docs).unwrap();
        assert_eq!(s.socket_path, "/tmp/x.sock");
        assert!(!s.echo_to_origin);
        assert_eq!(s.config, Config::default());
        // key was generated, so the blob was rewritten
        assert_eq!(blobs.save_count(), 2);
    }
}
