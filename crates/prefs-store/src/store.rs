// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The canonical preferences document plus defaults, schema and config.

use prefs_app_core::{BlobStore, Config, DocumentError, DocumentService, Preferences, StoreError};
use prefs_schema::{SchemaDocument, SchemaError, SchemaRegistry, Section};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::seal::{SealError, SecretSealer};

/// Blob key of the canonical document.
pub const PREFERENCES_KEY: &str = "preferences";
/// Blob key of the defaults document.
pub const DEFAULTS_KEY: &str = "defaults";
/// Blob key of the serialized schema.
pub const SCHEMA_KEY: &str = "schema";

/// Failures surfaced by [`PreferenceStore`] operations.
#[derive(Debug, Error)]
pub enum PreferenceStoreError {
    /// Document shape rejected; prior state retained.
    #[error("invalid document: {0}")]
    Invalid(#[from] DocumentError),
    /// Durable write/read failed; prior state retained.
    #[error("persistence failed: {0}")]
    Persist(#[from] StoreError),
    /// Sealing failed.
    #[error(transparent)]
    Seal(#[from] SealError),
    /// Schema replacement rejected.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Host-resident owner of the canonical preferences document.
pub struct PreferenceStore<S> {
    docs: DocumentService<S>,
    schema: SchemaRegistry,
    defaults: Preferences,
    preferences: Preferences,
    config: Config,
    sealer: SecretSealer,
}

impl<S> PreferenceStore<S>
where
    S: BlobStore,
{
    /// Load the stored document (or start from defaults) and fill gaps from `defaults`.
    ///
    /// A stored document with the wrong shape is an error rather than being
    /// silently replaced. Persisting the merged result is best-effort.
    pub fn open(
        docs: DocumentService<S>,
        schema: SchemaRegistry,
        defaults: Preferences,
        config: Config,
        sealer: SecretSealer,
    ) -> Result<Self, PreferenceStoreError> {
        let stored: Option<Value> = docs.load(PREFERENCES_KEY)?;
        let (mut preferences, fresh) = match stored {
            Some(raw) => (Preferences::from_value(raw)?, false),
            None => (defaults.clone(), true),
        };
        let merged = preferences.merge_defaults(&defaults);
        if fresh || merged {
            if let Err(err) = docs.save(PREFERENCES_KEY, &preferences) {
                warn!(?err, "could not persist merged preferences");
            }
        }
        info!(
            sections = schema.sections().len(),
            entries = preferences.len(),
            "preference store opened"
        );
        Ok(Self {
            docs,
            schema,
            defaults,
            preferences,
            config,
            sealer,
        })
    }

    /// Canonical document with every enabled section present.
    ///
    /// Missing sections are filled with empty mappings and persisted lazily;
    /// a failed persist is logged and the filled document is still returned.
    pub fn get_preferences(&mut self) -> &Preferences {
        let ids = self.schema.enabled_ids();
        if self.preferences.ensure_sections(ids.iter().map(String::as_str)) {
            if let Err(err) = self.docs.save(PREFERENCES_KEY, &self.preferences) {
                warn!(?err, "could not persist filled-in sections");
            }
        }
        &self.preferences
    }

    /// Current document without filling anything in.
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Defaults document.
    pub fn get_defaults(&self) -> &Preferences {
        &self.defaults
    }

    /// Ordered sections, including disabled ones.
    pub fn get_sections(&self) -> &[Section] {
        self.schema.sections()
    }

    /// Schema in its transport form.
    pub fn schema_document(&self) -> SchemaDocument {
        self.schema.to_document()
    }

    /// Process config for replicas.
    pub fn get_config(&self) -> Config {
        self.config
    }

    /// Replace the canonical document with an untyped one.
    ///
    /// Whole-document replacement: the last full write wins. The new document
    /// is validated and persisted before it replaces the current one.
    pub fn set_preferences(&mut self, raw: Value) -> Result<&Preferences, PreferenceStoreError> {
        let next = Preferences::from_value(raw)?;
        self.commit(next)
    }

    /// Host-side read of a single value.
    pub fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.preferences.value(section, key)
    }

    /// Host-side write of a single value (persisted like a full write).
    pub fn set_value(
        &mut self,
        section: &str,
        key: &str,
        value: Value,
    ) -> Result<&Preferences, PreferenceStoreError> {
        let next = self.preferences.with_field(section, key, value);
        self.commit(next)
    }

    /// Replace the document with the defaults.
    pub fn reset_to_defaults(&mut self) -> Result<&Preferences, PreferenceStoreError> {
        let next = self.defaults.clone();
        self.commit(next)
    }

    /// Re-read the durable document after an external edit.
    ///
    /// Returns `true` when the in-memory document changed. A malformed file
    /// is rejected and the current document kept.
    pub fn reload(&mut self) -> Result<bool, PreferenceStoreError> {
        let Some(raw) = self.docs.load::<Value>(PREFERENCES_KEY)? else {
            return Ok(false);
        };
        let next = Preferences::from_value(raw)?;
        if next == self.preferences {
            return Ok(false);
        }
        debug!("preferences changed on disk");
        self.preferences = next;
        Ok(true)
    }

    /// Host-side schema change. New enabled sections get empty entries.
    pub fn replace_sections(&mut self, sections: Vec<Section>) -> Result<(), PreferenceStoreError> {
        self.schema.replace(sections)?;
        let ids = self.schema.enabled_ids();
        if self.preferences.ensure_sections(ids.iter().map(String::as_str)) {
            if let Err(err) = self.docs.save(PREFERENCES_KEY, &self.preferences) {
                warn!(?err, "could not persist sections added by schema change");
            }
        }
        info!(revision = self.schema.revision(), "schema replaced");
        Ok(())
    }

    /// Seal a secret for storage in the document.
    pub fn encrypt(&self, secret: &str) -> Result<String, PreferenceStoreError> {
        Ok(self.sealer.seal(secret)?)
    }

    /// Recover a sealed secret for host-side consumers.
    pub fn decrypt(&self, sealed: &str) -> Result<String, PreferenceStoreError> {
        Ok(self.sealer.open(sealed)?)
    }

    fn commit(&mut self, next: Preferences) -> Result<&Preferences, PreferenceStoreError> {
        self.docs.save(PREFERENCES_KEY, &next)?;
        self.preferences = next;
        Ok(&self.preferences)
    }
}
