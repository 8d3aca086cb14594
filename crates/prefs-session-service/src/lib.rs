// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Preferences host: owns the canonical store and serves UI replicas over a
//! Unix socket.

pub mod demo;
pub mod host;
pub mod hub;
pub mod settings;

pub use host::{DialogPort, HeadlessDialog, HostEvents, HostPorts, LogWindow, WindowPort};
pub use hub::Hub;
pub use settings::{HostSettings, HOST_KEY};

use anyhow::{Context, Result};
use prefs_app_core::{BlobStore, DocumentService, Preferences};
use prefs_schema::{SchemaDocument, SchemaRegistry};
use prefs_store::{PreferenceStore, DEFAULTS_KEY, SCHEMA_KEY};
use tracing::info;

/// Open the preference store from `docs`, falling back to the demo schema.
///
/// Stored defaults are only used together with a stored schema; the demo
/// schema always comes with its own defaults.
pub fn open_store<S: BlobStore>(
    docs: DocumentService<S>,
    settings: &HostSettings,
) -> Result<PreferenceStore<S>> {
    let stored: Option<SchemaDocument> = docs.load(SCHEMA_KEY).context("reading schema")?;
    let (sections, defaults) = match stored {
        Some(doc) => {
            let defaults = docs
                .load::<Preferences>(DEFAULTS_KEY)
                .context("reading defaults")?
                .unwrap_or_default();
            (doc.into_sections()?, defaults)
        }
        None => {
            info!("no stored schema; serving the built-in demo");
            (demo::sections()?, demo::defaults())
        }
    };
    let schema = SchemaRegistry::new(sections)?;
    let store = PreferenceStore::open(docs, schema, defaults, settings.config, settings.sealer()?)?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prefs_dry_tests::{InMemoryBlobStore, SectionBuilder};
    use serde_json::json;

    #[test]
    fn stored_schema_and_defaults_win_over_demo() {
        let blobs = InMemoryBlobStore::new();
        let docs = DocumentService::new(blobs.clone());
        docs.save(
            SCHEMA_KEY,
            &SchemaDocument::new(vec![SectionBuilder::new("net").text_field("proxy").build()]),
        )
        .unwrap();
        docs.save(DEFAULTS_KEY, &json!({"net": {"proxy": "none"}})).unwrap();
        let settings = HostSettings::load_or_init(&docs).unwrap();

        let mut store = open_store(docs, &settings).unwrap();
        assert_eq!(store.get_sections().len(), 1);
        assert_eq!(store.get_preferences().value("net", "proxy"), Some(&json!("none")));
    }

    #[test]
    fn empty_store_serves_demo_with_defaults() {
        let docs = DocumentService::new(InMemoryBlobStore::new());
        let settings = HostSettings::load_or_init(&docs).unwrap();
        let store = open_store(docs, &settings).unwrap();
        assert!(store.get_sections().iter().any(|s| s.id == "theme"));
        assert_eq!(store.value("theme", "theme"), Some(&json!("system")));
    }
}
