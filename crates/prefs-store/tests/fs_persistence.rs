// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Store state survives a restart when backed by the filesystem.

use prefs_app_core::{Config, DocumentService, Preferences};
use prefs_config_fs::FsBlobStore;
use prefs_dry_tests::SectionBuilder;
use prefs_schema::SchemaRegistry;
use prefs_store::{PreferenceStore, SecretSealer, PREFERENCES_KEY};
use serde_json::json;
use std::path::Path;

fn open(dir: &Path, key: [u8; 32]) -> PreferenceStore<FsBlobStore> {
    let schema = SchemaRegistry::new(vec![
        SectionBuilder::new("general").text_field("name").build(),
        SectionBuilder::new("security").build(),
    ])
    .unwrap();
    let defaults = Preferences::from_value(json!({"general": {"name": "anon"}})).unwrap();
    PreferenceStore::open(
        DocumentService::new(FsBlobStore::at(dir).unwrap()),
        schema,
        defaults,
        Config::default(),
        SecretSealer::new("host", key).unwrap(),
    )
    .unwrap()
}

#[test]
fn accepted_write_is_read_back_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = open(dir.path(), [7; 32]);
        store
            .set_preferences(json!({"general": {"name": "ada"}, "security": {}}))
            .unwrap();
    }
    let store = open(dir.path(), [7; 32]);
    assert_eq!(store.value("general", "name"), Some(&json!("ada")));
    assert!(dir.path().join(format!("{PREFERENCES_KEY}.json")).exists());
}

#[test]
fn sealed_value_needs_the_same_key_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let sealed = {
        let mut store = open(dir.path(), [7; 32]);
        let sealed = store.encrypt("hunter2").unwrap();
        store
            .set_value("security", "token", json!(sealed.clone()))
            .unwrap();
        sealed
    };
    let same = open(dir.path(), [7; 32]);
    assert_eq!(same.value("security", "token"), Some(&json!(sealed)));
    assert_eq!(same.decrypt(&sealed).unwrap(), "hunter2");

    let other = open(dir.path(), [8; 32]);
    assert!(other.decrypt(&sealed).is_err());
}
