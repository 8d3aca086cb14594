// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Replica against a fake host: load, edit through a map editor, observe the
//! single debounced write.

use prefs_app_core::Preferences;
use prefs_dry_tests::{FakeHost, SectionBuilder};
use prefs_ui_core::fields::EditorKey;
use prefs_ui_core::{MapEditor, Replica, SaveState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn doc(v: Value) -> Preferences {
    Preferences::from_value(v).unwrap()
}

async fn general_tags() -> (FakeHost, Replica<FakeHost>) {
    let host = FakeHost::new()
        .with_sections(vec![SectionBuilder::new("general").map_field("tags").build()])
        .with_preferences(Preferences::new());
    let replica = Replica::load(Arc::new(host.clone())).await.unwrap();
    (host, replica)
}

fn add_entry(replica: &mut Replica<FakeHost>, key: &str, value: &str) {
    let field = replica.field("general", "tags").cloned().unwrap();
    let mut changed = None;
    {
        let mut editor = MapEditor::new(&field, replica.value("general", "tags"), |v| {
            changed = Some(v);
        });
        editor.set_pending_key(key);
        editor.set_pending_value(value);
        assert!(editor.key_press(EditorKey::Enter));
    }
    replica.edit("general", "tags", changed.unwrap()).unwrap();
}

#[tokio::test(start_paused = true)]
async fn map_entry_is_written_once_after_the_quiet_period() {
    let (host, mut replica) = general_tags().await;
    assert_eq!(replica.preferences(), &doc(json!({"general": {}})));

    add_entry(&mut replica, "color", "blue");
    assert_eq!(
        replica.value("general", "tags"),
        Some(&json!({"color": "blue"}))
    );

    sleep(Duration::from_millis(50)).await;
    assert!(host.writes().is_empty());
    assert_eq!(*replica.save_state().borrow(), SaveState::Pending);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        host.writes(),
        vec![doc(json!({"general": {"tags": {"color": "blue"}}}))]
    );
    assert_eq!(*replica.save_state().borrow(), SaveState::Saved);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(host.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn quick_successive_entries_collapse_into_the_last_document() {
    let (host, mut replica) = general_tags().await;
    add_entry(&mut replica, "color", "blue");
    sleep(Duration::from_millis(30)).await;
    add_entry(&mut replica, " size ", " xl ");

    sleep(Duration::from_millis(500)).await;
    assert_eq!(
        host.writes(),
        vec![doc(json!({"general": {"tags": {"color": "blue", "size": "xl"}}}))]
    );
}

#[tokio::test(start_paused = true)]
async fn remote_push_replaces_local_copy() {
    let (host, mut replica) = general_tags().await;
    let mut inbox = host.subscribe();
    host.publish_preferences(doc(json!({"general": {"tags": {"os": "linux"}}})));

    let ev = inbox.recv().await.unwrap();
    assert!(replica.apply_push(ev));
    assert_eq!(replica.value("general", "tags"), Some(&json!({"os": "linux"})));

    sleep(Duration::from_secs(1)).await;
    assert!(host.writes().is_empty());
}
