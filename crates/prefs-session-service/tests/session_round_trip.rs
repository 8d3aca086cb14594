// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Real client against a real hub over in-process socket pairs.

use prefs_app_core::DocumentService;
use prefs_dry_tests::InMemoryBlobStore;
use prefs_session_client::{PreferenceSink, PreferencesApi, PushInbox, PushKind, SessionClient};
use prefs_session_proto::{DialogOptions, OpenDialogResult};
use prefs_session_service::{open_store, HostPorts, HostSettings, Hub};
use serde_json::json;
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};

fn hub_with_blobs() -> (Hub<InMemoryBlobStore>, InMemoryBlobStore) {
    let blobs = InMemoryBlobStore::new();
    let docs = DocumentService::new(blobs.clone());
    let settings = HostSettings::load_or_init(&docs).unwrap();
    let store = open_store(docs, &settings).unwrap();
    let hub = Hub::new(store, HostPorts::default(), settings.echo_to_origin);
    (hub, blobs)
}

fn hub() -> Hub<InMemoryBlobStore> {
    hub_with_blobs().0
}

async fn connect(hub: &Hub<InMemoryBlobStore>, label: &str) -> (SessionClient, PushInbox) {
    let (client_end, host_end) = UnixStream::pair().unwrap();
    let hub = hub.clone();
    tokio::spawn(async move { hub.serve_connection(host_end).await });
    SessionClient::over(client_end, Some(label.into()))
        .await
        .unwrap()
}

async fn next_push(inbox: &mut PushInbox) -> prefs_session_client::PushEvent {
    timeout(Duration::from_secs(2), inbox.recv())
        .await
        .expect("push in time")
        .expect("session open")
}

#[tokio::test]
async fn startup_requests_are_answered() {
    let hub = hub();
    let (client, _inbox) = connect(&hub, "main").await;
    assert!(client.replica_id() > 0);

    let sections = client.get_sections().await.unwrap();
    assert!(sections.iter().any(|s| s.id == "lab" && !s.is_enabled()));

    let prefs = client.get_preferences().await.unwrap();
    for s in sections.iter().filter(|s| s.is_enabled()) {
        assert!(prefs.contains_section(&s.id), "missing {}", s.id);
    }
    assert_eq!(prefs.value("theme", "theme"), Some(&json!("system")));

    let config = client.get_config().await.unwrap();
    assert_eq!(config.debounce, 150);

    let sealed = client.encrypt("swordfish").await.unwrap();
    assert!(sealed.starts_with("enc:v1:"));
    assert_eq!(hub.decrypt(&sealed).await.unwrap(), "swordfish");

    let picked = client
        .show_open_dialog(DialogOptions::default())
        .await
        .unwrap();
    assert_eq!(picked, OpenDialogResult::Cancelled);
    client.close_preferences().await.unwrap();
}

#[tokio::test]
async fn write_from_one_replica_reaches_the_other() {
    let hub = hub();
    let (writer, _writer_inbox) = connect(&hub, "writer").await;
    let (_reader, mut reader_inbox) = connect(&hub, "reader").await;

    let mut doc = writer.get_preferences().await.unwrap();
    doc.set_field("theme", "theme", json!("dark"));
    writer.set_preferences(&doc).unwrap();

    let push = next_push(&mut reader_inbox).await;
    assert_eq!(push.kind, PushKind::PreferencesUpdated(doc));
    assert_eq!(hub.value("theme", "theme").await, Some(json!("dark")));
}

#[tokio::test]
async fn successive_pushes_arrive_in_emission_order() {
    let hub = hub();
    let (_client, mut inbox) = connect(&hub, "watcher").await;

    hub.set_value("theme", "theme", json!("light")).await.unwrap();
    hub.set_value("theme", "theme", json!("dark")).await.unwrap();

    let p1 = next_push(&mut inbox).await;
    let p2 = next_push(&mut inbox).await;
    assert!(p2.ts > p1.ts);
    let PushKind::PreferencesUpdated(last) = p2.kind else {
        panic!("expected preferences push");
    };
    assert_eq!(last.value("theme", "theme"), Some(&json!("dark")));
}

#[tokio::test]
async fn rejected_write_surfaces_on_the_writer_only() {
    let (hub, blobs) = hub_with_blobs();
    let (writer, mut writer_inbox) = connect(&hub, "writer").await;
    let (_other, mut other_inbox) = connect(&hub, "other").await;

    blobs.set_fail_on_save(true);
    let mut doc = writer.get_preferences().await.unwrap();
    doc.set_field("theme", "theme", json!("dark"));
    writer.set_preferences(&doc).unwrap();

    let PushKind::WriteRejected(err) = next_push(&mut writer_inbox).await.kind else {
        panic!("expected a rejection");
    };
    assert_eq!(err.name, "E_PERSIST_FAILED");
    assert_eq!(hub.value("theme", "theme").await, Some(json!("system")));
    assert!(other_inbox.drain(10).is_empty());

    blobs.set_fail_on_save(false);
    hub.reset_to_defaults().await.unwrap();
    let restored = next_push(&mut other_inbox).await;
    assert!(matches!(
        restored.kind,
        PushKind::PreferencesUpdated(ref d) if d.value("theme", "theme") == Some(&json!("system"))
    ));
}

#[tokio::test]
async fn dropping_a_client_detaches_it() {
    let hub = hub();
    let (client, inbox) = connect(&hub, "short-lived").await;
    assert_eq!(hub.connection_count().await, 1);
    drop(client);
    drop(inbox);
    // the host notices EOF once the client's tasks wind down
    for _ in 0..50 {
        if hub.connection_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("connection was never unregistered");
}
