// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Two UI replicas kept in step through a real hub.

use prefs_app_core::DocumentService;
use prefs_dry_tests::InMemoryBlobStore;
use prefs_session_client::{PushInbox, PushKind, SessionClient};
use prefs_session_service::{open_store, HostPorts, HostSettings, Hub};
use prefs_ui_core::{Replica, ReplicaError};
use serde_json::json;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::time::{timeout, Duration};

fn hub() -> Hub<InMemoryBlobStore> {
    let docs = DocumentService::new(InMemoryBlobStore::new());
    let settings = HostSettings::load_or_init(&docs).unwrap();
    let store = open_store(docs, &settings).unwrap();
    Hub::new(store, HostPorts::default(), settings.echo_to_origin)
}

async fn open(hub: &Hub<InMemoryBlobStore>, label: &str) -> (Replica<SessionClient>, PushInbox) {
    let (client_end, host_end) = UnixStream::pair().unwrap();
    let serving = hub.clone();
    tokio::spawn(async move { serving.serve_connection(host_end).await });
    let (client, inbox) = SessionClient::over(client_end, Some(label.into()))
        .await
        .unwrap();
    let replica = Replica::load(Arc::new(client)).await.unwrap();
    (replica, inbox)
}

#[tokio::test]
async fn edit_in_one_window_shows_up_in_the_other() {
    let hub = hub();
    let (mut left, mut left_inbox) = open(&hub, "left").await;
    let (mut right, mut right_inbox) = open(&hub, "right").await;
    assert_eq!(right.value("theme", "theme"), Some(&json!("system")));

    left.edit("theme", "theme", json!("dark")).unwrap();

    let ev = timeout(Duration::from_secs(2), right_inbox.recv())
        .await
        .expect("push in time")
        .expect("session open");
    assert!(matches!(ev.kind, PushKind::PreferencesUpdated(_)));
    assert!(right.apply_push(ev));
    assert_eq!(right.value("theme", "theme"), Some(&json!("dark")));
    assert_eq!(hub.value("theme", "theme").await, Some(json!("dark")));

    // the writer is not echoed its own document
    assert!(left_inbox.drain(8).is_empty());
    left.close().await.unwrap();
}

#[tokio::test]
async fn editor_refusals_never_reach_the_host() {
    let hub = hub();
    let (mut replica, _inbox) = open(&hub, "main").await;
    assert!(matches!(
        replica.edit("about", "age", json!(400)),
        Err(ReplicaError::Field(_))
    ));
    assert!(matches!(
        replica.edit("lab", "anything", json!(1)),
        Err(ReplicaError::UnknownField { .. })
    ));
    replica.flush().await;
    assert_eq!(hub.value("about", "age").await, None);
}

#[tokio::test]
async fn sealed_secret_round_trips_through_the_host_key() {
    let hub = hub();
    let (mut replica, _inbox) = open(&hub, "main").await;
    replica
        .set_secret("security", "token", "swordfish")
        .await
        .unwrap();
    replica.flush().await;

    let stored = timeout(Duration::from_secs(2), async {
        loop {
            if let Some(v) = hub.value("security", "token").await {
                return v;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("write lands");
    let sealed = stored.as_str().unwrap();
    assert_ne!(sealed, "swordfish");
    assert_eq!(hub.decrypt(sealed).await.unwrap(), "swordfish");
}
