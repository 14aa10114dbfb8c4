use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use testdir::testdir;
use tokio_tungstenite::tungstenite;

use super::*;
use crate::routes;
use crate::state::test_helpers::{test_app_state, write_proc_fixture};

type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn serve(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, routes::app(state)).await.expect("serve");
    });
    addr
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(3), client.next())
            .await
            .expect("message within timeout")
            .expect("stream open")
            .expect("valid frame");
        if let tungstenite::Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("json message");
        }
    }
}

/// Read messages until one satisfies `pred`, skipping periodic snapshots.
async fn next_matching(client: &mut Client, pred: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..50 {
        let value = next_json(client).await;
        if pred(&value) {
            return value;
        }
    }
    panic!("no matching message");
}

// --- command handling ---

#[tokio::test]
async fn monitor_commands_update_session() {
    let root = testdir!();
    write_proc_fixture(&root);
    let state = test_app_state(&root, 2);
    let mut session = Session::default();
    let id = Uuid::new_v4();

    assert!(process_inbound_text(&state, &mut session, id, r#"{"monitor":"camd"}"#).await.is_none());
    assert_eq!(session.monitor.as_ref().map(ProcessMonitor::name), Some("camd"));

    assert!(process_inbound_text(&state, &mut session, id, r#"{"monitor":""}"#).await.is_none());
    assert!(session.monitor.is_none());
}

#[tokio::test]
async fn invalid_messages_are_ignored() {
    let root = testdir!();
    write_proc_fixture(&root);
    let state = test_app_state(&root, 2);
    let mut session = Session::default();
    let id = Uuid::new_v4();

    for text in ["not json", "[]", r#"{"other":true}"#, ""] {
        assert!(process_inbound_text(&state, &mut session, id, text).await.is_none(), "{text:?}");
    }
    let long = format!(r#"{{"monitor":"{}"}}"#, "x".repeat(200));
    assert!(process_inbound_text(&state, &mut session, id, &long).await.is_none());
    assert!(session.monitor.is_none());
}

#[tokio::test]
async fn list_processes_replies_with_names() {
    let root = testdir!();
    write_proc_fixture(&root);
    let state = test_app_state(&root, 2);
    let reply = process_inbound_text(&state, &mut Session::default(), Uuid::new_v4(), r#"{"list_processes":true}"#)
        .await
        .expect("reply");
    assert_eq!(reply, r#"{"processes":["camd"]}"#);
}

#[tokio::test]
async fn storage_replies_with_entries() {
    let root = testdir!();
    write_proc_fixture(&root);
    let state = test_app_state(&root, 2);
    let reply = process_inbound_text(&state, &mut Session::default(), Uuid::new_v4(), r#"{"storage":true}"#)
        .await
        .expect("reply");
    let value: Value = serde_json::from_str(&reply).expect("json");
    assert_eq!(value["storage"][0]["fs"], json!("ext4"));
}

#[tokio::test]
async fn snapshot_requires_a_sample() {
    let root = testdir!();
    write_proc_fixture(&root);
    let state = test_app_state(&root, 2);
    assert!(build_snapshot(&state, &mut Session::default(), Uuid::new_v4()).is_none());
}

// --- live socket ---

#[tokio::test]
async fn client_receives_periodic_snapshots() {
    let root = testdir!();
    write_proc_fixture(&root);
    let state = test_app_state(&root, 2);
    let addr = serve(state.clone()).await;

    let (mut client, _resp) = tokio_tungstenite::connect_async(format!("ws://{addr}/")).await.expect("connect");
    let first = next_json(&mut client).await;
    assert_eq!(first["clients"], json!({"connected": 1, "max": 2}));
    assert_eq!(first["mem_total_kb"], json!(2000));
    assert!(first.get("proc").is_none());
    assert!(state.sampler.is_running());

    let second = next_json(&mut client).await;
    assert!(second["mono_ms"].as_u64() >= first["mono_ms"].as_u64());
}

#[tokio::test]
async fn monitor_and_one_shot_requests_over_socket() {
    let root = testdir!();
    write_proc_fixture(&root);
    let addr = serve(test_app_state(&root, 2)).await;
    let (mut client, _resp) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await.expect("connect");

    client.send(tungstenite::Message::text(r#"{"monitor":"camd"}"#)).await.expect("send monitor");
    let with_proc = next_matching(&mut client, |v| v.get("proc").is_some()).await;
    assert_eq!(with_proc["proc"]["pid"], json!(42));
    assert_eq!(with_proc["proc"]["rss_kb"], json!(1024));

    client.send(tungstenite::Message::text(r#"{"monitor":"ghost"}"#)).await.expect("send monitor");
    let missing = next_matching(&mut client, |v| v.get("error").is_some()).await;
    assert_eq!(missing["error"]["type"], json!("process_not_found"));

    client.send(tungstenite::Message::text(r#"{"list_processes":true}"#)).await.expect("send list");
    let list = next_matching(&mut client, |v| v.get("processes").is_some()).await;
    assert_eq!(list, json!({"processes": ["camd"]}));
}

#[tokio::test]
async fn over_limit_upgrade_is_rejected_and_slot_is_reused() {
    let root = testdir!();
    write_proc_fixture(&root);
    let state = test_app_state(&root, 1);
    let addr = serve(state.clone()).await;
    let url = format!("ws://{addr}/");

    let (mut first, _resp) = tokio_tungstenite::connect_async(url.as_str()).await.expect("first connects");
    next_json(&mut first).await;

    match tokio_tungstenite::connect_async(url.as_str()).await {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("second client should be rejected"),
    }

    first.close(None).await.expect("close");
    drop(first);
    let mut reconnected = None;
    for _ in 0..40 {
        if state.slots.counts().connected == 0 {
            reconnected = Some(tokio_tungstenite::connect_async(url.as_str()).await.expect("slot freed"));
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(reconnected.is_some(), "slot was released after close");
}

#[tokio::test]
async fn last_disconnect_stops_sampler() {
    let root = testdir!();
    write_proc_fixture(&root);
    let state = test_app_state(&root, 2);
    let addr = serve(state.clone()).await;

    let (mut client, _resp) = tokio_tungstenite::connect_async(format!("ws://{addr}/")).await.expect("connect");
    next_json(&mut client).await;
    assert!(state.sampler.is_running());

    client.close(None).await.expect("close");
    drop(client);
    for _ in 0..40 {
        if !state.sampler.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("sampler still running after last client left");
}
