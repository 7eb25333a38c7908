//! The literal end-to-end scenarios from spec §8, driven against
//! `FakeTransport`. Grounded on the shape of the teacher's
//! `http_client::tests::make_jsonrpc_request` — one scripted
//! conversation per test, assembled with a real client against a fake
//! backend rather than mocking the client's internals.

use std::time::Duration;

use serde_json::{json, Value};

use super::*;
use crate::events::Event;
use crate::test_support::{wait_until, FakeTransport};

fn sent_id(frame: &str) -> String {
    let value: Value = serde_json::from_str(frame).expect("sent frame is valid JSON");
    value["id"].as_str().expect("frame carries an id").to_string()
}

async fn connected_client() -> (DdpClient, crate::test_support::FakeTransportHandle) {
    let mut transport = FakeTransport::new();
    transport.push_frame(r#"{"msg":"connected","session":"s1"}"#);
    let handle = transport.handle();
    let client = DdpClient::from_transport(Box::new(transport), ClientConfig::default())
        .await
        .expect("handshake succeeds");
    (client, handle)
}

#[tokio::test]
async fn scenario_1_connect_and_method() {
    let (client, handle) = connected_client().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("echo", vec![json!(1), json!(2)], Duration::from_secs(5)).await }
    });

    wait_until(|| handle.sent_frames().iter().any(|f| f.contains(r#""method":"echo""#))).await;
    let id = sent_id(handle.sent_frames().last().unwrap());
    handle.push_frame(format!(r#"{{"msg":"result","id":"{}","result":[1,2]}}"#, id));

    let result = call.await.unwrap().unwrap();
    assert_eq!(result, json!([1, 2]));
}

#[tokio::test]
async fn scenario_2_version_fallback() {
    let mut transport = FakeTransport::new();
    transport.push_frame(r#"{"msg":"failed","version":"pre2"}"#);
    transport.push_frame(r#"{"msg":"connected","session":"s2"}"#);
    let handle = transport.handle();

    let client = DdpClient::from_transport(Box::new(transport), ClientConfig::default())
        .await
        .expect("handshake succeeds after falling back");

    let sent = handle.sent_frames();
    assert!(sent[0].contains(r#""version":"1""#));
    assert!(sent[1].contains(r#""version":"pre2""#));

    // A pending call now goes out using the negotiated session.
    drop(client);
}

#[tokio::test]
async fn scenario_3_subscription_ready_bundling() {
    let (client, handle) = connected_client().await;

    let client_a = client.clone();
    let sub_a = tokio::spawn(async move { client_a.subscribe("A", vec![], Duration::from_secs(5)).await });
    wait_until(|| handle.sent_frames().iter().any(|f| f.contains(r#""name":"A""#))).await;
    let id_a = sent_id(handle.sent_frames().iter().find(|f| f.contains(r#""name":"A""#)).unwrap());

    let client_b = client.clone();
    let sub_b = tokio::spawn(async move { client_b.subscribe("B", vec![], Duration::from_secs(5)).await });
    wait_until(|| handle.sent_frames().iter().any(|f| f.contains(r#""name":"B""#))).await;
    let id_b = sent_id(handle.sent_frames().iter().find(|f| f.contains(r#""name":"B""#)).unwrap());

    handle.push_frame(format!(r#"{{"msg":"ready","subs":["{}","{}"]}}"#, id_a, id_b));

    let resolved_a = sub_a.await.unwrap().unwrap();
    let resolved_b = sub_b.await.unwrap().unwrap();
    assert_eq!(resolved_a, id_a);
    assert_eq!(resolved_b, id_b);
}

#[tokio::test]
async fn scenario_4_collection_update_sequence() {
    let (client, handle) = connected_client().await;

    let (tx, rx) = std::sync::mpsc::channel();
    client
        .on("added", {
            let tx = tx.clone();
            move |event| {
                if let Event::Added { .. } = event {
                    tx.send("added").unwrap();
                }
            }
        })
        .await
        .unwrap();
    client
        .on("changed", {
            let tx = tx.clone();
            move |event| {
                if let Event::Changed { .. } = event {
                    tx.send("changed").unwrap();
                }
            }
        })
        .await
        .unwrap();
    client
        .on("removed", move |event| {
            if let Event::Removed { .. } = event {
                tx.send("removed").unwrap();
            }
        })
        .await
        .unwrap();

    handle.push_frame(r#"{"msg":"added","collection":"T","id":"1","fields":{"x":1}}"#);
    handle.push_frame(r#"{"msg":"changed","collection":"T","id":"1","fields":{"y":2},"cleared":["x"]}"#);
    handle.push_frame(r#"{"msg":"removed","collection":"T","id":"1"}"#);

    let mut seen = Vec::new();
    for _ in 0..200 {
        while let Ok(kind) = rx.try_recv() {
            seen.push(kind);
        }
        if seen.len() >= 3 {
            break;
        }
        futures_timer::Delay::new(Duration::from_millis(5)).await;
    }

    assert_eq!(seen, vec!["added", "changed", "removed"]);
    assert!(client.get("T", "1").await.unwrap().is_none());
}

#[tokio::test]
async fn scenario_5_method_error() {
    let (client, handle) = connected_client().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("fail", vec![], Duration::from_secs(5)).await }
    });
    wait_until(|| handle.sent_frames().iter().any(|f| f.contains(r#""method":"fail""#))).await;
    let id = sent_id(handle.sent_frames().last().unwrap());
    handle.push_frame(format!(
        r#"{{"msg":"result","id":"{}","error":{{"error":400,"reason":"bad"}}}}"#,
        id
    ));

    let err = call.await.unwrap().unwrap_err();
    match err {
        DdpError::Method(method_error) => {
            assert_eq!(method_error.error, json!(400));
            assert_eq!(method_error.reason.as_deref(), Some("bad"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn scenario_6_ping_liveness() {
    let (_client, handle) = connected_client().await;

    handle.push_frame(r#"{"msg":"ping","id":"p7"}"#);
    wait_until(|| handle.sent_frames().iter().any(|f| f.contains(r#""msg":"pong""#))).await;

    let sent = handle.sent_frames();
    let pong = sent.iter().find(|f| f.contains(r#""msg":"pong""#)).unwrap();
    assert!(pong.contains(r#""id":"p7""#));
}

#[tokio::test]
async fn close_cancels_every_pending_call() {
    let (client, handle) = connected_client().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call("never_replies", vec![], Duration::from_secs(30)).await }
    });
    wait_until(|| handle.sent_frames().iter().any(|f| f.contains(r#""method":"never_replies""#))).await;

    client.close().await.unwrap();
    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, DdpError::Cancelled));
}
