mod common;

use std::time::Duration;

use resilient_ws::{
    ClientOptions, CloseInfo, Payload, ReadyState, SocketError, SocketEvent, WebSocketClient,
};
use serde_json::json;
use tokio::time::advance;

use common::{MockConnector, Recorder, settle};

fn manual() -> ClientOptions {
    ClientOptions::builder().automatic_open(false).build().unwrap()
}

fn client_with(options: ClientOptions) -> (WebSocketClient, MockConnector, Recorder) {
    let connector = MockConnector::default();
    let client =
        WebSocketClient::with_connector("ws://localhost:9000/socket", options, connector.clone())
            .unwrap();
    let recorder = Recorder::attach(&client, &["chat"]);
    (client, connector, recorder)
}

/// Opens the client and its first transport.
async fn connected(options: ClientOptions) -> (WebSocketClient, MockConnector, Recorder) {
    let (client, connector, recorder) = client_with(options);
    client.open().unwrap();
    settle().await;
    connector.transport(0).open(None);
    settle().await;
    assert_eq!(client.ready_state(), ReadyState::Open);
    (client, connector, recorder)
}

#[tokio::test(start_paused = true)]
async fn test_send_while_disconnected_is_queued() {
    let (client, connector, _recorder) = client_with(manual());

    client.send("greet", &json!({"x": 1})).unwrap();
    settle().await;

    assert_eq!(client.queued_messages(), 1);
    assert_eq!(connector.attempts(), 0);
    assert_eq!(client.ready_state(), ReadyState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_open_flushes_queue_once_and_starts_heartbeat() {
    let (client, connector, recorder) = client_with(manual());
    client.send("greet", &json!({"x": 1})).unwrap();
    client.open().unwrap();
    settle().await;

    let transport = connector.transport(0);
    transport.open(None);
    settle().await;

    assert!(recorder.events().contains(&SocketEvent::Open {
        protocol: None,
        reconnect_attempt: false
    }));
    assert_eq!(
        transport.sent(),
        vec![Payload::Text(r#"{"payload":{"x":1},"type":"greet"}"#.to_string())]
    );
    assert_eq!(client.queued_messages(), 0);

    advance(Duration::from_millis(50_000)).await;
    settle().await;
    assert_eq!(transport.sent().last(), Some(&Payload::Text("ping".to_string())));

    advance(Duration::from_millis(50_000)).await;
    settle().await;
    let probes = transport
        .sent()
        .iter()
        .filter(|payload| payload.as_text() == Some("ping"))
        .count();
    assert_eq!(probes, 2);
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_reconnects_after_backoff() {
    let (client, connector, recorder) = connected(manual()).await;

    connector.transport(0).closed(1001, "going away");
    settle().await;

    assert_eq!(
        recorder.events().last(),
        Some(&SocketEvent::Connecting(Some(CloseInfo::new(
            1001,
            "going away",
            true
        ))))
    );
    assert_eq!(client.ready_state(), ReadyState::Connecting);

    advance(Duration::from_millis(999)).await;
    settle().await;
    assert_eq!(connector.attempts(), 1);

    advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);
    assert_eq!(client.reconnect_attempts(), 1);

    connector.transport(1).open(None);
    settle().await;
    assert_eq!(
        recorder.events().last(),
        Some(&SocketEvent::Open {
            protocol: None,
            reconnect_attempt: true
        })
    );
    assert_eq!(client.reconnect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_normal_close_does_not_reconnect() {
    let (client, connector, recorder) = connected(manual()).await;

    connector.transport(0).closed(1000, "");
    settle().await;

    assert_eq!(
        recorder.events().last(),
        Some(&SocketEvent::Close(CloseInfo::new(1000, "", true)))
    );
    assert_eq!(client.ready_state(), ReadyState::Closed);

    advance(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_structured_message_emits_raw_and_typed_events() {
    let (_client, connector, recorder) = connected(manual()).await;

    let raw = r#"{"type":"chat","payload":{"text":"hi"}}"#;
    connector.transport(0).message(raw);
    settle().await;

    let events = recorder.events();
    let tail = &events[events.len() - 2..];
    assert_eq!(tail[0], SocketEvent::Message(Payload::Text(raw.to_string())));
    assert_eq!(
        tail[1],
        SocketEvent::Typed {
            name: "chat".to_string(),
            payload: json!({"text": "hi"})
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_cap_stops_creating_transports() {
    let options = ClientOptions::builder()
        .automatic_open(false)
        .max_reconnect_attempts(2)
        .build()
        .unwrap();
    let (client, connector, _recorder) = client_with(options);
    client.open().unwrap();
    settle().await;

    for attempt in 0..3 {
        assert_eq!(connector.attempts(), attempt + 1);
        connector.transport(attempt).fail("connection refused");
        settle().await;
        advance(Duration::from_secs(30)).await;
        settle().await;
    }

    advance(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(connector.attempts(), 3);
    let status = client.status();
    assert!(status.gave_up);
    assert_eq!(status.ready_state, ReadyState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_open_timeout_forces_retry() {
    let (client, connector, recorder) = client_with(manual());
    client.open().unwrap();
    settle().await;

    advance(Duration::from_millis(2000)).await;
    settle().await;

    assert_eq!(connector.transport(0).closes(), vec![(1006, "open timeout".to_string())]);
    assert!(matches!(
        recorder.events().last(),
        Some(SocketEvent::Connecting(Some(info))) if info.code == 1006
    ));

    advance(Duration::from_millis(1000)).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);
    assert_eq!(client.reconnect_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_while_open_is_noop() {
    let (client, connector, _recorder) = connected(manual()).await;

    client.open().unwrap();
    settle().await;

    assert_eq!(connector.attempts(), 1);
    assert_eq!(client.ready_state(), ReadyState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_expired_queue_entries_are_dropped() {
    let options = ClientOptions::builder()
        .automatic_open(false)
        .message_queue_timeout(Some(Duration::from_secs(1)))
        .build()
        .unwrap();
    let (client, connector, _recorder) = client_with(options);

    client.send_raw("stale").unwrap();
    settle().await;
    advance(Duration::from_secs(2)).await;
    client.send_raw("fresh").unwrap();
    client.open().unwrap();
    settle().await;

    connector.transport(0).open(None);
    settle().await;
    assert_eq!(connector.transport(0).sent(), vec![Payload::Text("fresh".into())]);
}

#[tokio::test(start_paused = true)]
async fn test_queue_preserves_order_across_reconnect() {
    let (client, connector, _recorder) = connected(manual()).await;
    connector.transport(0).closed(1006, "");
    settle().await;

    for n in 0..3 {
        client.send("seq", &json!({ "n": n })).unwrap();
    }
    settle().await;
    assert_eq!(client.queued_messages(), 3);

    advance(Duration::from_millis(1000)).await;
    settle().await;
    connector.transport(1).open(None);
    settle().await;

    let sent: Vec<serde_json::Value> = connector
        .transport(1)
        .sent()
        .iter()
        .filter_map(|payload| payload.as_text().map(|text| serde_json::from_str(text).unwrap()))
        .collect();
    assert_eq!(
        sent,
        (0..3)
            .map(|n| json!({"type": "seq", "payload": {"n": n}}))
            .collect::<Vec<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_closes_transport() {
    let (client, connector, recorder) = connected(manual()).await;

    client.disconnect().unwrap();
    settle().await;

    assert_eq!(connector.transport(0).closes(), vec![(1000, String::new())]);
    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert!(matches!(recorder.events().last(), Some(SocketEvent::Close(_))));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_waiting_cancels_reconnect() {
    let (client, connector, recorder) = connected(manual()).await;
    connector.transport(0).closed(1006, "");
    settle().await;

    client.disconnect().unwrap();
    settle().await;
    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert!(matches!(recorder.events().last(), Some(SocketEvent::Close(_))));

    advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_handshake_is_terminal() {
    let (client, connector, _recorder) = client_with(manual());
    client.open().unwrap();
    settle().await;

    client.disconnect().unwrap();
    settle().await;

    assert_eq!(connector.transport(0).closes(), vec![(1000, String::new())]);
    assert_eq!(client.ready_state(), ReadyState::Closed);

    // a late open from the abandoned attempt changes nothing
    connector.transport(0).open(None);
    advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(client.ready_state(), ReadyState::Closed);
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_application_close_before_open_does_not_connect() {
    let (client, connector, recorder) = client_with(manual());

    client.close(4000, "bye").unwrap();
    advance(Duration::from_secs(2)).await;
    settle().await;

    assert_eq!(connector.attempts(), 0);
    assert_eq!(client.ready_state(), ReadyState::Connecting);
    assert!(recorder.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_frames_returned_by_transport_are_resent() {
    let (client, connector, _recorder) = connected(manual()).await;
    let first = connector.transport(0);
    first.unsent(&["a", "b"]);
    first.closed(1006, "");
    settle().await;
    assert_eq!(client.queued_messages(), 2);

    advance(Duration::from_millis(1000)).await;
    settle().await;
    connector.transport(1).open(None);
    settle().await;

    assert_eq!(
        connector.transport(1).sent(),
        vec![Payload::Text("a".to_string()), Payload::Text("b".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_close_code_is_rejected() {
    let (client, connector, _recorder) = connected(manual()).await;

    assert!(matches!(
        client.close(1001, ""),
        Err(SocketError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.close(4000, "x".repeat(124)),
        Err(SocketError::InvalidArgument(_))
    ));
    settle().await;
    assert!(connector.transport(0).closes().is_empty());

    client.close(4000, "app shutdown").unwrap();
    settle().await;
    // 4000 is not a normal code, so the connection comes back
    assert_eq!(client.ready_state(), ReadyState::Connecting);
    advance(Duration::from_millis(1000)).await;
    settle().await;
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_blank_message_type_is_rejected() {
    let (client, _connector, _recorder) = client_with(manual());
    assert!(matches!(
        client.send("  ", &json!({})),
        Err(SocketError::InvalidArgument(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_is_reported() {
    let (_client, connector, recorder) = connected(manual()).await;

    connector.transport(0).fail("connection reset");
    settle().await;

    let events = recorder.events();
    assert!(events.iter().any(|event| matches!(
        event,
        SocketEvent::Error(failure) if failure.message == "connection reset"
    )));
    assert!(matches!(
        events.last(),
        Some(SocketEvent::Connecting(Some(info))) if info.code == 1006
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_closes_transport() {
    let (client, connector, _recorder) = connected(manual()).await;
    let clone = client.clone();

    drop(client);
    settle().await;
    assert!(connector.transport(0).closes().is_empty());

    drop(clone);
    settle().await;
    assert_eq!(
        connector.transport(0).closes(),
        vec![(1000, "client dropped".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_negotiated_protocol_and_requested_protocols() {
    let options = ClientOptions::builder()
        .automatic_open(false)
        .protocol("chat.v2")
        .protocol("chat.v1")
        .build()
        .unwrap();
    let (client, connector, _recorder) = client_with(options);
    client.open().unwrap();
    settle().await;

    let transport = connector.transport(0);
    assert_eq!(transport.request().protocols, vec!["chat.v2", "chat.v1"]);
    transport.open(Some("chat.v1"));
    settle().await;
    assert_eq!(client.protocol().as_deref(), Some("chat.v1"));
}

#[tokio::test(start_paused = true)]
async fn test_automatic_open_connects_to_resolved_url() {
    let options = ClientOptions::builder()
        .path("/v2/socket")
        .query("token", "abc")
        .build()
        .unwrap();
    let connector = MockConnector::default();
    let client =
        WebSocketClient::with_connector("wss://example.com/v1?lang=en", options, connector.clone())
            .unwrap();
    settle().await;

    assert_eq!(client.url(), "wss://example.com/v2/socket?lang=en&token=abc");
    assert_eq!(connector.attempts(), 1);
    assert_eq!(connector.transport(0).request().url, client.url());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_state() {
    let (client, connector, _recorder) = client_with(manual());
    client.open().unwrap();
    settle().await;

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.wait_for_state(ReadyState::Open).await })
    };
    connector.transport(0).open(None);
    waiter.await.unwrap().unwrap();
}

#[test]
fn test_unknown_option_fails_construction() {
    let err = WebSocketClient::from_json("ws://localhost:9000", json!({"pingIntervall": 10}))
        .unwrap_err();
    assert!(matches!(err, SocketError::InvalidArgument(_)));
}

#[test]
fn test_malformed_endpoint_fails_construction() {
    let err = WebSocketClient::with_connector("localhost:9000", manual(), MockConnector::default())
        .unwrap_err();
    assert!(matches!(err, SocketError::MalformedEndpoint(_)));
}
