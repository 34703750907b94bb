//! End-to-end tests using real WebSocket clients against a server on port 0.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use chorus_live::{CloseInfo, RecordedCall, RecordingSession, UpstreamEvent};
use chorus_server::config::ServerConfig;
use chorus_server::server::RelayServer;
use futures::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestRelay {
    ws_url: String,
    http_url: String,
    server: Arc<RelayServer>,
    upstream: Arc<RecordingSession>,
    events: mpsc::Sender<UpstreamEvent>,
}

async fn boot_with(config: ServerConfig) -> TestRelay {
    let upstream = Arc::new(RecordingSession::new());
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
    let server = Arc::new(RelayServer::new(config, upstream.clone(), metrics_handle));

    let (events, events_rx) = mpsc::channel(16);
    let bridge = server.upstream_bridge(events_rx);
    let _bridge_handle = tokio::spawn(bridge.run(server.shutdown().token()));

    let (addr, _handle) = server.listen().await.unwrap();
    TestRelay {
        ws_url: format!("ws://{addr}/ws"),
        http_url: format!("http://{addr}"),
        server,
        upstream,
        events,
    }
}

async fn boot() -> TestRelay {
    boot_with(ServerConfig::default()).await
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Try to read a JSON message within `dur`. Returns None on timeout.
async fn try_read_json(ws: &mut WsStream, dur: Duration) -> Option<Value> {
    timeout(dur, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<Value>(text.as_str()).ok();
                }
                Some(Ok(_)) => {}
                _ => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

fn audio_event(data: &str) -> UpstreamEvent {
    let msg = serde_json::from_value(json!({
        "serverContent": {
            "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": data}}]}
        }
    }))
    .unwrap();
    UpstreamEvent::Message(Box::new(msg))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_broadcast_reaches_all_then_only_remaining() {
    let relay = boot().await;
    let mut a = connect(&relay.ws_url).await;
    let mut b = connect(&relay.ws_url).await;
    let registry = relay.server.registry().clone();
    wait_until(|| registry.len() == 2).await;

    relay.events.send(UpstreamEvent::Open).await.unwrap();
    relay.events.send(audio_event("X")).await.unwrap();

    let expected_x = json!({"type": "audioStream", "data": "X"});
    assert_eq!(read_json(&mut a).await, expected_x);
    assert_eq!(read_json(&mut b).await, expected_x);

    a.close(None).await.unwrap();
    wait_until(|| registry.len() == 1).await;

    relay.events.send(audio_event("Y")).await.unwrap();
    assert_eq!(read_json(&mut b).await, json!({"type": "audioStream", "data": "Y"}));
    assert!(try_read_json(&mut a, Duration::from_millis(200)).await.is_none());

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_text_turn_routes_upstream() {
    let relay = boot().await;
    let mut ws = connect(&relay.ws_url).await;

    ws.send(Message::text(json!({"type": "contentUpdateText", "text": "hello"}).to_string()))
        .await
        .unwrap();

    let upstream = relay.upstream.clone();
    wait_until(|| !upstream.calls().is_empty()).await;
    assert_eq!(relay.upstream.calls(), vec![RecordedCall::TextTurn("hello".into())]);

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_audio_chunks_route_in_order() {
    let relay = boot().await;
    let mut ws = connect(&relay.ws_url).await;

    let chunks: Vec<String> = (0u8..3)
        .map(|i| base64::engine::general_purpose::STANDARD.encode([i; 320]))
        .collect();
    for chunk in &chunks {
        ws.send(Message::text(json!({"type": "realtimeInput", "audioData": chunk}).to_string()))
            .await
            .unwrap();
    }

    let upstream = relay.upstream.clone();
    wait_until(|| upstream.calls().len() == 3).await;
    let expected: Vec<RecordedCall> = chunks.into_iter().map(RecordedCall::RealtimeMedia).collect();
    assert_eq!(relay.upstream.calls(), expected);

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_binary_json_frames_are_routed() {
    let relay = boot().await;
    let mut ws = connect(&relay.ws_url).await;

    let frame = json!({"type": "contentUpdateText", "text": "from binary"}).to_string();
    ws.send(Message::binary(frame.into_bytes())).await.unwrap();

    let upstream = relay.upstream.clone();
    wait_until(|| !upstream.calls().is_empty()).await;
    assert_eq!(relay.upstream.calls(), vec![RecordedCall::TextTurn("from binary".into())]);

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_malformed_message_keeps_connection_open() {
    let relay = boot().await;
    let mut ws = connect(&relay.ws_url).await;
    let registry = relay.server.registry().clone();
    wait_until(|| registry.len() == 1).await;

    ws.send(Message::text("not json at all")).await.unwrap();
    ws.send(Message::text(r#"{"type":"somethingNew","x":1}"#)).await.unwrap();
    ws.send(Message::text(r#"{"type":"contentUpdateText","text":"still here"}"#))
        .await
        .unwrap();

    let upstream = relay.upstream.clone();
    wait_until(|| !upstream.calls().is_empty()).await;
    assert_eq!(relay.upstream.calls(), vec![RecordedCall::TextTurn("still here".into())]);
    assert_eq!(registry.len(), 1);

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_upstream_close_keeps_clients_connected() {
    let relay = boot().await;
    let mut ws = connect(&relay.ws_url).await;
    let registry = relay.server.registry().clone();
    wait_until(|| registry.len() == 1).await;

    relay.events.send(UpstreamEvent::Open).await.unwrap();
    relay
        .events
        .send(UpstreamEvent::Close(CloseInfo::local("upstream gone")))
        .await
        .unwrap();
    relay.events.send(audio_event("after-close")).await.unwrap();

    assert!(try_read_json(&mut ws, Duration::from_millis(300)).await.is_none());
    assert_eq!(registry.len(), 1);

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_connection_limit_returns_503() {
    let relay = boot_with(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;
    let _first = connect(&relay.ws_url).await;
    let registry = relay.server.registry().clone();
    wait_until(|| registry.len() == 1).await;

    let Err(err) = connect_async(relay.ws_url.as_str()).await else {
        panic!("second connection should be refused");
    };
    match err {
        tokio_tungstenite::tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 503),
        other => panic!("expected HTTP 503, got {other:?}"),
    }

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_unresponsive_client_is_removed() {
    let relay = boot_with(ServerConfig {
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_timeout: Duration::from_millis(150),
        ..ServerConfig::default()
    })
    .await;
    // never polled, so Pings go unanswered
    let _silent = connect(&relay.ws_url).await;
    let registry = relay.server.registry().clone();
    wait_until(|| registry.len() == 1).await;
    wait_until(|| registry.is_empty()).await;

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_health_reports_connections_and_upstream() {
    let relay = boot().await;
    let _ws = connect(&relay.ws_url).await;
    let registry = relay.server.registry().clone();
    wait_until(|| registry.len() == 1).await;
    relay.events.send(UpstreamEvent::Open).await.unwrap();

    let client = reqwest::Client::new();
    let mut body = Value::Null;
    for _ in 0..50 {
        body = client
            .get(format!("{}/health", relay.http_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["upstream"] == "open" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["upstream"], "open");

    relay.server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_graceful_shutdown_sends_close() {
    let relay = boot().await;
    let mut ws = connect(&relay.ws_url).await;
    let registry = relay.server.registry().clone();
    wait_until(|| registry.len() == 1).await;

    relay.server.shutdown().shutdown();

    let close = timeout(TIMEOUT, async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(frame)) => return frame,
                Ok(_) => {}
                Err(_) => return None,
            }
        }
        None
    })
    .await
    .expect("no close within timeout");
    assert_eq!(close.map(|f| u16::from(f.code)), Some(1001));
    wait_until(|| registry.is_empty()).await;
}
