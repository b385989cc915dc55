//! Integration tests for the GPS bridge server.
//!
//! These tests start an actual listener and connect with WebSocket and HTTP
//! clients to verify end-to-end behavior.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};

use gpsbridge_core::config::TlsSettings;

use gpsbridge_protocol::decode_location;
use gpsbridge_providers::GgaParser;
use gpsbridge_server::{
    load_tls_acceptor, run_ingest, shared_store, BridgeServer, BroadcastHub, Location,
    ServerConfig,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FIX: &str = "$GNGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

fn public_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../public"))
}

/// Test certificate material: `server.crt`/`server.key` (PKCS#8) for
/// `localhost` and `127.0.0.1`, issued by `test-ca.crt`.
fn test_cert(name: &str) -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/certs")).join(name)
}

fn test_ca_pem() -> Vec<u8> {
    std::fs::read(test_cert("test-ca.crt")).unwrap()
}

/// Start a test server and return its address and hub.
async fn start_test_server() -> (SocketAddr, Arc<BroadcastHub>, tokio::task::JoinHandle<()>) {
    start_server(false).await
}

/// Start a test server terminating TLS with the test certificate.
async fn start_tls_test_server() -> (SocketAddr, Arc<BroadcastHub>, tokio::task::JoinHandle<()>) {
    start_server(true).await
}

async fn start_server(tls: bool) -> (SocketAddr, Arc<BroadcastHub>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        bind_addr: addr,
        public_dir: public_dir(),
        subscriber_queue: 16,
    };

    let hub = Arc::new(BroadcastHub::new(shared_store()));
    let mut server = BridgeServer::new(config, hub.clone());
    if tls {
        let acceptor = load_tls_acceptor(&TlsSettings {
            cert_path: test_cert("server.crt"),
            key_path: test_cert("server.key"),
        })
        .expect("Test certificate should load");
        server = server.with_tls(acceptor);
    }

    let handle = tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    (addr, hub, handle)
}

/// Connect a WebSocket client to the root path.
async fn connect_client(addr: SocketAddr) -> Client {
    let url = format!("ws://{}/", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("Failed to connect");
    ws_stream
}

/// Wait until the hub has registered `count` subscribers.
async fn wait_for_subscribers(hub: &BroadcastHub, count: usize) {
    for _ in 0..100 {
        if hub.subscriber_count().await == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "Expected {} subscribers, hub has {}",
        count,
        hub.subscriber_count().await
    );
}

/// Wait for a location frame with timeout.
async fn recv_location(ws: &mut Client) -> Result<Location, &'static str> {
    match timeout(Duration::from_secs(5), ws.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => decode_location(&text).map_err(|_| "Invalid frame"),
        Ok(Some(Ok(_))) => Err("Unexpected message type"),
        Ok(Some(Err(_))) => Err("WebSocket error"),
        Ok(None) => Err("Connection closed"),
        Err(_) => Err("Timeout"),
    }
}

/// Assert nothing arrives within a short window.
async fn assert_silent(ws: &mut Client) {
    let result = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "Expected no message, got {:?}", result);
}

#[tokio::test]
async fn test_no_message_before_first_fix() {
    let (addr, hub, handle) = start_test_server().await;

    let mut ws = connect_client(addr).await;
    wait_for_subscribers(&hub, 1).await;

    assert_silent(&mut ws).await;

    ws.close(None).await.ok();
    handle.abort();
}

#[tokio::test]
async fn test_late_join_replays_current_location_once() {
    let (addr, hub, handle) = start_test_server().await;

    hub.publish(Location::new(1.0, 2.0)).await;
    hub.publish(Location::new(48.1173, 11.5167)).await;

    let mut ws = connect_client(addr).await;

    let replayed = recv_location(&mut ws).await.expect("Should receive replay");
    assert_eq!(replayed, Location::new(48.1173, 11.5167));
    assert_silent(&mut ws).await;

    ws.close(None).await.ok();
    handle.abort();
}

#[tokio::test]
async fn test_ingest_reaches_every_client() {
    let (addr, hub, handle) = start_test_server().await;

    let mut first = connect_client(addr).await;
    let mut second = connect_client(addr).await;
    wait_for_subscribers(&hub, 2).await;

    let input = format!("$GNRMC,ignored\r\n{FIX}\r\n");
    let stats = run_ingest(BufReader::new(input.as_bytes()), &GgaParser::default(), &hub)
        .await
        .unwrap();
    assert_eq!(stats.fixes, 1);

    for ws in [&mut first, &mut second] {
        let location = recv_location(ws).await.expect("Should receive location");
        assert!((location.latitude - 48.1173).abs() < 1e-4);
        assert!((location.longitude - 11.5167).abs() < 1e-4);
    }

    first.close(None).await.ok();
    second.close(None).await.ok();
    handle.abort();
}

#[tokio::test]
async fn test_frame_is_plain_json_object() {
    let (addr, hub, handle) = start_test_server().await;

    let mut ws = connect_client(addr).await;
    wait_for_subscribers(&hub, 1).await;
    hub.publish(Location::new(-33.5, 151.25)).await;

    let msg = match timeout(Duration::from_secs(5), ws.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        other => panic!("Expected text frame, got {:?}", other),
    };
    let value: serde_json::Value = serde_json::from_str(&msg).expect("Valid JSON");

    assert_eq!(value, serde_json::json!({"latitude": -33.5, "longitude": 151.25}));

    ws.close(None).await.ok();
    handle.abort();
}

#[tokio::test]
async fn test_locations_arrive_in_order() {
    let (addr, hub, handle) = start_test_server().await;

    let mut ws = connect_client(addr).await;
    wait_for_subscribers(&hub, 1).await;

    for i in 1..=5 {
        hub.publish(Location::new(i as f64, -(i as f64))).await;
    }

    for i in 1..=5 {
        let location = recv_location(&mut ws).await.expect("Should receive location");
        assert_eq!(location, Location::new(i as f64, -(i as f64)));
    }

    ws.close(None).await.ok();
    handle.abort();
}

#[tokio::test]
async fn test_disconnect_removes_subscriber() {
    let (addr, hub, handle) = start_test_server().await;

    let mut leaving = connect_client(addr).await;
    let mut staying = connect_client(addr).await;
    wait_for_subscribers(&hub, 2).await;

    leaving.close(None).await.ok();
    wait_for_subscribers(&hub, 1).await;

    let report = hub.publish(Location::new(5.0, 6.0)).await;
    assert_eq!(report.delivered, 1);

    let location = recv_location(&mut staying).await.expect("Should receive location");
    assert_eq!(location, Location::new(5.0, 6.0));

    staying.close(None).await.ok();
    handle.abort();
}

#[tokio::test]
async fn test_ws_path_alias() {
    let (addr, hub, handle) = start_test_server().await;
    hub.publish(Location::new(7.0, 8.0)).await;

    let url = format!("ws://{}/ws", addr);
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("Failed to connect");

    let location = recv_location(&mut ws).await.expect("Should receive replay");
    assert_eq!(location, Location::new(7.0, 8.0));

    ws.close(None).await.ok();
    handle.abort();
}

#[tokio::test]
async fn test_index_page_served() {
    let (addr, _hub, handle) = start_test_server().await;

    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains("<html"));

    handle.abort();
}

#[tokio::test]
async fn test_location_endpoint() {
    let (addr, hub, handle) = start_test_server().await;
    let url = format!("http://{}/location", addr);

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    hub.publish(Location::new(48.1173, 11.5167)).await;

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let value: serde_json::Value = response.json().await.unwrap();
    assert_eq!(value["latitude"], 48.1173);
    assert_eq!(value["longitude"], 11.5167);

    handle.abort();
}

#[tokio::test]
async fn test_unknown_static_path_is_not_found() {
    let (addr, _hub, handle) = start_test_server().await;

    let response = reqwest::get(format!("http://{}/missing.js", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    handle.abort();
}

#[tokio::test]
async fn test_late_join_replay_over_tls() {
    let (addr, hub, handle) = start_tls_test_server().await;
    hub.publish(Location::new(48.1173, 11.5167)).await;

    let ca = native_tls::Certificate::from_pem(&test_ca_pem()).unwrap();
    let connector = native_tls::TlsConnector::builder()
        .add_root_certificate(ca)
        .build()
        .unwrap();

    let url = format!("wss://127.0.0.1:{}/", addr.port());
    let (mut ws, _) = tokio_tungstenite::connect_async_tls_with_config(
        &url,
        None,
        false,
        Some(Connector::NativeTls(connector)),
    )
    .await
    .expect("Failed to connect over TLS");

    let replayed = recv_location(&mut ws).await.expect("Should receive replay");
    assert_eq!(replayed, Location::new(48.1173, 11.5167));
    assert_silent(&mut ws).await;

    hub.publish(Location::new(1.5, 2.5)).await;
    let location = recv_location(&mut ws).await.expect("Should receive location");
    assert_eq!(location, Location::new(1.5, 2.5));

    ws.close(None).await.ok();
    handle.abort();
}

#[tokio::test]
async fn test_index_page_over_https() {
    let (addr, _hub, handle) = start_tls_test_server().await;

    let client = reqwest::Client::builder()
        .add_root_certificate(reqwest::Certificate::from_pem(&test_ca_pem()).unwrap())
        .build()
        .unwrap();

    let response = client
        .get(format!("https://127.0.0.1:{}/", addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.text().await.unwrap().contains("<html"));

    handle.abort();
}

#[tokio::test]
async fn test_plain_client_refused_by_tls_server() {
    let (addr, hub, handle) = start_tls_test_server().await;

    let url = format!("ws://{}/", addr);
    let result = timeout(Duration::from_secs(5), tokio_tungstenite::connect_async(&url)).await;

    assert!(matches!(result, Ok(Err(_))), "plain WebSocket must not connect");
    assert_eq!(hub.subscriber_count().await, 0);

    handle.abort();
}
