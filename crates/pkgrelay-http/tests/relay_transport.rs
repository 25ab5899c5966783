//! Relay transport against a mock relay server.

mod common;

use std::sync::atomic::Ordering;

use pkgrelay_core::{
    CredentialDomain, RelayPayload, RelayTransportPort, TransferProgress, TransportError,
};
use pkgrelay_http::HttpRelayTransport;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{DropFlagReader, config_for, empty_store, store_with};

const DESTINATION: &str = "42/release/arm64-v8a/com.example.app.bin";

#[tokio::test]
async fn large_upload_stays_within_transfer_window() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload_stream"))
        .and(query_param("path", DESTINATION))
        .and(header("authorization", "Bearer relay-token"))
        .and(header("content-type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let size: u64 = 4 * 1024 * 1024;
    let transport = HttpRelayTransport::new(
        &config_for(&server.uri()),
        store_with(CredentialDomain::Relay, "relay-token"),
    )
    .unwrap();
    let payload = RelayPayload::new(Box::new(tokio::io::repeat(0xAB).take(size)), Some(size));

    let receipt = tokio_test::assert_ok!(transport.relay(DESTINATION, payload).await);

    assert_eq!(receipt.status, 201);
    assert_eq!(receipt.bytes_sent, size);
    assert!(receipt.peak_chunk <= 16 * 1024);
    assert_eq!(receipt.destination, DESTINATION);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body.len() as u64, size);
    assert!(requests[0].body.iter().all(|b| *b == 0xAB));
}

#[tokio::test]
async fn declared_length_is_sent_as_content_length() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = HttpRelayTransport::new(
        &config_for(&server.uri()),
        store_with(CredentialDomain::Relay, "t"),
    )
    .unwrap();
    transport
        .relay(DESTINATION, RelayPayload::new(Box::new(&b"hello"[..]), Some(5)))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let length = requests[0]
        .headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(length.as_deref(), Some("5"));
    assert_eq!(requests[0].body, b"hello");
}

#[tokio::test]
async fn non_success_status_is_rejected_and_source_closed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(507).set_body_string("disk full"))
        .mount(&server)
        .await;

    let transport = HttpRelayTransport::new(
        &config_for(&server.uri()),
        store_with(CredentialDomain::Relay, "t"),
    )
    .unwrap();
    let (reader, dropped) = DropFlagReader::new(&b"abc"[..]);

    let err = transport
        .relay(DESTINATION, RelayPayload::new(Box::new(reader), Some(3)))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TransportError::Rejected {
            status: 507,
            body: "disk full".to_string()
        }
    );
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn missing_relay_credential_fails_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let transport = HttpRelayTransport::new(&config_for(&server.uri()), empty_store()).unwrap();
    let (reader, dropped) = DropFlagReader::new(&b"abc"[..]);

    let err = transport
        .relay(DESTINATION, RelayPayload::new(Box::new(reader), None))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Credential(_)));
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn unreachable_endpoint_is_io_error() {
    let transport = HttpRelayTransport::new(
        &config_for("http://127.0.0.1:1"),
        store_with(CredentialDomain::Relay, "t"),
    )
    .unwrap();

    let err = transport
        .relay(DESTINATION, RelayPayload::new(Box::new(&b"abc"[..]), Some(3)))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Io(_)));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn progress_reaches_total() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let transport = HttpRelayTransport::new(
        &config_for(&server.uri()),
        store_with(CredentialDomain::Relay, "t"),
    )
    .unwrap();
    let (tx, rx) = watch::channel(TransferProgress::default());
    let payload = RelayPayload::new(Box::new(tokio::io::repeat(1).take(50_000)), Some(50_000))
        .with_progress(tx);

    transport.relay(DESTINATION, payload).await.unwrap();

    assert_eq!(
        *rx.borrow(),
        TransferProgress {
            sent: 50_000,
            total: Some(50_000)
        }
    );
}
