//! End-to-end server integration tests
//!
//! Tests the full HTTP flow: fixture on disk -> server state -> /pks/lookup
//! -> status, content type and body

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use keylookup_core::attribute::{FIELD_FINGERPRINT_UPPER, FIELD_KEY_ID, FIELD_PRIMARY_USER_ID};
use keylookup_core::store::{FilteredScan, KeyLocator, Page, PartitionQuery};
use keylookup_core::{
    AttributeValue, Error, KeyStore, MemoryKeyStore, MemoryObjectStore, RawAttributeRecord, ServiceConfig,
};
use keylookup_server::{create_router, ServerState, SharedState, StoreStats};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;

const FP_ALICE: &str = "AABBCCDDEEFF00112233445566778899AABBCCDD";
const FP_BOB: &str = "0000111122223333444455556666777788889999";
const FP_ORPHAN: &str = "DEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF";

const ALICE_KEY: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----\nalice\n-----END PGP PUBLIC KEY BLOCK-----\n";
const BOB_KEY: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----\nbob\n-----END PGP PUBLIC KEY BLOCK-----\n";

fn record(fingerprint: &str, user: &str) -> RawAttributeRecord {
    let (upper, id) = fingerprint.split_at(fingerprint.len() - 16);
    HashMap::from([
        (FIELD_KEY_ID.to_string(), AttributeValue::s(id)),
        (FIELD_FINGERPRINT_UPPER.to_string(), AttributeValue::s(upper)),
        (FIELD_PRIMARY_USER_ID.to_string(), AttributeValue::s(user)),
    ])
}

/// Records for Alice, Bob and a key whose armored object was never stored
fn write_fixture(base: &Path) -> ServiceConfig {
    let config = ServiceConfig::from_base_dir(base).with_page_limit(Some(1));

    let records = vec![
        record(FP_ALICE, "Alice <alice@example.org>"),
        record(FP_BOB, "Bob <bob@example.org>"),
        record(FP_ORPHAN, "Orphan <orphan@lost.example>"),
    ];
    std::fs::write(&config.records_file, serde_json::to_vec(&records).unwrap()).unwrap();

    std::fs::create_dir_all(&config.objects_dir).unwrap();
    std::fs::write(config.objects_dir.join(format!("{}.asc", FP_ALICE)), ALICE_KEY).unwrap();
    std::fs::write(config.objects_dir.join(format!("{}.asc", FP_BOB)), BOB_KEY).unwrap();

    config
}

/// Test harness for running E2E server tests
pub struct TestHarness {
    pub server_url: String,
    pub state: SharedState,
    pub http: Client,
    _temp_dir: Option<tempfile::TempDir>,
    _shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestHarness {
    /// Serve the on-disk fixture
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let config = write_fixture(temp_dir.path());
        let state = ServerState::load(config).expect("State should load");

        let mut harness = Self::serve(state).await;
        harness._temp_dir = Some(temp_dir);
        harness
    }

    /// Serve an already built state
    pub async fn serve(state: ServerState) -> Self {
        let state: SharedState = Arc::new(state);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let listener = TcpListener::bind(addr).await.expect("Bind should succeed");
        let port = listener.local_addr().expect("local addr").port();
        let server_url = format!("http://127.0.0.1:{}", port);

        let router = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            server_url,
            state,
            http: Client::new(),
            _temp_dir: None,
            _shutdown: Some(shutdown_tx),
        }
    }

    /// GET /pks/lookup with the given query parameters
    pub async fn lookup(&self, params: &[(&str, &str)]) -> reqwest::Response {
        self.http
            .get(format!("{}/pks/lookup", self.server_url))
            .query(params)
            .send()
            .await
            .expect("request should complete")
    }

    /// Health check
    pub async fn health(&self) -> reqwest::Result<Value> {
        self.http
            .get(format!("{}/health", self.server_url))
            .send()
            .await?
            .json()
            .await
    }
}

fn content_type(resp: &reqwest::Response) -> &str {
    resp.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_server_health() {
    let harness = TestHarness::new().await;
    let health = harness.health().await.unwrap();

    assert_eq!(health["status"], "ready");
    assert_eq!(health["stores"]["records"], 3);
    assert_eq!(health["stores"]["objects"], 2);
    assert_eq!(harness.state.stats.records, 3);
}

#[tokio::test]
async fn test_index_machine_readable() {
    let harness = TestHarness::new().await;
    let resp = harness
        .lookup(&[("op", "index"), ("search", "example.org"), ("options", "mr")])
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(content_type(&resp), "text/plain");
    assert_eq!(
        resp.text().await.unwrap(),
        format!(
            "pub:{}\nuid:Alice%20%3Calice%40example.org%3E\npub:{}\nuid:Bob%20%3Cbob%40example.org%3E\n",
            FP_ALICE, FP_BOB
        )
    );
}

#[tokio::test]
async fn test_vindex_json() {
    let harness = TestHarness::new().await;
    let resp = harness
        .lookup(&[("op", "vindex"), ("search", "Bob"), ("options", "json")])
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(content_type(&resp), "application/json");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body[FP_BOB]["primaryUserId"], "Bob <bob@example.org>");
    assert_eq!(body[FP_BOB]["id"], &FP_BOB[24..]);
}

#[tokio::test]
async fn test_get_by_key_id() {
    let harness = TestHarness::new().await;
    let key_id = format!("0x{}", &FP_ALICE[24..]);
    let resp = harness.lookup(&[("op", "get"), ("search", key_id.as_str())]).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(content_type(&resp), "application/pgp-keys");
    assert_eq!(resp.text().await.unwrap(), ALICE_KEY);
}

#[tokio::test]
async fn test_index_exact_user_id() {
    let harness = TestHarness::new().await;
    let resp = harness
        .lookup(&[("op", "index"), ("search", "Bob <bob@example.org>"), ("exact", "on")])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains(FP_BOB));
}

#[tokio::test]
async fn test_get_exact_fingerprint() {
    let harness = TestHarness::new().await;

    let resp = harness
        .lookup(&[("op", "get"), ("search", FP_BOB), ("exact", "on")])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), BOB_KEY);

    let resp = harness
        .lookup(&[("op", "get"), ("search", "Bob"), ("exact", "on")])
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_search_returns_400() {
    let harness = TestHarness::new().await;
    let resp = harness.lookup(&[("op", "index")]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_operation_returns_501() {
    let harness = TestHarness::new().await;
    let resp = harness.lookup(&[("op", "delete"), ("search", "Alice")]).await;
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);

    let resp = harness.lookup(&[("search", "Alice")]).await;
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_no_match_returns_404() {
    let harness = TestHarness::new().await;
    let resp = harness.lookup(&[("op", "index"), ("search", "nobody")]).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = harness
        .lookup(&[("op", "get"), ("search", "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF")])
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_object_returns_404() {
    let harness = TestHarness::new().await;
    let resp = harness.lookup(&[("op", "get"), ("search", "Orphan")]).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

/// Keyed store that is unreachable
struct UnreachableStore;

#[async_trait]
impl KeyStore for UnreachableStore {
    async fn get(&self, _locator: &KeyLocator) -> keylookup_core::Result<Option<RawAttributeRecord>> {
        Err(Error::Store("connection refused".into()))
    }

    async fn query(&self, _query: &PartitionQuery) -> keylookup_core::Result<Page> {
        Err(Error::Store("connection refused".into()))
    }

    async fn scan(&self, _scan: &FilteredScan) -> keylookup_core::Result<Page> {
        Err(Error::Store("connection refused".into()))
    }
}

#[tokio::test]
async fn test_store_failure_returns_500() {
    let state = ServerState::new(
        Arc::new(UnreachableStore),
        Arc::new(MemoryObjectStore::new()),
        ServiceConfig::default(),
        StoreStats::default(),
    );
    let harness = TestHarness::serve(state).await;

    let resp = harness.lookup(&[("op", "index"), ("search", "Alice")]).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // Still serving after a failure
    let health = harness.health().await.unwrap();
    assert_eq!(health["status"], "ready");
}

#[tokio::test]
async fn test_server_continues_after_errors() {
    let harness = TestHarness::new().await;

    for _ in 0..3 {
        let resp = harness.lookup(&[("op", "delete"), ("search", "x")]).await;
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    }

    let resp = harness.lookup(&[("op", "get"), ("search", FP_ALICE)]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), ALICE_KEY);
}

#[tokio::test]
async fn test_concurrent_lookups() {
    let harness = Arc::new(TestHarness::new().await);

    let mut handles = Vec::new();
    for i in 0..16 {
        let harness = harness.clone();
        handles.push(tokio::spawn(async move {
            let (search, expected) = if i % 2 == 0 { (FP_ALICE, ALICE_KEY) } else { (FP_BOB, BOB_KEY) };
            let resp = harness.lookup(&[("op", "get"), ("search", search)]).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.text().await.unwrap(), expected);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_cors_headers() {
    let harness = TestHarness::new().await;
    let resp = harness
        .http
        .get(format!("{}/pks/lookup", harness.server_url))
        .query(&[("op", "index"), ("search", "Alice")])
        .header(header::ORIGIN, "https://keys.example")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_metrics_absent_without_recorder() {
    let harness = TestHarness::new().await;
    let resp = harness
        .http
        .get(format!("{}/metrics", harness.server_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_records_file_missing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig::from_base_dir(temp_dir.path());
    assert!(ServerState::load(config).is_err());
}

#[tokio::test]
async fn test_memory_stores_direct() {
    let keys = MemoryKeyStore::new(vec![record(FP_ALICE, "Alice <alice@example.org>")]);
    let objects = MemoryObjectStore::new().with_object(format!("{}.asc", FP_ALICE), ALICE_KEY);
    let state = ServerState::new(
        Arc::new(keys),
        Arc::new(objects),
        ServiceConfig::default(),
        StoreStats { records: 1, objects: 1 },
    );
    let harness = TestHarness::serve(state).await;

    let resp = harness.lookup(&[("op", "get"), ("search", "alice@example.org")]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), ALICE_KEY);
}
