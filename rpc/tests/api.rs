//! HTTP-level tests: real sockets on loopback, reqwest as the client.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use faceid_crypto::DescriptorCodec;
use faceid_engine::IdentityResolutionEngine;
use faceid_ledger::{
    DevLedger, DevLedgerConfig, HttpLedgerClient, LedgerBackend, LedgerClient, LedgerError,
    LedgerTimeouts,
};
use faceid_nullables::NullIdentityStore;
use faceid_rpc::ledger_node::serve_ledger;
use faceid_rpc::ApiServer;
use faceid_types::{AccountKey, DescriptorDigest};

const DIM: usize = 4;

async fn spawn_ledger(ledger: Arc<DevLedger>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_ledger(listener, ledger, std::future::pending()));
    format!("http://{addr}")
}

async fn spawn_api(ledger_endpoint: Option<&str>, enable_metrics: bool) -> String {
    let ledger = ledger_endpoint.map(|endpoint| {
        LedgerBackend::new(
            Arc::new(HttpLedgerClient::new(endpoint)) as Arc<dyn LedgerClient>,
            LedgerTimeouts::default(),
        )
    });
    let engine = Arc::new(IdentityResolutionEngine::new(
        DescriptorCodec::new(DIM),
        Arc::new(NullIdentityStore::new()),
        ledger,
    ));
    let server = ApiServer::new(0, engine, enable_metrics);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve(listener, std::future::pending()).await;
    });
    format!("http://{addr}")
}

fn face(x: f32) -> Vec<f32> {
    vec![x, 0.0, 0.0, 0.0]
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn http_ledger_client_against_dev_node() {
    let ledger = Arc::new(DevLedger::new(DevLedgerConfig {
        registration_cost: 10,
        budget: 10,
    }));
    let endpoint = spawn_ledger(ledger.clone()).await;
    let client = HttpLedgerClient::new(&endpoint);

    let key = AccountKey::new("a@x.com");
    let digest = DescriptorDigest::new([3; 32]);
    assert_eq!(client.block_height().await.unwrap(), 0);
    assert_eq!(client.estimate_registration_cost(&key, &digest).await.unwrap(), 10);
    let token = client.submit_registration(&key, &digest).await.unwrap();
    assert!(token.as_str().starts_with("0x"));
    assert!(client.digest_registered(&digest).await.unwrap());
    assert!(client.account_registered(&key).await.unwrap());
    assert_eq!(client.block_height().await.unwrap(), 1);

    // Same account again: the ledger refuses with 409.
    assert!(matches!(
        client.submit_registration(&key, &digest).await,
        Err(LedgerError::Rejected(_))
    ));
    // Budget spent: 402.
    assert!(matches!(
        client
            .submit_registration(&AccountKey::new("b@x.com"), &DescriptorDigest::new([4; 32]))
            .await,
        Err(LedgerError::InsufficientResources(_))
    ));
    assert_eq!(ledger.registration_count(), 1);
}

#[tokio::test]
async fn register_verify_exists_over_http() {
    let ledger = Arc::new(DevLedger::default());
    let ledger_endpoint = spawn_ledger(ledger.clone()).await;
    let api = spawn_api(Some(&ledger_endpoint), false).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        format!("{api}/identity/register"),
        json!({ "account_key": "a@x.com", "descriptor": face(0.0) }),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["registered_on"], "ledger");
    assert_eq!(body["confirmed_by"], "ledger");
    assert!(body.get("descriptor").is_none());
    assert_eq!(ledger.registration_count(), 1);

    let (status, body) = post(
        &client,
        format!("{api}/identity/verify"),
        json!({ "account_key": "a@x.com", "descriptor": face(0.0) }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["verified"], true);
    assert_eq!(body["identity"]["confirmed_by"], "ledger");

    let (_, body) = post(
        &client,
        format!("{api}/identity/exists"),
        json!({ "account_key": "a@x.com" }),
    )
    .await;
    assert_eq!(body["exists"], true);

    let (_, body) = post(
        &client,
        format!("{api}/identity/verify"),
        json!({ "account_key": "z@x.com", "descriptor": face(9.0) }),
    )
    .await;
    assert_eq!(body["verified"], false);
}

#[tokio::test]
async fn duplicates_map_to_conflict_codes() {
    let api = spawn_api(None, false).await;
    let client = reqwest::Client::new();

    let (status, _) = post(
        &client,
        format!("{api}/identity/register"),
        json!({ "account_key": "a@x.com", "descriptor": face(0.0) }),
    )
    .await;
    assert_eq!(status, 200);

    let (status, body) = post(
        &client,
        format!("{api}/identity/register"),
        json!({ "account_key": "a@x.com", "descriptor": face(4.0) }),
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body["code"], "duplicate_account");

    let (status, body) = post(
        &client,
        format!("{api}/identity/register"),
        json!({ "account_key": "b@x.com", "descriptor": face(0.1) }),
    )
    .await;
    assert_eq!(status, 409);
    assert_eq!(body["code"], "duplicate_biometric");

    let (status, body) = post(
        &client,
        format!("{api}/identity/register"),
        json!({ "account_key": "c@x.com", "descriptor": [0.1, 0.2] }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "invalid_descriptor");
}

#[tokio::test]
async fn unreachable_ledger_degrades_to_local_then_syncs() {
    // Reserve a port, then close it so nothing is listening there yet.
    let parked = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ledger_addr = parked.local_addr().unwrap();
    drop(parked);

    let api = spawn_api(Some(&format!("http://{ledger_addr}")), true).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        format!("{api}/identity/register"),
        json!({ "account_key": "a@x.com", "descriptor": face(0.0) }),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["registered_on"], "local_only");
    assert_eq!(body["confirmed_by"], "local_store");

    let status: Value = client
        .get(format!("{api}/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["ledger"]["reachable"], false);
    assert_eq!(status["pending_ledger"], 1);

    // Bring the ledger up on the same address and replay.
    let ledger = Arc::new(DevLedger::default());
    let listener = TcpListener::bind(ledger_addr).await.unwrap();
    tokio::spawn(serve_ledger(listener, ledger.clone(), std::future::pending()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, body) = post(&client, format!("{api}/identity/sync"), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["upgraded"], 1);
    assert_eq!(body["pending"], 0);
    assert_eq!(ledger.registration_count(), 1);

    let metrics = client
        .get(format!("{api}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("faceid_registrations_total{registered_on=\"local_only\"} 1"));
}

#[tokio::test]
async fn health_and_disabled_metrics() {
    let api = spawn_api(None, false).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{api}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let response = client.get(format!("{api}/metrics")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
