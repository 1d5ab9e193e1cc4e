use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use payledger::api::{create_router, AppState};
use payledger::application::BalanceReader;
use payledger::{LedgerError, LedgerResult, MemoryStore, Wallet};
use serde_json::{json, Value};
use tower::ServiceExt;

const ALICE: &str = "wallet-a";
const BOB: &str = "wallet-b";

fn memory_router() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.insert_wallet(ALICE, 10_000);
    store.insert_wallet(BOB, 5_000);
    let router = create_router(AppState::from_ledger(store.clone()), Duration::from_secs(4));
    (router, store)
}

async fn call(router: Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_send(body: impl Into<Body>) -> Request<Body> {
    Request::post("/api/send")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn test_balance_envelope() -> Result<()> {
    let (router, _store) = memory_router();

    let (status, body) = call(router, get(&format!("/api/wallet/{}/balance", ALICE))).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["address"], ALICE);
    assert_eq!(body["data"]["balance"], 100.0);
    assert!(body.get("error").is_none());
    Ok(())
}

#[tokio::test]
async fn test_balance_of_unknown_wallet_is_bad_request() -> Result<()> {
    let (router, _store) = memory_router();

    let (status, body) = call(router, get("/api/wallet/ghost/balance")).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "Error");
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().contains("ghost"));
    assert!(body.get("data").is_none());
    Ok(())
}

#[tokio::test]
async fn test_send_then_history() -> Result<()> {
    let (router, store) = memory_router();

    let (status, body) = call(
        router.clone(),
        post_send(json!({"from": ALICE, "to": BOB, "amount": 30}).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "OK");

    let (status, body) = call(
        router.clone(),
        post_send(json!({"from": BOB, "to": ALICE, "amount": "0.25"}).to_string()),
    )
    .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    assert_eq!(store.get_balance(ALICE)?.balance, 7_025);
    assert_eq!(store.get_balance(BOB)?.balance, 7_975);

    let (status, body) = call(router, get("/api/transactions?count=10")).await?;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["from"], BOB);
    assert_eq!(items[0]["amount"], 0.25);
    assert_eq!(items[1]["from"], ALICE);
    assert_eq!(items[1]["to"], BOB);
    assert_eq!(items[1]["amount"], 30.0);
    assert!(items[1]["time"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_send_domain_errors_are_bad_request() -> Result<()> {
    let cases = [
        json!({"from": ALICE, "to": BOB, "amount": 0}),
        json!({"from": ALICE, "to": BOB, "amount": -1}),
        json!({"from": ALICE, "to": ALICE, "amount": 1}),
        json!({"from": "ghost", "to": BOB, "amount": 1}),
        json!({"from": BOB, "to": ALICE, "amount": 60}),
    ];

    for case in cases {
        let (router, store) = memory_router();
        let (status, body) = call(router, post_send(case.to_string())).await?;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", case);
        assert_eq!(body["status"], "Error");
        assert!(body["error"].is_string());
        assert_eq!(store.get_balance(ALICE)?.balance, 10_000);
        assert_eq!(store.get_balance(BOB)?.balance, 5_000);
        assert!(store.recent_transactions(10)?.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_send_rejects_empty_and_malformed_bodies() -> Result<()> {
    let (router, _store) = memory_router();

    let (status, body) = call(router.clone(), post_send("")).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "request body is required");

    let (status, body) = call(router.clone(), post_send("{not json")).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid JSON body");

    let (status, _) = call(router, post_send(json!({"from": ALICE}).to_string())).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_send_rejects_sub_cent_amounts_without_moving_money() -> Result<()> {
    for amount in [json!(10.005), json!(0.001), json!("10.005")] {
        let (router, store) = memory_router();
        let body = json!({"from": ALICE, "to": BOB, "amount": amount}).to_string();

        let (status, response) = call(router, post_send(body)).await?;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", amount);
        assert_eq!(response["error"], "invalid JSON body");
        assert_eq!(store.get_balance(ALICE)?.balance, 10_000);
        assert_eq!(store.get_balance(BOB)?.balance, 5_000);
        assert!(store.recent_transactions(10)?.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_history_count_validation() -> Result<()> {
    let (router, _store) = memory_router();

    for uri in [
        "/api/transactions",
        "/api/transactions?count=abc",
        "/api/transactions?count=0",
        "/api/transactions?count=-2",
    ] {
        let (status, body) = call(router.clone(), get(uri)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["status"], "Error");
    }

    let (status, body) = call(router, get("/api/transactions?count=3")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn test_wallets_and_health() -> Result<()> {
    let (router, _store) = memory_router();

    let (status, body) = call(router.clone(), get("/api/wallets")).await?;
    assert_eq!(status, StatusCode::OK);
    let wallets = body["data"].as_array().unwrap();
    assert_eq!(wallets.len(), 2);
    assert_eq!(wallets[0]["address"], ALICE);

    let (status, body) = call(router, get("/health")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "ok");
    Ok(())
}

struct BrokenBalances;

#[async_trait]
impl BalanceReader for BrokenBalances {
    async fn wallet_balance(&self, _address: &str) -> LedgerResult<Wallet> {
        Err(LedgerError::Internal(anyhow::anyhow!(
            "disk I/O error at /var/lib/payledger.db"
        )))
    }
}

#[tokio::test]
async fn test_internal_errors_are_opaque() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut state = AppState::from_ledger(store);
    state.balances = Arc::new(BrokenBalances);
    let router = create_router(state, Duration::from_secs(4));

    let (status, body) = call(router, get("/api/wallet/any/balance")).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "Error");
    assert_eq!(body["code"], 500);
    assert_eq!(body["error"], "internal error");
    Ok(())
}

#[tokio::test]
async fn test_request_id_is_propagated() -> Result<()> {
    let (router, _store) = memory_router();

    let response = router.oneshot(get("/health")).await?;
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}
