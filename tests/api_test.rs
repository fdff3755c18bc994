mod common;

use std::time::Duration;

use reqwest::StatusCode;
use saldo::api;
use serde_json::{json, Value};
use tempfile::TempDir;

use common::test_service;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
    _temp: TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        let (service, temp) = test_service().await.expect("failed to init service");
        let settings = api::HttpSettings {
            request_timeout: Duration::from_secs(10),
            ..api::HttpSettings::default()
        };
        let app = api::build_app(service, &settings);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            handle,
            _temp: temp,
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn test_create_user_and_query_balance() {
    let server = TestServer::spawn().await;

    let (status, body) = server
        .post("/api/users", json!({"username": "alice", "balance": "10.50"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["username"], "alice");
    assert_eq!(body["balance"], "10.50");
    assert!(body["user_id"].as_i64().unwrap() > 0);

    let (status, body) = server.get("/api/users/alice/balance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"balance": "10.50"}));
}

#[tokio::test]
async fn test_credit_and_debit_flow() {
    let server = TestServer::spawn().await;
    server.post("/api/users", json!({"username": "bob"})).await;

    let (status, body) = server
        .post(
            "/api/transactions/credit",
            json!({"username": "bob", "amount": 1200}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["new_balance"], "1200.00");
    let credit_id = body["transaction_id"].as_i64().unwrap();

    let (status, body) = server
        .post(
            "/api/transactions/debit",
            json!({"username": "bob", "amount": "200.25"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], "999.75");
    assert!(body["transaction_id"].as_i64().unwrap() > credit_id);
    assert!(body["user_id"].as_i64().is_some());

    let (status, body) = server.get("/api/users/bob/transactions").await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["kind"], "debit");
    assert_eq!(items[0]["amount"], "200.25");
    assert_eq!(items[1]["kind"], "credit");
}

#[tokio::test]
async fn test_debit_beyond_balance_is_rejected() {
    let server = TestServer::spawn().await;
    server
        .post("/api/users", json!({"username": "carol", "balance": 70}))
        .await;

    let (status, body) = server
        .post(
            "/api/transactions/debit",
            json!({"username": "carol", "amount": 100}),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");

    let (_, body) = server.get("/api/users/carol/balance").await;
    assert_eq!(body["balance"], "70.00");
}

#[tokio::test]
async fn test_error_statuses() {
    let server = TestServer::spawn().await;
    server.post("/api/users", json!({"username": "dave"})).await;

    let (status, _) = server.get("/api/users/nobody/balance").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .post(
            "/api/transactions/credit",
            json!({"username": "nobody", "amount": 1}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.post("/api/users", json!({"username": "dave"})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    for amount in [json!(0), json!(-5), json!("1.001"), json!("ten")] {
        let (status, body) = server
            .post(
                "/api/transactions/credit",
                json!({"username": "dave", "amount": amount}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {amount}");
        assert_eq!(body["status"], "error");
    }

    let (status, _) = server
        .post("/api/transactions/debit", json!({"username": "", "amount": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post("/api/transactions/debit", json!({"amount": 1}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = TestServer::spawn().await;

    let resp = server
        .client
        .get(format!("{}/health", server.base_url))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-request-id"], "req-123");

    let resp = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_concurrent_http_credits() {
    let server = TestServer::spawn().await;
    server.post("/api/users", json!({"username": "erin"})).await;

    let mut handles = Vec::new();
    for _ in 0..25 {
        let client = server.client.clone();
        let url = format!("{}/api/transactions/credit", server.base_url);
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({"username": "erin", "amount": "1000.00"}))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let (_, body) = server.get("/api/users/erin/balance").await;
    assert_eq!(body["balance"], "25000.00");
}

#[tokio::test]
async fn test_bad_history_limit_is_json_error() {
    let server = TestServer::spawn().await;
    server.post("/api/users", json!({"username": "fay"})).await;

    let (status, body) = server.get("/api/users/fay/transactions?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().is_some());

    let (status, body) = server.get("/api/users/fay/transactions?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn test_cors_preflight_allows_credentials() {
    let server = TestServer::spawn().await;

    let resp = server
        .client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/api/transactions/credit", server.base_url),
        )
        .header("origin", "http://wallet.example")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "http://wallet.example"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
    let methods = headers["access-control-allow-methods"].to_str().unwrap();
    assert!(methods.contains("POST"));
}
