//! HTTP API over a real listener.

mod common;

use std::sync::Arc;

use common::{RecordingSession, TestStack};
use downer::config::Config;
use downer::http::{self, AppState};
use downer::network::SessionHandle;
use serde_json::{Value, json};
use tokio::net::TcpListener;

struct Api {
    base: String,
    client: reqwest::Client,
    stack: TestStack,
    session: Arc<RecordingSession>,
}

async fn start_api(metrics: bool) -> Api {
    let stack = TestStack::new().unwrap();
    let session = Arc::new(RecordingSession::new("S1"));
    stack
        .registry
        .register(Arc::clone(&session) as Arc<dyn SessionHandle>);

    let mut config = Config::default();
    config.http.metrics = metrics;
    if metrics {
        downer::metrics::init();
    }
    let state = AppState {
        db: stack.db.clone(),
        tracker: Arc::clone(&stack.tracker),
        pool: Arc::clone(&stack.pool),
        config: Arc::new(config),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = stack.shutdown.child_token();
    tokio::spawn(async move {
        let _ = http::serve(listener, state, token).await;
    });

    Api {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        stack,
        session,
    }
}

#[tokio::test]
async fn test_search_returns_matching_packages() {
    let api = start_api(false).await;
    let d = &api.stack.dispatcher;
    d.dispatch("S1", "Bot", "#chan", "#1  2x [1G] Foo.Bar.mkv");
    d.dispatch("S1", "Bot", "#chan", "#2  2x [2G] Baz.avi");

    let resp = api
        .client
        .post(format!("{}/xdcc/packages/search", api.base))
        .json(&json!({ "filter": "foo bar" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["path"], "S1/#chan/Bot/1");
    assert_eq!(results[0]["package"]["name"], "Foo.Bar.mkv");
}

#[tokio::test]
async fn test_malformed_search_is_rejected() {
    let api = start_api(false).await;
    let resp = api
        .client
        .post(format!("{}/xdcc/packages/search", api.base))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["reason"].is_string());
}

#[tokio::test]
async fn test_download_sends_request_and_records_it() {
    let api = start_api(false).await;
    let resp = api
        .client
        .post(format!("{}/xdcc/download", api.base))
        .json(&json!({ "path": "S1/#chan/Bot/4" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["query"], "S1/#chan/Bot/4");
    assert_eq!(body["status"], "requested");
    assert_eq!(
        api.session.sent(),
        vec![("Bot".to_string(), "XDCC SEND #4".to_string())]
    );

    let listed: Value = api
        .client
        .get(format!("{}/xdcc/requests", api.base))
        .query(&[("query", "S1/")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["query"], "S1/#chan/Bot/4");
}

#[tokio::test]
async fn test_download_errors_map_to_status() {
    let api = start_api(false).await;
    let post = |path: &'static str| {
        api.client
            .post(format!("{}/xdcc/download", api.base))
            .json(&json!({ "path": path }))
            .send()
    };

    let unknown = post("S9/#chan/Bot/4").await.unwrap();
    assert_eq!(unknown.status(), 404);
    let invalid = post("S1/#chan/Bot").await.unwrap();
    assert_eq!(invalid.status(), 400);
    assert!(api.session.sent().is_empty());
}

#[tokio::test]
async fn test_transfers_and_bots_start_empty() {
    let api = start_api(false).await;
    let transfers: Value = api
        .client
        .get(format!("{}/xdcc/transfers", api.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(transfers, json!([]));

    let bots: Value = api
        .client
        .get(format!("{}/xdcc/bots", api.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bots, json!([]));

    let cancel = api
        .client
        .delete(format!("{}/xdcc/transfers/42", api.base))
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), 404);
}

#[tokio::test]
async fn test_config_and_metrics_endpoints() {
    let api = start_api(true).await;
    let config: Value = api
        .client
        .get(format!("{}/sys/config", api.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(config["transfer"]["max_concurrent"].is_number());
    assert_eq!(config["http"]["metrics"], true);

    let metrics = api
        .client
        .get(format!("{}/metrics", api.base))
        .send()
        .await
        .unwrap();
    assert_eq!(metrics.status(), 200);
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let api = start_api(false).await;
    let resp = api
        .client
        .get(format!("{}/metrics", api.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
