//! HTTP API tests against an in-process server on a free port.

use async_trait::async_trait;
use car_scout::config::Config;
use car_scout::server::run_server_with_source;
use car_scout_core::{CandidateSource, SourceError};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// Returns the same response text for every query.
struct CannedSource(Result<String, SourceError>);

#[async_trait]
impl CandidateSource for CannedSource {
    fn name(&self) -> &str {
        "canned"
    }

    async fn fetch(&self, _query: &str) -> Result<String, SourceError> {
        self.0.clone()
    }
}

fn test_config_with_port(tmp: &TempDir, port: u16) -> Config {
    let config_content = format!(
        r#"[db]
path = "{}/data/cars.sqlite"

[source]
provider = "disabled"

[server]
bind = "127.0.0.1:{}"
"#,
        tmp.path().display(),
        port
    );
    toml::from_str(&config_content).unwrap()
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/api/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn start_server(source: CannedSource) -> (TempDir, String) {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config_with_port(&tmp, port);

    let source: Arc<dyn CandidateSource> = Arc::new(source);
    tokio::spawn(async move {
        run_server_with_source(&cfg, source).await.ok();
    });
    wait_for_server(port).await;

    (tmp, format!("http://127.0.0.1:{}", port))
}

#[tokio::test]
async fn test_health() {
    let (_tmp, base) = start_server(CannedSource(Ok("[]".into()))).await;

    let body: Value = reqwest::get(format!("{}/api/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["source"], "canned");
}

#[tokio::test]
async fn test_add_car_and_duplicate() {
    let (_tmp, base) = start_server(CannedSource(Ok("[]".into()))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/cars", base))
        .json(&json!({"make": "Ferrari", "model": "296GTB", "year": 2024, "price": 300000}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["duplicate"], false);
    assert_eq!(body["id"], 1);
    assert_eq!(body["message"], "Successfully added 2024 Ferrari 296GTB");

    let resp = client
        .post(format!("{}/api/cars", base))
        .json(&json!({"make": "Ferrari", "model": "296GTB", "year": "2024", "price": 310000}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["duplicate"], true);
    assert!(body.get("id").is_none());

    let listing: Value = client
        .get(format!("{}/api/cars", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["cars"].as_array().unwrap().len(), 1);
    assert_eq!(listing["cars"][0]["source"], "manual");
    assert_eq!(listing["stats"]["total_cars"], 1);
}

#[tokio::test]
async fn test_add_car_missing_field_is_400() {
    let (_tmp, base) = start_server(CannedSource(Ok("[]".into()))).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/cars", base))
        .json(&json!({"make": "Ferrari", "year": 2024, "price": 300000}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("model"));
    assert_eq!(body["required"], json!(["make", "model", "year", "price"]));
}

#[tokio::test]
async fn test_ingest_groups_and_history() {
    let response = json!([
        {"make": "Toyota", "model": "Supra", "year": 2024, "price": 51000}
    ])
    .to_string();
    let (_tmp, base) = start_server(CannedSource(Ok(response))).await;
    let client = reqwest::Client::new();

    for (make, model, price) in [
        ("Nissan", "Z", 50000),
        ("BMW", "M2", 52000),
        ("Porsche", "Cayman GT4", 98000),
    ] {
        let resp = client
            .post(format!("{}/api/cars", base))
            .json(&json!({"make": make, "model": model, "year": 2024, "price": price}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let resp = client
        .post(format!("{}/api/ingest", base))
        .json(&json!({"query": "affordable sports cars"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["admitted"], 1);
    assert_eq!(report["groups"].as_array().unwrap().len(), 1);
    let group = &report["groups"][0];
    assert_eq!(group["new_car"]["model"], "Supra");
    assert_eq!(group["similar_cars"][0]["price"], 50000.0);
    assert_eq!(group["similar_cars"][1]["price"], 52000.0);
    assert_eq!(group["price_range"]["avg"], 51000.0);
    assert_eq!(report["statistics"]["total_cars"], 4);

    let history: Value = client
        .get(format!("{}/api/history?limit=5", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let events = history["history"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["query"], "affordable sports cars");
    assert_eq!(events[0]["results_found"], 1);
    assert_eq!(events[0]["new_cars_added"], 1);

    let similar: Value = client
        .get(format!("{}/api/cars/similar?price=51000&limit=2", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(similar["cars"].as_array().unwrap().len(), 2);
    assert_eq!(similar["cars"][0]["model"], "Supra");
}

#[tokio::test]
async fn test_ingest_unreachable_source_is_502() {
    let (_tmp, base) = start_server(CannedSource(Err(SourceError::Unreachable(
        "connection refused".into(),
    ))))
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/ingest", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "source_unavailable");

    let history: Value = client
        .get(format!("{}/api/history", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_similar_rejects_negative_tolerance() {
    let (_tmp, base) = start_server(CannedSource(Ok("[]".into()))).await;

    let resp = reqwest::get(format!(
        "{}/api/cars/similar?price=50000&tolerance=-1",
        base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 400);
}
