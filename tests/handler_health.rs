mod common;

use serde_json::{Value, json};

#[tokio::test]
async fn test_health_endpoint_success() {
    let app = common::spawn_app();

    let response = app.server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["storage"]["status"], "ok");
    assert_eq!(json["checks"]["cache"]["status"], "ok");
    assert_eq!(json["checks"]["click_queue"]["status"], "ok");
    assert_eq!(json["checks"]["rate_limit"]["message"], "memory counters");
}

#[tokio::test]
async fn test_health_reports_resolution_counters() {
    let app = common::spawn_app();
    let link = app
        .server
        .post("/api/links")
        .json(&json!({ "target": "https://example.com" }))
        .await
        .json::<Value>();
    let code = link["short_code"].as_str().unwrap();

    app.server.get(&format!("/{code}")).await;
    app.server.get(&format!("/{code}")).await;

    let json = app.server.get("/health").await.json::<Value>();

    assert_eq!(json["resolution"]["cache_hits"], 1);
    assert_eq!(json["resolution"]["cache_misses"], 1);
    assert_eq!(
        json["checks"]["cache"]["message"],
        "Tiers: l1, local entries: 1"
    );
}

#[tokio::test]
async fn test_health_degraded_when_click_worker_gone() {
    let app = common::spawn_app();
    drop(app.clicks);

    let response = app.server.get("/health").await;

    response.assert_status_service_unavailable();
    let json = response.json::<Value>();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["click_queue"]["status"], "error");
}
