use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use stockledger::api::{self, AppState};
use stockledger::config::Config;
use stockledger::db::init_db;
use stockledger::notify::RecordingNotifier;
use stockledger::Repository;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let config = Config::for_database(db_path);
    let state = AppState::new(repo, config, Arc::new(RecordingNotifier::new()));

    (api::create_router(state), temp_dir)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_headers(app, method, uri, body, &[]).await
}

async fn send_with_headers(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn seed_product(app: &axum::Router, id: i64, qty: i64, unit_cost: i64) {
    let (status, _) = send(
        app,
        "PUT",
        &format!("/v1/products/{}", id),
        Some(json!({"title": format!("Product {}", id), "price": 1000, "costPrice": 400})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, lot) = send(
        app,
        "POST",
        "/v1/stock/receipts",
        Some(json!({"productId": id, "qty": qty, "unitCost": unit_cost})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lot["qtyRemaining"], qty);
}

#[tokio::test]
async fn test_health_and_ready() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let (app, _temp) = setup_test_app().await;
    seed_product(&app, 1, 10, 500).await;

    let (status, created) = send_with_headers(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({
            "items": [{"productId": 1, "qty": 3}],
            "customer": {"name": "Ada", "email": "ada@example.com"}
        })),
        &[("Idempotency-Key", "http-1")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["orderNumber"], "№00001/web");
    assert_eq!(created["totalAmount"], 3000);
    assert_eq!(created["status"], "NEW");
    assert_eq!(created["items"][0]["cogsTotal"], 1500);
    let id = created["id"].as_str().unwrap().to_string();

    // Replay with the same header.
    let (status, replayed) = send_with_headers(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({
            "items": [{"productId": 1, "qty": 3}],
            "customer": {"name": "Ada"}
        })),
        &[("Idempotency-Key", "http-1")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replayed["id"], created["id"]);

    let (status, stock) = send(&app, "GET", "/v1/stock/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["stock"], 7);

    let (status, fetched) = send(&app, "GET", &format!("/v1/orders/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/v1/orders/{}/status", id),
        Some(json!({"status": "DONE"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "DONE");

    let (status, report) = send(&app, "GET", "/v1/analytics/profit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["revenue"], 3000);
    assert_eq!(report["cogs"], 1500);
    assert_eq!(report["orderCount"], 1);

    let (status, deleted) = send(&app, "DELETE", &format!("/v1/orders/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(deleted["deletedAt"].is_number());

    let (_, report) = send(&app, "GET", "/v1/analytics/profit?status=any", None).await;
    assert_eq!(report["orderCount"], 0);
}

#[tokio::test]
async fn test_out_of_stock_is_conflict_with_payload() {
    let (app, _temp) = setup_test_app().await;
    seed_product(&app, 1, 2, 500).await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({
            "items": [{"productId": 1, "qty": 5}],
            "customer": {"name": "Ada"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["productId"], 1);
    assert_eq!(body["productTitle"], "Product 1");
    assert_eq!(body["available"], 2);
    assert_eq!(body["requested"], 5);
}

#[tokio::test]
async fn test_error_statuses() {
    let (app, _temp) = setup_test_app().await;
    seed_product(&app, 1, 2, 500).await;

    let (status, _) = send(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({"items": [], "customer": {"name": "Ada"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/orders",
        Some(json!({"items": [{"productId": 99, "qty": 1}], "customer": {"name": "Ada"}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "GET", &format!("/v1/orders/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/v1/analytics/profit?status=shipped", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        "/v1/products/5",
        Some(json!({"title": " ", "price": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_write_off_purchase_and_reports_over_http() {
    let (app, _temp) = setup_test_app().await;
    seed_product(&app, 1, 5, 100).await;

    let (status, purchase) = send(
        &app,
        "POST",
        "/v1/purchases",
        Some(json!({
            "supplier": "Acme",
            "freightCost": 100,
            "lines": [{"productId": 1, "qty": 5, "unitCost": 200}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(purchase["lots"][0]["unitCost"], 220);

    let (status, write_off) = send(
        &app,
        "POST",
        "/v1/write-offs",
        Some(json!({"productId": 1, "qty": 7, "reason": "flood"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(write_off["totalCost"], 5 * 100 + 2 * 220);

    let (status, fetched) = send(
        &app,
        "GET",
        &format!("/v1/write-offs/{}", write_off["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["allocations"].as_array().unwrap().len(), 2);

    let (status, snapshot) = send(&app, "GET", "/v1/analytics/stock", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot[0]["stock"], 3);

    let (status, lots) = send(&app, "GET", "/v1/analytics/lots?productId=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lots[0]["qtyRemaining"], 3);
    assert_eq!(lots[0]["value"], 3 * 220);
}
