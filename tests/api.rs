//! HTTP tests driving the router in-process

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use circulation_server::{
    api,
    clock::{Clock, ManualClock},
    directory::{Directories, FixtureDirectory},
    models::{CatalogRecord, ItemKind, LocationRecord, UserRecord},
    services::Services,
    store::MemoryStore,
    AppConfig, AppState,
};

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new() -> Self {
        let directory = Arc::new(FixtureDirectory::new());
        directory
            .add_user(UserRecord {
                id: 1,
                name: "Alan Turing".to_string(),
                email: None,
            })
            .add_catalog_item(CatalogRecord {
                id: 7,
                title: "Soldering station".to_string(),
                kind: ItemKind::Equipment,
                author: None,
                isbn: None,
            })
            .add_lab(LocationRecord {
                id: 3,
                name: "Electronics lab".to_string(),
            });

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 10, 7, 14, 0, 0).unwrap(),
        ));
        let services = Services::new(
            Arc::new(MemoryStore::new()),
            Directories::from_shared(directory),
            clock.clone(),
        );
        let state = AppState {
            config: Arc::new(AppConfig::default()),
            services: Arc::new(services),
        };

        Self {
            router: api::router(state),
            clock,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_copy(&self, code: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/copies",
                Some(json!({
                    "catalog_item_id": 7,
                    "inventory_code": code,
                    "location": "lab",
                    "lab_id": 3
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    fn due_in(&self, days: i64) -> String {
        (self.clock.today() + Duration::days(days)).to_string()
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_copy_normalises_code() {
    let app = TestApp::new();
    let copy = app.create_copy("lab-iron-01").await;

    assert_eq!(copy["inventory_code"], "LAB-IRON-01");
    assert_eq!(copy["state"], "available");
    assert_eq!(copy["lab_id"], 3);
    assert!(copy["library_id"].is_null());

    let (status, body) = app.send(Method::GET, "/api/v1/copies/by-code/Lab-Iron-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], copy["id"]);
}

#[tokio::test]
async fn test_duplicate_code_is_a_bad_request() {
    let app = TestApp::new();
    app.create_copy("LAB-IRON-02").await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/copies",
            Some(json!({
                "catalog_item_id": 7,
                "inventory_code": "lab-iron-02",
                "location": "lab",
                "lab_id": 3
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Duplicate");
}

#[tokio::test]
async fn test_unknown_records_are_not_found() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/copies/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchRecord");

    let copy = app.create_copy("LAB-IRON-03").await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/loans",
            Some(json!({
                "borrower_id": 42,
                "copy_id": copy["id"],
                "expected_return_date": app.due_in(7)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_loan_lifecycle_over_http() {
    let app = TestApp::new();
    let copy = app.create_copy("LAB-IRON-04").await;

    let (status, loan) = app
        .send(
            Method::POST,
            "/api/v1/loans",
            Some(json!({
                "borrower_id": 1,
                "copy_id": copy["id"],
                "expected_return_date": app.due_in(5)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", loan);
    assert_eq!(loan["state"], "active");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/loans",
            Some(json!({
                "borrower_id": 1,
                "copy_id": copy["id"],
                "expected_return_date": app.due_in(5)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let loan_uri = format!("/api/v1/loans/{}", loan["id"]);
    let (status, details) = app.send(Method::GET, &loan_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["borrower"]["name"], "Alan Turing");
    assert_eq!(details["copy"]["state"], "loaned");
    assert_eq!(details["catalog"]["kind"], "equipment");
    assert_eq!(details["is_overdue"], false);

    let (status, renewed) = app
        .send(
            Method::POST,
            &format!("{}/renew", loan_uri),
            Some(json!({ "new_expected_return_date": app.due_in(12) })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renewed["expected_return_date"], app.due_in(12));

    let (status, returned) = app.send(Method::POST, &format!("{}/return", loan_uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["state"], "completed");

    let (status, _) = app.send(Method::POST, &format!("{}/return", loan_uri), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, available) = app.send(Method::GET, "/api/v1/copies/available", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(available.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_sweep_endpoint_and_overdue_listing() {
    let app = TestApp::new();
    let copy = app.create_copy("LAB-IRON-05").await;
    let (_, loan) = app
        .send(
            Method::POST,
            "/api/v1/loans",
            Some(json!({
                "borrower_id": 1,
                "copy_id": copy["id"],
                "expected_return_date": app.due_in(1)
            })),
        )
        .await;

    app.clock.advance(Duration::days(3));
    let (status, report) = app.send(Method::POST, "/api/v1/loans/sweep", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["flagged"], json!([loan["id"]]));

    let (status, overdue) = app.send(Method::GET, "/api/v1/loans/overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overdue[0]["state"], "overdue");

    let (status, listed) = app.send(Method::GET, "/api/v1/loans?state=overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_due_soon_window_is_validated() {
    let app = TestApp::new();

    let (status, _) = app.send(Method::GET, "/api/v1/loans/due-soon?days=400", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(Method::GET, "/api/v1/loans/due-soon", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_state_and_location_changes() {
    let app = TestApp::new();
    let copy = app.create_copy("LAB-IRON-06").await;
    let uri = format!("/api/v1/copies/{}", copy["id"]);

    let (status, body) = app
        .send(Method::PUT, &format!("{}/state", uri), Some(json!({ "state": "maintenance" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "maintenance");

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("{}/location", uri),
            Some(json!({ "location": "library", "reference_id": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.send(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{}", body);
    let (status, _) = app.send(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_return_body_is_rejected() {
    let app = TestApp::new();
    let copy = app.create_copy("LAB-IRON-07").await;
    let (_, loan) = app
        .send(
            Method::POST,
            "/api/v1/loans",
            Some(json!({
                "borrower_id": 1,
                "copy_id": copy["id"],
                "expected_return_date": app.due_in(5)
            })),
        )
        .await;
    let loan_uri = format!("/api/v1/loans/{}", loan["id"]);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("{}/return", loan_uri),
            Some(json!({ "actual_return_date": "not-a-timestamp" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (_, details) = app.send(Method::GET, &loan_uri, None).await;
    assert_eq!(details["loan"]["state"], "active");
    assert_eq!(details["copy"]["state"], "loaned");

    let returned_at = "2024-10-08T09:15:00Z";
    let (status, returned) = app
        .send(
            Method::POST,
            &format!("{}/return", loan_uri),
            Some(json!({ "actual_return_date": returned_at })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["actual_return_date"], returned_at);
}

#[tokio::test]
async fn test_detail_views() {
    let app = TestApp::new();
    let copy = app.create_copy("LAB-IRON-08").await;
    app.send(
        Method::POST,
        "/api/v1/loans",
        Some(json!({
            "borrower_id": 1,
            "copy_id": copy["id"],
            "expected_return_date": app.due_in(2)
        })),
    )
    .await;

    let (status, details) = app
        .send(Method::GET, &format!("/api/v1/copies/{}/details", copy["id"]), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["location"]["name"], "Electronics lab");
    assert_eq!(details["catalog"]["title"], "Soldering station");

    let (status, listed) = app.send(Method::GET, "/api/v1/copies/details?state=loaned", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, loans) = app.send(Method::GET, "/api/v1/loans/details", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loans[0]["borrower"]["name"], "Alan Turing");

    let (status, _) = app.send(Method::GET, "/api/v1/copies/999/details", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
