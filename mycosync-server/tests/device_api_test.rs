use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::mock_app::MockApp;

async fn create_site(app: &MockApp, name: &str) -> serde_json::Value {
    let request = Request::builder()
        .uri("/sites")
        .method(Method::POST)
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({ "name": name })).unwrap(),
        ))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn register_device(app: &MockApp, site_id: i64, mac: &str) -> serde_json::Value {
    let request = Request::builder()
        .uri("/devices")
        .method(Method::POST)
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({
                "mac_address": mac,
                "name": format!("Cam {mac}"),
                "wake_interval_minutes": 30,
                "position": { "row": 1, "shelf": 2 },
                "site_id": site_id,
            }))
            .unwrap(),
        ))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_register_device_normalizes_mac() {
    let app = MockApp::new().await;
    let site = create_site(&app, "Registration Site").await;
    let device = register_device(&app, site["id"].as_i64().unwrap(), "b8:f8:62:f9:cf:b8").await;

    assert_eq!(device["mac_address"], json!("B8F862F9CFB8"));
    assert_eq!(device["active"], json!(true));
    assert_eq!(device["site_id"], site["id"]);

    // Same hardware, different separators: still a duplicate.
    let request = Request::builder()
        .uri("/devices")
        .method(Method::POST)
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({
                "mac_address": "B8-F8-62-F9-CF-B8",
                "name": "Duplicate",
                "wake_interval_minutes": 30,
            }))
            .unwrap(),
        ))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_device_rejects_bad_mac() {
    let app = MockApp::new().await;

    let request = Request::builder()
        .uri("/devices")
        .method(Method::POST)
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({
                "mac_address": "not-a-mac",
                "name": "Broken",
                "wake_interval_minutes": 30,
            }))
            .unwrap(),
        ))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reassignment_keeps_ledger_and_reference_in_step() {
    let app = MockApp::new().await;
    let first_site = create_site(&app, "First Site").await;
    let second_site = create_site(&app, "Second Site").await;
    let device = register_device(&app, first_site["id"].as_i64().unwrap(), "AABBCCDDEEFF").await;
    let device_id = device["id"].as_i64().unwrap();

    let request = Request::builder()
        .uri(format!("/devices/{device_id}/assign"))
        .method(Method::POST)
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::to_string(&json!({ "site_id": second_site["id"] })).unwrap(),
        ))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let reassigned: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(reassigned["site_id"], second_site["id"]);

    // Ledger: first interval closed, second open.
    let request = Request::builder()
        .uri(format!("/devices/{device_id}/assignments"))
        .method(Method::GET)
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let assignments: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();

    assert_eq!(assignments.len(), 2);
    assert!(!assignments[0]["unassigned_at"].is_null());
    assert!(assignments[1]["unassigned_at"].is_null());
    assert_eq!(assignments[1]["site_id"], second_site["id"]);

    // Direct reference and ledger agree.
    let request = Request::builder()
        .uri(format!("/devices/{device_id}/integrity"))
        .method(Method::GET)
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_deactivated_device_is_kept_but_inactive() {
    let app = MockApp::new().await;
    let site = create_site(&app, "Deactivation Site").await;
    let device = register_device(&app, site["id"].as_i64().unwrap(), "AABBCCDDEE20").await;
    let device_id = device["id"].as_i64().unwrap();

    let request = Request::builder()
        .uri(format!("/devices/{device_id}"))
        .method(Method::DELETE)
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Soft deactivation: the row survives.
    let request = Request::builder()
        .uri(format!("/devices/{device_id}"))
        .method(Method::GET)
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let fetched: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(fetched["active"], json!(false));
    assert!(fetched["next_wake_at"].is_null());
}
