use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use tower::ServiceExt;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::errors::AppError;
use slotbook::handlers;
use slotbook::services::resources::{ResourceLookup, ResourceSnapshot};
use slotbook::state::AppState;

// ── Mock Resource Service ──

struct MockResourceLookup {
    resources: HashMap<String, ResourceSnapshot>,
}

impl MockResourceLookup {
    fn with_defaults() -> Self {
        let mut resources = HashMap::new();
        resources.insert(
            "room-1".to_string(),
            ResourceSnapshot {
                active: true,
                vendor_id: "vendor-1".to_string(),
                price: 45.0,
                currency: "EUR".to_string(),
            },
        );
        resources.insert(
            "room-closed".to_string(),
            ResourceSnapshot {
                active: false,
                vendor_id: "vendor-1".to_string(),
                price: 45.0,
                currency: "EUR".to_string(),
            },
        );
        Self { resources }
    }
}

#[async_trait]
impl ResourceLookup for MockResourceLookup {
    async fn validate(&self, resource_id: &str) -> Result<ResourceSnapshot, AppError> {
        self.resources
            .get(resource_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("resource {resource_id} not found")))
    }
}

/// Simulates a resource service that times out.
struct UnreachableResourceLookup;

#[async_trait]
impl ResourceLookup for UnreachableResourceLookup {
    async fn validate(&self, _resource_id: &str) -> Result<ResourceSnapshot, AppError> {
        Err(AppError::Upstream(
            "resource service unreachable: timed out".to_string(),
        ))
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        resource_service_url: "http://localhost:3002".to_string(),
        internal_service_key: "test-key".to_string(),
        resource_timeout_ms: 3000,
    }
}

fn test_state_with(resources: Box<dyn ResourceLookup>) -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        resources,
    })
}

fn test_state() -> Arc<AppState> {
    test_state_with(Box::new(MockResourceLookup::with_defaults()))
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id",
            patch(handlers::bookings::update_booking),
        )
        .route(
            "/api/bookings/:id",
            delete(handlers::bookings::delete_booking),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/status",
            post(handlers::bookings::update_booking_status),
        )
        .route(
            "/api/bookings/:id/payment",
            post(handlers::bookings::update_payment_status),
        )
        .route(
            "/api/users/:id/bookings",
            get(handlers::bookings::user_bookings),
        )
        .route(
            "/api/vendors/:id/bookings",
            get(handlers::bookings::vendor_bookings),
        )
        .with_state(state)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", "user-1")
        .header("x-user-role", "customer")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "user-1")
        .body(Body::empty())
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Slot start `hours_ahead` from now, snapped to the top of the hour so
/// formatted timestamps stay stable within a test.
fn slot_start(hours_ahead: i64) -> NaiveDateTime {
    let start = Utc::now().naive_utc() + Duration::hours(hours_ahead);
    start.date().and_hms_opt(start.hour(), 0, 0).unwrap()
}

fn fmt(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn create_body(start: NaiveDateTime, end: NaiveDateTime) -> serde_json::Value {
    serde_json::json!({
        "vendor_id": "vendor-1",
        "resource_id": "room-1",
        "booking_date": start.date().format("%Y-%m-%d").to_string(),
        "start_time": fmt(start),
        "end_time": fmt(end),
        "notes": "window seat please",
    })
}

/// Create a booking starting `hours_ahead` hours from now, one hour long.
/// Returns the booking id.
async fn create_booking(app: &Router, hours_ahead: i64) -> String {
    create_booking_at(app, slot_start(hours_ahead)).await
}

async fn create_booking_at(app: &Router, start: NaiveDateTime) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            create_body(start, start + Duration::hours(1)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    body["id"].as_str().unwrap().to_string()
}

async fn set_status(app: &Router, id: &str, status: &str) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{id}/status"),
            serde_json::json!({ "status": status }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "failed to set {status}");
}

// ── Tests ──

#[tokio::test]
async fn test_health() {
    let app = test_app(test_state());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_identity_is_rejected() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let request = Request::builder()
        .method("POST")
        .uri("/api/bookings")
        .header("content-type", "application/json")
        .body(Body::from(
            create_body(start, start + Duration::hours(1)).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_booking_snapshots_price() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            create_body(start, start + Duration::hours(1)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["payment_status"], "pending");
    assert_eq!(body["price_at_booking"], 45.0);
    assert_eq!(body["currency"], "EUR");
    assert_eq!(body["user_id"], "user-1");
}

#[tokio::test]
async fn test_create_rejects_inverted_window() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            create_body(start + Duration::hours(1), start),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_past_booking_date() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let mut body = create_body(start, start + Duration::hours(1));
    body["booking_date"] = serde_json::json!("2020-01-01");

    let response = app
        .oneshot(json_request("POST", "/api/bookings", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_unknown_resource() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let mut body = create_body(start, start + Duration::hours(1));
    body["resource_id"] = serde_json::json!("room-missing");

    let response = app
        .oneshot(json_request("POST", "/api/bookings", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_rejects_inactive_resource() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let mut body = create_body(start, start + Duration::hours(1));
    body["resource_id"] = serde_json::json!("room-closed");

    let response = app
        .oneshot(json_request("POST", "/api/bookings", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_vendor_mismatch() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let mut body = create_body(start, start + Duration::hours(1));
    body["vendor_id"] = serde_json::json!("vendor-2");

    let response = app
        .oneshot(json_request("POST", "/api/bookings", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreachable_resource_service_is_not_a_business_error() {
    let app = test_app(test_state_with(Box::new(UnreachableResourceLookup)));
    let start = slot_start(72);
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/bookings",
            create_body(start, start + Duration::hours(1)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_overlapping_booking_conflicts_touching_succeeds() {
    // Booking A confirmed for [start, start+1h); B overlaps by 30
    // minutes and must conflict; C starts exactly at A's end and must
    // succeed.
    let app = test_app(test_state());
    let start = slot_start(72);
    let id = create_booking_at(&app, start).await;
    set_status(&app, &id, "confirmed").await;

    let overlapping = create_body(
        start + Duration::minutes(30),
        start + Duration::minutes(90),
    );
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/bookings", overlapping))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let touching = create_body(start + Duration::hours(1), start + Duration::hours(2));
    let response = app
        .oneshot(json_request("POST", "/api/bookings", touching))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_cancel_far_in_advance_refunds_in_full() {
    let app = test_app(test_state());
    let id = create_booking(&app, 50).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{id}/cancel"),
            serde_json::json!({ "reason": "change of plans" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["refund_percentage"], 100);
    assert_eq!(body["booking"]["status"], "cancelled");
    assert_eq!(body["booking"]["cancel_reason"], "change of plans");
    assert!(!body["booking"]["cancelled_at"].is_null());
}

#[tokio::test]
async fn test_cancel_late_gets_partial_refund() {
    let app = test_app(test_state());
    let id = create_booking(&app, 20).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{id}/cancel"),
            serde_json::json!({ "reason": "sick" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["refund_percentage"], 25);
}

#[tokio::test]
async fn test_double_cancel_fails() {
    let app = test_app(test_state());
    let id = create_booking(&app, 72).await;

    let cancel = || {
        json_request(
            "POST",
            &format!("/api/bookings/{id}/cancel"),
            serde_json::json!({ "reason": "whatever" }),
        )
    };

    let response = app.clone().oneshot(cancel()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(cancel()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_lifecycle_happy_path() {
    let app = test_app(test_state());
    let id = create_booking(&app, 72).await;

    set_status(&app, &id, "confirmed").await;
    set_status(&app, &id, "in_progress").await;
    set_status(&app, &id, "completed").await;

    // Terminal states are absorbing.
    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{id}/status"),
            serde_json::json!({ "status": "confirmed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_status_endpoint_cannot_cancel() {
    // Cancellation must go through the cancel operation so cancelled_at,
    // cancel_reason and the refund percentage are recorded together with
    // the status change.
    let app = test_app(test_state());
    let id = create_booking(&app, 72).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{id}/status"),
            serde_json::json!({ "status": "cancelled" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The booking is untouched and still cancellable the proper way.
    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/api/bookings/{id}")))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["status"], "pending");
    assert!(body["cancelled_at"].is_null());

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{id}/cancel"),
            serde_json::json!({ "reason": "double booked" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["booking"]["status"], "cancelled");
    assert!(!body["booking"]["cancelled_at"].is_null());
    assert_eq!(body["booking"]["cancel_reason"], "double booked");
}

#[tokio::test]
async fn test_skipping_states_is_rejected() {
    let app = test_app(test_state());
    let id = create_booking(&app, 72).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{id}/status"),
            serde_json::json!({ "status": "completed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_delete_rules() {
    let app = test_app(test_state());

    // Pending bookings may be deleted.
    let id = create_booking(&app, 72).await;
    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/api/bookings/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(empty_request("GET", &format!("/api/bookings/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Confirmed bookings may not: audit history stays.
    let id = create_booking(&app, 96).await;
    set_status(&app, &id, "confirmed").await;
    let response = app
        .oneshot(empty_request("DELETE", &format!("/api/bookings/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reschedule_excludes_own_booking() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let id = create_booking_at(&app, start).await;

    // Shift by 30 minutes: overlaps only itself, so it must succeed.
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/bookings/{id}"),
            serde_json::json!({
                "start_time": fmt(start + Duration::minutes(30)),
                "end_time": fmt(start + Duration::minutes(90)),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["start_time"], fmt(start + Duration::minutes(30)));
}

#[tokio::test]
async fn test_reschedule_onto_taken_slot_conflicts() {
    let app = test_app(test_state());
    let start = slot_start(72);
    create_booking_at(&app, start).await;
    let other = create_booking(&app, 96).await;

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/api/bookings/{other}"),
            serde_json::json!({
                "start_time": fmt(start + Duration::minutes(15)),
                "end_time": fmt(start + Duration::minutes(45)),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reschedule_in_progress_is_rejected() {
    let app = test_app(test_state());
    let start = slot_start(72);
    let id = create_booking_at(&app, start).await;
    set_status(&app, &id, "confirmed").await;
    set_status(&app, &id, "in_progress").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/bookings/{id}"),
            serde_json::json!({
                "start_time": fmt(start + Duration::hours(2)),
                "end_time": fmt(start + Duration::hours(3)),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Notes may still be patched while the booking is in progress.
    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/api/bookings/{id}"),
            serde_json::json!({ "notes": "running late" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_payment_bookkeeping() {
    let app = test_app(test_state());
    let id = create_booking(&app, 72).await;

    let pay = |status: &str| {
        json_request(
            "POST",
            &format!("/api/bookings/{id}/payment"),
            serde_json::json!({ "payment_status": status }),
        )
    };

    // Refund before cancellation is unreachable.
    let response = app.clone().oneshot(pay("refunded")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.clone().oneshot(pay("paid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Cancelling a paid booking with a refund owed flips payment status.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/bookings/{id}/cancel"),
            serde_json::json!({ "reason": "plans changed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["booking"]["payment_status"], "refunded");
    assert_eq!(body["booking"]["refund_percentage"], 100);
}

#[tokio::test]
async fn test_user_listing_is_paginated() {
    let app = test_app(test_state());
    for hours in [72, 96, 120] {
        create_booking(&app, hours).await;
    }

    let response = app
        .clone()
        .oneshot(empty_request(
            "GET",
            "/api/users/user-1/bookings?page=1&limit=2",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["bookings"].as_array().unwrap().len(), 2);

    let response = app
        .oneshot(empty_request("GET", "/api/vendors/vendor-1/bookings"))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn test_concurrent_creates_admit_exactly_one() {
    let app = test_app(test_state());
    let start = slot_start(72);

    let first = app.clone().oneshot(json_request(
        "POST",
        "/api/bookings",
        create_body(start, start + Duration::hours(1)),
    ));
    let second = app.clone().oneshot(json_request(
        "POST",
        "/api/bookings",
        create_body(
            start + Duration::minutes(30),
            start + Duration::minutes(90),
        ),
    ));

    let (a, b) = tokio::join!(first, second);
    let statuses = [a.unwrap().status(), b.unwrap().status()];

    assert!(statuses.contains(&StatusCode::CREATED));
    assert!(statuses.contains(&StatusCode::CONFLICT));

    // Only the winner's booking is persisted.
    let response = app
        .oneshot(empty_request("GET", "/api/users/user-1/bookings"))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["total"], 1);
}
