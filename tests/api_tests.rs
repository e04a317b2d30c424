//! HTTP surface: authentication, role checks and JSON shapes through the router.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::*;
use shipdesk::middleware::auth::issue_token;
use shipdesk::models::user::Role;

fn router() -> (Router, std::sync::Arc<shipdesk::repository::InMemoryStore>) {
    let (state, store) = app();
    (shipdesk::create_router(state), store)
}

fn token(role: Role) -> String {
    issue_token(Uuid::new_v4(), role, JWT_SECRET, Duration::hours(1)).unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, bearer: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = router();
    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let (app, _) = router();
    let response = app
        .clone()
        .oneshot(get("/metrics/overview", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["status"], 401);

    let forged = issue_token(Uuid::new_v4(), Role::Admin, "not-the-secret", Duration::hours(1)).unwrap();
    let response = app
        .oneshot(get("/metrics/overview", Some(&forged)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_overview_role_gate_and_shape() {
    let (app, _) = router();

    let response = app
        .clone()
        .oneshot(get("/metrics/overview", Some(&token(Role::Driver))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(get(
            "/metrics/overview?dimension=region&dimensionValue=north&threshold=0.5",
            Some(&token(Role::Dispatcher)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["dimension"], "region");
    assert_eq!(body["dimensionValue"], "north");
    assert_eq!(body["slaThreshold"], 0.5);
    assert_eq!(body["onTimeRate"], 0.0);
    assert!(body.get("firstAttemptSuccessRate").is_some());
}

#[tokio::test]
async fn test_overview_rejects_unknown_dimension() {
    let (app, _) = router();
    let response = app
        .oneshot(get("/metrics/overview?dimension=planet", Some(&token(Role::Manager))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_snapshot_generation_requires_manager() {
    let (app, _) = router();
    let uri = format!("/metrics/snapshots/generate/{}", Uuid::new_v4());

    let response = app
        .clone()
        .oneshot(post_json(&uri, &token(Role::Dispatcher), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(post_json(&uri, &token(Role::Manager), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "metric definition not found");
}

#[tokio::test]
async fn test_definition_then_snapshot_over_http() {
    let (app, _) = router();
    let manager = token(Role::Manager);

    let response = app
        .clone()
        .oneshot(post_json(
            "/metrics/definitions",
            &manager,
            json!({ "key": "sla_risk", "name": "SLA risk", "kind": "sla_risk", "threshold": 0.6 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let definition = body_json(response).await;
    let id = definition["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/metrics/snapshots/generate/{}", id),
            &manager,
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["metricId"], id.as_str());
    assert_eq!(snapshot["dimension"], "global");

    let response = app
        .oneshot(get(
            &format!("/metrics/snapshots/{}", id),
            Some(&token(Role::Dispatcher)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_driver_route_listing_over_http() {
    let (app, store) = router();
    let (own, driver) = seed_route(&store, "N-1", "north").await;
    seed_route(&store, "N-2", "north").await;

    let driver_token = issue_token(driver.user_id, Role::Driver, JWT_SECRET, Duration::hours(1)).unwrap();
    let response = app
        .clone()
        .oneshot(get("/routes", Some(&driver_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let routes = body_json(response).await;
    let ids: Vec<_> = routes
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![own.id.to_string()]);

    let response = app
        .oneshot(get("/routes", Some(&token(Role::Customer))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_stop_sequence_over_http() {
    let (app, store) = router();
    let customer = seed_customer(&store).await;
    let (route, _) = seed_route(&store, "S-1", "south").await;
    let a = seed_shipment(&store, customer.id).await;
    let b = seed_shipment(&store, customer.id).await;
    let dispatcher = token(Role::Dispatcher);
    let uri = format!("/routes/{}/stops", route.id);

    let response = app
        .clone()
        .oneshot(post_json(&uri, &dispatcher, json!({ "shipmentId": a.id, "sequence": 1 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(post_json(&uri, &dispatcher, json!({ "shipmentId": b.id, "sequence": 1 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get(&format!("/routes/{}", route.id), Some(&dispatcher)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["code"], "S-1");
    assert_eq!(body["stops"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tracking_lookup_is_scoped_to_customer() {
    let (app, store) = router();
    let owner = seed_customer(&store).await;
    let shipment = seed_shipment(&store, owner.id).await;
    let uri = format!("/shipments/track/{}", shipment.tracking_id);

    let owner_token = issue_token(owner.user_id, Role::Customer, JWT_SECRET, Duration::hours(1)).unwrap();
    let response = app
        .clone()
        .oneshot(get(&uri, Some(&owner_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "pending");

    let stranger = seed_customer(&store).await;
    let stranger_token = issue_token(stranger.user_id, Role::Customer, JWT_SECRET, Duration::hours(1)).unwrap();
    let response = app.oneshot(get(&uri, Some(&stranger_token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_definition_over_http() {
    let (app, _) = router();
    let manager = token(Role::Manager);

    let response = app
        .clone()
        .oneshot(post_json(
            "/metrics/definitions",
            &manager,
            json!({ "key": "on_time", "name": "On time", "kind": "on_time_rate" }),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/metrics/definitions/{}", id), Some(&token(Role::Dispatcher))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["key"], "on_time");

    let response = app
        .clone()
        .oneshot(get(&format!("/metrics/definitions/{}", id), Some(&token(Role::Customer))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(get(
            &format!("/metrics/definitions/{}", Uuid::new_v4()),
            Some(&manager),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_snapshot_body_must_parse_when_present() {
    let (app, _) = router();
    let manager = token(Role::Manager);

    let response = app
        .clone()
        .oneshot(post_json(
            "/metrics/definitions",
            &manager,
            json!({ "key": "open_issues", "name": "Open issues", "kind": "open_issues" }),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["id"].as_str().unwrap().to_string();
    let uri = format!("/metrics/snapshots/generate/{}", id);

    let malformed = Request::builder()
        .method(Method::POST)
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", manager))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"dimension": "region", "dimensionValue": "#))
        .unwrap();
    let response = app.clone().oneshot(malformed).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(&uri, &manager, json!({ "dimenson": "region" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let empty = Request::builder()
        .method(Method::POST)
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", manager))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(empty).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["dimension"], "global");
}
