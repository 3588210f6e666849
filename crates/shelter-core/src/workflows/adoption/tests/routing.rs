use super::common::*;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::workflows::adoption::domain::{AdoptionStatus, AnimalId};
use crate::workflows::adoption::memory::InMemoryStore;
use crate::workflows::adoption::router::{adoption_router, USER_ID_HEADER, USER_ROLE_HEADER};
use crate::workflows::adoption::TransitionCoordinator;

fn build_router() -> (Router, Arc<TransitionCoordinator<InMemoryStore>>) {
    let (coordinator, _) = build_coordinator();
    let coordinator = Arc::new(coordinator);
    (adoption_router(Arc::clone(&coordinator)), coordinator)
}

fn request(method: Method, uri: &str, caller: Option<(&str, &str)>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = caller {
        builder = builder
            .header(USER_ID_HEADER, user_id)
            .header(USER_ROLE_HEADER, role);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

fn apply_body() -> Option<Value> {
    Some(json!({ "contact_info": "reach me at 555-0100" }))
}

#[tokio::test]
async fn applying_returns_created_pending_application() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/animals/{}/adoptions", animal.id),
            Some(("10", "user")),
            apply_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], AdoptionStatus::Pending.label());
    assert_eq!(payload["user_id"], 10);
    assert_eq!(payload["animal_id"], animal.id.0);
}

#[tokio::test]
async fn mutations_without_identity_are_unauthenticated() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/animals/{}/adoptions", animal.id),
            None,
            apply_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "unauthenticated");
}

#[tokio::test]
async fn malformed_role_header_is_unauthenticated() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/animals/{}/adoptions", animal.id),
            Some(("10", "superuser")),
            apply_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_applying_is_forbidden() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/animals/{}/adoptions", animal.id),
            Some(("1", "admin")),
            apply_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "forbidden");
}

#[tokio::test]
async fn duplicate_application_conflicts() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");
    coordinator
        .apply_for_adoption(&user(10), animal.id, "first@example.org")
        .expect("first application");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/animals/{}/adoptions", animal.id),
            Some(("10", "user")),
            apply_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "duplicate_application");
}

#[tokio::test]
async fn unknown_animal_is_not_found() {
    let (router, _) = build_router();

    let response = router
        .oneshot(request(
            Method::POST,
            "/api/v1/animals/999/adoptions",
            Some(("10", "user")),
            apply_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn accepting_returns_decision_receipt() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");
    let first = coordinator
        .apply_for_adoption(&user(10), animal.id, "first@example.org")
        .expect("first");
    coordinator
        .apply_for_adoption(&user(11), animal.id, "second@example.org")
        .expect("second");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/adoptions/{}/accept", first.id),
            Some(("2", "moderator")),
            None,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["adoption"]["status"], "accepted");
    assert_eq!(payload["animal"]["status"], "adopted");
    assert_eq!(payload["siblings_closed"], 1);
}

#[tokio::test]
async fn unknown_decision_is_invalid_input() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");
    let adoption = coordinator
        .apply_for_adoption(&user(10), animal.id, "first@example.org")
        .expect("apply");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/adoptions/{}/postpone", adoption.id),
            Some(("1", "admin")),
            None,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "invalid_input");
}

#[tokio::test]
async fn anonymous_view_hides_applications() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");
    coordinator
        .apply_for_adoption(&user(10), animal.id, "first@example.org")
        .expect("apply");

    let response = router
        .oneshot(request(
            Method::GET,
            &format!("/api/v1/animals/{}", animal.id),
            None,
            None,
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["animal"]["status"], "in_adoption");
    assert_eq!(payload["animal"]["name"], "Rex");
    assert_eq!(payload["adoptions"], json!([]));
}

#[tokio::test]
async fn admin_registers_animal() {
    let (router, _) = build_router();
    let body = json!({
        "name": "Biscuit",
        "description": "Loves long walks",
        "age_in_months": 7,
        "breed": "Beagle",
        "gender": "female",
    });

    let response = router
        .oneshot(request(
            Method::POST,
            "/api/v1/animals",
            Some(("1", "admin")),
            Some(body),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "available");
    assert_eq!(payload["gender"], "female");
}

#[tokio::test]
async fn store_outage_is_service_unavailable() {
    let coordinator = Arc::new(TransitionCoordinator::new(Arc::new(UnavailableStore)));
    let router = adoption_router(coordinator);

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/animals/{}/adoptions", AnimalId(1)),
            Some(("10", "user")),
            apply_body(),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "store_error");
}

#[tokio::test]
async fn malformed_body_without_identity_is_unauthenticated() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/animals/{}/adoptions", animal.id),
            None,
            Some(json!({ "contact": 42 })),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "unauthenticated");
}

#[tokio::test]
async fn malformed_body_from_known_caller_is_invalid_input() {
    let (router, coordinator) = build_router();
    let animal = seed_animal(&coordinator, "Rex");

    let response = router
        .oneshot(request(
            Method::POST,
            &format!("/api/v1/animals/{}/adoptions", animal.id),
            Some(("10", "user")),
            Some(json!({ "contact": 42 })),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "invalid_input");
}
