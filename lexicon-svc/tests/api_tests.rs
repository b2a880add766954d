//! Integration tests for lexicon-svc API endpoints
//!
//! The router runs over an engine backed by the in-memory repository, so no
//! database is needed.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use lexicon_common::{EntityRef, EntityType, InMemoryRepository, TerminologyEngine};
use lexicon_svc::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: partner P1 <- organization O1 <- company C1 <- team T1
async fn setup_app() -> (Arc<InMemoryRepository>, axum::Router) {
    let repo = Arc::new(InMemoryRepository::with_system_defaults());
    repo.set_parent(
        EntityRef::new(EntityType::Organization, "O1"),
        EntityRef::new(EntityType::Partner, "P1"),
    )
    .await;
    repo.set_parent(
        EntityRef::new(EntityType::Company, "C1"),
        EntityRef::new(EntityType::Organization, "O1"),
    )
    .await;
    repo.set_parent(
        EntityRef::new(EntityType::Team, "T1"),
        EntityRef::new(EntityType::Company, "C1"),
    )
    .await;

    let engine = TerminologyEngine::with_ttl(repo.clone(), Duration::from_secs(300));
    (repo, build_router(AppState::new(engine)))
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_repo, app) = setup_app().await;
    let (status, body) = send(&app, test_request("GET", "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "lexicon-svc");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_resolve_defaults() {
    let (_repo, app) = setup_app().await;
    let (status, body) = send(&app, test_request("GET", "/api/terminology/team/T1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entity_type"], "team");
    assert_eq!(body["entity_id"], "T1");
    assert_eq!(body["terminology"]["journeyTerms"]["mainUnit"]["singular"], "journey");
}

#[tokio::test]
async fn test_invalid_entity_type_rejected() {
    let (_repo, app) = setup_app().await;
    let (status, body) = send(&app, test_request("GET", "/api/terminology/galaxy/G1")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("galaxy"));
}

#[tokio::test]
async fn test_save_then_resolve_with_key_filter() {
    let (_repo, app) = setup_app().await;

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            "/api/terminology/company/C1",
            json!({"records": [{"key": "journeyTerms.mainUnit.singular", "value": "quest"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["saved"], 1);

    let (status, body) = send(
        &app,
        test_request("GET", "/api/terminology/team/T1?keys=journeyTerms.mainUnit,toolTerms.library"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["terminology"],
        json!({
            "journeyTerms": {"mainUnit": {"singular": "quest", "plural": "journeys"}},
            "toolTerms": {"library": "Toolbox"}
        })
    );
}

#[tokio::test]
async fn test_save_rejects_malformed_key() {
    let (_repo, app) = setup_app().await;
    let (status, _body) = send(
        &app,
        json_request(
            "PUT",
            "/api/terminology/team/T1",
            json!({"records": [{"key": "journeyTerms..singular", "value": "quest"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_write_reports_server_error() {
    let (repo, app) = setup_app().await;
    repo.fail_writes(true);

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            "/api/terminology/team/T1",
            json!({"records": [{"key": "toolTerms.library", "value": "Kit", "overrideBehavior": "suggest"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_template_application() {
    let (_repo, app) = setup_app().await;

    let (status, _) = send(&app, test_request("POST", "/api/terminology/team/T1/template/startup-focused")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, test_request("GET", "/api/terminology/team/T1")).await;
    assert_eq!(body["terminology"]["journeyTerms"]["mainUnit"]["singular"], "sprint");

    let (status, _) = send(&app, test_request("POST", "/api/terminology/team/T1/template/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_and_entity_delete() {
    let (_repo, app) = setup_app().await;

    send(
        &app,
        json_request(
            "PUT",
            "/api/terminology/team/T1",
            json!({"records": [
                {"key": "journeyTerms.mainUnit.singular", "value": "mission"},
                {"key": "toolTerms.library", "value": "Kit"}
            ]}),
        ),
    )
    .await;

    let (status, _) = send(&app, test_request("DELETE", "/api/terminology/team/T1/category/journeyTerms")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, test_request("GET", "/api/terminology/team/T1")).await;
    assert_eq!(body["terminology"]["journeyTerms"]["mainUnit"]["singular"], "journey");
    assert_eq!(body["terminology"]["toolTerms"]["library"], "Kit");

    let (status, _) = send(&app, test_request("DELETE", "/api/terminology/team/T1")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, test_request("GET", "/api/terminology/team/T1")).await;
    assert_eq!(body["terminology"]["toolTerms"]["library"], "Toolbox");
}

#[tokio::test]
async fn test_list_templates() {
    let (_repo, app) = setup_app().await;
    let (status, body) = send(&app, test_request("GET", "/api/templates")).await;

    assert_eq!(status, StatusCode::OK);
    let keys: Vec<&str> = body["templates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["businessFormal", "projectManagement", "startupFocused"]);
}

#[tokio::test]
async fn test_cache_clear_scopes() {
    let (_repo, app) = setup_app().await;

    send(&app, test_request("GET", "/api/terminology/team/T1")).await;
    send(&app, test_request("GET", "/api/terminology/company/C1")).await;

    let (status, body) = send(&app, test_request("POST", "/api/cache/clear?entity_type=team&entity_id=T1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);

    let (status, _) = send(&app, test_request("POST", "/api/cache/clear?entity_id=T1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, test_request("POST", "/api/cache/clear")).await;
    assert_eq!(status, StatusCode::OK);
    // company:C1 plus the shared system defaults
    assert_eq!(body["cleared"], 2);
}

#[tokio::test]
async fn test_ownership_change_refreshes_entity() {
    let (repo, app) = setup_app().await;

    send(
        &app,
        json_request(
            "PUT",
            "/api/terminology/company/C2",
            json!({"records": [{"key": "journeyTerms.mainUnit.singular", "value": "voyage"}]}),
        ),
    )
    .await;
    send(&app, test_request("GET", "/api/terminology/team/T1")).await;

    repo.set_parent(
        EntityRef::new(EntityType::Team, "T1"),
        EntityRef::new(EntityType::Company, "C2"),
    )
    .await;
    let (status, _) = send(&app, test_request("POST", "/api/terminology/team/T1/ownership-changed")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, test_request("GET", "/api/terminology/team/T1")).await;
    assert_eq!(body["terminology"]["journeyTerms"]["mainUnit"]["singular"], "voyage");
}
