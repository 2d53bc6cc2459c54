// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the admission HTTP endpoints.
//!
//! These tests drive the axum router in-process with `tower::ServiceExt`,
//! WITHOUT TLS or a Kubernetes cluster.
//!
//! ```bash
//! cargo test --test functional
//! ```

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use common::fixtures::{PodBuilder, ReviewBuilder, parse_body, response_patch};
use pod_admission_webhook::webhooks::Decoder;
use pod_admission_webhook::{HealthState, PolicyConfig, WebhookState, create_webhook_router};

fn router(health: Option<Arc<HealthState>>) -> axum::Router {
    let mut state = WebhookState::new(Decoder::default(), PolicyConfig::default());
    if let Some(health) = health {
        state = state.with_health(health);
    }
    create_webhook_router(Arc::new(state))
}

async fn post(router: axum::Router, path: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let request = Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, parse_body(&bytes))
}

#[tokio::test]
async fn test_validate_endpoint_denies_latest() {
    let uid = uuid::Uuid::new_v4().to_string();
    let pod = PodBuilder::new("webserver")
        .container("webserver", "nginx:latest")
        .build();
    let body = ReviewBuilder::new(uid.clone()).pod(&pod).build();

    let (status, review) = post(router(None), "/validate/pod", body).await;

    // A denial is a successful decision
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["kind"], "AdmissionReview");
    assert_eq!(review["response"]["uid"], uid.as_str());
    assert_eq!(review["response"]["allowed"], false);
    assert_eq!(review["response"]["status"]["reason"], "Invalid");
}

#[tokio::test]
async fn test_validate_endpoint_allows_conformant_pod() {
    let pod = PodBuilder::new("webserver")
        .container("webserver", "nginx:1.21")
        .validated()
        .build();
    let body = ReviewBuilder::new("allow-uid").pod(&pod).build();

    let (status, review) = post(router(None), "/validate/pod", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["uid"], "allow-uid");
    assert_eq!(review["response"]["allowed"], true);
}

#[tokio::test]
async fn test_mutate_endpoint_returns_patch() {
    let pod = PodBuilder::new("webserver")
        .container("webserver", "nginx:1.21")
        .build();
    let body = ReviewBuilder::new("mutate-uid").pod(&pod).build();

    let (status, review) = post(router(None), "/mutate/pod", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["uid"], "mutate-uid");
    assert_eq!(review["response"]["allowed"], true);
    assert_eq!(review["response"]["patchType"], "JSONPatch");

    let patch = response_patch(&review).unwrap();
    let paths: Vec<&str> = patch
        .as_array()
        .unwrap()
        .iter()
        .map(|op| op["path"].as_str().unwrap())
        .collect();
    assert!(paths.contains(&"/spec/containers/0/imagePullPolicy"));
    assert!(paths.contains(&"/metadata/annotations"));
}

#[tokio::test]
async fn test_mutate_endpoint_noop() {
    let pod = PodBuilder::new("webserver")
        .container_with_policy("webserver", "nginx:1.21", Some("Never"))
        .validated()
        .build();
    let body = ReviewBuilder::new("noop-uid").pod(&pod).build();

    let (status, review) = post(router(None), "/mutate/pod", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["response"]["allowed"], true);
    assert!(review["response"].get("patch").is_none());
}

#[tokio::test]
async fn test_decode_failure_returns_error_envelope() {
    let body = ReviewBuilder::new("bad-kind")
        .kind("", "v1", "Service")
        .object(serde_json::json!({"metadata": {"name": "svc"}}))
        .build();

    let (status, review) = post(router(None), "/validate/pod", body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(review["response"]["uid"], "bad-kind");
    assert_eq!(review["response"]["allowed"], false);
    assert_eq!(review["response"]["status"]["reason"], "InternalError");
    // Internal details stay out of the response
    assert!(
        !review["response"]["status"]["message"]
            .as_str()
            .unwrap()
            .contains("Service")
    );
}

#[tokio::test]
async fn test_error_envelope_echoes_request_version() {
    let body = ReviewBuilder::new("bad-kind-beta")
        .api_version("admission.k8s.io/v1beta1")
        .kind("", "v1", "Service")
        .object(serde_json::json!({"metadata": {"name": "svc"}}))
        .build();

    let (status, review) = post(router(None), "/mutate/pod", body).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(review["apiVersion"], "admission.k8s.io/v1beta1");
    assert_eq!(review["response"]["uid"], "bad-kind-beta");
}

#[tokio::test]
async fn test_garbage_body_returns_error_envelope() {
    let (status, review) = post(router(None), "/mutate/pod", b"garbage".to_vec()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(review["apiVersion"], "admission.k8s.io/v1");
    assert_eq!(review["response"]["uid"], "");
    assert_eq!(review["response"]["allowed"], false);
}

#[tokio::test]
async fn test_unknown_path_not_found() {
    let request = Request::post("/validate/deployment")
        .body(Body::empty())
        .unwrap();
    let response = router(None).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_recorded_per_outcome() {
    let health = Arc::new(HealthState::new());

    let denied = PodBuilder::new("a").container("a", "nginx:latest").build();
    let allowed = PodBuilder::new("b")
        .container("b", "nginx:1.21")
        .validated()
        .build();

    post(
        router(Some(health.clone())),
        "/validate/pod",
        ReviewBuilder::new("m-1").pod(&denied).build(),
    )
    .await;
    post(
        router(Some(health.clone())),
        "/validate/pod",
        ReviewBuilder::new("m-2").pod(&allowed).build(),
    )
    .await;
    post(
        router(Some(health.clone())),
        "/mutate/pod",
        b"{}".to_vec(),
    )
    .await;

    let encoded = health.metrics.encode();
    assert!(encoded.contains("outcome=\"denied\""));
    assert!(encoded.contains("outcome=\"allowed\""));
    assert!(encoded.contains("outcome=\"error\""));
    assert!(encoded.contains("stage=\"decode\""));
}
