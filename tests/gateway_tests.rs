//! HTTP gate tests
//!
//! Drives the full router (status headers, tracing, panic catcher and the
//! bearer gate) in-process with `tower::ServiceExt::oneshot`:
//! - skip-listed paths stay open
//! - each rejection code and its envelope
//! - status headers on allowed, rejected and panicked responses

use std::sync::Arc;

use axum::{Router, routing};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use claude_wrapper::auth::{AuthManager, ProviderSettings};
use claude_wrapper::env::EnvSnapshot;
use claude_wrapper::gateway::{
    AppState, AuthGate, X_API_KEY_PROTECTED, X_AUTH_METHOD, create_router, with_gateway_layers,
};
use claude_wrapper::security::{KeySource, ProtectionConfig, SecurityPolicy};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

const KEY: &str = "correct-key-1234567890";

struct Harness {
    router: Router,
    protection: Arc<ProtectionConfig>,
    auth: Arc<AuthManager>,
}

fn app_state(require: bool) -> (Arc<AppState>, Arc<AuthGate>) {
    let policy = SecurityPolicy {
        require_api_key: require,
        ..SecurityPolicy::default()
    };
    let protection = Arc::new(ProtectionConfig::new(policy, &EnvSnapshot::default()));
    protection.set_api_key(KEY, KeySource::Runtime).unwrap();

    let settings = ProviderSettings {
        live_validation: false,
        adc_fallback: None,
        ..ProviderSettings::default()
    };
    let auth = Arc::new(AuthManager::from_env(&EnvSnapshot::default(), &settings));

    let gate = Arc::new(AuthGate::new(
        Arc::clone(&protection),
        vec!["/health".to_string(), "/v1/auth/status".to_string()],
    ));
    (Arc::new(AppState { auth, protection }), gate)
}

fn harness(require: bool) -> Harness {
    let (state, gate) = app_state(require);
    Harness {
        protection: Arc::clone(&state.protection),
        auth: Arc::clone(&state.auth),
        router: create_router(state, gate),
    }
}

fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn rejection_code(router: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "authentication_error");
    (status, body["error"]["code"].as_str().unwrap_or_default().to_string())
}

/// Test that skip-listed paths answer without credentials
#[tokio::test]
async fn test_health_is_open_under_protection() {
    let h = harness(true);

    let response = h.router.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[X_API_KEY_PROTECTED], "true");
}

/// Test that a missing header is rejected with a challenge
#[tokio::test]
async fn test_missing_authorization() {
    let h = harness(true);

    let response = h
        .router
        .oneshot(get("/v1/security/events", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "missing_authorization");
}

/// Test that non-bearer and empty bearer headers are format errors
#[tokio::test]
async fn test_malformed_authorization() {
    for value in ["Bearer ", "Basic abc", "Bearer a b", "Token correct-key-1234567890"] {
        let h = harness(true);
        let (status, code) = rejection_code(h.router, get("/v1/security/events", Some(value))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "header {value:?}");
        assert_eq!(code, "invalid_authorization_format", "header {value:?}");
    }
}

/// Test that a wrong key is rejected
#[tokio::test]
async fn test_wrong_key() {
    let h = harness(true);

    let (status, code) =
        rejection_code(h.router, get("/v1/security/events", Some("Bearer wrong"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(code, "invalid_api_key");
}

/// Test that the correct key passes, with a case-insensitive scheme
#[tokio::test]
async fn test_correct_key() {
    for scheme in ["Bearer", "bearer", "BEARER"] {
        let h = harness(true);
        let header = format!("{scheme} {KEY}");

        let response = h
            .router
            .oneshot(get("/v1/security/events", Some(&header)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "scheme {scheme}");
    }
}

/// Test that nothing is enforced while protection is off
#[tokio::test]
async fn test_unprotected_passes_everything() {
    let h = harness(false);

    let response = h
        .router
        .oneshot(get("/v1/security/events", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[X_API_KEY_PROTECTED], "false");
}

/// Test that status headers are stamped on rejections too
#[tokio::test]
async fn test_status_headers_on_rejection() {
    let h = harness(true);
    h.auth.detect_auth_method().await;

    let response = h
        .router
        .oneshot(get("/v1/security/events", Some("Bearer wrong")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[X_API_KEY_PROTECTED], "true");
    assert_eq!(response.headers()[X_AUTH_METHOD], "claude_cli");
}

/// Test that the method header is absent before resolution
#[tokio::test]
async fn test_no_method_header_before_resolution() {
    let h = harness(false);

    let response = h.router.oneshot(get("/health", None)).await.unwrap();

    assert!(response.headers().get(X_AUTH_METHOD).is_none());
}

/// Test that the open status endpoint reveals nothing derived from the key
#[tokio::test]
async fn test_auth_status_hides_key_material() {
    let h = harness(true);
    h.auth.detect_auth_method().await;

    let response = h.router.oneshot(get("/v1/auth/status", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["protection"]["enabled"], true);
    assert_eq!(body["protection"]["source"], "runtime");
    assert!(body["protection"].get("masked_key").is_none());
    assert!(body["protection"].get("storage").is_none());
    assert_eq!(body["auth"]["authenticated"], true);
    assert_eq!(body["auth"]["method"], "claude_cli");

    let rendered = body.to_string();
    assert!(!rendered.contains(KEY));
    assert!(!rendered.contains(&KEY[..4]));
    assert!(!rendered.contains(&secure_token::safe_hash(KEY)));
    assert!(h.protection.masked_active_key().is_some());
}

async fn exploding_handler() -> &'static str {
    panic!("handler exploded")
}

/// Test that a panicking handler becomes a 500 envelope with status headers
#[tokio::test]
async fn test_handler_panic_is_caught() {
    let (state, gate) = app_state(true);
    let routes = Router::new().route("/v1/boom", routing::get(exploding_handler));
    let router = with_gateway_layers(routes, state, gate);

    let response = router
        .oneshot(get("/v1/boom", Some(&format!("Bearer {KEY}"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[X_API_KEY_PROTECTED], "true");
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "internal_error");
    assert!(!body.to_string().contains("handler exploded"));
}

/// Test that the events endpoint returns hashes and honours `limit`
#[tokio::test]
async fn test_security_events_endpoint() {
    let h = harness(false);
    h.protection.set_api_key("second-key-abcdefghijk", KeySource::Runtime).unwrap();
    h.protection.clear_runtime_key();

    let response = h
        .router
        .oneshot(get("/v1/security/events?limit=2", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["count"], 2);
    let kinds: Vec<&str> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["kind"].as_str())
        .collect();
    assert_eq!(kinds, ["key.set", "key.cleared"]);
    assert!(!body.to_string().contains("second-key-abcdefghijk"));
}

/// Test that re-validation reports the resolved method
#[tokio::test]
async fn test_validate_endpoint() {
    let h = harness(true);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/validate")
        .header(header::AUTHORIZATION, format!("Bearer {KEY}"))
        .body(Body::empty())
        .unwrap();

    let response = h.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["method"], "claude_cli");
}
