//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::info;

use super::auth::{AuthGate, auth_status_headers, bearer_auth_middleware, panic_response};
use crate::auth::AuthManager;
use crate::security::ProtectionConfig;

/// Default number of events returned by `/v1/security/events`
const DEFAULT_EVENT_LIMIT: usize = 50;

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    /// Outbound credential resolver
    pub auth: Arc<AuthManager>,
    /// Inbound protection
    pub protection: Arc<ProtectionConfig>,
}

/// Create the router with every route and the gateway layers
pub fn create_router(state: Arc<AppState>, gate: Arc<AuthGate>) -> Router {
    with_gateway_layers(routes(), state, gate)
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/auth/status", get(auth_status_handler))
        .route("/v1/auth/validate", post(validate_handler))
        .route("/v1/security/events", get(security_events_handler))
}

/// Wrap `routes` in the gateway layers and attach the state.
///
/// Layer order, outermost first: status headers, tracing, panic catcher,
/// bearer gate. The status headers therefore land on every response,
/// including rejections and 500s.
pub fn with_gateway_layers(
    routes: Router<Arc<AppState>>,
    state: Arc<AppState>,
    gate: Arc<AuthGate>,
) -> Router {
    routes
        .layer(middleware::from_fn_with_state(gate, bearer_auth_middleware))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_status_headers,
        ))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "claude-wrapper",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Resolver and protection status.
///
/// The route is normally skip-listed, so nothing derived from the protection
/// key is returned: only whether protection is on and where the key came from.
async fn auth_status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.auth.auth_status(&state.protection);
    let source = state.protection.storage().source;
    let forwarded: Vec<String> = state.auth.claude_code_env_vars().into_keys().collect();
    let providers: Vec<_> = state
        .auth
        .providers()
        .iter()
        .map(|p| {
            json!({
                "method": p.method(),
                "detected": p.detect(),
                "required_env_vars": p.required_env_vars(),
            })
        })
        .collect();

    Json(json!({
        "auth": status,
        "state": state.auth.state(),
        "protection": {
            "enabled": state.protection.is_protection_enabled(),
            "source": source,
            "policy": state.protection.policy(),
        },
        "forwarded_env": forwarded,
        "providers": providers,
    }))
}

async fn validate_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let valid = state.auth.validate_auth().await;
    let errors = state
        .auth
        .last_result()
        .map(|r| r.errors().to_vec())
        .unwrap_or_default();
    info!(valid, method = ?state.auth.current_method(), "Authentication re-validated");

    let status = if valid {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "valid": valid,
            "method": state.auth.current_method(),
            "errors": errors,
        })),
    )
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

async fn security_events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let events = state
        .protection
        .recent_events(query.limit.unwrap_or(DEFAULT_EVENT_LIMIT));
    Json(json!({
        "count": events.len(),
        "events": events,
    }))
}
