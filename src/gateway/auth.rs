//! Inbound bearer-token gate
//!
//! - Skip-listed paths bypass the gate
//! - Unprotected deployments pass everything through
//! - Otherwise `Authorization: Bearer <key>` is required and compared in
//!   constant time against the protection key
//!
//! Panics anywhere below the gate become a 500 via [`panic_response`], so a
//! fault never lets a request through.

use std::any::Any;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error, warn};

use super::router::AppState;
use crate::auth::AuthError;
use crate::security::ProtectionConfig;

/// Response header: whether inbound protection is active
pub const X_API_KEY_PROTECTED: &str = "x-api-key-protected";

/// Response header: resolved outbound authentication method
pub const X_AUTH_METHOD: &str = "x-auth-method";

/// Why a request was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// Path is on the skip-list
    SkipPath,
    /// Protection is not enabled
    Unprotected,
    /// Bearer token matched
    Authenticated,
}

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    /// No `Authorization` header
    MissingAuthorization,
    /// Header present but not `Bearer <token>`
    InvalidAuthorizationFormat,
    /// Token does not match
    InvalidApiKey,
    /// Internal fault
    InternalError,
}

impl GateRejection {
    /// Machine-readable code
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingAuthorization => "missing_authorization",
            Self::InvalidAuthorizationFormat => "invalid_authorization_format",
            Self::InvalidApiKey => "invalid_api_key",
            Self::InternalError => "internal_error",
        }
    }

    /// Message shown to the client
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingAuthorization => {
                "Missing Authorization header. Use: Authorization: Bearer <api-key>"
            }
            Self::InvalidAuthorizationFormat => {
                "Invalid Authorization header format. Use: Authorization: Bearer <api-key>"
            }
            Self::InvalidApiKey => "Invalid API key",
            Self::InternalError => "Internal authentication error",
        }
    }

    /// HTTP status
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message(),
                "type": "authentication_error",
                "code": self.code(),
            }
        }));
        if self.status() == StatusCode::UNAUTHORIZED {
            (self.status(), [("WWW-Authenticate", "Bearer")], body).into_response()
        } else {
            (self.status(), body).into_response()
        }
    }
}

/// Gate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Let the request through
    Allow(AllowReason),
    /// Refuse it
    Reject(GateRejection),
}

/// Bearer-token gate over the protection config
#[derive(Debug)]
pub struct AuthGate {
    protection: Arc<ProtectionConfig>,
    skip_paths: Vec<String>,
}

impl AuthGate {
    /// Gate with the given skip-list
    #[must_use]
    pub fn new(protection: Arc<ProtectionConfig>, skip_paths: Vec<String>) -> Self {
        Self {
            protection,
            skip_paths,
        }
    }

    /// Exact match, or a skip entry followed by `/`
    #[must_use]
    pub fn is_skip_path(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|skip| {
            let skip = skip.trim_end_matches('/');
            if skip.is_empty() {
                return path == "/";
            }
            path == skip
                || path
                    .strip_prefix(skip)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Decide one request
    #[must_use]
    pub fn check(&self, path: &str, authorization: Option<&HeaderValue>) -> GateDecision {
        if self.is_skip_path(path) {
            return GateDecision::Allow(AllowReason::SkipPath);
        }
        if !self.protection.is_protection_enabled() {
            return GateDecision::Allow(AllowReason::Unprotected);
        }
        let Some(value) = authorization else {
            return GateDecision::Reject(GateRejection::MissingAuthorization);
        };
        let Some(token) = parse_bearer(value) else {
            return GateDecision::Reject(GateRejection::InvalidAuthorizationFormat);
        };
        if self.protection.verify_api_key(token) {
            GateDecision::Allow(AllowReason::Authenticated)
        } else {
            GateDecision::Reject(GateRejection::InvalidApiKey)
        }
    }
}

/// Extract `<token>` from `Bearer <token>`.
///
/// The scheme is case-insensitive. Exactly one non-empty token must follow.
fn parse_bearer(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.split_ascii_whitespace();
    let scheme = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(token)
}

/// Bearer authentication middleware
pub async fn bearer_auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = gate.check(request.uri().path(), request.headers().get(AUTHORIZATION));
    match decision {
        GateDecision::Allow(reason) => {
            debug!(path = %request.uri().path(), ?reason, "Request allowed");
            next.run(request).await
        }
        GateDecision::Reject(rejection) => {
            warn!(
                path = %request.uri().path(),
                code = rejection.code(),
                "Request rejected"
            );
            rejection.into_response()
        }
    }
}

/// Stamp protection and method headers on every response
pub async fn auth_status_headers(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    stamp_status_headers(response.headers_mut(), &state);
    response
}

fn stamp_status_headers(headers: &mut HeaderMap, state: &AppState) {
    let protected = if state.protection.is_protection_enabled() {
        "true"
    } else {
        "false"
    };
    headers.insert(X_API_KEY_PROTECTED, HeaderValue::from_static(protected));
    if let Some(method) = state.auth.current_method() {
        headers.insert(X_AUTH_METHOD, HeaderValue::from_static(method.as_str()));
    }
}

/// `CatchPanicLayer` handler: fail closed with a 500
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    let fault = AuthError::GateFault(detail.to_string());
    error!(error = %fault, "Request handler panicked");
    GateRejection::InternalError.into_response()
}
