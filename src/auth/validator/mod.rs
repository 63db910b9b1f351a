//! Two-phase credential validation
//!
//! Every validator first checks the credential's shape locally
//! ([`CredentialValidator::validate_format`]) and only then probes the live
//! API ([`CredentialValidator::validate_with_api`]). The probe follows one
//! policy for all services:
//!
//! | Outcome | Verdict |
//! |---------|---------|
//! | 2xx, or 400/405/422 (request rejected, not the credential) | valid |
//! | 401 / 403 | invalid (unauthorized / insufficient permission) |
//! | any other status | invalid, status in the message |
//! | deadline exceeded | invalid, "validation timed out" |
//! | connection failure (DNS, refused) | assumed valid, with a note |
//! | malformed request, unreadable body | invalid, "Unable to validate credential with API" |

mod anthropic;
mod bedrock;
mod sigv4;
mod vertex;

pub use anthropic::{AnthropicValidator, ApiKeyCredential};
pub use bedrock::{AwsCredential, BedrockValidator};
pub use vertex::{GcpCredential, GoogleCredentialsFile, VertexValidator};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::error::AuthError;

/// Message used when the probe fails for a reason unrelated to the credential
pub const UNABLE_TO_VALIDATE: &str = "Unable to validate credential with API";

/// Default deadline for one live validation
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a full two-phase validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Whether the credential is usable
    pub is_valid: bool,
    /// Failure reason
    pub error_message: Option<String>,
    /// Non-secret diagnostics (phase, status, notes)
    pub details: Map<String, Value>,
}

impl ValidationOutcome {
    /// Successful outcome
    #[must_use]
    pub fn valid(details: Map<String, Value>) -> Self {
        Self {
            is_valid: true,
            error_message: None,
            details,
        }
    }

    /// Failed outcome
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.into()),
            details: Map::new(),
        }
    }

    /// Attach a diagnostic field
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Successful live probe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiCheck {
    /// Diagnostics gathered during the probe
    pub details: Map<String, Value>,
}

impl ApiCheck {
    /// The API answered and accepted the credential
    #[must_use]
    pub fn verified(status: StatusCode) -> Self {
        let mut details = Map::new();
        details.insert("status".into(), Value::from(status.as_u16()));
        details.insert("verified".into(), Value::Bool(true));
        Self { details }
    }

    /// The API could not be reached; treated as valid
    #[must_use]
    pub fn assumed_valid(note: impl Into<String>) -> Self {
        let mut details = Map::new();
        details.insert("verified".into(), Value::Bool(false));
        details.insert("note".into(), Value::String(note.into()));
        Self { details }
    }

    /// Whether the API actually confirmed the credential
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.details
            .get("verified")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Two-phase credential validation contract
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Credential material this validator understands
    type Credential: Send + Sync;

    /// Service name used in messages
    fn service(&self) -> &'static str;

    /// Synchronous shape check. No network.
    fn validate_format(&self, credential: &Self::Credential) -> Result<(), AuthError>;

    /// One bounded probe against the live API
    async fn validate_with_api(&self, credential: &Self::Credential) -> Result<ApiCheck, AuthError>;

    /// Format check, then live probe.
    ///
    /// Never makes a network call when the format check fails. Errors that
    /// are not a verdict about the credential collapse into
    /// [`UNABLE_TO_VALIDATE`].
    async fn validate(&self, credential: &Self::Credential) -> ValidationOutcome {
        if let Err(e) = self.validate_format(credential) {
            debug!(service = self.service(), error = %e, "Credential format check failed");
            return ValidationOutcome::invalid(e.to_string()).with_detail("phase", "format");
        }

        match self.validate_with_api(credential).await {
            Ok(check) => ValidationOutcome::valid(check.details).with_detail("phase", "api"),
            Err(e) if e.is_credential_verdict() => {
                ValidationOutcome::invalid(e.to_string()).with_detail("phase", "api")
            }
            Err(e) => {
                warn!(service = self.service(), error = %e, "Live credential validation failed unexpectedly");
                ValidationOutcome::invalid(UNABLE_TO_VALIDATE)
                    .with_detail("phase", "api")
                    .with_detail("error", e.to_string())
            }
        }
    }
}

/// Map a probe status onto the validation policy
pub(crate) fn classify_status(service: &'static str, status: StatusCode) -> Result<ApiCheck, AuthError> {
    match status.as_u16() {
        200..=299 | 400 | 405 | 422 => Ok(ApiCheck::verified(status)),
        401 => Err(AuthError::Unauthorized { service }),
        403 => Err(AuthError::Forbidden { service }),
        other => Err(AuthError::UnexpectedStatus {
            service,
            status: other,
        }),
    }
}

/// Map a transport failure onto the validation policy.
///
/// Only connection-level failures (DNS, refused, reset) are downgraded to a
/// pass. Builder, body and decode errors are local faults and surface as
/// [`AuthError::Internal`].
pub(crate) fn classify_transport_error(
    service: &'static str,
    timeout: Duration,
    error: &reqwest::Error,
) -> Result<ApiCheck, AuthError> {
    if error.is_timeout() {
        return Err(AuthError::Timeout { service, timeout });
    }
    let local_fault = error.is_builder() || error.is_decode() || error.is_body();
    let network = error.is_connect() || error.is_request();
    if local_fault || !network {
        return Err(AuthError::Internal(format!("{service} probe could not be sent: {error}")));
    }
    let downgraded = AuthError::TransientNetwork {
        service,
        reason: error.to_string(),
    };
    warn!(service, error = %downgraded, "Validation endpoint unreachable, assuming credential is valid");
    Ok(ApiCheck::assumed_valid(format!(
        "{service} could not be reached; credential assumed valid"
    )))
}

/// Send a probe and classify the outcome
pub(crate) async fn send_probe(
    service: &'static str,
    timeout: Duration,
    request: reqwest::RequestBuilder,
) -> Result<ApiCheck, AuthError> {
    match request.send().await {
        Ok(response) => {
            debug!(service, status = %response.status(), "Validation probe answered");
            classify_status(service, response.status())
        }
        Err(e) => classify_transport_error(service, timeout, &e),
    }
}

/// Run `probe` under `timeout`, dropping (and so aborting) it on expiry
pub(crate) async fn with_deadline<F>(
    service: &'static str,
    timeout: Duration,
    probe: F,
) -> Result<ApiCheck, AuthError>
where
    F: Future<Output = Result<ApiCheck, AuthError>> + Send,
{
    tokio::time::timeout(timeout, probe)
        .await
        .unwrap_or(Err(AuthError::Timeout { service, timeout }))
}
