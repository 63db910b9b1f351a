//! Google Vertex AI service-account / ADC validation
//!
//! The probe needs an OAuth access token first, obtained through `gcp_auth`:
//! service-account key files sign their own assertion, and the gcloud
//! `authorized_user` ADC file is exchanged with its refresh token. The token
//! is used once for the probe and then dropped.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use gcp_auth::{ConfigDefaultCredentials, CustomServiceAccount, Token, TokenProvider};
use regex::Regex;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ApiCheck, CredentialValidator, DEFAULT_VALIDATION_TIMEOUT, send_probe, with_deadline};
use crate::auth::error::AuthError;
use crate::auth::provider::well_known_adc_path;

const SERVICE: &str = "Google Vertex AI";

/// Default OAuth token endpoint
pub const DEFAULT_GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

#[allow(clippy::unwrap_used)]
static PROJECT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{4,28}[a-z0-9]$").unwrap());

/// `global`, or a `<geo>-<area><n>` location such as `us-east5`
#[allow(clippy::unwrap_used)]
static REGION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(global|[a-z]+-[a-z]+\d+)$").unwrap());

/// Parsed Google credentials file
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoogleCredentialsFile {
    /// Service account key file
    ServiceAccount {
        /// Service account email (JWT issuer)
        client_email: String,
        /// PEM-encoded RSA private key
        private_key: SecretString,
        /// Token endpoint declared by the key file
        #[serde(default)]
        token_uri: Option<String>,
    },
    /// gcloud user credentials (application default login)
    AuthorizedUser {
        /// OAuth client id
        client_id: String,
        /// OAuth client secret
        client_secret: SecretString,
        /// Long-lived refresh token
        refresh_token: SecretString,
    },
}

impl GoogleCredentialsFile {
    /// Read and parse a credentials file
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.is_file() {
            return Err(AuthError::Format(format!(
                "Google credentials file '{}' does not exist",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::Format(format!(
                "Google credentials file '{}' cannot be read: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AuthError::Format(format!(
                "Google credentials file '{}' is not a service account or authorized user JSON: {e}",
                path.display()
            ))
        })
    }

    /// `service_account` or `authorized_user`
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServiceAccount { .. } => "service_account",
            Self::AuthorizedUser { .. } => "authorized_user",
        }
    }
}

/// Vertex credential material read from the environment
#[derive(Debug, Clone, Default)]
pub struct GcpCredential {
    /// Explicit or well-known ADC file path
    pub credentials_path: Option<PathBuf>,
    /// `ANTHROPIC_VERTEX_PROJECT_ID` or `GOOGLE_CLOUD_PROJECT`
    pub project_id: Option<String>,
    /// `CLOUD_ML_REGION`
    pub region: String,
}

/// Validates ADC by fetching the project's Vertex location
#[derive(Debug, Clone)]
pub struct VertexValidator {
    client: reqwest::Client,
    endpoint: Option<String>,
    token_uri: Option<String>,
    timeout: Duration,
}

impl VertexValidator {
    /// Validator against the regional Vertex endpoint
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: None,
            token_uri: None,
            timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }

    /// Override the Vertex endpoint (private service connect, tests)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    /// Token endpoint for service accounts, replacing the key file's `token_uri`
    #[must_use]
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = Some(token_uri.into());
        self
    }

    /// Override the probe deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint_for(&self, region: &str) -> String {
        if let Some(ref endpoint) = self.endpoint {
            return endpoint.clone();
        }
        if region == "global" {
            "https://aiplatform.googleapis.com".to_string()
        } else {
            format!("https://{region}-aiplatform.googleapis.com")
        }
    }

    /// Load a service-account key, pointing it at the configured token endpoint
    fn service_account(&self, path: &Path) -> Result<CustomServiceAccount, AuthError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Internal(format!("Cannot read service account key: {e}")))?;
        let mut key: Value = serde_json::from_str(&content)
            .map_err(|e| AuthError::Internal(format!("Invalid service account key: {e}")))?;
        if let Some(fields) = key.as_object_mut() {
            let token_uri = self
                .token_uri
                .clone()
                .or_else(|| fields.get("token_uri").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| DEFAULT_GOOGLE_TOKEN_URI.to_string());
            fields.insert("token_uri".into(), Value::String(token_uri));
        }
        CustomServiceAccount::from_json(&key.to_string()).map_err(token_error)
    }

    /// Exchange the credentials for an access token.
    ///
    /// `Ok(None)` means the file is an `authorized_user` document outside the
    /// gcloud configuration directory, which `gcp_auth` cannot refresh.
    async fn access_token(&self, path: &Path, file: &GoogleCredentialsFile) -> Result<Option<Arc<Token>>, AuthError> {
        let token = match file {
            GoogleCredentialsFile::ServiceAccount { .. } => {
                self.service_account(path)?.token(&[CLOUD_PLATFORM_SCOPE]).await
            }
            GoogleCredentialsFile::AuthorizedUser { .. } => {
                if well_known_adc_path().as_deref() != Some(path) {
                    return Ok(None);
                }
                ConfigDefaultCredentials::new()
                    .await
                    .map_err(token_error)?
                    .token(&[CLOUD_PLATFORM_SCOPE])
                    .await
            }
        };
        let token = token.map_err(token_error)?;
        debug!(kind = file.kind(), "Obtained Google access token for validation");
        Ok(Some(token))
    }

    async fn probe(&self, credential: &GcpCredential) -> Result<ApiCheck, AuthError> {
        let path = credential
            .credentials_path
            .as_deref()
            .ok_or_else(|| AuthError::Format("Google credentials file is not configured".to_string()))?;
        let file = GoogleCredentialsFile::load(path)?;

        let Some(token) = self.access_token(path, &file).await? else {
            return Ok(ApiCheck::assumed_valid(format!(
                "{SERVICE} authorized_user credentials outside the gcloud configuration directory are format-checked only"
            )));
        };

        let mut check = self.probe_location(credential, token.as_str()).await?;
        check
            .details
            .insert("credentials_type".into(), Value::String(file.kind().to_string()));
        Ok(check)
    }

    /// `GET /v1/projects/{project}/locations/{region}` with `token`
    async fn probe_location(&self, credential: &GcpCredential, token: &str) -> Result<ApiCheck, AuthError> {
        let project = credential
            .project_id
            .as_deref()
            .ok_or_else(|| AuthError::Format("ANTHROPIC_VERTEX_PROJECT_ID is not set".to_string()))?;
        let url = format!(
            "{}/v1/projects/{project}/locations/{}",
            self.endpoint_for(&credential.region),
            credential.region
        );
        let request = self.client.get(url).bearer_auth(token).timeout(self.timeout);
        send_probe(SERVICE, self.timeout, request).await
    }
}

/// Token acquisition failures are validator faults, not credential verdicts
fn token_error(e: gcp_auth::Error) -> AuthError {
    AuthError::Internal(format!("Google token exchange failed: {e}"))
}

#[async_trait]
impl CredentialValidator for VertexValidator {
    type Credential = GcpCredential;

    fn service(&self) -> &'static str {
        SERVICE
    }

    fn validate_format(&self, credential: &GcpCredential) -> Result<(), AuthError> {
        let mut problems = Vec::new();

        match credential.credentials_path.as_deref() {
            None => problems.push(
                "GOOGLE_APPLICATION_CREDENTIALS is not set and no application default credentials were found"
                    .to_string(),
            ),
            Some(path) => {
                if let Err(e) = GoogleCredentialsFile::load(path) {
                    problems.push(e.to_string());
                }
            }
        }

        match credential.project_id.as_deref() {
            None => problems.push("ANTHROPIC_VERTEX_PROJECT_ID is not set".to_string()),
            Some(project) if !PROJECT_ID_RE.is_match(project) => {
                problems.push(format!("'{project}' is not a valid GCP project id"));
            }
            Some(_) => {}
        }

        if !REGION_RE.is_match(&credential.region) {
            problems.push(format!(
                "CLOUD_ML_REGION '{}' is not a valid Vertex AI location",
                credential.region
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Format(problems.join("; ")))
        }
    }

    async fn validate_with_api(&self, credential: &GcpCredential) -> Result<ApiCheck, AuthError> {
        with_deadline(SERVICE, self.timeout, self.probe(credential)).await
    }
}
