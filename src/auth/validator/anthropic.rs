//! Anthropic API key validation

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{ApiCheck, CredentialValidator, DEFAULT_VALIDATION_TIMEOUT, send_probe, with_deadline};
use crate::auth::error::AuthError;

/// Default Anthropic API base URL
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// API version header sent with the probe
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Every Anthropic key starts with this
const KEY_PREFIX: &str = "sk-ant-";

const MIN_KEY_LENGTH: usize = 20;

const SERVICE: &str = "Anthropic API";

/// Anthropic API key
#[derive(Debug, Clone)]
pub struct ApiKeyCredential {
    /// The key (`ANTHROPIC_API_KEY`)
    pub api_key: Option<SecretString>,
}

/// Validates keys by listing one model
#[derive(Debug, Clone)]
pub struct AnthropicValidator {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AnthropicValidator {
    /// Validator against the public API
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }

    /// Override the API base URL (gateways, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the probe deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CredentialValidator for AnthropicValidator {
    type Credential = ApiKeyCredential;

    fn service(&self) -> &'static str {
        SERVICE
    }

    fn validate_format(&self, credential: &ApiKeyCredential) -> Result<(), AuthError> {
        let Some(ref key) = credential.api_key else {
            return Err(AuthError::Format("ANTHROPIC_API_KEY is not set".to_string()));
        };
        let key = key.expose_secret();

        if !key.starts_with(KEY_PREFIX) {
            return Err(AuthError::Format(format!(
                "ANTHROPIC_API_KEY must start with '{KEY_PREFIX}'"
            )));
        }
        if key.len() < MIN_KEY_LENGTH {
            return Err(AuthError::Format(format!(
                "ANTHROPIC_API_KEY is too short (expected at least {MIN_KEY_LENGTH} characters)"
            )));
        }
        if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(AuthError::Format(
                "ANTHROPIC_API_KEY contains invalid characters".to_string(),
            ));
        }
        Ok(())
    }

    async fn validate_with_api(&self, credential: &ApiKeyCredential) -> Result<ApiCheck, AuthError> {
        let key = credential
            .api_key
            .as_ref()
            .ok_or_else(|| AuthError::Format("ANTHROPIC_API_KEY is not set".to_string()))?;

        let request = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .query(&[("limit", "1")])
            .header("x-api-key", key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.timeout);

        with_deadline(SERVICE, self.timeout, send_probe(SERVICE, self.timeout, request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(key: &str) -> ApiKeyCredential {
        ApiKeyCredential {
            api_key: Some(SecretString::from(key.to_string())),
        }
    }

    fn validator() -> AnthropicValidator {
        AnthropicValidator::new(reqwest::Client::new())
    }

    #[test]
    fn accepts_well_formed_key() {
        let result = validator().validate_format(&credential("sk-ant-REDACTED"));
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_missing_key() {
        let err = validator()
            .validate_format(&ApiKeyCredential { api_key: None })
            .unwrap_err();
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn rejects_wrong_prefix_short_and_bad_charset() {
        let v = validator();
        assert!(
            v.validate_format(&credential("sk-proj-abcdefghijklmnopqrstuv"))
                .unwrap_err()
                .to_string()
                .contains("sk-ant-")
        );
        assert!(
            v.validate_format(&credential("sk-ant-short"))
                .unwrap_err()
                .to_string()
                .contains("too short")
        );
        assert!(
            v.validate_format(&credential("sk-ant-api03-abc def ghijklmnop"))
                .unwrap_err()
                .to_string()
                .contains("invalid characters")
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let v = validator().with_base_url("http://localhost:1234/");
        assert_eq!(v.base_url, "http://localhost:1234");
    }
}
