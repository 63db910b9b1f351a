//! Credential providers
//!
//! One provider per [`AuthMethod`]. A provider knows how to tell whether its
//! credential kind is configured (`detect`), how to validate it, and which
//! variables to forward to the upstream Claude process once it wins.

mod anthropic;
mod bedrock;
mod cli;
mod vertex;

pub use anthropic::AnthropicProvider;
pub use bedrock::BedrockProvider;
pub use cli::ClaudeCliProvider;
pub use vertex::{VertexProvider, well_known_adc_path};

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Map;

use super::method::AuthMethod;
use super::result::AuthValidationResult;
use super::validator::{CredentialValidator, DEFAULT_VALIDATION_TIMEOUT, ValidationOutcome};
use crate::config::AuthConfig;
use crate::env::EnvSnapshot;

/// Environment forwarded to the upstream Claude process, name to value
pub type ForwardedEnv = BTreeMap<String, SecretString>;

/// Knobs shared by every provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// HTTP client used for live probes
    pub client: reqwest::Client,
    /// Per-probe deadline
    pub timeout: Duration,
    /// Probe the live API after the format check
    pub live_validation: bool,
    /// Anthropic API base URL override
    pub anthropic_base_url: Option<String>,
    /// Bedrock endpoint override
    pub bedrock_endpoint: Option<String>,
    /// Vertex endpoint override
    pub vertex_endpoint: Option<String>,
    /// Google OAuth token endpoint override
    pub google_token_uri: Option<String>,
    /// Credentials file used when `GOOGLE_APPLICATION_CREDENTIALS` is unset
    pub adc_fallback: Option<PathBuf>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: DEFAULT_VALIDATION_TIMEOUT,
            live_validation: true,
            anthropic_base_url: None,
            bedrock_endpoint: None,
            vertex_endpoint: None,
            google_token_uri: None,
            adc_fallback: well_known_adc_path(),
        }
    }
}

impl ProviderSettings {
    /// Build settings from the `auth` config section
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            timeout: config.validation_timeout,
            live_validation: !config.skip_live_validation,
            anthropic_base_url: config.anthropic_base_url.clone(),
            bedrock_endpoint: config.bedrock_endpoint.clone(),
            vertex_endpoint: config.vertex_endpoint.clone(),
            google_token_uri: config.google_token_uri.clone(),
            ..Self::default()
        }
    }
}

/// A credential source, dispatched by kind
#[derive(Debug, Clone)]
pub enum Provider {
    /// AWS Bedrock IAM keys
    Bedrock(BedrockProvider),
    /// Google Vertex AI credentials
    Vertex(VertexProvider),
    /// Anthropic API key
    Anthropic(AnthropicProvider),
    /// Locally installed Claude CLI
    ClaudeCli(ClaudeCliProvider),
}

impl Provider {
    /// Method this provider authenticates with
    #[must_use]
    pub fn method(&self) -> AuthMethod {
        match self {
            Self::Bedrock(_) => AuthMethod::Bedrock,
            Self::Vertex(_) => AuthMethod::Vertex,
            Self::Anthropic(_) => AuthMethod::Anthropic,
            Self::ClaudeCli(_) => AuthMethod::ClaudeCli,
        }
    }

    /// Whether this credential kind is configured
    #[must_use]
    pub fn detect(&self) -> bool {
        match self {
            Self::Bedrock(p) => p.detect(),
            Self::Vertex(p) => p.detect(),
            Self::Anthropic(p) => p.detect(),
            Self::ClaudeCli(p) => p.detect(),
        }
    }

    /// Validate the credential (format, then live API)
    pub async fn validate(&self) -> AuthValidationResult {
        match self {
            Self::Bedrock(p) => p.validate().await,
            Self::Vertex(p) => p.validate().await,
            Self::Anthropic(p) => p.validate().await,
            Self::ClaudeCli(p) => p.validate(),
        }
    }

    /// Variables this provider needs
    #[must_use]
    pub fn required_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Bedrock(_) => BedrockProvider::REQUIRED_ENV_VARS,
            Self::Vertex(_) => VertexProvider::REQUIRED_ENV_VARS,
            Self::Anthropic(_) => AnthropicProvider::REQUIRED_ENV_VARS,
            Self::ClaudeCli(_) => &[],
        }
    }

    /// Environment to forward to the upstream Claude process
    #[must_use]
    pub fn env_vars(&self) -> ForwardedEnv {
        match self {
            Self::Bedrock(p) => p.env_vars(),
            Self::Vertex(p) => p.env_vars(),
            Self::Anthropic(p) => p.env_vars(),
            Self::ClaudeCli(_) => ForwardedEnv::new(),
        }
    }
}

/// Providers in resolution priority order.
///
/// The explicit `CLAUDE_CODE_USE_*` flags outrank an ambient Anthropic key;
/// the Claude CLI is the last resort.
#[must_use]
pub fn default_providers(env: &EnvSnapshot, settings: &ProviderSettings) -> Vec<Provider> {
    vec![
        Provider::Bedrock(BedrockProvider::new(env.clone(), settings)),
        Provider::Vertex(VertexProvider::new(env.clone(), settings)),
        Provider::Anthropic(AnthropicProvider::new(env.clone(), settings)),
        Provider::ClaudeCli(ClaudeCliProvider::new(env.clone())),
    ]
}

/// Run the validator, honouring format-only mode
async fn run_validator<V: CredentialValidator>(
    validator: &V,
    credential: &V::Credential,
    live_validation: bool,
) -> ValidationOutcome {
    if live_validation {
        return validator.validate(credential).await;
    }
    match validator.validate_format(credential) {
        Ok(()) => ValidationOutcome::valid(Map::new())
            .with_detail("phase", "format")
            .with_detail("live_validation", false),
        Err(e) => ValidationOutcome::invalid(e.to_string()).with_detail("phase", "format"),
    }
}

/// Fold a validator outcome into a provider result.
///
/// Errors are prefixed with the method's display name so an aggregated
/// resolution failure says which provider each line belongs to.
fn into_result(
    method: AuthMethod,
    outcome: ValidationOutcome,
    config: Map<String, serde_json::Value>,
) -> AuthValidationResult {
    let mut builder = AuthValidationResult::builder(method)
        .config_map(config)
        .config_map(outcome.details);
    if !outcome.is_valid {
        let message = outcome
            .error_message
            .unwrap_or_else(|| "validation failed".to_string());
        builder = builder.error(format!("{}: {message}", method.display_name()));
    }
    builder.build()
}
