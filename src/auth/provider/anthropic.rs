use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use super::{ForwardedEnv, ProviderSettings, into_result, run_validator};
use crate::auth::method::AuthMethod;
use crate::auth::result::AuthValidationResult;
use crate::auth::validator::{AnthropicValidator, ApiKeyCredential};
use crate::env::EnvSnapshot;

const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Ambient Anthropic API key
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    env: EnvSnapshot,
    validator: AnthropicValidator,
    live_validation: bool,
}

impl AnthropicProvider {
    pub(super) const REQUIRED_ENV_VARS: &'static [&'static str] = &[API_KEY_VAR];

    /// Provider reading from `env`
    #[must_use]
    pub fn new(env: EnvSnapshot, settings: &ProviderSettings) -> Self {
        let mut validator =
            AnthropicValidator::new(settings.client.clone()).with_timeout(settings.timeout);
        if let Some(ref base_url) = settings.anthropic_base_url {
            validator = validator.with_base_url(base_url.clone());
        }
        Self {
            env,
            validator,
            live_validation: settings.live_validation,
        }
    }

    fn credential(&self) -> ApiKeyCredential {
        ApiKeyCredential {
            api_key: self.env.get_owned(API_KEY_VAR).map(SecretString::from),
        }
    }

    pub(super) fn detect(&self) -> bool {
        self.env.is_set(API_KEY_VAR)
    }

    pub(super) async fn validate(&self) -> AuthValidationResult {
        let credential = self.credential();

        let mut config = Map::new();
        config.insert("api_key_present".into(), Value::Bool(credential.api_key.is_some()));
        if let Some(ref key) = credential.api_key {
            config.insert(
                "api_key_hash".into(),
                Value::String(secure_token::safe_hash(key.expose_secret())),
            );
        }

        let outcome = run_validator(&self.validator, &credential, self.live_validation).await;
        into_result(AuthMethod::Anthropic, outcome, config)
    }

    pub(super) fn env_vars(&self) -> ForwardedEnv {
        let mut vars = ForwardedEnv::new();
        if let Some(key) = self.env.get_owned(API_KEY_VAR) {
            vars.insert(API_KEY_VAR.to_string(), SecretString::from(key));
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(key: &str) -> AnthropicProvider {
        let settings = ProviderSettings {
            live_validation: false,
            adc_fallback: None,
            ..ProviderSettings::default()
        };
        AnthropicProvider::new(EnvSnapshot::from_vars([(API_KEY_VAR, key)]), &settings)
    }

    #[test]
    fn detects_non_empty_key_only() {
        assert!(provider("sk-ant-REDACTED").detect());
        assert!(!provider("").detect());
    }

    #[tokio::test]
    async fn result_config_never_contains_the_key() {
        let key = "sk-ant-REDACTED";
        let result = provider(key).validate().await;

        assert!(result.is_valid());
        let rendered = serde_json::to_string(&result).unwrap();
        assert!(!rendered.contains(key));
        assert_eq!(
            result.config()["api_key_hash"],
            Value::String(secure_token::safe_hash(key))
        );
    }

    #[tokio::test]
    async fn malformed_key_is_reported_with_provider_name() {
        let result = provider("not-a-key").validate().await;
        assert!(!result.is_valid());
        assert!(result.errors()[0].starts_with("Anthropic API: "));
    }

    #[test]
    fn forwards_the_key() {
        let vars = provider("sk-ant-REDACTED").env_vars();
        assert_eq!(
            vars[API_KEY_VAR].expose_secret(),
            "sk-ant-REDACTED"
        );
    }
}
