use std::path::PathBuf;

use secrecy::SecretString;
use serde_json::{Map, Value};

use super::{ForwardedEnv, ProviderSettings, into_result, run_validator};
use crate::auth::method::AuthMethod;
use crate::auth::result::AuthValidationResult;
use crate::auth::validator::{GcpCredential, VertexValidator};
use crate::env::EnvSnapshot;

const USE_VERTEX_VAR: &str = "CLAUDE_CODE_USE_VERTEX";
const CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const PROJECT_VARS: &[&str] = &["ANTHROPIC_VERTEX_PROJECT_ID", "GOOGLE_CLOUD_PROJECT"];
const REGION_VAR: &str = "CLOUD_ML_REGION";

/// Region Claude Code uses when `CLOUD_ML_REGION` is unset
pub const DEFAULT_VERTEX_REGION: &str = "us-east5";

/// Where `gcloud auth application-default login` writes its credentials:
/// `%APPDATA%\gcloud` on Windows, `~/.config/gcloud` everywhere else
#[must_use]
pub fn well_known_adc_path() -> Option<PathBuf> {
    let base = if cfg!(windows) {
        dirs::config_dir()
    } else {
        dirs::home_dir().map(|home| home.join(".config"))
    };
    base.map(|dir| dir.join("gcloud").join("application_default_credentials.json"))
}

/// Google Vertex AI, selected by `CLAUDE_CODE_USE_VERTEX`
#[derive(Debug, Clone)]
pub struct VertexProvider {
    env: EnvSnapshot,
    validator: VertexValidator,
    live_validation: bool,
    adc_fallback: Option<PathBuf>,
}

impl VertexProvider {
    pub(super) const REQUIRED_ENV_VARS: &'static [&'static str] = &[
        USE_VERTEX_VAR,
        CREDENTIALS_VAR,
        "ANTHROPIC_VERTEX_PROJECT_ID",
        REGION_VAR,
    ];

    /// Provider reading from `env`
    #[must_use]
    pub fn new(env: EnvSnapshot, settings: &ProviderSettings) -> Self {
        let mut validator =
            VertexValidator::new(settings.client.clone()).with_timeout(settings.timeout);
        if let Some(ref endpoint) = settings.vertex_endpoint {
            validator = validator.with_endpoint(endpoint.clone());
        }
        if let Some(ref token_uri) = settings.google_token_uri {
            validator = validator.with_token_uri(token_uri.clone());
        }
        Self {
            env,
            validator,
            live_validation: settings.live_validation,
            adc_fallback: settings.adc_fallback.clone(),
        }
    }

    /// Explicit credentials path, else the gcloud ADC file when it exists
    fn credentials_path(&self) -> Option<PathBuf> {
        if let Some(path) = self.env.get(CREDENTIALS_VAR) {
            return Some(PathBuf::from(path));
        }
        self.adc_fallback.clone().filter(|path| path.is_file())
    }

    fn credential(&self) -> GcpCredential {
        GcpCredential {
            credentials_path: self.credentials_path(),
            project_id: self.env.first_of(PROJECT_VARS).map(str::to_string),
            region: self
                .env
                .get(REGION_VAR)
                .unwrap_or(DEFAULT_VERTEX_REGION)
                .to_string(),
        }
    }

    pub(super) fn detect(&self) -> bool {
        self.env.flag(USE_VERTEX_VAR)
    }

    pub(super) async fn validate(&self) -> AuthValidationResult {
        let credential = self.credential();

        let mut config = Map::new();
        config.insert("region".into(), Value::String(credential.region.clone()));
        if let Some(ref project) = credential.project_id {
            config.insert("project_id".into(), Value::String(project.clone()));
        }
        if let Some(ref path) = credential.credentials_path {
            config.insert(
                "credentials_file".into(),
                Value::String(path.display().to_string()),
            );
        }

        let outcome = run_validator(&self.validator, &credential, self.live_validation).await;
        into_result(AuthMethod::Vertex, outcome, config)
    }

    pub(super) fn env_vars(&self) -> ForwardedEnv {
        let credential = self.credential();
        let mut vars = ForwardedEnv::new();
        vars.insert(USE_VERTEX_VAR.to_string(), SecretString::from("1".to_string()));
        vars.insert(REGION_VAR.to_string(), SecretString::from(credential.region));
        if let Some(project) = credential.project_id {
            vars.insert(
                "ANTHROPIC_VERTEX_PROJECT_ID".to_string(),
                SecretString::from(project),
            );
        }
        if let Some(path) = credential.credentials_path {
            vars.insert(
                CREDENTIALS_VAR.to_string(),
                SecretString::from(path.display().to_string()),
            );
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn provider(vars: &[(&str, &str)], adc_fallback: Option<PathBuf>) -> VertexProvider {
        let settings = ProviderSettings {
            live_validation: false,
            adc_fallback,
            ..ProviderSettings::default()
        };
        VertexProvider::new(EnvSnapshot::from_vars(vars.iter().copied()), &settings)
    }

    fn adc_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("application_default_credentials.json");
        std::fs::write(
            &path,
            r#"{"type":"authorized_user","client_id":"c","client_secret":"s","refresh_token":"r"}"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn falls_back_to_gcloud_adc_and_google_cloud_project() {
        let dir = tempfile::tempdir().unwrap();
        let adc = adc_file(&dir);
        let p = provider(
            &[(USE_VERTEX_VAR, "1"), ("GOOGLE_CLOUD_PROJECT", "my-project-123")],
            Some(adc.clone()),
        );

        let result = p.validate().await;
        assert!(result.is_valid(), "{:?}", result.errors());
        assert_eq!(result.config()["region"], Value::String(DEFAULT_VERTEX_REGION.into()));
        assert_eq!(
            result.config()["credentials_file"],
            Value::String(adc.display().to_string())
        );
    }

    #[test]
    fn missing_adc_fallback_is_ignored() {
        let p = provider(
            &[(USE_VERTEX_VAR, "1")],
            Some(PathBuf::from("/nonexistent/adc.json")),
        );
        assert_eq!(p.credentials_path(), None);
    }

    #[tokio::test]
    async fn missing_everything_is_one_prefixed_error() {
        let result = provider(&[(USE_VERTEX_VAR, "yes")], None).validate().await;
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].starts_with("Google Vertex AI: "));
    }

    #[test]
    fn forwards_project_region_and_credentials() {
        let p = provider(
            &[
                (USE_VERTEX_VAR, "1"),
                ("ANTHROPIC_VERTEX_PROJECT_ID", "my-project-123"),
                (REGION_VAR, "europe-west1"),
                (CREDENTIALS_VAR, "/etc/gcp/key.json"),
            ],
            None,
        );
        let vars = p.env_vars();
        assert_eq!(vars[USE_VERTEX_VAR].expose_secret(), "1");
        assert_eq!(vars[REGION_VAR].expose_secret(), "europe-west1");
        assert_eq!(vars["ANTHROPIC_VERTEX_PROJECT_ID"].expose_secret(), "my-project-123");
        assert_eq!(vars[CREDENTIALS_VAR].expose_secret(), "/etc/gcp/key.json");
    }
}
