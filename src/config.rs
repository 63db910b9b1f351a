//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::auth::validator::DEFAULT_VALIDATION_TIMEOUT;
use crate::security::SecurityPolicy;
use crate::{Error, Result};

/// Prefix of environment overrides (`CLAUDE_WRAPPER_SERVER__PORT=9000`)
pub const ENV_PREFIX: &str = "CLAUDE_WRAPPER_";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before the environment snapshot is taken.
    /// Paths support ~ expansion. Loaded in order; variables already set win.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Outbound credential validation
    pub auth: AuthConfig,
    /// Inbound API-key protection
    pub security: SecurityConfig,
}

impl Config {
    /// Load configuration: defaults, then the YAML file, then environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.auth.validation_timeout.is_zero() {
            return Err(Error::Config(
                "auth.validation_timeout must be greater than zero".to_string(),
            ));
        }
        self.security
            .policy
            .validate()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the configured env files into the process environment.
    /// Files that don't exist are skipped.
    pub fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = match (path_str.strip_prefix('~'), dirs::home_dir()) {
                (Some(rest), Some(home)) => format!("{}{rest}", home.display()),
                _ => path_str.clone(),
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Outbound credential validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Deadline for one live validation probe
    #[serde(with = "humantime_serde")]
    pub validation_timeout: Duration,
    /// Only check credential format; never call the remote APIs
    pub skip_live_validation: bool,
    /// Anthropic API base URL override
    pub anthropic_base_url: Option<String>,
    /// Bedrock endpoint override (VPC endpoints)
    pub bedrock_endpoint: Option<String>,
    /// Vertex AI endpoint override (private service connect)
    pub vertex_endpoint: Option<String>,
    /// Google OAuth token endpoint override for service-account keys
    pub google_token_uri: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
            skip_live_validation: false,
            anthropic_base_url: None,
            bedrock_endpoint: None,
            vertex_endpoint: None,
            google_token_uri: None,
        }
    }
}

/// Inbound protection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Protection policy
    #[serde(flatten)]
    pub policy: SecurityPolicy,
    /// Paths that bypass the bearer gate (exact, or followed by `/`)
    pub skip_paths: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            policy: SecurityPolicy::default(),
            skip_paths: vec!["/health".to_string(), "/v1/auth/status".to_string()],
        }
    }
}

/// Human-readable durations (`"10s"`, `"500ms"`, `"2m"`)
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize as milliseconds when sub-second, else seconds
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize `"30s"`, `"5m"`, `"100ms"` or a bare number of seconds
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();

        // "ms" before "s", or "100ms" would parse as "100m" seconds
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            let mins = mins.parse::<u64>().map_err(serde::de::Error::custom)?;
            mins.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| serde::de::Error::custom(format!("duration of {mins} minutes is too large")))
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.validation_timeout, Duration::from_secs(10));
        assert!(!config.security.policy.require_api_key);
        assert_eq!(config.security.skip_paths, ["/health", "/v1/auth/status"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml_file() {
        // GIVEN: a config file overriding a few fields
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "server:\n  port: 9100\nauth:\n  validation_timeout: 500ms\n  skip_live_validation: true\nsecurity:\n  require_api_key: true\n  min_key_length: 24"
        )
        .unwrap();
        drop(f);

        // WHEN: loading
        let config = Config::load(Some(&path)).unwrap();

        // THEN: overrides apply and everything else keeps its default
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.validation_timeout, Duration::from_millis(500));
        assert!(config.auth.skip_live_validation);
        assert!(config.security.policy.require_api_key);
        assert_eq!(config.security.policy.min_key_length, 24);
        assert_eq!(config.security.policy.max_key_length, 128);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/config.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "security:\n  min_key_length: 64\n  max_key_length: 32\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(with = "humantime_serde")]
        d: Duration,
    }

    #[test]
    fn test_duration_units() {
        let parse = |s: &str| {
            serde_json::from_str::<Wrapper>(&format!(r#"{{"d":"{s}"}}"#))
                .unwrap()
                .d
        };
        assert_eq!(parse("100ms"), Duration::from_millis(100));
        assert_eq!(parse("30s"), Duration::from_secs(30));
        assert_eq!(parse("2m"), Duration::from_secs(120));
        assert_eq!(parse("7"), Duration::from_secs(7));
    }

    #[test]
    fn test_oversized_minutes_are_an_error() {
        let value = format!(r#"{{"d":"{}m"}}"#, u64::MAX);
        let err = serde_json::from_str::<Wrapper>(&value).err().unwrap();
        assert!(err.to_string().contains("too large"));
    }
}
