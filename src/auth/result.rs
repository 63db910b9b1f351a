//! Validation results and their builder

use serde::Serialize;
use serde_json::{Map, Value};

use super::method::AuthMethod;

/// Outcome of validating one provider, or of a whole resolution attempt.
///
/// Immutable once built; `config` only ever holds non-secret diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthValidationResult {
    valid: bool,
    errors: Vec<String>,
    config: Map<String, Value>,
    method: Option<AuthMethod>,
}

impl AuthValidationResult {
    /// Start building a result for `method`
    #[must_use]
    pub fn builder(method: AuthMethod) -> AuthValidationResultBuilder {
        AuthValidationResultBuilder::new(Some(method))
    }

    /// Failed resolution carrying the aggregated errors of every attempt
    #[must_use]
    pub fn failure(errors: Vec<String>) -> Self {
        let mut builder = AuthValidationResultBuilder::new(None);
        if errors.is_empty() {
            builder = builder.error("No authentication method detected");
        }
        for e in errors {
            builder = builder.error(e);
        }
        builder.build()
    }

    /// Whether the credential is usable
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Error messages in the order they were recorded
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Non-secret diagnostic fields
    #[must_use]
    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// Method this result belongs to (`None` for a failed resolution)
    #[must_use]
    pub fn method(&self) -> Option<AuthMethod> {
        self.method
    }

    /// Multi-line summary of every error, one per line
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("  - {e}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fluent builder for [`AuthValidationResult`]
#[derive(Debug)]
pub struct AuthValidationResultBuilder {
    valid: bool,
    errors: Vec<String>,
    config: Map<String, Value>,
    method: Option<AuthMethod>,
}

impl AuthValidationResultBuilder {
    fn new(method: Option<AuthMethod>) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            config: Map::new(),
            method,
        }
    }

    /// Record an error; any error makes the result invalid
    #[must_use]
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.valid = false;
        self.errors.push(message.into());
        self
    }

    /// Add a diagnostic field
    #[must_use]
    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Merge several diagnostic fields
    #[must_use]
    pub fn config_map(mut self, fields: Map<String, Value>) -> Self {
        self.config.extend(fields);
        self
    }

    /// Snapshot the result
    #[must_use]
    pub fn build(self) -> AuthValidationResult {
        AuthValidationResult {
            valid: self.valid,
            errors: self.errors,
            config: self.config,
            method: self.method,
        }
    }
}
