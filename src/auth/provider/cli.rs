use std::path::Path;

use serde_json::Value;

use crate::auth::method::AuthMethod;
use crate::auth::result::AuthValidationResult;
use crate::env::EnvSnapshot;

const CLI_PATH_VAR: &str = "CLAUDE_CLI_PATH";

/// Locally installed Claude CLI using its own login.
///
/// Always detected. Forwards nothing: the CLI reads its own credentials.
#[derive(Debug, Clone)]
pub struct ClaudeCliProvider {
    env: EnvSnapshot,
}

impl ClaudeCliProvider {
    /// Provider reading from `env`
    #[must_use]
    pub fn new(env: EnvSnapshot) -> Self {
        Self { env }
    }

    pub(super) fn detect(&self) -> bool {
        true
    }

    /// Valid unless `CLAUDE_CLI_PATH` points at a missing file
    pub(super) fn validate(&self) -> AuthValidationResult {
        let method = AuthMethod::ClaudeCli;
        let mut builder = AuthValidationResult::builder(method).config("phase", "format");

        match self.env.get(CLI_PATH_VAR) {
            Some(path) if !Path::new(path).is_file() => {
                builder = builder.error(format!(
                    "{}: {CLI_PATH_VAR} '{path}' does not exist",
                    method.display_name()
                ));
            }
            Some(path) => builder = builder.config("cli_path", Value::String(path.to_string())),
            None => builder = builder.config("cli_path", "claude"),
        }

        builder.build()
    }
}
