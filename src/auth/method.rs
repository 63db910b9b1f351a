//! Authentication method identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Credential source authorizing upstream Claude calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Direct Anthropic API key
    Anthropic,
    /// AWS Bedrock with IAM access keys
    Bedrock,
    /// Google Vertex AI with a service account or ADC
    Vertex,
    /// Claude CLI's own login (no forwarded credentials)
    ClaudeCli,
}

impl AuthMethod {
    /// Stable identifier used in headers and JSON
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::Bedrock => "bedrock",
            Self::Vertex => "vertex",
            Self::ClaudeCli => "claude_cli",
        }
    }

    /// Human-readable name used as an error prefix
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Anthropic => "Anthropic API",
            Self::Bedrock => "AWS Bedrock",
            Self::Vertex => "Google Vertex AI",
            Self::ClaudeCli => "Claude CLI",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "bedrock" => Ok(Self::Bedrock),
            "vertex" => Ok(Self::Vertex),
            "claude_cli" | "claude-cli" | "cli" => Ok(Self::ClaudeCli),
            other => Err(format!("Unknown auth method: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for method in [
            AuthMethod::Anthropic,
            AuthMethod::Bedrock,
            AuthMethod::Vertex,
            AuthMethod::ClaudeCli,
        ] {
            assert_eq!(method.as_str().parse::<AuthMethod>().unwrap(), method);
        }
        assert!("oauth".parse::<AuthMethod>().is_err());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&AuthMethod::ClaudeCli).unwrap();
        assert_eq!(json, "\"claude_cli\"");
    }
}
