//! Error types for claude-wrapper

use std::io;

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias for claude-wrapper
pub type Result<T> = std::result::Result<T, Error>;

/// Service-level errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication could not be resolved
    #[error("Authentication failed:\n{0}")]
    AuthResolution(String),

    /// Credential or protection-key error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Token utility error
    #[error("Token error: {0}")]
    Token(#[from] secure_token::TokenError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Process exit code for CLI subcommands
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78, // EX_CONFIG
            Self::AuthResolution(_) | Self::Auth(_) => 77, // EX_NOPERM
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_config_and_auth_failures() {
        assert_eq!(Error::Config("bad".into()).exit_code(), 78);
        assert_eq!(Error::AuthResolution("none".into()).exit_code(), 77);
        assert_eq!(Error::Internal("boom".into()).exit_code(), 1);
    }

    #[test]
    fn converted_errors_map_to_their_exit_codes() {
        let io: Error = io::Error::new(io::ErrorKind::AddrInUse, "port taken").into();
        assert_eq!(io.exit_code(), 1);

        let token: Error = secure_token::TokenError::LengthOutOfBounds {
            length: 4,
            min: 16,
            max: 128,
        }
        .into();
        assert_eq!(token.exit_code(), 1);

        let auth: Error = AuthError::Internal("broken".into()).into();
        assert_eq!(auth.exit_code(), 77);
    }

    #[test]
    fn auth_resolution_message_keeps_every_line() {
        let err = Error::AuthResolution("bedrock: a\nvertex: b".into());
        let rendered = err.to_string();
        assert!(rendered.contains("bedrock: a"));
        assert!(rendered.contains("vertex: b"));
    }
}
