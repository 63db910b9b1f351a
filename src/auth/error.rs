//! Credential and protection-key errors

use std::time::Duration;

use thiserror::Error;

/// Authentication subsystem errors
///
/// Format, rejection, status and timeout variants are terminal for the
/// provider that produced them. [`AuthError::TransientNetwork`] is
/// downgraded to a pass by the validators.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Credential shape is wrong (no network involved)
    #[error("{0}")]
    Format(String),

    /// Remote API rejected the credential (401)
    #[error("{service} rejected the credential (unauthorized)")]
    Unauthorized {
        /// Service name
        service: &'static str,
    },

    /// Remote API accepted the identity but denied access (403)
    #[error("{service} credential has insufficient permission (forbidden)")]
    Forbidden {
        /// Service name
        service: &'static str,
    },

    /// Remote API returned a status that is neither success nor a rejection
    #[error("{service} returned unexpected status {status}")]
    UnexpectedStatus {
        /// Service name
        service: &'static str,
        /// HTTP status code
        status: u16,
    },

    /// Validator deadline exceeded
    #[error("{service} validation timed out after {}ms", .timeout.as_millis())]
    Timeout {
        /// Service name
        service: &'static str,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// Network failure indistinguishable from a local outage
    #[error("{service} unreachable: {reason}")]
    TransientNetwork {
        /// Service name
        service: &'static str,
        /// Transport error text
        reason: String,
    },

    /// Protection key or policy outside the configured bounds
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Random token generation failed
    #[error("Token generation failed: {0}")]
    TokenGeneration(#[from] secure_token::TokenError),

    /// Unexpected fault inside the inbound gate
    #[error("Authentication gate fault: {0}")]
    GateFault(String),

    /// HTTP client error outside the probe classification
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this error is an expected verdict about the credential
    /// (as opposed to a fault in the validator itself)
    #[must_use]
    pub fn is_credential_verdict(&self) -> bool {
        matches!(
            self,
            Self::Format(_)
                | Self::Unauthorized { .. }
                | Self::Forbidden { .. }
                | Self::UnexpectedStatus { .. }
                | Self::Timeout { .. }
        )
    }
}
