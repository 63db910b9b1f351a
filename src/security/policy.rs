//! Inbound API-key protection policy.
//!
//! The policy bounds what a protection key may look like and which sources
//! may supply it. Updates go through [`PolicyUpdate`] and are applied as a
//! whole record: a merge that would leave the policy inconsistent is
//! rejected and the previous policy stays in force.

use serde::{Deserialize, Serialize};

use crate::auth::AuthError;
use secure_token::{DEFAULT_MAX_LENGTH, DEFAULT_MIN_LENGTH, TokenGenerator};

/// Length used for generated keys when none is requested
pub const DEFAULT_GENERATED_KEY_LENGTH: usize = 32;

/// Protection policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    /// Require a bearer token on protected routes.
    pub require_api_key: bool,
    /// Shortest acceptable key.
    pub min_key_length: usize,
    /// Longest acceptable key.
    pub max_key_length: usize,
    /// Accept a key from the `API_KEY` environment variable.
    pub allow_environment_key: bool,
    /// Accept keys set or generated at runtime.
    pub allow_runtime_key: bool,
    /// Record security events.
    pub log_security_events: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            require_api_key: false,
            min_key_length: 16,
            max_key_length: 128,
            allow_environment_key: true,
            allow_runtime_key: true,
            log_security_events: true,
        }
    }
}

/// Partial policy; `None` fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyUpdate {
    /// See [`SecurityPolicy::require_api_key`]
    pub require_api_key: Option<bool>,
    /// See [`SecurityPolicy::min_key_length`]
    pub min_key_length: Option<usize>,
    /// See [`SecurityPolicy::max_key_length`]
    pub max_key_length: Option<usize>,
    /// See [`SecurityPolicy::allow_environment_key`]
    pub allow_environment_key: Option<bool>,
    /// See [`SecurityPolicy::allow_runtime_key`]
    pub allow_runtime_key: Option<bool>,
    /// See [`SecurityPolicy::log_security_events`]
    pub log_security_events: Option<bool>,
}

impl PolicyUpdate {
    /// Whether the update changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl SecurityPolicy {
    /// Check internal consistency.
    ///
    /// Bounds must be ordered and stay inside what the token generator
    /// supports.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.min_key_length < DEFAULT_MIN_LENGTH {
            return Err(AuthError::PolicyViolation(format!(
                "min_key_length must be at least {DEFAULT_MIN_LENGTH}"
            )));
        }
        if self.max_key_length > DEFAULT_MAX_LENGTH {
            return Err(AuthError::PolicyViolation(format!(
                "max_key_length must be at most {DEFAULT_MAX_LENGTH}"
            )));
        }
        if self.min_key_length > self.max_key_length {
            return Err(AuthError::PolicyViolation(format!(
                "min_key_length ({}) exceeds max_key_length ({})",
                self.min_key_length, self.max_key_length
            )));
        }
        Ok(())
    }

    /// Apply `update` on a copy, rejecting inconsistent results
    pub fn merged(&self, update: &PolicyUpdate) -> Result<Self, AuthError> {
        let merged = Self {
            require_api_key: update.require_api_key.unwrap_or(self.require_api_key),
            min_key_length: update.min_key_length.unwrap_or(self.min_key_length),
            max_key_length: update.max_key_length.unwrap_or(self.max_key_length),
            allow_environment_key: update
                .allow_environment_key
                .unwrap_or(self.allow_environment_key),
            allow_runtime_key: update.allow_runtime_key.unwrap_or(self.allow_runtime_key),
            log_security_events: update
                .log_security_events
                .unwrap_or(self.log_security_events),
        };
        merged.validate()?;
        Ok(merged)
    }

    /// Check a candidate protection key against the policy.
    ///
    /// Keys must be printable ASCII without whitespace so they survive the
    /// `Authorization: Bearer <key>` header unchanged.
    pub fn check_key(&self, key: &str) -> Result<(), AuthError> {
        let len = key.len();
        if len < self.min_key_length || len > self.max_key_length {
            return Err(AuthError::PolicyViolation(format!(
                "API key length {len} is outside the allowed range {}-{}",
                self.min_key_length, self.max_key_length
            )));
        }
        if !key.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(AuthError::PolicyViolation(
                "API key must be printable ASCII without whitespace".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `length` is an acceptable key length
    #[must_use]
    pub fn allows_length(&self, length: usize) -> bool {
        (self.min_key_length..=self.max_key_length).contains(&length)
    }

    /// Generator bounded by this policy
    pub fn key_generator(&self) -> Result<TokenGenerator, AuthError> {
        Ok(TokenGenerator::with_bounds(
            self.min_key_length,
            self.max_key_length,
        )?)
    }

    /// Default generated key length clamped into the policy bounds
    #[must_use]
    pub fn default_generated_length(&self) -> usize {
        DEFAULT_GENERATED_KEY_LENGTH.clamp(self.min_key_length, self.max_key_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let p = SecurityPolicy::default();
        assert!(!p.require_api_key);
        assert_eq!((p.min_key_length, p.max_key_length), (16, 128));
        assert!(p.allow_environment_key && p.allow_runtime_key && p.log_security_events);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn merge_applies_only_given_fields() {
        // GIVEN: the default policy
        let p = SecurityPolicy::default();

        // WHEN: requiring a key and raising the minimum
        let merged = p
            .merged(&PolicyUpdate {
                require_api_key: Some(true),
                min_key_length: Some(24),
                ..PolicyUpdate::default()
            })
            .unwrap();

        // THEN: only those fields change
        assert!(merged.require_api_key);
        assert_eq!(merged.min_key_length, 24);
        assert_eq!(merged.max_key_length, 128);
        assert!(merged.allow_runtime_key);
    }

    #[test]
    fn merge_rejects_inverted_bounds() {
        let err = SecurityPolicy::default()
            .merged(&PolicyUpdate {
                min_key_length: Some(64),
                max_key_length: Some(32),
                ..PolicyUpdate::default()
            })
            .unwrap_err();
        assert!(matches!(err, AuthError::PolicyViolation(_)));
    }

    #[test]
    fn merge_rejects_bounds_outside_generator_range() {
        let p = SecurityPolicy::default();
        assert!(p.merged(&PolicyUpdate { min_key_length: Some(4), ..Default::default() }).is_err());
        assert!(p.merged(&PolicyUpdate { max_key_length: Some(512), ..Default::default() }).is_err());
    }

    #[test]
    fn key_check_uses_policy_bounds() {
        let p = SecurityPolicy::default();
        assert!(p.check_key("short").is_err());
        assert!(p.check_key("correct-key-1234567890").is_ok());
        assert!(p.check_key("has whitespace in the key").is_err());
        assert!(p.check_key(&"x".repeat(129)).is_err());
    }

    #[test]
    fn generated_length_is_clamped() {
        let p = SecurityPolicy {
            min_key_length: 40,
            max_key_length: 64,
            ..SecurityPolicy::default()
        };
        assert_eq!(p.default_generated_length(), 40);
        assert_eq!(SecurityPolicy::default().default_generated_length(), 32);
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(PolicyUpdate::default().is_empty());
        assert!(!PolicyUpdate { require_api_key: Some(false), ..Default::default() }.is_empty());
    }
}
