//! Inbound API-key protection state.
//!
//! Holds at most one protection key, tagged with where it came from. The
//! raw key never leaves this module except through [`ProtectionConfig::verify_api_key`]
//! (a boolean) and the one-time return of a freshly generated key.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::events::{SecurityEvent, SecurityEventKind, SecurityEventLog};
use super::policy::{PolicyUpdate, SecurityPolicy};
use crate::auth::AuthError;
use crate::env::EnvSnapshot;

/// Environment variable holding the protection key
pub const API_KEY_ENV_VAR: &str = "API_KEY";

/// Where the active protection key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// `API_KEY` environment variable
    Environment,
    /// Set or generated at runtime
    Runtime,
    /// No key
    None,
}

/// Bookkeeping for the active key. Never holds the key itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyStorage {
    /// Key origin
    pub source: KeySource,
    /// First 8 hex chars of the key's SHA-256
    pub hash: String,
    /// Key length
    pub length: usize,
    /// When the key was accepted
    pub created_at: Option<DateTime<Utc>>,
}

impl ApiKeyStorage {
    fn none() -> Self {
        Self {
            source: KeySource::None,
            hash: secure_token::EMPTY_HASH.to_string(),
            length: 0,
            created_at: None,
        }
    }

    fn for_key(key: &str, source: KeySource) -> Self {
        Self {
            source,
            hash: secure_token::safe_hash(key),
            length: key.len(),
            created_at: Some(Utc::now()),
        }
    }
}

/// Options for [`ProtectionConfig::configure_api_key_protection`]
#[derive(Debug, Clone, Default)]
pub struct ProtectionOptions {
    /// Policy overrides merged before anything else
    pub policy: PolicyUpdate,
    /// Generate a runtime key when protection is required and no key exists
    pub generate_if_missing: bool,
    /// Length of a generated key (policy default when unset)
    pub key_length: Option<usize>,
}

/// Result of configuring protection
#[derive(Debug)]
pub struct ProtectionOutcome {
    /// Whether configuration succeeded
    pub success: bool,
    /// Human-readable summary
    pub message: String,
    /// Freshly generated key. Only ever returned here, once.
    pub generated_key: Option<SecretString>,
    /// Source of the key in force afterwards
    pub key_source: KeySource,
    /// Whether requests are now gated
    pub protection_enabled: bool,
}

#[derive(Debug)]
struct ActiveKey {
    secret: SecretString,
    storage: ApiKeyStorage,
}

#[derive(Debug)]
struct ProtectionState {
    policy: SecurityPolicy,
    key: Option<ActiveKey>,
}

/// Protection policy, the active key and the security-event trail
#[derive(Debug)]
pub struct ProtectionConfig {
    state: RwLock<ProtectionState>,
    events: SecurityEventLog,
    env: EnvSnapshot,
}

impl ProtectionConfig {
    /// Build from a policy, adopting `API_KEY` from `env` when valid.
    ///
    /// An invalid environment key is logged and ignored; it never enables
    /// protection.
    #[must_use]
    pub fn new(policy: SecurityPolicy, env: &EnvSnapshot) -> Self {
        let config = Self {
            state: RwLock::new(ProtectionState { policy, key: None }),
            events: SecurityEventLog::default(),
            env: env.clone(),
        };
        config.adopt_environment_key();
        config
    }

    fn adopt_environment_key(&self) {
        let Some(key) = self.env.get(API_KEY_ENV_VAR) else {
            return;
        };
        if !self.state.read().policy.allow_environment_key {
            debug!("Environment API key ignored by policy");
            return;
        }
        match self.set_api_key(key, KeySource::Environment) {
            Ok(storage) => info!(key_hash = %storage.hash, "Using API key from environment"),
            Err(e) => warn!(
                key_hash = %secure_token::safe_hash(key),
                error = %e,
                "Ignoring invalid API key from environment"
            ),
        }
    }

    fn record(&self, event: impl FnOnce() -> SecurityEvent) {
        if self.state.read().policy.log_security_events {
            self.events.record(event());
        }
    }

    /// Apply policy overrides and make sure a key exists if one is required
    pub fn configure_api_key_protection(&self, options: ProtectionOptions) -> ProtectionOutcome {
        if !options.policy.is_empty()
            && let Err(e) = self.update_policy(&options.policy)
        {
            return self.outcome(false, e.to_string(), None);
        }

        if self.has_valid_api_key() {
            let source = self.storage().source;
            return self.outcome(
                true,
                format!("API key protection using existing {} key", source_name(source)),
                None,
            );
        }

        let policy = self.policy();
        if policy.require_api_key && options.generate_if_missing {
            let length = options
                .key_length
                .unwrap_or_else(|| policy.default_generated_length());
            return match self.generate_api_key(length) {
                Ok(key) => self.outcome(true, "Generated runtime API key".to_string(), Some(key)),
                Err(e) => self.outcome(false, format!("Failed to generate API key: {e}"), None),
            };
        }

        let message = if policy.require_api_key {
            "API key protection required but no key is configured"
        } else {
            "API key protection disabled"
        };
        self.outcome(true, message.to_string(), None)
    }

    fn outcome(&self, success: bool, message: String, generated_key: Option<SecretString>) -> ProtectionOutcome {
        ProtectionOutcome {
            success,
            message,
            generated_key,
            key_source: self.storage().source,
            protection_enabled: self.is_protection_enabled(),
        }
    }

    /// Install `key` as the active key.
    ///
    /// Rejected keys are never stored and leave the current key in place.
    /// The policy check and the store happen under one write guard.
    pub fn set_api_key(&self, key: &str, source: KeySource) -> Result<ApiKeyStorage, AuthError> {
        let stored = {
            let mut state = self.state.write();
            check_source(&state.policy, source)
                .and_then(|()| state.policy.check_key(key))
                .map(|()| {
                    let storage = ApiKeyStorage::for_key(key, source);
                    state.key = Some(ActiveKey {
                        secret: SecretString::from(key.to_string()),
                        storage: storage.clone(),
                    });
                    storage
                })
        };

        match stored {
            Ok(storage) => {
                self.record(|| {
                    SecurityEvent::new(SecurityEventKind::KeySet, source)
                        .key_hash(storage.hash.clone())
                        .detail("length", storage.length)
                });
                Ok(storage)
            }
            Err(e) => {
                self.record(|| {
                    SecurityEvent::new(SecurityEventKind::KeyRejected, source)
                        .key_hash(secure_token::safe_hash(key))
                        .detail("reason", e.to_string())
                });
                Err(e)
            }
        }
    }

    /// Generate and install a runtime key of `length` characters.
    ///
    /// The returned secret is the only copy handed out.
    pub fn generate_api_key(&self, length: usize) -> Result<SecretString, AuthError> {
        let (token, storage) = {
            let mut state = self.state.write();
            check_source(&state.policy, KeySource::Runtime)?;
            if !state.policy.allows_length(length) {
                return Err(AuthError::PolicyViolation(format!(
                    "requested key length {length} is outside the allowed range {}-{}",
                    state.policy.min_key_length, state.policy.max_key_length
                )));
            }
            let token = state.policy.key_generator()?.generate(length)?;
            let storage = ApiKeyStorage::for_key(&token, KeySource::Runtime);
            state.key = Some(ActiveKey {
                secret: SecretString::from(token.clone()),
                storage: storage.clone(),
            });
            (token, storage)
        };

        info!(key_hash = %storage.hash, length, "Generated runtime API key");
        self.record(|| {
            SecurityEvent::new(SecurityEventKind::KeyGenerated, KeySource::Runtime)
                .key_hash(storage.hash.clone())
                .detail("length", length)
        });
        Ok(SecretString::from(token))
    }

    /// Drop a runtime key, falling back to a valid environment key.
    ///
    /// Returns whether a runtime key was removed.
    pub fn clear_runtime_key(&self) -> bool {
        let removed = {
            let mut state = self.state.write();
            let is_runtime = state
                .key
                .as_ref()
                .is_some_and(|active| active.storage.source == KeySource::Runtime);
            if is_runtime {
                state.key.take().map(|active| active.storage)
            } else {
                None
            }
        };
        let Some(storage) = removed else {
            return false;
        };
        self.record(|| {
            SecurityEvent::new(SecurityEventKind::KeyCleared, KeySource::Runtime).key_hash(storage.hash.clone())
        });
        self.adopt_environment_key();
        true
    }

    /// Whether a key is held and still satisfies the current policy,
    /// including the allowance for its source
    #[must_use]
    pub fn has_valid_api_key(&self) -> bool {
        let state = self.state.read();
        state.key.as_ref().is_some_and(|active| {
            check_source(&state.policy, active.storage.source).is_ok()
                && state.policy.check_key(active.secret.expose_secret()).is_ok()
        })
    }

    /// Whether inbound requests must present the key
    #[must_use]
    pub fn is_protection_enabled(&self) -> bool {
        let required = self.state.read().policy.require_api_key;
        required && self.has_valid_api_key()
    }

    /// Constant-time comparison against the active key
    #[must_use]
    pub fn verify_api_key(&self, candidate: &str) -> bool {
        self.state.read().key.as_ref().is_some_and(|active| {
            secure_token::constant_time_equals(candidate, active.secret.expose_secret())
        })
    }

    /// Masked form of any key, safe to log
    #[must_use]
    pub fn mask_api_key(key: &str) -> String {
        secure_token::mask_secret(key)
    }

    /// Masked form of the active key
    #[must_use]
    pub fn masked_active_key(&self) -> Option<String> {
        self.state
            .read()
            .key
            .as_ref()
            .map(|active| Self::mask_api_key(active.secret.expose_secret()))
    }

    /// Bookkeeping for the active key
    #[must_use]
    pub fn storage(&self) -> ApiKeyStorage {
        self.state
            .read()
            .key
            .as_ref()
            .map_or_else(ApiKeyStorage::none, |active| active.storage.clone())
    }

    /// Current policy
    #[must_use]
    pub fn policy(&self) -> SecurityPolicy {
        self.state.read().policy.clone()
    }

    /// Merge `update` into the policy as one write
    pub fn update_policy(&self, update: &PolicyUpdate) -> Result<SecurityPolicy, AuthError> {
        let (before, after) = {
            let mut state = self.state.write();
            let merged = state.policy.merged(update)?;
            let before = std::mem::replace(&mut state.policy, merged.clone());
            (before, merged)
        };

        if before.require_api_key != after.require_api_key {
            info!(require_api_key = after.require_api_key, "API key requirement changed");
        }
        let source = self.storage().source;
        // Recorded under the new policy, so disabling events is itself not logged
        self.record(|| {
            let mut event = SecurityEvent::new(SecurityEventKind::PolicyUpdated, source);
            if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(update) {
                for (k, v) in fields.into_iter().filter(|(_, v)| !v.is_null()) {
                    event = event.detail(&k, v);
                }
            }
            event
        });
        Ok(after)
    }

    /// All retained security events, oldest first
    #[must_use]
    pub fn security_events(&self) -> Vec<SecurityEvent> {
        self.events.snapshot()
    }

    /// The newest `limit` security events
    #[must_use]
    pub fn recent_events(&self, limit: usize) -> Vec<SecurityEvent> {
        self.events.recent(limit)
    }
}

/// Whether `policy` accepts keys from `source`
fn check_source(policy: &SecurityPolicy, source: KeySource) -> Result<(), AuthError> {
    match source {
        KeySource::None => Err(AuthError::PolicyViolation(
            "API key source must be environment or runtime".to_string(),
        )),
        KeySource::Environment if !policy.allow_environment_key => Err(AuthError::PolicyViolation(
            "environment API keys are disabled by policy".to_string(),
        )),
        KeySource::Runtime if !policy.allow_runtime_key => Err(AuthError::PolicyViolation(
            "runtime API keys are disabled by policy".to_string(),
        )),
        _ => Ok(()),
    }
}

fn source_name(source: KeySource) -> &'static str {
    match source {
        KeySource::Environment => "environment",
        KeySource::Runtime => "runtime",
        KeySource::None => "no",
    }
}
