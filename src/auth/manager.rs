//! Priority-ordered authentication resolution
//!
//! [`AuthManager`] walks the providers in priority order, validates every
//! detected one until the first success, and caches the winner. Each
//! resolution replaces the cached state in a single write; readers never see
//! a half-updated state.

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::method::AuthMethod;
use super::provider::{ForwardedEnv, Provider, ProviderSettings, default_providers};
use super::result::AuthValidationResult;
use crate::env::EnvSnapshot;
use crate::security::ProtectionConfig;

/// Externally visible resolver state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "method", rename_all = "snake_case")]
pub enum AuthState {
    /// No resolution has run yet
    Unresolved,
    /// A provider validated
    Resolved(AuthMethod),
    /// The last resolution (or re-validation) failed
    Failed,
}

#[derive(Debug, Clone, Default)]
enum ResolverState {
    #[default]
    Unresolved,
    Resolved {
        index: usize,
        result: AuthValidationResult,
    },
    Failed {
        result: AuthValidationResult,
    },
}

/// Combined authentication and protection status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthStatus {
    /// A provider is resolved and valid
    pub authenticated: bool,
    /// Resolved method, if any
    pub method: Option<AuthMethod>,
    /// Inbound requests require a bearer token
    pub api_key_protected: bool,
    /// Errors of the last failed resolution
    pub errors: Vec<String>,
}

/// Resolves and caches the outbound credential source
#[derive(Debug)]
pub struct AuthManager {
    providers: Vec<Provider>,
    state: RwLock<ResolverState>,
}

impl AuthManager {
    /// Manager over the default providers reading from `env`
    #[must_use]
    pub fn from_env(env: &EnvSnapshot, settings: &ProviderSettings) -> Self {
        Self::with_providers(default_providers(env, settings))
    }

    /// Manager over an explicit provider list (already in priority order)
    #[must_use]
    pub fn with_providers(providers: Vec<Provider>) -> Self {
        Self {
            providers,
            state: RwLock::new(ResolverState::Unresolved),
        }
    }

    /// Providers in priority order
    #[must_use]
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Run a full resolution.
    ///
    /// Undetected providers are skipped silently. The first detected provider
    /// that validates wins and later ones are never evaluated. When none
    /// validates, the result carries every detected provider's errors in
    /// priority order.
    pub async fn detect_auth_method(&self) -> AuthValidationResult {
        let mut errors = Vec::new();

        for (index, provider) in self.providers.iter().enumerate() {
            let method = provider.method();
            if !provider.detect() {
                debug!(method = %method, "Provider not configured, skipping");
                continue;
            }

            let result = provider.validate().await;
            if result.is_valid() {
                info!(method = %method, "Authentication resolved");
                *self.state.write() = ResolverState::Resolved {
                    index,
                    result: result.clone(),
                };
                return result;
            }

            warn!(method = %method, errors = result.errors().len(), "Provider failed validation");
            errors.extend(result.errors().iter().cloned());
        }

        let result = AuthValidationResult::failure(errors);
        error!(
            errors = result.errors().len(),
            "No authentication method validated:\n{}",
            result.error_summary()
        );
        *self.state.write() = ResolverState::Failed {
            result: result.clone(),
        };
        result
    }

    /// Re-validate the cached provider, or resolve from scratch if none
    pub async fn validate_auth(&self) -> bool {
        let cached = match &*self.state.read() {
            ResolverState::Resolved { index, .. } => Some(*index),
            _ => None,
        };

        let Some((index, provider)) =
            cached.and_then(|index| self.providers.get(index).map(|p| (index, p)))
        else {
            return self.detect_auth_method().await.is_valid();
        };

        let result = provider.validate().await;
        let valid = result.is_valid();
        if valid {
            debug!(method = %provider.method(), "Cached provider still valid");
            *self.state.write() = ResolverState::Resolved { index, result };
        } else {
            warn!(method = %provider.method(), "Cached provider no longer validates");
            *self.state.write() = ResolverState::Failed { result };
        }
        valid
    }

    /// Method of the cached provider
    #[must_use]
    pub fn current_method(&self) -> Option<AuthMethod> {
        match &*self.state.read() {
            ResolverState::Resolved { index, .. } => self.providers.get(*index).map(Provider::method),
            _ => None,
        }
    }

    /// Environment the upstream Claude process needs (empty when unresolved)
    #[must_use]
    pub fn claude_code_env_vars(&self) -> ForwardedEnv {
        match &*self.state.read() {
            ResolverState::Resolved { index, .. } => self
                .providers
                .get(*index)
                .map(Provider::env_vars)
                .unwrap_or_default(),
            _ => ForwardedEnv::new(),
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> AuthState {
        match &*self.state.read() {
            ResolverState::Unresolved => AuthState::Unresolved,
            ResolverState::Resolved { index, .. } => self
                .providers
                .get(*index)
                .map_or(AuthState::Failed, |p| AuthState::Resolved(p.method())),
            ResolverState::Failed { .. } => AuthState::Failed,
        }
    }

    /// Result of the last resolution or re-validation
    #[must_use]
    pub fn last_result(&self) -> Option<AuthValidationResult> {
        match &*self.state.read() {
            ResolverState::Unresolved => None,
            ResolverState::Resolved { result, .. } | ResolverState::Failed { result } => {
                Some(result.clone())
            }
        }
    }

    /// Resolver state combined with inbound protection
    #[must_use]
    pub fn auth_status(&self, protection: &ProtectionConfig) -> AuthStatus {
        let state = self.state.read().clone();
        let (authenticated, method, errors) = match state {
            ResolverState::Unresolved => (false, None, Vec::new()),
            ResolverState::Resolved { index, .. } => (
                true,
                self.providers.get(index).map(Provider::method),
                Vec::new(),
            ),
            ResolverState::Failed { result } => (false, None, result.errors().to_vec()),
        };
        AuthStatus {
            authenticated,
            method,
            api_key_protected: protection.is_protection_enabled(),
            errors,
        }
    }
}
