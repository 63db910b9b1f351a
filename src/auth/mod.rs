//! Outbound credential resolution
//!
//! Decides which credential source (Anthropic API key, AWS Bedrock, Google
//! Vertex AI or the local Claude CLI) authorizes calls to Claude, validates
//! it, and exposes the environment the upstream process needs.

pub mod error;
pub mod manager;
pub mod method;
pub mod provider;
pub mod result;
pub mod validator;

pub use error::AuthError;
pub use manager::{AuthManager, AuthState, AuthStatus};
pub use method::AuthMethod;
pub use provider::{ForwardedEnv, Provider, ProviderSettings, default_providers};
pub use result::{AuthValidationResult, AuthValidationResultBuilder};
pub use validator::{CredentialValidator, ValidationOutcome};
