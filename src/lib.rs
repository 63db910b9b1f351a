//! Claude Wrapper Library
//!
//! Authentication core of an OpenAI-compatible wrapper around Claude.
//!
//! # Features
//!
//! - **Credential resolution**: AWS Bedrock, Google Vertex AI, Anthropic API
//!   key or the local Claude CLI, in fixed priority order
//! - **Two-phase validation**: local format checks, then one bounded probe
//!   against the live API
//! - **Inbound protection**: optional bearer-token gate with a bounded
//!   security-event audit trail
//! - **Secret hygiene**: raw keys are only ever logged as hashes or masks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod gateway;
pub mod security;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
