//! Wrapper HTTP server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use super::auth::AuthGate;
use super::router::{AppState, create_router};
use crate::auth::AuthManager;
use crate::config::Config;
use crate::security::ProtectionConfig;
use crate::{Error, Result};

/// HTTP front of the wrapper: resolves credentials, then serves
pub struct WrapperServer {
    config: Config,
    auth: Arc<AuthManager>,
    protection: Arc<ProtectionConfig>,
}

impl WrapperServer {
    /// Server over already-constructed auth and protection state
    #[must_use]
    pub fn new(config: Config, auth: Arc<AuthManager>, protection: Arc<ProtectionConfig>) -> Self {
        Self {
            config,
            auth,
            protection,
        }
    }

    /// Resolve credentials and serve until Ctrl+C / SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        // A failed resolution does not stop the server: /v1/auth/status reports it
        let resolution = self.auth.detect_auth_method().await;

        let state = Arc::new(AppState {
            auth: Arc::clone(&self.auth),
            protection: Arc::clone(&self.protection),
        });
        let gate = Arc::new(AuthGate::new(
            Arc::clone(&self.protection),
            self.config.security.skip_paths.clone(),
        ));
        let app = create_router(state, gate);

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("CLAUDE WRAPPER v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");

        match self.auth.current_method() {
            Some(method) => info!(method = %method, "Upstream authentication: {}", method.display_name()),
            None => error!(
                "Upstream authentication failed:\n{}",
                resolution.error_summary()
            ),
        }

        if self.protection.is_protection_enabled() {
            let storage = self.protection.storage();
            info!(
                source = ?storage.source,
                key = self.protection.masked_active_key().as_deref().unwrap_or_default(),
                "API KEY PROTECTION enabled"
            );
        } else if self.protection.policy().require_api_key {
            warn!("API key protection requested but no valid key is configured - endpoints are open");
        } else {
            warn!("API KEY PROTECTION disabled - endpoints are open to all requests");
        }
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
