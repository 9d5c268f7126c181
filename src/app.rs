use crate::config::Config;
use crate::identity::StorefrontIdentity;
use crate::legacy::LegacyClient;
use crate::session::SessionCodec;
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

impl App {
    /// Build every component from an already-loaded configuration.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let legacy = LegacyClient::new(&config.legacy_store_url)
            .context("Failed to create legacy storefront client")?;

        let identity = Arc::new(StorefrontIdentity::new(
            config.storefront_api_url.clone(),
            config.storefront_api_token.clone(),
        ));

        let sessions = SessionCodec::new(
            &config.session_cookie_name,
            &config.session_secret,
            config.session_cookie_secure,
        )
        .context("Failed to create session codec")?;

        let policy = config.policy();
        info!(
            legacy = %config.legacy_store_url,
            public_origin = config.public_origin.as_deref().unwrap_or("<per-request>"),
            remove_noindex = policy.remove_noindex_tags,
            rewrite_canonical = policy.rewrite_canonical_links,
            strip_client_redirects = policy.strip_client_redirect_scripts,
            "proxy policy loaded"
        );

        let app_state = AppState::new(
            legacy,
            identity,
            sessions,
            policy,
            config.public_origin.clone(),
            config.legacy_user_agent.clone(),
        );

        Ok(App { config, app_state })
    }

    /// Serve until a shutdown signal arrives, then drain within `SHUTDOWN_TIMEOUT`.
    pub async fn run(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = %e, %addr, "Failed to bind listener");
                return ExitCode::FAILURE;
            }
        };
        info!(%addr, "listening");

        let router = create_router(self.app_state);
        let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal_rx.await;
                })
                .await
        });

        shutdown_signal().await;
        let _ = signal_tx.send(());

        let timeout = self.config.shutdown_timeout;
        info!(timeout = fmt_duration(timeout), "draining in-flight requests");
        match tokio::time::timeout(timeout, server).await {
            Ok(Ok(Ok(()))) => {
                info!("shutdown complete");
                ExitCode::SUCCESS
            }
            Ok(Ok(Err(e))) => {
                error!(error = %e, "server error during shutdown");
                ExitCode::FAILURE
            }
            Ok(Err(e)) => {
                error!(error = %e, "server task panicked");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!("graceful shutdown timed out, forcing exit");
                ExitCode::FAILURE
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
