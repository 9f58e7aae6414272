//! Server module for managing the operator lifecycle
//!
//! Binds the command listener, starts the operator and runs both until a
//! shutdown signal arrives.

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::api::routes::create_router;
use crate::config::{Environment, settings::Settings};
use crate::operator::Operator;
use crate::state::AppState;

/// Operator process: command listener plus job loops
pub struct Server {
    settings: Settings,
}

impl Server {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Start everything and run until Ctrl+C or SIGTERM.
    ///
    /// Startup is all-or-nothing: the listener is bound and the operator
    /// built before any job loop starts, so a bad address or an invalid
    /// cron expression aborts with nothing running.
    ///
    /// # Errors
    /// - Address binding errors
    /// - Tracker or chat client construction errors
    /// - Invalid schedules
    /// - Server runtime errors
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %Environment::from_env().as_str(),
            "Application starting"
        );

        tracing::info!(
            endpoint = %self.settings.tracker.endpoint,
            api_key_configured = !self.settings.tracker.api_key.is_empty(),
            product = ?self.settings.tracker.product,
            "Tracker configuration loaded"
        );

        tracing::info!(
            admin_channel = %self.settings.chat.admin_channel,
            token_configured = !self.settings.chat.token.is_empty(),
            verification_enabled = !self.settings.chat.verification_token.is_empty(),
            "Chat configuration loaded"
        );

        tracing::info!(
            resync_interval = self.settings.operator.resync_interval,
            schedules = self.settings.operator.schedules.len(),
            disabled = ?self.settings.operator.disabled_jobs,
            enabled = ?self.settings.operator.enabled_jobs,
            "Operator configuration loaded"
        );

        let address = self.settings.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;

        let cancel = CancellationToken::new();
        let verification_token = self.settings.chat.verification_token.clone();
        let mut operator = Operator::new(self.settings, cancel.clone()).await?;

        let state = AppState::new(
            operator.dispatcher(),
            verification_token,
            cancel.clone(),
            operator.command_tasks(),
        );
        let router = create_router(state);

        operator.start().await?;
        tokio::spawn(shutdown_signal(cancel.clone()));

        tracing::info!(address = %address, "Command listener ready");

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .await;

        // the listener may also stop on its own; loops must stop either way
        cancel.cancel();
        operator.shutdown().await;
        tracing::info!("Server shutdown complete");

        served.map_err(Into::into)
    }
}

/// Cancels `cancel` on Ctrl+C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = cancel.cancelled() => return,
    }

    cancel.cancel();
}
