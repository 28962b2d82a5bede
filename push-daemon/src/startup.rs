//! Application startup and lifecycle management.
//!
//! The listener is bound in [`Application::build`], before anything is
//! served, so the shutdown handle exists as soon as the application does.

use crate::config::DaemonConfig;
use crate::handlers::{health_check, metrics_endpoint, send_notifications};
use crate::services::{FcmProvider, MockPushProvider, PushProvider};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Shared application state. Immutable; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub push_provider: Arc<dyn PushProvider>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/send_notifications", post(send_notifications))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Pick the provider the configuration asks for.
pub fn push_provider_from_config(config: &DaemonConfig) -> Arc<dyn PushProvider> {
    if config.fcm.dry_run {
        tracing::info!("FCM dry run enabled, using mock push provider");
        Arc::new(MockPushProvider::new())
    } else {
        tracing::info!(credentials = ?config.fcm.credentials, "FCM push provider configured");
        Arc::new(FcmProvider::new(config.fcm.clone()))
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
}

impl Application {
    /// Bind the listener and assemble the router around `push_provider`.
    pub async fn build(
        config: DaemonConfig,
        push_provider: Arc<dyn PushProvider>,
    ) -> Result<Self, AppError> {
        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("push-daemon: HTTP on port {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(AppState { push_provider }),
            shutdown: CancellationToken::new(),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Handle that stops the server gracefully when cancelled.
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve until the shutdown handle is cancelled. In-flight requests are
    /// drained before returning.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let shutdown = self.shutdown;
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                e
            })
    }
}

/// Install SIGINT and SIGTERM handlers now. The returned future resolves
/// once either signal arrives, including one delivered before it is polled.
pub fn shutdown_signal() -> impl Future<Output = ()> + Send {
    #[cfg(unix)]
    let handlers = {
        use signal::unix::{signal, SignalKind};
        (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        )
    };

    async move {
        #[cfg(unix)]
        {
            let (interrupt, terminate) = handlers;
            tokio::select! {
                _ = wait_for(interrupt, "SIGINT") => {},
                _ = wait_for(terminate, "SIGTERM") => {},
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }

        tracing::info!("Shutdown signal received");
    }
}

#[cfg(unix)]
async fn wait_for(handler: std::io::Result<signal::unix::Signal>, name: &str) {
    match handler {
        Ok(mut signal) => {
            signal.recv().await;
        }
        Err(e) => {
            tracing::error!("Failed to install {} handler: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}
