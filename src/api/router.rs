//! API router configuration and server lifecycle.

use std::future::IntoFuture;

use axum::{
    routing::{any, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{api_info, execute, health, AppState};
use super::websocket::{ws_handler, ws_poll_handler, ws_stream_handler};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 50051;

/// Create the API router with all routes configured.
pub fn create_router() -> Router {
    create_router_with_state(AppState::new())
}

/// Create the API router with custom state.
pub fn create_router_with_state(state: AppState) -> Router {
    let api_v1 = Router::new()
        .route("/", get(api_info))
        .route("/execute", post(execute))
        .route("/execute/stream", any(ws_stream_handler))
        .route("/execute/poll", any(ws_poll_handler))
        .route("/ws", any(ws_handler));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Wait for in-flight calls after a shutdown signal.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            graceful_shutdown: false,
        }
    }

    pub fn with_graceful_shutdown(mut self, enabled: bool) -> Self {
        self.graceful_shutdown = enabled;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Start the API server and run it until a shutdown signal arrives.
pub async fn serve(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Starting shell-relay API server on {}", addr);

    serve_listener(listener, state, config.graceful_shutdown, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
///
/// Without `graceful`, in-flight calls are dropped with the listener; their
/// children are killed as the runner handles go away.
pub async fn serve_listener<F>(
    listener: TcpListener,
    state: AppState,
    graceful: bool,
    shutdown: F,
) -> crate::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let router = create_router_with_state(state);

    if graceful {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
    } else {
        tokio::select! {
            result = axum::serve(listener, router).into_future() => result?,
            _ = shutdown => {},
        }
    }

    info!("Stopping the server");
    Ok(())
}
