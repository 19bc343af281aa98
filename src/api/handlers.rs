//! HTTP handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use tokio_util::sync::CancellationToken;

use super::types::ErrorResponse;
use crate::execution::{
    CommandRequest, CommandResult, CommandRunner, DeliveryKind, DeliveryMode,
    DEFAULT_POLL_INTERVAL, DEFAULT_RESEND_INTERVAL,
};

/// Shared application state.
///
/// Read-only after construction; every call owns its own process and
/// buffers.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<CommandRunner>,
    pub resend_interval: Duration,
    pub poll_interval: Duration,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_runner(CommandRunner::default())
    }

    pub fn with_runner(runner: CommandRunner) -> Self {
        Self {
            runner: Arc::new(runner),
            resend_interval: DEFAULT_RESEND_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, resend: Duration, poll: Duration) -> Self {
        self.resend_interval = resend;
        self.poll_interval = poll;
        self
    }

    /// Delivery mode for a wire mode name under this state's intervals.
    pub fn delivery_mode(&self, kind: DeliveryKind) -> DeliveryMode {
        DeliveryMode::from_kind(kind, self.resend_interval, self.poll_interval)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "shell-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "shell": state.runner.shell().program,
        "modes": ["single", "stream", "poll"],
        "resend_interval_ms": state.resend_interval.as_millis() as u64,
        "poll_interval_ms": state.poll_interval.as_millis() as u64,
    }))
}

/// Run a command and reply with its result.
///
/// Non-zero exits, spawn failures and cancellation are all successful
/// replies; only a crashed runner task yields an HTTP error.
pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResult>, (StatusCode, Json<ErrorResponse>)> {
    let cancel = CancellationToken::new();
    // Fires when the client disconnects and this future is dropped
    let _guard = cancel.clone().drop_guard();

    let runner = Arc::clone(&state.runner);
    let task = tokio::spawn(async move { runner.run(&req, &cancel).await });

    task.await.map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal_error(e.to_string())),
        )
    })
}
