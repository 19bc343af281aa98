//! API layer for shell-relay.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/v1/` - API information
//! - `POST /api/v1/execute` - Run a command, reply with its result
//! - `WS /api/v1/execute/stream` - One run, buffered output resent until exit
//! - `WS /api/v1/execute/poll` - Command re-run on an interval until disconnect
//! - `WS /api/v1/ws` - Any of the above, chosen by the `mode` field
//!
//! ## Example
//!
//! ```no_run
//! use shell_relay::api::{serve, AppState, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> shell_relay::Result<()> {
//!     serve(ServerConfig::default(), AppState::new()).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;
pub mod websocket;

pub use handlers::AppState;
pub use router::{
    create_router, create_router_with_state, serve, serve_listener, shutdown_signal,
    ServerConfig, DEFAULT_PORT,
};
pub use types::{ErrorResponse, WsMessage};
