//! # shell-relay
//!
//! Minimal remote command-execution service.
//!
//! A caller sends a command line and a working directory; the service runs
//! the command through the host shell and answers with the captured
//! standard output, standard error and exit status. Results can be
//! delivered as a single reply, resent on a timer while one run is in
//! progress, or re-run on a timer until the caller goes away.
//!
//! **Security:** commands are handed to the host shell verbatim and the
//! service has no authentication. Expose it only where every client is
//! trusted to run arbitrary commands as the service user.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_relay::{CommandRequest, CommandRunner};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     shell_relay::logging::try_init(None).ok();
//!
//!     let runner = CommandRunner::default();
//!     let request = CommandRequest::new("echo hello").working_directory(".");
//!     let result = runner.run(&request, &CancellationToken::new()).await;
//!
//!     assert_eq!(result.stdout, "hello\n");
//!     assert_eq!(result.exit_status, 0);
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;

pub use error::{RelayError, Result};
pub use execution::{
    CommandRequest, CommandResult, CommandRunner, DeliveryKind, DeliveryMode, Shell, StreamFrame,
};
