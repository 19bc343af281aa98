//! Command execution engine.
//!
//! This module provides:
//! - A [`CommandRunner`] that runs one command through the host shell,
//!   capturing stdout and stderr and racing completion against cancellation
//! - Delivery policies that turn runs into one reply or a stream of replies
//!
//! # Example
//!
//! ```no_run
//! use shell_relay::execution::{CommandRequest, CommandRunner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let runner = CommandRunner::default();
//! let request = CommandRequest::new("echo hello").working_directory(".");
//! let result = runner.run(&request, &CancellationToken::new()).await;
//! println!("{} (exit {})", result.stdout, result.exit_status);
//! # }
//! ```

pub mod delivery;
mod request;
mod result;
mod runner;

pub use delivery::{
    deliver, DeliveryKind, DeliveryMode, DEFAULT_POLL_INTERVAL, DEFAULT_RESEND_INTERVAL,
};
pub use request::{CommandRequest, Shell};
pub use result::{CommandResult, StreamFrame, CANCELLED_STDOUT, FAILURE_EXIT_STATUS};
pub use runner::{CommandRunner, OutputBuffer, OutputHandle, RunningCommand};
