//! Execution result types.

use serde::{Deserialize, Serialize};

/// Exit status reported when a run was cancelled, killed or never started.
pub const FAILURE_EXIT_STATUS: i32 = 1;

/// Stdout text of the result returned for a cancelled run.
pub const CANCELLED_STDOUT: &str = "Request was cancelled";

/// Outcome of one command run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Captured standard output, decoded lossily.
    pub stdout: String,
    /// Captured standard error, decoded lossily.
    pub stderr: String,
    /// Exit code of the child, or [`FAILURE_EXIT_STATUS`].
    pub exit_status: i32,
}

impl CommandResult {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_status: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status,
        }
    }

    /// Sentinel for a run aborted by its caller. Output produced before the
    /// kill is dropped.
    pub fn cancelled() -> Self {
        Self::new(CANCELLED_STDOUT, "", FAILURE_EXIT_STATUS)
    }

    /// Result for a child that could not be started.
    pub fn spawn_failed(reason: &impl std::fmt::Display) -> Self {
        Self::new("", reason.to_string(), FAILURE_EXIT_STATUS)
    }
}

/// One message of a delivery stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub result: CommandResult,
    /// Set on the last frame a stream will ever carry.
    pub is_final: bool,
}

impl StreamFrame {
    /// Intermediate frame; more will follow.
    pub fn progress(result: CommandResult) -> Self {
        Self {
            result,
            is_final: false,
        }
    }

    /// Closing frame of a stream.
    pub fn finished(result: CommandResult) -> Self {
        Self {
            result,
            is_final: true,
        }
    }
}
