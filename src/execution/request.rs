//! Command requests and the shell they are handed to.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A command to run on the host, as received from a caller.
///
/// `command` is handed verbatim to the host shell. No tokenizing, quoting or
/// sanitizing happens here: whoever can reach the listener can run anything
/// the service user can.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    /// The command line to execute.
    pub command: String,
    /// Directory the child runs in. Empty means the service's own directory.
    #[serde(default, alias = "cwd")]
    pub working_directory: String,
    /// Optional deadline for a single run, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CommandRequest {
    /// Create a new request for the given command line.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Set the working directory.
    pub fn working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = dir.into();
        self
    }

    /// Set the per-run deadline.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_secs = Some(duration.as_secs().max(1));
        self
    }

    /// Working directory as a path, if one was given.
    pub fn working_dir(&self) -> Option<&Path> {
        if self.working_directory.is_empty() {
            None
        } else {
            Some(Path::new(&self.working_directory))
        }
    }

    /// Per-run deadline, if one was given.
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Host command interpreter used to run requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    /// Interpreter executable.
    pub program: String,
    /// Flag that makes the interpreter run the next argument as a command.
    pub arg: String,
}

impl Shell {
    pub fn new(program: impl Into<String>, arg: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            arg: arg.into(),
        }
    }
}

impl Default for Shell {
    #[cfg(windows)]
    fn default() -> Self {
        Self::new("cmd", "/C")
    }

    #[cfg(not(windows))]
    fn default() -> Self {
        Self::new("sh", "-c")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_new() {
        let req = CommandRequest::new("ls -la");
        assert_eq!(req.command, "ls -la");
        assert!(req.working_dir().is_none());
        assert!(req.deadline().is_none());
    }

    #[test]
    fn test_request_builder_chain() {
        let req = CommandRequest::new("cargo build")
            .working_directory("/project")
            .timeout(Duration::from_secs(60));

        assert_eq!(req.working_dir(), Some(Path::new("/project")));
        assert_eq!(req.deadline(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_sub_second_timeout_rounds_up() {
        let req = CommandRequest::new("true").timeout(Duration::from_millis(10));
        assert_eq!(req.timeout_secs, Some(1));
    }

    #[test]
    fn test_request_wire_names() {
        let json = r#"{"command": "echo hello", "workingDirectory": "."}"#;
        let req: CommandRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.command, "echo hello");
        assert_eq!(req.working_directory, ".");

        let out = serde_json::to_string(&req).unwrap();
        assert!(out.contains("workingDirectory"));
        assert!(!out.contains("timeoutSecs"));
    }

    #[test]
    fn test_request_cwd_alias() {
        let json = r#"{"command": "pwd", "cwd": "/tmp"}"#;
        let req: CommandRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.working_directory, "/tmp");
    }

    #[test]
    fn test_request_missing_directory() {
        let req: CommandRequest = serde_json::from_str(r#"{"command": "pwd"}"#).unwrap();
        assert!(req.working_dir().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_default_shell_unix() {
        assert_eq!(Shell::default(), Shell::new("sh", "-c"));
    }
}
