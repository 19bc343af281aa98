//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::execution::{CommandRequest, DeliveryKind, StreamFrame};

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "PARSE_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

/// WebSocket message types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WsMessage {
    /// Client asks for a command to be run.
    Execute {
        command: String,
        #[serde(default, alias = "cwd")]
        working_directory: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
        /// Ignored on endpoints with a fixed delivery mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<DeliveryKind>,
    },
    /// Server sends a (possibly intermediate) result.
    Result {
        stdout: String,
        stderr: String,
        exit_status: i32,
        #[serde(default)]
        is_final: bool,
    },
    /// Error message.
    Error { code: String, message: String },
    /// Ping/pong for connection health.
    Ping,
    Pong,
}

impl WsMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Split an `Execute` message into its request and requested mode.
    pub fn into_request(self) -> Option<(CommandRequest, Option<DeliveryKind>)> {
        match self {
            Self::Execute {
                command,
                working_directory,
                timeout_secs,
                mode,
            } => Some((
                CommandRequest {
                    command,
                    working_directory,
                    timeout_secs,
                },
                mode,
            )),
            _ => None,
        }
    }
}

impl From<StreamFrame> for WsMessage {
    fn from(frame: StreamFrame) -> Self {
        Self::Result {
            stdout: frame.result.stdout,
            stderr: frame.result.stderr,
            exit_status: frame.result.exit_status,
            is_final: frame.is_final,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::CommandResult;

    #[test]
    fn test_error_response_serialization() {
        let err = ErrorResponse::new("TEST_ERROR", "Test message");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("TEST_ERROR"));
        assert!(json.contains("Test message"));
    }

    #[test]
    fn test_internal_error_code() {
        let value = serde_json::to_value(ErrorResponse::internal_error("boom")).unwrap();
        assert_eq!(value, serde_json::json!({"code": "INTERNAL_ERROR", "message": "boom"}));
    }

    #[test]
    fn test_ws_execute_parse() {
        let json = r#"{"type": "execute", "command": "echo hello", "workingDirectory": "/tmp", "mode": "poll"}"#;
        let msg: WsMessage = serde_json::from_str(json).unwrap();
        let (request, mode) = msg.into_request().unwrap();
        assert_eq!(request.command, "echo hello");
        assert_eq!(request.working_directory, "/tmp");
        assert_eq!(mode, Some(DeliveryKind::Poll));
    }

    #[test]
    fn test_ws_execute_minimal() {
        let msg: WsMessage = serde_json::from_str(r#"{"type": "execute", "command": "ls"}"#).unwrap();
        let (request, mode) = msg.into_request().unwrap();
        assert!(request.working_directory.is_empty());
        assert!(request.timeout_secs.is_none());
        assert!(mode.is_none());
    }

    #[test]
    fn test_ws_ping_is_not_a_request() {
        let msg: WsMessage = serde_json::from_str(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(msg, WsMessage::Ping);
        assert!(msg.into_request().is_none());
    }

    #[test]
    fn test_ws_result_from_frame() {
        let frame = StreamFrame::finished(CommandResult::new("hi\n", "", 7));
        let json = serde_json::to_value(WsMessage::from(frame)).unwrap();
        assert_eq!(json["type"], "result");
        assert_eq!(json["stdout"], "hi\n");
        assert_eq!(json["exitStatus"], 7);
        assert_eq!(json["isFinal"], true);
    }
}
