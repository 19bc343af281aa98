//! Error types for shell-relay.

use thiserror::Error;

/// Main error type for shell-relay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The child process could not be started.
    #[error("failed to start command: {0}")]
    Spawn(String),

    /// The receiving side of a delivery stream went away.
    #[error("result stream closed by caller")]
    ChannelClosed,

    /// A background task panicked or was aborted.
    #[error("task error: {0}")]
    Task(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Command-line arguments could not be parsed.
    #[error(transparent)]
    Args(#[from] crate::cli::ArgsError),
}

/// Convenience Result type for shell-relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RelayError = io_err.into();
        assert!(matches!(err, RelayError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_spawn_display() {
        let err = RelayError::Spawn("No such file or directory".into());
        assert!(err.to_string().starts_with("failed to start command"));
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn test_channel_closed_display() {
        let err = RelayError::ChannelClosed;
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: RelayError = crate::config::ConfigError::InvalidHost("nope".into()).into();
        assert_eq!(err.to_string(), "invalid host address: nope");
    }
}
