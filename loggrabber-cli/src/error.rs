//! CLI-specific error types and exit code mapping

use loggrabber_core::error::LoggrabberError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The status service could not be queried.
    #[error("status service unavailable: {0}")]
    StatusUnavailable(String),

    /// A filter rule did not compile.
    #[error("filter error: {0}")]
    Filter(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from loggrabber-core.
    #[error("{0}")]
    Core(#[from] LoggrabberError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                        |
    /// |------|--------------------------------|
    /// | 0    | Success                        |
    /// | 1    | General / command error        |
    /// | 2    | Configuration error            |
    /// | 3    | Status service unavailable     |
    /// | 4    | Filter rule rejected           |
    /// | 10   | IO error                       |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(LoggrabberError::Config(_)) => 2,
            Self::StatusUnavailable(_) | Self::Core(LoggrabberError::Status(_)) => 3,
            Self::Filter(_) | Self::Core(LoggrabberError::Filter(_)) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<loggrabber_core::error::FilterError> for CliError {
    fn from(e: loggrabber_core::error::FilterError) -> Self {
        Self::Filter(e.to_string())
    }
}

impl From<loggrabber_core::error::StatusError> for CliError {
    fn from(e: loggrabber_core::error::StatusError) -> Self {
        Self::StatusUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loggrabber_core::error::{ConfigError, FilterError, StatusError};

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_core_config_error() {
        let err: CliError = LoggrabberError::Config(ConfigError::FileNotFound {
            path: "loggrabber.toml".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_status_unavailable() {
        let err: CliError = StatusError::CallFailed {
            endpoint: "/log_status/0@fw1".to_owned(),
            reason: "connection refused".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_exit_code_filter_error() {
        let err: CliError = FilterError::UnknownField {
            name: "colour".to_owned(),
            kind: "traffic".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("test error".to_owned());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "test error");
    }

    #[test]
    fn test_error_display_config() {
        let err = CliError::Config("invalid TOML syntax".to_owned());
        let display_str = format!("{}", err);
        assert!(display_str.contains("configuration error"));
        assert!(display_str.contains("invalid TOML syntax"));
    }
}
