//! CLI-specific error types
//!
//! All CLI errors are fatal: the binary prints `CODE: message` and exits 1.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::connection::ConnectionError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration or key file error
    ConfigError,
    /// I/O error (stdin/stdout/files)
    IoError,
    /// The link failed before the transfer completed
    LinkFailed,
    /// The link did not finish in time
    Timeout,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "REPLINK_CLI_CONFIG_ERROR",
            Self::IoError => "REPLINK_CLI_IO_ERROR",
            Self::LinkFailed => "REPLINK_CLI_LINK_FAILED",
            Self::Timeout => "REPLINK_CLI_TIMEOUT",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Link failure
    pub fn link_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::LinkFailed, msg)
    }

    /// Timed out
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Timeout, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<ConnectionError> for CliError {
    fn from(e: ConnectionError) -> Self {
        Self::link_failed(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
