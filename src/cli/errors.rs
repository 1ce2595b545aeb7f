//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::ledger::PeriodError;
use crate::store::StoreError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file missing or invalid
    ConfigError,
    /// Period arguments invalid
    PeriodError,
    /// Rollup store could not be opened or read
    StoreError,
    /// Rollup store failed its integrity checks
    StoreCorrupted,
    /// Run aborted before scheduling
    RunAborted,
    /// More nodes failed than the configured threshold
    ThresholdExceeded,
    /// stdout/runtime failure
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "ROLLUP_CLI_CONFIG_ERROR",
            Self::PeriodError => "ROLLUP_CLI_PERIOD_ERROR",
            Self::StoreError => "ROLLUP_CLI_STORE_ERROR",
            Self::StoreCorrupted => "ROLLUP_CLI_STORE_CORRUPTED",
            Self::RunAborted => "ROLLUP_CLI_RUN_ABORTED",
            Self::ThresholdExceeded => "ROLLUP_CLI_THRESHOLD_EXCEEDED",
            Self::IoError => "ROLLUP_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug, Error)]
#[error("{}: {message}", .code.code())]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn period_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::PeriodError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn threshold_exceeded(failed: usize, threshold: usize) -> Self {
        Self::new(
            CliErrorCode::ThresholdExceeded,
            format!("{} nodes failed, threshold is {}", failed, threshold),
        )
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(format!("[{}] {}", e.code(), e))
    }
}

impl From<PeriodError> for CliError {
    fn from(e: PeriodError) -> Self {
        Self::period_error(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        let code = if e.is_fatal() {
            CliErrorCode::StoreCorrupted
        } else {
            CliErrorCode::StoreError
        };
        Self::new(code, format!("[{}] {}", e.code(), e))
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        Self::new(CliErrorCode::RunAborted, format!("[{}] {}", e.code(), e))
    }
}

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

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::threshold_exceeded(3, 1);
        assert_eq!(err.code(), CliErrorCode::ThresholdExceeded);
        assert_eq!(
            err.to_string(),
            "ROLLUP_CLI_THRESHOLD_EXCEEDED: 3 nodes failed, threshold is 1"
        );
    }

    #[test]
    fn test_from_config_error() {
        let err: CliError = ConfigError::Invalid("batch_size must be > 0".into()).into();
        assert_eq!(err.code_str(), "ROLLUP_CLI_CONFIG_ERROR");
        assert!(err.message().contains("ROLLUP_CONFIG_INVALID"));
    }

    #[test]
    fn test_store_corruption_has_own_code() {
        let corrupt: CliError = StoreError::corruption(7, "checksum mismatch").into();
        assert_eq!(corrupt.code_str(), "ROLLUP_CLI_STORE_CORRUPTED");
        assert!(corrupt.message().contains("offset 7"));

        let io_err = io::Error::new(io::ErrorKind::Other, "disk full");
        let failed: CliError = StoreError::io("read", io_err).into();
        assert_eq!(failed.code_str(), "ROLLUP_CLI_STORE_ERROR");
    }
}
