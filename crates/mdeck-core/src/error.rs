//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // External Tool Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Executable not found: {name}")]
    ToolNotFound { name: String },

    #[error("Command failed: {}", describe_exit(.code, .description))]
    NonZeroExit { code: i32, description: String },

    #[error("Process error: {message}")]
    Process { message: String },

    #[error("Tool output could not be parsed: {message}")]
    Protocol { message: String },

    // ─────────────────────────────────────────────────────────────
    // Device / App Errors
    // ─────────────────────────────────────────────────────────────
    #[error("No running Android emulator")]
    NoBootedDevice,

    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("App process is not running: {package}")]
    ProcessNotRunning { package: String },

    #[error("Unsupported file format (expected .app or .apk): {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid app bundle {path}: {reason}")]
    InvalidBundle { path: PathBuf, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Log Streaming Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Log stream failed: {message}")]
    StreamFailure { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

/// Render an exit code with the tool's own explanation, if it gave one.
fn describe_exit(code: &i32, description: &str) -> String {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        format!("exit code {}", code)
    } else {
        format!("exit code {}, {}", code, trimmed)
    }
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Build a `NonZeroExit` from captured output: stderr wins unless it is blank.
    pub fn non_zero_exit(code: i32, stderr: &str, stdout: &str) -> Self {
        let description = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        Self::NonZeroExit {
            code,
            description: description.to_string(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn process_not_running(package: impl Into<String>) -> Self {
        Self::ProcessNotRunning {
            package: package.into(),
        }
    }

    pub fn unsupported_format(path: impl Into<PathBuf>) -> Self {
        Self::UnsupportedFormat { path: path.into() }
    }

    pub fn invalid_bundle(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidBundle {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn stream_failure(message: impl Into<String>) -> Self {
        Self::StreamFailure {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error (reported as a warning, flow continues)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat { .. } | Error::InvalidBundle { .. } | Error::Protocol { .. }
        )
    }

    /// Check if this error means the toolchain itself is unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ToolNotFound { .. })
    }
}
