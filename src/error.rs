//! Error types for `breathwork`
//!
//! A small hierarchy: engine errors for the timer state machine, config
//! errors for protocol files, and a top-level error that maps every failure
//! onto a process exit code.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `breathwork` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution (exercise completed)
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Engine error (rejected start, internal fault)
    pub const ENGINE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, unknown protocol)
    pub const USAGE_ERROR: i32 = 64;

    /// Exercise cancelled by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `breathwork` operations.
#[derive(Debug, Error)]
pub enum BreathworkError {
    /// Protocol file loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Timer engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid command-line usage
    #[error("{0}")]
    Usage(String),

    /// The exercise was cancelled before it completed
    #[error("exercise cancelled")]
    Interrupted,
}

impl BreathworkError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Engine(_) => ExitCode::ENGINE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Interrupted => ExitCode::INTERRUPTED,
        }
    }
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Errors raised by the phased timer engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The protocol or cycle count passed to `start` is malformed.
    ///
    /// Raised before any state is touched; a running exercise keeps running.
    #[error("invalid exercise: {}", summarize(.0))]
    Validation(Vec<ValidationIssue>),

    /// The handle belongs to a run whose tick sequence was already taken.
    #[error("invalid handle for run {run_id}")]
    InvalidHandle {
        /// Run the handle was issued for
        run_id: u64,
    },

    /// The tick driver hit an internal fault and cancelled the run.
    #[error("engine fault: {0}")]
    Fault(String),
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Protocol file loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the protocol file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Protocol validation failed
    #[error("validation failed for {path}: {}", summarize(.errors))]
    ValidationError {
        /// Path (or preset name) of the protocol
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced protocol file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in a protocol file is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Location where it was referenced
        location: String,
    },

    /// No built-in protocol has the requested name
    #[error("unknown protocol '{name}'")]
    UnknownProtocol {
        /// The name that was looked up
        name: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found while checking a protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "protocol.phases[2].duration")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl ValidationIssue {
    /// Creates an error-level issue.
    #[must_use]
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Creates a warning-level issue.
    #[must_use]
    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the protocol from being used
    Error,
    /// Worth reporting, does not block the exercise
    Warning,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `breathwork` operations.
pub type Result<T> = std::result::Result<T, BreathworkError>;

// ============================================================================
// Tests
// ============================================================================
