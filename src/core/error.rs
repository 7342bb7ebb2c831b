//! Error taxonomy for the command bus.
//!
//! Command failures travel as `Err(BusError)` through `execute`/`dispatch`;
//! the bus never panics on a business failure.

/// Result alias used by commands and the front controller.
pub type BusResult<T> = Result<T, BusError>;

/// Bus errors
#[derive(Debug, Clone, PartialEq)]
pub enum BusError {
    /// Dispatch named a command nobody registered (wiring bug)
    UnknownCommand(String),
    /// A second command tried to claim an already registered name
    DuplicateRegistration(String),
    /// Container read without the key being present
    MissingParameter(String),
    /// Key present but holding another variant
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    /// Value present and well-typed but outside the accepted domain
    InvalidParameter { key: String, reason: String },
    /// Command-specific business failure
    CommandFailed { command: String, reason: String },
    /// External resource vanished or cannot be opened
    ResourceUnavailable(String),
    /// Long-running work was superseded or cancelled
    Cancelled,
}

impl BusError {
    pub fn failed(command: &str, reason: impl Into<String>) -> Self {
        BusError::CommandFailed {
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        BusError::InvalidParameter {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::UnknownCommand(name) => write!(f, "Unknown command '{}'", name),
            BusError::DuplicateRegistration(name) => {
                write!(f, "Command '{}' is already registered", name)
            }
            BusError::MissingParameter(key) => write!(f, "Missing parameter '{}'", key),
            BusError::TypeMismatch { key, expected, found } => write!(
                f,
                "Parameter '{}' has type {} (expected {})",
                key, found, expected
            ),
            BusError::InvalidParameter { key, reason } => {
                write!(f, "Invalid parameter '{}': {}", key, reason)
            }
            BusError::CommandFailed { command, reason } => {
                write!(f, "Command '{}' failed: {}", command, reason)
            }
            BusError::ResourceUnavailable(what) => write!(f, "Resource unavailable: {}", what),
            BusError::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::error::Error for BusError {}
