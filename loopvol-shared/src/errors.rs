//! Error types used across loopvol.

use thiserror::Error;

/// Result type for loopvol operations.
pub type LoopvolResult<T> = Result<T, LoopvolError>;

#[derive(Debug, Error)]
pub enum LoopvolError {
    /// Host environment is unusable (root or device directory unreadable,
    /// required tool missing). Not retried.
    #[error("environment error: {0}")]
    Environment(String),

    /// Backing file or device node already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// No backing file or no bound device for the requested volume.
    #[error("not found: {0}")]
    NotFound(String),

    /// Device node creation or loop setup/teardown failed.
    #[error("device error: {message}. Output = {output}")]
    Device { message: String, output: String },

    /// Filesystem creation failed.
    #[error("format error: {message}. Output = {output}")]
    Format { message: String, output: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// A best-effort step failed and the operation carried on.
    #[error("ignored failure during {step}: {source}")]
    Ignored {
        step: String,
        source: Box<LoopvolError>,
    },
}

impl LoopvolError {
    /// Device error carrying a tool's captured output.
    pub fn device(message: impl Into<String>, output: impl Into<String>) -> Self {
        LoopvolError::Device {
            message: message.into(),
            output: output.into(),
        }
    }

    /// Format error carrying a tool's captured output.
    pub fn format(message: impl Into<String>, output: impl Into<String>) -> Self {
        LoopvolError::Format {
            message: message.into(),
            output: output.into(),
        }
    }

    /// Demote this error to an ignored failure of `step`.
    pub fn ignored(self, step: impl Into<String>) -> Self {
        LoopvolError::Ignored {
            step: step.into(),
            source: Box::new(self),
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, LoopvolError::Ignored { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LoopvolError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, LoopvolError::AlreadyExists(_))
    }
}

// Implement From for common error types to enable `?` operator
impl From<std::io::Error> for LoopvolError {
    fn from(err: std::io::Error) -> Self {
        LoopvolError::Internal(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for LoopvolError {
    fn from(err: serde_json::Error) -> Self {
        LoopvolError::Internal(format!("JSON error: {}", err))
    }
}
