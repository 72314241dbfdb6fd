//! Error types for model container access.

use thiserror::Error;

/// Result type for container adapter operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while reading a model container.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the container file.
    #[error("failed to open model container '{path}': {reason}")]
    Open { path: String, reason: String },

    /// A required attribute is absent.
    #[error("missing required attribute '{name}' on '{path}'")]
    MissingAttribute { path: String, name: String },

    /// An attribute exists but holds an unexpected type.
    #[error("attribute '{name}' on '{path}' is not {expected}")]
    AttributeType {
        path: String,
        name: String,
        expected: &'static str,
    },

    /// A referenced dataset is absent.
    #[error("missing dataset '{0}'")]
    MissingDataset(String),

    /// A referenced group is absent.
    #[error("missing group '{0}'")]
    MissingGroup(String),

    /// A read from the container failed.
    #[error("failed to read '{path}': {reason}")]
    Read { path: String, reason: String },
}

impl StoreError {
    pub fn missing_attribute(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingAttribute {
            path: path.into(),
            name: name.into(),
        }
    }

    pub fn read(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
