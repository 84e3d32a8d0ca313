//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid --set value '{input}': {message}")]
    SetString { input: String, message: String },

    #[error("invalid credentials: {message}")]
    Credentials { message: String },

    #[error("invalid pass-through arguments: {message}")]
    Passthrough { message: String },

    #[error("conflicting namespace values provided: '{direct}' and '{passthrough}'")]
    NamespaceConflict { direct: String, passthrough: String },

    #[error("failed to serialize values: {0}")]
    YamlSerialize(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),
}

impl CoreError {
    /// True for errors caused by malformed operator input
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            CoreError::SetString { .. } | CoreError::Credentials { .. } | CoreError::Passthrough { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
