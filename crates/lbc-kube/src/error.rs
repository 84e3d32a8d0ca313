//! Error types for lbc-kube

use thiserror::Error;

/// Result type for lbc-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while driving helm and kubectl
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// A required program could not be started
    #[error("required program '{program}' not found")]
    ToolMissing { program: String },

    /// Installed tool is older than the supported minimum
    #[error("installed version of '{program}' is too old. Found: {found}, required: {required}")]
    VersionTooOld {
        program: String,
        found: String,
        required: String,
    },

    /// A command that must succeed did not
    #[error("command '{command}' failed (exit code {code})\n{output}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    /// The release is in a state that does not allow the operation
    #[error("release '{release}' has status '{status}': {message}")]
    StateConflict {
        release: String,
        status: String,
        message: String,
    },

    /// Nothing to act on
    #[error("no release named '{name}' found")]
    ReleaseNotFound { name: String },

    /// Proceeding could delete persistent data
    #[error("{reason}\nHint: Invoke with '--delete-pvcs' to proceed")]
    DataLossRisk { reason: String },

    /// Some expected workloads are not healthy
    #[error("Lightbend Console status check failed: {}", unhealthy.join(", "))]
    VerificationFailed { unhealthy: Vec<String> },

    /// Cluster preconditions not met (unreachable cluster, leftover Tiller release...)
    #[error("{message}")]
    Preflight { message: String },

    /// Chart could not be located after fetching
    #[error("chart error: {0}")]
    Chart(String),

    /// Diagnostic data could not be collected
    #[error("failed to get diagnostic data: {0}")]
    Diagnostics(String),

    /// A scripted runner received a command it was not told to expect
    #[error("unexpected command '{command}', expected {expected}")]
    UnexpectedCommand { command: String, expected: String },

    /// Command line could not be split
    #[error("invalid command line: {0}")]
    InvalidCommand(String),

    /// Input rejected before any command ran
    #[error(transparent)]
    Core(#[from] lbc_core::CoreError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this error means a program is missing or unusable
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            KubeError::ToolMissing { .. } | KubeError::VersionTooOld { .. }
        )
    }

    /// Check if the operation was refused because of the release or argument state
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            KubeError::StateConflict { .. }
                | KubeError::ReleaseNotFound { .. }
                | KubeError::Core(lbc_core::CoreError::NamespaceConflict { .. })
        )
    }
}
