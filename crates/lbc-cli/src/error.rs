//! CLI error types with exit code handling
//!
//! Every failure the installer can report maps to one variant, and every
//! variant to one process exit code.

use lbc_core::CoreError;
use lbc_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Operator input could not be parsed
    #[error("{message}")]
    #[diagnostic(code(lbc::cli::parse))]
    Parse {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Release or argument state does not allow the operation
    #[error("{message}")]
    #[diagnostic(code(lbc::cli::state_conflict))]
    StateConflict {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Proceeding would delete persistent data
    #[error("{message}")]
    #[diagnostic(
        code(lbc::cli::data_loss),
        help("Invoke with '--delete-pvcs' to proceed")
    )]
    DataLoss { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(lbc::cli::io))]
    Io { message: String },

    /// A command that had to succeed failed
    #[error("{message}")]
    #[diagnostic(code(lbc::cli::command_failed))]
    CommandFailed { message: String },

    /// Deployments are not healthy
    #[error("{message}")]
    #[diagnostic(code(lbc::cli::verify))]
    VerifyFailed { message: String },

    /// Tool missing or too old, or the cluster cannot be used
    #[error("{message}")]
    #[diagnostic(code(lbc::cli::unavailable))]
    Unavailable {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(lbc::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Parse { .. } => exit_codes::PARSE_ERROR,
            CliError::StateConflict { .. } => exit_codes::STATE_CONFLICT,
            CliError::DataLoss { .. } => exit_codes::DATA_LOSS_RISK,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::CommandFailed { .. } => exit_codes::COMMAND_FAILED,
            CliError::VerifyFailed { .. } => exit_codes::VERIFY_FAILED,
            CliError::Unavailable { .. } => exit_codes::UNAVAILABLE,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::SetString { .. } => CliError::Parse {
                message,
                help: Some("Values look like key=value[,key=value]; quote a value to keep commas in it".into()),
            },
            CoreError::Credentials { .. } => CliError::Parse {
                message,
                help: Some(format!(
                    "Set {} and {}, or point --creds at a file with user and password entries",
                    lbc_core::USERNAME_ENV,
                    lbc_core::PASSWORD_ENV
                )),
            },
            CoreError::Passthrough { .. } => CliError::Parse {
                message,
                help: None,
            },
            CoreError::NamespaceConflict { .. } => CliError::StateConflict {
                message,
                help: Some("Invoke again with a single namespace value".into()),
            },
            CoreError::Io(_) => CliError::Io { message },
            CoreError::YamlSerialize(_) | CoreError::InvalidVersion(_) => CliError::Other { message },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err {
            KubeError::ToolMissing { program } => CliError::Unavailable {
                message,
                help: Some(format!("Install '{}' and make sure it is on your PATH", program)),
            },
            KubeError::VersionTooOld { program, required, .. } => CliError::Unavailable {
                message,
                help: Some(format!("Upgrade '{}' to {} or newer", program, required)),
            },
            KubeError::Preflight { .. } => CliError::Unavailable {
                message,
                help: Some("Pass --skip-checks to bypass environment checks".into()),
            },
            KubeError::StateConflict { .. } | KubeError::ReleaseNotFound { .. } => {
                CliError::StateConflict {
                    message,
                    help: None,
                }
            }
            KubeError::DataLossRisk { reason } => CliError::DataLoss { message: reason },
            KubeError::CommandFailed { .. } => CliError::CommandFailed { message },
            KubeError::VerificationFailed { .. } => CliError::VerifyFailed { message },
            KubeError::Core(core) => CliError::from(core),
            KubeError::Io(_) => CliError::Io { message },
            _ => CliError::Other { message },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
