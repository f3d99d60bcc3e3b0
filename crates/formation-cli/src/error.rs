//! CLI error types with exit code handling

use miette::Diagnostic;
use thiserror::Error;

use formation_core::CoreError;
use formation_kube::ControllerError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Settings file or flags are unusable
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(formation::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// One or more resource specs failed to expand
    #[error("Expansion failed with {count} error(s)")]
    #[diagnostic(code(formation::cli::expansion))]
    Expansion {
        count: usize,
        #[help]
        help: Option<String>,
    },

    /// Descriptor could not be turned into a state spec
    #[error("Render failed: {message}")]
    #[diagnostic(code(formation::cli::render))]
    Render { message: String },

    /// Cluster client or controller loop failure
    #[error("Cluster error: {message}")]
    #[diagnostic(code(formation::cli::cluster))]
    Cluster { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(formation::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(formation::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Expansion { .. } => exit_codes::EXPANSION_ERROR,
            CliError::Render { .. } => exit_codes::ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn cluster(message: impl ToString) -> Self {
        Self::Cluster {
            message: message.to_string(),
        }
    }

    pub fn internal(message: impl ToString) -> Self {
        Self::Internal {
            message: message.to_string(),
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

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            other => CliError::config(other.to_string()),
        }
    }
}

impl From<ControllerError> for CliError {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::Expansion(errors) => CliError::Expansion {
                count: errors.len(),
                help: Some(errors.to_string()),
            },
            other => CliError::Render {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
