//! Error types for the ahp-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates
/// into one interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration validation failed: {0}")]
    Validation(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Emission error: {0}")]
    Emit(String),

    #[error("Architecture not found: {0}")]
    ArchitectureNotFound(String),

    #[error("Failed to write output file: {path}")]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ahp-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<ahp_project::ProjectError> for AppError {
    fn from(err: ahp_project::ProjectError) -> Self {
        match err {
            ahp_project::ProjectError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Config(other.to_string()),
        }
    }
}

impl From<ahp_project::ValidationError> for AppError {
    fn from(err: ahp_project::ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<ahp_core::AhpError> for AppError {
    fn from(err: ahp_core::AhpError) -> Self {
        AppError::Graph(err.to_string())
    }
}

impl From<ahp_emit::EmitError> for AppError {
    fn from(err: ahp_emit::EmitError) -> Self {
        match err {
            ahp_emit::EmitError::Graph(e) => AppError::Graph(e.to_string()),
            other => AppError::Emit(other.to_string()),
        }
    }
}
