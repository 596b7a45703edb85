//! Error types for the engine crate.

use data_loader::DataLoadError;
use thiserror::Error;
use writer::{RunSummary, SinkError};

/// Failures that end a run early.
///
/// View-level failures are not errors here: they are recorded in the
/// run summary and the run carries on.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The dataset could not be loaded; a failed summary was appended
    #[error("data integrity error: {source}")]
    DataIntegrity {
        source: DataLoadError,
        summary: Box<RunSummary>,
    },

    /// The loading task panicked or was cancelled
    #[error("data loading aborted: {reason}")]
    LoadAborted {
        reason: String,
        summary: Box<RunSummary>,
    },

    /// Thresholds rejected before any view ran; a failed summary was appended
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
        summary: Box<RunSummary>,
    },

    #[error("failed to read config file {path}: {reason}")]
    ConfigFile { path: String, reason: String },

    /// The sink could not record the run summary
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

impl EngineError {
    /// The failed summary appended for this error, if any
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            EngineError::DataIntegrity { summary, .. }
            | EngineError::LoadAborted { summary, .. }
            | EngineError::InvalidConfig { summary, .. } => Some(summary.as_ref()),
            EngineError::ConfigFile { .. } | EngineError::Sink(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
