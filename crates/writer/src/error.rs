//! Error types for the writer crate.

use analytics::ViewKind;
use thiserror::Error;

/// Failures while persisting a view or the run summary.
///
/// A failed `write_view` leaves the view's previous rows untouched.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The sink refused a view
    #[error("sink rejected {view}: {reason}")]
    Rejected { view: ViewKind, reason: String },

    /// A stored record could not be read back
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SinkError>;
