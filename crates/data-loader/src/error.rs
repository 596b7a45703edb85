//! Error types for the data-loader crate.
//!
//! Per-row problems (`ParseError`, `InvalidValue`, `MissingReference`,
//! `DuplicateRating`) are collected into the `LoadReport` and never abort a
//! load. Only a missing file, an I/O failure, or a relation left with zero
//! valid rows is fatal.

use thiserror::Error;

/// Errors that can occur during data loading and parsing
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist (e.g., rating for non-existent movie)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: u32 },

    /// The same (user, movie) pair was rated twice
    #[error("Duplicate rating for user {user_id} and movie {movie_id}")]
    DuplicateRating { user_id: u32, movie_id: u32 },

    /// A required relation has no valid rows left after validation
    #[error("Relation '{relation}' has no valid rows ({rejected} rejected)")]
    EmptyRelation {
        relation: &'static str,
        rejected: usize,
    },
}

impl DataLoadError {
    /// True for errors that abort a load rather than exclude a single row
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DataLoadError::FileNotFound { .. }
                | DataLoadError::IoError(_)
                | DataLoadError::EmptyRelation { .. }
        )
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
