//! Errors raised while computing a view.
//!
//! A `ComputationError` is contained at the boundary of the view that raised
//! it: the other views keep running and the failure ends up in the run
//! summary.

use thiserror::Error;

use crate::views::ViewKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    /// The run was cancelled or its deadline passed
    #[error("cancelled")]
    Cancelled,

    /// A statistic came out as NaN or infinite
    #[error("non-finite {detail} in {view}")]
    NonFinite { view: ViewKind, detail: String },

    /// Thresholds that cannot produce a meaningful view
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Anything else, including a panicked worker
    #[error("internal error in {view}: {reason}")]
    Internal { view: ViewKind, reason: String },
}

/// Reject NaN and infinities before they reach the sink
pub(crate) fn ensure_finite(view: ViewKind, detail: &str, value: f64) -> Result<f64, ComputationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputationError::NonFinite {
            view,
            detail: detail.to_string(),
        })
    }
}
