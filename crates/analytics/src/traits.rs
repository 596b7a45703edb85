//! The seam between the engine and the individual analytic views.

use crate::cancel::Cancellation;
use crate::error::ComputationError;
use crate::views::{ViewKind, ViewRows};
use data_loader::DataIndex;

/// One analytic view computed over a loaded dataset.
///
/// Implementations only read the index, so the engine can run all of them
/// concurrently against the same `Arc<DataIndex>`. Long computations should
/// poll `cancel` and return `ComputationError::Cancelled` when it fires.
pub trait Aggregator: Send + Sync {
    fn view(&self) -> ViewKind;

    fn compute(&self, index: &DataIndex, cancel: &Cancellation) -> Result<ViewRows, ComputationError>;
}
