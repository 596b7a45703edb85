//! Persists computed views and records the outcome of the run.

use analytics::{Cancellation, ComputationError, ViewKind, ViewRows};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Result, SinkError};
use crate::sink::{ResultSink, ViewBatch, WriteMode};
use crate::summary::{RunStatus, RunSummary};

/// What computing one view produced
#[derive(Debug, Clone)]
pub struct ViewOutcome {
    pub view: ViewKind,
    pub result: std::result::Result<ViewRows, ComputationError>,
}

impl ViewOutcome {
    pub fn computed(rows: ViewRows) -> Self {
        Self {
            view: rows.kind(),
            result: Ok(rows),
        }
    }

    pub fn failed(view: ViewKind, error: ComputationError) -> Self {
        Self {
            view,
            result: Err(error),
        }
    }
}

/// Writes view outcomes to a sink and appends one `RunSummary` per run.
///
/// A failing view never stops the others: its error is recorded in the
/// summary and the remaining views are still written.
#[derive(Clone)]
pub struct ResultWriter {
    sink: Arc<dyn ResultSink>,
    mode: WriteMode,
}

impl ResultWriter {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        Self {
            sink,
            mode: WriteMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn sink(&self) -> &Arc<dyn ResultSink> {
        &self.sink
    }

    /// Write every successfully computed view, then append the summary.
    ///
    /// `rows_dropped` is the number of input rows the load excluded. Only a
    /// failure to append the summary itself is returned as an error.
    pub async fn persist(
        &self,
        outcomes: Vec<ViewOutcome>,
        run_date: NaiveDate,
        rows_dropped: usize,
        cancel: &Cancellation,
    ) -> Result<RunSummary> {
        let total = outcomes.len();
        let mut view_counts: BTreeMap<ViewKind, usize> =
            ViewKind::ALL.into_iter().map(|view| (view, 0)).collect();
        let mut failures = Vec::new();
        let mut warnings = Vec::new();

        for outcome in outcomes {
            let view = outcome.view;
            let rows = match outcome.result {
                Ok(rows) => rows,
                Err(err) => {
                    warn!("View {} failed to compute: {}", view, err);
                    failures.push(format!("{}: {}", view, err));
                    continue;
                }
            };

            if cancel.is_cancelled() {
                failures.push(format!("{}: {}", view, SinkError::Cancelled));
                continue;
            }
            if rows.is_empty() {
                warn!("View {} is empty: no rows met the thresholds", view);
                warnings.push(format!("{}: no rows met the thresholds", view));
            }

            match self.sink.write_view(ViewBatch { run_date, rows: &rows }, self.mode).await {
                Ok(written) => {
                    view_counts.insert(view, written);
                }
                Err(err) => {
                    warn!("Writing view {} to {} failed: {}", view, self.sink.name(), err);
                    failures.push(format!("{}: {}", view, err));
                }
            }
        }

        let status = RunStatus::from_failures(failures.len(), total);
        let summary = RunSummary {
            run_date,
            recorded_at: Utc::now(),
            total_rows: view_counts.values().sum(),
            view_counts,
            status,
            error_message: (!failures.is_empty()).then(|| failures.join("; ")),
            rows_dropped,
            warnings,
        };
        self.sink.append_run_summary(&summary).await?;

        info!(
            "Run {} finished with status {} ({} rows written)",
            run_date, summary.status, summary.total_rows
        );
        Ok(summary)
    }

    /// Append a failed summary for a run that wrote no views
    pub async fn record_failure(
        &self,
        run_date: NaiveDate,
        rows_dropped: usize,
        message: impl Into<String>,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::failed(run_date, message);
        summary.rows_dropped = rows_dropped;
        self.sink.append_run_summary(&summary).await?;
        warn!(
            "Run {} failed: {}",
            run_date,
            summary.error_message.as_deref().unwrap_or_default()
        );
        Ok(summary)
    }
}
