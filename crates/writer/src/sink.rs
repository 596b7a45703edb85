//! The sink contract every result store implements.

use analytics::{ViewKind, ViewRows};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::{StoredSummary, ViewStats};
use crate::summary::RunSummary;

/// How a view's rows replace what the sink already holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Insert new keys, overwrite existing keys, keep keys absent from the batch
    #[default]
    Upsert,
    /// Clear the view, then insert the batch, in the same transaction
    Replace,
}

/// One view's rows for one run
#[derive(Debug, Clone, Copy)]
pub struct ViewBatch<'a> {
    pub run_date: NaiveDate,
    pub rows: &'a ViewRows,
}

impl ViewBatch<'_> {
    pub fn view(&self) -> ViewKind {
        self.rows.kind()
    }
}

/// Storage for the four views plus the run history.
///
/// `write_view` must be atomic per view: either every row of the batch is
/// visible afterwards or the view is exactly as it was before.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Write one view and return the number of rows written
    async fn write_view(&self, batch: ViewBatch<'_>, mode: WriteMode) -> Result<usize>;

    async fn append_run_summary(&self, summary: &RunSummary) -> Result<()>;

    /// Every appended summary, oldest first
    async fn run_history(&self) -> Result<Vec<RunSummary>>;

    /// Row count and average, max and min of the view's metric column
    async fn view_stats(&self, view: ViewKind) -> Result<ViewStats>;

    /// Aggregates for every view and the latest run
    async fn stored_summary(&self) -> Result<StoredSummary> {
        let mut views = Vec::with_capacity(ViewKind::ALL.len());
        for view in ViewKind::ALL {
            views.push(self.view_stats(view).await?);
        }
        let latest_run = self.run_history().await?.pop();
        Ok(StoredSummary { views, latest_run })
    }
}
