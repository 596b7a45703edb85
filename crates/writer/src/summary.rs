//! Run-level metadata appended once per execution.

use analytics::ViewKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SinkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every view computed and was written
    Success,
    /// At least one view failed, at least one was written
    Partial,
    /// Nothing was written
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    /// Status for a run with `failed` failing views out of `total`
    pub fn from_failures(failed: usize, total: usize) -> Self {
        if failed == 0 {
            RunStatus::Success
        } else if failed >= total {
            RunStatus::Failed
        } else {
            RunStatus::Partial
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            other => Err(SinkError::InvalidRecord(format!("unknown run status '{}'", other))),
        }
    }
}

/// One row of the append-only run history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub total_rows: usize,
    /// Rows written per view; a view that failed has count 0
    pub view_counts: BTreeMap<ViewKind, usize>,
    pub status: RunStatus,
    /// `<view>: <reason>` for every failing view, joined by `; `
    pub error_message: Option<String>,
    /// Input rows excluded while loading (malformed, duplicate or unresolved)
    #[serde(default)]
    pub rows_dropped: usize,
    /// Empty views and similar notes; kept in memory only
    #[serde(skip)]
    pub warnings: Vec<String>,
}

impl RunSummary {
    /// A failed run that wrote nothing
    pub fn failed(run_date: NaiveDate, message: impl Into<String>) -> Self {
        Self {
            run_date,
            recorded_at: Utc::now(),
            total_rows: 0,
            view_counts: ViewKind::ALL.into_iter().map(|view| (view, 0)).collect(),
            status: RunStatus::Failed,
            error_message: Some(message.into()),
            rows_dropped: 0,
            warnings: Vec::new(),
        }
    }

    pub fn count(&self, view: ViewKind) -> usize {
        self.view_counts.get(&view).copied().unwrap_or(0)
    }
}
