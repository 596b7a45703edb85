//! # Analytics Engine
//!
//! Coordinates one run of the analytics pipeline:
//! 1. Load and validate the dataset (off the async runtime)
//! 2. Compute the four views concurrently, one blocking task per view
//! 3. Persist the computed views and append the run summary
//!
//! Failures are contained per view. Only a failed load, rejected
//! configuration or an unreachable sink ends the run with an error.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use analytics::{
    Cancellation, ComputationError, SimilarMovieRow, SimilarityEngine, ViewKind, ViewRows,
    aggregator_for, aggregators,
};
use chrono::{NaiveDate, Utc};
use data_loader::{DataIndex, LoadReport, MovieId};
use tracing::{debug, error, info, warn};
use writer::{ResultSink, ResultWriter, RunSummary, StoredSummary, ViewOutcome};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Outcome of a run handed back to the caller
#[derive(Debug, Clone)]
pub struct EngineReport {
    pub summary: RunSummary,
    /// Row accounting from the load, when the engine loaded the data itself
    pub load: Option<LoadReport>,
}

pub struct AnalyticsEngine {
    config: EngineConfig,
    writer: ResultWriter,
    cancel: Cancellation,
}

impl AnalyticsEngine {
    pub fn new(config: EngineConfig, sink: Arc<dyn ResultSink>) -> Self {
        let writer = ResultWriter::new(sink).with_mode(config.write_mode);
        Self {
            config,
            writer,
            cancel: Cancellation::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle that cancels any run in progress (and every later run)
    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Load the dataset from `data_dir`, then run
    pub async fn run_from_dir(&self, data_dir: &Path) -> Result<EngineReport> {
        let run_date = today();
        let dir = data_dir.to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || DataIndex::load_from_files(&dir)).await;

        let (index, load) = match loaded {
            Ok(Ok(loaded)) => loaded,
            Ok(Err(err)) => {
                error!("Loading {:?} failed: {}", data_dir, err);
                let summary = self.writer.record_failure(run_date, 0, format!("load: {}", err)).await?;
                return Err(EngineError::DataIntegrity {
                    source: err,
                    summary: Box::new(summary),
                });
            }
            Err(join_err) => {
                error!("Loading task failed: {}", join_err);
                let summary = self
                    .writer
                    .record_failure(run_date, 0, format!("load: {}", join_err))
                    .await?;
                return Err(EngineError::LoadAborted {
                    reason: join_err.to_string(),
                    summary: Box::new(summary),
                });
            }
        };

        let mut report = self.execute(Arc::new(index), load.dropped()).await?;
        report.load = Some(load);
        Ok(report)
    }

    /// Compute and persist every view over an already loaded index
    pub async fn run(&self, index: Arc<DataIndex>) -> Result<EngineReport> {
        self.execute(index, 0).await
    }

    async fn execute(&self, index: Arc<DataIndex>, rows_dropped: usize) -> Result<EngineReport> {
        let start = Instant::now();
        let run_date = today();

        if let Err(err) = self.config.analytics.validate() {
            let summary = self
                .writer
                .record_failure(run_date, rows_dropped, format!("config: {}", err))
                .await?;
            return Err(EngineError::InvalidConfig {
                reason: err.to_string(),
                summary: Box::new(summary),
            });
        }

        let cancel = match self.config.deadline_secs {
            Some(secs) => self.cancel.deadline_after(Duration::from_secs(secs)),
            None => self.cancel.clone(),
        };

        let outcomes = self.compute_views(index, &cancel).await;

        // Nothing is written once the run is cancelled before the write phase
        if cancel.is_cancelled() {
            warn!("Run cancelled before writing results");
            let summary = self
                .writer
                .record_failure(run_date, rows_dropped, ComputationError::Cancelled.to_string())
                .await?;
            return Ok(EngineReport { summary, load: None });
        }

        let summary = self.writer.persist(outcomes, run_date, rows_dropped, &cancel).await?;
        info!("Run completed in {:.2?} with status {}", start.elapsed(), summary.status);
        Ok(EngineReport { summary, load: None })
    }

    /// Run every aggregator on its own blocking task and collect the
    /// outcomes in view order. A panicking aggregator becomes a failed view.
    async fn compute_views(&self, index: Arc<DataIndex>, cancel: &Cancellation) -> Vec<ViewOutcome> {
        let tasks: Vec<_> = aggregators(&self.config.analytics)
            .into_iter()
            .map(|aggregator| {
                let view = aggregator.view();
                let index = Arc::clone(&index);
                let cancel = cancel.clone();
                let task = tokio::task::spawn_blocking(move || {
                    let start = Instant::now();
                    let result = aggregator.compute(&index, &cancel);
                    debug!("View {} computed in {:.2?}", aggregator.view(), start.elapsed());
                    result
                });
                (view, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (view, task) in tasks {
            let outcome = match task.await {
                Ok(Ok(rows)) => {
                    info!("View {}: {} rows", view, rows.len());
                    ViewOutcome::computed(rows)
                }
                Ok(Err(err)) => {
                    warn!("View {} failed: {}", view, err);
                    ViewOutcome::failed(view, err)
                }
                Err(join_err) => {
                    error!("View {} task failed: {}", view, join_err);
                    ViewOutcome::failed(
                        view,
                        ComputationError::Internal {
                            view,
                            reason: join_err.to_string(),
                        },
                    )
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Compute one view without writing it
    pub async fn compute_view(
        &self,
        view: ViewKind,
        index: Arc<DataIndex>,
    ) -> std::result::Result<ViewRows, ComputationError> {
        let aggregator = aggregator_for(view, &self.config.analytics);
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || aggregator.compute(&index, &cancel))
            .await
            .unwrap_or_else(|join_err| {
                Err(ComputationError::Internal {
                    view,
                    reason: join_err.to_string(),
                })
            })
    }

    /// Neighbours of one movie with the configured thresholds, without writing
    pub async fn similar_to(
        &self,
        movie_id: MovieId,
        index: Arc<DataIndex>,
    ) -> std::result::Result<Vec<SimilarMovieRow>, ComputationError> {
        let engine = SimilarityEngine::new(self.config.analytics.similarity.clone());
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || engine.neighbours_of(&index, movie_id, &cancel))
            .await
            .unwrap_or_else(|join_err| {
                Err(ComputationError::Internal {
                    view: ViewKind::SimilarMovies,
                    reason: join_err.to_string(),
                })
            })
    }

    /// Every run summary the sink holds, oldest first
    pub async fn history(&self) -> Result<Vec<RunSummary>> {
        Ok(self.writer.sink().run_history().await?)
    }

    /// Aggregates over the stored views and the latest run
    pub async fn stored_summary(&self) -> Result<StoredSummary> {
        Ok(self.writer.sink().stored_summary().await?)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
