//! In-process sink keeping every view in ordered maps.
//!
//! Used by tests and by dry runs. Failures can be injected per view to
//! exercise partial-run handling.

use analytics::{GenreCohortRow, OccupationAgeRow, SimilarMovieRow, TopMovieRow, ViewKind, ViewRows};
use async_trait::async_trait;
use data_loader::{AgeGroup, Genre, MovieId};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::{Result, SinkError};
use crate::sink::{ResultSink, ViewBatch, WriteMode};
use crate::stats::ViewStats;
use crate::summary::RunSummary;

#[derive(Debug, Default)]
struct Tables {
    occupation_age: BTreeMap<String, OccupationAgeRow>,
    top_movies: BTreeMap<MovieId, TopMovieRow>,
    genre_cohorts: BTreeMap<(String, AgeGroup, Genre), GenreCohortRow>,
    similar_movies: BTreeMap<(MovieId, MovieId), SimilarMovieRow>,
    runs: Vec<RunSummary>,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<Tables>,
    failing: Mutex<HashSet<ViewKind>>,
}

/// Upsert rows into a table keyed by `key`
fn upsert<K: Ord, R: Clone>(
    table: &mut BTreeMap<K, R>,
    rows: &[R],
    mode: WriteMode,
    key: impl Fn(&R) -> K,
) -> usize {
    if mode == WriteMode::Replace {
        table.clear();
    }
    for row in rows {
        table.insert(key(row), row.clone());
    }
    rows.len()
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write of `view` fail
    pub fn fail_view(&self, view: ViewKind) {
        lock(&self.failing).insert(view);
    }

    pub fn heal_view(&self, view: ViewKind) {
        lock(&self.failing).remove(&view);
    }

    pub fn occupation_age(&self) -> Vec<OccupationAgeRow> {
        lock(&self.tables).occupation_age.values().cloned().collect()
    }

    pub fn top_movies(&self) -> Vec<TopMovieRow> {
        lock(&self.tables).top_movies.values().cloned().collect()
    }

    pub fn genre_cohorts(&self) -> Vec<GenreCohortRow> {
        lock(&self.tables).genre_cohorts.values().cloned().collect()
    }

    pub fn similar_movies(&self) -> Vec<SimilarMovieRow> {
        lock(&self.tables).similar_movies.values().cloned().collect()
    }

    pub fn row_count(&self, view: ViewKind) -> usize {
        let tables = lock(&self.tables);
        match view {
            ViewKind::OccupationAge => tables.occupation_age.len(),
            ViewKind::TopMovies => tables.top_movies.len(),
            ViewKind::GenreCohorts => tables.genre_cohorts.len(),
            ViewKind::SimilarMovies => tables.similar_movies.len(),
        }
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_view(&self, batch: ViewBatch<'_>, mode: WriteMode) -> Result<usize> {
        let view = batch.view();
        if lock(&self.failing).contains(&view) {
            return Err(SinkError::Rejected {
                view,
                reason: "injected failure".to_string(),
            });
        }

        let mut tables = lock(&self.tables);
        let written = match batch.rows {
            ViewRows::OccupationAge(rows) => {
                upsert(&mut tables.occupation_age, rows, mode, |r| r.occupation.clone())
            }
            ViewRows::TopMovies(rows) => upsert(&mut tables.top_movies, rows, mode, |r| r.movie_id),
            ViewRows::GenreCohorts(rows) => upsert(&mut tables.genre_cohorts, rows, mode, |r| {
                (r.occupation.clone(), r.age_group, r.genre)
            }),
            ViewRows::SimilarMovies(rows) => upsert(&mut tables.similar_movies, rows, mode, |r| {
                (r.target_movie, r.similar_movie_id)
            }),
        };
        debug!("memory sink: wrote {} rows to {}", written, view);
        Ok(written)
    }

    async fn append_run_summary(&self, summary: &RunSummary) -> Result<()> {
        lock(&self.tables).runs.push(summary.clone());
        Ok(())
    }

    async fn run_history(&self) -> Result<Vec<RunSummary>> {
        Ok(lock(&self.tables).runs.clone())
    }

    async fn view_stats(&self, view: ViewKind) -> Result<ViewStats> {
        let tables = lock(&self.tables);
        let stats = match view {
            ViewKind::OccupationAge => {
                ViewStats::from_values(view, tables.occupation_age.values().map(|r| r.mean_age))
            }
            ViewKind::TopMovies => {
                ViewStats::from_values(view, tables.top_movies.values().map(|r| r.avg_rating))
            }
            ViewKind::GenreCohorts => {
                ViewStats::from_values(view, tables.genre_cohorts.values().map(|r| r.avg_rating))
            }
            ViewKind::SimilarMovies => ViewStats::from_values(
                view,
                tables.similar_movies.values().map(|r| r.similarity_score),
            ),
        };
        Ok(stats)
    }
}

/// A panic while holding the lock cannot leave a table half-written, so a
/// poisoned lock is still safe to use.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
