//! Aggregates over what a sink currently stores.

use analytics::ViewKind;
use serde::Serialize;

use crate::summary::RunSummary;

/// Column each view is summarised over
pub fn metric_column(view: ViewKind) -> &'static str {
    match view {
        ViewKind::OccupationAge => "mean_age",
        ViewKind::TopMovies | ViewKind::GenreCohorts => "avg_rating",
        ViewKind::SimilarMovies => "similarity_score",
    }
}

/// Row count and spread of one stored view. The aggregates are `None`
/// while the view is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewStats {
    pub view: ViewKind,
    pub metric: &'static str,
    pub row_count: usize,
    pub average: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl ViewStats {
    pub fn from_values(view: ViewKind, values: impl IntoIterator<Item = f64>) -> Self {
        let mut stats = Self {
            view,
            metric: metric_column(view),
            row_count: 0,
            average: None,
            max: None,
            min: None,
        };
        let mut sum = 0.0;
        for value in values {
            stats.row_count += 1;
            sum += value;
            stats.max = Some(stats.max.map_or(value, |max| max.max(value)));
            stats.min = Some(stats.min.map_or(value, |min| min.min(value)));
        }
        if stats.row_count > 0 {
            stats.average = Some(sum / stats.row_count as f64);
        }
        stats
    }
}

/// Per-view aggregates plus the most recent run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSummary {
    pub views: Vec<ViewStats>,
    pub latest_run: Option<RunSummary>,
}
