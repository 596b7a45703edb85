//! Rating Aggregator: the global top-rated movies list.

use crate::cancel::Cancellation;
use crate::config::TopMoviesConfig;
use crate::error::{ComputationError, ensure_finite};
use crate::ranking::{descending, rank_partitions};
use crate::stats::Moments;
use crate::traits::Aggregator;
use crate::views::{TopMovieRow, ViewKind, ViewRows};
use data_loader::{DataIndex, MovieId};
use rayon::prelude::*;

struct MovieStats {
    movie_id: MovieId,
    moments: Moments,
    avg_rating: f64,
}

/// Highest mean-rated movies among those with at least `min_ratings`
/// ratings. An empty list is a valid answer.
pub fn top_rated_movies(
    index: &DataIndex,
    config: &TopMoviesConfig,
) -> Result<Vec<TopMovieRow>, ComputationError> {
    let eligible: Vec<MovieStats> = index
        .movie_ids_sorted()
        .into_par_iter()
        .filter_map(|movie_id| {
            let moments: Moments = index
                .get_movie_ratings(movie_id)
                .iter()
                .map(|r| u64::from(r.score))
                .collect();
            if moments.count() < u64::from(config.min_ratings) {
                return None;
            }
            let avg_rating = moments.mean()?;
            Some(MovieStats { movie_id, moments, avg_rating })
        })
        .collect();

    let ranked = rank_partitions(
        eligible,
        |_| (),
        |a, b| {
            descending(a.avg_rating, b.avg_rating)
                .then(b.moments.count().cmp(&a.moments.count()))
                .then(a.movie_id.cmp(&b.movie_id))
        },
        Some(config.top_k),
    );

    ranked
        .into_iter()
        .map(|ranked| {
            let stats = ranked.row;
            let movie = index.get_movie(stats.movie_id).ok_or_else(|| ComputationError::Internal {
                view: ViewKind::TopMovies,
                reason: format!("rated movie {} is not indexed", stats.movie_id),
            })?;
            Ok(TopMovieRow {
                movie_id: stats.movie_id,
                title: movie.title.clone(),
                avg_rating: ensure_finite(ViewKind::TopMovies, "avg_rating", stats.avg_rating)?,
                rating_count: stats.moments.count() as u32,
                rating_std: stats.moments.sample_std(),
                release_date: movie.release_date.clone(),
            })
        })
        .collect()
}

/// Aggregator for the top movies view
#[derive(Debug, Clone, Default)]
pub struct TopMoviesAggregator {
    config: TopMoviesConfig,
}

impl TopMoviesAggregator {
    pub fn new(config: TopMoviesConfig) -> Self {
        Self { config }
    }
}

impl Aggregator for TopMoviesAggregator {
    fn view(&self) -> ViewKind {
        ViewKind::TopMovies
    }

    fn compute(&self, index: &DataIndex, cancel: &Cancellation) -> Result<ViewRows, ComputationError> {
        cancel.check()?;
        top_rated_movies(index, &self.config).map(ViewRows::TopMovies)
    }
}
