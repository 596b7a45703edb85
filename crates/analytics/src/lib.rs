//! # Analytics Crate
//!
//! The four analytic views computed over a loaded `DataIndex`:
//!
//! - **cohort**: mean age per occupation, top genres per (occupation, age group)
//! - **ratings**: globally top-rated movies
//! - **similarity**: item-item Pearson similarity over co-raters
//!
//! Every view implements [`Aggregator`], reads the index without mutating
//! it, and ranks rows with the shared [`ranking::rank_partitions`] utility.
//! Long-running views poll a [`Cancellation`] token.

pub mod cancel;
pub mod cohort;
pub mod config;
pub mod error;
pub mod ranking;
pub mod ratings;
pub mod similarity;
pub mod stats;
pub mod traits;
pub mod views;

pub use cancel::Cancellation;
pub use cohort::{
    GenreCohortAggregator, OccupationAgeAggregator, mean_age_by_occupation,
    top_genres_by_occupation_age,
};
pub use config::{AnalyticsConfig, GenreConfig, ScoreMapping, SimilarityConfig, TopMoviesConfig};
pub use error::ComputationError;
pub use ranking::{Ranked, rank_partitions};
pub use ratings::{TopMoviesAggregator, top_rated_movies};
pub use similarity::{PairAccumulator, PairStatistics, SimilarityEngine};
pub use traits::Aggregator;
pub use views::{
    GenreCohortRow, OccupationAgeRow, SimilarMovieRow, TopMovieRow, ViewKind, ViewRows,
};

/// One aggregator per view, configured from `config`, in `ViewKind::ALL` order
pub fn aggregators(config: &AnalyticsConfig) -> Vec<Box<dyn Aggregator>> {
    vec![
        Box::new(OccupationAgeAggregator),
        Box::new(TopMoviesAggregator::new(config.top_movies.clone())),
        Box::new(GenreCohortAggregator::new(config.genres.clone())),
        Box::new(SimilarityEngine::new(config.similarity.clone())),
    ]
}

/// Build the aggregator for a single view
pub fn aggregator_for(view: ViewKind, config: &AnalyticsConfig) -> Box<dyn Aggregator> {
    match view {
        ViewKind::OccupationAge => Box::new(OccupationAgeAggregator),
        ViewKind::TopMovies => Box::new(TopMoviesAggregator::new(config.top_movies.clone())),
        ViewKind::GenreCohorts => Box::new(GenreCohortAggregator::new(config.genres.clone())),
        ViewKind::SimilarMovies => Box::new(SimilarityEngine::new(config.similarity.clone())),
    }
}
