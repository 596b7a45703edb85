//! Thresholds and limits for the analytic views.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! produces a usable configuration.

use crate::error::ComputationError;
use data_loader::MovieId;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_MOVIES_MIN_RATINGS: u32 = 35;
pub const DEFAULT_TOP_MOVIES_LIMIT: usize = 20;
pub const DEFAULT_GENRE_MIN_RATINGS: u32 = 1;
pub const DEFAULT_GENRES_PER_COHORT: usize = 3;
pub const DEFAULT_MIN_COOCCURRENCE: u32 = 50;
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.95;
pub const DEFAULT_NEIGHBOURS_PER_MOVIE: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub top_movies: TopMoviesConfig,
    pub genres: GenreConfig,
    pub similarity: SimilarityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopMoviesConfig {
    /// Movies with fewer ratings are not eligible
    pub min_ratings: u32,
    pub top_k: usize,
}

impl Default for TopMoviesConfig {
    fn default() -> Self {
        Self {
            min_ratings: DEFAULT_TOP_MOVIES_MIN_RATINGS,
            top_k: DEFAULT_TOP_MOVIES_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenreConfig {
    /// Minimum ratings a genre needs inside one cohort
    pub min_ratings: u32,
    pub top_k: usize,
}

impl Default for GenreConfig {
    fn default() -> Self {
        Self {
            min_ratings: DEFAULT_GENRE_MIN_RATINGS,
            top_k: DEFAULT_GENRES_PER_COHORT,
        }
    }
}

/// How a Pearson correlation in [-1, 1] becomes a similarity score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMapping {
    /// `(r + 1) / 2`, in [0, 1]
    #[default]
    Rescaled,
    /// `r` itself
    Correlation,
}

impl ScoreMapping {
    pub fn apply(&self, correlation: f64) -> f64 {
        match self {
            ScoreMapping::Rescaled => (correlation + 1.0) / 2.0,
            ScoreMapping::Correlation => correlation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Pairs rated together by fewer users are excluded
    pub min_cooccurrence: u32,
    /// Minimum similarity score, on the scale chosen by `scoring`
    pub min_score: f64,
    pub scoring: ScoreMapping,
    pub top_k: usize,
    /// Restrict targets to these movies; empty means every movie
    pub targets: Vec<MovieId>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            min_cooccurrence: DEFAULT_MIN_COOCCURRENCE,
            min_score: DEFAULT_MIN_SIMILARITY,
            scoring: ScoreMapping::default(),
            top_k: DEFAULT_NEIGHBOURS_PER_MOVIE,
            targets: Vec::new(),
        }
    }
}

impl AnalyticsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum ratings for a movie to enter the top list (default: 35)
    pub fn with_top_movies(mut self, min_ratings: u32, top_k: usize) -> Self {
        self.top_movies = TopMoviesConfig { min_ratings, top_k };
        self
    }

    /// Genre ranking per cohort (default: 1 rating, top 3)
    pub fn with_genres(mut self, min_ratings: u32, top_k: usize) -> Self {
        self.genres = GenreConfig { min_ratings, top_k };
        self
    }

    /// Co-rating and score thresholds for similar movies (default: 50, 0.95)
    pub fn with_similarity_thresholds(mut self, min_cooccurrence: u32, min_score: f64) -> Self {
        self.similarity.min_cooccurrence = min_cooccurrence;
        self.similarity.min_score = min_score;
        self
    }

    pub fn with_similarity_top_k(mut self, top_k: usize) -> Self {
        self.similarity.top_k = top_k;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoreMapping) -> Self {
        self.similarity.scoring = scoring;
        self
    }

    pub fn with_similarity_targets(mut self, targets: Vec<MovieId>) -> Self {
        self.similarity.targets = targets;
        self
    }

    /// Reject thresholds that no score can satisfy
    pub fn validate(&self) -> Result<(), ComputationError> {
        let score = self.similarity.min_score;
        let (low, high) = match self.similarity.scoring {
            ScoreMapping::Rescaled => (0.0, 1.0),
            ScoreMapping::Correlation => (-1.0, 1.0),
        };
        if !score.is_finite() || score < low || score > high {
            return Err(ComputationError::InvalidConfig(format!(
                "similarity.min_score {} is outside [{}, {}]",
                score, low, high
            )));
        }
        if self.similarity.min_cooccurrence < 2 {
            return Err(ComputationError::InvalidConfig(
                "similarity.min_cooccurrence must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
