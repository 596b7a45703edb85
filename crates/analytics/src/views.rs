//! Output rows of the four analytic views.

use data_loader::{AgeGroup, Genre, MovieId};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// View identity
// ============================================================================

/// The four views a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    #[serde(rename = "mean_age_by_occupation")]
    OccupationAge,
    #[serde(rename = "top_rated_movies")]
    TopMovies,
    #[serde(rename = "top_genres_by_occupation_age")]
    GenreCohorts,
    SimilarMovies,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::OccupationAge,
        ViewKind::TopMovies,
        ViewKind::GenreCohorts,
        ViewKind::SimilarMovies,
    ];

    /// Stable name used for sink tables and error messages
    pub fn name(&self) -> &'static str {
        match self {
            ViewKind::OccupationAge => "mean_age_by_occupation",
            ViewKind::TopMovies => "top_rated_movies",
            ViewKind::GenreCohorts => "top_genres_by_occupation_age",
            ViewKind::SimilarMovies => "similar_movies",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.name() == name)
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Row types
// ============================================================================

/// Age statistics for one occupation. Key: `occupation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupationAgeRow {
    pub occupation: String,
    pub mean_age: f64,
    pub user_count: u32,
    /// Sample standard deviation; `None` for a single-member group
    pub std_dev: Option<f64>,
    pub min_age: u32,
    pub max_age: u32,
}

/// A movie in the global top list. Key: `movie_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMovieRow {
    pub movie_id: MovieId,
    pub title: String,
    pub avg_rating: f64,
    pub rating_count: u32,
    pub rating_std: Option<f64>,
    pub release_date: Option<String>,
}

/// A ranked genre inside an (occupation, age group) cohort.
/// Key: `(occupation, age_group, genre)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreCohortRow {
    pub occupation: String,
    pub age_group: AgeGroup,
    pub genre: Genre,
    pub avg_rating: f64,
    pub rating_count: u32,
    pub genre_rank: u32,
    /// Users in the cohort, whether or not they rated the genre
    pub total_users: u32,
}

/// A neighbour of a target movie. Key: `(target_movie, similar_movie_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMovieRow {
    pub target_movie: MovieId,
    pub similar_movie_id: MovieId,
    pub similar_movie_title: String,
    pub similarity_score: f64,
    pub cooccurrence_count: u32,
    pub correlation: f64,
    pub similarity_rank: u32,
    pub release_date: Option<String>,
}

/// The rows of one view, tagged with the view they belong to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", content = "rows", rename_all = "snake_case")]
pub enum ViewRows {
    #[serde(rename = "mean_age_by_occupation")]
    OccupationAge(Vec<OccupationAgeRow>),
    #[serde(rename = "top_rated_movies")]
    TopMovies(Vec<TopMovieRow>),
    #[serde(rename = "top_genres_by_occupation_age")]
    GenreCohorts(Vec<GenreCohortRow>),
    SimilarMovies(Vec<SimilarMovieRow>),
}

impl ViewRows {
    pub fn kind(&self) -> ViewKind {
        match self {
            ViewRows::OccupationAge(_) => ViewKind::OccupationAge,
            ViewRows::TopMovies(_) => ViewKind::TopMovies,
            ViewRows::GenreCohorts(_) => ViewKind::GenreCohorts,
            ViewRows::SimilarMovies(_) => ViewKind::SimilarMovies,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ViewRows::OccupationAge(rows) => rows.len(),
            ViewRows::TopMovies(rows) => rows.len(),
            ViewRows::GenreCohorts(rows) => rows.len(),
            ViewRows::SimilarMovies(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
