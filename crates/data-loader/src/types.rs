//! Core domain types for the MovieLens dataset.
//!
//! Users, movies and ratings are immutable once loaded. Age groups are
//! derived from a user's age on demand and never stored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{DataLoadError, Result};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique identifier for a user (1-943 in MovieLens 100k)
pub type UserId = u32;

/// Unique identifier for a movie (1-1682 in MovieLens 100k)
pub type MovieId = u32;

/// A rating on the integer 1-5 scale
pub type Score = u8;

/// Lowest score accepted by the loader
pub const MIN_SCORE: Score = 1;

/// Highest score accepted by the loader
pub const MAX_SCORE: Score = 5;

// =============================================================================
// User-related Types
// =============================================================================

/// Represents a user in the MovieLens dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub age: u32,
    /// Free-form occupation label ("engineer", "student", ...)
    pub occupation: String,
}

impl User {
    pub fn age_group(&self) -> AgeGroup {
        AgeGroup::from_age(self.age)
    }
}

/// Age buckets used to build (occupation, age group) cohorts.
///
/// Variants are declared in ascending order of their lower bound, so the
/// derived `Ord` sorts cohorts from youngest to oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    Under20,
    Age20To24,
    Age25To34,
    Age35To44,
    Age45Plus,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        AgeGroup::Under20,
        AgeGroup::Age20To24,
        AgeGroup::Age25To34,
        AgeGroup::Age35To44,
        AgeGroup::Age45Plus,
    ];

    /// Bucket an age into its group. Pure function of the age.
    pub fn from_age(age: u32) -> Self {
        match age {
            0..=19 => AgeGroup::Under20,
            20..=24 => AgeGroup::Age20To24,
            25..=34 => AgeGroup::Age25To34,
            35..=44 => AgeGroup::Age35To44,
            _ => AgeGroup::Age45Plus,
        }
    }

    /// Label written to the sink
    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Under20 => "Under 20",
            AgeGroup::Age20To24 => "20-25",
            AgeGroup::Age25To34 => "25-35",
            AgeGroup::Age35To44 => "35-45",
            AgeGroup::Age45Plus => "45+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Movie-related Types
// =============================================================================

/// Represents a movie in the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    /// Release date as written in the source ("01-Jan-1995"), if any
    pub release_date: Option<String>,
    /// Genres flagged for this movie. A movie may carry several.
    pub genres: Vec<Genre>,
}

/// Movie genres from MovieLens, in the order of the genre flag columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Genre {
    Unknown,
    Action,
    Adventure,
    Animation,
    Children,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Fantasy,
    FilmNoir,
    Horror,
    Musical,
    Mystery,
    Romance,
    SciFi,
    Thriller,
    War,
    Western,
}

impl Genre {
    /// All genres in flag-column order
    pub const ALL: [Genre; 19] = [
        Genre::Unknown,
        Genre::Action,
        Genre::Adventure,
        Genre::Animation,
        Genre::Children,
        Genre::Comedy,
        Genre::Crime,
        Genre::Documentary,
        Genre::Drama,
        Genre::Fantasy,
        Genre::FilmNoir,
        Genre::Horror,
        Genre::Musical,
        Genre::Mystery,
        Genre::Romance,
        Genre::SciFi,
        Genre::Thriller,
        Genre::War,
        Genre::Western,
    ];

    /// Display name as used by MovieLens
    pub fn name(&self) -> &'static str {
        match self {
            Genre::Unknown => "unknown",
            Genre::Action => "Action",
            Genre::Adventure => "Adventure",
            Genre::Animation => "Animation",
            Genre::Children => "Children's",
            Genre::Comedy => "Comedy",
            Genre::Crime => "Crime",
            Genre::Documentary => "Documentary",
            Genre::Drama => "Drama",
            Genre::Fantasy => "Fantasy",
            Genre::FilmNoir => "Film-Noir",
            Genre::Horror => "Horror",
            Genre::Musical => "Musical",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::SciFi => "Sci-Fi",
            Genre::Thriller => "Thriller",
            Genre::War => "War",
            Genre::Western => "Western",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Rating Type
// =============================================================================

/// A single rating from a user for a movie.
///
/// The (user_id, movie_id) pair is unique within a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub score: Score,
}

// =============================================================================
// DataIndex - The In-Memory Snapshot
// =============================================================================

/// Holds the three relations plus the rating indices the analytics need.
///
/// Every rating stored here references an existing user and movie, and
/// each (user, movie) pair appears at most once. `insert_rating` enforces
/// both, so the invariants hold whether the index was loaded from files or
/// assembled in code.
#[derive(Debug, Default)]
pub struct DataIndex {
    pub(crate) users: HashMap<UserId, User>,
    pub(crate) movies: HashMap<MovieId, Movie>,

    /// Sparse rating vector per user, sorted by movie id
    pub(crate) user_ratings: HashMap<UserId, Vec<(MovieId, Score)>>,
    /// All ratings received by each movie, in insertion order
    pub(crate) movie_ratings: HashMap<MovieId, Vec<Rating>>,

    pub(crate) rating_count: usize,
}

impl DataIndex {
    /// Creates a new, empty DataIndex
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn get_movie(&self, id: MovieId) -> Option<&Movie> {
        self.movies.get(&id)
    }

    /// Sparse rating vector of a user as `(movie_id, score)` pairs sorted by
    /// movie id. Empty if the user rated nothing.
    pub fn get_user_ratings(&self, user_id: UserId) -> &[(MovieId, Score)] {
        self.user_ratings
            .get(&user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get all ratings for a movie
    pub fn get_movie_ratings(&self, movie_id: MovieId) -> &[Rating] {
        self.movie_ratings
            .get(&movie_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Users ordered by id
    pub fn users_sorted(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_unstable_by_key(|u| u.id);
        users
    }

    /// Movie ids in ascending order
    pub fn movie_ids_sorted(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.movies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over every user's sparse rating vector (unordered)
    pub fn rating_vectors(&self) -> impl Iterator<Item = (UserId, &[(MovieId, Score)])> + '_ {
        self.user_ratings
            .iter()
            .map(|(&user_id, ratings)| (user_id, ratings.as_slice()))
    }

    /// Lowest-id movie whose title contains `query`, ignoring case
    pub fn find_movie_by_title(&self, query: &str) -> Option<&Movie> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.movies
            .values()
            .filter(|movie| movie.title.to_lowercase().contains(&needle))
            .min_by_key(|movie| movie.id)
    }

    /// Insert a user, replacing any previous user with the same id
    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Insert a movie, replacing any previous movie with the same id
    pub fn insert_movie(&mut self, movie: Movie) {
        self.movies.insert(movie.id, movie);
    }

    /// Insert a rating and update both rating indices.
    ///
    /// Fails without modifying the index when the user or movie is unknown,
    /// the score is off the 1-5 scale, or the pair was already rated.
    pub fn insert_rating(&mut self, rating: Rating) -> Result<()> {
        if !self.users.contains_key(&rating.user_id) {
            return Err(DataLoadError::MissingReference {
                entity: "User".to_string(),
                id: rating.user_id,
            });
        }
        if !self.movies.contains_key(&rating.movie_id) {
            return Err(DataLoadError::MissingReference {
                entity: "Movie".to_string(),
                id: rating.movie_id,
            });
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&rating.score) {
            return Err(DataLoadError::InvalidValue {
                field: "rating".to_string(),
                value: rating.score.to_string(),
            });
        }

        let vector = self.user_ratings.entry(rating.user_id).or_default();
        match vector.binary_search_by_key(&rating.movie_id, |&(movie_id, _)| movie_id) {
            Ok(_) => {
                return Err(DataLoadError::DuplicateRating {
                    user_id: rating.user_id,
                    movie_id: rating.movie_id,
                });
            }
            Err(pos) => vector.insert(pos, (rating.movie_id, rating.score)),
        }

        self.movie_ratings
            .entry(rating.movie_id)
            .or_default()
            .push(rating);
        self.rating_count += 1;
        Ok(())
    }

    /// (users, movies, ratings)
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.users.len(), self.movies.len(), self.rating_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(19), AgeGroup::Under20);
        assert_eq!(AgeGroup::from_age(20), AgeGroup::Age20To24);
        assert_eq!(AgeGroup::from_age(24), AgeGroup::Age20To24);
        assert_eq!(AgeGroup::from_age(25), AgeGroup::Age25To34);
        assert_eq!(AgeGroup::from_age(35), AgeGroup::Age35To44);
        assert_eq!(AgeGroup::from_age(45), AgeGroup::Age45Plus);
        assert_eq!(AgeGroup::from_age(73), AgeGroup::Age45Plus);
    }

    #[test]
    fn test_age_group_order_follows_lower_bound() {
        let mut groups = vec![AgeGroup::Age45Plus, AgeGroup::Under20, AgeGroup::Age25To34];
        groups.sort();
        assert_eq!(
            groups,
            vec![AgeGroup::Under20, AgeGroup::Age25To34, AgeGroup::Age45Plus]
        );
        assert_eq!(AgeGroup::Age45Plus.to_string(), "45+");
    }

    #[test]
    fn test_every_group_contains_its_lower_bound() {
        let lower_bounds = [0, 20, 25, 35, 45];
        for (group, age) in AgeGroup::ALL.into_iter().zip(lower_bounds) {
            assert_eq!(AgeGroup::from_age(age), group);
        }
        assert!(AgeGroup::ALL.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_find_movie_by_title() {
        let mut index = DataIndex::new();
        for (id, title) in [
            (50, "Star Wars (1977)"),
            (12, "Usual Suspects, The (1995)"),
            (181, "Return of the Jedi (1983)"),
            (172, "Empire Strikes Back, The (1980)"),
        ] {
            index.insert_movie(Movie {
                id,
                title: title.to_string(),
                release_date: None,
                genres: vec![],
            });
        }

        assert_eq!(index.find_movie_by_title("usual suspects, the (1995)").map(|m| m.id), Some(12));
        assert_eq!(index.find_movie_by_title("STAR WARS").map(|m| m.id), Some(50));
        // Three titles contain "the"; the lowest id wins
        assert_eq!(index.find_movie_by_title("the").map(|m| m.id), Some(12));
        assert!(index.find_movie_by_title("Casablanca").is_none());
        assert!(index.find_movie_by_title("  ").is_none());
    }

    #[test]
    fn test_genre_names() {
        assert_eq!(Genre::Children.name(), "Children's");
        assert_eq!(Genre::SciFi.name(), "Sci-Fi");
        assert_eq!(Genre::FilmNoir.to_string(), "Film-Noir");
        assert_eq!(Genre::ALL.len(), 19);
    }

    #[test]
    fn test_user_vector_stays_sorted() {
        let mut index = DataIndex::new();
        index.insert_user(User { id: 1, age: 30, occupation: "writer".to_string() });
        for id in [7, 2, 5] {
            index.insert_movie(Movie {
                id,
                title: format!("Movie {}", id),
                release_date: None,
                genres: vec![],
            });
        }
        for (movie_id, score) in [(7, 3), (2, 5), (5, 1)] {
            index.insert_rating(Rating { user_id: 1, movie_id, score }).unwrap();
        }

        assert_eq!(index.get_user_ratings(1), &[(2, 5), (5, 1), (7, 3)]);
    }
}
