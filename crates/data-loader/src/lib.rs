//! # Data Loader Crate
//!
//! Loads the MovieLens 100k user, movie and rating tables into a validated
//! in-memory snapshot (`DataIndex`) that the analytics read concurrently.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (User, Movie, Rating, AgeGroup, Genre, DataIndex)
//! - **parser**: Parse u.user / u.item / u.data into Rust structs
//! - **index**: Validate and index parsed rows
//! - **report**: Per-relation accounting of excluded rows
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::DataIndex;
//! use std::path::Path;
//!
//! let (index, report) = DataIndex::load_from_files(Path::new("data/ml-100k"))?;
//! println!("{} ratings dropped", report.ratings.dropped());
//! let ratings = index.get_user_ratings(1);
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod report;
pub mod types;

pub use error::{DataLoadError, Result};
pub use report::{LoadReport, RelationReport};
pub use types::{
    AgeGroup, DataIndex, Genre, MAX_SCORE, MIN_SCORE, Movie, MovieId, Rating, Score, User,
    UserId,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_index_creation() {
        let index = DataIndex::new();
        let (users, movies, ratings) = index.counts();

        assert_eq!(users, 0);
        assert_eq!(movies, 0);
        assert_eq!(ratings, 0);
    }

    #[test]
    fn test_insert_rating_requires_references() {
        let mut index = DataIndex::new();
        let rating = Rating { user_id: 1, movie_id: 1193, score: 5 };

        assert!(matches!(
            index.insert_rating(rating),
            Err(DataLoadError::MissingReference { .. })
        ));

        index.insert_user(User { id: 1, age: 25, occupation: "programmer".to_string() });
        index.insert_movie(Movie {
            id: 1193,
            title: "One Flew Over the Cuckoo's Nest (1975)".to_string(),
            release_date: None,
            genres: vec![Genre::Drama],
        });
        index.insert_rating(rating).unwrap();

        assert_eq!(index.get_user_ratings(1), &[(1193, 5)]);
        assert_eq!(index.get_movie_ratings(1193).len(), 1);
        assert_eq!(index.counts(), (1, 1, 1));
    }

    #[test]
    fn test_insert_rating_rejects_duplicates_and_bad_scores() {
        let mut index = DataIndex::new();
        index.insert_user(User { id: 1, age: 25, occupation: "programmer".to_string() });
        index.insert_movie(Movie {
            id: 1,
            title: "Toy Story (1995)".to_string(),
            release_date: None,
            genres: vec![],
        });

        index.insert_rating(Rating { user_id: 1, movie_id: 1, score: 3 }).unwrap();
        assert!(matches!(
            index.insert_rating(Rating { user_id: 1, movie_id: 1, score: 4 }),
            Err(DataLoadError::DuplicateRating { user_id: 1, movie_id: 1 })
        ));
        assert!(index.insert_rating(Rating { user_id: 1, movie_id: 1, score: 9 }).is_err());
        assert_eq!(index.counts().2, 1);
    }

    #[test]
    fn test_empty_queries() {
        let index = DataIndex::new();

        assert!(index.get_user(999).is_none());
        assert!(index.get_movie(999).is_none());
        assert!(index.get_user_ratings(999).is_empty());
        assert!(index.get_movie_ratings(999).is_empty());
        assert!(index.users_sorted().is_empty());
    }
}
