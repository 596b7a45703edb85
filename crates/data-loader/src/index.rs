//! DataIndex building and validation.
//!
//! Both entry points (`load_from_files` and `from_relations`) run the same
//! validation: duplicate keys keep their first occurrence, ratings must
//! resolve to a loaded user and movie, and every excluded row is counted in
//! the returned `LoadReport`. A load only fails when a file is unreadable or
//! a relation ends up empty.

use crate::error::{DataLoadError, Result};
use crate::parser::{self, ParsedFile};
use crate::report::{LoadReport, RelationReport};
use crate::types::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

impl DataIndex {
    /// Load the MovieLens 100k dataset from a directory.
    ///
    /// The three files are parsed in parallel with Rayon, then validated
    /// and indexed.
    pub fn load_from_files(data_dir: &Path) -> Result<(Self, LoadReport)> {
        info!("Loading MovieLens dataset from {:?}", data_dir);
        let start = Instant::now();

        let users_path = data_dir.join(parser::USERS_FILE);
        let movies_path = data_dir.join(parser::MOVIES_FILE);
        let ratings_path = data_dir.join(parser::RATINGS_FILE);

        // Nested joins give three-way parallelism
        let ((users, movies), ratings) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_users(&users_path),
                    || parser::parse_movies(&movies_path),
                )
            },
            || parser::parse_ratings(&ratings_path),
        );

        let users = users?;
        let movies = movies?;
        let ratings = ratings?;

        let mut report = LoadReport::default();
        let users = take_parsed(users, &mut report.users, &mut report.samples);
        let movies = take_parsed(movies, &mut report.movies, &mut report.samples);
        let ratings = take_parsed(ratings, &mut report.ratings, &mut report.samples);

        let index = Self::build(users, movies, ratings, &mut report)?;

        let (user_count, movie_count, rating_count) = index.counts();
        info!(
            "Loaded {} users, {} movies, {} ratings in {:.2?} ({} rows dropped)",
            user_count,
            movie_count,
            rating_count,
            start.elapsed(),
            report.dropped()
        );
        Ok((index, report))
    }

    /// Build an index from already-typed relations.
    ///
    /// Applies the same key, reference and emptiness checks as
    /// `load_from_files`.
    pub fn from_relations(
        users: Vec<User>,
        movies: Vec<Movie>,
        ratings: Vec<Rating>,
    ) -> Result<(Self, LoadReport)> {
        let mut report = LoadReport::default();
        report.users.read = users.len();
        report.movies.read = movies.len();
        report.ratings.read = ratings.len();

        let index = Self::build(users, movies, ratings, &mut report)?;
        Ok((index, report))
    }

    fn build(
        users: Vec<User>,
        movies: Vec<Movie>,
        ratings: Vec<Rating>,
        report: &mut LoadReport,
    ) -> Result<Self> {
        let mut index = DataIndex::new();

        for user in users {
            if user.id == 0 || user.age == 0 || user.occupation.trim().is_empty() {
                report.users.rejected += 1;
                report.sample(&DataLoadError::InvalidValue {
                    field: "user".to_string(),
                    value: format!("{:?}", user),
                });
            } else if index.users.contains_key(&user.id) {
                report.users.duplicates += 1;
            } else {
                index.insert_user(user);
            }
        }

        for movie in movies {
            if movie.id == 0 || movie.title.trim().is_empty() {
                report.movies.rejected += 1;
                report.sample(&DataLoadError::InvalidValue {
                    field: "movie".to_string(),
                    value: format!("{:?}", movie),
                });
            } else if index.movies.contains_key(&movie.id) {
                report.movies.duplicates += 1;
            } else {
                index.insert_movie(movie);
            }
        }

        for rating in ratings {
            if let Err(err) = index.insert_rating(rating) {
                match &err {
                    DataLoadError::MissingReference { .. } => report.ratings.unresolved += 1,
                    DataLoadError::DuplicateRating { .. } => report.ratings.duplicates += 1,
                    _ => report.ratings.rejected += 1,
                }
                report.sample(&err);
            }
        }

        let (user_count, movie_count, rating_count) = index.counts();
        report.users.accepted = user_count;
        report.movies.accepted = movie_count;
        report.ratings.accepted = rating_count;

        if report.dropped() > 0 {
            warn!(
                "Dropped rows: users={} movies={} ratings={} (unresolved references={}, duplicates={})",
                report.users.dropped(),
                report.movies.dropped(),
                report.ratings.dropped(),
                report.ratings.unresolved,
                report.users.duplicates + report.movies.duplicates + report.ratings.duplicates,
            );
            for sample in &report.samples {
                debug!("Rejected row: {}", sample);
            }
        }

        ensure_not_empty("users", user_count, &report.users)?;
        ensure_not_empty("movies", movie_count, &report.movies)?;
        ensure_not_empty("ratings", rating_count, &report.ratings)?;

        Ok(index)
    }
}

/// Move the parsed rows out and account for the rejected lines
fn take_parsed<T>(
    parsed: ParsedFile<T>,
    relation: &mut RelationReport,
    samples: &mut Vec<String>,
) -> Vec<T> {
    relation.read = parsed.lines;
    relation.rejected = parsed.rejected.len();
    for err in &parsed.rejected {
        if samples.len() < crate::report::MAX_REJECTION_SAMPLES {
            samples.push(err.to_string());
        }
    }
    parsed.rows
}

fn ensure_not_empty(relation: &'static str, accepted: usize, report: &RelationReport) -> Result<()> {
    if accepted == 0 {
        return Err(DataLoadError::EmptyRelation {
            relation,
            rejected: report.dropped(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn user(id: UserId, age: u32, occupation: &str) -> User {
        User { id, age, occupation: occupation.to_string() }
    }

    fn movie(id: MovieId) -> Movie {
        Movie {
            id,
            title: format!("Movie {} (1995)", id),
            release_date: Some("01-Jan-1995".to_string()),
            genres: vec![Genre::Drama],
        }
    }

    #[test]
    fn test_from_relations_drops_and_counts_unresolved_ratings() {
        let (index, report) = DataIndex::from_relations(
            vec![user(1, 25, "engineer"), user(2, 35, "engineer")],
            vec![movie(10), movie(11)],
            vec![
                Rating { user_id: 1, movie_id: 10, score: 4 },
                Rating { user_id: 3, movie_id: 10, score: 4 },  // unknown user
                Rating { user_id: 2, movie_id: 99, score: 2 },  // unknown movie
                Rating { user_id: 2, movie_id: 11, score: 5 },
            ],
        )
        .unwrap();

        assert_eq!(index.counts(), (2, 2, 2));
        assert_eq!(report.ratings.unresolved, 2);
        assert_eq!(report.ratings.accepted, 2);
        assert_eq!(report.dropped(), 2);
        assert_eq!(report.samples.len(), 2);
    }

    #[test]
    fn test_from_relations_keeps_first_duplicate() {
        let (index, report) = DataIndex::from_relations(
            vec![user(1, 25, "engineer"), user(1, 60, "retired")],
            vec![movie(10)],
            vec![
                Rating { user_id: 1, movie_id: 10, score: 4 },
                Rating { user_id: 1, movie_id: 10, score: 1 },
            ],
        )
        .unwrap();

        assert_eq!(index.get_user(1).unwrap().occupation, "engineer");
        assert_eq!(index.get_user_ratings(1), &[(10, 4)]);
        assert_eq!(report.users.duplicates, 1);
        assert_eq!(report.ratings.duplicates, 1);
    }

    #[test]
    fn test_empty_relation_is_fatal() {
        let err = DataIndex::from_relations(
            vec![user(1, 25, "engineer")],
            vec![movie(10)],
            vec![Rating { user_id: 7, movie_id: 10, score: 4 }],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            DataLoadError::EmptyRelation { relation: "ratings", rejected: 1 }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_typed_rows_are_rejected() {
        let err = DataIndex::from_relations(
            vec![user(1, 0, "engineer"), user(2, 30, "  ")],
            vec![movie(10)],
            vec![],
        )
        .unwrap_err();

        assert!(matches!(err, DataLoadError::EmptyRelation { relation: "users", rejected: 2 }));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("u.user"),
            "1|24|M|technician|85711\n2|53|F|other|94043\n3|x|M|writer|32067\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("u.item"),
            "1|Toy Story (1995)|01-Jan-1995||url|0|0|0|1|1|1|0|0|0|0|0|0|0|0|0|0|0|0|0\n\
             2|GoldenEye (1995)|01-Jan-1995||url|0|1|1|0|0|0|0|0|0|0|0|0|0|0|0|0|1|0|0\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("u.data"),
            "1\t1\t5\t874965758\n1\t2\t3\t876893171\n2\t1\t4\t878542960\n9\t1\t4\t878542960\n2\t2\t7\t878542960\n",
        )
        .unwrap();

        let (index, report) = DataIndex::load_from_files(dir.path()).unwrap();

        assert_eq!(index.counts(), (2, 2, 3));
        assert_eq!(report.users.read, 3);
        assert_eq!(report.users.rejected, 1);
        assert_eq!(report.ratings.rejected, 1);
        assert_eq!(report.ratings.unresolved, 1);
        assert_eq!(index.get_movie(2).unwrap().genres, vec![Genre::Action, Genre::Adventure, Genre::Thriller]);
    }

    #[test]
    fn test_load_from_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataIndex::load_from_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DataLoadError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_dataset() {
        // Requires the real dataset under data/ml-100k at the workspace root
        let data_dir = Path::new("../../data/ml-100k");

        if data_dir.exists() {
            let (index, _report) = DataIndex::load_from_files(data_dir).unwrap();
            let (users, movies, ratings) = index.counts();

            // MovieLens 100k expected counts
            assert_eq!(users, 943);
            assert_eq!(movies, 1682);
            assert_eq!(ratings, 100000);
        }
    }
}
