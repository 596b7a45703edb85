//! Cohort Aggregator: age statistics per occupation and genre preferences
//! per (occupation, age group) cohort.

use crate::cancel::Cancellation;
use crate::config::GenreConfig;
use crate::error::{ComputationError, ensure_finite};
use crate::ranking::{descending, rank_partitions};
use crate::stats::Moments;
use crate::traits::Aggregator;
use crate::views::{GenreCohortRow, OccupationAgeRow, ViewKind, ViewRows};
use data_loader::{AgeGroup, DataIndex, Genre, MovieId};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Movies handed to one rayon task between cancellation checks
const MOVIE_CHUNK: usize = 64;

type CohortKey<'a> = (&'a str, AgeGroup);

#[derive(Default)]
struct AgeStats {
    moments: Moments,
    min: u32,
    max: u32,
}

/// Mean, spread and range of member ages for every occupation
pub fn mean_age_by_occupation(index: &DataIndex) -> Result<Vec<OccupationAgeRow>, ComputationError> {
    let mut groups: BTreeMap<&str, AgeStats> = BTreeMap::new();
    for user in index.users_sorted() {
        let stats = groups.entry(user.occupation.as_str()).or_insert_with(|| AgeStats {
            moments: Moments::default(),
            min: user.age,
            max: user.age,
        });
        stats.moments.push(u64::from(user.age));
        stats.min = stats.min.min(user.age);
        stats.max = stats.max.max(user.age);
    }

    groups
        .into_iter()
        .filter_map(|(occupation, stats)| stats.moments.mean().map(|mean| (occupation, stats, mean)))
        .map(|(occupation, stats, mean)| {
            Ok(OccupationAgeRow {
                occupation: occupation.to_string(),
                mean_age: ensure_finite(ViewKind::OccupationAge, "mean_age", mean)?,
                user_count: stats.moments.count() as u32,
                std_dev: stats.moments.sample_std(),
                min_age: stats.min,
                max_age: stats.max,
            })
        })
        .collect()
}

struct GenreCandidate<'a> {
    cohort: CohortKey<'a>,
    genre: Genre,
    avg_rating: f64,
    rating_count: u32,
}

/// Top genres by mean rating inside each (occupation, age group) cohort.
///
/// A movie with several genres contributes its rating to each of them.
pub fn top_genres_by_occupation_age(
    index: &DataIndex,
    config: &GenreConfig,
    cancel: &Cancellation,
) -> Result<Vec<GenreCohortRow>, ComputationError> {
    let mut cohort_sizes: HashMap<CohortKey<'_>, u32> = HashMap::new();
    for user in index.users_sorted() {
        *cohort_sizes
            .entry((user.occupation.as_str(), user.age_group()))
            .or_insert(0) += 1;
    }

    let movie_ids = index.movie_ids_sorted();
    let totals = movie_ids
        .par_chunks(MOVIE_CHUNK)
        .map(|chunk| -> Result<_, ComputationError> {
            cancel.check()?;
            Ok(genre_moments(index, chunk))
        })
        .try_reduce(HashMap::new, |mut acc, local| {
            for (key, moments) in local {
                acc.entry(key).or_insert_with(Moments::default).merge(&moments);
            }
            Ok(acc)
        })?;
    debug!("Accumulated {} (cohort, genre) groups", totals.len());

    let mut candidates = Vec::with_capacity(totals.len());
    for ((occupation, age_group, genre), moments) in totals {
        let count = moments.count() as u32;
        if count < config.min_ratings {
            continue;
        }
        let Some(mean) = moments.mean() else { continue };
        candidates.push(GenreCandidate {
            cohort: (occupation, age_group),
            genre,
            avg_rating: ensure_finite(ViewKind::GenreCohorts, "avg_rating", mean)?,
            rating_count: count,
        });
    }

    let ranked = rank_partitions(
        candidates,
        |c| c.cohort,
        |a, b| {
            descending(a.avg_rating, b.avg_rating)
                .then(b.rating_count.cmp(&a.rating_count))
                .then_with(|| a.genre.name().cmp(b.genre.name()))
        },
        Some(config.top_k),
    );

    Ok(ranked
        .into_iter()
        .map(|ranked| {
            let c = ranked.row;
            GenreCohortRow {
                occupation: c.cohort.0.to_string(),
                age_group: c.cohort.1,
                genre: c.genre,
                avg_rating: c.avg_rating,
                rating_count: c.rating_count,
                genre_rank: ranked.rank,
                total_users: cohort_sizes.get(&c.cohort).copied().unwrap_or(0),
            }
        })
        .collect())
}

fn genre_moments<'a>(
    index: &'a DataIndex,
    movie_ids: &[MovieId],
) -> HashMap<(&'a str, AgeGroup, Genre), Moments> {
    let mut local: HashMap<(&'a str, AgeGroup, Genre), Moments> = HashMap::new();
    for &movie_id in movie_ids {
        let Some(movie) = index.get_movie(movie_id) else { continue };
        if movie.genres.is_empty() {
            continue;
        }
        for rating in index.get_movie_ratings(movie_id) {
            let Some(user) = index.get_user(rating.user_id) else { continue };
            for &genre in &movie.genres {
                local
                    .entry((user.occupation.as_str(), user.age_group(), genre))
                    .or_default()
                    .push(u64::from(rating.score));
            }
        }
    }
    local
}

/// Aggregator for the occupation age view
#[derive(Debug, Clone, Default)]
pub struct OccupationAgeAggregator;

impl Aggregator for OccupationAgeAggregator {
    fn view(&self) -> ViewKind {
        ViewKind::OccupationAge
    }

    fn compute(&self, index: &DataIndex, cancel: &Cancellation) -> Result<ViewRows, ComputationError> {
        cancel.check()?;
        mean_age_by_occupation(index).map(ViewRows::OccupationAge)
    }
}

/// Aggregator for the per-cohort genre ranking
#[derive(Debug, Clone, Default)]
pub struct GenreCohortAggregator {
    config: GenreConfig,
}

impl GenreCohortAggregator {
    pub fn new(config: GenreConfig) -> Self {
        Self { config }
    }
}

impl Aggregator for GenreCohortAggregator {
    fn view(&self) -> ViewKind {
        ViewKind::GenreCohorts
    }

    fn compute(&self, index: &DataIndex, cancel: &Cancellation) -> Result<ViewRows, ComputationError> {
        top_genres_by_occupation_age(index, &self.config, cancel).map(ViewRows::GenreCohorts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Movie, Rating, User};

    fn fixture() -> DataIndex {
        let users = vec![
            User { id: 1, age: 25, occupation: "engineer".to_string() },
            User { id: 2, age: 35, occupation: "engineer".to_string() },
            User { id: 3, age: 19, occupation: "student".to_string() },
            User { id: 4, age: 22, occupation: "student".to_string() },
            User { id: 5, age: 23, occupation: "student".to_string() },
        ];
        let movies = vec![
            Movie { id: 1, title: "A".into(), release_date: None, genres: vec![Genre::Action, Genre::Comedy] },
            Movie { id: 2, title: "B".into(), release_date: None, genres: vec![Genre::Drama] },
            Movie { id: 3, title: "C".into(), release_date: None, genres: vec![] },
        ];
        let ratings = vec![
            Rating { user_id: 4, movie_id: 1, score: 5 },
            Rating { user_id: 5, movie_id: 1, score: 3 },
            Rating { user_id: 4, movie_id: 2, score: 4 },
            Rating { user_id: 5, movie_id: 3, score: 1 },
            Rating { user_id: 3, movie_id: 2, score: 2 },
        ];
        DataIndex::from_relations(users, movies, ratings).unwrap().0
    }

    #[test]
    fn test_mean_age_by_occupation() {
        let rows = mean_age_by_occupation(&fixture()).unwrap();

        assert_eq!(rows.len(), 2);
        let engineer = &rows[0];
        assert_eq!(engineer.occupation, "engineer");
        assert_eq!(engineer.mean_age, 30.0);
        assert_eq!(engineer.user_count, 2);
        assert_eq!((engineer.min_age, engineer.max_age), (25, 35));
        assert!(engineer.std_dev.is_some());
        assert_eq!(rows[1].occupation, "student");
    }

    #[test]
    fn test_single_member_occupation_has_no_std() {
        let (index, _) = DataIndex::from_relations(
            vec![User { id: 1, age: 40, occupation: "lawyer".to_string() }],
            vec![Movie { id: 1, title: "A".into(), release_date: None, genres: vec![] }],
            vec![Rating { user_id: 1, movie_id: 1, score: 3 }],
        )
        .unwrap();

        let rows = mean_age_by_occupation(&index).unwrap();
        assert_eq!(rows[0].std_dev, None);
        assert_eq!(rows[0].mean_age, 40.0);
    }

    #[test]
    fn test_genre_cohorts_rank_and_count_every_genre() {
        let rows =
            top_genres_by_occupation_age(&fixture(), &GenreConfig::default(), &Cancellation::new())
                .unwrap();

        // Students 20-25: Action 4.0 (2), Comedy 4.0 (2), Drama 4.0 (1)
        let cohort: Vec<_> = rows
            .iter()
            .filter(|r| r.occupation == "student" && r.age_group == AgeGroup::Age20To24)
            .map(|r| (r.genre, r.genre_rank, r.rating_count, r.total_users))
            .collect();
        assert_eq!(
            cohort,
            vec![
                (Genre::Action, 1, 2, 2),
                (Genre::Comedy, 2, 2, 2),
                (Genre::Drama, 3, 1, 2),
            ]
        );

        // The under-20 student only rated Drama
        let young: Vec<_> = rows.iter().filter(|r| r.age_group == AgeGroup::Under20).collect();
        assert_eq!(young.len(), 1);
        assert_eq!(young[0].avg_rating, 2.0);
        assert_eq!(young[0].total_users, 1);
    }

    #[test]
    fn test_genre_cohorts_apply_support_and_limit() {
        let config = GenreConfig { min_ratings: 2, top_k: 1 };
        let rows = top_genres_by_occupation_age(&fixture(), &config, &Cancellation::new()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].genre, Genre::Action);
        assert_eq!(rows[0].genre_rank, 1);
    }

    #[test]
    fn test_genre_cohorts_honour_cancellation() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let err = GenreCohortAggregator::default().compute(&fixture(), &cancel).unwrap_err();
        assert_eq!(err, ComputationError::Cancelled);
    }
}
