//! Similarity Engine: item-item Pearson correlation over co-raters.
//!
//! ## Algorithm
//! 1. Split the per-user sparse rating vectors into chunks
//! 2. For every user, walk each pair of movies they rated (lo < hi) and add
//!    the two scores to that pair's running sums
//! 3. Merge the per-chunk maps (rayon fold/reduce)
//! 4. Keep pairs with enough co-raters and a defined correlation
//! 5. Emit both directions, rank per target movie and keep the top K
//!
//! No dense user-item or item-item matrix is ever built; memory grows with
//! the number of co-rated pairs.

use crate::cancel::Cancellation;
use crate::config::SimilarityConfig;
use crate::error::{ComputationError, ensure_finite};
use crate::ranking::{descending, rank_partitions};
use crate::traits::Aggregator;
use crate::views::{SimilarMovieRow, ViewKind, ViewRows};
use data_loader::{DataIndex, MovieId, Score};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument};

/// Users folded by one rayon task between cancellation checks
const USER_CHUNK: usize = 32;

/// Running sums for the Pearson correlation of one movie pair.
///
/// `x` is the score for the lower movie id, `y` for the higher one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairAccumulator {
    n: u32,
    sum_x: u64,
    sum_y: u64,
    sum_xx: u64,
    sum_yy: u64,
    sum_xy: u64,
}

impl PairAccumulator {
    pub fn push(&mut self, x: Score, y: Score) {
        let (x, y) = (u64::from(x), u64::from(y));
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_yy += y * y;
        self.sum_xy += x * y;
    }

    pub fn merge(&mut self, other: &PairAccumulator) {
        self.n += other.n;
        self.sum_x += other.sum_x;
        self.sum_y += other.sum_y;
        self.sum_xx += other.sum_xx;
        self.sum_yy += other.sum_yy;
        self.sum_xy += other.sum_xy;
    }

    /// Number of users who rated both movies
    pub fn cooccurrence(&self) -> u32 {
        self.n
    }

    /// Pearson correlation, clamped to [-1, 1].
    ///
    /// `None` with fewer than two co-raters or when either movie received
    /// the same score from every co-rater.
    pub fn correlation(&self) -> Option<f64> {
        if self.n < 2 {
            return None;
        }
        let n = i128::from(self.n);
        let (sx, sy) = (i128::from(self.sum_x), i128::from(self.sum_y));
        let covariance = n * i128::from(self.sum_xy) - sx * sy;
        let var_x = n * i128::from(self.sum_xx) - sx * sx;
        let var_y = n * i128::from(self.sum_yy) - sy * sy;
        if var_x <= 0 || var_y <= 0 {
            return None;
        }
        let r = covariance as f64 / ((var_x as f64) * (var_y as f64)).sqrt();
        Some(r.clamp(-1.0, 1.0))
    }
}

/// Accumulated statistics for one unordered movie pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStatistics {
    pub lo: MovieId,
    pub hi: MovieId,
    pub cooccurrence: u32,
    pub correlation: Option<f64>,
}

struct Neighbour {
    target: MovieId,
    other: MovieId,
    score: f64,
    cooccurrence: u32,
    correlation: f64,
}

/// Computes the similar movies view
#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
}

impl SimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    /// Restrict targets to the given movies (default: every movie)
    pub fn with_targets(mut self, targets: Vec<MovieId>) -> Self {
        self.config.targets = targets;
        self
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Fold every user's rating vector into per-pair running sums.
    ///
    /// When targets are configured only pairs touching a target are kept.
    pub fn accumulate_pairs(
        &self,
        index: &DataIndex,
        cancel: &Cancellation,
    ) -> Result<HashMap<(MovieId, MovieId), PairAccumulator>, ComputationError> {
        let targets = self.target_set();
        let vectors: Vec<&[(MovieId, Score)]> = index.rating_vectors().map(|(_, v)| v).collect();

        vectors
            .par_chunks(USER_CHUNK)
            .map(|chunk| -> Result<_, ComputationError> {
                cancel.check()?;
                let mut local: HashMap<(MovieId, MovieId), PairAccumulator> = HashMap::new();
                for ratings in chunk {
                    for (i, &(lo, x)) in ratings.iter().enumerate() {
                        for &(hi, y) in &ratings[i + 1..] {
                            if let Some(targets) = &targets
                                && !targets.contains(&lo)
                                && !targets.contains(&hi)
                            {
                                continue;
                            }
                            local.entry((lo, hi)).or_default().push(x, y);
                        }
                    }
                }
                Ok(local)
            })
            .try_reduce(HashMap::new, |mut acc, mut local| {
                if acc.len() < local.len() {
                    std::mem::swap(&mut acc, &mut local);
                }
                for (pair, sums) in local {
                    acc.entry(pair).or_default().merge(&sums);
                }
                Ok(acc)
            })
    }

    /// Statistics for every co-rated pair, sorted by (lo, hi)
    pub fn pair_statistics(
        &self,
        index: &DataIndex,
        cancel: &Cancellation,
    ) -> Result<Vec<PairStatistics>, ComputationError> {
        let mut pairs: Vec<PairStatistics> = self
            .accumulate_pairs(index, cancel)?
            .into_iter()
            .map(|((lo, hi), sums)| PairStatistics {
                lo,
                hi,
                cooccurrence: sums.cooccurrence(),
                correlation: sums.correlation(),
            })
            .collect();
        pairs.sort_unstable_by_key(|p| (p.lo, p.hi));
        Ok(pairs)
    }

    /// Top similar movies for every target movie
    #[instrument(
        skip(self, index, cancel),
        fields(
            min_cooccurrence = self.config.min_cooccurrence,
            min_score = self.config.min_score
        )
    )]
    pub fn similar_movies(
        &self,
        index: &DataIndex,
        cancel: &Cancellation,
    ) -> Result<Vec<SimilarMovieRow>, ComputationError> {
        let pairs = self.accumulate_pairs(index, cancel)?;
        debug!("Accumulated {} co-rated movie pairs", pairs.len());
        cancel.check()?;

        let targets = self.target_set();
        let is_target = |movie: MovieId| targets.as_ref().is_none_or(|t| t.contains(&movie));

        let mut neighbours = Vec::new();
        let mut undefined = 0usize;
        for (&(lo, hi), sums) in &pairs {
            if sums.cooccurrence() < self.config.min_cooccurrence {
                continue;
            }
            let Some(correlation) = sums.correlation() else {
                undefined += 1;
                continue;
            };
            let score = ensure_finite(
                ViewKind::SimilarMovies,
                "similarity_score",
                self.config.scoring.apply(correlation),
            )?;
            if score < self.config.min_score {
                continue;
            }
            for (target, other) in [(lo, hi), (hi, lo)] {
                if is_target(target) {
                    neighbours.push(Neighbour {
                        target,
                        other,
                        score,
                        cooccurrence: sums.cooccurrence(),
                        correlation,
                    });
                }
            }
        }
        if undefined > 0 {
            debug!("Skipped {} pairs with undefined correlation", undefined);
        }

        let ranked = rank_partitions(
            neighbours,
            |n| n.target,
            |a, b| {
                descending(a.score, b.score)
                    .then(b.cooccurrence.cmp(&a.cooccurrence))
                    .then(a.other.cmp(&b.other))
            },
            Some(self.config.top_k),
        );

        let rows = ranked
            .into_iter()
            .map(|ranked| {
                let n = ranked.row;
                let movie = index.get_movie(n.other).ok_or_else(|| ComputationError::Internal {
                    view: ViewKind::SimilarMovies,
                    reason: format!("co-rated movie {} is not indexed", n.other),
                })?;
                Ok(SimilarMovieRow {
                    target_movie: n.target,
                    similar_movie_id: n.other,
                    similar_movie_title: movie.title.clone(),
                    similarity_score: n.score,
                    cooccurrence_count: n.cooccurrence,
                    correlation: n.correlation,
                    similarity_rank: ranked.rank,
                    release_date: movie.release_date.clone(),
                })
            })
            .collect::<Result<Vec<_>, ComputationError>>()?;

        info!("Similar movies: {} rows from {} pairs", rows.len(), pairs.len());
        Ok(rows)
    }

    /// Neighbours of a single movie, using the same thresholds
    pub fn neighbours_of(
        &self,
        index: &DataIndex,
        movie_id: MovieId,
        cancel: &Cancellation,
    ) -> Result<Vec<SimilarMovieRow>, ComputationError> {
        self.clone()
            .with_targets(vec![movie_id])
            .similar_movies(index, cancel)
    }

    fn target_set(&self) -> Option<HashSet<MovieId>> {
        (!self.config.targets.is_empty()).then(|| self.config.targets.iter().copied().collect())
    }
}

impl Aggregator for SimilarityEngine {
    fn view(&self) -> ViewKind {
        ViewKind::SimilarMovies
    }

    fn compute(&self, index: &DataIndex, cancel: &Cancellation) -> Result<ViewRows, ComputationError> {
        self.similar_movies(index, cancel).map(ViewRows::SimilarMovies)
    }
}
