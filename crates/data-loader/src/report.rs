//! Load accounting.
//!
//! Every row the loader excludes is counted here under the reason it was
//! excluded, so dropped data is visible in the run logs and summary.

use serde::{Deserialize, Serialize};

use crate::error::DataLoadError;

/// How many rejection reasons are kept verbatim for logging
pub const MAX_REJECTION_SAMPLES: usize = 10;

/// Row accounting for one relation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationReport {
    /// Rows presented to the loader
    pub read: usize,
    /// Rows kept in the index
    pub accepted: usize,
    /// Rows that failed type coercion or range checks
    pub rejected: usize,
    /// Rows whose key was already taken (first occurrence wins)
    pub duplicates: usize,
    /// Ratings referencing a user or movie that was not loaded
    pub unresolved: usize,
}

impl RelationReport {
    pub fn dropped(&self) -> usize {
        self.rejected + self.duplicates + self.unresolved
    }
}

/// Outcome of building a `DataIndex`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub users: RelationReport,
    pub movies: RelationReport,
    pub ratings: RelationReport,
    /// First few rejection reasons, for logs
    pub samples: Vec<String>,
}

impl LoadReport {
    /// Total rows excluded across all relations
    pub fn dropped(&self) -> usize {
        self.users.dropped() + self.movies.dropped() + self.ratings.dropped()
    }

    pub(crate) fn sample(&mut self, err: &DataLoadError) {
        if self.samples.len() < MAX_REJECTION_SAMPLES {
            self.samples.push(err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_sums_every_reason() {
        let report = LoadReport {
            users: RelationReport { read: 5, accepted: 3, rejected: 1, duplicates: 1, unresolved: 0 },
            movies: RelationReport::default(),
            ratings: RelationReport { read: 9, accepted: 5, rejected: 1, duplicates: 1, unresolved: 2 },
            samples: vec![],
        };
        assert_eq!(report.dropped(), 6);
    }

    #[test]
    fn test_samples_are_bounded() {
        let mut report = LoadReport::default();
        for id in 0..(MAX_REJECTION_SAMPLES as u32 + 5) {
            report.sample(&DataLoadError::MissingReference { entity: "User".to_string(), id });
        }
        assert_eq!(report.samples.len(), MAX_REJECTION_SAMPLES);
    }
}
