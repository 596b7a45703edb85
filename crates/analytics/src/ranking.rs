//! Partitioned top-K selection with dense ranks.
//!
//! Shared by every view that reports a "rank within group": rows are split
//! by a partition key, ordered by a comparator and numbered 1, 2, 3...
//! Rows that compare `Equal` share a rank and the next distinct row gets the
//! following integer, so ranks never have gaps.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A row together with its dense rank inside its partition
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub rank: u32,
    pub row: T,
}

/// Rank rows within partitions and keep at most `limit` per partition.
///
/// Partitions are emitted in ascending key order, rows in rank order. The
/// comparator should be total (break ties on a unique key) for the output to
/// be deterministic.
pub fn rank_partitions<T, K, P, C>(
    rows: impl IntoIterator<Item = T>,
    partition_key: P,
    compare: C,
    limit: Option<usize>,
) -> Vec<Ranked<T>>
where
    K: Ord,
    P: Fn(&T) -> K,
    C: Fn(&T, &T) -> Ordering,
{
    let mut partitions: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for row in rows {
        partitions.entry(partition_key(&row)).or_default().push(row);
    }

    let mut ranked = Vec::new();
    for (_, mut members) in partitions {
        members.sort_by(&compare);

        let start = ranked.len();
        let mut rank = 0;
        for row in members {
            if limit.is_some_and(|limit| ranked.len() - start >= limit) {
                break;
            }
            let ties_previous = ranked.len() > start
                && ranked
                    .last()
                    .is_some_and(|prev: &Ranked<T>| compare(&prev.row, &row) == Ordering::Equal);
            if !ties_previous {
                rank += 1;
            }
            ranked.push(Ranked { rank, row });
        }
    }
    ranked
}

/// Descending order for finite floats
pub fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
