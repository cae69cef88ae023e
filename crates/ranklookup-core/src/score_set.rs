//! Ranked score set: the sorted best-per-user scores of one leaderboard.
//!
//! A set is built once from store rows and never mutated afterwards. Cache
//! entries publish a new set by swapping an `Arc`, so readers holding the old
//! snapshot finish against complete data.

use std::collections::HashMap;

use crate::store::ScoreRow;

/// Ascending scores, at most one per user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedScoreSet {
    scores: Vec<u32>,
}

impl RankedScoreSet {
    /// Builds a set from raw store rows.
    ///
    /// Each user contributes their highest score regardless of the order in
    /// which the store delivered the rows. The result is sorted ascending.
    #[must_use]
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = ScoreRow>,
    {
        let mut best: HashMap<u32, u32> = HashMap::new();
        for row in rows {
            best.entry(row.user_id)
                .and_modify(|score| *score = (*score).max(row.score))
                .or_insert(row.score);
        }

        let mut scores: Vec<u32> = best.into_values().collect();
        scores.sort_unstable();
        Self { scores }
    }

    /// Builds a set from already-deduplicated scores in any order.
    #[must_use]
    pub fn from_scores(mut scores: Vec<u32>) -> Self {
        scores.sort_unstable();
        Self { scores }
    }

    /// Number of scores strictly greater than `score`.
    ///
    /// 0 means nobody beats `score`. This is `len - lower_bound(score + 1)`;
    /// the lower bound is the first index whose value exceeds `score`, so the
    /// result is exact even when the set holds runs of equal values.
    #[must_use]
    pub fn rank(&self, score: u32) -> u64 {
        let first_above = self.scores.partition_point(|&s| s <= score);
        (self.scores.len() - first_above) as u64
    }

    /// Number of scores (users) in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns true if the set holds no scores.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The scores, ascending.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.scores
    }

    /// Highest score in the set.
    #[must_use]
    pub fn top(&self) -> Option<u32> {
        self.scores.last().copied()
    }
}
