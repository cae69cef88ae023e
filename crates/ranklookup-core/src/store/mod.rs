//! Score store gateway.
//!
//! The cache needs four query shapes against a named high-scores table:
//! a row count, a distinct-user count, a full `(user_id, score)` scan and a
//! qualification lookup. Connection pooling, credentials and retries belong
//! to the implementation.

pub mod memory;
pub mod mysql;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One non-hidden score row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRow {
    /// Owner of the score.
    pub user_id: u32,
    /// Score value.
    pub score: u32,
}

/// Query shapes issued against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Non-distinct row count.
    Count,
    /// Distinct-user count.
    DistinctCount,
    /// Full score projection.
    Scan,
    /// Beatmap qualification state.
    Qualification,
}

impl QueryKind {
    /// Short name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::DistinctCount => "distinct_count",
            Self::Scan => "scan",
            Self::Qualification => "qualification",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store gateway consumed by the cache.
///
/// All counts and scans only consider non-hidden rows. `above` restricts a
/// count to rows with `score > above`.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Counts score rows for a beatmap.
    async fn count_scores(&self, table: &str, beatmap_id: u32, above: Option<u32>)
        -> Result<u64>;

    /// Counts distinct users with a score row for a beatmap.
    async fn count_distinct_users(
        &self,
        table: &str,
        beatmap_id: u32,
        above: Option<u32>,
    ) -> Result<u64>;

    /// Fetches every score row for a beatmap, in no particular order.
    async fn fetch_scores(&self, table: &str, beatmap_id: u32) -> Result<Vec<ScoreRow>>;

    /// Returns true if the beatmap is currently qualified.
    async fn is_qualified(&self, beatmap_id: u32) -> Result<bool>;
}

/// Returns true if `name` is safe to interpolate into SQL as a table name.
#[must_use]
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table_names() {
        assert!(is_valid_table_name("osu_scores_high"));
        assert!(is_valid_table_name("osu_beatmaps"));
        assert!(is_valid_table_name("T1"));
    }

    #[test]
    fn test_invalid_table_names() {
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("osu.scores"));
        assert!(!is_valid_table_name("scores; DROP TABLE users"));
        assert!(!is_valid_table_name("`quoted`"));
        assert!(!is_valid_table_name(&"a".repeat(65)));
    }

    #[test]
    fn test_query_kind_names() {
        assert_eq!(QueryKind::Count.to_string(), "count");
        assert_eq!(QueryKind::DistinctCount.to_string(), "distinct_count");
        assert_eq!(QueryKind::Scan.to_string(), "scan");
        assert_eq!(QueryKind::Qualification.to_string(), "qualification");
    }
}
