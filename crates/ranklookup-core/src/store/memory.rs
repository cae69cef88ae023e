//! In-process score store.
//!
//! Holds score rows in memory and counts every query it answers. Latency and
//! failures can be injected, which makes it the store used by the test suites
//! and by local runs without a database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{ScoreRow, ScoreStore};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
struct StoredScore {
    user_id: u32,
    score: u32,
    hidden: bool,
}

/// Number of queries answered, per shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCounts {
    /// Non-distinct counts.
    pub counts: u64,
    /// Distinct-user counts.
    pub distinct_counts: u64,
    /// Full scans.
    pub scans: u64,
    /// Qualification lookups.
    pub qualification_checks: u64,
}

/// In-memory [`ScoreStore`].
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    rows: RwLock<HashMap<(String, u32), Vec<StoredScore>>>,
    qualified: RwLock<HashSet<u32>>,
    scan_latency: RwLock<Duration>,
    failing: AtomicBool,
    counts: AtomicU64,
    distinct_counts: AtomicU64,
    scans: AtomicU64,
    qualification_checks: AtomicU64,
    scans_in_flight: AtomicUsize,
    max_scans_in_flight: AtomicUsize,
}

impl MemoryScoreStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a visible score row.
    pub fn insert_score(&self, table: &str, beatmap_id: u32, user_id: u32, score: u32) {
        self.push(table, beatmap_id, user_id, score, false);
    }

    /// Adds a hidden score row, ignored by every query.
    pub fn insert_hidden_score(&self, table: &str, beatmap_id: u32, user_id: u32, score: u32) {
        self.push(table, beatmap_id, user_id, score, true);
    }

    /// Adds one visible row per `(user_id, score)` pair.
    pub fn insert_scores<I>(&self, table: &str, beatmap_id: u32, scores: I)
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut rows = self.rows.write();
        let list = rows.entry((table.to_string(), beatmap_id)).or_default();
        list.extend(scores.into_iter().map(|(user_id, score)| StoredScore {
            user_id,
            score,
            hidden: false,
        }));
    }

    /// Removes every row of a user on a beatmap. Returns the number removed.
    pub fn remove_user(&self, table: &str, beatmap_id: u32, user_id: u32) -> usize {
        let mut rows = self.rows.write();
        let Some(list) = rows.get_mut(&(table.to_string(), beatmap_id)) else {
            return 0;
        };
        let before = list.len();
        list.retain(|row| row.user_id != user_id);
        before - list.len()
    }

    /// Marks a beatmap as qualified or not.
    pub fn set_qualified(&self, beatmap_id: u32, qualified: bool) {
        let mut set = self.qualified.write();
        if qualified {
            set.insert(beatmap_id);
        } else {
            set.remove(&beatmap_id);
        }
    }

    /// Delays every full scan by `latency`.
    pub fn set_scan_latency(&self, latency: Duration) {
        *self.scan_latency.write() = latency;
    }

    /// Makes every query fail while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Queries answered so far.
    #[must_use]
    pub fn query_counts(&self) -> QueryCounts {
        QueryCounts {
            counts: self.counts.load(Ordering::SeqCst),
            distinct_counts: self.distinct_counts.load(Ordering::SeqCst),
            scans: self.scans.load(Ordering::SeqCst),
            qualification_checks: self.qualification_checks.load(Ordering::SeqCst),
        }
    }

    /// Highest number of scans that were running at the same time.
    #[must_use]
    pub fn max_concurrent_scans(&self) -> usize {
        self.max_scans_in_flight.load(Ordering::SeqCst)
    }

    fn push(&self, table: &str, beatmap_id: u32, user_id: u32, score: u32, hidden: bool) {
        self.rows
            .write()
            .entry((table.to_string(), beatmap_id))
            .or_default()
            .push(StoredScore {
                user_id,
                score,
                hidden,
            });
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::Store("injected store failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn visible<T>(
        &self,
        table: &str,
        beatmap_id: u32,
        above: Option<u32>,
        f: impl FnOnce(&mut dyn Iterator<Item = &StoredScore>) -> T,
    ) -> T {
        let rows = self.rows.read();
        let list = rows
            .get(&(table.to_string(), beatmap_id))
            .map_or(&[][..], Vec::as_slice);
        let mut iter = list
            .iter()
            .filter(|row| !row.hidden && above.map_or(true, |min| row.score > min));
        f(&mut iter)
    }
}

/// Tracks one running scan for [`MemoryScoreStore::max_concurrent_scans`].
struct ScanGuard<'a> {
    store: &'a MemoryScoreStore,
}

impl<'a> ScanGuard<'a> {
    fn enter(store: &'a MemoryScoreStore) -> Self {
        let running = store.scans_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.max_scans_in_flight.fetch_max(running, Ordering::SeqCst);
        Self { store }
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.store.scans_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn count_scores(
        &self,
        table: &str,
        beatmap_id: u32,
        above: Option<u32>,
    ) -> Result<u64> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        Ok(self.visible(table, beatmap_id, above, |rows| rows.count() as u64))
    }

    async fn count_distinct_users(
        &self,
        table: &str,
        beatmap_id: u32,
        above: Option<u32>,
    ) -> Result<u64> {
        self.distinct_counts.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        Ok(self.visible(table, beatmap_id, above, |rows| {
            rows.map(|row| row.user_id).collect::<HashSet<_>>().len() as u64
        }))
    }

    async fn fetch_scores(&self, table: &str, beatmap_id: u32) -> Result<Vec<ScoreRow>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let _guard = ScanGuard::enter(self);

        let latency = *self.scan_latency.read();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.check_failing()?;

        Ok(self.visible(table, beatmap_id, None, |rows| {
            rows.map(|row| ScoreRow {
                user_id: row.user_id,
                score: row.score,
            })
            .collect::<Vec<_>>()
        }))
    }

    async fn is_qualified(&self, beatmap_id: u32) -> Result<bool> {
        self.qualification_checks.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        Ok(self.qualified.read().contains(&beatmap_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "osu_scores_high";

    #[tokio::test]
    async fn test_counts_ignore_hidden_rows() {
        let store = MemoryScoreStore::new();
        store.insert_score(TABLE, 1, 10, 100);
        store.insert_score(TABLE, 1, 10, 300);
        store.insert_score(TABLE, 1, 11, 200);
        store.insert_hidden_score(TABLE, 1, 12, 999);

        assert_eq!(store.count_scores(TABLE, 1, None).await.unwrap(), 3);
        assert_eq!(store.count_distinct_users(TABLE, 1, None).await.unwrap(), 2);
        assert_eq!(store.count_scores(TABLE, 1, Some(150)).await.unwrap(), 2);
        assert_eq!(store.count_distinct_users(TABLE, 1, Some(150)).await.unwrap(), 2);
        assert_eq!(store.count_distinct_users(TABLE, 1, Some(250)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tables_and_beatmaps_are_isolated() {
        let store = MemoryScoreStore::new();
        store.insert_score(TABLE, 1, 10, 100);
        store.insert_score("osu_scores_taiko_high", 1, 10, 100);
        store.insert_score(TABLE, 2, 10, 100);

        assert_eq!(store.count_scores(TABLE, 1, None).await.unwrap(), 1);
        assert_eq!(store.fetch_scores(TABLE, 3).await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn test_remove_user() {
        let store = MemoryScoreStore::new();
        store.insert_scores(TABLE, 1, [(10, 1), (10, 2), (11, 3)]);

        assert_eq!(store.remove_user(TABLE, 1, 10), 2);
        assert_eq!(store.count_scores(TABLE, 1, None).await.unwrap(), 1);
        assert_eq!(store.remove_user(TABLE, 9, 10), 0);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryScoreStore::new();
        store.set_failing(true);

        assert!(store.count_scores(TABLE, 1, None).await.is_err());
        assert!(store.fetch_scores(TABLE, 1).await.is_err());

        store.set_failing(false);
        assert!(store.is_qualified(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_query_counters() {
        let store = MemoryScoreStore::new();
        store.set_qualified(5, true);

        let _ = store.count_scores(TABLE, 5, None).await;
        let _ = store.count_distinct_users(TABLE, 5, None).await;
        let _ = store.fetch_scores(TABLE, 5).await;
        assert!(store.is_qualified(5).await.unwrap());

        assert_eq!(
            store.query_counts(),
            QueryCounts {
                counts: 1,
                distinct_counts: 1,
                scans: 1,
                qualification_checks: 1,
            }
        );
        assert_eq!(store.max_concurrent_scans(), 1);
    }
}
