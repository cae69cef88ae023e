//! Per-ruleset collection of cache entries.
//!
//! Entries live in a `moka` cache bounded by entry count, with sliding idle
//! expiry. Creation goes through `get_with`, so concurrent first lookups of
//! one beatmap share a single entry.

use std::sync::Arc;

use moka::sync::Cache;

use crate::entry::{CacheEntry, EntryContext, LookupResult};
use crate::error::Result;
use crate::ruleset::Ruleset;

/// Cache entries for every beatmap of one ruleset.
pub struct CacheCollection {
    ruleset: Ruleset,
    ctx: Arc<EntryContext>,
    entries: Cache<u32, Arc<CacheEntry>>,
}

impl std::fmt::Debug for CacheCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCollection")
            .field("ruleset", &self.ruleset)
            .field("table", &self.ctx.table())
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl CacheCollection {
    /// Creates an empty collection. Bounds come from `ctx.config()`.
    #[must_use]
    pub fn new(ruleset: Ruleset, ctx: Arc<EntryContext>) -> Self {
        let entries = Cache::builder()
            .name(ruleset.name())
            .max_capacity(ctx.config().max_entries_per_ruleset)
            .time_to_idle(ctx.config().idle_ttl())
            .build();
        Self {
            ruleset,
            ctx,
            entries,
        }
    }

    /// Ruleset served by this collection.
    #[must_use]
    pub fn ruleset(&self) -> Ruleset {
        self.ruleset
    }

    /// Score table backing this collection.
    #[must_use]
    pub fn table(&self) -> &str {
        self.ctx.table()
    }

    /// Returns the entry for `beatmap_id`, creating it on first access.
    #[must_use]
    pub fn get_or_create(&self, beatmap_id: u32) -> Arc<CacheEntry> {
        self.entries.get_with(beatmap_id, || {
            Arc::new(CacheEntry::new(beatmap_id, Arc::clone(&self.ctx)))
        })
    }

    /// Resident entry for `beatmap_id`, without creating one.
    #[must_use]
    pub fn get(&self, beatmap_id: u32) -> Option<Arc<CacheEntry>> {
        self.entries.get(&beatmap_id)
    }

    /// Ranks `score` on `beatmap_id`.
    pub async fn lookup(&self, beatmap_id: u32, score: u32) -> Result<LookupResult> {
        self.get_or_create(beatmap_id).lookup(score).await
    }

    /// Drops the entry for `beatmap_id`. The next lookup starts cold.
    ///
    /// Returns true if an entry was resident.
    pub fn invalidate(&self, beatmap_id: u32) -> bool {
        self.entries.remove(&beatmap_id).is_some()
    }

    /// Approximate number of resident entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Applies pending evictions so [`Self::entry_count`] is exact.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::limiter::RefreshLimiter;
    use crate::metrics::Metrics;
    use crate::store::memory::MemoryScoreStore;
    use crate::store::ScoreStore;
    use std::time::Duration;

    const TABLE: &str = "osu_scores_taiko_high";

    fn collection(config: CacheConfig) -> (Arc<MemoryScoreStore>, CacheCollection) {
        let store = Arc::new(MemoryScoreStore::new());
        let gateway: Arc<dyn ScoreStore> = store.clone();
        let ctx = Arc::new(EntryContext::new(
            TABLE,
            gateway,
            Arc::new(RefreshLimiter::new(4)),
            Arc::new(Metrics::new(Duration::from_secs(10))),
            config,
        ));
        (store, CacheCollection::new(Ruleset::Taiko, ctx))
    }

    #[test]
    fn test_get_or_create_returns_same_entry() {
        let (_, collection) = collection(CacheConfig::default());

        let first = collection.get_or_create(1);
        let second = collection.get_or_create(1);
        let other = collection.get_or_create(2);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.beatmap_id(), 1);
        collection.run_pending_tasks();
        assert_eq!(collection.entry_count(), 2);
    }

    #[test]
    fn test_concurrent_first_access_creates_one_entry() {
        let (_, collection) = collection(CacheConfig::default());
        let collection = Arc::new(collection);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let collection = Arc::clone(&collection);
                std::thread::spawn(move || collection.get_or_create(42))
            })
            .collect();
        let entries: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();

        assert!(entries.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_lookup_uses_collection_table() {
        let (store, collection) = collection(CacheConfig::default());
        store.insert_scores(TABLE, 9, (1..=10).map(|i| (i, i * 100)));
        store.insert_score("osu_scores_high", 9, 99, 5000);

        let result = collection.lookup(9, 550).await.expect("lookup");

        assert_eq!(result.position, 5);
        assert_eq!(result.total, 10);
        assert_eq!(collection.table(), TABLE);
        assert_eq!(collection.ruleset(), Ruleset::Taiko);
    }

    #[tokio::test]
    async fn test_invalidate_drops_entry() {
        let (store, collection) = collection(CacheConfig::default());
        store.insert_scores(TABLE, 9, (1..=10).map(|i| (i, i)));
        collection.lookup(9, 5).await.expect("lookup");
        let before = collection.get(9).expect("resident");
        assert!(before.is_populated());

        assert!(collection.invalidate(9));
        assert!(!collection.invalidate(9));
        assert!(collection.get(9).is_none());

        let after = collection.get_or_create(9);
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!after.is_populated());
    }

    #[test]
    fn test_capacity_bound_evicts() {
        let config = CacheConfig {
            max_entries_per_ruleset: 16,
            ..CacheConfig::default()
        };
        let (_, collection) = collection(config);

        for beatmap_id in 0..200 {
            let _ = collection.get_or_create(beatmap_id);
        }
        collection.run_pending_tasks();

        assert!(collection.entry_count() <= 16);
    }

    #[test]
    fn test_idle_entries_expire_after_ttl() {
        let config = CacheConfig {
            idle_ttl_secs: 1,
            ..CacheConfig::default()
        };
        let (_, collection) = collection(config);

        let kept = collection.get_or_create(1);
        let _ = collection.get_or_create(2);

        // Reads slide the idle deadline of beatmap 1 only.
        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(400));
            assert!(collection.get(1).is_some());
        }
        collection.run_pending_tasks();

        let resident = collection.get(1).expect("touched entry stays resident");
        assert!(Arc::ptr_eq(&kept, &resident));
        assert!(collection.get(2).is_none());
        assert_eq!(collection.entry_count(), 1);
    }
}
