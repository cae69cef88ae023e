//! The four ruleset collections built at startup.

use std::sync::Arc;

use tracing::info;

use crate::collection::CacheCollection;
use crate::config::RankLookupConfig;
use crate::entry::{EntryContext, LookupResult};
use crate::error::Result;
use crate::limiter::RefreshLimiter;
use crate::metrics::Metrics;
use crate::ruleset::Ruleset;
use crate::store::ScoreStore;

/// One [`CacheCollection`] per ruleset, sharing a limiter and metrics.
#[derive(Debug)]
pub struct RankCaches {
    collections: [CacheCollection; 4],
    limiter: Arc<RefreshLimiter>,
    metrics: Arc<Metrics>,
}

impl RankCaches {
    /// Validates `config` and builds the collections over `store`.
    pub fn new(config: &RankLookupConfig, store: Arc<dyn ScoreStore>) -> Result<Self> {
        config.validate()?;

        let limiter = Arc::new(RefreshLimiter::new(
            config.refresh.max_concurrent_populations,
        ));
        let metrics = Arc::new(Metrics::new(config.metrics.report_interval()));

        let collections = Ruleset::ALL.map(|ruleset| {
            let ctx = EntryContext::new(
                config.store.score_table(ruleset),
                Arc::clone(&store),
                Arc::clone(&limiter),
                Arc::clone(&metrics),
                config.cache.clone(),
            );
            CacheCollection::new(ruleset, Arc::new(ctx))
        });

        info!(
            max_entries = config.cache.max_entries_per_ruleset,
            max_concurrent_populations = limiter.capacity(),
            "rank caches ready"
        );

        Ok(Self {
            collections,
            limiter,
            metrics,
        })
    }

    /// Collection for `ruleset`.
    #[must_use]
    pub fn collection(&self, ruleset: Ruleset) -> &CacheCollection {
        &self.collections[ruleset.index()]
    }

    /// All collections in ruleset order.
    #[must_use]
    pub fn collections(&self) -> &[CacheCollection] {
        &self.collections
    }

    /// Ranks `score` on a beatmap and runs the periodic metrics check.
    pub async fn lookup(
        &self,
        ruleset: Ruleset,
        beatmap_id: u32,
        score: u32,
    ) -> Result<LookupResult> {
        let result = self.collection(ruleset).lookup(beatmap_id, score).await;
        self.metrics.maybe_report(|| self.total_entries());
        result
    }

    /// Resident entries across all rulesets.
    #[must_use]
    pub fn total_entries(&self) -> u64 {
        self.collections.iter().map(CacheCollection::entry_count).sum()
    }

    /// Shared refresh limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RefreshLimiter> {
        &self.limiter
    }

    /// Shared counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
