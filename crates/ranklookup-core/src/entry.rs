//! Per-beatmap cache entry.
//!
//! An entry owns one [`RankedScoreSet`] and the state machine around it:
//!
//! ```text
//! Uninitialized ──► Populating ──► Populated ◄──► Populating (refresh)
//! ```
//!
//! Lookups never wait for a refresh of a populated entry. A cold entry serves
//! the quick path against the store until its first population lands.
//!
//! Repopulation is gated three times, in this order: a non-queueing check of
//! the global limiter, the per-entry guard (bounded wait), then a blocking
//! limiter permit held for the whole rebuild.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::limiter::RefreshLimiter;
use crate::metrics::Metrics;
use crate::score_set::RankedScoreSet;
use crate::store::ScoreStore;

/// Dependencies shared by every entry of one collection.
pub struct EntryContext {
    table: String,
    store: Arc<dyn ScoreStore>,
    limiter: Arc<RefreshLimiter>,
    metrics: Arc<Metrics>,
    config: CacheConfig,
}

impl EntryContext {
    /// Bundles the table name, store, shared limiter and metrics.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        store: Arc<dyn ScoreStore>,
        limiter: Arc<RefreshLimiter>,
        metrics: Arc<Metrics>,
        config: CacheConfig,
    ) -> Self {
        Self {
            table: table.into(),
            store,
            limiter,
            metrics,
            config,
        }
    }

    /// High-scores table queried by these entries.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Cache tuning.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
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

impl std::fmt::Debug for EntryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryContext")
            .field("table", &self.table)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Answer to a rank lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupResult {
    /// Number of users with a strictly greater score (0 is the top).
    pub position: u64,
    /// Number of ranked users, or scores when `accurate` is false.
    pub total: u64,
    /// False when both numbers come from non-distinct row counts.
    pub accurate: bool,
}

/// What a repopulation attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationOutcome {
    /// Full scan done, score set replaced.
    Rescanned,
    /// Row count barely moved; scan skipped, timestamps advanced.
    Unchanged,
    /// Limiter had no spare permit.
    Saturated,
    /// Another rebuild of this entry holds the guard.
    Busy,
    /// Store error; cached state untouched.
    Failed,
}

impl PopulationOutcome {
    /// True for outcomes that count as a successful population.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Rescanned | Self::Unchanged)
    }
}

/// Published to cold lookups waiting on the first population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Progress {
    populated: bool,
    /// Background refresh tasks that have ended, whatever their outcome.
    finished_tasks: u64,
}

#[derive(Debug, Default)]
struct PopulationState {
    last_population: Option<Instant>,
    /// Non-distinct row count at the last full rescan.
    scanned_rows: u64,
    qualified: bool,
}

/// Cached ranking for one beatmap of one ruleset.
pub struct CacheEntry {
    beatmap_id: u32,
    ctx: Arc<EntryContext>,
    scores: ArcSwapOption<RankedScoreSet>,
    state: RwLock<PopulationState>,
    requests_since_population: AtomicU64,
    progress: watch::Sender<Progress>,
    refresh_guard: Mutex<()>,
    refresh_queued: AtomicBool,
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("beatmap_id", &self.beatmap_id)
            .field("table", &self.ctx.table)
            .field("populated", &self.is_populated())
            .finish_non_exhaustive()
    }
}

/// Clears the queued flag and wakes cold waiters when the background task
/// ends, even on panic.
struct QueuedGuard<'a>(&'a CacheEntry);

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.refresh_queued.store(false, Ordering::Release);
        self.0
            .progress
            .send_modify(|progress| progress.finished_tasks += 1);
    }
}

impl CacheEntry {
    /// Creates an uninitialized entry.
    #[must_use]
    pub fn new(beatmap_id: u32, ctx: Arc<EntryContext>) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            beatmap_id,
            ctx,
            scores: ArcSwapOption::empty(),
            state: RwLock::new(PopulationState::default()),
            requests_since_population: AtomicU64::new(0),
            progress,
            refresh_guard: Mutex::new(()),
            refresh_queued: AtomicBool::new(false),
        }
    }

    /// Beatmap this entry ranks.
    #[must_use]
    pub fn beatmap_id(&self) -> u32 {
        self.beatmap_id
    }

    /// True once a population has completed.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.progress.borrow().populated
    }

    /// Current score set, if populated.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<RankedScoreSet>> {
        self.scores.load_full()
    }

    /// When the last successful population finished.
    #[must_use]
    pub fn last_population(&self) -> Option<Instant> {
        self.state.read().last_population
    }

    /// Lookups since the last successful population.
    #[must_use]
    pub fn requests_since_population(&self) -> u64 {
        self.requests_since_population.load(Ordering::Relaxed)
    }

    /// True when a background refresh task is queued or running.
    #[must_use]
    pub fn refresh_pending(&self) -> bool {
        self.refresh_queued.load(Ordering::Acquire)
    }

    /// Ranks `score` against this beatmap.
    ///
    /// Store errors from the quick path or the top-rank re-check are
    /// returned; background refresh failures never are.
    pub async fn lookup(self: &Arc<Self>, score: u32) -> Result<LookupResult> {
        self.requests_since_population
            .fetch_add(1, Ordering::Relaxed);

        if !self.is_populated() && self.ctx.limiter.has_capacity() {
            let rx = self.progress.subscribe();
            let finished_before = rx.borrow().finished_tasks;
            if self.queue_refresh() || self.refresh_pending() {
                self.wait_for_population(rx, finished_before).await;
            }
        }

        let Some(snapshot) = self.scores.load_full() else {
            return self.quick_lookup(score).await;
        };

        let total = snapshot.len() as u64;
        if self.refresh_due(total) {
            self.queue_refresh();
        }

        self.ctx.metrics.record_hit();
        let mut position = snapshot.rank(score);

        if position < self.ctx.config.top_rank_recheck_below {
            position = self
                .ctx
                .store
                .count_distinct_users(&self.ctx.table, self.beatmap_id, Some(score))
                .await?;
        }

        Ok(LookupResult {
            position,
            total,
            accurate: true,
        })
    }

    /// Waits up to the first-population timeout. The population task keeps
    /// running if the wait expires.
    ///
    /// Returns early, unpopulated, once a refresh task that was pending at
    /// subscription ends without populating (saturated, busy or failed).
    async fn wait_for_population(
        &self,
        mut rx: watch::Receiver<Progress>,
        finished_before: u64,
    ) -> bool {
        let wait = async move {
            loop {
                let progress = *rx.borrow_and_update();
                if progress.populated {
                    return true;
                }
                if progress.finished_tasks > finished_before {
                    return false;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        timeout(self.ctx.config.first_population_wait(), wait)
            .await
            .unwrap_or(false)
    }

    /// Answers straight from the store while the entry is cold.
    async fn quick_lookup(&self, score: u32) -> Result<LookupResult> {
        let store = &self.ctx.store;
        let table = self.ctx.table.as_str();
        let beatmap_id = self.beatmap_id;

        let rows = store.count_scores(table, beatmap_id, None).await?;
        let result = if rows < self.ctx.config.quick_path_distinct_threshold {
            LookupResult {
                position: store
                    .count_distinct_users(table, beatmap_id, Some(score))
                    .await?,
                total: store.count_distinct_users(table, beatmap_id, None).await?,
                accurate: true,
            }
        } else {
            LookupResult {
                position: store.count_scores(table, beatmap_id, Some(score)).await?,
                total: rows,
                accurate: false,
            }
        };

        self.ctx.metrics.record_miss();
        debug!(
            table,
            beatmap_id,
            position = result.position,
            total = result.total,
            accurate = result.accurate,
            "quick lookup"
        );
        Ok(result)
    }

    /// Staleness check for a populated entry holding `len` scores.
    fn refresh_due(&self, len: u64) -> bool {
        let state = self.state.read();
        let Some(last) = state.last_population else {
            return false;
        };
        let elapsed = last.elapsed();
        let config = &self.ctx.config;

        if state.qualified && elapsed > config.qualified_refresh() {
            return true;
        }

        elapsed > Duration::from_secs(len)
            && (len < config.small_set_threshold
                || self.requests_since_population() >= config.min_requests_before_refresh)
    }

    /// Spawns a background repopulation unless one is already queued or the
    /// limiter is saturated. Returns true if a task was spawned.
    fn queue_refresh(self: &Arc<Self>) -> bool {
        if !self.ctx.limiter.has_capacity() {
            return false;
        }
        if self
            .refresh_queued
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let entry = Arc::clone(self);
        tokio::spawn(async move {
            let _queued = QueuedGuard(&entry);
            entry.repopulate().await;
        });
        true
    }

    /// Rebuilds the score set if the gates allow it.
    pub async fn repopulate(&self) -> PopulationOutcome {
        if !self.ctx.limiter.has_capacity() {
            debug!(beatmap_id = self.beatmap_id, "refresh skipped, limiter saturated");
            return PopulationOutcome::Saturated;
        }

        let Ok(_guard) = timeout(
            self.ctx.config.single_flight_wait(),
            self.refresh_guard.lock(),
        )
        .await
        else {
            return PopulationOutcome::Busy;
        };

        let _permit = match self.ctx.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(beatmap_id = self.beatmap_id, error = %e, "refresh limiter unavailable");
                return PopulationOutcome::Failed;
            }
        };

        match self.rebuild().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    table = %self.ctx.table,
                    beatmap_id = self.beatmap_id,
                    error = %e,
                    "repopulation failed, keeping cached scores"
                );
                PopulationOutcome::Failed
            }
        }
    }

    async fn rebuild(&self) -> Result<PopulationOutcome> {
        let store = &self.ctx.store;
        let table = self.ctx.table.as_str();
        let beatmap_id = self.beatmap_id;
        let started = Instant::now();

        let rows = store.count_scores(table, beatmap_id, None).await?;
        let qualified = store.is_qualified(beatmap_id).await?;

        let (previous, last) = {
            let state = self.state.read();
            (state.scanned_rows, state.last_population)
        };
        let unchanged = last.is_some()
            && rows >= previous
            && rows - previous < self.ctx.config.rescan_delta_threshold;

        let outcome = if unchanged {
            debug!(table, beatmap_id, rows, "row count unchanged, skipping rescan");
            PopulationOutcome::Unchanged
        } else {
            match last {
                Some(at) => info!(
                    table,
                    beatmap_id,
                    minutes = at.elapsed().as_secs() / 60,
                    "repopulating"
                ),
                None => info!(table, beatmap_id, "populating"),
            }

            let set = RankedScoreSet::from_rows(store.fetch_scores(table, beatmap_id).await?);
            info!(
                table,
                beatmap_id,
                scores = set.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "populated"
            );
            self.scores.store(Some(Arc::new(set)));
            PopulationOutcome::Rescanned
        };

        {
            let mut state = self.state.write();
            state.last_population = Some(Instant::now());
            state.qualified = qualified;
            if outcome == PopulationOutcome::Rescanned {
                state.scanned_rows = rows;
            }
        }
        self.requests_since_population.store(0, Ordering::Relaxed);
        self.ctx.metrics.record_population();
        self.progress.send_modify(|progress| progress.populated = true);

        Ok(outcome)
    }
}
