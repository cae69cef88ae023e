//! # `RankLookup` Core
//!
//! Answers "what is this score's rank among all scores for this beatmap and
//! ruleset?" from memory, without querying the score store on every request.
//!
//! ## Components
//!
//! - [`RankedScoreSet`]: ascending best-per-user scores for one beatmap, with
//!   O(log n) rank queries.
//! - [`CacheEntry`]: owns one score set plus its population state machine
//!   (cold quick path, staleness-driven refresh, top-rank re-check).
//! - [`RefreshLimiter`]: process-wide permit pool bounding concurrent rebuilds.
//! - [`CacheCollection`]: size-bounded, idle-evicting map of entries for one
//!   ruleset.
//! - [`RankCaches`]: the four collections (osu, taiko, fruits, mania) built at
//!   startup.
//! - [`Metrics`]: hit/miss/population counters drained by a periodic report.
//! - [`ScoreStore`]: the store gateway seam, with a MySQL implementation and
//!   an in-memory one for tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ranklookup_core::{MySqlScoreStore, RankCaches, RankLookupConfig, Ruleset};
//!
//! let config = RankLookupConfig::load()?;
//! let store = Arc::new(MySqlScoreStore::connect(&config.store).await?);
//! let caches = RankCaches::new(&config, store)?;
//!
//! let result = caches.lookup(Ruleset::Osu, 75, 1_000_000).await?;
//! println!("{},{}", result.position, result.total);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::uninlined_format_args)]

pub mod caches;
pub mod collection;
pub mod config;
pub mod entry;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod ruleset;
pub mod score_set;
pub mod store;

pub use caches::RankCaches;
pub use collection::CacheCollection;
pub use config::{
    CacheConfig, ConfigError, MetricsConfig, RankLookupConfig, RefreshConfig, ServerConfig,
    StoreConfig,
};
pub use entry::{CacheEntry, EntryContext, LookupResult, PopulationOutcome};
pub use error::{Error, Result};
pub use limiter::RefreshLimiter;
pub use metrics::{Metrics, MetricsSnapshot};
pub use ruleset::Ruleset;
pub use score_set::RankedScoreSet;
pub use store::memory::{MemoryScoreStore, QueryCounts};
pub use store::mysql::MySqlScoreStore;
pub use store::{QueryKind, ScoreRow, ScoreStore};
