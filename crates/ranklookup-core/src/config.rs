//! `RankLookup` Configuration Module
//!
//! Provides configuration file support via `ranklookup.toml`, environment
//! variables and defaults.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`RANKLOOKUP_*`, `__` separates sections,
//!    e.g. `RANKLOOKUP_CACHE__IDLE_TTL_SECS=3600`)
//! 2. Configuration file (`ranklookup.toml`)
//! 3. Default values
//!
//! The legacy `DB_HOST` / `DB_USER` variables are honoured when `store.url`
//! was left at its default.

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ruleset::Ruleset;
use crate::store::is_valid_table_name;

/// Default store URL when nothing else is configured.
pub const DEFAULT_STORE_URL: &str = "mysql://root@localhost/osu";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Cache entry and collection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum resident entries per ruleset.
    pub max_entries_per_ruleset: u64,
    /// Entries unused for this long are evicted.
    pub idle_ttl_secs: u64,
    /// How long a cold lookup waits for the first population.
    pub first_population_wait_ms: u64,
    /// How long a repopulation waits for the per-entry guard.
    pub single_flight_wait_ms: u64,
    /// Below this row count the quick path counts distinct users.
    pub quick_path_distinct_threshold: u64,
    /// Cached positions below this are re-checked against the store.
    pub top_rank_recheck_below: u64,
    /// Staleness tolerance for qualified beatmaps.
    pub qualified_refresh_secs: u64,
    /// Sets smaller than this refresh without waiting for demand.
    pub small_set_threshold: u64,
    /// Lookups needed before a large set may refresh.
    pub min_requests_before_refresh: u64,
    /// Row count growth below this skips the full rescan.
    pub rescan_delta_threshold: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries_per_ruleset: 192_000,
            idle_ttl_secs: 86_400,
            first_population_wait_ms: 1_000,
            single_flight_wait_ms: 100,
            quick_path_distinct_threshold: 2_000,
            top_rank_recheck_below: 500,
            qualified_refresh_secs: 60,
            small_set_threshold: 1_000,
            min_requests_before_refresh: 5,
            rescan_delta_threshold: 10,
        }
    }
}

impl CacheConfig {
    /// Idle time after which an entry is evicted.
    #[must_use]
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    /// Bounded wait for the first population of a cold entry.
    #[must_use]
    pub fn first_population_wait(&self) -> Duration {
        Duration::from_millis(self.first_population_wait_ms)
    }

    /// Bounded wait for the per-entry single-flight guard.
    #[must_use]
    pub fn single_flight_wait(&self) -> Duration {
        Duration::from_millis(self.single_flight_wait_ms)
    }

    /// Staleness tolerance for qualified beatmaps.
    #[must_use]
    pub fn qualified_refresh(&self) -> Duration {
        Duration::from_secs(self.qualified_refresh_secs)
    }
}

/// Global refresh limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Maximum concurrently running full rebuilds across all rulesets.
    pub max_concurrent_populations: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_concurrent_populations: 10,
        }
    }
}

/// Metrics reporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Minimum seconds between two reports.
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 10,
        }
    }
}

impl MetricsConfig {
    /// Minimum time between two reports.
    #[must_use]
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }
}

/// Score store configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection URL.
    pub url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Deadline for count and qualification queries.
    pub point_query_timeout_secs: u64,
    /// Deadline for full score scans.
    pub scan_timeout_secs: u64,
    /// Table holding beatmap metadata (qualification state).
    pub beatmaps_table: String,
    /// High-score tables, one per ruleset in id order.
    pub score_tables: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STORE_URL.to_string(),
            max_connections: 100,
            point_query_timeout_secs: 10,
            scan_timeout_secs: 600,
            beatmaps_table: "osu_beatmaps".to_string(),
            score_tables: vec![
                "osu_scores_high".to_string(),
                "osu_scores_taiko_high".to_string(),
                "osu_scores_fruits_high".to_string(),
                "osu_scores_mania_high".to_string(),
            ],
        }
    }
}

impl StoreConfig {
    /// Deadline for point queries.
    #[must_use]
    pub fn point_query_timeout(&self) -> Duration {
        Duration::from_secs(self.point_query_timeout_secs)
    }

    /// Deadline for full scans.
    #[must_use]
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Table name for a ruleset.
    ///
    /// Only meaningful on a validated configuration.
    #[must_use]
    pub fn score_table(&self, ruleset: Ruleset) -> &str {
        self.score_tables
            .get(ruleset.index())
            .map_or("", String::as_str)
    }

    /// Derives `url` from the legacy `DB_HOST` / `DB_USER` variables when
    /// `url` is still the default.
    pub fn apply_legacy_env(&mut self, host: Option<String>, user: Option<String>) {
        if self.url != DEFAULT_STORE_URL || (host.is_none() && user.is_none()) {
            return;
        }
        let host = host.unwrap_or_else(|| "localhost".to_string());
        let user = user.unwrap_or_else(|| "root".to_string());
        self.url = format!("mysql://{user}@{host}/osu");
    }
}

/// HTTP server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address.
    pub host: String,
    /// Port number.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Main `RankLookup` configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RankLookupConfig {
    /// Cache configuration.
    pub cache: CacheConfig,
    /// Refresh limiter configuration.
    pub refresh: RefreshConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
    /// Store configuration.
    pub store: StoreConfig,
    /// Server configuration.
    pub server: ServerConfig,
}

impl RankLookupConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < `ranklookup.toml` < environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("ranklookup.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("RANKLOOKUP_").split("__"))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .store
            .apply_legacy_env(std::env::var("DB_HOST").ok(), std::env::var("DB_USER").ok());
        Ok(config)
    }

    /// Creates a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str))
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("cache.max_entries_per_ruleset", self.cache.max_entries_per_ruleset),
            ("cache.idle_ttl_secs", self.cache.idle_ttl_secs),
            ("cache.first_population_wait_ms", self.cache.first_population_wait_ms),
            ("cache.single_flight_wait_ms", self.cache.single_flight_wait_ms),
            (
                "refresh.max_concurrent_populations",
                self.refresh.max_concurrent_populations as u64,
            ),
            ("metrics.report_interval_secs", self.metrics.report_interval_secs),
            ("store.max_connections", u64::from(self.store.max_connections)),
            ("store.point_query_timeout_secs", self.store.point_query_timeout_secs),
            ("store.scan_timeout_secs", self.store.scan_timeout_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "value must be greater than 0".to_string(),
                });
            }
        }

        if self.store.score_tables.len() != Ruleset::ALL.len() {
            return Err(ConfigError::InvalidValue {
                key: "store.score_tables".to_string(),
                message: format!(
                    "expected {} tables (one per ruleset), got {}",
                    Ruleset::ALL.len(),
                    self.store.score_tables.len()
                ),
            });
        }

        let tables = std::iter::once(("store.beatmaps_table", &self.store.beatmaps_table))
            .chain(self.store.score_tables.iter().map(|t| ("store.score_tables", t)));
        for (key, table) in tables {
            if !is_valid_table_name(table) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("'{table}' is not a valid table name"),
                });
            }
        }

        Ok(())
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
