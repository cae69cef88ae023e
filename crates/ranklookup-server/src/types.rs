//! Request and response types for the rank lookup API.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// Lookup
// ============================================================================

/// Query string of `GET /ranklookup`.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RankLookupQuery {
    /// Ruleset id: 0 osu, 1 taiko, 2 fruits, 3 mania.
    pub ruleset_id: u8,
    /// Beatmap to rank against.
    pub beatmap_id: u32,
    /// Score to rank.
    pub score: u32,
}

/// Response of `DELETE /ranklookup/{rulesetId}/{beatmapId}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    /// Ruleset name.
    pub ruleset: String,
    /// Beatmap whose entry was targeted.
    pub beatmap_id: u32,
    /// True if a resident entry was dropped.
    pub invalidated: bool,
}

// ============================================================================
// Stats
// ============================================================================

/// Resident entries of one ruleset.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RulesetStats {
    /// Ruleset id.
    pub ruleset_id: u8,
    /// Ruleset name.
    pub ruleset: String,
    /// Score table backing the collection.
    pub table: String,
    /// Resident entries (approximate).
    pub entries: u64,
}

/// Refresh limiter occupancy.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStats {
    /// Pool size.
    pub capacity: usize,
    /// Free permits.
    pub available: usize,
    /// Rebuilds currently running.
    pub in_flight: usize,
}

/// Response of `GET /stats`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// One row per ruleset.
    pub rulesets: Vec<RulesetStats>,
    /// Resident entries across all rulesets.
    pub total_entries: u64,
    /// Limiter occupancy.
    pub refresh: RefreshStats,
    /// Hits since the last metrics report.
    pub hits: u64,
    /// Misses since the last metrics report.
    pub misses: u64,
    /// Populations since the last metrics report.
    pub populations: u64,
}

// ============================================================================
// Errors
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Stable error code (`RANK-XXX`).
    pub code: String,
}
