//! Cache statistics handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::types::{RefreshStats, RulesetStats, StatsResponse};
use crate::AppState;

/// Cache occupancy, limiter state and unreported counters.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Cache statistics", body = StatsResponse)
    )
)]
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let caches = &state.caches;
    let rulesets: Vec<RulesetStats> = caches
        .collections()
        .iter()
        .map(|collection| RulesetStats {
            ruleset_id: collection.ruleset().id(),
            ruleset: collection.ruleset().name().to_string(),
            table: collection.table().to_string(),
            entries: collection.entry_count(),
        })
        .collect();
    let limiter = caches.limiter();
    let metrics = caches.metrics();

    Json(StatsResponse {
        total_entries: rulesets.iter().map(|r| r.entries).sum(),
        rulesets,
        refresh: RefreshStats {
            capacity: limiter.capacity(),
            available: limiter.available(),
            in_flight: limiter.in_flight(),
        },
        hits: metrics.hits(),
        misses: metrics.misses(),
        populations: metrics.populations(),
    })
}
