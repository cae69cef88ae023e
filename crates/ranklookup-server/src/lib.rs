#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)]
#![allow(clippy::needless_for_each)]
//! `RankLookup` Server - HTTP endpoint over the rank lookup cache.
//!
//! ## Routes
//!
//! - `GET /ranklookup?rulesetId=&beatmapId=&score=` returns `position,total`
//! - `DELETE /ranklookup/{rulesetId}/{beatmapId}` drops a cached entry
//! - `GET /stats`, `GET /health`
//! - OpenAPI JSON: `GET /api-docs/openapi.json`

mod handlers;
mod types;

use std::sync::Arc;

use axum::{
    routing::{delete, get},
    Json, Router,
};
use ranklookup_core::RankCaches;
use utoipa::OpenApi;

// Re-export types for external use
pub use types::*;

// Re-export handlers for routing
pub use handlers::{health_check, invalidate_entry, rank_lookup, stats};

// ============================================================================
// OpenAPI Documentation
// ============================================================================

/// RankLookup API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "RankLookup API",
        version = "0.1.0",
        description = "Global rank lookup for beatmap leaderboards, served from \
            per-beatmap in-memory score sets."
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "ranklookup", description = "Rank queries and entry invalidation"),
        (name = "stats", description = "Cache statistics")
    ),
    paths(
        handlers::health::health_check,
        handlers::rank_lookup::rank_lookup,
        handlers::rank_lookup::invalidate_entry,
        handlers::stats::stats
    ),
    components(
        schemas(
            InvalidateResponse,
            RulesetStats,
            RefreshStats,
            StatsResponse,
            ErrorResponse
        )
    )
)]
pub struct ApiDoc;

// ============================================================================
// Application State
// ============================================================================

/// Application state shared across handlers.
pub struct AppState {
    /// One cache collection per ruleset.
    pub caches: RankCaches,
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Builds the API router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .route("/ranklookup", get(rank_lookup))
        .route(
            "/ranklookup/{rulesetId}/{beatmapId}",
            delete(invalidate_entry),
        )
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================
