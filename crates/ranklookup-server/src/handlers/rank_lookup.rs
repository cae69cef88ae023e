//! Rank lookup handlers.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use ranklookup_core::Ruleset;

use super::error_response;
use crate::types::{ErrorResponse, InvalidateResponse, RankLookupQuery};
use crate::AppState;

/// Rank a score on a beatmap.
///
/// The body is `position,total` as plain text.
#[utoipa::path(
    get,
    path = "/ranklookup",
    tag = "ranklookup",
    params(RankLookupQuery),
    responses(
        (status = 200, description = "`position,total`", body = String, content_type = "text/plain"),
        (status = 400, description = "Unknown ruleset", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn rank_lookup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankLookupQuery>,
) -> Response {
    let ruleset = match Ruleset::try_from(query.ruleset_id) {
        Ok(ruleset) => ruleset,
        Err(e) => return error_response(&e),
    };

    match state
        .caches
        .lookup(ruleset, query.beatmap_id, query.score)
        .await
    {
        Ok(result) => format!("{},{}", result.position, result.total).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Drop the cached entry of a beatmap.
#[utoipa::path(
    delete,
    path = "/ranklookup/{rulesetId}/{beatmapId}",
    tag = "ranklookup",
    params(
        ("rulesetId" = u8, Path, description = "Ruleset id (0-3)"),
        ("beatmapId" = u32, Path, description = "Beatmap id")
    ),
    responses(
        (status = 200, description = "Entry dropped or absent", body = InvalidateResponse),
        (status = 400, description = "Unknown ruleset", body = ErrorResponse)
    )
)]
pub async fn invalidate_entry(
    State(state): State<Arc<AppState>>,
    Path((ruleset_id, beatmap_id)): Path<(u8, u32)>,
) -> Response {
    let ruleset = match Ruleset::try_from(ruleset_id) {
        Ok(ruleset) => ruleset,
        Err(e) => return error_response(&e),
    };

    let invalidated = state.caches.collection(ruleset).invalidate(beatmap_id);
    tracing::info!(ruleset = %ruleset, beatmap_id, invalidated, "entry invalidated");

    Json(InvalidateResponse {
        ruleset: ruleset.name().to_string(),
        beatmap_id,
        invalidated,
    })
    .into_response()
}
