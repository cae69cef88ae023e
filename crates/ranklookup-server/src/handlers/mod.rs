//! HTTP handlers for the rank lookup API.
//!
//! - `health`: liveness
//! - `rank_lookup`: rank queries and entry invalidation
//! - `stats`: cache occupancy and counters

pub mod health;
pub mod rank_lookup;
pub mod stats;

pub use health::health_check;
pub use rank_lookup::{invalidate_entry, rank_lookup};
pub use stats::stats;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ranklookup_core::Error;

use crate::types::ErrorResponse;

/// Maps a core error to a status and a body without internal detail.
pub(crate) fn error_response(err: &Error) -> Response {
    let (status, message) = match err {
        Error::InvalidRuleset(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        _ => {
            tracing::error!(code = err.code(), error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "rank lookup failed".to_string(),
            )
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: message,
            code: err.code().to_string(),
        }),
    )
        .into_response()
}
