#![allow(clippy::doc_markdown)]
//! Integration tests for the RankLookup HTTP API.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use ranklookup_core::{MemoryScoreStore, RankCaches, RankLookupConfig, ScoreStore};
use ranklookup_server::{router, AppState};

const OSU: &str = "osu_scores_high";
const MANIA: &str = "osu_scores_mania_high";

/// Helper to create a test app over an in-memory store
fn create_test_app() -> (Arc<MemoryScoreStore>, Router) {
    let store = Arc::new(MemoryScoreStore::new());
    let gateway: Arc<dyn ScoreStore> = store.clone();
    let caches =
        RankCaches::new(&RankLookupConfig::default(), gateway).expect("valid default config");
    (store, router(Arc::new(AppState { caches })))
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, String::from_utf8(body.to_vec()).expect("utf8"))
}

#[tokio::test]
async fn test_health_check() {
    let (_, app) = create_test_app();

    let (status, body) = send(&app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_rank_lookup_returns_position_and_total() {
    let (store, app) = create_test_app();
    store.insert_scores(OSU, 75, (1..=10).map(|user| (user, user * 1000)));

    let (status, body) = send(&app, "GET", "/ranklookup?rulesetId=0&beatmapId=75&score=7500").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "3,10");
}

#[tokio::test]
async fn test_rank_lookup_top_score() {
    let (store, app) = create_test_app();
    store.insert_scores(OSU, 75, (1..=10).map(|user| (user, user * 1000)));

    let (_, body) = send(&app, "GET", "/ranklookup?rulesetId=0&beatmapId=75&score=10000").await;

    assert_eq!(body, "0,10");
}

#[tokio::test]
async fn test_rank_lookup_routes_by_ruleset() {
    let (store, app) = create_test_app();
    store.insert_scores(MANIA, 75, (1..=4).map(|user| (user, user * 10)));
    store.insert_scores(OSU, 75, (1..=8).map(|user| (user, user * 10)));

    let (_, mania) = send(&app, "GET", "/ranklookup?rulesetId=3&beatmapId=75&score=15").await;
    let (_, osu) = send(&app, "GET", "/ranklookup?rulesetId=0&beatmapId=75&score=15").await;

    assert_eq!(mania, "3,4");
    assert_eq!(osu, "7,8");
}

#[tokio::test]
async fn test_rank_lookup_unknown_beatmap() {
    let (_, app) = create_test_app();

    let (status, body) = send(&app, "GET", "/ranklookup?rulesetId=1&beatmapId=404&score=1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "0,0");
}

#[tokio::test]
async fn test_rank_lookup_invalid_ruleset() {
    let (_, app) = create_test_app();

    let (status, body) = send(&app, "GET", "/ranklookup?rulesetId=7&beatmapId=1&score=1").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["code"], "RANK-003");
}

#[tokio::test]
async fn test_rank_lookup_missing_parameter() {
    let (_, app) = create_test_app();

    let (status, _) = send(&app, "GET", "/ranklookup?rulesetId=0&beatmapId=1").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rank_lookup_store_failure_hides_detail() {
    let (store, app) = create_test_app();
    store.set_failing(true);

    let (status, body) = send(&app, "GET", "/ranklookup?rulesetId=0&beatmapId=1&score=1").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["error"], "rank lookup failed");
    assert_eq!(json["code"], "RANK-001");
}

#[tokio::test]
async fn test_invalidate_entry() {
    let (store, app) = create_test_app();
    store.insert_scores(OSU, 75, (1..=10).map(|user| (user, user)));
    send(&app, "GET", "/ranklookup?rulesetId=0&beatmapId=75&score=5").await;

    let (status, body) = send(&app, "DELETE", "/ranklookup/0/75").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["invalidated"], true);
    assert_eq!(json["ruleset"], "osu");
    assert_eq!(json["beatmapId"], 75);

    let (_, body) = send(&app, "DELETE", "/ranklookup/0/75").await;
    let json: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["invalidated"], false);
}

#[tokio::test]
async fn test_invalidate_unknown_ruleset() {
    let (_, app) = create_test_app();

    let (status, _) = send(&app, "DELETE", "/ranklookup/9/75").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats() {
    let (store, app) = create_test_app();
    store.insert_scores(OSU, 75, (1..=10).map(|user| (user, user)));
    send(&app, "GET", "/ranklookup?rulesetId=0&beatmapId=75&score=5").await;

    let (status, body) = send(&app, "GET", "/stats").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).expect("json");
    let rulesets = json["rulesets"].as_array().expect("rulesets");
    assert_eq!(rulesets.len(), 4);
    assert_eq!(rulesets[0]["table"], OSU);
    assert_eq!(rulesets[3]["ruleset"], "mania");
    assert_eq!(json["refresh"]["capacity"], 10);
    assert_eq!(json["hits"].as_u64(), Some(1));
}

#[tokio::test]
async fn test_openapi_json_is_served() {
    let (_, app) = create_test_app();

    let (status, body) = send(&app, "GET", "/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(json["info"]["title"], "RankLookup API");
}
