// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use bakery_reviews::config::{ReviewsConfig, SourceMode};
use tower::ServiceExt;

// Full in-process app on the built-in review list (no network).
fn build_app() -> Router {
    let cfg = ReviewsConfig {
        source: SourceMode::Api,
        api_key: None,
        ..ReviewsConfig::default()
    };
    bakery_reviews::app_with_config(&cfg).expect("app_with_config should build Router in tests")
}

async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn cache_miss_then_hit_shows_up_in_exposition() {
    let app = build_app();

    let (s1, body) = get_text(&app, "/reviews").await;
    assert_eq!(s1, StatusCode::OK);
    assert!(body.contains("Hadar Spiro"), "builtin list expected: {body}");
    let (s2, _) = get_text(&app, "/reviews").await;
    assert_eq!(s2, StatusCode::OK);

    // Same process, so counters persist.
    let (sm, text) = get_text(&app, "/metrics").await;
    assert_eq!(sm, StatusCode::OK);
    for needle in [
        "reviews_cache_hits_total",
        "reviews_cache_misses_total",
        "reviews_cache_ttl_ms",
        "reviews_fetch_ms",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}

#[tokio::test]
async fn recorder_init_is_idempotent() {
    // Two apps in one process must not fight over the global recorder.
    let _a = build_app();
    let _b = build_app();
}

#[serial_test::serial]
#[tokio::test]
async fn default_app_builds_from_repo_config() {
    std::env::remove_var("REVIEWS_CONFIG_PATH");
    let app = bakery_reviews::app().await.expect("app() from config/reviews.toml");
    let (s, body) = get_text(&app, "/health").await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body.trim(), "OK");
}
