use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::service::ReviewService;

pub const CACHE_STATUS_HEADER: &str = "x-reviews-cache";

#[derive(Clone)]
pub struct AppState {
    pub reviews: Arc<ReviewService>,
}

impl AppState {
    pub fn new(reviews: ReviewService) -> Self {
        Self {
            reviews: Arc::new(reviews),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/reviews", get(get_reviews))
        .route("/api/reviews", get(get_reviews))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, serde::Deserialize)]
struct ReviewsQuery {
    #[serde(default)]
    refresh: Option<String>,
}

/// Always 200; the cache header is advisory. A query that does not parse is not a forced refresh.
async fn get_reviews(
    State(state): State<AppState>,
    query: Result<Query<ReviewsQuery>, QueryRejection>,
) -> Response {
    let force = query.is_ok_and(|Query(q)| q.refresh.as_deref() == Some("1"));
    let resp = state.reviews.get(force).await;

    let ttl_secs = state.reviews.ttl().as_secs();
    let cache_control = format!(
        "public, s-maxage={}, stale-while-revalidate={}",
        ttl_secs,
        ttl_secs.saturating_mul(2)
    );

    let mut out = Json(resp.payload).into_response();
    let headers = out.headers_mut();
    headers.insert(
        HeaderName::from_static(CACHE_STATUS_HEADER),
        HeaderValue::from_static(resp.status.as_str()),
    );
    if let Ok(v) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, v);
    }
    out
}
