// src/config/mod.rs
pub mod reviews;

pub use reviews::{
    ReviewsConfig, SourceMode, UpstreamRequest, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT,
};
