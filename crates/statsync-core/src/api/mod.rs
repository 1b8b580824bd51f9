//! Remote stats API client.
//!
//! Uses the curl crate (libcurl) to fetch per-entity statistics as JSON and
//! maps transport/status failures into the engine's error taxonomy. The
//! `StatsApi` trait is the seam the processor depends on; tests substitute
//! scripted doubles.

mod client;

pub use client::HttpStatsClient;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::StatsPayload;

/// One successful fetch: the decoded payload plus the quota cost the call
/// was observed to consume (for the quota guard).
#[derive(Debug, Clone)]
pub struct StatsFetch {
    pub payload: StatsPayload,
    pub cost: u64,
}

/// Fetch current statistics for one entity.
#[async_trait]
pub trait StatsApi: Send + Sync {
    async fn fetch_stats(&self, entity_id: &str) -> Result<StatsFetch, ApiError>;
}
