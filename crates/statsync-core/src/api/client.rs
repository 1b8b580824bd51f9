//! curl-backed implementation of `StatsApi`.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::model::StatsPayload;

use super::{StatsApi, StatsFetch};

/// HTTP client for the remote stats endpoint: GET `{base_url}/{entity_id}`
/// with an optional `X-Api-Key` header, JSON body decoded into
/// `StatsPayload`. Each call is charged `cost_per_call` quota units.
#[derive(Debug, Clone)]
pub struct HttpStatsClient {
    base_url: String,
    api_key: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    cost_per_call: u64,
}

impl HttpStatsClient {
    pub fn new(api: &ApiConfig, request_timeout: Duration, cost_per_call: u64) -> Self {
        Self {
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_key: api.api_key.clone(),
            connect_timeout: Duration::from_secs(api.connect_timeout_secs),
            request_timeout,
            cost_per_call,
        }
    }

    fn url_for(&self, entity_id: &str) -> String {
        format!("{}/{}", self.base_url, entity_id)
    }

    /// Blocking curl transfer; call from `spawn_blocking`.
    fn perform(&self, url: &str) -> Result<(u32, Vec<u8>), ApiError> {
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(ApiError::Curl)?;
        easy.get(true).map_err(ApiError::Curl)?;
        easy.follow_location(true).map_err(ApiError::Curl)?;
        easy.connect_timeout(self.connect_timeout)
            .map_err(ApiError::Curl)?;
        easy.timeout(self.request_timeout).map_err(ApiError::Curl)?;
        easy.accept_encoding("").map_err(ApiError::Curl)?;

        if !self.api_key.is_empty() {
            let mut list = curl::easy::List::new();
            list.append(&format!("X-Api-Key: {}", self.api_key))
                .map_err(ApiError::Curl)?;
            easy.http_headers(list).map_err(ApiError::Curl)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(ApiError::Curl)?;
            transfer.perform().map_err(ApiError::Curl)?;
        }

        let code = easy.response_code().map_err(ApiError::Curl)?;
        Ok((code, body))
    }

    fn decode(entity_id: &str, code: u32, body: &[u8]) -> Result<StatsPayload, ApiError> {
        if !(200..300).contains(&code) {
            // The quota-metered API reports exhaustion as 401/403 with a
            // quota reason in the body; other 4xx are bad id / bad key.
            if matches!(code, 401 | 403) && body_mentions_quota(body) {
                return Err(ApiError::QuotaRejected(code));
            }
            return Err(ApiError::Http(code));
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::Decode(format!("stats for {}: {}", entity_id, e)))
    }
}

fn body_mentions_quota(body: &[u8]) -> bool {
    let text = String::from_utf8_lossy(body);
    let lower = text.to_ascii_lowercase();
    lower.contains("quota") || lower.contains("rate limit exceeded")
}

#[async_trait]
impl StatsApi for HttpStatsClient {
    async fn fetch_stats(&self, entity_id: &str) -> Result<StatsFetch, ApiError> {
        let url = self.url_for(entity_id);
        let client = self.clone();
        let id = entity_id.to_string();
        let (code, body) = tokio::task::spawn_blocking(move || client.perform(&url))
            .await
            .map_err(|e| ApiError::Decode(format!("fetch task join: {}", e)))??;
        let payload = Self::decode(&id, code, &body)?;
        Ok(StatsFetch {
            payload,
            cost: self.cost_per_call,
        })
    }
}
