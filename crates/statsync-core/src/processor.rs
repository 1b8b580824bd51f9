//! Per-entity unit of work: fetch, transform, persist.
//!
//! `EntityProcessor` is what the scheduler dispatches into its worker pool.
//! Instances share only the injected rate limiter and quota guard; everything
//! else is per-entity, so one entity's failure stays local.

use async_trait::async_trait;
use std::sync::Arc;

use crate::api::StatsApi;
use crate::error::ApiError;
use crate::model::{EntityTask, StatsPayload};
use crate::quota::QuotaGuard;
use crate::ratelimit::RateLimiter;

/// Persist fetched stats (insert-or-update keyed by entity id).
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn upsert(&self, entity_id: &str, payload: &StatsPayload) -> Result<(), ApiError>;
}

#[async_trait]
impl<S: StatsSink + ?Sized> StatsSink for Arc<S> {
    async fn upsert(&self, entity_id: &str, payload: &StatsPayload) -> Result<(), ApiError> {
        (**self).upsert(entity_id, payload).await
    }
}

/// The unit of work the scheduler retries and runs concurrently.
#[async_trait]
pub trait ProcessEntity: Send + Sync {
    async fn process(&self, task: &EntityTask) -> Result<StatsPayload, ApiError>;
}

/// Production processor: rate-limited fetch from the stats API, quota
/// consumption recorded from the observed call cost, then upsert into the
/// sink. A server-side quota rejection zeroes the guard estimate so the
/// scheduler's next batch gate stops issuing work.
pub struct EntityProcessor<A, S> {
    api: A,
    sink: S,
    limiter: Arc<RateLimiter>,
    quota: Arc<QuotaGuard>,
}

impl<A: StatsApi, S: StatsSink> EntityProcessor<A, S> {
    pub fn new(api: A, sink: S, limiter: Arc<RateLimiter>, quota: Arc<QuotaGuard>) -> Self {
        Self {
            api,
            sink,
            limiter,
            quota,
        }
    }
}

#[async_trait]
impl<A: StatsApi, S: StatsSink> ProcessEntity for EntityProcessor<A, S> {
    async fn process(&self, task: &EntityTask) -> Result<StatsPayload, ApiError> {
        self.limiter.acquire().await;

        let fetched = match self.api.fetch_stats(&task.id).await {
            Ok(f) => f,
            Err(e) => {
                if matches!(e, ApiError::QuotaRejected(_)) {
                    self.quota.mark_rejected();
                }
                return Err(e);
            }
        };
        self.quota.record_consumption(fetched.cost);

        self.sink.upsert(&task.id, &fetched.payload).await?;
        tracing::debug!(
            entity = %task.id,
            views = fetched.payload.views,
            "stats refreshed"
        );
        Ok(fetched.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StatsFetch;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedApi {
        responses: Mutex<HashMap<String, Vec<Result<StatsFetch, ApiError>>>>,
    }

    impl ScriptedApi {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
            }
        }

        fn push(&self, id: &str, r: Result<StatsFetch, ApiError>) {
            self.responses
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_default()
                .push(r);
        }
    }

    #[async_trait]
    impl StatsApi for ScriptedApi {
        async fn fetch_stats(&self, entity_id: &str) -> Result<StatsFetch, ApiError> {
            let mut map = self.responses.lock().unwrap();
            let queue = map.entry(entity_id.to_string()).or_default();
            if queue.is_empty() {
                return Err(ApiError::Http(404));
            }
            queue.remove(0)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        rows: Mutex<HashMap<String, StatsPayload>>,
    }

    #[async_trait]
    impl StatsSink for RecordingSink {
        async fn upsert(&self, entity_id: &str, payload: &StatsPayload) -> Result<(), ApiError> {
            self.rows
                .lock()
                .unwrap()
                .insert(entity_id.to_string(), payload.clone());
            Ok(())
        }
    }

    fn fetch(views: u64, cost: u64) -> StatsFetch {
        StatsFetch {
            payload: StatsPayload {
                views,
                subscribers: 1,
                item_count: 1,
            },
            cost,
        }
    }

    fn processor(
        api: ScriptedApi,
        quota: Arc<QuotaGuard>,
    ) -> EntityProcessor<ScriptedApi, Arc<RecordingSink>> {
        EntityProcessor::new(
            api,
            Arc::new(RecordingSink::default()),
            Arc::new(RateLimiter::new(Duration::ZERO)),
            quota,
        )
    }

    #[tokio::test]
    async fn fetch_persist_and_charge_quota() {
        let api = ScriptedApi::new();
        api.push("UC1", Ok(fetch(500, 2)));
        let quota = Arc::new(QuotaGuard::new(100));
        let proc = processor(api, Arc::clone(&quota));

        let payload = proc.process(&EntityTask::new("UC1", 0)).await.unwrap();
        assert_eq!(payload.views, 500);
        assert_eq!(quota.remaining(), 98);
        assert_eq!(proc.sink.rows.lock().unwrap().get("UC1").unwrap().views, 500);
    }

    #[tokio::test]
    async fn quota_rejection_zeroes_guard_and_propagates() {
        let api = ScriptedApi::new();
        api.push("UC1", Err(ApiError::QuotaRejected(403)));
        let quota = Arc::new(QuotaGuard::new(100));
        let proc = processor(api, Arc::clone(&quota));

        let err = proc.process(&EntityTask::new("UC1", 0)).await.unwrap_err();
        assert!(matches!(err, ApiError::QuotaRejected(_)));
        assert_eq!(quota.remaining(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_consumes_no_quota() {
        let api = ScriptedApi::new();
        api.push("UC1", Err(ApiError::Http(500)));
        let quota = Arc::new(QuotaGuard::new(100));
        let proc = processor(api, Arc::clone(&quota));

        let err = proc.process(&EntityTask::new("UC1", 0)).await.unwrap_err();
        assert!(matches!(err, ApiError::Http(500)));
        assert_eq!(quota.remaining(), 100);
    }
}
