//! Drives one work cycle end to end.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::checkpoint::CheckpointStore;
use crate::config::StatsyncConfig;
use crate::control::StopFlag;
use crate::error::StorageUnavailable;
use crate::model::{CycleKey, EntityId, EntityTask, Outcome};
use crate::processor::ProcessEntity;
use crate::quota::QuotaGuard;
use crate::retry::{run_with_retry, RetryPolicy};

use super::plan::{dedupe_tasks, partition_batches, remaining_tasks};
use super::progress::ProgressStats;
use super::report::CycleReport;

/// Scheduling knobs for one cycle, usually derived from config.
#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub batch_size: usize,
    pub max_workers: usize,
    pub batch_timeout: Duration,
    pub retry: RetryPolicy,
    /// Estimated quota units per entity, for the pre-batch gate.
    pub cost_per_entity: u64,
}

impl CycleOptions {
    pub fn from_config(cfg: &StatsyncConfig) -> Self {
        Self {
            batch_size: cfg.batch_size.max(1),
            max_workers: cfg.max_workers.max(1),
            batch_timeout: cfg.batch_timeout(),
            retry: RetryPolicy::from_config(&cfg.retry()),
            cost_per_entity: cfg.quota().cost_per_entity,
        }
    }
}

type Observer = dyn Fn(&ProgressStats) + Send + Sync;

/// Runs cycles: load checkpoint → plan → batched, bounded-parallel dispatch
/// with a quota gate before and a durable checkpoint after every batch.
pub struct CycleRunner<S, P> {
    store: Arc<S>,
    processor: Arc<P>,
    quota: Arc<QuotaGuard>,
    opts: CycleOptions,
    stop: Arc<StopFlag>,
    observer: Option<Box<Observer>>,
}

impl<S, P> CycleRunner<S, P>
where
    S: CheckpointStore + 'static,
    P: ProcessEntity + 'static,
{
    pub fn new(
        store: Arc<S>,
        processor: Arc<P>,
        quota: Arc<QuotaGuard>,
        opts: CycleOptions,
    ) -> Self {
        Self {
            store,
            processor,
            quota,
            opts,
            stop: Arc::new(StopFlag::new()),
            observer: None,
        }
    }

    /// Install a per-batch progress callback (console/log output only).
    pub fn with_observer(mut self, f: impl Fn(&ProgressStats) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(f));
        self
    }

    /// Handle for external stop requests (e.g. Ctrl-C).
    pub fn stop_handle(&self) -> Arc<StopFlag> {
        Arc::clone(&self.stop)
    }

    /// Run one cycle over `work_set` (already in priority order).
    ///
    /// Entities checkpointed by a prior run of the same cycle are never
    /// re-dispatched. `StorageUnavailable` from the checkpoint store aborts
    /// the cycle: work done in memory is not guaranteed durable, so the run
    /// stops rather than falsely report success.
    pub async fn run_cycle(
        &self,
        cycle: CycleKey,
        work_set: Vec<EntityTask>,
    ) -> Result<CycleReport, StorageUnavailable> {
        let started = std::time::Instant::now();

        let work_set = dedupe_tasks(work_set);
        let total = work_set.len() as u64;

        let record = self.store.load(&cycle).await?;
        self.quota.seed_consumed(record.quota_used);
        let remaining = remaining_tasks(&work_set, &record);
        let skipped = total - remaining.len() as u64;
        let batches = partition_batches(remaining, self.opts.batch_size);
        let batch_count = batches.len();

        tracing::info!(
            %cycle,
            total,
            skipped,
            batches = batch_count,
            quota_remaining = self.quota.remaining(),
            "cycle planned"
        );
        self.store
            .record_cycle_stats(&cycle, total, self.quota.consumed())
            .await?;

        let mut success = record.success;
        let mut errors = record.errors;
        let mut processed = 0u64;
        let mut batches_done = 0usize;
        let mut quota_exhausted = false;
        let mut stopped = false;

        for batch in batches {
            if self.stop.is_stop_requested() {
                stopped = true;
                break;
            }

            let estimated_cost = batch.len() as u64 * self.opts.cost_per_entity;
            if !self.quota.sufficient_for(estimated_cost) {
                tracing::warn!(
                    %cycle,
                    estimated_cost,
                    remaining = self.quota.remaining(),
                    "quota insufficient for next batch, stopping cycle"
                );
                quota_exhausted = true;
                break;
            }

            let (outcomes, cut_short) = self.run_batch(batch).await;

            for (id, outcome) in &outcomes {
                match outcome {
                    Outcome::Success { .. } => success += 1,
                    Outcome::Failure { .. } => errors += 1,
                    Outcome::Skipped => {}
                }
                processed += 1;
                self.store.append(&cycle, id, outcome).await?;
            }
            self.store
                .record_cycle_stats(&cycle, total, self.quota.consumed())
                .await?;
            self.store.flush(&cycle).await?;
            batches_done += 1;

            if let Some(observer) = &self.observer {
                observer(&ProgressStats {
                    batches_done,
                    batch_count,
                    processed,
                    success,
                    errors,
                    quota_remaining: self.quota.remaining(),
                });
            }

            if cut_short {
                stopped = true;
                break;
            }
        }

        let report = CycleReport {
            cycle,
            total,
            success,
            errors,
            skipped,
            quota_exhausted,
            stopped,
            duration: started.elapsed(),
        };
        tracing::info!(
            cycle = %report.cycle,
            success = report.success,
            errors = report.errors,
            skipped = report.skipped,
            quota_exhausted = report.quota_exhausted,
            stopped = report.stopped,
            "cycle finished"
        );
        Ok(report)
    }

    /// Run one batch under the worker limit and the batch watchdog.
    ///
    /// Returns collected outcomes plus whether a stop request cut the batch
    /// short before every member was dispatched. At the watchdog, workers
    /// still running are aborted and every unfinished batch member is
    /// recorded as a timeout failure, keeping the checkpoint a complete
    /// prefix of the plan.
    async fn run_batch(&self, batch: Vec<EntityTask>) -> (Vec<(EntityId, Outcome)>, bool) {
        let deadline = tokio::time::Instant::now() + self.opts.batch_timeout;
        let mut queue: VecDeque<EntityTask> = batch.into();
        let mut join_set: JoinSet<(EntityId, Outcome)> = JoinSet::new();
        let mut outstanding: HashSet<EntityId> = HashSet::new();
        let mut outcomes: Vec<(EntityId, Outcome)> = Vec::new();
        let mut timed_out = false;
        let mut cut_short = false;

        loop {
            if !timed_out && !cut_short {
                while join_set.len() < self.opts.max_workers {
                    if self.stop.is_stop_requested() && !queue.is_empty() {
                        cut_short = true;
                        break;
                    }
                    let Some(task) = queue.pop_front() else {
                        break;
                    };
                    outstanding.insert(task.id.clone());
                    let processor = Arc::clone(&self.processor);
                    let policy = self.opts.retry;
                    join_set.spawn(async move {
                        let id = task.id.clone();
                        match run_with_retry(&policy, || processor.process(&task)).await {
                            Ok((payload, attempts)) => (id, Outcome::Success { payload, attempts }),
                            Err(e) => {
                                tracing::warn!(
                                    entity = %id,
                                    error = %e.last,
                                    attempts = e.attempts,
                                    "entity failed"
                                );
                                (
                                    id,
                                    Outcome::Failure {
                                        reason: e.last.to_string(),
                                        attempts: e.attempts,
                                    },
                                )
                            }
                        }
                    });
                }
            }

            if join_set.is_empty() {
                break;
            }

            let joined = if timed_out {
                join_set.join_next().await
            } else {
                match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                    Ok(j) => j,
                    Err(_) => {
                        tracing::warn!("batch watchdog fired, abandoning in-flight entities");
                        timed_out = true;
                        join_set.abort_all();
                        continue;
                    }
                }
            };

            match joined {
                Some(Ok((id, outcome))) => {
                    outstanding.remove(&id);
                    outcomes.push((id, outcome));
                }
                Some(Err(e)) => {
                    if !e.is_cancelled() {
                        tracing::error!("worker task failed: {}", e);
                    }
                }
                None => break,
            }
        }

        if timed_out {
            // Unfinished members (in-flight or never dispatched) are handled
            // for the cycle as timeout failures.
            for task in queue.drain(..) {
                outstanding.insert(task.id);
            }
            for id in outstanding.drain() {
                outcomes.push((
                    id,
                    Outcome::Failure {
                        reason: "batch timeout".to_string(),
                        attempts: 0,
                    },
                ));
            }
        } else {
            // Leftovers here mean a worker panicked; record it so the entity
            // still has exactly one outcome this cycle.
            for id in outstanding.drain() {
                outcomes.push((
                    id,
                    Outcome::Failure {
                        reason: "worker failed".to_string(),
                        attempts: 0,
                    },
                ));
            }
        }

        (outcomes, cut_short)
    }
}
