//! Repeating job scheduler with a per-job worker pool.
//!
//! Repeat definitions live in the [`JobRegistry`], keyed by a stable job id,
//! so registration is deduplicated and survives restarts when the registry
//! is durable. Each registered job also gets a local queue and a pool of
//! workers in this process.
//!
//! # Tick
//!
//! On every tick the scheduler lists the definitions and, for each one that
//! is due:
//!
//! 1. Skips it if no local job is bound to the id.
//! 2. Skips the occurrence if the previous execution is still running
//!    (no overlap per job id).
//! 3. Leaves it due if the sliding-window rate limiter has no room.
//! 4. Otherwise enqueues one execution and advances `next_run_at`.
//!
//! # Execution
//!
//! A worker runs the job body up to `attempts` times, sleeping
//! `backoff.delay_for(n)` between tries. A fatal error (see
//! [`JobError::is_fatal`]) ends the execution after the current attempt.
//! The final outcome is appended to the job's history, trimmed to
//! `remove_on_complete` or `remove_on_fail` records.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use petfarm_db::{DbError, JobRegistry};
use petfarm_types::{ExecutionOutcome, ExecutionRecord, JobOptions, JobSummary, RepeatDefinition};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::rate_limit::SlidingWindowLimiter;
use crate::shutdown::Shutdown;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why one attempt of a job body failed.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The record store was not available when the job started. The
    /// execution is abandoned without retries and runs again on its next
    /// occurrence.
    #[error("record store not initialized")]
    StoreNotInitialized,

    /// A record store call failed for the whole batch.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

impl JobError {
    /// Whether retrying within the same execution is pointless.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::StoreNotInitialized)
    }
}

/// Errors from scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The job registry failed.
    #[error("job registry error: {0}")]
    Registry(#[from] DbError),

    /// No repeat definition exists for the job id.
    #[error("job {job_id} is not registered")]
    NotRegistered {
        /// The job id.
        job_id: String,
    },

    /// The job id is registered with a different interval.
    #[error("job {job_id} is registered every {registered_ms} ms, not {requested_ms} ms")]
    IntervalMismatch {
        /// The job id.
        job_id: String,
        /// Interval of the stored definition.
        registered_ms: u64,
        /// Interval named by the caller.
        requested_ms: u64,
    },
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// A job body the scheduler can run.
pub trait Runnable: Send + Sync {
    /// Job name, recorded in the repeat definition.
    fn name(&self) -> &'static str;

    /// Run one attempt.
    fn run(&self) -> BoxFuture<'_, Result<JobSummary, JobError>>;
}

/// One queued execution.
#[derive(Debug, Clone)]
struct Execution {
    options: JobOptions,
    scheduled_at: DateTime<Utc>,
}

/// The local queue and workers bound to one job id.
struct JobSlot {
    queue: mpsc::Sender<Execution>,
    workers: Vec<JoinHandle<()>>,
}

/// Job ids with an execution queued or running.
type InFlight = Arc<std::sync::Mutex<HashSet<String>>>;

fn lock_in_flight(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashSet<String>> {
    in_flight
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Shared state of the workers of one job id.
struct Worker {
    job: Arc<dyn Runnable>,
    registry: JobRegistry,
    in_flight: InFlight,
}

impl Worker {
    async fn run(self: Arc<Self>, index: usize, queue: Arc<Mutex<mpsc::Receiver<Execution>>>) {
        loop {
            let next = queue.lock().await.recv().await;
            let Some(execution) = next else {
                tracing::debug!(job = self.job.name(), worker = index, "Job queue closed");
                return;
            };
            self.execute(execution).await;
        }
    }

    async fn execute(&self, execution: Execution) {
        let options = execution.options;
        let job_id = options.job_id.as_str();
        let started_at = Utc::now();
        let attempts = options.attempts.max(1);
        let mut attempts_made = 0_u32;

        let result = loop {
            attempts_made = attempts_made.saturating_add(1);
            match self.job.run().await {
                Ok(summary) => break Ok(summary),
                Err(e) if e.is_fatal() => {
                    tracing::error!(job_id, error = %e, "Job aborted without retry");
                    break Err(e);
                }
                Err(e) if attempts_made >= attempts => {
                    tracing::error!(
                        job_id,
                        attempts_made,
                        error = %e,
                        "Job failed, retries exhausted"
                    );
                    break Err(e);
                }
                Err(e) => {
                    let delay = options.backoff.delay_for(attempts_made);
                    tracing::warn!(
                        job_id,
                        attempt = attempts_made,
                        delay_ms = millis(delay),
                        error = %e,
                        "Job attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        let finished_at = Utc::now();
        let (outcome, summary, error, keep) = match result {
            Ok(summary) => {
                tracing::info!(
                    job_id,
                    examined = summary.examined,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    lag_ms = started_at
                        .signed_duration_since(execution.scheduled_at)
                        .num_milliseconds(),
                    "Job completed"
                );
                (
                    ExecutionOutcome::Completed,
                    Some(summary),
                    None,
                    options.remove_on_complete,
                )
            }
            Err(e) => (
                ExecutionOutcome::Failed,
                None,
                Some(e.to_string()),
                options.remove_on_fail,
            ),
        };

        let record = ExecutionRecord {
            execution_id: Uuid::now_v7(),
            job_id: options.job_id.clone(),
            outcome,
            attempts_made,
            started_at,
            finished_at,
            summary,
            error,
        };
        if let Err(e) = self.registry.record(&record, keep).await {
            tracing::warn!(job_id, error = %e, "Failed to record job history");
        }
        lock_in_flight(&self.in_flight).remove(job_id);
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Registers repeating jobs and feeds due executions to their workers.
pub struct Scheduler {
    registry: JobRegistry,
    config: SchedulerConfig,
    slots: Mutex<HashMap<String, JobSlot>>,
    in_flight: InFlight,
    limiter: Mutex<SlidingWindowLimiter>,
}

impl Scheduler {
    /// Create a scheduler over `registry`.
    pub fn new(registry: JobRegistry, config: SchedulerConfig) -> Self {
        let limiter = SlidingWindowLimiter::new(config.rate_limit_max, config.rate_limit_window());
        Self {
            registry,
            config,
            slots: Mutex::new(HashMap::new()),
            in_flight: Arc::new(std::sync::Mutex::new(HashSet::new())),
            limiter: Mutex::new(limiter),
        }
    }

    /// The registry backing this scheduler.
    pub const fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Register `job` to repeat with `options` and bind it to local workers.
    ///
    /// Returns `false` if a definition with the same job id already existed;
    /// the stored definition is kept as is. Workers are started either way
    /// so a restarted process keeps executing durable registrations.
    pub async fn register(
        &self,
        job: Arc<dyn Runnable>,
        options: JobOptions,
    ) -> Result<bool, SchedulerError> {
        let now = Utc::now();
        let every = chrono::Duration::milliseconds(
            i64::try_from(options.repeat_every_ms).unwrap_or(i64::MAX),
        );
        let definition = RepeatDefinition {
            name: job.name().to_owned(),
            options: options.clone(),
            next_run_at: now.checked_add_signed(every).unwrap_or(now),
            registered_at: now,
        };
        let created = self.registry.add_repeat(&definition).await?;
        if created {
            tracing::info!(
                job_id = %options.job_id,
                every_ms = options.repeat_every_ms,
                attempts = options.attempts,
                "Job registered"
            );
        } else {
            tracing::info!(job_id = %options.job_id, "Job already registered, keeping definition");
        }

        self.slots
            .lock()
            .await
            .entry(options.job_id)
            .or_insert_with(|| self.spawn_workers(job));
        Ok(created)
    }

    fn spawn_workers(&self, job: Arc<dyn Runnable>) -> JobSlot {
        let (tx, rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let queue = Arc::new(Mutex::new(rx));
        let worker = Arc::new(Worker {
            job,
            registry: self.registry.clone(),
            in_flight: Arc::clone(&self.in_flight),
        });
        let workers = (0..self.config.worker_concurrency.max(1))
            .map(|index| tokio::spawn(Arc::clone(&worker).run(index, Arc::clone(&queue))))
            .collect();
        JobSlot { queue: tx, workers }
    }

    /// Remove the repeat definition of `job_id` registered every `every_ms`.
    ///
    /// Local workers finish queued executions and then stop.
    pub async fn remove_repeatable(
        &self,
        job_id: &str,
        every_ms: u64,
    ) -> Result<RepeatDefinition, SchedulerError> {
        let definition = self.registry.get_repeat(job_id).await?.ok_or_else(|| {
            SchedulerError::NotRegistered {
                job_id: job_id.to_owned(),
            }
        })?;
        if definition.options.repeat_every_ms != every_ms {
            return Err(SchedulerError::IntervalMismatch {
                job_id: job_id.to_owned(),
                registered_ms: definition.options.repeat_every_ms,
                requested_ms: every_ms,
            });
        }

        self.registry.remove_repeat(job_id).await?;
        // Dropping the sender closes the queue once it drains.
        self.slots.lock().await.remove(job_id);
        tracing::info!(job_id, every_ms, "Job removed");
        Ok(definition)
    }

    /// Every registered definition.
    pub async fn repeats(&self) -> Result<Vec<RepeatDefinition>, SchedulerError> {
        Ok(self.registry.list_repeats().await?)
    }

    /// Retained executions of `job_id` with `outcome`, oldest first.
    pub async fn history(
        &self,
        job_id: &str,
        outcome: ExecutionOutcome,
    ) -> Result<Vec<ExecutionRecord>, SchedulerError> {
        Ok(self.registry.history(job_id, outcome).await?)
    }

    /// Whether an execution of `job_id` is queued or running.
    pub fn is_in_flight(&self, job_id: &str) -> bool {
        lock_in_flight(&self.in_flight).contains(job_id)
    }

    /// Enqueue every job due at `now`. Returns how many were enqueued.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let definitions = self.registry.list_repeats().await?;
        let mut enqueued = 0_usize;

        for mut definition in definitions {
            if definition.next_run_at > now {
                continue;
            }
            let job_id = definition.options.job_id.clone();
            let Some(queue) = self
                .slots
                .lock()
                .await
                .get(&job_id)
                .map(|slot| slot.queue.clone())
            else {
                tracing::trace!(job_id = %job_id, "Due job has no local workers");
                continue;
            };

            if self.is_in_flight(&job_id) {
                tracing::debug!(job_id = %job_id, "Previous execution still running, skipping");
            } else if !self.limiter.lock().await.try_acquire(tokio::time::Instant::now()) {
                tracing::debug!(job_id = %job_id, "Rate limited, job stays due");
                continue;
            } else {
                lock_in_flight(&self.in_flight).insert(job_id.clone());
                let execution = Execution {
                    options: definition.options.clone(),
                    scheduled_at: definition.next_run_at,
                };
                if let Err(e) = queue.try_send(execution) {
                    lock_in_flight(&self.in_flight).remove(&job_id);
                    tracing::warn!(job_id = %job_id, error = %e, "Job queue rejected execution");
                    continue;
                }
                enqueued = enqueued.saturating_add(1);
            }

            definition.next_run_at = next_occurrence(&definition, now);
            self.registry.save_repeat(&definition).await?;
        }

        Ok(enqueued)
    }

    /// Tick on the configured interval until `shutdown` fires, then stop
    /// every worker pool.
    pub async fn run(self: Arc<Self>, shutdown: Arc<Shutdown>) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(
            registry = self.registry.name(),
            tick_ms = self.config.tick_interval_ms,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                () = shutdown.wait() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        tracing::warn!(error = %e, "Scheduler tick failed");
                    }
                }
            }
        }

        self.stop().await;
        tracing::info!("Scheduler stopped");
    }

    /// Close every job queue and wait for the workers to drain.
    pub async fn stop(&self) {
        let slots: Vec<JobSlot> = self.slots.lock().await.drain().map(|(_, s)| s).collect();
        for slot in slots {
            drop(slot.queue);
            for worker in slot.workers {
                if let Err(e) = worker.await {
                    tracing::warn!(error = %e, "Job worker panicked");
                }
            }
        }
    }
}

/// The first occurrence after `now` on the definition's cadence. Missed
/// occurrences are skipped rather than replayed.
fn next_occurrence(definition: &RepeatDefinition, now: DateTime<Utc>) -> DateTime<Utc> {
    let every = chrono::Duration::milliseconds(
        i64::try_from(definition.options.repeat_every_ms.max(1)).unwrap_or(i64::MAX),
    );
    let next = definition
        .next_run_at
        .checked_add_signed(every)
        .unwrap_or(now);
    if next > now {
        next
    } else {
        now.checked_add_signed(every).unwrap_or(now)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use petfarm_types::Backoff;

    use super::*;

    fn definition(every_ms: u64, next_run_at: DateTime<Utc>) -> RepeatDefinition {
        RepeatDefinition {
            name: String::from("test"),
            options: JobOptions {
                job_id: String::from("test"),
                repeat_every_ms: every_ms,
                remove_on_complete: 1,
                remove_on_fail: 1,
                attempts: 1,
                backoff: Backoff::exponential(10),
            },
            next_run_at,
            registered_at: next_run_at,
        }
    }

    #[test]
    fn next_occurrence_keeps_cadence() {
        let start = Utc::now();
        let def = definition(1_000, start);
        let now = start + chrono::Duration::milliseconds(200);
        assert_eq!(
            next_occurrence(&def, now),
            start + chrono::Duration::milliseconds(1_000)
        );
    }

    #[test]
    fn next_occurrence_skips_missed_runs() {
        let start = Utc::now();
        let def = definition(1_000, start);
        let now = start + chrono::Duration::seconds(30);
        assert_eq!(
            next_occurrence(&def, now),
            now + chrono::Duration::milliseconds(1_000)
        );
    }

    #[test]
    fn only_missing_store_is_fatal() {
        assert!(JobError::StoreNotInitialized.is_fatal());
        assert!(!JobError::Failed(String::from("boom")).is_fatal());
        assert!(!JobError::from(DbError::Unavailable(String::from("down"))).is_fatal());
    }
}
