//! Integration tests for the repeating job scheduler over the in-memory
//! job registry.
//!
//! Ticks are driven directly with explicit timestamps instead of the
//! background ticker, so every test controls when jobs fall due.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::BoxFuture;
use petfarm_core::config::SchedulerConfig;
use petfarm_core::scheduler::{JobError, Runnable, Scheduler, SchedulerError};
use petfarm_db::{JobRegistry, MemoryJobRegistry};
use petfarm_types::{
    Backoff, ExecutionOutcome, JobOptions, JobSummary, RepeatDefinition,
};
use tokio::sync::Notify;

const EVERY_MS: u64 = 1_000;

// =============================================================================
// Fixtures
// =============================================================================

/// A job body that fails a set number of times before succeeding.
#[derive(Default)]
struct ScriptedJob {
    calls: AtomicU32,
    failures: u32,
    fatal: bool,
    gate: Option<Notify>,
}

impl ScriptedJob {
    fn failing(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            ..Self::default()
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Runnable for ScriptedJob {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn run(&self) -> BoxFuture<'_, Result<JobSummary, JobError>> {
        Box::pin(async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fatal {
                return Err(JobError::StoreNotInitialized);
            }
            if call <= self.failures {
                return Err(JobError::Failed(format!("attempt {call}")));
            }
            Ok(JobSummary {
                examined: call,
                ..JobSummary::default()
            })
        })
    }
}

fn options(job_id: &str, attempts: u32) -> JobOptions {
    JobOptions {
        job_id: job_id.to_owned(),
        repeat_every_ms: EVERY_MS,
        remove_on_complete: 10,
        remove_on_fail: 10,
        attempts,
        backoff: Backoff::exponential(1),
    }
}

fn scheduler(config: SchedulerConfig) -> Scheduler {
    Scheduler::new(JobRegistry::from(MemoryJobRegistry::new()), config)
}

/// `seconds` after `base`.
fn at(base: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    base + TimeDelta::seconds(seconds)
}

async fn wait_idle(scheduler: &Scheduler, job_id: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while scheduler.is_in_flight(job_id) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();
}

async fn definition(scheduler: &Scheduler, job_id: &str) -> RepeatDefinition {
    scheduler
        .registry()
        .get_repeat(job_id)
        .await
        .unwrap()
        .unwrap()
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn registration_is_deduplicated_by_job_id() {
    let scheduler = scheduler(SchedulerConfig::default());
    let job = ScriptedJob::failing(0);

    assert!(scheduler.register(job.clone(), options("a", 1)).await.unwrap());
    let mut changed = options("a", 5);
    changed.repeat_every_ms = 5_000;
    assert!(!scheduler.register(job, changed).await.unwrap());

    let repeats = scheduler.repeats().await.unwrap();
    assert_eq!(repeats.len(), 1);
    assert_eq!(repeats.first().unwrap().options.repeat_every_ms, EVERY_MS);
    assert_eq!(repeats.first().unwrap().name, "scripted");
}

#[tokio::test]
async fn removal_requires_the_registered_interval() {
    let scheduler = scheduler(SchedulerConfig::default());
    let base = Utc::now();
    scheduler
        .register(ScriptedJob::failing(0), options("a", 1))
        .await
        .unwrap();

    let err = scheduler.remove_repeatable("missing", EVERY_MS).await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotRegistered { .. }));

    let err = scheduler.remove_repeatable("a", 60_000).await.unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::IntervalMismatch {
            registered_ms: EVERY_MS,
            requested_ms: 60_000,
            ..
        }
    ));
    assert_eq!(scheduler.repeats().await.unwrap().len(), 1);

    let removed = scheduler.remove_repeatable("a", EVERY_MS).await.unwrap();
    assert_eq!(removed.job_id(), "a");
    assert!(scheduler.repeats().await.unwrap().is_empty());
    assert_eq!(scheduler.tick(at(base, 10)).await.unwrap(), 0);
}

// =============================================================================
// Ticks
// =============================================================================

#[tokio::test]
async fn first_run_waits_one_interval() {
    let scheduler = scheduler(SchedulerConfig::default());
    let job = ScriptedJob::failing(0);
    let base = Utc::now();
    scheduler.register(job.clone(), options("a", 1)).await.unwrap();

    assert_eq!(scheduler.tick(base).await.unwrap(), 0);
    assert_eq!(scheduler.tick(at(base, 2)).await.unwrap(), 1);
    wait_idle(&scheduler, "a").await;

    assert_eq!(job.calls(), 1);
    assert!(definition(&scheduler, "a").await.next_run_at > at(base, 2));
    let history = scheduler
        .history("a", ExecutionOutcome::Completed)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.first().unwrap().summary.unwrap().examined, 1);
}

#[tokio::test]
async fn due_jobs_without_local_workers_are_left_alone() {
    let scheduler = scheduler(SchedulerConfig::default());
    let base = Utc::now();
    let orphan = RepeatDefinition {
        name: String::from("elsewhere"),
        options: options("orphan", 1),
        next_run_at: base,
        registered_at: base,
    };
    scheduler.registry().add_repeat(&orphan).await.unwrap();

    assert_eq!(scheduler.tick(at(base, 5)).await.unwrap(), 0);
    assert_eq!(definition(&scheduler, "orphan").await, orphan);
}

#[tokio::test]
async fn overlapping_occurrences_are_skipped() {
    let scheduler = scheduler(SchedulerConfig::default());
    let job = Arc::new(ScriptedJob {
        gate: Some(Notify::new()),
        ..ScriptedJob::default()
    });
    let base = Utc::now();
    scheduler.register(job.clone(), options("slow", 1)).await.unwrap();

    assert_eq!(scheduler.tick(at(base, 2)).await.unwrap(), 1);
    assert!(scheduler.is_in_flight("slow"));

    assert_eq!(scheduler.tick(at(base, 4)).await.unwrap(), 0);
    assert!(definition(&scheduler, "slow").await.next_run_at > at(base, 4));

    job.gate.as_ref().unwrap().notify_one();
    wait_idle(&scheduler, "slow").await;
    assert_eq!(job.calls(), 1);

    assert_eq!(scheduler.tick(at(base, 6)).await.unwrap(), 1);
    job.gate.as_ref().unwrap().notify_one();
    wait_idle(&scheduler, "slow").await;
    assert_eq!(job.calls(), 2);
}

#[tokio::test]
async fn rate_limited_jobs_stay_due() {
    let scheduler = scheduler(SchedulerConfig {
        rate_limit_max: 1,
        ..SchedulerConfig::default()
    });
    let base = Utc::now();
    scheduler
        .register(ScriptedJob::failing(0), options("a", 1))
        .await
        .unwrap();
    scheduler
        .register(ScriptedJob::failing(0), options("b", 1))
        .await
        .unwrap();

    let now = at(base, 2);
    assert_eq!(scheduler.tick(now).await.unwrap(), 1);

    let still_due = scheduler
        .repeats()
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.next_run_at <= now)
        .count();
    assert_eq!(still_due, 1);

    // The window is still full.
    assert_eq!(scheduler.tick(at(base, 3)).await.unwrap(), 0);
    wait_idle(&scheduler, "a").await;
    wait_idle(&scheduler, "b").await;
}

// =============================================================================
// Execution
// =============================================================================

#[tokio::test]
async fn failed_attempts_are_retried_with_backoff() {
    let scheduler = scheduler(SchedulerConfig::default());
    let job = ScriptedJob::failing(2);
    let base = Utc::now();
    scheduler.register(job.clone(), options("flaky", 3)).await.unwrap();

    scheduler.tick(at(base, 2)).await.unwrap();
    wait_idle(&scheduler, "flaky").await;

    assert_eq!(job.calls(), 3);
    let history = scheduler
        .history("flaky", ExecutionOutcome::Completed)
        .await
        .unwrap();
    let record = history.first().unwrap();
    assert_eq!(record.attempts_made, 3);
    assert!(record.error.is_none());
    assert!(
        scheduler
            .history("flaky", ExecutionOutcome::Failed)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn exhausted_attempts_record_a_failure() {
    let scheduler = scheduler(SchedulerConfig::default());
    let job = ScriptedJob::failing(10);
    let base = Utc::now();
    scheduler.register(job.clone(), options("broken", 2)).await.unwrap();

    scheduler.tick(at(base, 2)).await.unwrap();
    wait_idle(&scheduler, "broken").await;

    assert_eq!(job.calls(), 2);
    let history = scheduler
        .history("broken", ExecutionOutcome::Failed)
        .await
        .unwrap();
    let record = history.first().unwrap();
    assert_eq!(record.attempts_made, 2);
    assert_eq!(record.error.as_deref(), Some("attempt 2"));
    assert!(record.summary.is_none());
}

#[tokio::test]
async fn fatal_errors_skip_remaining_attempts() {
    let scheduler = scheduler(SchedulerConfig::default());
    let job = Arc::new(ScriptedJob {
        fatal: true,
        ..ScriptedJob::default()
    });
    let base = Utc::now();
    scheduler.register(job.clone(), options("fatal", 3)).await.unwrap();

    scheduler.tick(at(base, 2)).await.unwrap();
    wait_idle(&scheduler, "fatal").await;

    assert_eq!(job.calls(), 1);
    let history = scheduler
        .history("fatal", ExecutionOutcome::Failed)
        .await
        .unwrap();
    assert_eq!(history.first().unwrap().attempts_made, 1);

    // The next occurrence still runs.
    assert_eq!(scheduler.tick(at(base, 4)).await.unwrap(), 1);
    wait_idle(&scheduler, "fatal").await;
    assert_eq!(job.calls(), 2);
}

#[tokio::test]
async fn history_keeps_the_newest_records() {
    let scheduler = scheduler(SchedulerConfig::default());
    let job = ScriptedJob::failing(0);
    let base = Utc::now();
    let mut opts = options("trimmed", 1);
    opts.remove_on_complete = 2;
    scheduler.register(job.clone(), opts).await.unwrap();

    for step in 1..=3 {
        assert_eq!(scheduler.tick(at(base, step * 2)).await.unwrap(), 1);
        wait_idle(&scheduler, "trimmed").await;
    }

    let history = scheduler
        .history("trimmed", ExecutionOutcome::Completed)
        .await
        .unwrap();
    let examined: Vec<u32> = history
        .iter()
        .filter_map(|r| r.summary.map(|s| s.examined))
        .collect();
    assert_eq!(examined, vec![2, 3]);
}

#[tokio::test]
async fn stop_drains_worker_pools() {
    let scheduler = scheduler(SchedulerConfig {
        worker_concurrency: 3,
        ..SchedulerConfig::default()
    });
    let base = Utc::now();
    scheduler
        .register(ScriptedJob::failing(0), options("a", 1))
        .await
        .unwrap();
    scheduler.tick(at(base, 2)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), scheduler.stop())
        .await
        .unwrap();
    assert!(!scheduler.is_in_flight("a"));
    // Definitions outlive the local workers.
    assert_eq!(scheduler.repeats().await.unwrap().len(), 1);
}
