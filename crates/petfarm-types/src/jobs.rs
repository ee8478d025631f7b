//! Recurring job contract: registration options, persisted repeat
//! definitions, and execution history records.
//!
//! Option field names follow the job queue's camelCase wire format
//! (`jobId`, `repeatEveryMs`, `removeOnComplete`, ...).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Growth rule applied to the delay between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BackoffKind {
    /// Delay doubles on every retry.
    Exponential,
    /// Delay stays constant.
    Fixed,
}

/// Retry delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Backoff {
    /// Growth rule.
    #[serde(rename = "type")]
    pub kind: BackoffKind,
    /// Base delay in milliseconds.
    pub delay_ms: u64,
}

impl Backoff {
    /// Exponential backoff starting at `delay_ms`.
    pub const fn exponential(delay_ms: u64) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            delay_ms,
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// Exponential: `delay * 2^(retry - 1)`, saturating.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let millis = match self.kind {
            BackoffKind::Fixed => self.delay_ms,
            BackoffKind::Exponential => {
                let exponent = retry.saturating_sub(1).min(63);
                let factor = 1_u64.checked_shl(exponent).unwrap_or(u64::MAX);
                self.delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(millis)
    }
}

/// Registration options for a repeating job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct JobOptions {
    /// Stable identifier, one per job type.
    pub job_id: String,
    /// Repeat interval in milliseconds.
    pub repeat_every_ms: u64,
    /// Completed executions kept in history.
    pub remove_on_complete: usize,
    /// Failed executions kept in history.
    pub remove_on_fail: usize,
    /// Total attempts per execution, first try included.
    pub attempts: u32,
    /// Delay policy between attempts.
    pub backoff: Backoff,
}

impl JobOptions {
    /// The repeat interval.
    pub const fn repeat_every(&self) -> Duration {
        Duration::from_millis(self.repeat_every_ms)
    }
}

/// A registered repeating job, as persisted in the job registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RepeatDefinition {
    /// Job name (the handler it runs).
    pub name: String,
    /// Registration options.
    pub options: JobOptions,
    /// When the job is next due.
    pub next_run_at: DateTime<Utc>,
    /// When the job was first registered.
    pub registered_at: DateTime<Utc>,
}

impl RepeatDefinition {
    /// The stable job id.
    pub fn job_id(&self) -> &str {
        &self.options.job_id
    }
}

/// Final state of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ExecutionOutcome {
    /// The job body returned successfully.
    Completed,
    /// The job body failed on every attempt, or failed fatally.
    Failed,
}

/// Per-pet counters reported by a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct JobSummary {
    /// Pets examined.
    pub examined: u32,
    /// Pets written back.
    pub updated: u32,
    /// Pets with nothing to do this pass.
    pub skipped: u32,
    /// Pets whose processing failed and was logged.
    pub failed: u32,
}

/// One execution in a job's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ExecutionRecord {
    /// Unique execution id.
    pub execution_id: Uuid,
    /// Stable job id.
    pub job_id: String,
    /// Final state.
    pub outcome: ExecutionOutcome,
    /// Attempts consumed.
    pub attempts_made: u32,
    /// When the first attempt started.
    pub started_at: DateTime<Utc>,
    /// When the execution finished.
    pub finished_at: DateTime<Utc>,
    /// Counters from the successful attempt.
    pub summary: Option<JobSummary>,
    /// Last error message, for failures.
    pub error: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = Backoff::exponential(500);
        assert_eq!(backoff.delay_for(1), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(1_000));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(2_000));
    }

    #[test]
    fn exponential_backoff_saturates() {
        let backoff = Backoff::exponential(u64::MAX / 2);
        assert_eq!(backoff.delay_for(40), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff {
            kind: BackoffKind::Fixed,
            delay_ms: 250,
        };
        assert_eq!(backoff.delay_for(1), backoff.delay_for(7));
    }

    #[test]
    fn options_use_camel_case_wire_names() {
        let options = JobOptions {
            job_id: String::from("pets.income"),
            repeat_every_ms: 60_000,
            remove_on_complete: 10,
            remove_on_fail: 50,
            attempts: 3,
            backoff: Backoff::exponential(1_000),
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["jobId"], "pets.income");
        assert_eq!(json["repeatEveryMs"], 60_000);
        assert_eq!(json["backoff"]["type"], "exponential");
        assert_eq!(json["backoff"]["delayMs"], 1_000);
    }
}
