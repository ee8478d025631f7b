//! Job registry: repeat definitions and execution history.
//!
//! The scheduler keeps its authoritative list of recurring jobs here so that
//! registration is deduplicated by job id and survives restarts when the
//! backend is durable. Execution history is kept per job id and outcome,
//! trimmed to the retention counts in the job's options.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use petfarm_types::{ExecutionOutcome, ExecutionRecord, RepeatDefinition};
use tokio::sync::RwLock;

use crate::dragonfly::DragonflyPool;
use crate::error::DbError;

/// Key of the set listing every registered job id.
const REPEAT_INDEX_KEY: &str = "jobs:repeat:index";

fn repeat_key(job_id: &str) -> String {
    format!("jobs:repeat:{job_id}")
}

const fn outcome_suffix(outcome: ExecutionOutcome) -> &'static str {
    match outcome {
        ExecutionOutcome::Completed => "completed",
        ExecutionOutcome::Failed => "failed",
    }
}

fn history_key(job_id: &str, outcome: ExecutionOutcome) -> String {
    format!("jobs:history:{job_id}:{}", outcome_suffix(outcome))
}

// ---------------------------------------------------------------------------
// In-memory registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryRegistryState {
    repeats: BTreeMap<String, RepeatDefinition>,
    history: BTreeMap<(String, ExecutionOutcome), VecDeque<ExecutionRecord>>,
}

/// Process-local job registry. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryJobRegistry {
    state: Arc<RwLock<MemoryRegistryState>>,
}

impl MemoryJobRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_repeat(&self, job_id: &str) -> Option<RepeatDefinition> {
        self.state.read().await.repeats.get(job_id).cloned()
    }

    async fn add_repeat(&self, definition: &RepeatDefinition) -> bool {
        let mut state = self.state.write().await;
        if state.repeats.contains_key(definition.job_id()) {
            return false;
        }
        state
            .repeats
            .insert(definition.job_id().to_owned(), definition.clone());
        true
    }

    async fn save_repeat(&self, definition: &RepeatDefinition) {
        self.state
            .write()
            .await
            .repeats
            .insert(definition.job_id().to_owned(), definition.clone());
    }

    async fn remove_repeat(&self, job_id: &str) -> Option<RepeatDefinition> {
        self.state.write().await.repeats.remove(job_id)
    }

    async fn list_repeats(&self) -> Vec<RepeatDefinition> {
        self.state.read().await.repeats.values().cloned().collect()
    }

    async fn record(&self, record: &ExecutionRecord, keep: usize) {
        let mut state = self.state.write().await;
        let list = state
            .history
            .entry((record.job_id.clone(), record.outcome))
            .or_default();
        list.push_back(record.clone());
        while list.len() > keep {
            let _ = list.pop_front();
        }
    }

    async fn history(&self, job_id: &str, outcome: ExecutionOutcome) -> Vec<ExecutionRecord> {
        self.state
            .read()
            .await
            .history
            .get(&(job_id.to_owned(), outcome))
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Dragonfly registry
// ---------------------------------------------------------------------------

/// Job registry stored in `Dragonfly`.
#[derive(Clone)]
pub struct DragonflyJobRegistry {
    pool: DragonflyPool,
}

impl DragonflyJobRegistry {
    /// Create a registry on an open `Dragonfly` connection.
    pub const fn new(pool: DragonflyPool) -> Self {
        Self { pool }
    }

    async fn get_repeat(&self, job_id: &str) -> Result<Option<RepeatDefinition>, DbError> {
        self.pool.get_json(&repeat_key(job_id)).await
    }

    async fn add_repeat(&self, definition: &RepeatDefinition) -> Result<bool, DbError> {
        let created = self
            .pool
            .set_json_if_absent(&repeat_key(definition.job_id()), definition)
            .await?;
        if created {
            self.pool
                .set_add(REPEAT_INDEX_KEY, definition.job_id())
                .await?;
        }
        Ok(created)
    }

    async fn save_repeat(&self, definition: &RepeatDefinition) -> Result<(), DbError> {
        self.pool
            .set_json(&repeat_key(definition.job_id()), definition)
            .await?;
        self.pool
            .set_add(REPEAT_INDEX_KEY, definition.job_id())
            .await
    }

    async fn remove_repeat(&self, job_id: &str) -> Result<Option<RepeatDefinition>, DbError> {
        let existing = self.get_repeat(job_id).await?;
        if existing.is_some() {
            self.pool.delete(&repeat_key(job_id)).await?;
            self.pool.set_remove(REPEAT_INDEX_KEY, job_id).await?;
        }
        Ok(existing)
    }

    async fn list_repeats(&self) -> Result<Vec<RepeatDefinition>, DbError> {
        let mut ids = self.pool.set_members(REPEAT_INDEX_KEY).await?;
        ids.sort();
        let mut definitions = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(definition) = self.get_repeat(id).await? {
                definitions.push(definition);
            }
        }
        Ok(definitions)
    }

    async fn record(&self, record: &ExecutionRecord, keep: usize) -> Result<(), DbError> {
        self.pool
            .push_capped(&history_key(&record.job_id, record.outcome), record, keep)
            .await
    }

    async fn history(
        &self,
        job_id: &str,
        outcome: ExecutionOutcome,
    ) -> Result<Vec<ExecutionRecord>, DbError> {
        self.pool.list_json(&history_key(job_id, outcome)).await
    }
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// A job registry backend.
#[derive(Clone)]
pub enum JobRegistry {
    /// Process-local; definitions are lost on restart.
    Memory(MemoryJobRegistry),
    /// Durable, shared through `Dragonfly`.
    Dragonfly(DragonflyJobRegistry),
}

impl JobRegistry {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Dragonfly(_) => "dragonfly",
        }
    }

    /// The repeat definition for `job_id`, if registered.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn get_repeat(&self, job_id: &str) -> Result<Option<RepeatDefinition>, DbError> {
        match self {
            Self::Memory(r) => Ok(r.get_repeat(job_id).await),
            Self::Dragonfly(r) => r.get_repeat(job_id).await,
        }
    }

    /// Store `definition` unless its job id is already registered.
    ///
    /// Returns whether it was stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend fails.
    pub async fn add_repeat(&self, definition: &RepeatDefinition) -> Result<bool, DbError> {
        match self {
            Self::Memory(r) => Ok(r.add_repeat(definition).await),
            Self::Dragonfly(r) => r.add_repeat(definition).await,
        }
    }

    /// Overwrite the stored definition (used to persist `next_run_at`).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn save_repeat(&self, definition: &RepeatDefinition) -> Result<(), DbError> {
        match self {
            Self::Memory(r) => {
                r.save_repeat(definition).await;
                Ok(())
            }
            Self::Dragonfly(r) => r.save_repeat(definition).await,
        }
    }

    /// Delete the definition for `job_id`, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend fails.
    pub async fn remove_repeat(&self, job_id: &str) -> Result<Option<RepeatDefinition>, DbError> {
        match self {
            Self::Memory(r) => Ok(r.remove_repeat(job_id).await),
            Self::Dragonfly(r) => r.remove_repeat(job_id).await,
        }
    }

    /// Every registered definition, ordered by job id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn list_repeats(&self) -> Result<Vec<RepeatDefinition>, DbError> {
        match self {
            Self::Memory(r) => Ok(r.list_repeats().await),
            Self::Dragonfly(r) => r.list_repeats().await,
        }
    }

    /// Append an execution record, keeping the newest `keep` records for
    /// its job id and outcome.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn record(&self, record: &ExecutionRecord, keep: usize) -> Result<(), DbError> {
        match self {
            Self::Memory(r) => {
                r.record(record, keep).await;
                Ok(())
            }
            Self::Dragonfly(r) => r.record(record, keep).await,
        }
    }

    /// Retained execution records for `job_id` with `outcome`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn history(
        &self,
        job_id: &str,
        outcome: ExecutionOutcome,
    ) -> Result<Vec<ExecutionRecord>, DbError> {
        match self {
            Self::Memory(r) => Ok(r.history(job_id, outcome).await),
            Self::Dragonfly(r) => r.history(job_id, outcome).await,
        }
    }
}

impl From<MemoryJobRegistry> for JobRegistry {
    fn from(registry: MemoryJobRegistry) -> Self {
        Self::Memory(registry)
    }
}

impl From<DragonflyJobRegistry> for JobRegistry {
    fn from(registry: DragonflyJobRegistry) -> Self {
        Self::Dragonfly(registry)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use petfarm_types::{Backoff, JobOptions};
    use uuid::Uuid;

    use super::*;

    fn definition(job_id: &str, every_ms: u64) -> RepeatDefinition {
        RepeatDefinition {
            name: job_id.to_owned(),
            options: JobOptions {
                job_id: job_id.to_owned(),
                repeat_every_ms: every_ms,
                remove_on_complete: 2,
                remove_on_fail: 5,
                attempts: 3,
                backoff: Backoff::exponential(100),
            },
            next_run_at: Utc::now(),
            registered_at: Utc::now(),
        }
    }

    fn record(job_id: &str, outcome: ExecutionOutcome) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: Uuid::now_v7(),
            job_id: job_id.to_owned(),
            outcome,
            attempts_made: 1,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            summary: None,
            error: None,
        }
    }

    #[test]
    fn keys_follow_documented_patterns() {
        assert_eq!(repeat_key("pets.income"), "jobs:repeat:pets.income");
        assert_eq!(
            history_key("pets.income", ExecutionOutcome::Failed),
            "jobs:history:pets.income:failed"
        );
    }

    #[tokio::test]
    async fn add_is_deduplicated_by_job_id() {
        let registry = JobRegistry::from(MemoryJobRegistry::new());
        assert!(registry.add_repeat(&definition("pets.decay", 1_000)).await.unwrap());
        assert!(!registry.add_repeat(&definition("pets.decay", 9_000)).await.unwrap());
        let stored = registry.get_repeat("pets.decay").await.unwrap().unwrap();
        assert_eq!(stored.options.repeat_every_ms, 1_000);
        assert_eq!(registry.list_repeats().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_pruned_to_keep_count() {
        let registry = JobRegistry::from(MemoryJobRegistry::new());
        let mut ids = Vec::new();
        for _ in 0..4 {
            let r = record("pets.income", ExecutionOutcome::Completed);
            ids.push(r.execution_id);
            registry.record(&r, 2).await.unwrap();
        }
        let kept = registry
            .history("pets.income", ExecutionOutcome::Completed)
            .await
            .unwrap();
        let kept_ids: Vec<Uuid> = kept.iter().map(|r| r.execution_id).collect();
        assert_eq!(kept_ids, ids.get(2..).unwrap());
        assert!(
            registry
                .history("pets.income", ExecutionOutcome::Failed)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn remove_returns_the_definition() {
        let registry = JobRegistry::from(MemoryJobRegistry::new());
        registry.add_repeat(&definition("pets.evolution", 500)).await.unwrap();
        let removed = registry.remove_repeat("pets.evolution").await.unwrap();
        assert_eq!(removed.unwrap().options.repeat_every_ms, 500);
        assert!(registry.remove_repeat("pets.evolution").await.unwrap().is_none());
    }
}
