//! Backend selection.
//!
//! Builds the record store and job registry named by the `infrastructure`
//! section: `PostgreSQL` and `Dragonfly` for `external`, process memory for
//! `memory`.

use petfarm_core::config::{Backend, InfrastructureConfig};
use petfarm_db::{
    DbError, DragonflyJobRegistry, DragonflyPool, JobRegistry, MemoryJobRegistry, MemoryStore,
    PgRecordStore, PostgresPool, RecordStore,
};
use tracing::info;

/// Connect the record store and run its migrations.
pub async fn record_store(config: &InfrastructureConfig) -> Result<RecordStore, DbError> {
    match config.record_store {
        Backend::Memory => {
            info!("Using in-memory record store");
            Ok(RecordStore::from(MemoryStore::new()))
        }
        Backend::External => {
            let pool = PostgresPool::connect(&config.postgres()).await?;
            pool.run_migrations().await?;
            info!("PostgreSQL record store ready");
            Ok(RecordStore::from(PgRecordStore::from(pool)))
        }
    }
}

/// Connect the job registry.
pub async fn job_registry(config: &InfrastructureConfig) -> Result<JobRegistry, DbError> {
    match config.job_registry {
        Backend::Memory => {
            info!("Using in-memory job registry; registrations will not survive a restart");
            Ok(JobRegistry::from(MemoryJobRegistry::new()))
        }
        Backend::External => {
            let pool = DragonflyPool::connect(&config.dragonfly_url).await?;
            info!("Dragonfly job registry ready");
            Ok(JobRegistry::from(DragonflyJobRegistry::new(pool)))
        }
    }
}
