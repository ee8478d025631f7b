//! Data layer for the Petfarm simulation (`PostgreSQL` + `Dragonfly`).
//!
//! `PostgreSQL` is the durable record store for players, pets, the catalog,
//! and the token ledger. `Dragonfly` holds the job registry. Both have
//! in-memory counterparts with fault injection for tests.
//!
//! # Architecture
//!
//! ```text
//! Transaction manager / jobs / sessions
//!     |
//!     +-- RecordStore --+-- PgRecordStore  (PostgresPool)
//!     |                 +-- MemoryStore
//!     |
//! Scheduler
//!     |
//!     +-- JobRegistry --+-- DragonflyJobRegistry (DragonflyPool)
//!                       +-- MemoryJobRegistry
//! ```
//!
//! # Modules
//!
//! - [`store`] -- Record store dispatch, write sets, commit results
//! - [`memory`] -- In-memory record store with fault injection
//! - [`pg_store`] -- `PostgreSQL` record store (JSONB documents)
//! - [`postgres`] -- `PostgreSQL` connection pool and migrations
//! - [`dragonfly`] -- `Dragonfly` connection and typed key operations
//! - [`registry`] -- Job registry (repeat definitions, execution history)
//! - [`error`] -- Shared error types

pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod pg_store;
pub mod postgres;
pub mod registry;
pub mod store;

// Re-export primary types for convenience.
pub use dragonfly::DragonflyPool;
pub use error::DbError;
pub use memory::MemoryStore;
pub use pg_store::PgRecordStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use registry::{DragonflyJobRegistry, JobRegistry, MemoryJobRegistry};
pub use store::{Committed, RecordStore, WriteSet};
