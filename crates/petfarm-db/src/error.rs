//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] and [`fred`] errors, plus the store-level outcomes callers
//! branch on: a missing document and a failed version check.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A document or key was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional write saw a different version than expected.
    #[error("Version conflict on {collection} {id}: expected version {expected}")]
    Conflict {
        /// Collection the document lives in.
        collection: &'static str,
        /// Document id.
        id: String,
        /// Version the writer read.
        expected: u64,
    },

    /// The store cannot serve requests (not connected, or a test fault).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether this is an optimistic concurrency conflict.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether retrying the same operation later can succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Postgres(_) | Self::Dragonfly(_) | Self::Conflict { .. } | Self::Unavailable(_)
        )
    }
}
