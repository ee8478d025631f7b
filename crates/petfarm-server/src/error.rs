//! Error types for the server binary.
//!
//! [`ServerError`] wraps every failure that can stop startup.

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: petfarm_core::ConfigError,
    },

    /// A backend could not be reached, migrated, or seeded.
    #[error("database error: {source}")]
    Database {
        /// The underlying data layer error.
        #[from]
        source: petfarm_db::DbError,
    },

    /// Job registration failed.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: petfarm_core::SchedulerError,
    },

    /// Logging could not be initialized.
    #[error("logging error: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
