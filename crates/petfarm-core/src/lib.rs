//! Sessions, transactions, event dispatch, and job scheduling for Petfarm.
//!
//! This crate owns everything between the messaging layer and the data
//! layer: player actions arrive as [`Envelope`]s, are routed by the
//! [`Dispatcher`] to the [`ActionHandler`], and run as all-or-nothing flows
//! in the [`TransactionManager`]. In the background the [`Scheduler`] drives
//! the evolution, income, and decay passes.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `petfarm-config.yaml`
//! - [`catalog`] -- Idempotent seeding of pet types and store items
//! - [`dispatcher`] -- Topic routing with multiple subscribers per topic
//! - [`event_loop`] -- Sequential consumer of inbound envelopes
//! - [`events`] -- Outbound server events and acknowledgments
//! - [`handlers`] -- Action handler mapping topics to flows
//! - [`session`] -- Connect, disconnect, and per-session mirrors
//! - [`transactions`] -- Player-action flows with conflict retries
//! - [`scheduler`] -- Repeatable jobs, retries, history, worker pools
//! - [`rate_limit`] -- Sliding-window limiter for job starts
//! - [`jobs`] -- The evolution, income, and decay passes
//! - [`runtime`] -- Service assembly
//! - [`shutdown`] -- Cooperative stop signal
//!
//! [`Envelope`]: petfarm_types::Envelope
//! [`Dispatcher`]: dispatcher::Dispatcher
//! [`ActionHandler`]: handlers::ActionHandler
//! [`TransactionManager`]: transactions::TransactionManager
//! [`Scheduler`]: scheduler::Scheduler

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod event_loop;
pub mod events;
pub mod handlers;
pub mod jobs;
pub mod rate_limit;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod shutdown;
pub mod transactions;

pub use config::{ConfigError, PetfarmConfig};
pub use events::Notifier;
pub use runtime::Runtime;
pub use scheduler::{JobError, Scheduler, SchedulerError};
pub use session::{SessionError, SessionService};
pub use transactions::{TransactionError, TransactionManager};
