//! Service assembly.
//!
//! [`Runtime::build`] wires every service from the configuration and two
//! backends; nothing is global. The binary (or a test) then registers the
//! jobs, starts the background tasks, and hands [`Runtime::inbound`] to the
//! messaging layer.

use std::sync::Arc;

use petfarm_db::{JobRegistry, RecordStore};
use petfarm_types::Envelope;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{JobConfig, PetfarmConfig};
use crate::dispatcher::{Dispatcher, Handler};
use crate::event_loop::EventLoop;
use crate::events::Notifier;
use crate::handlers::ActionHandler;
use crate::jobs::{JobContext, SimulationJob, StoreSlot};
use crate::scheduler::{Runnable, Scheduler, SchedulerError};
use crate::session::{ProfileSource, SessionRegistry, SessionService};
use crate::shutdown::Shutdown;
use crate::transactions::TransactionManager;

/// Every long-lived service of a Petfarm process.
pub struct Runtime {
    /// The loaded configuration.
    pub config: PetfarmConfig,
    /// The record store.
    pub store: RecordStore,
    /// Open sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Session open and close.
    pub session_service: Arc<SessionService>,
    /// Player-action flows.
    pub transactions: Arc<TransactionManager>,
    /// Inbound action routing.
    pub dispatcher: Arc<Dispatcher>,
    /// Outbound events.
    pub notifier: Notifier,
    /// Recurring jobs.
    pub scheduler: Arc<Scheduler>,
    /// Stop signal for background tasks.
    pub shutdown: Arc<Shutdown>,
    inbound: mpsc::Sender<Envelope>,
    event_loop: Option<EventLoop>,
}

impl Runtime {
    /// Wire every service.
    pub async fn build(config: PetfarmConfig, store: RecordStore, registry: JobRegistry) -> Self {
        let sessions = Arc::new(SessionRegistry::with_ack_capacity(
            config.session.ack_cache_size,
        ));
        let notifier = Notifier::new(config.session.outbound_capacity);
        let session_service = Arc::new(SessionService::new(
            store.clone(),
            Arc::clone(&sessions),
            ProfileSource::from_config(&config.session),
            config.session.clone(),
        ));
        let transactions = Arc::new(TransactionManager::new(
            store.clone(),
            Arc::clone(&sessions),
            config.rules.clone(),
            config.transactions.max_conflict_retries,
        ));

        let dispatcher = Arc::new(Dispatcher::new());
        let handler: Arc<dyn Handler> = Arc::new(ActionHandler::new(
            Arc::clone(&transactions),
            Arc::clone(&sessions),
        ));
        dispatcher.subscribe_all(&handler).await;

        let (inbound, rx) = mpsc::channel(config.session.inbound_capacity.max(1));
        let event_loop = EventLoop::new(Arc::clone(&dispatcher), notifier.clone(), rx);
        let scheduler = Arc::new(Scheduler::new(registry, config.scheduler.clone()));

        tracing::info!(
            store = store.name(),
            registry = scheduler.registry().name(),
            "Runtime assembled"
        );

        Self {
            config,
            store,
            sessions,
            session_service,
            transactions,
            dispatcher,
            notifier,
            scheduler,
            shutdown: Arc::new(Shutdown::new()),
            inbound,
            event_loop: Some(event_loop),
        }
    }

    /// Sender for inbound player actions.
    pub fn inbound(&self) -> mpsc::Sender<Envelope> {
        self.inbound.clone()
    }

    /// Context shared by the simulation jobs.
    pub fn job_context(&self) -> JobContext {
        JobContext {
            store: StoreSlot::ready(self.store.clone()),
            sessions: Arc::clone(&self.sessions),
            notifier: self.notifier.clone(),
        }
    }

    /// Register every enabled simulation job. Returns each job id with
    /// whether it was newly registered.
    pub async fn register_jobs(&self) -> Result<Vec<(&'static str, bool)>, SchedulerError> {
        let ctx = self.job_context();
        let jobs: [(SimulationJob, &JobConfig); 3] = [
            (SimulationJob::Evolution(ctx.clone()), &self.config.jobs.evolution),
            (SimulationJob::Income(ctx.clone()), &self.config.jobs.income),
            (SimulationJob::Decay(ctx), &self.config.jobs.decay),
        ];

        let mut registered = Vec::with_capacity(jobs.len());
        for (job, job_config) in jobs {
            let job_id = job.job_id();
            if !job_config.enabled {
                tracing::info!(job_id, "Job disabled");
                continue;
            }
            let job: Arc<dyn Runnable> = Arc::new(job);
            let created = self
                .scheduler
                .register(job, job_config.options(job_id))
                .await?;
            registered.push((job_id, created));
        }
        Ok(registered)
    }

    /// Spawn the scheduler and the event loop. The event loop is only
    /// spawned by the first call.
    pub fn start(&mut self) -> Vec<JoinHandle<()>> {
        let mut handles = vec![tokio::spawn(
            Arc::clone(&self.scheduler).run(Arc::clone(&self.shutdown)),
        )];
        if let Some(event_loop) = self.event_loop.take() {
            let shutdown = Arc::clone(&self.shutdown);
            handles.push(tokio::spawn(async move {
                event_loop.run(shutdown).await;
            }));
        }
        handles
    }

    /// Signal every background task to stop.
    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.shutdown.trigger();
    }
}
