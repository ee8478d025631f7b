//! Server binary for the Petfarm simulation.
//!
//! Wires the record store, job registry, catalog, scheduler, and action
//! loop together and runs until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `petfarm-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Connect the record store and run migrations
//! 4. Connect the job registry
//! 5. Seed the catalog
//! 6. Assemble the runtime and register the simulation jobs
//! 7. Start the scheduler and the action loop
//! 8. Wait for Ctrl-C, then drain and exit

mod backends;
mod error;

use std::path::Path;
use std::sync::Arc;

use petfarm_core::catalog::seed_catalog;
use petfarm_core::config::{LoggingConfig, PetfarmConfig};
use petfarm_core::runtime::Runtime;
use petfarm_core::shutdown::Shutdown;
use petfarm_types::{Outbound, ServerEvent};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ServerError;

/// Config file read from the working directory.
const CONFIG_PATH: &str = "petfarm-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        record_store = ?config.infrastructure.record_store,
        job_registry = ?config.infrastructure.job_registry,
        tick_interval_ms = config.scheduler.tick_interval_ms,
        "petfarm-server starting"
    );

    // 3-4. Connect backends.
    let store = backends::record_store(&config.infrastructure)
        .await
        .map_err(ServerError::from)?;
    let registry = backends::job_registry(&config.infrastructure)
        .await
        .map_err(ServerError::from)?;

    // 5. Seed the catalog.
    let seeded = seed_catalog(&store, &config.catalog)
        .await
        .map_err(ServerError::from)?;
    info!(
        pet_types = seeded.pet_types,
        items = seeded.items,
        "Catalog seeded"
    );

    // 6. Assemble services and register jobs.
    let mut runtime = Runtime::build(config, store, registry).await;
    for (job_id, created) in runtime.register_jobs().await.map_err(ServerError::from)? {
        info!(job_id, created, "Job bound to local workers");
    }

    // 7. Start background tasks.
    let mut handles = runtime.start();
    handles.push(tokio::spawn(log_outbound(
        runtime.notifier.subscribe(),
        Arc::clone(&runtime.shutdown),
    )));
    info!("petfarm-server ready");

    // 8. Run until Ctrl-C.
    tokio::signal::ctrl_c().await.map_err(ServerError::from)?;
    runtime.shutdown();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Background task ended abnormally");
        }
    }
    runtime.store.close().await;

    info!("petfarm-server shutdown complete");
    Ok(())
}

/// Load `petfarm-config.yaml`, falling back to defaults when absent.
fn load_config() -> Result<PetfarmConfig, ServerError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok(PetfarmConfig::from_file(path)?)
    } else {
        // Logging is not up yet.
        eprintln!("{CONFIG_PATH} not found, using defaults");
        Ok(PetfarmConfig::parse("{}")?)
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `logging.level`.
fn init_logging(config: &LoggingConfig) -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ServerError::Logging {
        message: e.to_string(),
    })
}

/// Trace outbound events until shutdown. The messaging layer subscribes to
/// the same broadcast.
async fn log_outbound(mut events: broadcast::Receiver<Outbound>, shutdown: Arc<Shutdown>) {
    loop {
        let received = tokio::select! {
            () = shutdown.wait() => return,
            received = events.recv() => received,
        };
        match received {
            Ok(Outbound {
                player_id,
                event: ServerEvent::Ack { ack },
            }) => tracing::trace!(
                player_id = %player_id,
                request_id = %ack.request_id,
                success = ack.success,
                "Ack sent"
            ),
            Ok(outbound) => tracing::trace!(
                player_id = %outbound.player_id,
                event = ?outbound.event,
                "Event sent"
            ),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Outbound log lagged");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
