//! # Progressions Crawler Server
//!
//! Watches the 500px "fresh" feed and follows every newly published photo
//! through a fixed snapshot schedule, saving the raw photo and owner pages
//! at each step. The resulting store is the input of the offline parsing
//! and analysis tools.
//!
//! ## Lifecycle:
//! 1. Load `.env`, resolve configuration, install logging.
//! 2. Seed the registry with every record already in the output directory,
//!    so a restart never re-observes a photo.
//! 3. Start the staggered worker pool.
//! 4. On Ctrl-C or SIGTERM set the shared cancellation signal; workers close
//!    their current photo with a terminal marker and exit.
//! 5. A fatal discovery failure stops the pool and exits with code 2, so a
//!    supervisor can restart the process.

use anyhow::Result;
use lib_common::core::{Orchestrator, OrchestratorConfig, Registry, ScheduleExecutor};
use lib_common::ingestors::{Discovery, FreshFeed, SiteFetcher};
use lib_common::storage::{ItemRecordState, SnapshotStore};
use lib_common::CrawlerError;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod progressions_logic;
use progressions_logic::config::{self, Settings};
use progressions_logic::logger;

/// Exit status for a discovery failure.
const EXIT_DISCOVERY_UNAVAILABLE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let settings = match config::load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logger::setup_logging(&settings.log_dir, &settings.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(settings).await {
        Ok(()) => {
            info!("Shutdown complete.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let fatal = e
                .downcast_ref::<CrawlerError>()
                .is_some_and(CrawlerError::is_fatal);
            error!(error = %format!("{:#}", e), "crawler stopped");
            if fatal {
                ExitCode::from(EXIT_DISCOVERY_UNAVAILABLE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(settings: Settings) -> Result<()> {
    info!(
        output_dir = %settings.output_dir.display(),
        workers = settings.workers,
        schedule = %settings.schedule,
        horizon_secs = settings.schedule.horizon().as_secs(),
        "starting progressions crawler"
    );

    let store = Arc::new(SnapshotStore::new(&settings.output_dir));
    store.ensure_root().await?;

    let existing = store.existing_item_ids().await?;
    let mut incomplete = 0usize;
    for id in &existing {
        if store.record_state(*id).await? == ItemRecordState::Incomplete {
            incomplete += 1;
        }
    }
    info!(
        records = existing.len(),
        incomplete, "seeding registry from snapshot store"
    );
    let registry = Arc::new(Registry::seeded(existing));

    let feed = FreshFeed::new(&settings.feed_url)?;
    let fetcher = SiteFetcher::new(&settings.site_url)?;

    let discovery = Arc::new(
        Discovery::new(Arc::new(feed), registry).with_poll_interval(settings.poll_interval),
    );
    let executor = Arc::new(
        ScheduleExecutor::new(settings.schedule.clone(), Arc::new(fetcher), store)
            .with_error_threshold(settings.error_threshold),
    );
    let orchestrator = Orchestrator::new(
        OrchestratorConfig {
            workers: settings.workers,
            stagger_min: settings.stagger_min,
            stagger_max: settings.stagger_max,
        },
        discovery,
        executor,
    );

    let cancel = orchestrator.cancellation();
    tokio::spawn(shutdown_on_signal(cancel));

    let report = orchestrator.run().await?;
    info!(
        workers = report.workers_started,
        finished = report.items_finished,
        incomplete = report.items_incomplete,
        panicked = report.workers_panicked,
        "worker pool drained"
    );
    Ok(())
}

/// Sets `cancel` on the first Ctrl-C or SIGTERM.
async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Ctrl-C received, initiating shutdown."),
                    _ = term_signal.recv() => info!("SIGTERM received, initiating shutdown."),
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM, Ctrl-C only");
                if let Err(e) = signal::ctrl_c().await {
                    error!(error = %e, "cannot listen for Ctrl-C");
                    return;
                }
                info!("Ctrl-C received, initiating shutdown.");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "cannot listen for Ctrl-C");
            return;
        }
        info!("Ctrl-C received, initiating shutdown.");
    }

    cancel.cancel();
}
