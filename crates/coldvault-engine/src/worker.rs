//! Background worker for continuous lifecycle operation

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::EventSink;
use crate::lifecycle::LifecycleScheduler;
use crate::poller::RestorePoller;
use crate::pool::CancelToken;
use coldvault_provider::ProviderRegistry;
use coldvault_store::MetadataStore;
use std::sync::Arc;
use tokio::time::interval;

/// Background worker that runs lifecycle sweeps and restore checks on a
/// schedule
///
/// Sweeps run at the configured sweep interval; restore checks run on their
/// own, shorter interval so completed restores surface promptly.
///
/// # Examples
///
/// ```no_run
/// use coldvault_engine::{EngineConfig, LifecycleWorker, LogEventSink};
/// use coldvault_provider::{LocalConfig, LocalProvider, ProviderRegistry};
/// use coldvault_store::SqliteMetadataStore;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(SqliteMetadataStore::new("coldvault.db")?);
///     let mut providers = ProviderRegistry::new();
///     providers.register(Arc::new(LocalProvider::new(LocalConfig::new("/var/coldvault"))));
///
///     let worker = LifecycleWorker::new(
///         EngineConfig::default(),
///         store,
///         Arc::new(providers),
///         Arc::new(LogEventSink),
///     );
///
///     // Run until Ctrl+C
///     worker.run().await?;
///     Ok(())
/// }
/// ```
pub struct LifecycleWorker {
    scheduler: LifecycleScheduler,
    poller: RestorePoller,
    config: EngineConfig,
    cancel: CancelToken,
}

impl LifecycleWorker {
    /// Create a worker (and its scheduler and poller) with the given
    /// configuration
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn MetadataStore>,
        providers: Arc<ProviderRegistry>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let scheduler = LifecycleScheduler::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&providers),
            Arc::clone(&events),
        );
        let poller = RestorePoller::new(config.clone(), store, providers, events);
        Self {
            scheduler,
            poller,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// A token that stops the worker when fired
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run the worker indefinitely
    ///
    /// Runs until a shutdown signal (Ctrl+C) is received or the cancel token
    /// fires. Per-document transitions are atomic, so stopping between queue
    /// items never leaves a half-applied document.
    pub async fn run(&self) -> Result<(), EngineError> {
        let mut sweep_ticker = interval(self.config.sweep_interval());
        let mut restore_ticker = interval(self.config.restore_poll_interval());

        tracing::info!(
            "Lifecycle worker started (sweep every {:?}, restore check every {:?})",
            self.config.sweep_interval(),
            self.config.restore_poll_interval()
        );

        loop {
            tokio::select! {
                _ = sweep_ticker.tick() => {
                    tracing::debug!("Starting lifecycle sweep");
                    match self.scheduler.run_sweep(self.config.dry_run, &self.cancel).await {
                        Ok(report) => {
                            tracing::info!(
                                "Sweep completed: {} processed, {} transitioned, {} failed",
                                report.processed,
                                report.transitioned,
                                report.failed
                            );
                        }
                        Err(e) => {
                            tracing::error!("Sweep failed: {}", e);
                        }
                    }
                }
                _ = restore_ticker.tick() => {
                    tracing::debug!("Starting restore check");
                    match self.poller.run_check(&self.cancel).await {
                        Ok(report) => {
                            if report.checked > 0 {
                                tracing::info!(
                                    "Restore check: {} checked, {} completed, {} expired",
                                    report.checked,
                                    report.completed,
                                    report.expired
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!("Restore check failed: {}", e);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping lifecycle worker");
                    break;
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!("Cancel token fired, stopping lifecycle worker");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run for a specific number of sweep cycles (useful for testing)
    ///
    /// Each cycle runs one lifecycle sweep followed by one restore check.
    pub async fn run_cycles(&self, cycles: usize) -> Result<(), EngineError> {
        let mut ticker = interval(self.config.sweep_interval());

        tracing::info!("Lifecycle worker started for {} cycles", cycles);

        for cycle in 0..cycles {
            ticker.tick().await;
            if self.cancel.is_cancelled() {
                tracing::info!("Cancelled after {} cycles", cycle);
                break;
            }

            let report = self.scheduler.run_sweep(self.config.dry_run, &self.cancel).await?;
            tracing::info!(
                "Sweep {}/{} completed: {} processed, {} transitioned, {} failed",
                cycle + 1,
                cycles,
                report.processed,
                report.transitioned,
                report.failed
            );

            self.poller.run_check(&self.cancel).await?;
        }

        Ok(())
    }
}
