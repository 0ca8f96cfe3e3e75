//! Daemon setup and lifecycle management

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use warden_health::HealthMonitor;
use warden_state::FileStateStore;
use warden_supervisor::{InMemorySupervisor, Pm2Supervisor, ProcessSupervisor};

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, SupervisorConfig};
use crate::error::DaemonResult;
use crate::launch::WorkerTemplate;
use crate::provider;
use crate::scheduler::{Reconciler, Scheduler};

/// Warden daemon
pub struct Server {
    config: DaemonConfig,
    supervisor: Arc<dyn ProcessSupervisor>,
    reconciler: Arc<Reconciler>,
    monitor: Arc<HealthMonitor>,
    scheduler: Arc<Scheduler>,
    reconcile_rx: mpsc::Receiver<()>,
}

impl Server {
    /// Build every component from the configuration.
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        config.validate()?;

        let supervisor: Arc<dyn ProcessSupervisor> = match &config.supervisor {
            SupervisorConfig::Memory => {
                warn!("Using in-memory supervisor, no processes will be launched");
                Arc::new(InMemorySupervisor::new())
            }
            SupervisorConfig::Pm2 {
                binary,
                command_timeout_secs,
            } => Arc::new(Pm2Supervisor::new(
                binary.clone(),
                Duration::from_secs(*command_timeout_secs),
            )),
        };

        let provider = provider::from_config(&config.desired_state)?;
        let store = Arc::new(FileStateStore::new(config.reconcile.state_file.clone()));

        let reconciler = Arc::new(
            Reconciler::new(
                provider,
                supervisor.clone(),
                store,
                WorkerTemplate::new(config.worker.clone()),
            )
            .with_skip_heal_for_touched(config.reconcile.skip_heal_for_touched),
        );

        let monitor = HealthMonitor::new(config.health.clone(), supervisor.clone())?;

        // One slot: triggers arriving while one is pending coalesce.
        let (trigger_tx, reconcile_rx) = mpsc::channel(1);
        let monitor = Arc::new(monitor.with_alert_sink(Arc::new(trigger_tx.clone())));
        let scheduler = Arc::new(Scheduler::with_trigger(
            reconciler.clone(),
            monitor.clone(),
            config.reconcile.interval(),
            config.health.interval(),
            trigger_tx,
        ));

        Ok(Self {
            config,
            supervisor,
            reconciler,
            monitor,
            scheduler,
            reconcile_rx,
        })
    }

    /// Run both loops (and the status API when enabled) until a shutdown
    /// signal arrives, then flush state and disconnect.
    pub async fn run(self) -> DaemonResult<()> {
        let Self {
            config,
            supervisor,
            reconciler,
            monitor,
            scheduler,
            reconcile_rx,
        } = self;

        reconciler.load_state().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let api = if config.server.enabled {
            let addr = config.server.listen_addr;
            let listener = TcpListener::bind(addr).await?;
            let app = create_router(AppState::new(
                reconciler.clone(),
                monitor.clone(),
                scheduler.clone(),
            ));
            info!(%addr, "Status API listening");

            let mut api_shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = api_shutdown.wait_for(|stop| *stop).await;
                    })
                    .await
            }))
        } else {
            None
        };

        let loops = tokio::spawn(scheduler.clone().run(reconcile_rx, shutdown_rx));

        info!("Warden daemon running");
        let signal = shutdown_signal().await;
        let _ = shutdown_tx.send(true);

        if let Err(e) = loops.await {
            warn!(error = %e, "Scheduler task failed");
        }
        if let Some(api) = api {
            match api.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Status API failed"),
                Err(e) => warn!(error = %e, "Status API task failed"),
            }
        }

        shutdown(&reconciler, supervisor.as_ref()).await;
        signal
    }

    /// Run one reconciliation cycle and one health cycle, then shut down.
    pub async fn run_once(self) -> DaemonResult<()> {
        self.reconciler.load_state().await;
        self.scheduler.run_once().await;
        shutdown(&self.reconciler, self.supervisor.as_ref()).await;
        Ok(())
    }
}

/// Flush the actual-state map and release the supervisor.
async fn shutdown(reconciler: &Reconciler, supervisor: &dyn ProcessSupervisor) {
    if let Err(e) = reconciler.flush().await {
        warn!(error = %e, "Failed to flush actual state on shutdown");
    }
    if let Err(e) = supervisor.disconnect().await {
        warn!(error = %e, "Failed to disconnect from supervisor");
    }
    info!("Warden daemon stopped");
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> DaemonResult<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
            _ = terminate.recv() => {
                info!("Received terminate signal, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating graceful shutdown");
    }

    Ok(())
}
