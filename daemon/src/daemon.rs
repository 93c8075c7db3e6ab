//! Daemon lifecycle management.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use driftfx_market::{MarketResult, RateStore};

use crate::scheduler::DailyScheduler;
use crate::state::DaemonState;

/// Owns the market store and the scheduler task.
pub struct MarketDaemon {
    node_id: String,
    state: RwLock<DaemonState>,
    store: Arc<RateStore>,
    scheduler: Arc<DailyScheduler>,
    scheduler_task: Mutex<Option<JoinHandle<()>>>,
}

impl MarketDaemon {
    /// Create a new daemon instance.
    pub fn new(node_id: String, store: Arc<RateStore>, scheduler: Arc<DailyScheduler>) -> Self {
        Self {
            node_id,
            state: RwLock::new(DaemonState::Starting),
            store,
            scheduler,
            scheduler_task: Mutex::new(None),
        }
    }

    /// Start the daemon: arm the scheduler loop.
    #[instrument(skip(self))]
    pub async fn start(&self) -> MarketResult<()> {
        info!(node_id = %self.node_id, "Starting market daemon");

        let scheduler = self.scheduler.clone();
        let task = tokio::spawn(async move {
            scheduler.run().await;
        });
        *self.scheduler_task.lock() = Some(task);
        *self.state.write() = DaemonState::Running;

        info!(node_id = %self.node_id, "Market daemon running");
        Ok(())
    }

    /// Stop the daemon gracefully: disarm the scheduler and close the store.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> MarketResult<()> {
        info!(node_id = %self.node_id, "Stopping market daemon");
        *self.state.write() = DaemonState::ShuttingDown;

        if let Some(task) = self.scheduler_task.lock().take() {
            task.abort();
        }

        if let Err(err) = self.store.close().await {
            error!(error = %err, "Failed to close market store");
        }

        *self.state.write() = DaemonState::Stopped;
        info!(node_id = %self.node_id, "Market daemon stopped");
        Ok(())
    }

    /// Get the current daemon state.
    pub fn state(&self) -> DaemonState {
        *self.state.read()
    }

    /// Check if the daemon is running.
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }
}
