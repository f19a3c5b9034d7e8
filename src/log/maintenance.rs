//! Periodic GC + snapshot, and the shutdown pass.

use super::Log;
use crate::core::{LogError, Payload, Result, Subject};
use crate::replication::MergePolicy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A replacement maintenance routine. Returns the resulting snapshot size.
pub type MaintenanceFn = Box<dyn FnMut() -> Result<u64> + Send>;

impl<K: Subject, P: Payload, M: MergePolicy> Log<K, P, M> {
    /// One default maintenance pass: GC, then a snapshot if `snapshot_path`
    /// is set. Returns the snapshot size, zero when none was written.
    pub fn maintain(&self, snapshot_path: Option<&Path>) -> Result<u64> {
        self.gc()?;
        match snapshot_path {
            Some(path) => self.snapshot_to_file(path),
            None => Ok(0),
        }
    }

    /// Runs maintenance every `interval` until `stop` fires (or its sender is
    /// dropped).
    ///
    /// Tick failures are logged and counted; the loop keeps going. After the
    /// stop signal one final pass runs if a snapshot path is configured, so
    /// state present at shutdown reaches disk.
    pub async fn run_maintenance(
        &self,
        interval: Duration,
        snapshot_path: Option<PathBuf>,
        mut stop: oneshot::Receiver<()>,
        mut routine: Option<MaintenanceFn>,
    ) {
        if interval.is_zero() {
            warn!("maintenance interval is zero - not running maintenance");
            return;
        }

        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.maintenance_pass(snapshot_path.as_deref(), routine.as_mut()) {
                        info!(error = %err, "running maintenance failed");
                    }
                }
            }
        }

        // No point in a final pass when nothing gets persisted.
        if snapshot_path.is_none() {
            return;
        }
        if let Err(err) = self.maintenance_pass(snapshot_path.as_deref(), routine.as_mut()) {
            info!(error = %err, "creating shutdown snapshot failed");
        }
    }

    fn maintenance_pass(&self, snapshot_path: Option<&Path>, routine: Option<&mut MaintenanceFn>) -> Result<u64> {
        self.metrics.on_maintenance();
        let start = Instant::now();
        let result = match routine {
            Some(routine) => routine(),
            None => self.maintain(snapshot_path),
        };
        match result {
            Ok(size) => {
                let elapsed = start.elapsed();
                self.metrics.on_maintenance_done(size, elapsed);
                debug!(duration_ms = elapsed.as_millis() as u64, size, "maintenance done");
                Ok(size)
            }
            Err(err) => {
                self.metrics.on_maintenance_error();
                Err(err)
            }
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Handle on a maintenance loop running as a tokio task.
pub struct MaintenanceWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl MaintenanceWorker {
    /// Signals the loop to stop and waits for the final pass to finish.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .await
                .map_err(|err| LogError::Worker(format!("maintenance worker join: {}", err)))?;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }
}

/// Dropping the handle signals stop and detaches the task; it still runs
/// the final pass on its own. Use [`MaintenanceWorker::stop`] to wait for it.
impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

/// Spawns [`Log::run_maintenance`] on the current tokio runtime.
pub fn spawn_maintenance<K, P, M>(
    log: Arc<Log<K, P, M>>,
    interval: Duration,
    snapshot_path: Option<PathBuf>,
    routine: Option<MaintenanceFn>,
) -> MaintenanceWorker
where
    K: Subject,
    P: Payload,
    M: MergePolicy,
{
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let join_handle = tokio::spawn(async move {
        log.run_maintenance(interval, snapshot_path, stop_rx, routine)
            .await;
    });

    MaintenanceWorker {
        stop_tx: Some(stop_tx),
        join_handle: Some(join_handle),
    }
}

/// Spawns maintenance with the interval and snapshot file from the log's
/// own configuration.
pub fn spawn_configured_maintenance<K, P, M>(log: Arc<Log<K, P, M>>) -> MaintenanceWorker
where
    K: Subject,
    P: Payload,
    M: MergePolicy,
{
    let interval = log.config().maintenance_interval_duration();
    let snapshot_path = log.config().snapshot_file.clone();
    spawn_maintenance(log, interval, snapshot_path, None)
}
