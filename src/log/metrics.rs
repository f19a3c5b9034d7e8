use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for one log instance.
///
/// Constructed by the owner and handed to the log, so several logs can
/// report into separate sets.
#[derive(Debug, Default)]
pub struct LogMetrics {
    gc_runs: AtomicU64,
    gc_removed_total: AtomicU64,
    gc_duration_micros_total: AtomicU64,
    snapshots_total: AtomicU64,
    snapshot_duration_micros_total: AtomicU64,
    snapshot_size_bytes: AtomicU64,
    maintenance_total: AtomicU64,
    maintenance_errors_total: AtomicU64,
    maintenance_duration_micros_total: AtomicU64,
    queries_total: AtomicU64,
    query_errors_total: AtomicU64,
    query_duration_micros_total: AtomicU64,
    propagated_messages_total: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub gc_runs: u64,
    pub gc_removed_total: u64,
    pub gc_duration_micros_total: u64,
    pub snapshots_total: u64,
    pub snapshot_duration_micros_total: u64,
    pub snapshot_size_bytes: u64,
    pub maintenance_total: u64,
    pub maintenance_errors_total: u64,
    pub maintenance_duration_micros_total: u64,
    pub queries_total: u64,
    pub query_errors_total: u64,
    pub query_duration_micros_total: u64,
    pub propagated_messages_total: u64,
}

fn micros(elapsed: Duration) -> u64 {
    elapsed.as_micros().min(u64::MAX as u128) as u64
}

impl LogMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on_gc(&self, removed: usize, elapsed: Duration) {
        self.gc_runs.fetch_add(1, Ordering::Relaxed);
        self.gc_removed_total.fetch_add(removed as u64, Ordering::Relaxed);
        self.gc_duration_micros_total
            .fetch_add(micros(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn on_snapshot(&self, elapsed: Duration) {
        self.snapshots_total.fetch_add(1, Ordering::Relaxed);
        self.snapshot_duration_micros_total
            .fetch_add(micros(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn on_maintenance(&self) {
        self.maintenance_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_maintenance_done(&self, size: u64, elapsed: Duration) {
        self.snapshot_size_bytes.store(size, Ordering::Relaxed);
        self.maintenance_duration_micros_total
            .fetch_add(micros(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn on_maintenance_error(&self) {
        self.maintenance_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_query(&self, elapsed: Duration, failed: bool) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.query_errors_total.fetch_add(1, Ordering::Relaxed);
        }
        self.query_duration_micros_total
            .fetch_add(micros(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn on_propagated(&self) {
        self.propagated_messages_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            gc_runs: self.gc_runs.load(Ordering::Relaxed),
            gc_removed_total: self.gc_removed_total.load(Ordering::Relaxed),
            gc_duration_micros_total: self.gc_duration_micros_total.load(Ordering::Relaxed),
            snapshots_total: self.snapshots_total.load(Ordering::Relaxed),
            snapshot_duration_micros_total: self
                .snapshot_duration_micros_total
                .load(Ordering::Relaxed),
            snapshot_size_bytes: self.snapshot_size_bytes.load(Ordering::Relaxed),
            maintenance_total: self.maintenance_total.load(Ordering::Relaxed),
            maintenance_errors_total: self.maintenance_errors_total.load(Ordering::Relaxed),
            maintenance_duration_micros_total: self
                .maintenance_duration_micros_total
                .load(Ordering::Relaxed),
            queries_total: self.queries_total.load(Ordering::Relaxed),
            query_errors_total: self.query_errors_total.load(Ordering::Relaxed),
            query_duration_micros_total: self.query_duration_micros_total.load(Ordering::Relaxed),
            propagated_messages_total: self.propagated_messages_total.load(Ordering::Relaxed),
        }
    }
}
