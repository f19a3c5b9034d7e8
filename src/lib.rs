// ============================================================================
// gossiplog Library
// ============================================================================

//! A gossip-replicated, expiring key/value log.
//!
//! Each node keeps the latest [`Entry`] per subject. Local writes and
//! deletions are broadcast to the cluster; inbound payloads are merged with a
//! last-write-wins rule that converges regardless of delivery order.
//! Entries expire after a retention period and are swept by a periodic
//! maintenance task that also snapshots the state to disk.
//!
//! # Examples
//!
//! ```
//! use gossiplog::{AppendOnly, Log, LogConfig};
//! use std::time::Duration;
//!
//! # fn main() -> gossiplog::Result<()> {
//! let config = LogConfig::new().retention(Duration::from_secs(3600));
//! let node_a: Log<String, Vec<u64>> = Log::new(config.clone(), AppendOnly)?;
//! let node_b: Log<String, Vec<u64>> = Log::new(config, AppendOnly)?;
//!
//! node_a.log("group-1:email".to_string(), vec![1, 2], node_a.now(), None)?;
//!
//! // Ship node A's state to node B.
//! node_b.merge(&node_a.marshal_all()?)?;
//! assert_eq!(node_b.query(&"group-1:email".to_string())?.payload, vec![1, 2]);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod log;
pub mod logs;
pub mod replication;
pub mod storage;

// Re-export main types for convenience
pub use self::core::{Clock, Entry, LogError, ManualClock, Payload, Result, Subject, SystemClock};
pub use log::{
    GcReport, Log, LogBuilder, LogConfig, LogMetrics, MAX_DURATION, MaintenanceFn, MaintenanceWorker, MetricsSnapshot,
    spawn_configured_maintenance, spawn_maintenance,
};
pub use logs::{FlushLog, NotificationKey, NotificationLog, NotificationRecord, Receiver};
pub use replication::{
    AppendOnly, ClusterTransport, GossipEndpoint, InMemoryGossip, MergeOutcome, MergePolicy, NoopTransport,
    Tombstoning,
};
pub use storage::{SnapshotManager, StateStore};
