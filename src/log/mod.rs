//! The replicated log: public operations and the broadcast gate.

pub mod config;
pub mod gc;
pub mod maintenance;
pub mod metrics;

pub use config::{LogConfig, MAX_DURATION};
pub use gc::{GcReport, collect_garbage};
pub use maintenance::{MaintenanceFn, MaintenanceWorker, spawn_configured_maintenance, spawn_maintenance};
pub use metrics::{LogMetrics, MetricsSnapshot};

use crate::core::{Clock, Entry, LogError, Payload, Result, Subject, SystemClock, to_chrono_duration};
use crate::replication::{
    AppendOnly, ClusterTransport, FnTransport, MergePolicy, NoopTransport, Tombstoning, merge_entry,
};
use crate::storage::{ReplaceFile, SnapshotManager, StateStore, codec, load_snapshot, write_snapshot};
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`Log`] from its configuration and injected collaborators.
pub struct LogBuilder<M> {
    config: LogConfig,
    policy: M,
    clock: Arc<dyn Clock>,
    metrics: Arc<LogMetrics>,
    transport: Arc<dyn ClusterTransport>,
    snapshot_reader: Option<Box<dyn Read + Send>>,
}

impl<M: MergePolicy> LogBuilder<M> {
    pub fn new(config: LogConfig, policy: M) -> Self {
        Self {
            config,
            policy,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(LogMetrics::new()),
            transport: Arc::new(NoopTransport),
            snapshot_reader: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: Arc<LogMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn ClusterTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Restore initial state from `reader` instead of the configured file.
    pub fn snapshot_reader<R: Read + Send + 'static>(mut self, reader: R) -> Self {
        self.snapshot_reader = Some(Box::new(reader));
        self
    }

    pub fn build<K: Subject, P: Payload>(self) -> Result<Log<K, P, M>> {
        self.config.validate()?;
        let retention = self.config.retention_duration();
        let retention_delta = to_chrono_duration(retention)?;

        let state = match (self.snapshot_reader, self.config.snapshot_file.as_ref()) {
            (Some(reader), _) => load_snapshot(BufReader::new(reader), &self.policy)?,
            (None, Some(path)) => match SnapshotManager::new(path).load(&self.policy)? {
                Some(state) => state,
                None => {
                    debug!(path = %path.display(), "snapshot file doesn't exist, starting empty");
                    StateStore::new()
                }
            },
            (None, None) => StateStore::new(),
        };

        Ok(Log {
            state: RwLock::new(state),
            policy: self.policy,
            config: self.config,
            retention,
            retention_delta,
            clock: self.clock,
            metrics: self.metrics,
            transport: RwLock::new(self.transport),
        })
    }
}

// ============================================================================
// Log
// ============================================================================

/// A gossip-replicated log holding the latest entry per subject.
///
/// Every operation runs on the caller's thread. The store lock is held only
/// for the map access itself; encoding and broadcasting happen after it is
/// released. Snapshots are the exception and hold a shared lock for the
/// whole serialization pass.
pub struct Log<K, P, M = AppendOnly> {
    state: RwLock<StateStore<K, P>>,
    policy: M,
    config: LogConfig,
    retention: Duration,
    retention_delta: chrono::Duration,
    clock: Arc<dyn Clock>,
    metrics: Arc<LogMetrics>,
    transport: RwLock<Arc<dyn ClusterTransport>>,
}

impl<K: Subject, P: Payload, M: MergePolicy> Log<K, P, M> {
    /// Creates a log with the system clock, fresh metrics and no transport.
    pub fn new(config: LogConfig, policy: M) -> Result<Self> {
        LogBuilder::new(config, policy).build()
    }

    /// Records `payload` for `subject` and broadcasts the stored entry.
    ///
    /// The entry lives for the configured retention, or for `expiry` when it
    /// is non-zero and shorter. A write that is not newer than a live held
    /// entry is dropped without broadcasting, unless the policy refreshes
    /// entries close to expiry, in which case the held entry keeps its
    /// timestamp and payload and gets the new expiry.
    pub fn log(&self, subject: K, payload: P, timestamp: DateTime<Utc>, expiry: Option<Duration>) -> Result<()> {
        let ttl = match expiry {
            Some(e) if !e.is_zero() && e < self.retention => e,
            _ => self.retention,
        };
        let now = self.clock.now();
        let expires_at = timestamp
            .max(now)
            .checked_add_signed(to_chrono_duration(ttl)?)
            .ok_or_else(|| {
                LogError::InvalidArgument(format!(
                    "expiry of entry written at {} overflows the supported date range",
                    timestamp
                ))
            })?;
        let candidate = Entry::new(subject, payload, timestamp, expires_at);

        let stored = {
            let mut state = self.state.write()?;
            self.apply_local_write(&mut state, candidate, now)
        };
        match stored {
            Some(entry) => self.broadcast_entry(&entry),
            None => Ok(()),
        }
    }

    fn apply_local_write(
        &self,
        state: &mut StateStore<K, P>,
        candidate: Entry<K, P>,
        now: DateTime<Utc>,
    ) -> Option<Entry<K, P>> {
        match state.get(&candidate.subject) {
            Some(local) if !local.is_expired(now) => {
                if local.timestamp >= candidate.timestamp {
                    let refreshed = self.refresh(local, &candidate, now);
                    match &refreshed {
                        Some(entry) => {
                            state.put(entry.clone());
                        }
                        None => debug!(subject = ?candidate.subject, "dropping write not newer than held entry"),
                    }
                    return refreshed;
                }
            }
            // An expired entry is gone as far as writers are concerned; only
            // a deletion at least as new still blocks the write.
            Some(_) => {
                if state
                    .tombstone(&candidate.subject)
                    .is_some_and(|t| t.timestamp >= candidate.timestamp)
                {
                    return None;
                }
                state.put(candidate.clone());
                return Some(candidate);
            }
            None => {}
        }
        merge_entry(state, &self.policy, &candidate, now)
            .changed()
            .then_some(candidate)
    }

    /// The held entry with its expiry moved to the candidate's, if the
    /// policy refreshes and the held entry is close enough to expiring.
    fn refresh(&self, local: &Entry<K, P>, candidate: &Entry<K, P>, now: DateTime<Utc>) -> Option<Entry<K, P>> {
        let window = self.policy.refresh_window()?;
        let held_until = local.expires_at?;
        let extended_until = candidate.expires_at?;
        let remaining = (held_until - now).to_std().ok()?;
        if remaining > window || extended_until <= held_until {
            return None;
        }
        Some(Entry {
            subject: local.subject.clone(),
            payload: local.payload.clone(),
            timestamp: local.timestamp,
            expires_at: Some(extended_until),
        })
    }

    /// Latest entry for `subject`.
    ///
    /// Not expiry-aware: an entry past its expiry that GC has not swept yet
    /// is still returned.
    pub fn query(&self, subject: &K) -> Result<Entry<K, P>> {
        let start = Instant::now();
        let result = self
            .state
            .read()?
            .get(subject)
            .cloned()
            .ok_or(LogError::NotFound);
        self.metrics.on_query(start.elapsed(), result.is_err());
        result
    }

    /// Applies a gossip payload and forwards what was new to us.
    ///
    /// Decoding is all or nothing: a malformed payload changes no state.
    /// Every record that changes local state is re-broadcast once, unless
    /// the transport reports the payload as oversized (it was already
    /// flooded to every member). Broadcast failures do not stop the batch;
    /// the first one is returned at the end. Returns the number of records
    /// that changed state.
    pub fn merge(&self, payload: &[u8]) -> Result<usize> {
        let entries = codec::decode_all::<K, P, _>(payload)?;
        let transport = Arc::clone(&*self.transport.read()?);
        let forward = !transport.is_oversized(payload);
        let now = self.clock.now();

        let mut changed = 0;
        let mut first_err = None;
        for entry in &entries {
            let outcome = {
                let mut state = self.state.write()?;
                merge_entry(&mut state, &self.policy, entry, now)
            };
            if !outcome.changed() {
                continue;
            }
            changed += 1;
            if !forward {
                continue;
            }
            match codec::encode(entry).and_then(|bytes| transport.broadcast(bytes)) {
                Ok(()) => self.metrics.on_propagated(),
                Err(err) => {
                    warn!(subject = ?entry.subject, error = %err, "failed to propagate merged entry");
                    first_err.get_or_insert(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(changed),
        }
    }

    /// Removes expired entries and aged-out tombstones; returns how many
    /// entries were removed.
    pub fn gc(&self) -> Result<usize> {
        let start = Instant::now();
        let now = self.clock.now();
        let report = {
            let mut state = self.state.write()?;
            collect_garbage(&mut state, now, self.retention_delta)?
        };
        self.metrics.on_gc(report.removed, start.elapsed());
        if report.tombstones_purged > 0 {
            debug!(purged = report.tombstones_purged, "purged aged-out tombstones");
        }
        Ok(report.removed)
    }

    /// Writes every entry to `writer`; returns the bytes written.
    pub fn snapshot<W: Write>(&self, writer: W) -> Result<u64> {
        let start = Instant::now();
        let size = {
            let state = self.state.read()?;
            write_snapshot(&state, writer)?
        };
        self.metrics.on_snapshot(start.elapsed());
        Ok(size)
    }

    /// Snapshots into `path`, atomically replacing any previous file.
    pub fn snapshot_to_file<Q: AsRef<Path>>(&self, path: Q) -> Result<u64> {
        let mut file = ReplaceFile::create(path)?;
        let size = self.snapshot(&mut file)?;
        file.commit()?;
        Ok(size)
    }

    /// Full state in the snapshot format, for full-state gossip sync.
    pub fn marshal_all(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let state = self.state.read()?;
        write_snapshot(&state, &mut buf)?;
        Ok(buf)
    }

    pub fn set_broadcast<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(Vec<u8>) -> Result<()> + Send + Sync + 'static,
    {
        self.set_transport(Arc::new(FnTransport::new(callback)))
    }

    pub fn set_transport(&self, transport: Arc<dyn ClusterTransport>) -> Result<()> {
        *self.transport.write()? = transport;
        Ok(())
    }

    fn broadcast_entry(&self, entry: &Entry<K, P>) -> Result<()> {
        let bytes = codec::encode(entry)?;
        let transport = Arc::clone(&*self.transport.read()?);
        transport.broadcast(bytes)
    }

    /// Number of live entries, expired-but-unswept ones included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.state.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn policy(&self) -> &M {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<LogMetrics> {
        &self.metrics
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }
}

impl<K: Subject, P: Payload + Default> Log<K, P, Tombstoning> {
    /// Deletes `subject` locally and broadcasts the tombstone.
    ///
    /// The tombstone is stamped no earlier than the entry it removes, so
    /// replicas holding that entry drop it too.
    pub fn delete(&self, subject: K) -> Result<()> {
        let now = self.clock.now();
        let tombstone = {
            let mut state = self.state.write()?;
            let timestamp = state
                .get(&subject)
                .map_or(now, |held| held.timestamp.max(now));
            let tombstone = Entry::tombstone(subject, P::default(), timestamp);
            state.delete(&tombstone.subject);
            if state
                .tombstone(&tombstone.subject)
                .is_none_or(|t| t.timestamp < tombstone.timestamp)
            {
                state.put_tombstone(tombstone.clone());
            }
            tombstone
        };
        self.broadcast_entry(&tombstone)
    }
}

impl<K, P, M: fmt::Debug> fmt::Debug for Log<K, P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Log")
            .field("policy", &self.policy)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
