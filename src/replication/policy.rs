use crate::core::Entry;
use std::fmt::Debug;
use std::time::Duration;

/// Strategy distinguishing the append-only log from the tombstone-capable one.
pub trait MergePolicy: Debug + Send + Sync + 'static {
    /// Whether incoming tombstones delete subjects.
    fn accepts_tombstones(&self) -> bool;

    /// Distance from expiry within which a repeated local write extends the
    /// held entry instead of being dropped.
    fn refresh_window(&self) -> Option<Duration> {
        None
    }

    /// Whether `incoming` replaces `local` for the same subject.
    fn supersedes<K, P>(&self, local: &Entry<K, P>, incoming: &Entry<K, P>) -> bool {
        local.timestamp < incoming.timestamp
    }
}

/// Last write wins on timestamp; deletions are not supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppendOnly;

impl MergePolicy for AppendOnly {
    fn accepts_tombstones(&self) -> bool {
        false
    }
}

/// Last write wins on `(timestamp, expires_at)`, with tombstones and
/// near-expiry refresh.
///
/// Ordering on the pair lets a refreshed entry, which keeps its timestamp
/// but moves its expiry, win over stale replicas.
#[derive(Debug, Default, Clone, Copy)]
pub struct Tombstoning {
    refresh_window: Option<Duration>,
}

impl Tombstoning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_window(window: Duration) -> Self {
        Self {
            refresh_window: (!window.is_zero()).then_some(window),
        }
    }
}

impl MergePolicy for Tombstoning {
    fn accepts_tombstones(&self) -> bool {
        true
    }

    fn refresh_window(&self) -> Option<Duration> {
        self.refresh_window
    }

    fn supersedes<K, P>(&self, local: &Entry<K, P>, incoming: &Entry<K, P>) -> bool {
        (local.timestamp, local.expires_at) < (incoming.timestamp, incoming.expires_at)
    }
}
