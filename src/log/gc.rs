use crate::core::{LogError, Result, Subject};
use crate::storage::StateStore;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcReport {
    pub removed: usize,
    pub tombstones_purged: usize,
}

/// Sweeps the whole store once.
///
/// Live entries with `expires_at <= now` are removed; ledger tombstones are
/// purged once `timestamp + tombstone_retention` has passed. A live entry
/// without an expiry aborts the sweep before anything is removed.
pub fn collect_garbage<K: Subject, P>(
    store: &mut StateStore<K, P>,
    now: DateTime<Utc>,
    tombstone_retention: Duration,
) -> Result<GcReport> {
    if let Some((subject, _)) = store.iter().find(|(_, e)| e.expires_at.is_none()) {
        return Err(LogError::Invariant(format!(
            "unexpected zero expiration timestamp for {:?}",
            subject
        )));
    }

    let before = store.len();
    store.retain_entries(|_, e| e.expires_at.is_some_and(|at| at > now));
    let removed = before - store.len();

    let before = store.tombstone_count();
    store.retain_tombstones(|_, t| {
        t.timestamp
            .checked_add_signed(tombstone_retention)
            .is_none_or(|deadline| deadline > now)
    });
    let tombstones_purged = before - store.tombstone_count();

    Ok(GcReport {
        removed,
        tombstones_purged,
    })
}
