//! Conflict resolution between a held entry and an incoming one.
//!
//! The merge is a join on a per-subject order, so replicas converge no
//! matter in which order (or how often) they see the same entries.

use super::policy::MergePolicy;
use crate::core::{Entry, Payload, Subject};
use crate::storage::StateStore;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First entry seen for the subject.
    Inserted,
    /// Replaced an older entry.
    Replaced,
    /// A tombstone removed the held entry.
    Deleted,
    /// A tombstone was added to the ledger without removing anything.
    TombstoneRecorded,
    Rejected,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, MergeOutcome::Rejected)
    }
}

pub fn merge_entry<K, P, M>(
    store: &mut StateStore<K, P>,
    policy: &M,
    incoming: &Entry<K, P>,
    now: DateTime<Utc>,
) -> MergeOutcome
where
    K: Subject,
    P: Payload,
    M: MergePolicy,
{
    if incoming.is_tombstone() {
        return merge_tombstone(store, policy, incoming);
    }
    if incoming.is_expired(now) {
        return MergeOutcome::Rejected;
    }
    if store
        .tombstone(&incoming.subject)
        .is_some_and(|t| t.timestamp >= incoming.timestamp)
    {
        return MergeOutcome::Rejected;
    }
    if let Some(local) = store.get(&incoming.subject) {
        if !policy.supersedes(local, incoming) {
            return MergeOutcome::Rejected;
        }
    }
    match store.put(incoming.clone()) {
        Some(_) => MergeOutcome::Replaced,
        None => MergeOutcome::Inserted,
    }
}

fn merge_tombstone<K, P, M>(
    store: &mut StateStore<K, P>,
    policy: &M,
    tombstone: &Entry<K, P>,
) -> MergeOutcome
where
    K: Subject,
    P: Payload,
    M: MergePolicy,
{
    // Without delete support a zero expiry is simply an expired entry.
    if !policy.accepts_tombstones() {
        return MergeOutcome::Rejected;
    }
    if store
        .tombstone(&tombstone.subject)
        .is_some_and(|t| t.timestamp >= tombstone.timestamp)
    {
        return MergeOutcome::Rejected;
    }

    // The ledger always takes the newest tombstone so that replicas agree on
    // it; the live entry only goes if it is not newer than the deletion.
    let removes_local = store
        .get(&tombstone.subject)
        .is_some_and(|local| local.timestamp <= tombstone.timestamp);
    if removes_local {
        store.delete(&tombstone.subject);
    }
    store.put_tombstone(tombstone.clone());

    if removes_local {
        MergeOutcome::Deleted
    } else {
        MergeOutcome::TombstoneRecorded
    }
}
