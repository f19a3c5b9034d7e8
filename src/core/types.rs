use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Natural key of a tracked fact.
///
/// Implemented for every type that can be hashed, compared by value and
/// carried over the wire.
pub trait Subject:
    Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> Subject for T where
    T: Clone + Eq + Hash + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Opaque application data stored alongside a subject.
pub trait Payload: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// The latest known record for one subject.
///
/// `expires_at == None` marks a tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry<K, P> {
    pub subject: K,
    pub payload: P,
    pub timestamp: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl<K, P> Entry<K, P> {
    pub fn new(subject: K, payload: P, timestamp: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject,
            payload,
            timestamp,
            expires_at: Some(expires_at),
        }
    }

    pub fn tombstone(subject: K, payload: P, timestamp: DateTime<Utc>) -> Self {
        Self {
            subject,
            payload,
            timestamp,
            expires_at: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Tombstones count as expired: their zero expiry lies in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => at <= now,
            None => true,
        }
    }
}
