//! Flush log: when each alert group was last flushed, keyed by the group's
//! fingerprint. Supports deletion once a group goes away.

use crate::core::Result;
use crate::log::Log;
use crate::replication::Tombstoning;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub type FlushLog = Log<u64, (), Tombstoning>;

impl Log<u64, (), Tombstoning> {
    pub fn log_flush(&self, fingerprint: u64, flush_time: DateTime<Utc>, expiry: Option<Duration>) -> Result<()> {
        self.log(fingerprint, (), flush_time, expiry)
    }

    pub fn flush_time(&self, fingerprint: u64) -> Result<DateTime<Utc>> {
        self.query(&fingerprint).map(|entry| entry.timestamp)
    }

    /// Forgets the group everywhere once it has been resolved and removed.
    pub fn delete_flush(&self, fingerprint: u64) -> Result<()> {
        self.delete(fingerprint)
    }
}
