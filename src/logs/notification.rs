//! Notification log: which alerts were last sent to a receiver for a group.

use crate::core::{Entry, Result};
use crate::log::Log;
use crate::replication::AppendOnly;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// The integration a notification went out through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Receiver {
    pub group_name: String,
    pub integration: String,
    pub idx: u32,
}

impl Receiver {
    pub fn new(group_name: impl Into<String>, integration: impl Into<String>, idx: u32) -> Self {
        Self {
            group_name: group_name.into(),
            integration: integration.into(),
            idx,
        }
    }
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group_name, self.integration, self.idx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub group_key: String,
    pub receiver: Receiver,
}

impl NotificationKey {
    pub fn new(group_key: impl Into<String>, receiver: Receiver) -> Self {
        Self {
            group_key: group_key.into(),
            receiver,
        }
    }
}

impl fmt::Display for NotificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_key, self.receiver)
    }
}

/// Alert fingerprints included in the last notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub firing_alerts: Vec<u64>,
    pub resolved_alerts: Vec<u64>,
}

impl NotificationRecord {
    /// True if every firing alert of the last notification is in `subset`.
    pub fn is_firing_subset(&self, subset: &HashSet<u64>) -> bool {
        self.firing_alerts.iter().all(|a| subset.contains(a))
    }

    pub fn is_resolved_subset(&self, subset: &HashSet<u64>) -> bool {
        self.resolved_alerts.iter().all(|a| subset.contains(a))
    }

    /// The last notification carried no firing alerts.
    pub fn is_resolved(&self) -> bool {
        self.firing_alerts.is_empty()
    }
}

pub type NotificationLog = Log<NotificationKey, NotificationRecord, AppendOnly>;

impl Log<NotificationKey, NotificationRecord, AppendOnly> {
    /// Records a notification sent now.
    pub fn log_notification(
        &self,
        receiver: &Receiver,
        group_key: &str,
        firing_alerts: Vec<u64>,
        resolved_alerts: Vec<u64>,
        expiry: Option<Duration>,
    ) -> Result<()> {
        let key = NotificationKey::new(group_key, receiver.clone());
        let record = NotificationRecord {
            firing_alerts,
            resolved_alerts,
        };
        self.log(key, record, self.now(), expiry)
    }

    pub fn query_notification(
        &self,
        receiver: &Receiver,
        group_key: &str,
    ) -> Result<Entry<NotificationKey, NotificationRecord>> {
        self.query(&NotificationKey::new(group_key, receiver.clone()))
    }
}
