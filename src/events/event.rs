//! Event types carried by the bus.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of resource and connectivity notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    ResourceCreated,
    ResourceUpdated,
    ResourceDeleted,
    ResourcesRefreshed,
    ConnectionRestored,
    ConnectionLost,
    ConnectionUnstable,
    /// A refresh triggered by a change notification was rejected.
    RefreshFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::ResourceCreated,
        EventKind::ResourceUpdated,
        EventKind::ResourceDeleted,
        EventKind::ResourcesRefreshed,
        EventKind::ConnectionRestored,
        EventKind::ConnectionLost,
        EventKind::ConnectionUnstable,
        EventKind::RefreshFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ResourceCreated => "resource-created",
            EventKind::ResourceUpdated => "resource-updated",
            EventKind::ResourceDeleted => "resource-deleted",
            EventKind::ResourcesRefreshed => "resources-refreshed",
            EventKind::ConnectionRestored => "connection-restored",
            EventKind::ConnectionLost => "connection-lost",
            EventKind::ConnectionUnstable => "connection-unstable",
            EventKind::RefreshFailed => "refresh-failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published notification. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    kind: EventKind,
    payload: Value,
    timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
