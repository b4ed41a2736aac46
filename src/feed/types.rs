//! Records, filters and change notifications exchanged with the remote store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::events::EventKind;

/// One row of a remote resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    fn field_matches(&self, field: &str, expected: &Value) -> bool {
        if field == "id" {
            return expected.as_str() == Some(self.id.as_str());
        }
        self.fields.get(field) == Some(expected)
    }
}

/// Equality predicates plus an optional row limit.
///
/// Field order is normalized, so equal filters always serialize the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default)]
    pub equals: BTreeMap<String, Value>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| record.field_matches(field, expected))
    }

    /// Cache key for the results of this filter on `resource`.
    pub fn cache_key(&self, resource: &str) -> String {
        let filter = serde_json::to_string(self).unwrap_or_default();
        format!("{resource}:{filter}")
    }
}

/// Row-level mutation kind reported by the change-feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Bus event announcing this kind of change.
    pub fn event_kind(self) -> EventKind {
        match self {
            ChangeKind::Insert => EventKind::ResourceCreated,
            ChangeKind::Update => EventKind::ResourceUpdated,
            ChangeKind::Delete => EventKind::ResourceDeleted,
        }
    }
}

/// A single mutation pushed by the change-feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub resource: String,
    pub kind: ChangeKind,
    /// Row after the change, absent for deletes
    pub new: Option<Record>,
    /// Row before the change, absent for inserts
    pub old: Option<Record>,
}

impl ChangeNotification {
    pub fn insert(resource: impl Into<String>, record: Record) -> Self {
        Self {
            resource: resource.into(),
            kind: ChangeKind::Insert,
            new: Some(record),
            old: None,
        }
    }

    pub fn update(resource: impl Into<String>, old: Record, new: Record) -> Self {
        Self {
            resource: resource.into(),
            kind: ChangeKind::Update,
            new: Some(new),
            old: Some(old),
        }
    }

    pub fn delete(resource: impl Into<String>, old: Record) -> Self {
        Self {
            resource: resource.into(),
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old),
        }
    }

    /// Identity of the affected row.
    pub fn record_id(&self) -> Option<&str> {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map(|record| record.id.as_str())
    }

    /// Payload published on the event bus for this change.
    pub fn event_payload(&self) -> Value {
        json!({
            "resource": self.resource,
            "change": self.kind,
            "id": self.record_id(),
            "new": self.new,
            "old": self.old,
        })
    }
}

/// Signals produced by an open change-feed channel.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSignal {
    /// The remote side acknowledged the subscription
    Subscribed,
    Change(ChangeNotification),
    /// The channel failed; it will not deliver anything else
    Error(String),
    /// The channel ended
    Closed,
}
