//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::feed::Record;

/// Body of `PUT /resources/:name/:id`: the row's fields as a JSON object.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordRequest {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RecordRequest {
    /// Validates the request against the id taken from the path.
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self, id: &str) -> Option<String> {
        if id.trim().is_empty() {
            return Some("Record id cannot be empty".to_string());
        }
        match self.fields.get("id") {
            Some(Value::String(body_id)) if body_id == id => None,
            Some(_) => Some("Body id does not match the path id".to_string()),
            None => None,
        }
    }

    pub fn into_record(mut self, id: &str) -> Record {
        self.fields.remove("id");
        Record {
            id: id.to_string(),
            fields: self.fields,
        }
    }
}

/// Query string of `GET /events`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    /// Only the most recent `limit` events
    #[serde(default)]
    pub limit: Option<usize>,
}
