//! Wire types for the tracker REST API
//!
//! This crate holds every shape the class helper reads from the tracker:
//!
//! ```text
//! GET {tracker}/rest/data/{class}?@page_index&@page_size&@fields
//!   → { "data": { "collection": [...], "@links": { "self": [...], "next": [...] } } }
//!
//! GET {tracker}/rest/data/{class}?@verbose=2
//!   → { "data": { "collection": [ { "id": "1", "link": "...", "name": "open" } ] } }
//! ```
//!
//! ## Rules
//!
//! 1. Records stay as JSON maps; the caller decides which fields are shown
//! 2. Hypermedia link entries are arrays and only the first `uri` is used
//! 3. No I/O here

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record of a collection, field name to raw JSON value.
pub type Record = serde_json::Map<String, Value>;

// ============================================================================
// COLLECTION API
// ============================================================================

/// Top-level envelope of a collection response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEnvelope {
    pub data: CollectionData,
}

/// The `data` member of a collection response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionData {
    pub collection: Vec<Record>,

    #[serde(rename = "@links", default)]
    pub links: HypermediaLinks,

    #[serde(rename = "@total_size", default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

/// Server-supplied navigation links. Each direction is an array of entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HypermediaLinks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prev: Vec<LinkEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<LinkEntry>,

    #[serde(rename = "self", default, skip_serializing_if = "Vec::is_empty")]
    pub self_: Vec<LinkEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

impl HypermediaLinks {
    pub fn prev_uri(&self) -> Option<&str> {
        first_uri(&self.prev)
    }

    pub fn next_uri(&self) -> Option<&str> {
        first_uri(&self.next)
    }

    pub fn self_uri(&self) -> Option<&str> {
        first_uri(&self.self_)
    }
}

fn first_uri(entries: &[LinkEntry]) -> Option<&str> {
    entries.first().map(|entry| entry.uri.as_str())
}

// ============================================================================
// DROPDOWN SOURCES
// ============================================================================

/// One option of a search dropdown, built from a verbose collection record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub id: String,
    pub label: String,
}

impl DropdownOption {
    /// Build an option from a `{id, link, <value>}` record.
    ///
    /// The label is the first key that is neither `id` nor `link`. Records
    /// without an `id` or without a value key are skipped.
    pub fn from_record(record: &Record) -> Option<Self> {
        let id = record.get("id").map(display_value)?;
        let label = record
            .iter()
            .find(|(key, _)| key.as_str() != "id" && key.as_str() != "link")
            .map(|(_, value)| display_value(value))?;
        Some(Self { id, label })
    }
}

/// Render a JSON value the way it is shown in a table cell.
///
/// Strings are shown verbatim, numbers and booleans in their JSON form,
/// arrays (multilinks) comma-joined, objects by their `id` when they have one.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => match map.get("id") {
            Some(id) => display_value(id),
            None => value.to_string(),
        },
    }
}
