//! Database models

use serde::{Deserialize, Serialize};

use crate::merge::OverrideBehavior;
use crate::repository::TerminologyEntry;
use crate::value::TermValue;
use crate::Result;

/// Raw `terminology_entries` row as read from SQLite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminologyRow {
    pub entity_id: String,
    pub key: String,
    /// JSON-encoded value
    pub value: String,
    pub override_behavior: String,
}

impl From<(String, String, String, String)> for TerminologyRow {
    fn from((entity_id, key, value, override_behavior): (String, String, String, String)) -> Self {
        Self {
            entity_id,
            key,
            value,
            override_behavior,
        }
    }
}

impl TerminologyRow {
    /// Decode into an entry; unknown behaviors fall back to `replace`
    pub fn into_entry(self) -> Result<TerminologyEntry> {
        let value: TermValue = serde_json::from_str(&self.value)?;
        Ok(TerminologyEntry {
            key: self.key,
            value,
            override_behavior: OverrideBehavior::parse_lenient(&self.override_behavior),
            entity_id: self.entity_id,
        })
    }
}
