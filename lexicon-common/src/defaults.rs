//! Default vocabulary
//!
//! `system_default_terms` is the vocabulary seeded into a new database as the
//! `system` level. `fallback_terms` is compiled in and only used when even the
//! stored system defaults cannot be read.

use serde_json::json;

use crate::merge::OverrideBehavior;
use crate::repository::TerminologyEntry;
use crate::transform::flatten;
use crate::value::{term_map_from_json, TermMap};

/// Entity id under which system defaults are stored
pub const SYSTEM_ENTITY_ID: &str = "default";

fn system_defaults_json() -> serde_json::Value {
    json!({
        "journeyTerms": {
            "mainUnit": { "singular": "journey", "plural": "journeys" },
            "container": { "singular": "program", "plural": "programs" },
            "progress": { "start": "Start journey", "resume": "Continue", "complete": "Completed" }
        },
        "stepTerms": {
            "mainUnit": { "singular": "step", "plural": "steps" },
            "group": { "singular": "stage", "plural": "stages" },
            "action": { "next": "Next step", "previous": "Previous step" }
        },
        "toolTerms": {
            "mainUnit": { "singular": "tool", "plural": "tools" },
            "library": "Toolbox",
            "action": { "open": "Open tool" }
        },
        "roleTerms": {
            "participant": { "singular": "participant", "plural": "participants" },
            "facilitator": { "singular": "coach", "plural": "coaches" }
        }
    })
}

fn fallback_json() -> serde_json::Value {
    json!({
        "journeyTerms": { "mainUnit": { "singular": "journey", "plural": "journeys" } },
        "stepTerms": { "mainUnit": { "singular": "step", "plural": "steps" } },
        "toolTerms": { "mainUnit": { "singular": "tool", "plural": "tools" } }
    })
}

/// Full default vocabulary
pub fn system_default_terms() -> TermMap {
    term_map_from_json(system_defaults_json()).unwrap_or_default()
}

/// Minimal vocabulary used when nothing else is available
pub fn fallback_terms() -> TermMap {
    term_map_from_json(fallback_json()).unwrap_or_default()
}

/// Default vocabulary as flat `system` entries, ready to seed a repository
pub fn system_default_entries() -> Vec<TerminologyEntry> {
    flatten(&system_default_terms())
        .into_iter()
        .map(|(key, value)| TerminologyEntry::new(SYSTEM_ENTITY_ID, key, value, OverrideBehavior::Replace))
        .collect()
}
