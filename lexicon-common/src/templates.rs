//! Predefined terminology templates
//!
//! Static overlays an entity can adopt wholesale. Applying a template clears
//! the entity's own entries first, so the template is the entity's entire
//! override set afterwards.

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::value::{term_map_from_json, TermMap};

/// A named overlay
#[derive(Debug, Clone, Serialize)]
pub struct TerminologyTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub terms: TermMap,
}

static TEMPLATES: Lazy<BTreeMap<&'static str, TerminologyTemplate>> = Lazy::new(|| {
    let definitions = [
        (
            "businessFormal",
            "Business formal",
            "Conservative vocabulary for corporate programs",
            json!({
                "journeyTerms": {
                    "mainUnit": { "singular": "program", "plural": "programs" },
                    "container": { "singular": "curriculum", "plural": "curricula" }
                },
                "stepTerms": {
                    "mainUnit": { "singular": "module", "plural": "modules" },
                    "group": { "singular": "phase", "plural": "phases" }
                },
                "toolTerms": {
                    "mainUnit": { "singular": "resource", "plural": "resources" },
                    "library": "Resource center"
                }
            }),
        ),
        (
            "startupFocused",
            "Startup focused",
            "Informal vocabulary for fast-moving teams",
            json!({
                "journeyTerms": {
                    "mainUnit": { "singular": "sprint", "plural": "sprints" },
                    "progress": { "start": "Let's go", "complete": "Shipped" }
                },
                "stepTerms": {
                    "mainUnit": { "singular": "milestone", "plural": "milestones" }
                },
                "toolTerms": {
                    "mainUnit": { "singular": "hack", "plural": "hacks" },
                    "library": "Playbook"
                }
            }),
        ),
        (
            "projectManagement",
            "Project management",
            "Vocabulary aligned with project delivery",
            json!({
                "journeyTerms": {
                    "mainUnit": { "singular": "project", "plural": "projects" },
                    "container": { "singular": "portfolio", "plural": "portfolios" }
                },
                "stepTerms": {
                    "mainUnit": { "singular": "task", "plural": "tasks" },
                    "group": { "singular": "workstream", "plural": "workstreams" }
                },
                "toolTerms": {
                    "mainUnit": { "singular": "template", "plural": "templates" }
                }
            }),
        ),
    ];

    definitions
        .into_iter()
        .map(|(key, name, description, terms)| {
            let template = TerminologyTemplate {
                key,
                name,
                description,
                terms: term_map_from_json(terms).unwrap_or_default(),
            };
            (key, template)
        })
        .collect()
});

/// Look up a template by key; kebab-case aliases (`startup-focused`) are accepted
pub fn get_template(key: &str) -> Option<&'static TerminologyTemplate> {
    TEMPLATES
        .get(key)
        .or_else(|| TEMPLATES.get(kebab_to_camel(key).as_str()))
}

/// All templates, sorted by key
pub fn list_templates() -> Vec<&'static TerminologyTemplate> {
    TEMPLATES.values().collect()
}

fn kebab_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '-' || c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
