//! Override merging
//!
//! Levels are merged one at a time onto a resolved base, least specific
//! first. Merging is order dependent: whatever is merged last wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::transform::join_path;
use crate::value::{TermMap, TermValue};
use crate::Error;

/// How an overriding value combines with the value below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideBehavior {
    /// Override supersedes the base value
    #[default]
    Replace,
    /// Deep-merge when both sides are objects, otherwise replace
    Merge,
    /// Advisory override; applied exactly like `Replace` during resolution
    Suggest,
}

impl OverrideBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideBehavior::Replace => "replace",
            OverrideBehavior::Merge => "merge",
            OverrideBehavior::Suggest => "suggest",
        }
    }

    /// Parse a stored behavior, falling back to `Replace` for unknown strings
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            warn!("Unknown override behavior '{}', treating as replace", s);
            OverrideBehavior::Replace
        })
    }
}

impl fmt::Display for OverrideBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrideBehavior {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(OverrideBehavior::Replace),
            "merge" => Ok(OverrideBehavior::Merge),
            "suggest" => Ok(OverrideBehavior::Suggest),
            other => Err(Error::InvalidInput(format!(
                "unknown override behavior: {}",
                other
            ))),
        }
    }
}

/// Declared behaviors, keyed by dot path
pub type BehaviorMap = HashMap<String, OverrideBehavior>;

/// Combine a single base value with its override
pub fn apply_override(
    base: Option<&TermValue>,
    override_value: &TermValue,
    behavior: OverrideBehavior,
) -> TermValue {
    match (behavior, base, override_value) {
        (OverrideBehavior::Merge, Some(TermValue::Object(base)), TermValue::Object(over)) => {
            TermValue::Object(deep_merge(base, over))
        }
        _ => override_value.clone(),
    }
}

fn deep_merge(base: &TermMap, over: &TermMap) -> TermMap {
    let mut merged = base.clone();
    for (key, value) in over {
        let next = match (merged.get(key), value) {
            (Some(TermValue::Object(inner)), TermValue::Object(inner_over)) => {
                TermValue::Object(deep_merge(inner, inner_over))
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}

/// Merge one level's overrides onto a resolved base
///
/// The override tree is walked from the root. Where a behavior is declared
/// for a path, the whole override subtree at that path is applied with it.
/// Elsewhere the walk descends to the leaves, which replace their base
/// values, so undeclared paths behave as leaf-wise `replace`. Intermediate
/// nodes are created as needed; a base scalar in the way of a deeper override
/// is replaced by an object.
pub fn merge_terminology(
    base: &TermMap,
    override_terms: &TermMap,
    behaviors: &BehaviorMap,
) -> TermMap {
    let mut result = base.clone();
    merge_into(&mut result, override_terms, behaviors, "");
    result
}

fn merge_into(target: &mut TermMap, overrides: &TermMap, behaviors: &BehaviorMap, prefix: &str) {
    for (key, value) in overrides {
        let path = join_path(prefix, key);
        match (behaviors.get(&path), value) {
            (None, TermValue::Object(children)) => {
                if children.is_empty() {
                    continue;
                }
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| TermValue::Object(TermMap::new()));
                if !slot.is_object() {
                    *slot = TermValue::Object(TermMap::new());
                }
                if let TermValue::Object(inner) = slot {
                    merge_into(inner, children, behaviors, &path);
                }
            }
            (behavior, _) => {
                let behavior = behavior.copied().unwrap_or_default();
                let merged = apply_override(target.get(key), value, behavior);
                target.insert(key.clone(), merged);
            }
        }
    }
}
