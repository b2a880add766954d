//! Flatten/unflatten between nested terminology trees and dot-path maps
//!
//! `flatten` only descends into objects; arrays and scalars are leaves.
//! `unflatten` rejects a flat map that uses one key both as a leaf and as the
//! parent of another key (e.g. `a` and `a.b`), since that only arises from
//! malformed persisted data.

use crate::value::{FlatTermMap, TermMap, TermValue};
use crate::{Error, Result};

/// Key path separator
pub const SEPARATOR: char = '.';

/// Flatten a nested tree into dot-path keys
pub fn flatten(map: &TermMap) -> FlatTermMap {
    flatten_with_prefix(map, "")
}

/// Flatten a nested tree, prefixing every produced key with `prefix`
///
/// Empty nested objects produce no keys.
pub fn flatten_with_prefix(map: &TermMap, prefix: &str) -> FlatTermMap {
    let mut flat = FlatTermMap::new();
    flatten_into(map, prefix, &mut flat);
    flat
}

fn flatten_into(map: &TermMap, prefix: &str, out: &mut FlatTermMap) {
    for (key, value) in map {
        let path = join_path(prefix, key);
        match value {
            TermValue::Object(children) => flatten_into(children, &path, out),
            leaf => {
                out.insert(path, leaf.clone());
            }
        }
    }
}

/// Rebuild a nested tree from dot-path keys
pub fn unflatten(flat: &FlatTermMap) -> Result<TermMap> {
    let mut map = TermMap::new();
    for (key, value) in flat {
        set_path(&mut map, key, value.clone())?;
    }
    Ok(map)
}

/// Set `value` at `path`, creating intermediate objects
///
/// Fails with [`Error::StructuralConflict`] if the path walks through an
/// existing leaf, or if it would overwrite an existing subtree with a leaf.
pub fn set_path(map: &mut TermMap, path: &str, value: TermValue) -> Result<()> {
    validate_key(path)?;

    let segments: Vec<&str> = path.split(SEPARATOR).collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| Error::InvalidKey(path.to_string()))?;

    let mut node = map;
    for (depth, segment) in parents.iter().enumerate() {
        let slot = node
            .entry(segment.to_string())
            .or_insert_with(|| TermValue::Object(TermMap::new()));
        node = match slot {
            TermValue::Object(children) => children,
            _ => {
                return Err(Error::StructuralConflict {
                    leaf: segments[..=depth].join("."),
                    nested: path.to_string(),
                })
            }
        };
    }

    if let Some(TermValue::Object(existing)) = node.get(*last) {
        if let Some(child) = existing.keys().next() {
            return Err(Error::StructuralConflict {
                leaf: path.to_string(),
                nested: join_path(path, child),
            });
        }
    }

    node.insert(last.to_string(), value);
    Ok(())
}

/// Look up the value at a dot path
pub fn get_path<'a>(map: &'a TermMap, path: &str) -> Option<&'a TermValue> {
    let mut segments = path.split(SEPARATOR);
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// A key must be non-empty and contain no empty segments
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.split(SEPARATOR).any(str::is_empty) {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// True if `key` equals `prefix` or nests below it
pub fn key_has_prefix(key: &str, prefix: &str) -> bool {
    key == prefix
        || (key.len() > prefix.len()
            && key.starts_with(prefix)
            && key[prefix.len()..].starts_with(SEPARATOR))
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, SEPARATOR, key)
    }
}
