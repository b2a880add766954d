//! Inheritance chain construction
//!
//! Walks parent links from an entity up to its root partner. The walk never
//! fails: a failed or missing lookup ends the chain where it is, and the
//! resolver falls back to whatever levels were found plus system defaults.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::entity::{EntityRef, EntityType};
use crate::repository::TerminologyRepository;

/// Ordered chain of entities, most specific first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceChain {
    links: Vec<EntityRef>,
    truncated: bool,
}

impl InheritanceChain {
    /// The entity the chain was built for
    pub fn entity(&self) -> &EntityRef {
        &self.links[0]
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// True if the walk stopped early on a failure or an anomaly
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Entity first, root last
    pub fn leaf_to_root(&self) -> impl Iterator<Item = &EntityRef> {
        self.links.iter()
    }

    /// Root first, entity last; the order overrides are merged in
    pub fn root_to_leaf(&self) -> impl Iterator<Item = &EntityRef> {
        self.links.iter().rev()
    }
}

/// Build the inheritance chain for `entity`
///
/// Parent rules live in the repository: a user's parent is its team, or its
/// company when it has no team; a team's is its company; a company's its
/// organization; an organization's its partner. Partners have no parent.
pub async fn build_chain(repo: &dyn TerminologyRepository, entity: &EntityRef) -> InheritanceChain {
    let mut links = vec![entity.clone()];
    let mut visited: HashSet<EntityRef> = HashSet::from([entity.clone()]);
    let mut truncated = false;

    if matches!(entity.entity_type, EntityType::System | EntityType::Partner) {
        return InheritanceChain { links, truncated };
    }

    // Each link must be strictly less specific than the one before it, which
    // bounds the walk by the number of tenancy levels
    let mut current = entity.clone();
    loop {
        let parent = match repo.get_parent(&current).await {
            Ok(Some(parent)) => parent,
            Ok(None) => {
                debug!("{} has no parent, chain ends", current);
                break;
            }
            Err(e) => {
                warn!("Parent lookup failed for {}: {}, truncating chain", current, e);
                truncated = true;
                break;
            }
        };

        if parent.entity_type == EntityType::System {
            break;
        }

        if visited.contains(&parent) {
            warn!(
                "Inheritance cycle detected: {} is already in the chain of {}, truncating",
                parent, entity
            );
            truncated = true;
            break;
        }

        if !parent.entity_type.is_ancestor_of(current.entity_type) {
            warn!(
                "Invalid parent link {} -> {}: parent must be less specific, truncating",
                current, parent
            );
            truncated = true;
            break;
        }

        visited.insert(parent.clone());
        links.push(parent.clone());

        if parent.entity_type == EntityType::Partner {
            break;
        }
        current = parent;
    }

    InheritanceChain { links, truncated }
}
