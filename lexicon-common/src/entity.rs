//! Tenancy levels and entity references

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The six fixed tenancy levels, least specific first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    System,
    Partner,
    Organization,
    Company,
    Team,
    User,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::System,
        EntityType::Partner,
        EntityType::Organization,
        EntityType::Company,
        EntityType::Team,
        EntityType::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::System => "system",
            EntityType::Partner => "partner",
            EntityType::Organization => "organization",
            EntityType::Company => "company",
            EntityType::Team => "team",
            EntityType::User => "user",
        }
    }

    /// Specificity rank: system is 0, user is 5
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// True if `self` may appear as an ancestor of `child`
    pub fn is_ancestor_of(&self, child: EntityType) -> bool {
        self.rank() < child.rank()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown entity type: {}", s)))
    }
}

/// A concrete entity at one tenancy level
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(EntityType::System, crate::defaults::SYSTEM_ENTITY_ID)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}
