//! Entity type: the named kind of an item.

use serde::{Deserialize, Serialize};

/// Opaque entity type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityTypeId(pub u64);

impl std::fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    pub id: EntityTypeId,
    /// Unique across the registry.
    pub label: String,
}

impl EntityType {
    pub fn new(id: EntityTypeId, label: impl Into<String>) -> Self {
        Self { id, label: label.into() }
    }
}
