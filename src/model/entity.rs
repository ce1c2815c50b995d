//! Entity: one item plus every relationship it takes part in.

use serde::{Deserialize, Serialize};

use super::{Item, Relationship, RelationshipTypeId, Side};

/// Per-request aggregate. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub item: Item,
    pub relationships: Vec<Relationship>,
}

impl Entity {
    pub fn new(item: Item, relationships: Vec<Relationship>) -> Self {
        Self { item, relationships }
    }

    /// Relationships where this item is the left endpoint.
    pub fn left_relations(&self) -> Vec<&Relationship> {
        self.relations_on(Side::Left)
    }

    /// Relationships where this item is the right endpoint.
    pub fn right_relations(&self) -> Vec<&Relationship> {
        self.relations_on(Side::Right)
    }

    pub fn relations_on(&self, side: Side) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.item(side) == self.item.id)
            .collect()
    }

    pub fn relations_of_type(&self, type_id: RelationshipTypeId) -> Vec<&Relationship> {
        self.relationships
            .iter()
            .filter(|r| r.type_id == type_id)
            .collect()
    }
}
