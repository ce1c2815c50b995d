//! Relationship (edge) between two items.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{ItemId, RelationshipTypeId, Side};

/// Opaque relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl std::fmt::Display for RelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored, directional link with an independent place on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelId,
    pub type_id: RelationshipTypeId,
    pub left: ItemId,
    pub right: ItemId,
    /// Position among relationships of this type sharing `left`.
    pub left_place: u32,
    /// Position among relationships of this type sharing `right`.
    pub right_place: u32,
    /// Name variant shown on the left item instead of derived text.
    pub left_value: Option<String>,
    /// Name variant shown on the right item instead of derived text.
    pub right_value: Option<String>,
}

impl Relationship {
    pub fn item(&self, side: Side) -> ItemId {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn place(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left_place,
            Side::Right => self.right_place,
        }
    }

    pub fn set_place(&mut self, side: Side, place: u32) {
        match side {
            Side::Left => self.left_place = place,
            Side::Right => self.right_place = place,
        }
    }

    pub fn name_variant(&self, side: Side) -> Option<&str> {
        match side {
            Side::Left => self.left_value.as_deref(),
            Side::Right => self.right_value.as_deref(),
        }
    }

    /// Every side `item` occupies. A self-relationship yields both.
    pub fn sides_of(&self, item: ItemId) -> SmallVec<[Side; 2]> {
        let mut sides = SmallVec::new();
        if self.left == item {
            sides.push(Side::Left);
        }
        if self.right == item {
            sides.push(Side::Right);
        }
        sides
    }

    pub fn is_self_relationship(&self) -> bool {
        self.left == self.right
    }
}

/// Request to link two items.
///
/// Omitted places append to the end of the respective sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelationship {
    pub type_id: RelationshipTypeId,
    pub left: ItemId,
    pub right: ItemId,
    pub left_place: Option<u32>,
    pub right_place: Option<u32>,
    pub left_value: Option<String>,
    pub right_value: Option<String>,
}

impl NewRelationship {
    pub fn new(type_id: RelationshipTypeId, left: ItemId, right: ItemId) -> Self {
        Self {
            type_id,
            left,
            right,
            left_place: None,
            right_place: None,
            left_value: None,
            right_value: None,
        }
    }

    pub fn at_left_place(mut self, place: u32) -> Self {
        self.left_place = Some(place);
        self
    }

    pub fn at_right_place(mut self, place: u32) -> Self {
        self.right_place = Some(place);
        self
    }

    pub fn with_left_value(mut self, value: impl Into<String>) -> Self {
        self.left_value = Some(value.into());
        self
    }

    pub fn with_right_value(mut self, value: impl Into<String>) -> Self {
        self.right_value = Some(value.into());
        self
    }

    pub fn item(&self, side: Side) -> ItemId {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn place(&self, side: Side) -> Option<u32> {
        match side {
            Side::Left => self.left_place,
            Side::Right => self.right_place,
        }
    }
}
