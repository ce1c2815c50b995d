//! Relationship type: a declared, directional kind of link between two
//! entity types.

use serde::{Deserialize, Serialize};

use super::EntityTypeId;
use crate::{Error, Result};

/// Opaque relationship type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipTypeId(pub u64);

impl std::fmt::Display for RelationshipTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One end of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Side filter for registry lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideFilter {
    Left,
    Right,
    Either,
}

impl SideFilter {
    pub fn accepts(self, side: Side) -> bool {
        match self {
            SideFilter::Left => side == Side::Left,
            SideFilter::Right => side == Side::Right,
            SideFilter::Either => true,
        }
    }
}

impl From<Side> for SideFilter {
    fn from(side: Side) -> Self {
        match side {
            Side::Left => SideFilter::Left,
            Side::Right => SideFilter::Right,
        }
    }
}

/// Min/max number of relationships of one type an item may hold on one side.
/// `None` is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cardinality {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl Cardinality {
    pub const UNBOUNDED: Cardinality = Cardinality { min: None, max: None };

    pub fn new(min: Option<u32>, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Whether an item currently holding `count` may gain one more.
    pub fn allows_add(&self, count: usize) -> bool {
        self.max.is_none_or(|max| count < max as usize)
    }

    /// Whether an item currently holding `count` may lose one.
    pub fn allows_remove(&self, count: usize) -> bool {
        self.min.is_none_or(|min| count > min as usize)
    }

    fn validate(&self, side: Side) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(Error::InvalidArgument(format!(
                    "{side} min cardinality {min} exceeds max cardinality {max}"
                )));
            }
        }
        Ok(())
    }
}

/// A registered relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipType {
    pub id: RelationshipTypeId,
    pub left_type: EntityTypeId,
    pub right_type: EntityTypeId,
    /// Label seen from the left item, e.g. `isPublicationOfAuthor` on a
    /// Person(left)/Publication(right) type.
    pub left_label: String,
    /// Label seen from the right item, e.g. `isAuthorOfPublication`.
    pub right_label: String,
    pub left_cardinality: Cardinality,
    pub right_cardinality: Cardinality,
    /// Generate virtual metadata on the left item.
    pub copy_to_left: bool,
    /// Generate virtual metadata on the right item.
    pub copy_to_right: bool,
}

impl RelationshipType {
    pub fn entity_type(&self, side: Side) -> EntityTypeId {
        match side {
            Side::Left => self.left_type,
            Side::Right => self.right_type,
        }
    }

    pub fn label(&self, side: Side) -> &str {
        match side {
            Side::Left => &self.left_label,
            Side::Right => &self.right_label,
        }
    }

    pub fn cardinality(&self, side: Side) -> Cardinality {
        match side {
            Side::Left => self.left_cardinality,
            Side::Right => self.right_cardinality,
        }
    }

    pub fn copy_to(&self, side: Side) -> bool {
        match side {
            Side::Left => self.copy_to_left,
            Side::Right => self.copy_to_right,
        }
    }

    /// Sides whose label equals `label`. A type labelled the same on both
    /// sides yields both.
    pub fn sides_with_label<'a>(&'a self, label: &'a str) -> impl Iterator<Item = Side> + 'a {
        [Side::Left, Side::Right]
            .into_iter()
            .filter(move |side| self.label(*side) == label)
    }

    /// Sides on which an item of `entity_type` may sit.
    pub fn sides_for_entity_type(&self, entity_type: EntityTypeId) -> impl Iterator<Item = Side> + '_ {
        [Side::Left, Side::Right]
            .into_iter()
            .filter(move |side| self.entity_type(*side) == entity_type)
    }

    /// Identity of a usable relationship kind.
    pub fn same_kind(&self, draft: &RelationshipTypeDraft) -> bool {
        self.left_type == draft.left_type
            && self.right_type == draft.right_type
            && self.left_label == draft.left_label
            && self.right_label == draft.right_label
    }
}

/// A relationship type before registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTypeDraft {
    pub left_type: EntityTypeId,
    pub right_type: EntityTypeId,
    pub left_label: String,
    pub right_label: String,
    pub left_cardinality: Cardinality,
    pub right_cardinality: Cardinality,
    pub copy_to_left: bool,
    pub copy_to_right: bool,
}

impl RelationshipTypeDraft {
    pub fn new(
        left_type: EntityTypeId,
        right_type: EntityTypeId,
        left_label: impl Into<String>,
        right_label: impl Into<String>,
    ) -> Self {
        Self {
            left_type,
            right_type,
            left_label: left_label.into(),
            right_label: right_label.into(),
            left_cardinality: Cardinality::UNBOUNDED,
            right_cardinality: Cardinality::UNBOUNDED,
            copy_to_left: false,
            copy_to_right: false,
        }
    }

    pub fn with_left_cardinality(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.left_cardinality = Cardinality::new(min, max);
        self
    }

    pub fn with_right_cardinality(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.right_cardinality = Cardinality::new(min, max);
        self
    }

    pub fn with_copy(mut self, copy_to_left: bool, copy_to_right: bool) -> Self {
        self.copy_to_left = copy_to_left;
        self.copy_to_right = copy_to_right;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.left_label.trim().is_empty() || self.right_label.trim().is_empty() {
            return Err(Error::InvalidArgument("relationship type labels must not be blank".into()));
        }
        self.left_cardinality.validate(Side::Left)?;
        self.right_cardinality.validate(Side::Right)?;
        Ok(())
    }

    pub fn into_type(self, id: RelationshipTypeId) -> RelationshipType {
        RelationshipType {
            id,
            left_type: self.left_type,
            right_type: self.right_type,
            left_label: self.left_label,
            right_label: self.right_label,
            left_cardinality: self.left_cardinality,
            right_cardinality: self.right_cardinality,
            copy_to_left: self.copy_to_left,
            copy_to_right: self.copy_to_right,
        }
    }
}
