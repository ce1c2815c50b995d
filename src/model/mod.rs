//! # Repository Data Model
//!
//! Plain records that cross every boundary: storage ↔ services ↔ caller.
//! References between records are ids, resolved through explicit lookups.
//!
//! Design rule: this module is pure data: no I/O, no state, no async.

pub mod item;
pub mod metadata;
pub mod entity_type;
pub mod relationship_type;
pub mod relationship;
pub mod entity;

pub use item::{Item, ItemId};
pub use metadata::{
    MetadataField, MetadataEntry, MetadataValue, StoredValue,
    RelationshipMetadataValue, AuthorityVirtualMetadataValue,
    Placed, sort_by_field_and_place, VIRTUAL_AUTHORITY_PREFIX,
};
pub use entity_type::{EntityType, EntityTypeId};
pub use relationship_type::{
    RelationshipType, RelationshipTypeId, RelationshipTypeDraft,
    Side, SideFilter, Cardinality,
};
pub use relationship::{Relationship, RelId, NewRelationship};
pub use entity::Entity;
