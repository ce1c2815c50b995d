//! # Storage Backend Trait
//!
//! This is THE contract between the relationship services and any storage
//! engine. Every read and write the registries, the relationship store and
//! the virtual metadata layer need is defined here.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory for testing/embedding |
//!
//! ## Atomicity
//!
//! `create_relationship`, `move_relationship` and `delete_relationship` each
//! validate, mutate and renumber as one atomic step. A backend must never let
//! a concurrent reader observe a place sequence with gaps or duplicates.

pub mod memory;
pub mod place;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::Result;

pub use memory::MemoryBackend;
pub use place::{PlaceSequence, SequenceKey};

// ============================================================================
// Backend Configuration
// ============================================================================

/// Configuration for connecting to a storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-memory (no persistence)
    #[default]
    Memory,
}

// ============================================================================
// Delete mode
// ============================================================================

/// Whether relationship removal honours minimum cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteMode {
    /// Fail if either side would drop below its declared minimum.
    Enforce,
    /// Remove regardless (endpoint deletion, administrative cleanup).
    Force,
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The universal storage contract.
///
/// Lookups return `Ok(None)` for absent records; mutations on absent records
/// return `Error::NotFound`. Every mutation requires a `ReadWrite`
/// transaction.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Items
    // ========================================================================

    /// Create an item with the given metadata; places are assigned per field
    /// in input order.
    async fn create_item(&self, tx: &mut Self::Tx, metadata: Vec<MetadataEntry>) -> Result<ItemId>;

    /// Get an item by ID. Returns None if not found.
    async fn get_item(&self, tx: &Self::Tx, id: ItemId) -> Result<Option<Item>>;

    /// Add a stored value. `None` appends; `Some(place)` inserts there and
    /// shifts stored values of the same field at or after it up by one.
    async fn add_metadata(
        &self,
        tx: &mut Self::Tx,
        id: ItemId,
        entry: MetadataEntry,
        place: Option<u32>,
    ) -> Result<StoredValue>;

    /// Mark an item's metadata as modified now.
    async fn touch_item(&self, tx: &mut Self::Tx, id: ItemId) -> Result<()>;

    /// Delete an item. Returns true if it existed.
    /// Fails if the item still takes part in relationships.
    async fn delete_item(&self, tx: &mut Self::Tx, id: ItemId) -> Result<bool>;

    /// Total number of items.
    async fn item_count(&self, tx: &Self::Tx) -> Result<u64>;

    // ========================================================================
    // Entity types
    // ========================================================================

    /// Register an entity type. Labels are unique.
    async fn create_entity_type(&self, tx: &mut Self::Tx, label: &str) -> Result<EntityType>;

    async fn get_entity_type(&self, tx: &Self::Tx, id: EntityTypeId) -> Result<Option<EntityType>>;

    async fn entity_type_by_label(&self, tx: &Self::Tx, label: &str) -> Result<Option<EntityType>>;

    async fn all_entity_types(&self, tx: &Self::Tx) -> Result<Vec<EntityType>>;

    /// Delete an entity type. Fails while any relationship type references it.
    async fn delete_entity_type(&self, tx: &mut Self::Tx, id: EntityTypeId) -> Result<bool>;

    // ========================================================================
    // Relationship types
    // ========================================================================

    /// Register a relationship type. Both entity types must exist and the
    /// (left type, right type, left label, right label) kind must be new.
    async fn create_relationship_type(
        &self,
        tx: &mut Self::Tx,
        draft: RelationshipTypeDraft,
    ) -> Result<RelationshipType>;

    async fn get_relationship_type(
        &self,
        tx: &Self::Tx,
        id: RelationshipTypeId,
    ) -> Result<Option<RelationshipType>>;

    async fn all_relationship_types(&self, tx: &Self::Tx) -> Result<Vec<RelationshipType>>;

    /// Replace labels, cardinalities and copy flags of an existing type.
    async fn update_relationship_type(
        &self,
        tx: &mut Self::Tx,
        rel_type: RelationshipType,
    ) -> Result<()>;

    /// Delete a relationship type. Fails while relationships of it exist.
    async fn delete_relationship_type(&self, tx: &mut Self::Tx, id: RelationshipTypeId) -> Result<bool>;

    // ========================================================================
    // Relationships
    // ========================================================================

    /// Link two items.
    ///
    /// Validates both endpoints' entity types against the relationship type
    /// and both sides' max cardinality, then allocates places (append when
    /// omitted, insert-and-shift when given). All or nothing.
    async fn create_relationship(
        &self,
        tx: &mut Self::Tx,
        new: NewRelationship,
    ) -> Result<Relationship>;

    /// Get a relationship by ID.
    async fn get_relationship(&self, tx: &Self::Tx, id: RelId) -> Result<Option<Relationship>>;

    /// Move a relationship within its left and/or right sequence.
    async fn move_relationship(
        &self,
        tx: &mut Self::Tx,
        id: RelId,
        left_place: Option<u32>,
        right_place: Option<u32>,
    ) -> Result<Relationship>;

    /// Remove a relationship and close the gap on both sides.
    /// Returns true if it existed.
    async fn delete_relationship(&self, tx: &mut Self::Tx, id: RelId, mode: DeleteMode) -> Result<bool>;

    /// Every relationship the item takes part in, on either side.
    async fn relationships_of_item(&self, tx: &Self::Tx, item: ItemId) -> Result<Vec<Relationship>>;

    /// Relationships of one type touching `item`, optionally restricted to
    /// one side, ordered by place on the matching side.
    async fn relationships_of_item_and_type(
        &self,
        tx: &Self::Tx,
        item: ItemId,
        type_id: RelationshipTypeId,
        side: Option<Side>,
    ) -> Result<Vec<Relationship>>;

    /// All relationships of a type, ordered by id.
    async fn relationships_by_type(
        &self,
        tx: &Self::Tx,
        type_id: RelationshipTypeId,
    ) -> Result<Vec<Relationship>>;

    /// All relationships, ordered by id.
    async fn all_relationships(&self, tx: &Self::Tx) -> Result<Vec<Relationship>>;

    /// Total number of relationships.
    async fn relationship_count(&self, tx: &Self::Tx) -> Result<u64>;
}
