//! Entity type and relationship type registries.
//!
//! Mutations require an administrator and are rejected before the backend is
//! touched. Lookups are open to everyone.
//!
//! Label lookups always name the side: a label may be the left label of one
//! type and the right label of another, and the registry never guesses which
//! one a caller meant. `find_by_any_label` returns every `(type, side)` match
//! for callers that really want the whole set.

use tracing::info;

use crate::auth::{require_admin, Authorizer};
use crate::model::*;
use crate::storage::StorageBackend;
use crate::{Error, Result};

// ============================================================================
// Entity types
// ============================================================================

pub async fn create_entity_type<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    actor: &dyn Authorizer,
    label: &str,
) -> Result<EntityType> {
    require_admin(actor, "create entity types")?;
    let et = backend.create_entity_type(tx, label).await?;
    info!(entity_type = %et.id, label = %et.label, "entity type created");
    Ok(et)
}

/// Delete an entity type no relationship type references.
pub async fn delete_entity_type<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    actor: &dyn Authorizer,
    id: EntityTypeId,
) -> Result<bool> {
    require_admin(actor, "delete entity types")?;
    let deleted = backend.delete_entity_type(tx, id).await?;
    if deleted {
        info!(entity_type = %id, "entity type deleted");
    }
    Ok(deleted)
}

pub async fn find_entity_type<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    id: EntityTypeId,
) -> Result<Option<EntityType>> {
    backend.get_entity_type(tx, id).await
}

pub async fn find_entity_type_by_label<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    label: &str,
) -> Result<Option<EntityType>> {
    backend.entity_type_by_label(tx, label).await
}

pub async fn all_entity_types<B: StorageBackend>(backend: &B, tx: &B::Tx) -> Result<Vec<EntityType>> {
    backend.all_entity_types(tx).await
}

// ============================================================================
// Relationship types
// ============================================================================

pub async fn create_relationship_type<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    actor: &dyn Authorizer,
    draft: RelationshipTypeDraft,
) -> Result<RelationshipType> {
    require_admin(actor, "create relationship types")?;
    draft.validate()?;
    let rt = backend.create_relationship_type(tx, draft).await?;
    info!(
        relationship_type = %rt.id,
        left_label = %rt.left_label,
        right_label = %rt.right_label,
        "relationship type created"
    );
    Ok(rt)
}

/// Replace the labels, cardinalities and copy flags of an existing type.
pub async fn update_relationship_type<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    actor: &dyn Authorizer,
    rel_type: RelationshipType,
) -> Result<()> {
    require_admin(actor, "modify relationship types")?;
    let id = rel_type.id;
    backend.update_relationship_type(tx, rel_type).await?;
    info!(relationship_type = %id, "relationship type updated");
    Ok(())
}

pub async fn delete_relationship_type<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    actor: &dyn Authorizer,
    id: RelationshipTypeId,
) -> Result<bool> {
    require_admin(actor, "delete relationship types")?;
    let deleted = backend.delete_relationship_type(tx, id).await?;
    if deleted {
        info!(relationship_type = %id, "relationship type deleted");
    }
    Ok(deleted)
}

pub async fn find_relationship_type<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    id: RelationshipTypeId,
) -> Result<Option<RelationshipType>> {
    backend.get_relationship_type(tx, id).await
}

/// Like `find_relationship_type`, but absence is an error.
pub async fn require_relationship_type<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    id: RelationshipTypeId,
) -> Result<RelationshipType> {
    backend.get_relationship_type(tx, id).await?
        .ok_or_else(|| Error::NotFound(format!("Relationship type {id}")))
}

pub async fn all_relationship_types<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
) -> Result<Vec<RelationshipType>> {
    backend.all_relationship_types(tx).await
}

/// Types in which `entity_type` may take part on the filtered side(s).
pub async fn find_by_entity_type<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    entity_type: EntityTypeId,
    filter: SideFilter,
) -> Result<Vec<RelationshipType>> {
    Ok(backend.all_relationship_types(tx).await?
        .into_iter()
        .filter(|rt| rt.sides_for_entity_type(entity_type).any(|side| filter.accepts(side)))
        .collect())
}

/// Types whose label on `side` equals `label`.
pub async fn find_by_label<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    label: &str,
    side: Side,
) -> Result<Vec<RelationshipType>> {
    Ok(select_by_label(backend.all_relationship_types(tx).await?, label, side))
}

/// Every `(type, side)` whose label equals `label`.
pub async fn find_by_any_label<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    label: &str,
) -> Result<Vec<(RelationshipType, Side)>> {
    let mut matches = Vec::new();
    for rt in backend.all_relationship_types(tx).await? {
        for side in rt.sides_with_label(label).collect::<Vec<_>>() {
            matches.push((rt.clone(), side));
        }
    }
    Ok(matches)
}

/// The unique type identified by both entity types and both labels.
pub async fn find_by_types_and_labels<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    left_type: EntityTypeId,
    right_type: EntityTypeId,
    left_label: &str,
    right_label: &str,
) -> Result<Option<RelationshipType>> {
    let probe = RelationshipTypeDraft::new(left_type, right_type, left_label, right_label);
    Ok(backend.all_relationship_types(tx).await?
        .into_iter()
        .find(|rt| rt.same_kind(&probe)))
}

/// Pure label filter shared with configuration resolution.
pub fn select_by_label(
    types: impl IntoIterator<Item = RelationshipType>,
    label: &str,
    side: Side,
) -> Vec<RelationshipType> {
    types.into_iter().filter(|rt| rt.label(side) == label).collect()
}
