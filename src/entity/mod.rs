//! Entity facade: reads over one item and its relationships.
//!
//! `find_by_item_id` is the only call that loads relationships; everything
//! else works on the `Entity` it returns and never mutates state.

use crate::model::*;
use crate::registry;
use crate::storage::StorageBackend;
use crate::Result;

/// Load `id` together with every relationship it takes part in.
pub async fn find_by_item_id<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    id: ItemId,
) -> Result<Option<Entity>> {
    let Some(item) = backend.get_item(tx, id).await? else {
        return Ok(None);
    };
    let relationships = backend.relationships_of_item(tx, id).await?;
    Ok(Some(Entity::new(item, relationships)))
}

/// Entity type named by the item's `relationship.type` value.
pub async fn get_type<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    entity: &Entity,
) -> Result<Option<EntityType>> {
    match entity.item.entity_type_label() {
        Some(label) => registry::find_entity_type_by_label(backend, tx, label).await,
        None => Ok(None),
    }
}

pub fn get_left_relations(entity: &Entity) -> Vec<&Relationship> {
    entity.left_relations()
}

pub fn get_right_relations(entity: &Entity) -> Vec<&Relationship> {
    entity.right_relations()
}

/// Relationship types the entity's type may take part in, on either side.
pub async fn get_all_relationship_types<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    entity: &Entity,
) -> Result<Vec<RelationshipType>> {
    relationship_types(backend, tx, entity, SideFilter::Either).await
}

pub async fn get_left_relationship_types<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    entity: &Entity,
) -> Result<Vec<RelationshipType>> {
    relationship_types(backend, tx, entity, SideFilter::Left).await
}

pub async fn get_right_relationship_types<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    entity: &Entity,
) -> Result<Vec<RelationshipType>> {
    relationship_types(backend, tx, entity, SideFilter::Right).await
}

async fn relationship_types<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    entity: &Entity,
    filter: SideFilter,
) -> Result<Vec<RelationshipType>> {
    match get_type(backend, tx, entity).await? {
        Some(et) => registry::find_by_entity_type(backend, tx, et.id, filter).await,
        None => Ok(Vec::new()),
    }
}

/// The entity's relationships whose type carries `label` on the side the
/// entity sits on.
pub async fn get_relations_by_label<'a, B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    entity: &'a Entity,
    label: &str,
) -> Result<Vec<&'a Relationship>> {
    let mut matched: Vec<&'a Relationship> = Vec::new();
    for (rt, side) in registry::find_by_any_label(backend, tx, label).await? {
        for rel in entity.relations_of_type(rt.id) {
            if rel.item(side) == entity.item.id && !matched.iter().any(|m| m.id == rel.id) {
                matched.push(rel);
            }
        }
    }
    matched.sort_by_key(|r| r.id);
    Ok(matched)
}
