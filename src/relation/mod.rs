//! # Relationship Store
//!
//! Creation, reordering and removal of relationships, plus the queries over
//! them. Place bookkeeping lives in the backend (one atomic step per call);
//! this layer adds logging, copy-on-delete, paging and the bookkeeping of
//! which items' derived metadata a change touches.
//!
//! ## Affected items
//!
//! A change to relationship `R` alters the virtual metadata of both its
//! endpoints. It also alters the metadata of any item whose mapped side
//! points at an affected item, and so on outward. The walk is breadth-first
//! and bounded by `RelatedItemsConfig::{max, max_depth}`; every item it
//! reaches gets its `last_modified` touched.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::RelatedItemsConfig;
use crate::model::*;
use crate::registry::find_by_any_label;
use crate::storage::{DeleteMode, StorageBackend};
use crate::virtual_metadata::VirtualMetadataPopulator;
use crate::{Error, Result};

// ============================================================================
// Paging
// ============================================================================

/// Optional `limit` / `offset` window over an ordered result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub const ALL: Page = Page { limit: None, offset: 0 };

    pub fn new(limit: Option<usize>, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

// ============================================================================
// Mutations
// ============================================================================

/// Link two items and touch every item whose derived metadata changes.
pub async fn create<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    populator: &VirtualMetadataPopulator,
    related: RelatedItemsConfig,
    new: NewRelationship,
) -> Result<Relationship> {
    let (type_id, left, right) = (new.type_id, new.left, new.right);
    let rel = match backend.create_relationship(tx, new).await {
        Ok(rel) => rel,
        Err(e @ (Error::Cardinality { .. } | Error::EntityTypeMismatch { .. })) => {
            warn!(relationship_type = %type_id, %left, %right, error = %e, "relationship rejected");
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    info!(
        relationship = %rel.id,
        relationship_type = %rel.type_id,
        left = %rel.left,
        right = %rel.right,
        left_place = rel.left_place,
        right_place = rel.right_place,
        "relationship created"
    );
    touch_affected(backend, tx, populator, &rel, related).await?;
    Ok(rel)
}

/// Move a relationship within its left and/or right sequence.
pub async fn move_relationship<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    populator: &VirtualMetadataPopulator,
    related: RelatedItemsConfig,
    id: RelId,
    left_place: Option<u32>,
    right_place: Option<u32>,
) -> Result<Relationship> {
    let rel = backend.move_relationship(tx, id, left_place, right_place).await?;
    info!(
        relationship = %rel.id,
        left_place = rel.left_place,
        right_place = rel.right_place,
        "relationship moved"
    );
    touch_affected(backend, tx, populator, &rel, related).await?;
    Ok(rel)
}

/// Remove a relationship, honouring minimum cardinality on both sides.
pub async fn delete<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    populator: &VirtualMetadataPopulator,
    related: RelatedItemsConfig,
    id: RelId,
) -> Result<bool> {
    remove(backend, tx, populator, related, id, DeleteMode::Enforce).await
}

/// Remove a relationship regardless of minimum cardinality.
pub async fn force_delete<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    populator: &VirtualMetadataPopulator,
    related: RelatedItemsConfig,
    id: RelId,
) -> Result<bool> {
    remove(backend, tx, populator, related, id, DeleteMode::Force).await
}

/// Delete an item together with every relationship it takes part in.
///
/// Each relationship goes through `force_delete`, so the other endpoints are
/// renumbered and their dependents touched. The steps are separate backend
/// calls: a relationship created on the item in between makes the final
/// item delete fail with `ConstraintViolation`.
pub async fn delete_item<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    populator: &VirtualMetadataPopulator,
    related: RelatedItemsConfig,
    id: ItemId,
) -> Result<bool> {
    for rel in backend.relationships_of_item(tx, id).await? {
        force_delete(backend, tx, populator, related, rel.id).await?;
    }
    let deleted = backend.delete_item(tx, id).await?;
    if deleted {
        info!(item = %id, "item deleted");
    }
    Ok(deleted)
}

async fn remove<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    populator: &VirtualMetadataPopulator,
    related: RelatedItemsConfig,
    id: RelId,
    mode: DeleteMode,
) -> Result<bool> {
    let Some(rel) = backend.get_relationship(tx, id).await? else {
        return Ok(false);
    };
    // Collect before the edge disappears; afterwards the walk cannot cross it.
    let affected = affected_items(backend, tx, populator, &rel, related).await?;
    let deleted = match backend.delete_relationship(tx, id, mode).await {
        Ok(deleted) => deleted,
        Err(e @ Error::Cardinality { .. }) => {
            warn!(relationship = %id, error = %e, "relationship deletion rejected");
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    if deleted {
        info!(relationship = %id, ?mode, left = %rel.left, right = %rel.right, "relationship deleted");
        touch_all(backend, tx, &affected).await?;
    }
    Ok(deleted)
}

/// Remove a relationship, first materializing the virtual values it gave
/// the chosen endpoints as stored metadata at the same places.
///
/// Minimum cardinality is honoured; on rejection nothing is copied.
pub async fn delete_and_copy<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    populator: &VirtualMetadataPopulator,
    related: RelatedItemsConfig,
    id: RelId,
    copy_to_left: bool,
    copy_to_right: bool,
) -> Result<bool> {
    let Some(rel) = backend.get_relationship(tx, id).await? else {
        return Ok(false);
    };
    let rt = backend.get_relationship_type(tx, rel.type_id).await?
        .ok_or_else(|| Error::NotFound(format!("Relationship type {}", rel.type_id)))?;

    let mut copies = Vec::new();
    for (side, wanted) in [(Side::Left, copy_to_left), (Side::Right, copy_to_right)] {
        if !wanted {
            continue;
        }
        let item = backend.get_item(tx, rel.item(side)).await?
            .ok_or_else(|| Error::NotFound(format!("{side} item {}", rel.item(side))))?;
        let entity = Entity::new(item, vec![rel.clone()]);
        for value in populator.values_for_side(backend, tx, &entity, &rel, &rt, side).await? {
            copies.push((rel.item(side), value));
        }
    }

    if !remove(backend, tx, populator, related, id, DeleteMode::Enforce).await? {
        return Ok(false);
    }
    for (item, value) in copies {
        let entry = MetadataEntry::new(value.field.clone(), value.value.clone());
        backend.add_metadata(tx, item, entry, Some(value.place)).await?;
        debug!(%item, field = %value.field, place = value.place, "virtual value copied to stored metadata");
    }
    Ok(true)
}

// ============================================================================
// Affected items
// ============================================================================

/// Items whose derived metadata depends on `rel`, endpoints first.
pub async fn affected_items<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    populator: &VirtualMetadataPopulator,
    rel: &Relationship,
    bounds: RelatedItemsConfig,
) -> Result<Vec<ItemId>> {
    let mut seen: HashSet<ItemId> = HashSet::new();
    let mut ordered = Vec::new();
    let mut queue: VecDeque<(ItemId, usize)> = VecDeque::new();

    for item in [rel.left, rel.right] {
        if seen.insert(item) {
            ordered.push(item);
            queue.push_back((item, 0));
        }
    }

    let mut types: HashMap<RelationshipTypeId, Option<RelationshipType>> = HashMap::new();
    while let Some((item, depth)) = queue.pop_front() {
        if depth >= bounds.max_depth {
            debug!(%item, depth, "related item walk reached max depth");
            continue;
        }
        for edge in backend.relationships_of_item(tx, item).await? {
            if !types.contains_key(&edge.type_id) {
                let rt = backend.get_relationship_type(tx, edge.type_id).await?;
                types.insert(edge.type_id, rt);
            }
            let Some(rt) = types.get(&edge.type_id).and_then(Option::as_ref) else {
                continue;
            };
            for side in edge.sides_of(item) {
                // The item on the opposite side derives values from `item`.
                let dependent_side = side.opposite();
                if !(rt.copy_to(dependent_side) && populator.has_mapping(rt.id, dependent_side)) {
                    continue;
                }
                let dependent = edge.item(dependent_side);
                if seen.contains(&dependent) {
                    continue;
                }
                if ordered.len() >= bounds.max {
                    debug!(relationship = %rel.id, max = bounds.max, "related item walk reached max items");
                    return Ok(ordered);
                }
                seen.insert(dependent);
                ordered.push(dependent);
                queue.push_back((dependent, depth + 1));
            }
        }
    }
    Ok(ordered)
}

async fn touch_affected<B: StorageBackend>(
    backend: &B,
    tx: &mut B::Tx,
    populator: &VirtualMetadataPopulator,
    rel: &Relationship,
    related: RelatedItemsConfig,
) -> Result<()> {
    let affected = affected_items(backend, tx, populator, rel, related).await?;
    touch_all(backend, tx, &affected).await
}

async fn touch_all<B: StorageBackend>(backend: &B, tx: &mut B::Tx, items: &[ItemId]) -> Result<()> {
    for item in items {
        match backend.touch_item(tx, *item).await {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    debug!(count = items.len(), "affected items touched");
    Ok(())
}

// ============================================================================
// Queries
// ============================================================================

/// Relationships touching `item` on either side, ordered by type (left
/// label, then id) and by place on the item's side.
pub async fn find_by_item<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    item: ItemId,
    page: Page,
) -> Result<Vec<Relationship>> {
    let rels = backend.relationships_of_item(tx, item).await?;
    let labels: HashMap<RelationshipTypeId, String> = backend.all_relationship_types(tx).await?
        .into_iter()
        .map(|rt| (rt.id, rt.left_label))
        .collect();

    let mut keyed: Vec<((&str, RelationshipTypeId, u32, RelId), Relationship)> = Vec::with_capacity(rels.len());
    for rel in &rels {
        let label = labels.get(&rel.type_id).map_or("", String::as_str);
        let side = if rel.left == item { Side::Left } else { Side::Right };
        keyed.push(((label, rel.type_id, rel.place(side), rel.id), rel.clone()));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(page.apply(keyed.into_iter().map(|(_, rel)| rel).collect()))
}

/// Relationships of one type touching `item`, optionally on one side only,
/// ordered by place.
pub async fn find_by_item_and_type<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    item: ItemId,
    type_id: RelationshipTypeId,
    side: Option<Side>,
    page: Page,
) -> Result<Vec<Relationship>> {
    Ok(page.apply(backend.relationships_of_item_and_type(tx, item, type_id, side).await?))
}

/// Relationships whose type carries `label` on either side, ordered by id.
pub async fn find_by_type_name<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    label: &str,
    page: Page,
) -> Result<Vec<Relationship>> {
    let mut type_ids: Vec<RelationshipTypeId> = find_by_any_label(backend, tx, label).await?
        .into_iter()
        .map(|(rt, _)| rt.id)
        .collect();
    type_ids.dedup();

    let mut rels = Vec::new();
    for type_id in type_ids {
        rels.extend(backend.relationships_by_type(tx, type_id).await?);
    }
    rels.sort_by_key(|r| r.id);
    Ok(page.apply(rels))
}

pub async fn find_all<B: StorageBackend>(backend: &B, tx: &B::Tx, page: Page) -> Result<Vec<Relationship>> {
    Ok(page.apply(backend.all_relationships(tx).await?))
}

pub async fn count_by_item<B: StorageBackend>(backend: &B, tx: &B::Tx, item: ItemId) -> Result<usize> {
    Ok(backend.relationships_of_item(tx, item).await?.len())
}

pub async fn count_by_type_name<B: StorageBackend>(backend: &B, tx: &B::Tx, label: &str) -> Result<usize> {
    Ok(find_by_type_name(backend, tx, label, Page::ALL).await?.len())
}

pub async fn count_by_item_and_type<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    item: ItemId,
    type_id: RelationshipTypeId,
    side: Option<Side>,
) -> Result<usize> {
    Ok(backend.relationships_of_item_and_type(tx, item, type_id, side).await?.len())
}
