//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//! It keeps the whole repository state behind one `RwLock`, so every
//! mutation (validate → insert/move/remove → renumber) is a single critical
//! section and readers only ever see dense place sequences.
//!
//! ## Limitations
//!
//! - **No real transactions**: `commit_tx()` and `rollback_tx()` are markers.
//!   Writes are applied immediately when each call returns. Rollback does
//!   NOT undo mutations.
//! - **No indexes beyond adjacency**: label lookups scan.
//!
//! Use this backend for:
//! - Testing the registries, the relationship store and virtual metadata
//! - Embedding in applications that don't need persistence

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::model::*;
use crate::tx::{Transaction, TxMode, TxId};
use crate::{Error, Result};
use super::{DeleteMode, PlaceSequence, SequenceKey, StorageBackend};

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory repository storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    state: RwLock<MemoryState>,
    next_item_id: AtomicU64,
    next_value_id: AtomicU64,
    next_entity_type_id: AtomicU64,
    next_rel_type_id: AtomicU64,
    next_rel_id: AtomicU64,
    next_tx_id: AtomicU64,
}

#[derive(Default)]
struct MemoryState {
    items: HashMap<ItemId, Item>,
    entity_types: HashMap<EntityTypeId, EntityType>,
    relationship_types: HashMap<RelationshipTypeId, RelationshipType>,
    relationships: HashMap<RelId, Relationship>,
    /// item_id → relationship IDs touching it (once per relationship)
    adjacency: HashMap<ItemId, Vec<RelId>>,
    /// (item, type, side) → ordered relationship IDs
    sequences: HashMap<SequenceKey, PlaceSequence>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: RwLock::new(MemoryState::default()),
                next_item_id: AtomicU64::new(1),
                next_value_id: AtomicU64::new(1),
                next_entity_type_id: AtomicU64::new(1),
                next_rel_type_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    fn next_value_id(&self) -> u64 {
        self.inner.next_value_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn sequence_len(&self, key: &SequenceKey) -> usize {
        self.sequences.get(key).map_or(0, PlaceSequence::len)
    }

    /// Copy sequence positions back onto the relationships.
    fn renumber(&mut self, key: SequenceKey) {
        let Some(seq) = self.sequences.get(&key) else { return };
        for (id, place) in seq.places() {
            if let Some(rel) = self.relationships.get_mut(&id) {
                rel.set_place(key.side, place);
            }
        }
    }

    fn check_endpoint(&self, rt: &RelationshipType, side: Side, item_id: ItemId) -> Result<()> {
        let item = self.items.get(&item_id)
            .ok_or_else(|| Error::NotFound(format!("{side} item {item_id}")))?;
        let expected = self.entity_types.get(&rt.entity_type(side))
            .ok_or_else(|| Error::NotFound(format!("Entity type {}", rt.entity_type(side))))?;
        let found = item.entity_type_label();
        if found != Some(expected.label.as_str()) {
            return Err(Error::EntityTypeMismatch {
                item: item_id,
                side,
                expected: expected.label.clone(),
                found: found.map(str::to_string),
            });
        }
        Ok(())
    }

    fn ensure_unique_kind(&self, draft: &RelationshipTypeDraft, except: Option<RelationshipTypeId>) -> Result<()> {
        let clash = self.relationship_types.values()
            .any(|rt| Some(rt.id) != except && rt.same_kind(draft));
        if clash {
            return Err(Error::ConstraintViolation(format!(
                "relationship type {}/{} between entity types {} and {} already exists",
                draft.left_label, draft.right_label, draft.left_type, draft.right_type
            )));
        }
        Ok(())
    }

    fn sorted_relationships(&self, filter: impl Fn(&Relationship) -> bool) -> Vec<Relationship> {
        let mut rels: Vec<Relationship> = self.relationships.values()
            .filter(|r| filter(r))
            .cloned()
            .collect();
        rels.sort_by_key(|r| r.id);
        rels
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction (currently just a marker, no real MVCC).
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode })
    }

    /// No-op: memory backend applies writes immediately, not on commit.
    async fn commit_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    /// WARNING: No-op. Memory backend has no write-ahead log.
    /// Mutations applied during this transaction are NOT reverted.
    async fn rollback_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    // ========================================================================
    // Items
    // ========================================================================

    async fn create_item(&self, tx: &mut MemoryTx, metadata: Vec<MetadataEntry>) -> Result<ItemId> {
        tx.ensure_writable()?;
        let id = ItemId(self.inner.next_item_id.fetch_add(1, Ordering::Relaxed));
        let mut item = Item::new(id);
        for entry in metadata {
            let place = item.next_place(&entry.field);
            item.metadata.push(StoredValue {
                id: self.next_value_id(),
                field: entry.field,
                value: entry.value,
                authority: entry.authority,
                language: entry.language,
                place,
            });
        }

        let mut state = self.inner.state.write();
        state.items.insert(id, item);
        state.adjacency.insert(id, Vec::new());
        Ok(id)
    }

    async fn get_item(&self, _tx: &MemoryTx, id: ItemId) -> Result<Option<Item>> {
        Ok(self.inner.state.read().items.get(&id).cloned())
    }

    async fn add_metadata(
        &self,
        tx: &mut MemoryTx,
        id: ItemId,
        entry: MetadataEntry,
        place: Option<u32>,
    ) -> Result<StoredValue> {
        tx.ensure_writable()?;
        let value_id = self.next_value_id();
        let mut state = self.inner.state.write();
        let item = state.items.get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Item {id}")))?;

        let end = item.next_place(&entry.field);
        let place = place.map_or(end, |p| p.min(end));
        for v in item.metadata.iter_mut().filter(|v| v.field == entry.field && v.place >= place) {
            v.place += 1;
        }
        let value = StoredValue {
            id: value_id,
            field: entry.field,
            value: entry.value,
            authority: entry.authority,
            language: entry.language,
            place,
        };
        item.metadata.push(value.clone());
        item.last_modified = Utc::now();
        Ok(value)
    }

    async fn touch_item(&self, tx: &mut MemoryTx, id: ItemId) -> Result<()> {
        tx.ensure_writable()?;
        let mut state = self.inner.state.write();
        let item = state.items.get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Item {id}")))?;
        item.last_modified = Utc::now();
        Ok(())
    }

    async fn delete_item(&self, tx: &mut MemoryTx, id: ItemId) -> Result<bool> {
        tx.ensure_writable()?;
        let mut state = self.inner.state.write();
        if let Some(rels) = state.adjacency.get(&id) {
            if !rels.is_empty() {
                return Err(Error::ConstraintViolation(format!(
                    "Cannot delete item {id} with {} relationships. Delete relationships first.",
                    rels.len()
                )));
            }
        }
        state.adjacency.remove(&id);
        Ok(state.items.remove(&id).is_some())
    }

    async fn item_count(&self, _tx: &MemoryTx) -> Result<u64> {
        Ok(self.inner.state.read().items.len() as u64)
    }

    // ========================================================================
    // Entity types
    // ========================================================================

    async fn create_entity_type(&self, tx: &mut MemoryTx, label: &str) -> Result<EntityType> {
        tx.ensure_writable()?;
        let label = label.trim();
        if label.is_empty() {
            return Err(Error::InvalidArgument("entity type label must not be blank".into()));
        }
        let mut state = self.inner.state.write();
        if state.entity_types.values().any(|et| et.label == label) {
            return Err(Error::ConstraintViolation(format!("entity type '{label}' already exists")));
        }
        let id = EntityTypeId(self.inner.next_entity_type_id.fetch_add(1, Ordering::Relaxed));
        let et = EntityType::new(id, label);
        state.entity_types.insert(id, et.clone());
        Ok(et)
    }

    async fn get_entity_type(&self, _tx: &MemoryTx, id: EntityTypeId) -> Result<Option<EntityType>> {
        Ok(self.inner.state.read().entity_types.get(&id).cloned())
    }

    async fn entity_type_by_label(&self, _tx: &MemoryTx, label: &str) -> Result<Option<EntityType>> {
        Ok(self.inner.state.read().entity_types.values().find(|et| et.label == label).cloned())
    }

    async fn all_entity_types(&self, _tx: &MemoryTx) -> Result<Vec<EntityType>> {
        let mut types: Vec<EntityType> = self.inner.state.read().entity_types.values().cloned().collect();
        types.sort_by_key(|et| et.id);
        Ok(types)
    }

    async fn delete_entity_type(&self, tx: &mut MemoryTx, id: EntityTypeId) -> Result<bool> {
        tx.ensure_writable()?;
        let mut state = self.inner.state.write();
        let referenced = state.relationship_types.values()
            .filter(|rt| rt.left_type == id || rt.right_type == id)
            .count();
        if referenced > 0 {
            return Err(Error::ConstraintViolation(format!(
                "Cannot delete entity type {id} referenced by {referenced} relationship types"
            )));
        }
        Ok(state.entity_types.remove(&id).is_some())
    }

    // ========================================================================
    // Relationship types
    // ========================================================================

    async fn create_relationship_type(
        &self,
        tx: &mut MemoryTx,
        draft: RelationshipTypeDraft,
    ) -> Result<RelationshipType> {
        tx.ensure_writable()?;
        draft.validate()?;
        let mut state = self.inner.state.write();
        for et in [draft.left_type, draft.right_type] {
            if !state.entity_types.contains_key(&et) {
                return Err(Error::NotFound(format!("Entity type {et}")));
            }
        }
        state.ensure_unique_kind(&draft, None)?;

        let id = RelationshipTypeId(self.inner.next_rel_type_id.fetch_add(1, Ordering::Relaxed));
        let rt = draft.into_type(id);
        state.relationship_types.insert(id, rt.clone());
        Ok(rt)
    }

    async fn get_relationship_type(
        &self,
        _tx: &MemoryTx,
        id: RelationshipTypeId,
    ) -> Result<Option<RelationshipType>> {
        Ok(self.inner.state.read().relationship_types.get(&id).cloned())
    }

    async fn all_relationship_types(&self, _tx: &MemoryTx) -> Result<Vec<RelationshipType>> {
        let mut types: Vec<RelationshipType> =
            self.inner.state.read().relationship_types.values().cloned().collect();
        types.sort_by_key(|rt| rt.id);
        Ok(types)
    }

    async fn update_relationship_type(&self, tx: &mut MemoryTx, rel_type: RelationshipType) -> Result<()> {
        tx.ensure_writable()?;
        let draft = RelationshipTypeDraft {
            left_type: rel_type.left_type,
            right_type: rel_type.right_type,
            left_label: rel_type.left_label.clone(),
            right_label: rel_type.right_label.clone(),
            left_cardinality: rel_type.left_cardinality,
            right_cardinality: rel_type.right_cardinality,
            copy_to_left: rel_type.copy_to_left,
            copy_to_right: rel_type.copy_to_right,
        };
        draft.validate()?;

        let mut state = self.inner.state.write();
        let existing = state.relationship_types.get(&rel_type.id)
            .ok_or_else(|| Error::NotFound(format!("Relationship type {}", rel_type.id)))?;
        if existing.left_type != rel_type.left_type || existing.right_type != rel_type.right_type {
            return Err(Error::ConstraintViolation(format!(
                "entity types of relationship type {} cannot change", rel_type.id
            )));
        }
        state.ensure_unique_kind(&draft, Some(rel_type.id))?;
        state.relationship_types.insert(rel_type.id, rel_type);
        Ok(())
    }

    async fn delete_relationship_type(&self, tx: &mut MemoryTx, id: RelationshipTypeId) -> Result<bool> {
        tx.ensure_writable()?;
        let mut state = self.inner.state.write();
        let in_use = state.relationships.values().filter(|r| r.type_id == id).count();
        if in_use > 0 {
            return Err(Error::ConstraintViolation(format!(
                "Cannot delete relationship type {id} used by {in_use} relationships"
            )));
        }
        Ok(state.relationship_types.remove(&id).is_some())
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    async fn create_relationship(&self, tx: &mut MemoryTx, new: NewRelationship) -> Result<Relationship> {
        tx.ensure_writable()?;
        let mut state = self.inner.state.write();
        let rt = state.relationship_types.get(&new.type_id).cloned()
            .ok_or_else(|| Error::NotFound(format!("Relationship type {}", new.type_id)))?;

        // Validate everything before touching any sequence.
        for side in [Side::Left, Side::Right] {
            let item = new.item(side);
            state.check_endpoint(&rt, side, item)?;
            let key = SequenceKey::new(item, rt.id, side);
            let count = state.sequence_len(&key);
            let cardinality = rt.cardinality(side);
            if !cardinality.allows_add(count) {
                return Err(Error::Cardinality {
                    relationship_type: rt.label(side).to_string(),
                    side,
                    item,
                    violation: format!("exceed max cardinality {}", cardinality.max.unwrap_or_default()),
                });
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        state.relationships.insert(id, Relationship {
            id,
            type_id: rt.id,
            left: new.left,
            right: new.right,
            left_place: 0,
            right_place: 0,
            left_value: new.left_value.clone(),
            right_value: new.right_value.clone(),
        });

        state.adjacency.entry(new.left).or_default().push(id);
        if new.left != new.right {
            state.adjacency.entry(new.right).or_default().push(id);
        }

        for side in [Side::Left, Side::Right] {
            let key = SequenceKey::new(new.item(side), rt.id, side);
            state.sequences.entry(key).or_default().insert(id, new.place(side));
            state.renumber(key);
        }

        state.relationships.get(&id).cloned()
            .ok_or_else(|| Error::StorageError(format!("Relationship {id} vanished during create")))
    }

    async fn get_relationship(&self, _tx: &MemoryTx, id: RelId) -> Result<Option<Relationship>> {
        Ok(self.inner.state.read().relationships.get(&id).cloned())
    }

    async fn move_relationship(
        &self,
        tx: &mut MemoryTx,
        id: RelId,
        left_place: Option<u32>,
        right_place: Option<u32>,
    ) -> Result<Relationship> {
        tx.ensure_writable()?;
        let mut state = self.inner.state.write();
        let rel = state.relationships.get(&id).cloned()
            .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;

        for (side, place) in [(Side::Left, left_place), (Side::Right, right_place)] {
            let Some(place) = place else { continue };
            let key = SequenceKey::new(rel.item(side), rel.type_id, side);
            let moved = state.sequences.get_mut(&key).and_then(|seq| seq.move_to(id, place));
            if moved.is_none() {
                return Err(Error::StorageError(format!(
                    "Relationship {id} missing from its {side} sequence"
                )));
            }
            state.renumber(key);
        }

        state.relationships.get(&id).cloned()
            .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))
    }

    async fn delete_relationship(&self, tx: &mut MemoryTx, id: RelId, mode: DeleteMode) -> Result<bool> {
        tx.ensure_writable()?;
        let mut state = self.inner.state.write();
        let Some(rel) = state.relationships.get(&id).cloned() else {
            return Ok(false);
        };

        if mode == DeleteMode::Enforce {
            let rt = state.relationship_types.get(&rel.type_id).cloned()
                .ok_or_else(|| Error::NotFound(format!("Relationship type {}", rel.type_id)))?;
            for side in [Side::Left, Side::Right] {
                let item = rel.item(side);
                let count = state.sequence_len(&SequenceKey::new(item, rt.id, side));
                let cardinality = rt.cardinality(side);
                if !cardinality.allows_remove(count) {
                    return Err(Error::Cardinality {
                        relationship_type: rt.label(side).to_string(),
                        side,
                        item,
                        violation: format!("drop below min cardinality {}", cardinality.min.unwrap_or_default()),
                    });
                }
            }
        }

        for side in [Side::Left, Side::Right] {
            let key = SequenceKey::new(rel.item(side), rel.type_id, side);
            let now_empty = match state.sequences.get_mut(&key) {
                Some(seq) => {
                    seq.remove(id);
                    seq.is_empty()
                }
                None => false,
            };
            if now_empty {
                state.sequences.remove(&key);
            } else {
                state.renumber(key);
            }
        }

        state.relationships.remove(&id);
        for item in [rel.left, rel.right] {
            if let Some(rels) = state.adjacency.get_mut(&item) {
                rels.retain(|rid| *rid != id);
            }
        }
        Ok(true)
    }

    async fn relationships_of_item(&self, _tx: &MemoryTx, item: ItemId) -> Result<Vec<Relationship>> {
        let state = self.inner.state.read();
        let ids = state.adjacency.get(&item).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| state.relationships.get(id).cloned()).collect())
    }

    async fn relationships_of_item_and_type(
        &self,
        _tx: &MemoryTx,
        item: ItemId,
        type_id: RelationshipTypeId,
        side: Option<Side>,
    ) -> Result<Vec<Relationship>> {
        let state = self.inner.state.read();
        let sides: &[Side] = match side {
            Some(Side::Left) => &[Side::Left],
            Some(Side::Right) => &[Side::Right],
            None => &[Side::Left, Side::Right],
        };

        let mut result: Vec<Relationship> = Vec::new();
        for side in sides {
            let Some(seq) = state.sequences.get(&SequenceKey::new(item, type_id, *side)) else {
                continue;
            };
            for id in seq.ids() {
                // A self-relationship sits in both sequences; report it once.
                if result.iter().any(|r| r.id == *id) {
                    continue;
                }
                if let Some(rel) = state.relationships.get(id) {
                    result.push(rel.clone());
                }
            }
        }
        Ok(result)
    }

    async fn relationships_by_type(
        &self,
        _tx: &MemoryTx,
        type_id: RelationshipTypeId,
    ) -> Result<Vec<Relationship>> {
        Ok(self.inner.state.read().sorted_relationships(|r| r.type_id == type_id))
    }

    async fn all_relationships(&self, _tx: &MemoryTx) -> Result<Vec<Relationship>> {
        Ok(self.inner.state.read().sorted_relationships(|_| true))
    }

    async fn relationship_count(&self, _tx: &MemoryTx) -> Result<u64> {
        Ok(self.inner.state.read().relationships.len() as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct World {
        db: MemoryBackend,
        tx: MemoryTx,
        authored: RelationshipType,
    }

    fn type_field() -> MetadataField {
        MetadataField::entity_type()
    }

    async fn world(left_max: Option<u32>, right_min: Option<u32>) -> World {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let person = db.create_entity_type(&mut tx, "Person").await.unwrap();
        let publication = db.create_entity_type(&mut tx, "Publication").await.unwrap();
        let authored = db.create_relationship_type(
            &mut tx,
            RelationshipTypeDraft::new(person.id, publication.id, "isPublicationOfAuthor", "isAuthorOfPublication")
                .with_left_cardinality(None, left_max)
                .with_right_cardinality(right_min, None),
        ).await.unwrap();
        World { db, tx, authored }
    }

    async fn item(w: &mut World, kind: &str) -> ItemId {
        w.db.create_item(&mut w.tx, vec![MetadataEntry::new(type_field(), kind)]).await.unwrap()
    }

    async fn right_places(w: &World, publication: ItemId) -> Vec<(RelId, u32)> {
        w.db.relationships_of_item_and_type(&w.tx, publication, w.authored.id, Some(Side::Right))
            .await
            .unwrap()
            .iter()
            .map(|r| (r.id, r.right_place))
            .collect()
    }

    #[tokio::test]
    async fn test_create_and_get_item() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let title = MetadataField::parse("dc.title").unwrap();

        let id = db.create_item(&mut tx, vec![
            MetadataEntry::new(title.clone(), "First"),
            MetadataEntry::new(title.clone(), "Second").with_language("en"),
        ]).await.unwrap();
        let item = db.get_item(&tx, id).await.unwrap().unwrap();

        let places: Vec<(u32, &str, Option<&str>)> = item
            .values(&title)
            .iter()
            .map(|v| (v.place, v.value.as_str(), v.language.as_deref()))
            .collect();
        assert_eq!(places, vec![(0, "First", None), (1, "Second", Some("en"))]);
        assert_eq!(db.item_count(&tx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_metadata_shifts_right() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let author = MetadataField::parse("dc.contributor.author").unwrap();
        let id = db.create_item(&mut tx, vec![
            MetadataEntry::new(author.clone(), "A"),
            MetadataEntry::new(author.clone(), "C"),
        ]).await.unwrap();

        db.add_metadata(&mut tx, id, MetadataEntry::new(author.clone(), "B"), Some(1)).await.unwrap();
        let item = db.get_item(&tx, id).await.unwrap().unwrap();
        let values: Vec<&str> = item.values(&author).iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_read_only_tx_rejects_writes() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadOnly).await.unwrap();
        let err = db.create_item(&mut tx, Vec::new()).await.unwrap_err();
        assert!(matches!(err, Error::TxError(_)));
    }

    #[tokio::test]
    async fn test_entity_type_labels_are_unique() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        db.create_entity_type(&mut tx, "Person").await.unwrap();
        let err = db.create_entity_type(&mut tx, "Person").await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn test_append_places() {
        let mut w = world(None, None).await;
        let p = item(&mut w, "Publication").await;
        let a = item(&mut w, "Person").await;
        let b = item(&mut w, "Person").await;

        let r1 = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p)).await.unwrap();
        let r2 = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, b, p)).await.unwrap();

        assert_eq!((r1.left_place, r1.right_place), (0, 0));
        assert_eq!((r2.left_place, r2.right_place), (0, 1));
    }

    #[tokio::test]
    async fn test_explicit_place_shifts_sequence() {
        let mut w = world(None, None).await;
        let p = item(&mut w, "Publication").await;
        let a = item(&mut w, "Person").await;
        let b = item(&mut w, "Person").await;
        let c = item(&mut w, "Person").await;

        let r1 = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p)).await.unwrap();
        let r2 = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, b, p)).await.unwrap();
        let r3 = w.db.create_relationship(
            &mut w.tx,
            NewRelationship::new(w.authored.id, c, p).at_right_place(0),
        ).await.unwrap();

        assert_eq!(right_places(&w, p).await, vec![(r3.id, 0), (r1.id, 1), (r2.id, 2)]);
    }

    #[tokio::test]
    async fn test_delete_renumbers() {
        let mut w = world(None, None).await;
        let p = item(&mut w, "Publication").await;
        let mut rels = Vec::new();
        for _ in 0..3 {
            let a = item(&mut w, "Person").await;
            rels.push(w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p)).await.unwrap());
        }

        assert!(w.db.delete_relationship(&mut w.tx, rels[0].id, DeleteMode::Enforce).await.unwrap());
        assert_eq!(right_places(&w, p).await, vec![(rels[1].id, 0), (rels[2].id, 1)]);
        assert!(!w.db.delete_relationship(&mut w.tx, rels[0].id, DeleteMode::Enforce).await.unwrap());
    }

    #[tokio::test]
    async fn test_move_relationship() {
        let mut w = world(None, None).await;
        let p = item(&mut w, "Publication").await;
        let mut rels = Vec::new();
        for _ in 0..3 {
            let a = item(&mut w, "Person").await;
            rels.push(w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p)).await.unwrap());
        }

        let moved = w.db.move_relationship(&mut w.tx, rels[2].id, None, Some(0)).await.unwrap();
        assert_eq!(moved.right_place, 0);
        assert_eq!(moved.left_place, 0);
        assert_eq!(right_places(&w, p).await, vec![(rels[2].id, 0), (rels[0].id, 1), (rels[1].id, 2)]);
    }

    #[tokio::test]
    async fn test_max_cardinality_leaves_state_untouched() {
        let mut w = world(Some(1), None).await;
        let a = item(&mut w, "Person").await;
        let p1 = item(&mut w, "Publication").await;
        let p2 = item(&mut w, "Publication").await;

        w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p1)).await.unwrap();
        let err = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p2))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cardinality { side: Side::Left, .. }));
        assert_eq!(w.db.relationship_count(&w.tx).await.unwrap(), 1);
        assert!(w.db.relationships_of_item(&w.tx, p2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entity_type_mismatch() {
        let mut w = world(None, None).await;
        let a = item(&mut w, "Person").await;
        let b = item(&mut w, "Person").await;

        let err = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, b))
            .await
            .unwrap_err();
        match err {
            Error::EntityTypeMismatch { side, expected, found, .. } => {
                assert_eq!(side, Side::Right);
                assert_eq!(expected, "Publication");
                assert_eq!(found.as_deref(), Some("Person"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(w.db.relationship_count(&w.tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_min_cardinality_enforced_unless_forced() {
        let mut w = world(None, Some(1)).await;
        let p = item(&mut w, "Publication").await;
        let a = item(&mut w, "Person").await;
        let r = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p)).await.unwrap();

        let err = w.db.delete_relationship(&mut w.tx, r.id, DeleteMode::Enforce).await.unwrap_err();
        assert!(matches!(err, Error::Cardinality { side: Side::Right, .. }));
        assert!(w.db.get_relationship(&w.tx, r.id).await.unwrap().is_some());

        assert!(w.db.delete_relationship(&mut w.tx, r.id, DeleteMode::Force).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_item_after_force_delete_renumbers_other_endpoint() {
        let mut w = world(None, None).await;
        let p = item(&mut w, "Publication").await;
        let a = item(&mut w, "Person").await;
        let b = item(&mut w, "Person").await;
        let ra = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p)).await.unwrap();
        let rb = w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, b, p)).await.unwrap();
        let before = w.db.item_count(&w.tx).await.unwrap();

        assert!(matches!(w.db.delete_item(&mut w.tx, a).await.unwrap_err(), Error::ConstraintViolation(_)));
        assert!(w.db.delete_relationship(&mut w.tx, ra.id, DeleteMode::Force).await.unwrap());
        assert!(w.db.delete_item(&mut w.tx, a).await.unwrap());
        assert!(w.db.get_item(&w.tx, a).await.unwrap().is_none());
        assert_eq!(w.db.item_count(&w.tx).await.unwrap(), before - 1);
        assert_eq!(right_places(&w, p).await, vec![(rb.id, 0)]);
    }

    #[tokio::test]
    async fn test_self_relationship_sits_in_both_sequences() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let person = db.create_entity_type(&mut tx, "Person").await.unwrap();
        let knows = db.create_relationship_type(
            &mut tx,
            RelationshipTypeDraft::new(person.id, person.id, "knows", "isKnownBy"),
        ).await.unwrap();
        let a = db.create_item(&mut tx, vec![MetadataEntry::new(type_field(), "Person")]).await.unwrap();

        let r = db.create_relationship(&mut tx, NewRelationship::new(knows.id, a, a)).await.unwrap();
        assert_eq!((r.left_place, r.right_place), (0, 0));
        assert_eq!(db.relationships_of_item(&tx, a).await.unwrap().len(), 1);
        assert_eq!(db.relationships_of_item_and_type(&tx, a, knows.id, None).await.unwrap().len(), 1);

        assert!(db.delete_relationship(&mut tx, r.id, DeleteMode::Enforce).await.unwrap());
        assert!(db.delete_item(&mut tx, a).await.unwrap());
    }

    #[tokio::test]
    async fn test_referenced_types_cannot_be_deleted() {
        let mut w = world(None, None).await;
        let a = item(&mut w, "Person").await;
        let p = item(&mut w, "Publication").await;
        w.db.create_relationship(&mut w.tx, NewRelationship::new(w.authored.id, a, p)).await.unwrap();

        let err = w.db.delete_relationship_type(&mut w.tx, w.authored.id).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
        let err = w.db.delete_entity_type(&mut w.tx, w.authored.left_type).await.unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }
}
