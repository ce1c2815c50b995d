//! Relationship-derived virtual metadata.
//!
//! For every relationship touching an item, the item's side decides which
//! mappings apply. Each mapping yields at most one value whose place is the
//! relationship's place on that side, so values of one field sorted by place
//! reproduce the relationship order exactly.

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::config::VirtualMappingConfig;
use crate::model::*;
use crate::registry::select_by_label;
use crate::storage::StorageBackend;
use crate::{Error, Result};
use super::VirtualSource;

/// One resolved mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMapping {
    pub field: MetadataField,
    pub source: VirtualSource,
}

/// `(relationship type, side) → mappings`, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct VirtualMetadataPopulator {
    mappings: HashMap<(RelationshipTypeId, Side), SmallVec<[VirtualMapping; 2]>>,
}

impl VirtualMetadataPopulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(
        mut self,
        type_id: RelationshipTypeId,
        side: Side,
        field: MetadataField,
        source: VirtualSource,
    ) -> Self {
        self.add_mapping(type_id, side, field, source);
        self
    }

    pub fn add_mapping(
        &mut self,
        type_id: RelationshipTypeId,
        side: Side,
        field: MetadataField,
        source: VirtualSource,
    ) {
        self.mappings.entry((type_id, side)).or_default().push(VirtualMapping { field, source });
    }

    /// Resolve raw configuration entries against the registered types.
    ///
    /// An entry names its type by the label seen from its side. A label that
    /// matches no type is a configuration error; one that matches several
    /// types (same label, different entity types) maps all of them.
    ///
    /// Places of one target field come from a single relationship sequence.
    /// Two (type, side) pairs that would give the same entity type the same
    /// field are rejected.
    pub fn from_config(entries: &[VirtualMappingConfig], types: &[RelationshipType]) -> Result<Self> {
        let mut populator = Self::new();
        let mut claimed: HashMap<(EntityTypeId, MetadataField), (RelationshipTypeId, Side)> = HashMap::new();
        for entry in entries {
            let source = VirtualSource::from_json(&entry.source)?;
            let field = MetadataField::parse(&entry.field)?;
            let matched = select_by_label(types.iter().cloned(), &entry.relationship, entry.side);
            if matched.is_empty() {
                return Err(Error::Config(format!(
                    "no relationship type labelled '{}' on the {} side",
                    entry.relationship, entry.side
                )));
            }
            for rt in matched {
                let receiver = rt.entity_type(entry.side);
                let owner = *claimed.entry((receiver, field.clone())).or_insert((rt.id, entry.side));
                if owner != (rt.id, entry.side) {
                    return Err(Error::Config(format!(
                        "field {field} is already derived from relationship type {} ({} side); \
                         '{}' on the {} side would interleave its places",
                        owner.0, owner.1, entry.relationship, entry.side
                    )));
                }
                populator.add_mapping(rt.id, entry.side, field.clone(), source.clone());
            }
        }
        Ok(populator)
    }

    pub fn mappings(&self, type_id: RelationshipTypeId, side: Side) -> &[VirtualMapping] {
        self.mappings.get(&(type_id, side)).map_or(&[], |m| m.as_slice())
    }

    /// Whether an item on `side` of `type_id` receives any virtual metadata.
    pub fn has_mapping(&self, type_id: RelationshipTypeId, side: Side) -> bool {
        !self.mappings(type_id, side).is_empty()
    }

    /// Virtual values for `entity.item`, sorted by field then place.
    ///
    /// Relationships whose other endpoint no longer exists are skipped and
    /// logged; one bad edge never fails the whole read.
    pub async fn relationship_metadata<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        entity: &Entity,
        enabled: bool,
    ) -> Result<Vec<RelationshipMetadataValue>> {
        if !enabled {
            debug!(item = %entity.item.id, "virtual metadata disabled");
            return Ok(Vec::new());
        }

        let mut types: HashMap<RelationshipTypeId, Option<RelationshipType>> = HashMap::new();
        let mut values = Vec::new();

        for rel in &entity.relationships {
            if !types.contains_key(&rel.type_id) {
                let rt = backend.get_relationship_type(tx, rel.type_id).await?;
                types.insert(rel.type_id, rt);
            }
            let Some(rt) = types.get(&rel.type_id).and_then(Option::as_ref) else {
                warn!(relationship = %rel.id, relationship_type = %rel.type_id, "skipping relationship with unknown type");
                continue;
            };

            for side in rel.sides_of(entity.item.id) {
                values.extend(self.values_for_side(backend, tx, entity, rel, rt, side).await?);
            }
        }

        sort_by_field_and_place(&mut values);
        Ok(values)
    }

    /// Values one relationship contributes to the item sitting on `side`.
    pub async fn values_for_side<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        entity: &Entity,
        rel: &Relationship,
        rt: &RelationshipType,
        side: Side,
    ) -> Result<Vec<RelationshipMetadataValue>> {
        if !rt.copy_to(side) {
            return Ok(Vec::new());
        }
        let mappings = self.mappings(rt.id, side);
        if mappings.is_empty() {
            return Ok(Vec::new());
        }

        let other_id = rel.item(side.opposite());
        let fetched;
        let other = if other_id == entity.item.id {
            &entity.item
        } else {
            fetched = backend.get_item(tx, other_id).await?;
            match &fetched {
                Some(item) => item,
                None => {
                    warn!(
                        relationship = %rel.id,
                        item = %entity.item.id,
                        missing = %other_id,
                        "skipping dangling relationship"
                    );
                    return Ok(Vec::new());
                }
            }
        };

        let mut values = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let text = match rel.name_variant(side) {
                Some(variant) if mapping.source.is_textual() => Some(variant.to_string()),
                _ => mapping.source.render(other),
            };
            let Some(text) = text else {
                debug!(relationship = %rel.id, field = %mapping.field, "other item has no value for mapping");
                continue;
            };
            values.push(RelationshipMetadataValue {
                field: mapping.field.clone(),
                value: text,
                authority: format!("{VIRTUAL_AUTHORITY_PREFIX}{}", rel.id),
                relationship_id: rel.id,
                place: rel.place(side),
                use_for_place: true,
            });
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DeleteMode, MemoryBackend};
    use crate::tx::TxMode;
    use pretty_assertions::assert_eq;

    fn author_field() -> MetadataField {
        MetadataField::parse("dc.contributor.author").unwrap()
    }

    fn name_field() -> MetadataField {
        MetadataField::parse("person.name").unwrap()
    }

    struct Fixture {
        db: MemoryBackend,
        tx: <MemoryBackend as StorageBackend>::Tx,
        rt: RelationshipType,
    }

    async fn fixture(copy_to_right: bool) -> Fixture {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let person = db.create_entity_type(&mut tx, "Person").await.unwrap();
        let publication = db.create_entity_type(&mut tx, "Publication").await.unwrap();
        let rt = db.create_relationship_type(
            &mut tx,
            RelationshipTypeDraft::new(person.id, publication.id, "isPublicationOfAuthor", "isAuthorOfPublication")
                .with_copy(false, copy_to_right),
        ).await.unwrap();
        Fixture { db, tx, rt }
    }

    async fn person(f: &mut Fixture, name: &str) -> ItemId {
        f.db.create_item(&mut f.tx, vec![
            MetadataEntry::new(MetadataField::entity_type(), "Person"),
            MetadataEntry::new(name_field(), name),
        ]).await.unwrap()
    }

    async fn publication(f: &mut Fixture) -> ItemId {
        f.db.create_item(&mut f.tx, vec![MetadataEntry::new(MetadataField::entity_type(), "Publication")])
            .await
            .unwrap()
    }

    async fn entity(f: &Fixture, id: ItemId) -> Entity {
        let item = f.db.get_item(&f.tx, id).await.unwrap().unwrap();
        let rels = f.db.relationships_of_item(&f.tx, id).await.unwrap();
        Entity::new(item, rels)
    }

    fn populator(rt: &RelationshipType) -> VirtualMetadataPopulator {
        VirtualMetadataPopulator::new()
            .with_mapping(rt.id, Side::Right, author_field(), VirtualSource::Field(name_field()))
    }

    fn texts(values: &[RelationshipMetadataValue]) -> Vec<(String, u32)> {
        values.iter().map(|v| (v.value.clone(), v.place)).collect()
    }

    #[tokio::test]
    async fn test_values_follow_relationship_places() {
        let mut f = fixture(true).await;
        let p = publication(&mut f).await;
        let a = person(&mut f, "Ada").await;
        let b = person(&mut f, "Bob").await;
        f.db.create_relationship(&mut f.tx, NewRelationship::new(f.rt.id, a, p)).await.unwrap();
        let rb = f.db.create_relationship(&mut f.tx, NewRelationship::new(f.rt.id, b, p)).await.unwrap();

        let pop = populator(&f.rt);
        let values = pop.relationship_metadata(&f.db, &f.tx, &entity(&f, p).await, true).await.unwrap();
        assert_eq!(texts(&values), vec![("Ada".into(), 0), ("Bob".into(), 1)]);
        assert!(values.iter().all(|v| v.use_for_place));
        assert_eq!(values[1].authority, format!("virtual::{}", rb.id));
        assert_eq!(values[1].relationship_id, rb.id);

        f.db.move_relationship(&mut f.tx, rb.id, None, Some(0)).await.unwrap();
        let values = pop.relationship_metadata(&f.db, &f.tx, &entity(&f, p).await, true).await.unwrap();
        assert_eq!(texts(&values), vec![("Bob".into(), 0), ("Ada".into(), 1)]);
    }

    #[tokio::test]
    async fn test_disabled_switch_yields_nothing() {
        let mut f = fixture(true).await;
        let p = publication(&mut f).await;
        let a = person(&mut f, "Ada").await;
        f.db.create_relationship(&mut f.tx, NewRelationship::new(f.rt.id, a, p)).await.unwrap();

        let values = populator(&f.rt)
            .relationship_metadata(&f.db, &f.tx, &entity(&f, p).await, false)
            .await
            .unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_copy_flag_and_missing_mapping_yield_nothing() {
        let mut f = fixture(false).await;
        let p = publication(&mut f).await;
        let a = person(&mut f, "Ada").await;
        f.db.create_relationship(&mut f.tx, NewRelationship::new(f.rt.id, a, p)).await.unwrap();

        // copy_to_right is off
        let values = populator(&f.rt)
            .relationship_metadata(&f.db, &f.tx, &entity(&f, p).await, true)
            .await
            .unwrap();
        assert!(values.is_empty());

        // left side is not mapped at all
        let values = populator(&f.rt)
            .relationship_metadata(&f.db, &f.tx, &entity(&f, a).await, true)
            .await
            .unwrap();
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn test_dangling_relationship_is_skipped() {
        let mut f = fixture(true).await;
        let p = publication(&mut f).await;
        let a = person(&mut f, "Ada").await;
        let b = person(&mut f, "Bob").await;
        let ra = f.db.create_relationship(&mut f.tx, NewRelationship::new(f.rt.id, a, p)).await.unwrap();
        f.db.create_relationship(&mut f.tx, NewRelationship::new(f.rt.id, b, p)).await.unwrap();

        // Snapshot the entity, then remove Ada underneath it.
        let snapshot = entity(&f, p).await;
        f.db.delete_relationship(&mut f.tx, ra.id, DeleteMode::Force).await.unwrap();
        f.db.delete_item(&mut f.tx, a).await.unwrap();

        let values = populator(&f.rt)
            .relationship_metadata(&f.db, &f.tx, &snapshot, true)
            .await
            .unwrap();
        assert_eq!(texts(&values), vec![("Bob".into(), 1)]);
    }

    #[tokio::test]
    async fn test_name_variant_overrides_textual_sources_only() {
        let mut f = fixture(true).await;
        let p = publication(&mut f).await;
        let a = person(&mut f, "Ada Lovelace").await;
        f.db.create_relationship(
            &mut f.tx,
            NewRelationship::new(f.rt.id, a, p).with_right_value("Lovelace, A."),
        ).await.unwrap();

        let relation = MetadataField::parse("relation.isAuthorOfPublication").unwrap();
        let pop = populator(&f.rt).with_mapping(f.rt.id, Side::Right, relation.clone(), VirtualSource::ItemId);
        let values = pop.relationship_metadata(&f.db, &f.tx, &entity(&f, p).await, true).await.unwrap();

        let by_field: Vec<(String, String)> =
            values.iter().map(|v| (v.field.to_string(), v.value.clone())).collect();
        assert_eq!(by_field, vec![
            ("dc.contributor.author".to_string(), "Lovelace, A.".to_string()),
            ("relation.isAuthorOfPublication".to_string(), a.to_string()),
        ]);
    }

    #[tokio::test]
    async fn test_self_relationship_yields_one_value_per_side() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let person = db.create_entity_type(&mut tx, "Person").await.unwrap();
        let knows = db.create_relationship_type(
            &mut tx,
            RelationshipTypeDraft::new(person.id, person.id, "knows", "isKnownBy").with_copy(true, true),
        ).await.unwrap();
        let a = db.create_item(&mut tx, vec![
            MetadataEntry::new(MetadataField::entity_type(), "Person"),
            MetadataEntry::new(name_field(), "Ada"),
        ]).await.unwrap();
        db.create_relationship(&mut tx, NewRelationship::new(knows.id, a, a)).await.unwrap();

        let knows_field = MetadataField::parse("person.knows").unwrap();
        let known_by_field = MetadataField::parse("person.knownBy").unwrap();
        let pop = VirtualMetadataPopulator::new()
            .with_mapping(knows.id, Side::Left, knows_field.clone(), VirtualSource::Field(name_field()))
            .with_mapping(knows.id, Side::Right, known_by_field.clone(), VirtualSource::Field(name_field()));

        let item = db.get_item(&tx, a).await.unwrap().unwrap();
        let rels = db.relationships_of_item(&tx, a).await.unwrap();
        let values = pop.relationship_metadata(&db, &tx, &Entity::new(item, rels), true).await.unwrap();

        assert_eq!(values.len(), 2);
        // "knownBy" sorts before "knows"
        assert_eq!(values[0].field, known_by_field);
        assert_eq!(values[1].field, knows_field);
        assert!(values.iter().all(|v| v.value == "Ada" && v.place == 0));
    }

    #[test]
    fn test_from_config_resolves_label_and_side() {
        let rt = RelationshipTypeDraft::new(EntityTypeId(1), EntityTypeId(2), "isPublicationOfAuthor", "isAuthorOfPublication")
            .into_type(RelationshipTypeId(4));
        let entries = vec![VirtualMappingConfig {
            relationship: "isAuthorOfPublication".into(),
            side: Side::Right,
            field: "dc.contributor.author".into(),
            source: serde_json::json!({ "kind": "field", "field": "person.name" }),
        }];

        let pop = VirtualMetadataPopulator::from_config(&entries, &[rt.clone()]).unwrap();
        assert!(pop.has_mapping(rt.id, Side::Right));
        assert!(!pop.has_mapping(rt.id, Side::Left));

        // Same label on the wrong side resolves to nothing.
        let mut wrong_side = entries.clone();
        wrong_side[0].side = Side::Left;
        assert!(matches!(
            VirtualMetadataPopulator::from_config(&wrong_side, &[rt.clone()]),
            Err(Error::Config(_))
        ));

        let mut bad_kind = entries;
        bad_kind[0].source = serde_json::json!({ "kind": "related" });
        assert!(matches!(
            VirtualMetadataPopulator::from_config(&bad_kind, &[rt]),
            Err(Error::BadVirtualMetadataType(_))
        ));
    }

    #[test]
    fn test_from_config_rejects_two_types_feeding_one_field() {
        let person = EntityTypeId(1);
        let org = EntityTypeId(2);
        let publication = EntityTypeId(3);
        let authored = RelationshipTypeDraft::new(person, publication, "isPublicationOfAuthor", "isAuthorOfPublication")
            .into_type(RelationshipTypeId(1));
        let org_authored = RelationshipTypeDraft::new(org, publication, "isPublicationOfOrgUnit", "isOrgUnitOfPublication")
            .into_type(RelationshipTypeId(2));
        let mapping = |label: &str, field: &str| VirtualMappingConfig {
            relationship: label.into(),
            side: Side::Right,
            field: field.into(),
            source: serde_json::json!({ "kind": "itemId" }),
        };
        let types = [authored.clone(), org_authored.clone()];

        let colliding = vec![
            mapping("isAuthorOfPublication", "dc.contributor.author"),
            mapping("isOrgUnitOfPublication", "dc.contributor.author"),
        ];
        assert!(matches!(
            VirtualMetadataPopulator::from_config(&colliding, &types),
            Err(Error::Config(_))
        ));

        // Repeating a mapping for the same type and side is fine.
        let repeated = vec![
            mapping("isAuthorOfPublication", "dc.contributor.author"),
            mapping("isAuthorOfPublication", "dc.contributor.author"),
            mapping("isOrgUnitOfPublication", "relation.isOrgUnitOfPublication"),
        ];
        let pop = VirtualMetadataPopulator::from_config(&repeated, &types).unwrap();
        assert!(pop.has_mapping(authored.id, Side::Right));
        assert!(pop.has_mapping(org_authored.id, Side::Right));
    }
}
