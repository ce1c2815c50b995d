//! # Virtual Metadata
//!
//! Read-only values computed on every read and never persisted.
//!
//! | Source | Module | Place |
//! |--------|--------|-------|
//! | Relationships | `populator` | the relationship's place on the item's side |
//! | Authority keys | `authority` | encounter order within the published field |
//!
//! `get_metadata` merges both with the item's stored values into one view
//! sorted by field, then place.

pub mod authority;
pub mod populator;
pub mod source;

pub use authority::{parse_item_authority, AuthorityVirtualMetadata};
pub use populator::{VirtualMapping, VirtualMetadataPopulator};
pub use source::VirtualSource;

use crate::model::*;
use crate::storage::StorageBackend;
use crate::Result;

/// Full metadata view of `item`: stored values, relationship-derived values
/// and authority-derived values.
///
/// Relationship values come first among equal (field, place) keys, then
/// stored values, then authority values. An authority value that is not
/// remapped shares its field with the stored value it came from; the variant
/// tells them apart.
pub async fn get_metadata<B: StorageBackend>(
    backend: &B,
    tx: &B::Tx,
    populator: &VirtualMetadataPopulator,
    authority: &AuthorityVirtualMetadata,
    item: &Item,
    enabled: bool,
) -> Result<Vec<MetadataValue>> {
    let relationships = backend.relationships_of_item(tx, item.id).await?;
    let entity = Entity::new(item.clone(), relationships);

    let mut values: Vec<MetadataValue> = populator
        .relationship_metadata(backend, tx, &entity, enabled)
        .await?
        .into_iter()
        .map(MetadataValue::from)
        .collect();
    values.extend(item.metadata.iter().cloned().map(MetadataValue::from));
    values.extend(
        authority
            .authority_virtual_metadata(backend, tx, &item.metadata)
            .await?
            .into_iter()
            .map(MetadataValue::from),
    );

    sort_by_field_and_place(&mut values);
    Ok(values)
}
