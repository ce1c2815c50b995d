//! Authority-derived virtual metadata.
//!
//! A stored value whose authority starts with the configured prefix (default
//! `item::`) points at another item. Each such value that resolves yields one
//! derived value with the same text, the prefix stripped from its authority,
//! and a place counted per published field in encounter order.

use hashbrown::HashMap;
use tracing::debug;

use crate::config::AuthorityConfig;
use crate::model::*;
use crate::storage::StorageBackend;
use crate::Result;

/// Item id referenced by `authority`, if it carries `prefix` and a numeric key.
pub fn parse_item_authority(prefix: &str, authority: &str) -> Option<ItemId> {
    authority.strip_prefix(prefix)?.trim().parse().ok().map(ItemId)
}

#[derive(Debug, Clone)]
pub struct AuthorityVirtualMetadata {
    prefix: String,
    /// Source field → field derived values are published under.
    targets: HashMap<MetadataField, MetadataField>,
}

impl Default for AuthorityVirtualMetadata {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_ITEM_AUTHORITY_PREFIX)
    }
}

impl AuthorityVirtualMetadata {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), targets: HashMap::new() }
    }

    pub fn with_target(mut self, source: MetadataField, target: MetadataField) -> Self {
        self.targets.insert(source, target);
        self
    }

    pub fn from_config(config: &AuthorityConfig) -> Result<Self> {
        let mut service = Self::new(config.prefix.clone());
        for (source, target) in &config.targets {
            service.targets.insert(MetadataField::parse(source)?, MetadataField::parse(target)?);
        }
        Ok(service)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Field values derived from `source` are published under.
    pub fn target_field<'a>(&'a self, source: &'a MetadataField) -> &'a MetadataField {
        self.targets.get(source).unwrap_or(source)
    }

    /// Whether values of `source` are published under a different field.
    pub fn is_remapped(&self, source: &MetadataField) -> bool {
        self.targets.get(source).is_some_and(|t| t != source)
    }

    /// Derived values for `stored`, in (field, place) order of the sources.
    ///
    /// Keys that do not parse or point at no item are skipped.
    pub async fn authority_virtual_metadata<B: StorageBackend>(
        &self,
        backend: &B,
        tx: &B::Tx,
        stored: &[StoredValue],
    ) -> Result<Vec<AuthorityVirtualMetadataValue>> {
        let mut sources: Vec<&StoredValue> = stored.iter()
            .filter(|v| v.authority.as_deref().is_some_and(|a| a.starts_with(&self.prefix)))
            .collect();
        sources.sort_by(|a, b| a.field.cmp(&b.field).then(a.place.cmp(&b.place)));

        let mut next_place: HashMap<MetadataField, u32> = HashMap::new();
        let mut values = Vec::new();

        for source in sources {
            let Some(authority) = source.authority.as_deref() else { continue };
            let Some(target) = parse_item_authority(&self.prefix, authority) else {
                debug!(authority, field = %source.field, "authority key is not an item reference");
                continue;
            };
            if backend.get_item(tx, target).await?.is_none() {
                debug!(authority, field = %source.field, "authority key resolves to no item");
                continue;
            }

            let field = self.target_field(&source.field).clone();
            let slot = next_place.entry(field.clone()).or_insert(0);
            let place = *slot;
            *slot += 1;

            values.push(AuthorityVirtualMetadataValue {
                field,
                source_field: source.field.clone(),
                value: source.value.clone(),
                authority: authority[self.prefix.len()..].to_string(),
                target,
                place,
            });
        }

        sort_by_field_and_place(&mut values);
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::tx::TxMode;
    use pretty_assertions::assert_eq;

    fn author() -> MetadataField {
        MetadataField::parse("dc.contributor.author").unwrap()
    }

    #[test]
    fn test_parse_item_authority() {
        assert_eq!(parse_item_authority("item::", "item::42"), Some(ItemId(42)));
        assert_eq!(parse_item_authority("item::", "orcid::0000-0001"), None);
        assert_eq!(parse_item_authority("item::", "item::abc"), None);
        assert_eq!(parse_item_authority("ref::", "ref::7"), Some(ItemId(7)));
    }

    #[tokio::test]
    async fn test_resolved_keys_yield_values_in_place_order() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let x = db.create_item(&mut tx, vec![]).await.unwrap();
        let y = db.create_item(&mut tx, vec![]).await.unwrap();
        let p = db.create_item(&mut tx, vec![
            MetadataEntry::new(author(), "Smith, J.").with_authority(format!("item::{y}")),
            MetadataEntry::new(author(), "Unknown, U.").with_authority("item::9999"),
            MetadataEntry::new(author(), "Free Text"),
            MetadataEntry::new(author(), "Doe, A.").with_authority(format!("item::{x}")),
            MetadataEntry::new(author(), "Ext, E.").with_authority("orcid::0000"),
        ]).await.unwrap();

        let item = db.get_item(&tx, p).await.unwrap().unwrap();
        let values = AuthorityVirtualMetadata::default()
            .authority_virtual_metadata(&db, &tx, &item.metadata)
            .await
            .unwrap();

        let got: Vec<(&str, &str, u32)> =
            values.iter().map(|v| (v.value.as_str(), v.authority.as_str(), v.place)).collect();
        let (ys, xs) = (y.to_string(), x.to_string());
        assert_eq!(got, vec![("Smith, J.", ys.as_str(), 0), ("Doe, A.", xs.as_str(), 1)]);
        assert_eq!(values[0].target, y);
        assert_eq!(values[0].source_field, author());
    }

    #[tokio::test]
    async fn test_remapped_field() {
        let db = MemoryBackend::new();
        let mut tx = db.begin_tx(TxMode::ReadWrite).await.unwrap();
        let x = db.create_item(&mut tx, vec![]).await.unwrap();
        let p = db.create_item(&mut tx, vec![
            MetadataEntry::new(author(), "Doe, A.").with_authority(format!("item::{x}")),
        ]).await.unwrap();

        let relation_author = MetadataField::parse("relation.author").unwrap();
        let service = AuthorityVirtualMetadata::default().with_target(author(), relation_author.clone());
        assert!(service.is_remapped(&author()));

        let item = db.get_item(&tx, p).await.unwrap().unwrap();
        let values = service.authority_virtual_metadata(&db, &tx, &item.metadata).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].field, relation_author);
        assert_eq!(values[0].place, 0);
    }

    #[test]
    fn test_from_config_rejects_bad_field() {
        let mut config = AuthorityConfig::default();
        config.targets.insert("dc".into(), "relation.author".into());
        assert!(AuthorityVirtualMetadata::from_config(&config).is_err());
    }
}
