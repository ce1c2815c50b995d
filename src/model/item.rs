//! Repository item: an id plus its stored metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MetadataField, StoredValue};

/// Opaque item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An item with its regular (stored) metadata values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub metadata: Vec<StoredValue>,
    pub last_modified: DateTime<Utc>,
}

impl Item {
    pub fn new(id: ItemId) -> Self {
        Self { id, metadata: Vec::new(), last_modified: Utc::now() }
    }

    /// Append a value at the next free place of its field.
    pub fn with_value(mut self, field: MetadataField, value: impl Into<String>) -> Self {
        let place = self.next_place(&field);
        let id = self.metadata.iter().map(|v| v.id).max().map_or(1, |m| m + 1);
        self.metadata.push(StoredValue {
            id,
            field,
            value: value.into(),
            authority: None,
            language: None,
            place,
        });
        self
    }

    /// Stored values of one field, ordered by place.
    pub fn values(&self, field: &MetadataField) -> Vec<&StoredValue> {
        let mut values: Vec<&StoredValue> =
            self.metadata.iter().filter(|v| &v.field == field).collect();
        values.sort_by_key(|v| v.place);
        values
    }

    pub fn first_value(&self, field: &MetadataField) -> Option<&str> {
        self.values(field).first().map(|v| v.value.as_str())
    }

    /// Label stored in `relationship.type`, if any and non-blank.
    pub fn entity_type_label(&self) -> Option<&str> {
        self.first_value(&MetadataField::entity_type())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn next_place(&self, field: &MetadataField) -> u32 {
        self.metadata
            .iter()
            .filter(|v| &v.field == field)
            .map(|v| v.place + 1)
            .max()
            .unwrap_or(0)
    }
}
