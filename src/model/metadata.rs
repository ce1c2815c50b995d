//! Metadata fields and values.
//!
//! A metadata value is either stored on the item, derived from a
//! relationship, or derived from an authority key. The three variants share
//! the `Placed` capability so sorting and place logic never care which one
//! they hold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ItemId, RelId};
use crate::{Error, Result};

/// Authority prefix carried by relationship-derived values.
pub const VIRTUAL_AUTHORITY_PREFIX: &str = "virtual::";

// ============================================================================
// MetadataField
// ============================================================================

/// A `schema.element[.qualifier]` triple.
///
/// Ordering is schema, element, then qualifier with the unqualified field
/// first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetadataField {
    pub schema: String,
    pub element: String,
    pub qualifier: Option<String>,
}

impl MetadataField {
    pub fn new(
        schema: impl Into<String>,
        element: impl Into<String>,
        qualifier: Option<&str>,
    ) -> Self {
        Self {
            schema: schema.into(),
            element: element.into(),
            qualifier: qualifier.map(str::to_string),
        }
    }

    /// The reserved field naming an item's entity type.
    pub fn entity_type() -> Self {
        Self::new("relationship", "type", None)
    }

    /// Parse `schema.element` or `schema.element.qualifier`.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::InvalidArgument(format!("malformed metadata field '{s}'")));
        }
        match parts.as_slice() {
            [schema, element] => Ok(Self::new(*schema, *element, None)),
            [schema, element, qualifier] => Ok(Self::new(*schema, *element, Some(qualifier))),
            _ => Err(Error::InvalidArgument(format!("malformed metadata field '{s}'"))),
        }
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}.{}", self.schema, self.element, q),
            None => write!(f, "{}.{}", self.schema, self.element),
        }
    }
}

impl FromStr for MetadataField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MetadataField {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<MetadataField> for String {
    fn from(field: MetadataField) -> Self {
        field.to_string()
    }
}

// ============================================================================
// MetadataEntry: input for new stored values
// ============================================================================

/// A metadata value to be stored; the backend assigns id and place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub field: MetadataField,
    pub value: String,
    pub authority: Option<String>,
    pub language: Option<String>,
}

impl MetadataEntry {
    pub fn new(field: MetadataField, value: impl Into<String>) -> Self {
        Self { field, value: value.into(), authority: None, language: None }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

// ============================================================================
// Value variants
// ============================================================================

/// A value persisted on the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    pub id: u64,
    pub field: MetadataField,
    pub value: String,
    pub authority: Option<String>,
    pub language: Option<String>,
    pub place: u32,
}

/// A read-only value synthesized from one relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadataValue {
    pub field: MetadataField,
    pub value: String,
    /// Always `virtual::<relationship id>`.
    pub authority: String,
    pub relationship_id: RelId,
    /// Place of the relationship on the side of the item being read.
    pub place: u32,
    pub use_for_place: bool,
}

impl RelationshipMetadataValue {
    /// Synthetic identity; never resolves to a stored row.
    pub fn synthetic_id(&self) -> String {
        format!("{}{}::{}", VIRTUAL_AUTHORITY_PREFIX, self.relationship_id, self.field)
    }
}

/// A read-only value synthesized from an authority-bearing stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityVirtualMetadataValue {
    pub field: MetadataField,
    /// Field of the stored value this one was derived from.
    pub source_field: MetadataField,
    pub value: String,
    /// Authority key with the reserved prefix stripped.
    pub authority: String,
    pub target: ItemId,
    /// Ordinal among generated values of the same field.
    pub place: u32,
}

impl AuthorityVirtualMetadataValue {
    pub fn synthetic_id(&self) -> String {
        format!("authority::{}::{}::{}", self.authority, self.field, self.place)
    }
}

/// Any metadata value an item can expose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetadataValue {
    Stored(StoredValue),
    Relationship(RelationshipMetadataValue),
    Authority(AuthorityVirtualMetadataValue),
}

impl MetadataValue {
    pub fn authority(&self) -> Option<&str> {
        match self {
            MetadataValue::Stored(v) => v.authority.as_deref(),
            MetadataValue::Relationship(v) => Some(&v.authority),
            MetadataValue::Authority(v) => Some(&v.authority),
        }
    }

    pub fn is_virtual(&self) -> bool {
        !matches!(self, MetadataValue::Stored(_))
    }

    pub fn as_stored(&self) -> Option<&StoredValue> {
        match self {
            MetadataValue::Stored(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&RelationshipMetadataValue> {
        match self {
            MetadataValue::Relationship(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_authority(&self) -> Option<&AuthorityVirtualMetadataValue> {
        match self {
            MetadataValue::Authority(v) => Some(v),
            _ => None,
        }
    }

    /// Row id for stored values, synthetic identity for virtual ones.
    pub fn identity(&self) -> String {
        match self {
            MetadataValue::Stored(v) => v.id.to_string(),
            MetadataValue::Relationship(v) => v.synthetic_id(),
            MetadataValue::Authority(v) => v.synthetic_id(),
        }
    }
}

impl From<StoredValue> for MetadataValue {
    fn from(v: StoredValue) -> Self {
        MetadataValue::Stored(v)
    }
}

impl From<RelationshipMetadataValue> for MetadataValue {
    fn from(v: RelationshipMetadataValue) -> Self {
        MetadataValue::Relationship(v)
    }
}

impl From<AuthorityVirtualMetadataValue> for MetadataValue {
    fn from(v: AuthorityVirtualMetadataValue) -> Self {
        MetadataValue::Authority(v)
    }
}

// ============================================================================
// Placed capability
// ============================================================================

/// Anything with a field, a place and a textual value.
pub trait Placed {
    fn field(&self) -> &MetadataField;
    fn place(&self) -> u32;
    fn value(&self) -> &str;
}

impl Placed for StoredValue {
    fn field(&self) -> &MetadataField { &self.field }
    fn place(&self) -> u32 { self.place }
    fn value(&self) -> &str { &self.value }
}

impl Placed for RelationshipMetadataValue {
    fn field(&self) -> &MetadataField { &self.field }
    fn place(&self) -> u32 { self.place }
    fn value(&self) -> &str { &self.value }
}

impl Placed for AuthorityVirtualMetadataValue {
    fn field(&self) -> &MetadataField { &self.field }
    fn place(&self) -> u32 { self.place }
    fn value(&self) -> &str { &self.value }
}

impl Placed for MetadataValue {
    fn field(&self) -> &MetadataField {
        match self {
            MetadataValue::Stored(v) => &v.field,
            MetadataValue::Relationship(v) => &v.field,
            MetadataValue::Authority(v) => &v.field,
        }
    }

    fn place(&self) -> u32 {
        match self {
            MetadataValue::Stored(v) => v.place,
            MetadataValue::Relationship(v) => v.place,
            MetadataValue::Authority(v) => v.place,
        }
    }

    fn value(&self) -> &str {
        match self {
            MetadataValue::Stored(v) => &v.value,
            MetadataValue::Relationship(v) => &v.value,
            MetadataValue::Authority(v) => &v.value,
        }
    }
}

/// Stable sort by field, then place. Equal keys keep their input order.
pub fn sort_by_field_and_place<T: Placed>(values: &mut [T]) {
    values.sort_by(|a, b| a.field().cmp(b.field()).then(a.place().cmp(&b.place())));
}
