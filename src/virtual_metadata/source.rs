//! Mapping kinds: how a virtual value's text is derived from the other
//! endpoint of a relationship.

use serde_json::Value as Json;

use crate::model::{Item, MetadataField};
use crate::{Error, Result};

/// Derivation rule for one `(relationship type, side) → field` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualSource {
    /// The other item's id.
    ItemId,
    /// The other item's entity type label.
    EntityType,
    /// First value of one field of the other item.
    Field(MetadataField),
    /// First values of several fields, joined.
    Concatenate { fields: Vec<MetadataField>, separator: String },
}

impl VirtualSource {
    /// Parse `{ "kind": ..., ... }`. Unknown kinds are a configuration error
    /// distinct from malformed parameters.
    pub fn from_json(json: &Json) -> Result<Self> {
        let kind = json.get("kind").and_then(Json::as_str)
            .ok_or_else(|| Error::Config(format!("virtual metadata source without a kind: {json}")))?;

        match kind {
            "itemId" => Ok(VirtualSource::ItemId),
            "entityType" => Ok(VirtualSource::EntityType),
            "field" => {
                let field = json.get("field").and_then(Json::as_str)
                    .ok_or_else(|| Error::Config("'field' source needs a \"field\"".into()))?;
                Ok(VirtualSource::Field(MetadataField::parse(field)?))
            }
            "concatenate" => {
                let fields = json.get("fields").and_then(Json::as_array)
                    .ok_or_else(|| Error::Config("'concatenate' source needs \"fields\"".into()))?
                    .iter()
                    .map(|f| {
                        f.as_str()
                            .ok_or_else(|| Error::Config(format!("non-string field {f}")))
                            .and_then(MetadataField::parse)
                    })
                    .collect::<Result<Vec<_>>>()?;
                if fields.is_empty() {
                    return Err(Error::Config("'concatenate' source needs at least one field".into()));
                }
                let separator = json.get("separator").and_then(Json::as_str).unwrap_or(", ").to_string();
                Ok(VirtualSource::Concatenate { fields, separator })
            }
            other => Err(Error::BadVirtualMetadataType(other.to_string())),
        }
    }

    /// Whether a relationship name variant replaces this source's text.
    pub fn is_textual(&self) -> bool {
        matches!(self, VirtualSource::Field(_) | VirtualSource::Concatenate { .. })
    }

    /// Text for `other`, or `None` when the other item has nothing to show.
    pub fn render(&self, other: &Item) -> Option<String> {
        match self {
            VirtualSource::ItemId => Some(other.id.to_string()),
            VirtualSource::EntityType => other.entity_type_label().map(str::to_string),
            VirtualSource::Field(field) => other.first_value(field).map(str::to_string),
            VirtualSource::Concatenate { fields, separator } => {
                let parts: Vec<&str> = fields.iter().filter_map(|f| other.first_value(f)).collect();
                if parts.is_empty() { None } else { Some(parts.join(separator)) }
            }
        }
    }
}
