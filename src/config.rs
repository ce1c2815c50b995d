//! Repository configuration.
//!
//! Loaded once at startup from JSON. Mapping entries stay in their raw form
//! here; `virtual_metadata::VirtualMetadataPopulator::from_config` resolves
//! them against the relationship type registry.

use std::io::Read;
use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::Side;
use crate::storage::BackendConfig;
use crate::Result;

/// Default authority prefix marking a stored value as pointing at an item.
pub const DEFAULT_ITEM_AUTHORITY_PREFIX: &str = "item::";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Master switch for relationship-derived metadata in `get_metadata`.
    #[serde(default = "default_true")]
    pub virtual_metadata_enabled: bool,
    #[serde(default)]
    pub virtual_metadata: Vec<VirtualMappingConfig>,
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub related_items: RelatedItemsConfig,
}

fn default_true() -> bool {
    true
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            virtual_metadata_enabled: true,
            virtual_metadata: Vec::new(),
            authority: AuthorityConfig::default(),
            related_items: RelatedItemsConfig::default(),
        }
    }
}

impl RepositoryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }
}

/// One `(relationship type, side) → field` mapping, unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMappingConfig {
    /// Label of the relationship type as seen from `side`.
    pub relationship: String,
    /// Side the receiving item sits on.
    pub side: Side,
    /// Target field, `schema.element[.qualifier]`.
    pub field: String,
    /// Mapping kind and its parameters. `kind` is checked at resolution so an
    /// unknown kind surfaces as `BadVirtualMetadataType`.
    pub source: serde_json::Value,
}

/// Authority-derived metadata settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Source field → field the derived values are published under.
    #[serde(default)]
    pub targets: HashMap<String, String>,
}

fn default_prefix() -> String {
    DEFAULT_ITEM_AUTHORITY_PREFIX.to_string()
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self { prefix: default_prefix(), targets: HashMap::new() }
    }
}

/// Bounds on the related-item walk after a relationship change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedItemsConfig {
    pub max: usize,
    pub max_depth: usize,
}

impl Default for RelatedItemsConfig {
    fn default() -> Self {
        Self { max: 20, max_depth: 5 }
    }
}
