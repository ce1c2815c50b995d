//! # entity-graph: Typed Item Relationships with Virtual Metadata
//!
//! Typed, directional, ordered relationships between repository items, and
//! the read-only "virtual" metadata derived from them on every read.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `StorageBackend` is the contract between the services and storage
//! 2. **Plain records**: `Item`, `Relationship`, `RelationshipType` reference each other by id
//! 3. **Dense places**: each `(item, type, side)` sequence is always `0..n`
//! 4. **Derived, never stored**: virtual values are recomputed per read
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use entity_graph::*;
//!
//! # async fn example() -> entity_graph::Result<()> {
//! let mut repo = Repository::open_memory().await?;
//! let admin = Actor::admin();
//!
//! let person = repo.create_entity_type(&admin, "Person").await?;
//! let publication = repo.create_entity_type(&admin, "Publication").await?;
//! repo.create_relationship_type(
//!     &admin,
//!     RelationshipTypeDraft::new(person.id, publication.id, "isPublicationOfAuthor", "isAuthorOfPublication")
//!         .with_copy(false, true),
//! ).await?;
//!
//! repo.configure(RepositoryConfig::from_json_str(r#"{
//!     "virtual_metadata": [{
//!         "relationship": "isAuthorOfPublication", "side": "right",
//!         "field": "dc.contributor.author",
//!         "source": { "kind": "field", "field": "person.name" }
//!     }]
//! }"#)?).await?;
//!
//! // ... create items and relationships, then:
//! # let p = ItemId(1);
//! for value in repo.get_metadata(p, true).await? {
//!     println!("{} [{}] = {}", value.field(), value.place(), value.value());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Memory | (default) | In-memory repository for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod auth;
pub mod config;
pub mod registry;
pub mod relation;
pub mod virtual_metadata;
pub mod entity;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Item, ItemId, MetadataField, MetadataEntry, MetadataValue, StoredValue,
    RelationshipMetadataValue, AuthorityVirtualMetadataValue, Placed,
    EntityType, EntityTypeId, RelationshipType, RelationshipTypeId, RelationshipTypeDraft,
    Relationship, RelId, NewRelationship, Side, SideFilter, Cardinality, Entity,
};

// ============================================================================
// Re-exports: Storage, transactions, services
// ============================================================================

pub use storage::{StorageBackend, BackendConfig, DeleteMode, MemoryBackend};
pub use tx::{Transaction, TxMode, TxId};
pub use auth::{Authorizer, Actor};
pub use config::{RepositoryConfig, RelatedItemsConfig};
pub use relation::Page;
pub use virtual_metadata::{AuthorityVirtualMetadata, VirtualMetadataPopulator, VirtualSource};

// ============================================================================
// Top-level Repository handle
// ============================================================================

/// The primary entry point. A `Repository` wraps a storage backend together
/// with the resolved virtual metadata configuration. Each method below runs
/// as its own transaction; use `begin` for multi-step units of work.
pub struct Repository<B: StorageBackend> {
    backend: B,
    config: RepositoryConfig,
    populator: VirtualMetadataPopulator,
    authority: AuthorityVirtualMetadata,
}

impl<B: StorageBackend> Repository<B> {
    /// Create a Repository with the given backend and default configuration.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            config: RepositoryConfig::default(),
            populator: VirtualMetadataPopulator::new(),
            authority: AuthorityVirtualMetadata::default(),
        }
    }

    /// Install `config`, resolving its mappings against the registered
    /// relationship types. Call again after the registry changes.
    pub async fn configure(&mut self, config: RepositoryConfig) -> Result<()> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let types = self.backend.all_relationship_types(&tx).await?;
        self.backend.commit_tx(tx).await?;

        let populator = VirtualMetadataPopulator::from_config(&config.virtual_metadata, &types)?;
        let authority = AuthorityVirtualMetadata::from_config(&config.authority)?;
        tracing::info!(
            mappings = config.virtual_metadata.len(),
            enabled = config.virtual_metadata_enabled,
            "virtual metadata configured"
        );
        self.populator = populator;
        self.authority = authority;
        self.config = config;
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn populator(&self) -> &VirtualMetadataPopulator {
        &self.populator
    }

    pub fn authority(&self) -> &AuthorityVirtualMetadata {
        &self.authority
    }

    /// Begin an explicit transaction.
    pub async fn begin(&self, mode: TxMode) -> Result<ExplicitTx<'_, B>> {
        let tx = self.backend.begin_tx(mode).await?;
        Ok(ExplicitTx { repo: self, tx })
    }

    async fn read_item(&self, tx: &B::Tx, id: ItemId) -> Result<Item> {
        self.backend.get_item(tx, id).await?
            .ok_or_else(|| Error::NotFound(format!("Item {id}")))
    }

    fn virtual_enabled(&self, requested: bool) -> bool {
        requested && self.config.virtual_metadata_enabled
    }

    // ========================================================================
    // Metadata views
    // ========================================================================

    /// Stored and virtual values of `id`, sorted by field then place.
    /// Relationship-derived values need both `virtual_enabled` and the
    /// configured master switch.
    pub async fn get_metadata(&self, id: ItemId, virtual_enabled: bool) -> Result<Vec<MetadataValue>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let item = self.read_item(&tx, id).await?;
        let values = virtual_metadata::get_metadata(
            &self.backend,
            &tx,
            &self.populator,
            &self.authority,
            &item,
            self.virtual_enabled(virtual_enabled),
        ).await?;
        self.backend.commit_tx(tx).await?;
        Ok(values)
    }

    pub async fn get_relationship_metadata(
        &self,
        id: ItemId,
        virtual_enabled: bool,
    ) -> Result<Vec<RelationshipMetadataValue>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let entity = entity::find_by_item_id(&self.backend, &tx, id).await?
            .ok_or_else(|| Error::NotFound(format!("Item {id}")))?;
        let values = self.populator
            .relationship_metadata(&self.backend, &tx, &entity, self.virtual_enabled(virtual_enabled))
            .await?;
        self.backend.commit_tx(tx).await?;
        Ok(values)
    }

    pub async fn get_authority_virtual_metadata(
        &self,
        id: ItemId,
    ) -> Result<Vec<AuthorityVirtualMetadataValue>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let item = self.read_item(&tx, id).await?;
        let values = self.authority.authority_virtual_metadata(&self.backend, &tx, &item.metadata).await?;
        self.backend.commit_tx(tx).await?;
        Ok(values)
    }

    pub async fn find_entity(&self, id: ItemId) -> Result<Option<Entity>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let entity = entity::find_by_item_id(&self.backend, &tx, id).await?;
        self.backend.commit_tx(tx).await?;
        Ok(entity)
    }

    // ========================================================================
    // Items and registries
    // ========================================================================

    pub async fn create_item(&self, metadata: Vec<MetadataEntry>) -> Result<ItemId> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let id = self.backend.create_item(&mut tx, metadata).await?;
        self.backend.commit_tx(tx).await?;
        Ok(id)
    }

    /// Delete an item together with its relationships.
    pub async fn delete_item(&self, id: ItemId) -> Result<bool> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let deleted = relation::delete_item(&self.backend, &mut tx, &self.populator, self.config.related_items, id).await?;
        self.backend.commit_tx(tx).await?;
        Ok(deleted)
    }

    pub async fn create_entity_type(&self, actor: &dyn Authorizer, label: &str) -> Result<EntityType> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let et = registry::create_entity_type(&self.backend, &mut tx, actor, label).await?;
        self.backend.commit_tx(tx).await?;
        Ok(et)
    }

    pub async fn create_relationship_type(
        &self,
        actor: &dyn Authorizer,
        draft: RelationshipTypeDraft,
    ) -> Result<RelationshipType> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let rt = registry::create_relationship_type(&self.backend, &mut tx, actor, draft).await?;
        self.backend.commit_tx(tx).await?;
        Ok(rt)
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    pub async fn create_relationship(&self, new: NewRelationship) -> Result<Relationship> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let rel = relation::create(&self.backend, &mut tx, &self.populator, self.config.related_items, new).await?;
        self.backend.commit_tx(tx).await?;
        Ok(rel)
    }

    pub async fn move_relationship(
        &self,
        id: RelId,
        left_place: Option<u32>,
        right_place: Option<u32>,
    ) -> Result<Relationship> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let rel = relation::move_relationship(
            &self.backend, &mut tx, &self.populator, self.config.related_items, id, left_place, right_place,
        ).await?;
        self.backend.commit_tx(tx).await?;
        Ok(rel)
    }

    pub async fn delete_relationship(&self, id: RelId) -> Result<bool> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let deleted = relation::delete(&self.backend, &mut tx, &self.populator, self.config.related_items, id).await?;
        self.backend.commit_tx(tx).await?;
        Ok(deleted)
    }

    pub async fn delete_relationship_and_copy(
        &self,
        id: RelId,
        copy_to_left: bool,
        copy_to_right: bool,
    ) -> Result<bool> {
        let mut tx = self.backend.begin_tx(TxMode::ReadWrite).await?;
        let deleted = relation::delete_and_copy(
            &self.backend, &mut tx, &self.populator, self.config.related_items, id, copy_to_left, copy_to_right,
        ).await?;
        self.backend.commit_tx(tx).await?;
        Ok(deleted)
    }

    pub async fn find_relationships_by_item(&self, item: ItemId, page: Page) -> Result<Vec<Relationship>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let rels = relation::find_by_item(&self.backend, &tx, item, page).await?;
        self.backend.commit_tx(tx).await?;
        Ok(rels)
    }

    pub async fn find_relationships_by_type_name(&self, label: &str, page: Page) -> Result<Vec<Relationship>> {
        let tx = self.backend.begin_tx(TxMode::ReadOnly).await?;
        let rels = relation::find_by_type_name(&self.backend, &tx, label, page).await?;
        self.backend.commit_tx(tx).await?;
        Ok(rels)
    }
}

/// In-memory repository for testing and embedding.
impl Repository<storage::MemoryBackend> {
    pub async fn open_memory() -> Result<Self> {
        let backend = storage::MemoryBackend::new();
        Ok(Self::with_backend(backend))
    }
}

/// Explicit transaction handle over a repository's backend.
pub struct ExplicitTx<'r, B: StorageBackend> {
    repo: &'r Repository<B>,
    tx: B::Tx,
}

impl<'r, B: StorageBackend> ExplicitTx<'r, B> {
    pub fn repository(&self) -> &'r Repository<B> {
        self.repo
    }

    pub fn tx(&self) -> &B::Tx {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut B::Tx {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.repo.backend.commit_tx(self.tx).await
    }

    pub async fn rollback(self) -> Result<()> {
        self.repo.backend.rollback_tx(self.tx).await
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Cardinality violation: {side} item {item} would {violation} on relationship type '{relationship_type}'")]
    Cardinality {
        relationship_type: String,
        side: Side,
        item: ItemId,
        violation: String,
    },

    #[error("Entity type mismatch: {side} item {item} must be '{expected}', found {found:?}")]
    EntityTypeMismatch {
        item: ItemId,
        side: Side,
        expected: String,
        found: Option<String>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unsupported virtual metadata type: {0}")]
    BadVirtualMetadataType(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
