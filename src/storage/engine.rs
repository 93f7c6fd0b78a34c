use crate::core::{ExternalId, NewResource, Resource, ResourceId, Result};
use async_trait::async_trait;

/// Durable keyed storage for entities - allows pluggable backends
///
/// Each method is atomic for the single row it touches. The coordinator
/// builds its consistency on top of that plus per-id serialization.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Persist a new row, assigning its internal id (and an external id when
    /// the draft carries none). A taken external id is a `Validation` error,
    /// checked atomically with the insert.
    async fn create(&self, draft: NewResource) -> Result<Resource>;

    /// Fetch a row by internal id
    async fn find_by_id(&self, id: ResourceId) -> Result<Option<Resource>>;

    /// Fetch a row by its outward-facing identifier
    async fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Resource>>;

    /// Replace an existing row. Fails with `NotFound` when the row is gone.
    async fn update(&self, resource: &Resource) -> Result<()>;

    /// Remove a row, returning it when it existed
    async fn delete(&self, id: ResourceId) -> Result<Option<Resource>>;

    /// Every stored row, ordered by internal id
    async fn scan(&self) -> Result<Vec<Resource>>;
}
