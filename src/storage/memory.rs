use super::EntityStore;
use crate::core::{ExternalId, LifecycleError, NewResource, Resource, ResourceId, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    rows: BTreeMap<ResourceId, Resource>,
    by_external: HashMap<ExternalId, ResourceId>,
}

/// In-memory `EntityStore`
///
/// Rows and the external-id index share one lock so a create or delete
/// never leaves the index out of step with the rows.
pub struct InMemoryEntityStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.tables.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn create(&self, draft: NewResource) -> Result<Resource> {
        let mut tables = self.tables.write().await;

        let external_id = draft.external_id.unwrap_or_else(ExternalId::generate);
        if tables.by_external.contains_key(&external_id) {
            return Err(LifecycleError::Validation(format!(
                "external id '{external_id}' is already in use"
            )));
        }

        let id = ResourceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let resource = Resource {
            id,
            external_id: external_id.clone(),
            owner: draft.owner,
            display: draft.display,
            state: draft.state,
            created_at: now,
            updated_at: now,
            body: draft.body,
        };

        tables.by_external.insert(external_id, id);
        tables.rows.insert(id, resource.clone());
        Ok(resource)
    }

    async fn find_by_id(&self, id: ResourceId) -> Result<Option<Resource>> {
        let tables = self.tables.read().await;
        Ok(tables.rows.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Resource>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_external
            .get(external_id)
            .and_then(|id| tables.rows.get(id))
            .cloned())
    }

    async fn update(&self, resource: &Resource) -> Result<()> {
        let mut tables = self.tables.write().await;
        let row = tables
            .rows
            .get_mut(&resource.id)
            .ok_or_else(|| LifecycleError::not_found(resource.kind(), resource.id))?;

        if row.external_id != resource.external_id {
            return Err(LifecycleError::Storage(format!(
                "external id of row {} is immutable",
                resource.id
            )));
        }
        if row.owner != resource.owner {
            return Err(LifecycleError::Storage(format!(
                "owner of row {} is immutable",
                resource.id
            )));
        }

        *row = resource.clone();
        Ok(())
    }

    async fn delete(&self, id: ResourceId) -> Result<Option<Resource>> {
        let mut tables = self.tables.write().await;
        let removed = tables.rows.remove(&id);
        if let Some(row) = &removed {
            tables.by_external.remove(&row.external_id);
        }
        Ok(removed)
    }

    async fn scan(&self) -> Result<Vec<Resource>> {
        let tables = self.tables.read().await;
        Ok(tables.rows.values().cloned().collect())
    }
}
