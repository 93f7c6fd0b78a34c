// ============================================================================
// Resource Lifecycle Coordinator
// ============================================================================
//
// Drives three state machines over the entity store:
//
// - two-phase create: persist a Pending skeleton, then activate it. A failed
//   or timed-out activation deletes the skeleton before the error surfaces,
//   so callers only ever observe Active resources or nothing.
// - bind-or-reject: attach a certificate to exactly one load-balancer rule.
// - enable/disable toggle on activated groups.
//
// Every transition on a given id runs under that id's lock.
//
// ============================================================================

mod binding;
mod create;
mod delete;
pub mod locks;
pub mod request;
mod toggle;

pub use binding::CertificateBinding;
pub use locks::{KeyedGuard, KeyedLocks};
pub use request::{CertificateSpec, ConditionSpec, CreateRequest, CreateSpec, VmGroupSpec};

use crate::config::CoordinatorConfig;
use crate::core::{
    AccountId, ExternalId, LifecycleError, Resource, ResourceId, ResourceKind, Result,
};
use crate::events::{EventRecord, EventRecorder};
use crate::ownership::{AccountDirectory, OwnershipResolver};
use crate::provisioning::Provisioner;
use crate::storage::EntityStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// External collaborators, passed in explicitly
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn EntityStore>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub events: Arc<dyn EventRecorder>,
    pub provisioner: Arc<dyn Provisioner>,
}

pub struct ResourceLifecycleCoordinator {
    config: CoordinatorConfig,
    store: Arc<dyn EntityStore>,
    events: Arc<dyn EventRecorder>,
    provisioner: Arc<dyn Provisioner>,
    owners: OwnershipResolver,
    locks: KeyedLocks,
}

impl ResourceLifecycleCoordinator {
    pub fn new(config: CoordinatorConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let owners = OwnershipResolver::new(
            collaborators.accounts,
            Arc::clone(&collaborators.store),
            config.system_account_id,
        );

        Ok(Self {
            config,
            store: collaborators.store,
            events: collaborators.events,
            provisioner: collaborators.provisioner,
            owners,
            locks: KeyedLocks::new(),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Fetch a visible resource by internal id
    pub async fn get(&self, id: ResourceId) -> Result<Resource> {
        self.load_visible(id, None).await
    }

    /// Fetch a visible resource by external id; Pending rows stay hidden
    pub async fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Resource>> {
        Ok(self
            .store
            .find_by_external_id(external_id)
            .await?
            .filter(|row| row.state.is_visible()))
    }

    /// Managed resources owned by `owner`. Rows with the display flag off
    /// are skipped unless `include_hidden` is set.
    pub async fn list_owned_by(
        &self,
        owner: AccountId,
        include_hidden: bool,
    ) -> Result<Vec<Resource>> {
        Ok(self
            .store
            .scan()
            .await?
            .into_iter()
            .filter(|row| row.owner == owner)
            .filter(|row| row.kind().is_managed() && row.state.is_visible())
            .filter(|row| include_hidden || row.display)
            .collect())
    }

    /// Load a row that callers may see, optionally of a required kind.
    async fn load_visible(&self, id: ResourceId, kind: Option<ResourceKind>) -> Result<Resource> {
        let label = kind.map(|k| k.to_string()).unwrap_or_else(|| "Resource".to_string());
        let row = self
            .store
            .find_by_id(id)
            .await?
            .filter(|row| row.state.is_visible())
            .ok_or_else(|| LifecycleError::not_found(&label, id))?;

        match kind {
            Some(kind) if row.kind() != kind => Err(LifecycleError::not_found(label, id)),
            _ => Ok(row),
        }
    }

    /// Load a collaborator entity referenced by a composite resource.
    async fn load_reference(&self, id: ResourceId, kind: ResourceKind) -> Result<Resource> {
        self.store
            .find_by_id(id)
            .await?
            .filter(|row| row.kind() == kind && row.state.is_visible())
            .ok_or_else(|| LifecycleError::reference_not_found(kind, id))
    }

    /// Append an audit event. Recorder failures are logged, never returned.
    async fn emit(&self, event: EventRecord) {
        let event_type = event.event_type;
        let resource_id = event.resource_id;

        match tokio::time::timeout(self.config.event_timeout, self.events.record(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                event_type = %event_type,
                resource_id = ?resource_id,
                error = %err,
                "failed to record event"
            ),
            Err(_) => warn!(
                event_type = %event_type,
                resource_id = ?resource_id,
                timeout = ?self.config.event_timeout,
                "event recorder timed out"
            ),
        }
    }

    /// Run a provisioning call on its own task with a deadline. A panic in
    /// the collaborator becomes `Unexpected`, a missed deadline an
    /// `ActivationFailure`; the task is aborted in that case.
    async fn bounded<T, F>(&self, id: ResourceId, what: &str, limit: Duration, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut handle = tokio::spawn(call);

        match tokio::time::timeout(limit, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                error!(
                    resource_id = %id,
                    call = what,
                    error = %join_err,
                    "provisioning call aborted"
                );
                Err(LifecycleError::Unexpected(format!(
                    "{what} for resource {id} aborted: {join_err}"
                )))
            }
            Err(_) => {
                handle.abort();
                error!(
                    resource_id = %id,
                    call = what,
                    timeout = ?limit,
                    "provisioning call timed out"
                );
                Err(LifecycleError::ActivationFailure {
                    id,
                    reason: format!("{what} timed out after {limit:?}"),
                })
            }
        }
    }
}
