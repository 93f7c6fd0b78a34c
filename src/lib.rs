// ============================================================================
// Resource Lifecycle Library
// ============================================================================

pub mod config;
pub mod coordinator;
pub mod core;
pub mod events;
pub mod ownership;
pub mod provisioning;
pub mod storage;

// Re-export main types for convenience
pub use config::CoordinatorConfig;
pub use coordinator::{
    CertificateBinding, CertificateSpec, Collaborators, ConditionSpec, CreateRequest, CreateSpec,
    ResourceLifecycleCoordinator, VmGroupSpec,
};
pub use crate::core::{
    AccountId, DomainId, ExternalId, LifecycleError, LifecycleState, NewResource, Resource,
    ResourceBody, ResourceId, ResourceKind, Result,
};
pub use events::{EventOutcome, EventRecord, EventRecorder, EventType, InMemoryEventRecorder};
pub use ownership::{
    AccountDirectory, CallContext, InMemoryAccountDirectory, OwnershipReference, OwnershipResolver,
};
pub use provisioning::{NoopProvisioner, Provisioner};
pub use storage::{EntityStore, InMemoryEntityStore};

use std::sync::Arc;

// ============================================================================
// In-memory wiring
// ============================================================================

/// In-memory collaborators with typed handles kept for inspection
///
/// # Examples
///
/// ```
/// use resource_lifecycle::{CoordinatorConfig, InMemoryBackend, NoopProvisioner};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = InMemoryBackend::new();
/// let coordinator = backend.coordinator(CoordinatorConfig::new(), Arc::new(NoopProvisioner))?;
/// assert_eq!(coordinator.config().system_account_id, resource_lifecycle::AccountId::SYSTEM);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    pub store: Arc<InMemoryEntityStore>,
    pub accounts: Arc<InMemoryAccountDirectory>,
    pub events: Arc<InMemoryEventRecorder>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend whose account directory registers `system` under the
    /// configured system account id
    pub fn for_config(config: &CoordinatorConfig) -> Self {
        Self {
            accounts: Arc::new(InMemoryAccountDirectory::with_system_account(
                config.system_account_id,
            )),
            ..Self::default()
        }
    }

    pub fn collaborators(&self, provisioner: Arc<dyn Provisioner>) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            accounts: self.accounts.clone(),
            events: self.events.clone(),
            provisioner,
        }
    }

    /// Build a coordinator over these collaborators
    pub fn coordinator(
        &self,
        config: CoordinatorConfig,
        provisioner: Arc<dyn Provisioner>,
    ) -> Result<ResourceLifecycleCoordinator> {
        let registered = self.accounts.system_account();
        if registered != config.system_account_id {
            return Err(LifecycleError::Config(format!(
                "system account id {} does not match the directory's system account {registered}",
                config.system_account_id
            )));
        }
        ResourceLifecycleCoordinator::new(config, self.collaborators(provisioner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_follows_configured_system_account() {
        let config = CoordinatorConfig::new().system_account_id(AccountId(500));
        let backend = InMemoryBackend::for_config(&config);
        let coordinator = backend
            .coordinator(config, Arc::new(NoopProvisioner))
            .unwrap();

        let system = backend
            .accounts
            .find_by_name("system", DomainId::ROOT)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(system.id(), AccountId(500));
        assert_eq!(coordinator.config().system_account_id, AccountId(500));
    }

    #[test]
    fn test_mismatched_system_account_is_rejected() {
        let backend = InMemoryBackend::new();
        let config = CoordinatorConfig::new().system_account_id(AccountId(500));
        let err = backend
            .coordinator(config, Arc::new(NoopProvisioner))
            .err()
            .unwrap();
        assert!(matches!(err, LifecycleError::Config(_)));
    }
}
