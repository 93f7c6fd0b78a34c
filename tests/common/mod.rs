//! Shared fixtures for the lifecycle integration tests
//!
//! Builds an in-memory fleet owned by an `ops` account: two load-balancer
//! rules, one scale-up and one scale-down policy, a VM profile and a CPU
//! counter. Also carries fake provisioners and recorders, a store that
//! fails on demand, and a capture of error-level log lines.
#![allow(dead_code)]

use async_trait::async_trait;
use resource_lifecycle::core::{
    AutoScalePolicy, AutoScaleVmProfile, Counter, LoadBalancerRule, ScaleAction,
};
use resource_lifecycle::{
    AccountId, CertificateSpec, Collaborators, ConditionSpec, CoordinatorConfig, DomainId,
    EntityStore, EventRecord, EventRecorder, ExternalId, InMemoryBackend, InMemoryEntityStore,
    LifecycleError, LifecycleState, NewResource, NoopProvisioner, Provisioner, Resource,
    ResourceBody, ResourceId, ResourceLifecycleCoordinator, VmGroupSpec,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

pub const OPS_DOMAIN: DomainId = DomainId(2);

pub struct Fleet {
    pub backend: InMemoryBackend,
    pub coordinator: Arc<ResourceLifecycleCoordinator>,
    pub ops: AccountId,
    pub rule: ResourceId,
    pub spare_rule: ResourceId,
    pub scale_up: ResourceId,
    pub scale_down: ResourceId,
    pub profile: ResourceId,
    pub counter: ResourceId,
}

impl Fleet {
    pub fn group_spec(&self, min_members: i64, max_members: i64) -> VmGroupSpec {
        VmGroupSpec {
            lb_rule_id: self.rule,
            min_members,
            max_members,
            interval_secs: None,
            scale_up_policy_ids: vec![self.scale_up],
            scale_down_policy_ids: vec![self.scale_down],
            profile_id: self.profile,
        }
    }

    pub fn condition_spec(&self, operator: &str, threshold: i64) -> ConditionSpec {
        ConditionSpec {
            counter_id: self.counter,
            relational_operator: operator.to_string(),
            threshold,
            account_name: None,
            domain_id: None,
        }
    }

    pub async fn seed(&self, owner: AccountId, body: ResourceBody) -> ResourceId {
        self.backend
            .store
            .create(NewResource::new(owner, body))
            .await
            .unwrap()
            .id
    }

    pub async fn stored(&self, id: ResourceId) -> Option<Resource> {
        self.backend.store.find_by_id(id).await.unwrap()
    }
}

pub fn certificate_spec(name: &str) -> CertificateSpec {
    CertificateSpec {
        name: name.to_string(),
        certificate: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----".to_string(),
        chain: None,
        account_name: None,
        domain_id: None,
    }
}

pub async fn fleet() -> Fleet {
    fleet_with(Arc::new(NoopProvisioner)).await
}

pub async fn fleet_with(provisioner: Arc<dyn Provisioner>) -> Fleet {
    fleet_with_parts(CoordinatorConfig::new(), provisioner, None).await
}

pub async fn fleet_with_parts(
    config: CoordinatorConfig,
    provisioner: Arc<dyn Provisioner>,
    events: Option<Arc<dyn EventRecorder>>,
) -> Fleet {
    let backend = InMemoryBackend::for_config(&config);
    assemble(backend, config, provisioner, events, None).await
}

/// Fleet whose coordinator reads and writes through a [`FaultyStore`]
///
/// Seeding and `Fleet::stored` bypass the faults.
pub async fn faulty_fleet(provisioner: Arc<dyn Provisioner>) -> (Fleet, Arc<FaultyStore>) {
    let config = CoordinatorConfig::new();
    let backend = InMemoryBackend::for_config(&config);
    let store = Arc::new(FaultyStore::new(backend.store.clone()));
    let fleet = assemble(backend, config, provisioner, None, Some(store.clone())).await;
    (fleet, store)
}

async fn assemble(
    backend: InMemoryBackend,
    config: CoordinatorConfig,
    provisioner: Arc<dyn Provisioner>,
    events: Option<Arc<dyn EventRecorder>>,
    store: Option<Arc<dyn EntityStore>>,
) -> Fleet {
    let mut collaborators: Collaborators = backend.collaborators(provisioner);
    if let Some(events) = events {
        collaborators.events = events;
    }
    if let Some(store) = store {
        collaborators.store = store;
    }
    let coordinator = Arc::new(ResourceLifecycleCoordinator::new(config, collaborators).unwrap());

    let ops = backend
        .accounts
        .create_account("ops", OPS_DOMAIN)
        .await
        .unwrap()
        .id();

    let mut fleet = Fleet {
        backend,
        coordinator,
        ops,
        rule: ResourceId(0),
        spare_rule: ResourceId(0),
        scale_up: ResourceId(0),
        scale_down: ResourceId(0),
        profile: ResourceId(0),
        counter: ResourceId(0),
    };

    fleet.rule = fleet
        .seed(
            ops,
            ResourceBody::LoadBalancerRule(LoadBalancerRule::new("web", 443, 8443)),
        )
        .await;
    fleet.spare_rule = fleet
        .seed(
            ops,
            ResourceBody::LoadBalancerRule(LoadBalancerRule::new("api", 443, 9443)),
        )
        .await;
    fleet.scale_up = fleet.seed(ops, policy(ScaleAction::ScaleUp, Vec::new())).await;
    fleet.scale_down = fleet.seed(ops, policy(ScaleAction::ScaleDown, Vec::new())).await;
    fleet.profile = fleet
        .seed(
            ops,
            ResourceBody::AutoScaleVmProfile(AutoScaleVmProfile {
                zone: "zone-1".into(),
                service_offering: "medium".into(),
                template: "ubuntu".into(),
            }),
        )
        .await;
    fleet.counter = fleet
        .seed(
            ops,
            ResourceBody::Counter(Counter {
                name: "cpu".into(),
                source: "cpu.utilization".into(),
            }),
        )
        .await;

    fleet
}

pub fn policy(action: ScaleAction, condition_ids: Vec<ResourceId>) -> ResourceBody {
    ResourceBody::AutoScalePolicy(AutoScalePolicy {
        action,
        duration_secs: 300,
        quiet_time_secs: 600,
        condition_ids,
    })
}

// ============================================================================
// Provisioners
// ============================================================================

/// Refuses every configuration
pub struct Declining;

#[async_trait]
impl Provisioner for Declining {
    async fn configure(&self, _resource: &Resource) -> resource_lifecycle::Result<bool> {
        Ok(false)
    }
}

/// Fails with an infrastructure error
pub struct Failing;

#[async_trait]
impl Provisioner for Failing {
    async fn configure(&self, _resource: &Resource) -> resource_lifecycle::Result<bool> {
        Err(LifecycleError::Storage("hypervisor unreachable".into()))
    }

    async fn bind_certificate(
        &self,
        _certificate: &Resource,
        _rule: &Resource,
    ) -> resource_lifecycle::Result<()> {
        Err(LifecycleError::Storage("load balancer unreachable".into()))
    }
}

/// Takes its time before accepting
pub struct Slow(pub Duration);

#[async_trait]
impl Provisioner for Slow {
    async fn configure(&self, _resource: &Resource) -> resource_lifecycle::Result<bool> {
        tokio::time::sleep(self.0).await;
        Ok(true)
    }

    async fn bind_certificate(
        &self,
        _certificate: &Resource,
        _rule: &Resource,
    ) -> resource_lifecycle::Result<()> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// Panics inside the provisioning call
pub struct Panicking;

#[async_trait]
impl Provisioner for Panicking {
    async fn configure(&self, _resource: &Resource) -> resource_lifecycle::Result<bool> {
        panic!("provisioning backend crashed");
    }
}

/// Accepts and counts calls
#[derive(Default)]
pub struct Counting {
    pub configured: AtomicUsize,
    pub bound: AtomicUsize,
}

impl Counting {
    pub fn configured(&self) -> usize {
        self.configured.load(Ordering::SeqCst)
    }

    pub fn bound(&self) -> usize {
        self.bound.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for Counting {
    async fn configure(&self, _resource: &Resource) -> resource_lifecycle::Result<bool> {
        self.configured.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn bind_certificate(
        &self,
        _certificate: &Resource,
        _rule: &Resource,
    ) -> resource_lifecycle::Result<()> {
        self.bound.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Recorders
// ============================================================================

/// Rejects every event
pub struct BrokenRecorder;

#[async_trait]
impl EventRecorder for BrokenRecorder {
    async fn record(&self, _event: EventRecord) -> resource_lifecycle::Result<()> {
        Err(LifecycleError::Storage("event log offline".into()))
    }
}

/// Never answers
pub struct StuckRecorder;

#[async_trait]
impl EventRecorder for StuckRecorder {
    async fn record(&self, _event: EventRecord) -> resource_lifecycle::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ============================================================================
// Stores
// ============================================================================

/// In-memory store with switchable failures
pub struct FaultyStore {
    inner: Arc<InMemoryEntityStore>,
    pub fail_pending_reads: AtomicBool,
    pub fail_activation_updates: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryEntityStore>) -> Self {
        Self {
            inner,
            fail_pending_reads: AtomicBool::new(false),
            fail_activation_updates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    fn tripped(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for FaultyStore {
    async fn create(&self, draft: NewResource) -> resource_lifecycle::Result<Resource> {
        self.inner.create(draft).await
    }

    async fn find_by_id(&self, id: ResourceId) -> resource_lifecycle::Result<Option<Resource>> {
        let row = self.inner.find_by_id(id).await?;
        let pending = row.as_ref().map(|r| r.state) == Some(LifecycleState::Pending);
        if pending && Self::tripped(&self.fail_pending_reads) {
            return Err(LifecycleError::Storage(format!("read of resource {id} timed out")));
        }
        Ok(row)
    }

    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> resource_lifecycle::Result<Option<Resource>> {
        self.inner.find_by_external_id(external_id).await
    }

    async fn update(&self, resource: &Resource) -> resource_lifecycle::Result<()> {
        if resource.state == LifecycleState::Active && Self::tripped(&self.fail_activation_updates)
        {
            return Err(LifecycleError::Storage(format!(
                "write of resource {} rejected",
                resource.id
            )));
        }
        self.inner.update(resource).await
    }

    async fn delete(&self, id: ResourceId) -> resource_lifecycle::Result<Option<Resource>> {
        if Self::tripped(&self.fail_deletes) {
            return Err(LifecycleError::Storage(format!("delete of resource {id} rejected")));
        }
        self.inner.delete(id).await
    }

    async fn scan(&self) -> resource_lifecycle::Result<Vec<Resource>> {
        self.inner.scan().await
    }
}

// ============================================================================
// Log capture
// ============================================================================

/// Collects the messages of ERROR-level events
#[derive(Clone, Default)]
pub struct ErrorLogs(Arc<Mutex<Vec<String>>>);

impl ErrorLogs {
    /// Route this thread's events here until the guard drops
    pub fn capture(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.lock().unwrap().iter().any(|line| line.contains(needle))
    }
}

impl<S: Subscriber> Layer<S> for ErrorLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }
        let mut message = Message::default();
        event.record(&mut message);
        self.0.lock().unwrap().push(message.0);
    }
}

#[derive(Default)]
struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}
