use anyhow::{Context, Result};
use async_trait::async_trait;
use resource_lifecycle::core::{
    AutoScalePolicy, AutoScaleVmProfile, Counter, LoadBalancerRule, ScaleAction,
};
use resource_lifecycle::{
    AccountId, DomainId, EntityStore, InMemoryBackend, NewResource, Provisioner, Resource,
    ResourceBody,
};
use std::collections::HashSet;

pub const OPS_ACCOUNT: &str = "ops";
pub const OPS_DOMAIN: DomainId = DomainId(2);

/// Seed the collaborator entities scripts refer to by external id:
/// `lb-web`, `lb-api`, `policy-up`, `policy-down`, `profile-web`,
/// `counter-cpu`.
pub async fn seed(backend: &InMemoryBackend) -> Result<AccountId> {
    let ops = backend
        .accounts
        .create_account(OPS_ACCOUNT, OPS_DOMAIN)
        .await
        .context("failed to create ops account")?
        .id();

    let rows = [
        (
            "lb-web",
            ResourceBody::LoadBalancerRule(LoadBalancerRule::new("web", 443, 8443)),
        ),
        (
            "lb-api",
            ResourceBody::LoadBalancerRule(LoadBalancerRule::new("api", 443, 9443)),
        ),
        (
            "counter-cpu",
            ResourceBody::Counter(Counter {
                name: "cpu".into(),
                source: "cpu.utilization".into(),
            }),
        ),
        (
            "profile-web",
            ResourceBody::AutoScaleVmProfile(AutoScaleVmProfile {
                zone: "zone-1".into(),
                service_offering: "medium".into(),
                template: "ubuntu-24.04".into(),
            }),
        ),
    ];
    for (external_id, body) in rows {
        backend
            .store
            .create(NewResource::new(ops, body).external_id(external_id))
            .await
            .with_context(|| format!("failed to seed '{external_id}'"))?;
    }

    for (external_id, action) in [
        ("policy-up", ScaleAction::ScaleUp),
        ("policy-down", ScaleAction::ScaleDown),
    ] {
        let policy = AutoScalePolicy {
            action,
            duration_secs: 300,
            quiet_time_secs: 600,
            condition_ids: Vec::new(),
        };
        backend
            .store
            .create(
                NewResource::new(ops, ResourceBody::AutoScalePolicy(policy))
                    .external_id(external_id),
            )
            .await
            .with_context(|| format!("failed to seed '{external_id}'"))?;
    }

    Ok(ops)
}

/// Accepts every configuration except those of the listed external ids
pub struct ScriptedProvisioner {
    declined: HashSet<String>,
}

impl ScriptedProvisioner {
    pub fn new(declined: impl IntoIterator<Item = String>) -> Self {
        Self {
            declined: declined.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Provisioner for ScriptedProvisioner {
    async fn configure(&self, resource: &Resource) -> resource_lifecycle::Result<bool> {
        Ok(!self.declined.contains(resource.external_id.as_str()))
    }
}
