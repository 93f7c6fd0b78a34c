use super::fleet::{self, ScriptedProvisioner};
use anyhow::{Result, anyhow};
use resource_lifecycle::{
    CallContext, CertificateSpec, ConditionSpec, CoordinatorConfig, CreateRequest, DomainId,
    EntityStore, EventRecord, ExternalId, InMemoryBackend, ResourceId,
    ResourceLifecycleCoordinator, VmGroupSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// One scripted operation. Entities are referenced by external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateGroup {
        lb_rule: String,
        min_members: i64,
        max_members: i64,
        #[serde(default)]
        interval_secs: Option<i64>,
        scale_up: Vec<String>,
        scale_down: Vec<String>,
        profile: String,
        #[serde(default)]
        display: Option<bool>,
        #[serde(default)]
        external_id: Option<String>,
    },
    CreateCondition {
        counter: String,
        operator: String,
        threshold: i64,
        #[serde(default)]
        account: Option<String>,
        #[serde(default)]
        domain_id: Option<u64>,
        #[serde(default)]
        external_id: Option<String>,
    },
    RegisterCertificate {
        name: String,
        certificate: String,
        #[serde(default)]
        chain: Option<String>,
        #[serde(default)]
        external_id: Option<String>,
    },
    Enable {
        id: String,
    },
    Disable {
        id: String,
    },
    Delete {
        id: String,
    },
    AssignCertificate {
        certificate: String,
        lb_rule: String,
    },
    RemoveCertificate {
        lb_rule: String,
    },
}

#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub op: String,
    pub ok: bool,
    pub result: Value,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub steps: Vec<StepOutcome>,
    pub events: Vec<EventRecord>,
}

/// The end-to-end scenario: create, disable, then delete a group.
pub fn demo_steps() -> Vec<Step> {
    vec![
        Step::CreateGroup {
            lb_rule: "lb-web".into(),
            min_members: 1,
            max_members: 3,
            interval_secs: None,
            scale_up: vec!["policy-up".into()],
            scale_down: vec!["policy-down".into()],
            profile: "profile-web".into(),
            display: None,
            external_id: Some("group-web".into()),
        },
        Step::Disable {
            id: "group-web".into(),
        },
        Step::Delete {
            id: "group-web".into(),
        },
    ]
}

pub async fn run(
    config: CoordinatorConfig,
    steps: Vec<Step>,
    decline: Vec<String>,
) -> Result<Report> {
    let backend = InMemoryBackend::for_config(&config);
    let ops = fleet::seed(&backend).await?;
    let coordinator = backend.coordinator(config, Arc::new(ScriptedProvisioner::new(decline)))?;
    let ctx = CallContext::caller(ops);

    let mut outcomes = Vec::with_capacity(steps.len());
    for (index, step) in steps.into_iter().enumerate() {
        let op = op_name(&step);
        let result = execute(&coordinator, &backend, &ctx, step).await;
        outcomes.push(match result {
            Ok(value) => StepOutcome {
                step: index,
                op,
                ok: true,
                result: value,
            },
            Err(err) => StepOutcome {
                step: index,
                op,
                ok: false,
                result: json!({ "error": err.to_string() }),
            },
        });
    }

    Ok(Report {
        steps: outcomes,
        events: backend.events.events().await,
    })
}

async fn execute(
    coordinator: &ResourceLifecycleCoordinator,
    backend: &InMemoryBackend,
    ctx: &CallContext,
    step: Step,
) -> Result<Value> {
    let value = match step {
        Step::CreateGroup {
            lb_rule,
            min_members,
            max_members,
            interval_secs,
            scale_up,
            scale_down,
            profile,
            display,
            external_id,
        } => {
            let spec = VmGroupSpec {
                lb_rule_id: lookup(backend, &lb_rule).await?,
                min_members,
                max_members,
                interval_secs,
                scale_up_policy_ids: lookup_all(backend, &scale_up).await?,
                scale_down_policy_ids: lookup_all(backend, &scale_down).await?,
                profile_id: lookup(backend, &profile).await?,
            };
            let request = with_options(CreateRequest::new(spec), display, external_id);
            serde_json::to_value(coordinator.create(request, ctx).await?)?
        }
        Step::CreateCondition {
            counter,
            operator,
            threshold,
            account,
            domain_id,
            external_id,
        } => {
            let spec = ConditionSpec {
                counter_id: lookup(backend, &counter).await?,
                relational_operator: operator,
                threshold,
                account_name: account,
                domain_id: domain_id.map(DomainId),
            };
            let request = with_options(CreateRequest::new(spec), None, external_id);
            serde_json::to_value(coordinator.create(request, ctx).await?)?
        }
        Step::RegisterCertificate {
            name,
            certificate,
            chain,
            external_id,
        } => {
            let spec = CertificateSpec {
                name,
                certificate,
                chain,
                account_name: None,
                domain_id: None,
            };
            let request = with_options(CreateRequest::new(spec), None, external_id);
            serde_json::to_value(coordinator.create(request, ctx).await?)?
        }
        Step::Enable { id } => {
            serde_json::to_value(coordinator.enable(lookup(backend, &id).await?).await?)?
        }
        Step::Disable { id } => {
            serde_json::to_value(coordinator.disable(lookup(backend, &id).await?).await?)?
        }
        Step::Delete { id } => {
            serde_json::to_value(coordinator.delete(lookup(backend, &id).await?).await?)?
        }
        Step::AssignCertificate {
            certificate,
            lb_rule,
        } => {
            let certificate = lookup(backend, &certificate).await?;
            let lb_rule = lookup(backend, &lb_rule).await?;
            serde_json::to_value(coordinator.assign_certificate(certificate, lb_rule).await?)?
        }
        Step::RemoveCertificate { lb_rule } => {
            let lb_rule = lookup(backend, &lb_rule).await?;
            serde_json::to_value(coordinator.remove_certificate(lb_rule).await?)?
        }
    };
    Ok(value)
}

fn with_options(
    mut request: CreateRequest,
    display: Option<bool>,
    external_id: Option<String>,
) -> CreateRequest {
    request.display = display;
    request.external_id = external_id.map(ExternalId::from);
    request
}

async fn lookup(backend: &InMemoryBackend, external_id: &str) -> Result<ResourceId> {
    backend
        .store
        .find_by_external_id(&ExternalId::from(external_id))
        .await?
        .map(|row| row.id)
        .ok_or_else(|| anyhow!("unknown external id '{external_id}'"))
}

async fn lookup_all(
    backend: &InMemoryBackend,
    external_ids: &[String],
) -> Result<Vec<ResourceId>> {
    let mut ids = Vec::with_capacity(external_ids.len());
    for external_id in external_ids {
        ids.push(lookup(backend, external_id).await?);
    }
    Ok(ids)
}

fn op_name(step: &Step) -> String {
    serde_json::to_value(step)
        .ok()
        .and_then(|value| value.get("op").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
