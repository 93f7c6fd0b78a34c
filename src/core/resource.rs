use super::types::{AccountId, ExternalId, LifecycleState, ResourceId, ResourceKind};
use super::{LifecycleError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored entity: lifecycle envelope plus a kind-specific body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub external_id: ExternalId,
    pub owner: AccountId,
    pub display: bool,
    pub state: LifecycleState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: ResourceBody,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        self.body.kind()
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: LifecycleState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(LifecycleError::Validation(format!(
                "{} {} cannot move from {} to {}",
                self.kind(),
                self.external_id,
                self.state,
                next
            )));
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn as_vm_group(&self) -> Option<&AutoScaleVmGroup> {
        match &self.body {
            ResourceBody::AutoScaleVmGroup(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_load_balancer_rule(&self) -> Option<&LoadBalancerRule> {
        match &self.body {
            ResourceBody::LoadBalancerRule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn as_policy(&self) -> Option<&AutoScalePolicy> {
        match &self.body {
            ResourceBody::AutoScalePolicy(policy) => Some(policy),
            _ => None,
        }
    }
}

/// Everything a store needs to persist a new row; id and timestamps are
/// assigned on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResource {
    pub external_id: Option<ExternalId>,
    pub owner: AccountId,
    pub display: bool,
    pub state: LifecycleState,
    pub body: ResourceBody,
}

impl NewResource {
    /// A visible, already active row. Used for collaborator entities.
    pub fn new(owner: AccountId, body: ResourceBody) -> Self {
        Self {
            external_id: None,
            owner,
            display: true,
            state: LifecycleState::Active,
            body,
        }
    }

    pub fn pending(mut self) -> Self {
        self.state = LifecycleState::Pending;
        self
    }

    pub fn external_id(mut self, external_id: impl Into<ExternalId>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceBody {
    AutoScaleVmGroup(AutoScaleVmGroup),
    Condition(Condition),
    SslCertificate(SslCertificate),
    LoadBalancerRule(LoadBalancerRule),
    AutoScalePolicy(AutoScalePolicy),
    AutoScaleVmProfile(AutoScaleVmProfile),
    Counter(Counter),
}

impl ResourceBody {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::AutoScaleVmGroup(_) => ResourceKind::AutoScaleVmGroup,
            Self::Condition(_) => ResourceKind::Condition,
            Self::SslCertificate(_) => ResourceKind::SslCertificate,
            Self::LoadBalancerRule(_) => ResourceKind::LoadBalancerRule,
            Self::AutoScalePolicy(_) => ResourceKind::AutoScalePolicy,
            Self::AutoScaleVmProfile(_) => ResourceKind::AutoScaleVmProfile,
            Self::Counter(_) => ResourceKind::Counter,
        }
    }
}

/// Composite resource: scales the members behind one load-balancer rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScaleVmGroup {
    pub lb_rule_id: ResourceId,
    pub min_members: u32,
    pub max_members: u32,
    pub interval_secs: u32,
    pub scale_up_policy_ids: Vec<ResourceId>,
    pub scale_down_policy_ids: Vec<ResourceId>,
    pub profile_id: ResourceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationalOperator {
    #[serde(rename = "GT")]
    Gt,
    #[serde(rename = "GE")]
    Ge,
    #[serde(rename = "LT")]
    Lt,
    #[serde(rename = "LE")]
    Le,
    #[serde(rename = "EQ")]
    Eq,
}

impl RelationalOperator {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GT" => Ok(Self::Gt),
            "GE" => Ok(Self::Ge),
            "LT" => Ok(Self::Lt),
            "LE" => Ok(Self::Le),
            "EQ" => Ok(Self::Eq),
            other => Err(LifecycleError::Validation(format!(
                "unsupported relational operator '{other}', expected one of GT, GE, LT, LE, EQ"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub counter_id: ResourceId,
    pub operator: RelationalOperator,
    pub threshold: u64,
}

/// Attachment resource. The binding itself lives on the parent rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslCertificate {
    pub name: String,
    pub certificate: String,
    pub chain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerRule {
    pub name: String,
    pub public_port: u16,
    pub private_port: u16,
    pub certificate_id: Option<ResourceId>,
}

impl LoadBalancerRule {
    pub fn new(name: impl Into<String>, public_port: u16, private_port: u16) -> Self {
        Self {
            name: name.into(),
            public_port,
            private_port,
            certificate_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleAction {
    ScaleUp,
    ScaleDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScalePolicy {
    pub action: ScaleAction,
    pub duration_secs: u32,
    pub quiet_time_secs: u32,
    pub condition_ids: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScaleVmProfile {
    pub zone: String,
    pub service_offering: String,
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub name: String,
    pub source: String,
}
