use crate::config::CoordinatorConfig;
use crate::core::{
    AccountId, AutoScaleVmGroup, Condition, DomainId, ExternalId, LifecycleError,
    RelationalOperator, ResourceBody, ResourceId, ResourceKind, Result, SslCertificate,
};
use crate::ownership::OwnershipReference;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A creation request as handed over by the API layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub spec: CreateSpec,
    /// Explicit owner, overrides anything the request body implies
    #[serde(default)]
    pub account_id: Option<AccountId>,
    /// Whether end users see the resource; defaults to true
    #[serde(default)]
    pub display: Option<bool>,
    /// Caller-chosen external id; generated when absent
    #[serde(default)]
    pub external_id: Option<ExternalId>,
}

impl CreateRequest {
    pub fn new(spec: impl Into<CreateSpec>) -> Self {
        Self {
            spec: spec.into(),
            account_id: None,
            display: None,
            external_id: None,
        }
    }

    pub fn account_id(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn display(mut self, display: bool) -> Self {
        self.display = Some(display);
        self
    }

    pub fn external_id(mut self, external_id: impl Into<ExternalId>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub(crate) fn ownership(&self) -> OwnershipReference {
        let mut reference = self.spec.ownership();
        if self.account_id.is_some() {
            reference.account_id = self.account_id;
        }
        reference
    }
}

/// One variant per resource kind with a create-then-activate lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateSpec {
    AutoScaleVmGroup(VmGroupSpec),
    Condition(ConditionSpec),
    SslCertificate(CertificateSpec),
}

impl CreateSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::AutoScaleVmGroup(_) => ResourceKind::AutoScaleVmGroup,
            Self::Condition(_) => ResourceKind::Condition,
            Self::SslCertificate(_) => ResourceKind::SslCertificate,
        }
    }

    fn ownership(&self) -> OwnershipReference {
        match self {
            // a group belongs to whoever owns its load-balancer rule
            Self::AutoScaleVmGroup(spec) => OwnershipReference::related(spec.lb_rule_id),
            Self::Condition(spec) => OwnershipReference {
                account_name: spec.account_name.clone(),
                domain_id: spec.domain_id,
                ..OwnershipReference::default()
            },
            Self::SslCertificate(spec) => OwnershipReference {
                account_name: spec.account_name.clone(),
                domain_id: spec.domain_id,
                ..OwnershipReference::default()
            },
        }
    }

    /// Structural validation. Produces the skeleton body or a
    /// `Validation` error without touching any collaborator.
    pub fn build_body(&self, config: &CoordinatorConfig) -> Result<ResourceBody> {
        match self {
            Self::AutoScaleVmGroup(spec) => spec.build(config).map(ResourceBody::AutoScaleVmGroup),
            Self::Condition(spec) => spec.build().map(ResourceBody::Condition),
            Self::SslCertificate(spec) => spec.build().map(ResourceBody::SslCertificate),
        }
    }
}

impl From<VmGroupSpec> for CreateSpec {
    fn from(spec: VmGroupSpec) -> Self {
        Self::AutoScaleVmGroup(spec)
    }
}

impl From<ConditionSpec> for CreateSpec {
    fn from(spec: ConditionSpec) -> Self {
        Self::Condition(spec)
    }
}

impl From<CertificateSpec> for CreateSpec {
    fn from(spec: CertificateSpec) -> Self {
        Self::SslCertificate(spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmGroupSpec {
    pub lb_rule_id: ResourceId,
    pub min_members: i64,
    pub max_members: i64,
    #[serde(default)]
    pub interval_secs: Option<i64>,
    pub scale_up_policy_ids: Vec<ResourceId>,
    pub scale_down_policy_ids: Vec<ResourceId>,
    pub profile_id: ResourceId,
}

impl VmGroupSpec {
    fn build(&self, config: &CoordinatorConfig) -> Result<AutoScaleVmGroup> {
        if self.min_members < 0 {
            return Err(invalid(format!(
                "min members must be >= 0, got {}",
                self.min_members
            )));
        }
        if self.max_members < 1 {
            return Err(invalid(format!(
                "max members must be >= 1, got {}",
                self.max_members
            )));
        }
        if self.min_members > self.max_members {
            return Err(invalid(format!(
                "min members ({}) must be less than or equal to max members ({})",
                self.min_members, self.max_members
            )));
        }
        if self.max_members > i64::from(config.max_members_limit) {
            return Err(invalid(format!(
                "max members ({}) exceeds the group limit of {}",
                self.max_members, config.max_members_limit
            )));
        }

        let interval_secs = match self.interval_secs {
            None => config.default_interval_secs,
            Some(secs) if secs > 0 => u32::try_from(secs)
                .map_err(|_| invalid(format!("interval {secs} is out of range")))?,
            Some(secs) => return Err(invalid(format!("interval must be positive, got {secs}"))),
        };

        check_policy_list("scale-up", &self.scale_up_policy_ids)?;
        check_policy_list("scale-down", &self.scale_down_policy_ids)?;

        Ok(AutoScaleVmGroup {
            lb_rule_id: self.lb_rule_id,
            // both bounds were checked against u32-sized limits above
            min_members: self.min_members as u32,
            max_members: self.max_members as u32,
            interval_secs,
            scale_up_policy_ids: self.scale_up_policy_ids.clone(),
            scale_down_policy_ids: self.scale_down_policy_ids.clone(),
            profile_id: self.profile_id,
        })
    }
}

fn check_policy_list(direction: &str, ids: &[ResourceId]) -> Result<()> {
    if ids.is_empty() {
        return Err(invalid(format!("at least one {direction} policy is required")));
    }
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(invalid(format!("{direction} policy {id} is listed twice")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub counter_id: ResourceId,
    pub relational_operator: String,
    pub threshold: i64,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub domain_id: Option<DomainId>,
}

impl ConditionSpec {
    fn build(&self) -> Result<Condition> {
        let operator = RelationalOperator::parse(&self.relational_operator)?;
        let threshold = u64::try_from(self.threshold)
            .map_err(|_| invalid(format!("threshold must be >= 0, got {}", self.threshold)))?;

        Ok(Condition {
            counter_id: self.counter_id,
            operator,
            threshold,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateSpec {
    pub name: String,
    pub certificate: String,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub domain_id: Option<DomainId>,
}

impl CertificateSpec {
    fn build(&self) -> Result<SslCertificate> {
        if self.name.trim().is_empty() {
            return Err(invalid("certificate name cannot be empty"));
        }
        if self.certificate.trim().is_empty() {
            return Err(invalid("certificate body cannot be empty"));
        }

        Ok(SslCertificate {
            name: self.name.trim().to_string(),
            certificate: self.certificate.clone(),
            chain: self.chain.clone().filter(|chain| !chain.trim().is_empty()),
        })
    }
}

fn invalid(message: impl Into<String>) -> LifecycleError {
    LifecycleError::Validation(message.into())
}
