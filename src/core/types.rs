// ============================================================================
// Identifiers and lifecycle state
// ============================================================================
//
// Every managed entity carries two identities:
// - an internal `ResourceId` assigned by the store (monotonic)
// - an opaque `ExternalId` used by every outward-facing reference
//
// Lifecycle state follows a small state machine:
//
// ```text
//   (absent) ──create──> Pending ──activate──> Active <──toggle──> Disabled
//                           │                    │                    │
//                           └──rollback──> Deleted <──────delete──────┘
// ```
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Store-assigned internal identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier exposed to API callers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ExternalId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ExternalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owning account of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    /// Built-in system account, the owner of last resort
    pub const SYSTEM: AccountId = AccountId(1);
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub u64);

impl DomainId {
    pub const ROOT: DomainId = DomainId(1);
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    Active,
    Disabled,
    Deleted,
}

impl LifecycleState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Deleted)
                | (Active, Disabled)
                | (Disabled, Active)
                | (Active, Deleted)
                | (Disabled, Deleted)
        )
    }

    /// Pending resources are never visible to callers.
    pub fn is_visible(self) -> bool {
        matches!(self, LifecycleState::Active | LifecycleState::Disabled)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::Deleted => "deleted",
        };
        write!(f, "{label}")
    }
}

/// Kind tag for every entity the store holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    AutoScaleVmGroup,
    Condition,
    SslCertificate,
    LoadBalancerRule,
    AutoScalePolicy,
    AutoScaleVmProfile,
    Counter,
}

impl ResourceKind {
    /// Kinds whose lifecycle is driven by the coordinator. The rest are
    /// collaborator entities that are only referenced.
    pub fn is_managed(self) -> bool {
        matches!(
            self,
            Self::AutoScaleVmGroup | Self::Condition | Self::SslCertificate
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
