// ============================================================================
// Audit events
// ============================================================================

pub mod memory;

pub use memory::InMemoryEventRecorder;

use crate::core::{AccountId, ExternalId, ResourceId, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "AUTOSCALEVMGROUP.CREATE")]
    VmGroupCreate,
    #[serde(rename = "AUTOSCALEVMGROUP.ENABLE")]
    VmGroupEnable,
    #[serde(rename = "AUTOSCALEVMGROUP.DISABLE")]
    VmGroupDisable,
    #[serde(rename = "AUTOSCALEVMGROUP.DELETE")]
    VmGroupDelete,
    #[serde(rename = "CONDITION.CREATE")]
    ConditionCreate,
    #[serde(rename = "CONDITION.DELETE")]
    ConditionDelete,
    #[serde(rename = "LB.CERT.UPLOAD")]
    CertUpload,
    #[serde(rename = "LB.CERT.ASSIGN")]
    CertAssign,
    #[serde(rename = "LB.CERT.REMOVE")]
    CertRemove,
    #[serde(rename = "LB.CERT.DELETE")]
    CertDelete,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VmGroupCreate => "AUTOSCALEVMGROUP.CREATE",
            Self::VmGroupEnable => "AUTOSCALEVMGROUP.ENABLE",
            Self::VmGroupDisable => "AUTOSCALEVMGROUP.DISABLE",
            Self::VmGroupDelete => "AUTOSCALEVMGROUP.DELETE",
            Self::ConditionCreate => "CONDITION.CREATE",
            Self::ConditionDelete => "CONDITION.DELETE",
            Self::CertUpload => "LB.CERT.UPLOAD",
            Self::CertAssign => "LB.CERT.ASSIGN",
            Self::CertRemove => "LB.CERT.REMOVE",
            Self::CertDelete => "LB.CERT.DELETE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    Completed,
    Failed,
}

/// One append-only audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub resource_id: Option<ResourceId>,
    pub external_id: Option<ExternalId>,
    pub event_type: EventType,
    pub outcome: EventOutcome,
    pub description: String,
    pub owner: AccountId,
    pub recorded_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn completed(
        event_type: EventType,
        owner: AccountId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: None,
            external_id: None,
            event_type,
            outcome: EventOutcome::Completed,
            description: description.into(),
            owner,
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(event_type: EventType, owner: AccountId, description: impl Into<String>) -> Self {
        Self {
            outcome: EventOutcome::Failed,
            ..Self::completed(event_type, owner, description)
        }
    }

    pub fn resource(mut self, id: ResourceId, external_id: &ExternalId) -> Self {
        self.resource_id = Some(id);
        self.external_id = Some(external_id.clone());
        self
    }

    pub fn resource_id(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }
}

/// Append-only event sink
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, event: EventRecord) -> Result<()>;
}
