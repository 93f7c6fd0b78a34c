use super::types::{ResourceId, ResourceKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    #[error("Referenced {kind} '{id}' not found")]
    ReferenceNotFound { kind: String, id: String },

    #[error("Unable to resolve account '{account}' in domain {domain}")]
    UnresolvableAccount { account: String, domain: String },

    #[error("Binding conflict: {0}")]
    BindingConflict(String),

    #[error("Resource in use: {0}")]
    ResourceInUse(String),

    #[error("Activation of resource {id} failed: {reason}")]
    ActivationFailure { id: ResourceId, reason: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

impl LifecycleError {
    pub fn not_found(kind: impl ToString, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub fn reference_not_found(kind: ResourceKind, id: impl ToString) -> Self {
        Self::ReferenceNotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// True for failures that happen after a skeleton was committed and
    /// therefore require the compensating delete.
    pub fn triggers_rollback(&self) -> bool {
        matches!(self, Self::ActivationFailure { .. } | Self::Unexpected(_))
    }

    /// Stable code for API layers that map errors onto response codes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::ReferenceNotFound { .. } => "reference_not_found",
            Self::UnresolvableAccount { .. } => "unresolvable_account",
            Self::BindingConflict(_) => "binding_conflict",
            Self::ResourceInUse(_) => "resource_in_use",
            Self::ActivationFailure { .. } => "activation_failure",
            Self::Unexpected(_) => "internal_error",
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::LockError(_) => "lock",
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for LifecycleError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
