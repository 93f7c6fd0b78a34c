// ============================================================================
// Ownership resolution
// ============================================================================
//
// Attributes a request to exactly one account. Strict precedence, first
// applicable rule wins:
//
//   1. explicit account id
//   2. account name + domain id, looked up in the account directory
//   3. owner of a related entity (e.g. the load-balancer rule of a group)
//   4. the authenticated caller
//   5. the system account
//
// ============================================================================

pub mod accounts;

pub use accounts::{Account, AccountDirectory, InMemoryAccountDirectory};

use crate::core::{AccountId, DomainId, LifecycleError, ResourceId, Result};
use crate::storage::EntityStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// The references a request carries that may identify its owner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipReference {
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub domain_id: Option<DomainId>,
    #[serde(default)]
    pub related: Option<ResourceId>,
}

impl OwnershipReference {
    pub fn account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    pub fn named(account_name: impl Into<String>, domain_id: DomainId) -> Self {
        Self {
            account_name: Some(account_name.into()),
            domain_id: Some(domain_id),
            ..Self::default()
        }
    }

    pub fn related(related: ResourceId) -> Self {
        Self {
            related: Some(related),
            ..Self::default()
        }
    }
}

/// Who is making the request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Option<AccountId>,
}

impl CallContext {
    pub fn caller(account: AccountId) -> Self {
        Self {
            caller: Some(account),
        }
    }

    /// No authenticated caller, e.g. background jobs
    pub fn anonymous() -> Self {
        Self::default()
    }
}

pub struct OwnershipResolver {
    accounts: Arc<dyn AccountDirectory>,
    store: Arc<dyn EntityStore>,
    system_account: AccountId,
}

impl OwnershipResolver {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        store: Arc<dyn EntityStore>,
        system_account: AccountId,
    ) -> Self {
        Self {
            accounts,
            store,
            system_account,
        }
    }

    /// Resolve the owning account of a request.
    pub async fn resolve(
        &self,
        reference: &OwnershipReference,
        ctx: &CallContext,
    ) -> Result<AccountId> {
        if let Some(account_id) = reference.account_id {
            return Ok(account_id);
        }

        match (&reference.account_name, reference.domain_id) {
            (Some(name), Some(domain)) => {
                let account = self.accounts.find_by_name(name, domain).await?.ok_or_else(|| {
                    LifecycleError::UnresolvableAccount {
                        account: name.clone(),
                        domain: domain.to_string(),
                    }
                })?;
                return Ok(account.id());
            }
            (Some(name), None) => {
                return Err(LifecycleError::Validation(format!(
                    "account '{name}' must be used with a domain id"
                )));
            }
            _ => {}
        }

        if let Some(related) = reference.related {
            let entity = self.store.find_by_id(related).await?.ok_or_else(|| {
                LifecycleError::ReferenceNotFound {
                    kind: "entity".to_string(),
                    id: related.to_string(),
                }
            })?;
            return Ok(entity.owner);
        }

        if let Some(caller) = ctx.caller {
            return Ok(caller);
        }

        debug!(system_account = %self.system_account, "no owner resolvable, using system account");
        Ok(self.system_account)
    }

    /// Owner to charge an event to when an operation targets `id`. Never
    /// fails: a missing entity is attributed to the system account so the
    /// failure still has an auditable owner.
    pub async fn attribute(&self, id: ResourceId) -> AccountId {
        match self.store.find_by_id(id).await {
            Ok(Some(entity)) => entity.owner,
            _ => self.system_account,
        }
    }
}
