use crate::core::{AccountId, DomainId, LifecycleError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Account record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    name: String,
    domain: DomainId,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, domain: DomainId) -> Self {
        Self {
            id,
            name: name.into(),
            domain,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> DomainId {
        self.domain
    }
}

/// Account lookup used by ownership resolution
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Find an account by name within a domain
    async fn find_by_name(&self, name: &str, domain: DomainId) -> Result<Option<Account>>;
}

/// In-memory account directory
///
/// Starts with the system account registered in the root domain.
pub struct InMemoryAccountDirectory {
    accounts: RwLock<HashMap<(DomainId, String), Account>>,
    system_account: AccountId,
    next_id: AtomicU64,
}

impl InMemoryAccountDirectory {
    const SYSTEM_ACCOUNT_NAME: &'static str = "system";

    pub fn new() -> Self {
        Self::with_system_account(AccountId::SYSTEM)
    }

    /// Directory whose `system` account carries the given id
    pub fn with_system_account(system_account: AccountId) -> Self {
        let system = Account::new(system_account, Self::SYSTEM_ACCOUNT_NAME, DomainId::ROOT);
        let mut accounts = HashMap::new();
        accounts.insert((DomainId::ROOT, system.name.clone()), system);

        Self {
            accounts: RwLock::new(accounts),
            system_account,
            next_id: AtomicU64::new(AccountId::SYSTEM.0 + 1),
        }
    }

    pub fn system_account(&self) -> AccountId {
        self.system_account
    }

    /// Registers a new account
    pub async fn create_account(&self, name: &str, domain: DomainId) -> Result<Account> {
        Self::validate_name(name)?;

        let mut accounts = self.accounts.write().await;
        let key = (domain, name.to_string());
        if accounts.contains_key(&key) {
            return Err(LifecycleError::Validation(format!(
                "account '{name}' already exists in domain {domain}"
            )));
        }

        let account = Account::new(self.allocate_id(), name, domain);
        accounts.insert(key, account.clone());
        Ok(account)
    }

    // ids are never handed out twice, and never the system account's
    fn allocate_id(&self) -> AccountId {
        loop {
            let id = AccountId(self.next_id.fetch_add(1, Ordering::SeqCst));
            if id != self.system_account {
                return id;
            }
        }
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(LifecycleError::Validation("account name cannot be empty".into()));
        }

        if name.len() > 255 {
            return Err(LifecycleError::Validation(
                "account name too long (max 255 characters)".into(),
            ));
        }

        Ok(())
    }
}

impl Default for InMemoryAccountDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountDirectory for InMemoryAccountDirectory {
    async fn find_by_name(&self, name: &str, domain: DomainId) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&(domain, name.to_string())).cloned())
    }
}
