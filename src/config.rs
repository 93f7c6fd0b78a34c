use crate::core::{AccountId, LifecycleError, Result};
use std::time::Duration;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound on the provisioning call made during activation
    pub activation_timeout: Duration,

    /// Upper bound on the provisioning call made while binding
    pub bind_timeout: Duration,

    /// Upper bound on a single event-recorder call
    pub event_timeout: Duration,

    /// Owner of last resort for ownership resolution
    pub system_account_id: AccountId,

    /// Largest accepted `max_members` for a VM group
    pub max_members_limit: u32,

    /// Evaluation interval applied when a group request has none
    pub default_interval_secs: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorConfig {
    pub const ENV_ACTIVATION_TIMEOUT_MS: &'static str = "LIFECYCLE_ACTIVATION_TIMEOUT_MS";
    pub const ENV_BIND_TIMEOUT_MS: &'static str = "LIFECYCLE_BIND_TIMEOUT_MS";
    pub const ENV_EVENT_TIMEOUT_MS: &'static str = "LIFECYCLE_EVENT_TIMEOUT_MS";
    pub const ENV_SYSTEM_ACCOUNT_ID: &'static str = "LIFECYCLE_SYSTEM_ACCOUNT_ID";
    pub const ENV_MAX_MEMBERS: &'static str = "LIFECYCLE_MAX_MEMBERS";
    pub const ENV_DEFAULT_INTERVAL_SECS: &'static str = "LIFECYCLE_DEFAULT_INTERVAL_SECS";

    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            activation_timeout: Duration::from_secs(30),
            bind_timeout: Duration::from_secs(10),
            event_timeout: Duration::from_secs(5),
            system_account_id: AccountId::SYSTEM,
            max_members_limit: 1000,
            default_interval_secs: 30,
        }
    }

    /// Set activation timeout
    pub fn activation_timeout(mut self, timeout: Duration) -> Self {
        self.activation_timeout = timeout;
        self
    }

    /// Set bind timeout
    pub fn bind_timeout(mut self, timeout: Duration) -> Self {
        self.bind_timeout = timeout;
        self
    }

    /// Set event recorder timeout
    pub fn event_timeout(mut self, timeout: Duration) -> Self {
        self.event_timeout = timeout;
        self
    }

    /// Set the system account
    pub fn system_account_id(mut self, account: AccountId) -> Self {
        self.system_account_id = account;
        self
    }

    /// Set the `max_members` ceiling
    pub fn max_members_limit(mut self, limit: u32) -> Self {
        self.max_members_limit = limit;
        self
    }

    /// Set the default evaluation interval
    pub fn default_interval_secs(mut self, secs: u32) -> Self {
        self.default_interval_secs = secs;
        self
    }

    /// Load from `LIFECYCLE_*` environment variables, defaulting anything unset
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(ms) = parse_var::<u64, _>(&lookup, Self::ENV_ACTIVATION_TIMEOUT_MS)? {
            config.activation_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, Self::ENV_BIND_TIMEOUT_MS)? {
            config.bind_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, Self::ENV_EVENT_TIMEOUT_MS)? {
            config.event_timeout = Duration::from_millis(ms);
        }
        if let Some(id) = parse_var::<u64, _>(&lookup, Self::ENV_SYSTEM_ACCOUNT_ID)? {
            config.system_account_id = AccountId(id);
        }
        if let Some(limit) = parse_var::<u32, _>(&lookup, Self::ENV_MAX_MEMBERS)? {
            config.max_members_limit = limit;
        }
        if let Some(secs) = parse_var::<u32, _>(&lookup, Self::ENV_DEFAULT_INTERVAL_SECS)? {
            config.default_interval_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the coordinator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.activation_timeout.is_zero() {
            return Err(LifecycleError::Config("activation timeout must be positive".into()));
        }
        if self.bind_timeout.is_zero() {
            return Err(LifecycleError::Config("bind timeout must be positive".into()));
        }
        if self.event_timeout.is_zero() {
            return Err(LifecycleError::Config("event timeout must be positive".into()));
        }
        if self.max_members_limit == 0 {
            return Err(LifecycleError::Config("max members limit must be positive".into()));
        }
        if self.default_interval_secs == 0 {
            return Err(LifecycleError::Config("default interval must be positive".into()));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| LifecycleError::Config(format!("{key} has invalid value '{raw}'"))),
    }
}
