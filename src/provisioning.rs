use crate::core::{Resource, Result};
use async_trait::async_trait;

/// External provisioning calls made while activating or binding a resource
///
/// Implementations own the rollback of their own side effects. The
/// coordinator only removes the skeleton row it created.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Apply the configuration of a Pending resource. `Ok(false)` is an
    /// expected refusal, `Err` an infrastructure failure; both fail the
    /// activation.
    async fn configure(&self, resource: &Resource) -> Result<bool>;

    /// Push a certificate onto a load-balancer rule.
    async fn bind_certificate(&self, _certificate: &Resource, _rule: &Resource) -> Result<()> {
        Ok(())
    }
}

/// Accepts everything. Used when no backend is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProvisioner;

#[async_trait]
impl Provisioner for NoopProvisioner {
    async fn configure(&self, _resource: &Resource) -> Result<bool> {
        Ok(true)
    }
}
