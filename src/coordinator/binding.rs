use super::ResourceLifecycleCoordinator;
use crate::core::{AccountId, LifecycleError, ResourceBody, ResourceId, ResourceKind, Result};
use crate::events::{EventRecord, EventType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};

/// A certificate attached to a load-balancer rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBinding {
    pub certificate_id: ResourceId,
    pub lb_rule_id: ResourceId,
    pub owner: AccountId,
}

impl ResourceLifecycleCoordinator {
    /// Bind a certificate to a load-balancer rule.
    ///
    /// A certificate serves at most one rule and a rule carries at most one
    /// certificate; either clash is a `BindingConflict` and nothing changes.
    /// Re-binding the same pair succeeds without side effects.
    pub async fn assign_certificate(
        &self,
        certificate_id: ResourceId,
        lb_rule_id: ResourceId,
    ) -> Result<CertificateBinding> {
        let span = info_span!(
            "assign_certificate",
            certificate_id = %certificate_id,
            lb_rule_id = %lb_rule_id
        );

        async move {
            let _guard = self.locks.lock_many(&[certificate_id, lb_rule_id]).await?;

            let result = self.bind(certificate_id, lb_rule_id).await;
            if let Err(err) = &result {
                let owner = self.owners.attribute(lb_rule_id).await;
                warn!(error = %err, "certificate assignment rejected");
                self.emit(
                    EventRecord::failed(EventType::CertAssign, owner, err.to_string())
                        .resource_id(certificate_id),
                )
                .await;
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn bind(
        &self,
        certificate_id: ResourceId,
        lb_rule_id: ResourceId,
    ) -> Result<CertificateBinding> {
        let mut rule = self
            .load_visible(lb_rule_id, Some(ResourceKind::LoadBalancerRule))
            .await?;
        let certificate = self
            .load_visible(certificate_id, Some(ResourceKind::SslCertificate))
            .await?;

        if certificate.owner != rule.owner {
            return Err(LifecycleError::Validation(format!(
                "certificate {} and load balancer rule {} belong to different accounts",
                certificate.external_id, rule.external_id
            )));
        }

        let binding = CertificateBinding {
            certificate_id,
            lb_rule_id,
            owner: rule.owner,
        };

        match rule.as_load_balancer_rule().and_then(|r| r.certificate_id) {
            Some(existing) if existing == certificate_id => return Ok(binding),
            Some(existing) => {
                return Err(LifecycleError::BindingConflict(format!(
                    "load balancer rule {} already has certificate {existing}",
                    rule.external_id
                )));
            }
            None => {}
        }

        if let Some(other) = self.bound_rule(certificate_id).await? {
            return Err(LifecycleError::BindingConflict(format!(
                "certificate {} is already bound to load balancer rule {other}",
                certificate.external_id
            )));
        }

        let provisioner = Arc::clone(&self.provisioner);
        let (cert_row, rule_row) = (certificate.clone(), rule.clone());
        self.bounded(
            lb_rule_id,
            "bind certificate",
            self.config.bind_timeout,
            async move { provisioner.bind_certificate(&cert_row, &rule_row).await },
        )
        .await?;

        if let ResourceBody::LoadBalancerRule(body) = &mut rule.body {
            body.certificate_id = Some(certificate_id);
        }
        rule.updated_at = chrono::Utc::now();
        self.store.update(&rule).await?;

        info!(
            certificate = %certificate.external_id,
            lb_rule = %rule.external_id,
            "certificate assigned"
        );
        self.emit(
            EventRecord::completed(
                EventType::CertAssign,
                rule.owner,
                format!(
                    "assigned certificate {} to load balancer rule {}",
                    certificate.external_id, rule.external_id
                ),
            )
            .resource(certificate.id, &certificate.external_id),
        )
        .await;

        Ok(binding)
    }

    /// Detach whatever certificate a rule carries.
    pub async fn remove_certificate(&self, lb_rule_id: ResourceId) -> Result<CertificateBinding> {
        let span = info_span!("remove_certificate", lb_rule_id = %lb_rule_id);

        async move {
            let _guard = self.locks.lock(lb_rule_id).await?;

            let mut rule = self
                .load_visible(lb_rule_id, Some(ResourceKind::LoadBalancerRule))
                .await?;
            let bound = match &mut rule.body {
                ResourceBody::LoadBalancerRule(body) => body.certificate_id.take(),
                _ => None,
            };
            let certificate_id = bound.ok_or_else(|| {
                LifecycleError::Validation(format!(
                    "no certificate is bound to load balancer rule {}",
                    rule.external_id
                ))
            })?;

            rule.updated_at = chrono::Utc::now();
            self.store.update(&rule).await?;

            info!(certificate_id = %certificate_id, "certificate removed");
            self.emit(
                EventRecord::completed(
                    EventType::CertRemove,
                    rule.owner,
                    format!("removed certificate from load balancer rule {}", rule.external_id),
                )
                .resource_id(certificate_id),
            )
            .await;

            Ok(CertificateBinding {
                certificate_id,
                lb_rule_id,
                owner: rule.owner,
            })
        }
        .instrument(span)
        .await
    }

    /// The rule a certificate is currently bound to, if any
    pub async fn bound_rule(&self, certificate_id: ResourceId) -> Result<Option<ResourceId>> {
        Ok(self
            .store
            .scan()
            .await?
            .into_iter()
            .find(|row| {
                row.state.is_visible()
                    && row.as_load_balancer_rule().and_then(|r| r.certificate_id)
                        == Some(certificate_id)
            })
            .map(|row| row.id))
    }
}
