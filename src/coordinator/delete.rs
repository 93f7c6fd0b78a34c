use super::ResourceLifecycleCoordinator;
use crate::core::{
    LifecycleError, LifecycleState, Resource, ResourceBody, ResourceId, ResourceKind, Result,
};
use crate::events::{EventRecord, EventType};
use tracing::{Instrument, info, info_span, warn};

impl ResourceLifecycleCoordinator {
    /// Remove a managed resource.
    ///
    /// Attachment-like resources are refused with `ResourceInUse` while
    /// something live still references them: a condition used by a scale
    /// policy, a certificate bound to a load-balancer rule. The returned
    /// copy carries state `Deleted`.
    pub async fn delete(&self, id: ResourceId) -> Result<Resource> {
        let span = info_span!("delete", resource_id = %id);

        async move {
            let _guard = self.locks.lock(id).await?;

            let resource = match self.load_visible(id, None).await {
                Ok(resource) => resource,
                Err(err) => {
                    let owner = self.owners.attribute(id).await;
                    self.emit(
                        EventRecord::failed(delete_event(None), owner, err.to_string())
                            .resource_id(id),
                    )
                    .await;
                    return Err(err);
                }
            };
            let event_type = delete_event(Some(resource.kind()));

            if let Err(err) = self.ensure_unreferenced(&resource).await {
                warn!(error = %err, "delete refused");
                self.emit(
                    EventRecord::failed(event_type, resource.owner, err.to_string())
                        .resource(resource.id, &resource.external_id),
                )
                .await;
                return Err(err);
            }

            let mut deleted = self
                .store
                .delete(id)
                .await?
                .ok_or_else(|| LifecycleError::not_found(resource.kind(), id))?;
            deleted.transition(LifecycleState::Deleted)?;

            info!(external_id = %deleted.external_id, kind = %deleted.kind(), "resource deleted");
            self.emit(
                EventRecord::completed(
                    event_type,
                    deleted.owner,
                    format!("deleted {} {}", deleted.kind(), deleted.external_id),
                )
                .resource(deleted.id, &deleted.external_id),
            )
            .await;

            Ok(deleted)
        }
        .instrument(span)
        .await
    }

    async fn ensure_unreferenced(&self, resource: &Resource) -> Result<()> {
        match resource.kind() {
            ResourceKind::AutoScaleVmGroup => Ok(()),
            ResourceKind::Condition => {
                let user = self.store.scan().await?.into_iter().find(|row| {
                    matches!(&row.body, ResourceBody::AutoScalePolicy(policy)
                        if row.state.is_visible() && policy.condition_ids.contains(&resource.id))
                });
                match user {
                    Some(policy) => Err(LifecycleError::ResourceInUse(format!(
                        "condition {} is used by autoscale policy {}",
                        resource.external_id, policy.external_id
                    ))),
                    None => Ok(()),
                }
            }
            ResourceKind::SslCertificate => match self.bound_rule(resource.id).await? {
                Some(rule) => Err(LifecycleError::ResourceInUse(format!(
                    "certificate {} in use by a load balancer rule {rule}",
                    resource.external_id
                ))),
                None => Ok(()),
            },
            other => Err(LifecycleError::Validation(format!(
                "{other} {} is not managed by the lifecycle coordinator",
                resource.external_id
            ))),
        }
    }
}

fn delete_event(kind: Option<ResourceKind>) -> EventType {
    match kind {
        Some(ResourceKind::Condition) => EventType::ConditionDelete,
        Some(ResourceKind::SslCertificate) => EventType::CertDelete,
        _ => EventType::VmGroupDelete,
    }
}
