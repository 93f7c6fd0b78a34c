use super::{CreateRequest, ResourceLifecycleCoordinator};
use crate::core::{
    LifecycleError, LifecycleState, NewResource, Resource, ResourceBody, ResourceId, ResourceKind,
    Result, ScaleAction,
};
use crate::events::{EventRecord, EventType};
use crate::ownership::CallContext;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, warn};

impl ResourceLifecycleCoordinator {
    /// Create and activate in one call. On activation failure the skeleton
    /// has already been removed when the error is returned.
    pub async fn create(&self, request: CreateRequest, ctx: &CallContext) -> Result<Resource> {
        let skeleton = self.create_skeleton(request, ctx).await?;
        let span = info_span!("activate", resource_id = %skeleton.id);
        self.activate_skeleton(skeleton).instrument(span).await
    }

    /// Phase 1: validate structure, resolve the owner and persist a Pending
    /// row. Nothing is written when any check fails.
    pub async fn create_skeleton(
        &self,
        request: CreateRequest,
        ctx: &CallContext,
    ) -> Result<Resource> {
        let kind = request.spec.kind();
        let span = info_span!("create_skeleton", kind = %kind);

        async move {
            let body = request.spec.build_body(&self.config)?;

            if let Some(external_id) = &request.external_id {
                if self.store.find_by_external_id(external_id).await?.is_some() {
                    return Err(LifecycleError::Validation(format!(
                        "external id '{external_id}' is already in use"
                    )));
                }
            }

            let owner = self.owners.resolve(&request.ownership(), ctx).await?;

            let draft = NewResource {
                external_id: request.external_id,
                owner,
                display: request.display.unwrap_or(true),
                state: LifecycleState::Pending,
                body,
            };
            let skeleton = self.store.create(draft).await?;

            debug!(
                resource_id = %skeleton.id,
                external_id = %skeleton.external_id,
                owner = %owner,
                "skeleton persisted"
            );
            Ok(skeleton)
        }
        .instrument(span)
        .await
    }

    /// Phase 2: apply the configuration of a Pending resource.
    ///
    /// Success moves the row to Active and returns it as stored. Any
    /// failure, expected or not, deletes the skeleton and then reports
    /// `ActivationFailure` (or `Unexpected`). When the row cannot be read at
    /// all its state is unknown, so nothing is deleted.
    pub async fn activate(&self, id: ResourceId) -> Result<Resource> {
        let span = info_span!("activate", resource_id = %id);

        async move {
            let skeleton = match self.store.find_by_id(id).await {
                Ok(Some(row)) => row,
                Ok(None) => return Err(LifecycleError::not_found("Resource", id)),
                Err(err) => {
                    error!(error = %err, "resource unreadable, activation abandoned");
                    return Err(LifecycleError::ActivationFailure {
                        id,
                        reason: err.to_string(),
                    });
                }
            };
            self.activate_skeleton(skeleton).await
        }
        .instrument(span)
        .await
    }

    /// Activate a row known to have been stored as a skeleton. Every failure
    /// from lock acquisition onward goes through the compensating delete.
    async fn activate_skeleton(&self, skeleton: Resource) -> Result<Resource> {
        // the body is fixed at creation, so the lock keys come from the row in hand
        let _guard = match self.locks.lock_many(&activation_lock_keys(&skeleton)).await {
            Ok(guard) => guard,
            Err(err) => return Err(self.roll_back(&skeleton, err).await),
        };

        let current = match self.store.find_by_id(skeleton.id).await {
            Ok(Some(row)) => row,
            Ok(None) => return Err(LifecycleError::not_found(skeleton.kind(), skeleton.id)),
            Err(err) => return Err(self.roll_back(&skeleton, err).await),
        };
        if current.state != LifecycleState::Pending {
            return Err(LifecycleError::Validation(format!(
                "{} {} is {}, only pending resources can be activated",
                current.kind(),
                current.external_id,
                current.state
            )));
        }

        match self.apply_configuration(&current).await {
            Ok(active) => {
                info!(
                    resource_id = %active.id,
                    external_id = %active.external_id,
                    kind = %active.kind(),
                    "resource activated"
                );
                self.emit(
                    EventRecord::completed(
                        create_event(&active),
                        active.owner,
                        format!("created {} {}", active.kind(), active.external_id),
                    )
                    .resource(active.id, &active.external_id),
                )
                .await;
                Ok(active)
            }
            Err(err) => Err(self.roll_back(&current, err).await),
        }
    }

    async fn apply_configuration(&self, skeleton: &Resource) -> Result<Resource> {
        self.resolve_links(skeleton).await?;

        if needs_provisioning(skeleton.kind()) {
            let provisioner = Arc::clone(&self.provisioner);
            let row = skeleton.clone();
            let accepted = self
                .bounded(
                    skeleton.id,
                    "configure",
                    self.config.activation_timeout,
                    async move { provisioner.configure(&row).await },
                )
                .await?;
            if !accepted {
                return Err(LifecycleError::ActivationFailure {
                    id: skeleton.id,
                    reason: "provisioning declined the configuration".into(),
                });
            }
        }

        let mut active = skeleton.clone();
        active.transition(LifecycleState::Active)?;
        self.store.update(&active).await?;

        self.store
            .find_by_id(skeleton.id)
            .await?
            .filter(|row| row.state == LifecycleState::Active)
            .ok_or_else(|| LifecycleError::ActivationFailure {
                id: skeleton.id,
                reason: "resource vanished during activation".into(),
            })
    }

    /// Check that every composition link of a skeleton resolves.
    async fn resolve_links(&self, skeleton: &Resource) -> Result<()> {
        match &skeleton.body {
            ResourceBody::AutoScaleVmGroup(group) => {
                self.load_reference(group.lb_rule_id, ResourceKind::LoadBalancerRule)
                    .await?;
                self.load_reference(group.profile_id, ResourceKind::AutoScaleVmProfile)
                    .await?;

                for (ids, action) in [
                    (&group.scale_up_policy_ids, ScaleAction::ScaleUp),
                    (&group.scale_down_policy_ids, ScaleAction::ScaleDown),
                ] {
                    for policy_id in ids {
                        let policy = self
                            .load_reference(*policy_id, ResourceKind::AutoScalePolicy)
                            .await?;
                        let matches = policy.as_policy().map(|p| p.action) == Some(action);
                        if !matches {
                            return Err(LifecycleError::Validation(format!(
                                "policy {} cannot be used as a {action:?} policy",
                                policy.external_id
                            )));
                        }
                    }
                }

                let taken = self.store.scan().await?.into_iter().any(|row| {
                    row.id != skeleton.id
                        && row.state.is_visible()
                        && row.as_vm_group().map(|g| g.lb_rule_id) == Some(group.lb_rule_id)
                });
                if taken {
                    return Err(LifecycleError::Validation(format!(
                        "load balancer rule {} already has an autoscale vm group",
                        group.lb_rule_id
                    )));
                }
                Ok(())
            }
            ResourceBody::Condition(condition) => {
                self.load_reference(condition.counter_id, ResourceKind::Counter)
                    .await
                    .map(|_| ())
            }
            _ => Ok(()),
        }
    }

    /// Compensating delete of a skeleton whose activation failed. Returns
    /// the error to hand back to the caller.
    async fn roll_back(&self, skeleton: &Resource, cause: LifecycleError) -> LifecycleError {
        match &cause {
            LifecycleError::Unexpected(_) => error!(
                resource_id = %skeleton.id,
                kind = %skeleton.kind(),
                error = %cause,
                "unexpected failure during activation, rolling back"
            ),
            _ => warn!(
                resource_id = %skeleton.id,
                kind = %skeleton.kind(),
                error = %cause,
                "activation failed, rolling back"
            ),
        }

        if let Err(delete_err) = self.store.delete(skeleton.id).await {
            error!(
                resource_id = %skeleton.id,
                error = %delete_err,
                "compensating delete failed, skeleton may remain"
            );
        }

        self.emit(
            EventRecord::failed(
                create_event(skeleton),
                skeleton.owner,
                format!("failed to create {} {}: {cause}", skeleton.kind(), skeleton.external_id),
            )
            .resource(skeleton.id, &skeleton.external_id),
        )
        .await;

        match cause {
            LifecycleError::Unexpected(_) | LifecycleError::ActivationFailure { .. } => cause,
            other => LifecycleError::ActivationFailure {
                id: skeleton.id,
                reason: other.to_string(),
            },
        }
    }
}

fn needs_provisioning(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::AutoScaleVmGroup | ResourceKind::SslCertificate)
}

fn create_event(resource: &Resource) -> EventType {
    match resource.kind() {
        ResourceKind::Condition => EventType::ConditionCreate,
        ResourceKind::SslCertificate => EventType::CertUpload,
        _ => EventType::VmGroupCreate,
    }
}

/// A group activation also holds its load-balancer rule so two groups
/// cannot claim the same rule concurrently.
fn activation_lock_keys(resource: &Resource) -> Vec<ResourceId> {
    match resource.as_vm_group() {
        Some(group) => vec![resource.id, group.lb_rule_id],
        None => vec![resource.id],
    }
}
