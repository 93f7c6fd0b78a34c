use super::ResourceLifecycleCoordinator;
use crate::core::{LifecycleError, LifecycleState, Resource, ResourceId, ResourceKind, Result};
use crate::events::{EventRecord, EventType};
use tracing::{Instrument, debug, info, info_span};

impl ResourceLifecycleCoordinator {
    /// Enable or disable an activated VM group. Setting the state it is
    /// already in is a successful no-op.
    pub async fn set_enabled(&self, id: ResourceId, enabled: bool) -> Result<Resource> {
        let span = info_span!("set_enabled", resource_id = %id, enabled);

        async move {
            let event_type = if enabled {
                EventType::VmGroupEnable
            } else {
                EventType::VmGroupDisable
            };
            let _guard = self.locks.lock(id).await?;

            let loaded = self
                .load_visible(id, Some(ResourceKind::AutoScaleVmGroup))
                .await;
            let mut group = match loaded {
                Ok(group) => group,
                Err(err) => {
                    let owner = self.owners.attribute(id).await;
                    self.emit(
                        EventRecord::failed(event_type, owner, err.to_string()).resource_id(id),
                    )
                    .await;
                    return Err(err);
                }
            };

            let target = if enabled {
                LifecycleState::Active
            } else {
                LifecycleState::Disabled
            };
            if group.state == target {
                debug!(state = %target, "group already in requested state");
                return Ok(group);
            }

            group.transition(target)?;
            self.store.update(&group).await.map_err(|err| match err {
                LifecycleError::NotFound { .. } => {
                    LifecycleError::not_found(ResourceKind::AutoScaleVmGroup, id)
                }
                other => other,
            })?;

            info!(external_id = %group.external_id, state = %group.state, "group state changed");
            self.emit(
                EventRecord::completed(
                    event_type,
                    group.owner,
                    format!("{} autoscale vm group {}", verb(enabled), group.external_id),
                )
                .resource(group.id, &group.external_id),
            )
            .await;

            Ok(group)
        }
        .instrument(span)
        .await
    }

    pub async fn enable(&self, id: ResourceId) -> Result<Resource> {
        self.set_enabled(id, true).await
    }

    pub async fn disable(&self, id: ResourceId) -> Result<Resource> {
        self.set_enabled(id, false).await
    }
}

fn verb(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}
