/// Concurrent lifecycle tests
///
/// Operations racing on the same resource id must serialize
/// Run with: cargo test --test concurrent_lifecycle_tests

mod common;

use common::*;
use futures::future::join_all;
use resource_lifecycle::{
    CallContext, CreateRequest, EntityStore, LifecycleError, LifecycleState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

#[tokio::test]
async fn test_toggle_racing_activation() {
    let fleet = fleet_with(Arc::new(Slow(Duration::from_millis(20)))).await;
    let ctx = CallContext::caller(fleet.ops);
    let skeleton = fleet
        .coordinator
        .create_skeleton(CreateRequest::new(fleet.group_spec(1, 3)), &ctx)
        .await
        .unwrap();
    let id = skeleton.id;
    let barrier = Arc::new(Barrier::new(2));

    let activator = {
        let coordinator = Arc::clone(&fleet.coordinator);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            coordinator.activate(id).await
        })
    };
    let toggler = {
        let coordinator = Arc::clone(&fleet.coordinator);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            coordinator.disable(id).await
        })
    };

    let activated = activator.await.unwrap();
    let toggled = toggler.await.unwrap();
    assert!(activated.is_ok(), "activation failed: {activated:?}");

    let stored = fleet.stored(id).await.unwrap();
    match toggled {
        // disable ran after activation committed
        Ok(group) => {
            assert_eq!(group.state, LifecycleState::Disabled);
            assert_eq!(stored.state, LifecycleState::Disabled);
        }
        // disable ran first and saw only a pending skeleton
        Err(err) => {
            assert!(matches!(err, LifecycleError::NotFound { .. }), "{err:?}");
            assert_eq!(stored.state, LifecycleState::Active);
        }
    }
}

#[tokio::test]
async fn test_concurrent_toggles_settle_on_a_valid_state() {
    let fleet = fleet().await;
    let ctx = CallContext::caller(fleet.ops);
    let group = fleet
        .coordinator
        .create(CreateRequest::new(fleet.group_spec(1, 3)), &ctx)
        .await
        .unwrap();

    let num_tasks = 16;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let mut handles = vec![];

    for task_id in 0..num_tasks {
        let coordinator = Arc::clone(&fleet.coordinator);
        let barrier = Arc::clone(&barrier);
        let id = group.id;

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let enabled = task_id % 2 == 0;
            let result = coordinator.set_enabled(id, enabled).await.unwrap();
            (enabled, result.state)
        }));
    }

    for handle in handles {
        let (enabled, state) = handle.await.unwrap();
        let expected = if enabled {
            LifecycleState::Active
        } else {
            LifecycleState::Disabled
        };
        assert_eq!(state, expected);
    }

    let stored = fleet.stored(group.id).await.unwrap();
    assert!(stored.state.is_visible());
}

#[tokio::test]
async fn test_concurrent_binds_of_one_certificate() {
    let fleet = fleet().await;
    let cert = fleet
        .coordinator
        .create(
            CreateRequest::new(certificate_spec("shared")),
            &CallContext::caller(fleet.ops),
        )
        .await
        .unwrap();
    let barrier = Arc::new(Barrier::new(2));
    let mut handles = vec![];

    for rule in [fleet.rule, fleet.spare_rule] {
        let coordinator = Arc::clone(&fleet.coordinator);
        let barrier = Arc::clone(&barrier);
        let cert_id = cert.id;

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coordinator.assign_certificate(cert_id, rule).await
        }));
    }

    let mut winners = vec![];
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(binding) => winners.push(binding.lb_rule_id),
            Err(LifecycleError::BindingConflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, 1);
    assert_eq!(
        fleet.coordinator.bound_rule(cert.id).await.unwrap(),
        Some(winners[0])
    );
}

#[tokio::test]
async fn test_concurrent_groups_on_one_rule() {
    let fleet = fleet_with(Arc::new(Slow(Duration::from_millis(10)))).await;
    let num_tasks = 4;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let mut handles = vec![];

    for _ in 0..num_tasks {
        let coordinator = Arc::clone(&fleet.coordinator);
        let barrier = Arc::clone(&barrier);
        let spec = fleet.group_spec(1, 3);
        let ctx = CallContext::caller(fleet.ops);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coordinator.create(CreateRequest::new(spec), &ctx).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert!(matches!(err, LifecycleError::ActivationFailure { .. })),
        }
    }
    assert_eq!(created, 1);

    let rows = fleet.backend.store.scan().await.unwrap();
    let groups: Vec<_> = rows.iter().filter(|row| row.as_vm_group().is_some()).collect();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].state, LifecycleState::Active);
}

#[tokio::test]
async fn test_concurrent_skeletons_with_one_external_id() {
    let fleet = fleet().await;
    let num_tasks = 8;
    let barrier = Arc::new(Barrier::new(num_tasks));
    let mut handles = vec![];

    for task_id in 0..num_tasks {
        let coordinator = Arc::clone(&fleet.coordinator);
        let barrier = Arc::clone(&barrier);
        let spec = fleet.condition_spec("GT", task_id as i64);
        let ctx = CallContext::caller(fleet.ops);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            coordinator
                .create_skeleton(CreateRequest::new(spec).external_id("cond-shared"), &ctx)
                .await
        }));
    }

    let mut stored = 0;
    let mut rejected = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Ok(_) => stored += 1,
            Err(LifecycleError::Validation(message)) => {
                assert!(message.contains("already in use"), "{message}");
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(stored, 1);
    assert_eq!(rejected, num_tasks - 1);

    let rows = fleet.backend.store.scan().await.unwrap();
    let shared = rows
        .iter()
        .filter(|row| row.external_id.to_string() == "cond-shared")
        .count();
    assert_eq!(shared, 1);
}

#[tokio::test]
async fn test_parallel_creates_on_distinct_resources() {
    let fleet = fleet().await;
    let num_tasks = 20;
    let mut handles = vec![];

    for task_id in 0..num_tasks {
        let coordinator = Arc::clone(&fleet.coordinator);
        let spec = fleet.condition_spec("GT", task_id);
        let ctx = CallContext::caller(fleet.ops);

        handles.push(tokio::spawn(async move {
            coordinator
                .create(
                    CreateRequest::new(spec).external_id(format!("cond-{task_id}")),
                    &ctx,
                )
                .await
        }));
    }

    for result in join_all(handles).await {
        let condition = result.unwrap().unwrap();
        assert_eq!(condition.state, LifecycleState::Active);
    }

    let owned = fleet.coordinator.list_owned_by(fleet.ops, true).await.unwrap();
    assert_eq!(owned.len(), num_tasks as usize);
}

#[tokio::test]
async fn test_delete_racing_disable() {
    let fleet = fleet().await;
    let ctx = CallContext::caller(fleet.ops);
    let group = fleet
        .coordinator
        .create(CreateRequest::new(fleet.group_spec(1, 3)), &ctx)
        .await
        .unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let deleter = {
        let coordinator = Arc::clone(&fleet.coordinator);
        let barrier = Arc::clone(&barrier);
        let id = group.id;
        tokio::spawn(async move {
            barrier.wait().await;
            coordinator.delete(id).await
        })
    };
    let disabler = {
        let coordinator = Arc::clone(&fleet.coordinator);
        let barrier = Arc::clone(&barrier);
        let id = group.id;
        tokio::spawn(async move {
            barrier.wait().await;
            coordinator.disable(id).await
        })
    };

    assert!(deleter.await.unwrap().is_ok());
    match disabler.await.unwrap() {
        Ok(group) => assert_eq!(group.state, LifecycleState::Disabled),
        Err(err) => assert!(matches!(err, LifecycleError::NotFound { .. })),
    }
    assert!(fleet.stored(group.id).await.is_none());
}
