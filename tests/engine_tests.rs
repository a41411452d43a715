//! Convergence Engine Tests
//!
//! Ordering, cycle rejection, lifecycles, dry runs and cancellation against
//! recording fake tasks.

mod common;

use clusterup_core::cloud::MemoryCloud;
use clusterup_core::constants::events;
use clusterup_core::orchestration::{ConvergenceEngine, RunOptions, TaskOutcome};
use clusterup_core::staging::InventoryAsset;
use clusterup_core::target::TargetKind;
use clusterup_core::task::{Lifecycle, Phase};
use clusterup_core::{ConvergeError, EventPublisher};
use common::*;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_referents_render_before_referrers() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);

    // Inserted in reverse dependency order.
    ctx.add_task(FakeResource::new(&world, "c").linked_to("b"))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "b").linked_to("a"))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "a")).unwrap();

    let report = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap();

    assert_eq!(world.renders(), vec!["a", "b", "c"]);
    let order: Vec<String> = report
        .execution_order()
        .iter()
        .map(|id| id.name().to_string())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert_eq!(report.mutation_count(), 3);
}

#[tokio::test]
async fn test_cycle_is_rejected_before_any_task_runs() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "standalone"))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "a").linked_to("b"))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "b").linked_to("a"))
        .unwrap();

    let err = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap_err();

    match err {
        ConvergeError::CycleDetected { cycle } => {
            assert_eq!(cycle, vec![FakeResource::id("a"), FakeResource::id("b")]);
        }
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(world.calls().is_empty());
}

#[tokio::test]
async fn test_cycle_outside_selected_phases_is_still_fatal() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "net").in_phase(Phase::Network))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "a").linked_to("b"))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "b").linked_to("a"))
        .unwrap();

    let options = RunOptions::apply().with_phases([Phase::Network]);
    let err = ConvergenceEngine::new().run(ctx, &options).await.unwrap_err();
    assert!(matches!(err, ConvergeError::CycleDetected { .. }));
    assert!(world.calls().is_empty());
}

#[tokio::test]
async fn test_missing_shared_resource_fails_without_creating() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "shared").with_lifecycle(Lifecycle::Shared))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "user").linked_to("shared"))
        .unwrap();

    let err = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap_err();

    assert_eq!(err.task(), Some(&FakeResource::id("shared")));
    assert!(matches!(
        err.root(),
        ConvergeError::SharedResourceMissing { .. }
    ));
    assert_eq!(world.calls(), vec!["find:shared"]);
    assert!(world.value("shared").is_none());
}

#[tokio::test]
async fn test_existing_shared_resource_is_bound_not_rendered() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    world.insert("shared", "observed-value");

    let mut ctx = api_context(&cloud);
    ctx.add_task(
        FakeResource::new(&world, "shared")
            .with_lifecycle(Lifecycle::Shared)
            .with_value(Some("something-else")),
    )
    .unwrap();
    ctx.add_task(FakeResource::new(&world, "user").linked_to("shared"))
        .unwrap();

    let report = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap();

    assert_eq!(
        report.outcome(&FakeResource::id("shared")),
        Some(&TaskOutcome::Bound)
    );
    assert_eq!(world.value("shared").as_deref(), Some("observed-value"));
    assert_eq!(world.renders(), vec!["user"]);
}

#[tokio::test]
async fn test_existing_or_create_creates_when_absent() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    world.insert("present", "kept");

    let mut ctx = api_context(&cloud);
    ctx.add_task(
        FakeResource::new(&world, "present").with_lifecycle(Lifecycle::ExistingOrCreate),
    )
    .unwrap();
    ctx.add_task(FakeResource::new(&world, "absent").with_lifecycle(Lifecycle::ExistingOrCreate))
        .unwrap();

    let report = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap();

    assert_eq!(
        report.outcome(&FakeResource::id("present")),
        Some(&TaskOutcome::Bound)
    );
    assert_eq!(
        report.outcome(&FakeResource::id("absent")),
        Some(&TaskOutcome::Created)
    );
    assert_eq!(world.value("present").as_deref(), Some("kept"));
}

#[tokio::test]
async fn test_ignored_task_only_publishes_outputs() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "ignored").with_lifecycle(Lifecycle::Ignore))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "user").linked_to("ignored"))
        .unwrap();

    let report = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap();

    assert_eq!(
        report.outcome(&FakeResource::id("ignored")),
        Some(&TaskOutcome::Ignored)
    );
    assert_eq!(world.calls(), vec!["find:user", "render:user"]);
}

#[tokio::test]
async fn test_first_failure_aborts_remaining_tasks() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "a")).unwrap();
    ctx.add_task(
        FakeResource::new(&world, "b")
            .linked_to("a")
            .with_value(None),
    )
    .unwrap();
    ctx.add_task(FakeResource::new(&world, "c").linked_to("b"))
        .unwrap();

    let err = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap_err();

    assert!(matches!(
        err.root(),
        ConvergeError::RequiredField { field: "value", .. }
    ));
    assert_eq!(world.calls(), vec!["find:a", "render:a", "find:b"]);
    // Already-applied work stays applied.
    assert_eq!(world.value("a").as_deref(), Some("a-value"));
}

#[tokio::test]
async fn test_second_run_performs_no_mutations() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();

    for expected_renders in [2, 2] {
        let mut ctx = api_context(&cloud);
        ctx.add_task(FakeResource::new(&world, "a")).unwrap();
        ctx.add_task(FakeResource::new(&world, "b").linked_to("a"))
            .unwrap();
        ConvergenceEngine::new()
            .run(ctx, &RunOptions::apply())
            .await
            .unwrap();
        assert_eq!(world.renders().len(), expected_renders);
    }
}

#[tokio::test]
async fn test_changed_value_is_updated() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    world.insert("a", "old");

    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "a").with_value(Some("new")))
        .unwrap();

    let report = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap();

    assert_eq!(
        report.outcome(&FakeResource::id("a")),
        Some(&TaskOutcome::Updated {
            fields: vec!["value".to_string()]
        })
    );
    assert_eq!(world.value("a").as_deref(), Some("new"));
}

#[tokio::test]
async fn test_dry_run_discovers_without_rendering() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    world.insert("existing", "old");
    let pause = InventoryAsset::container("k8s.gcr.io/pause-amd64:3.0");

    let mut ctx = api_context(&cloud);
    ctx.add_task(
        FakeResource::new(&world, "existing")
            .with_value(Some("new"))
            .with_assets(vec![pause.clone()]),
    )
    .unwrap();
    ctx.add_task(
        FakeResource::new(&world, "fresh")
            .linked_to("existing")
            .with_assets(vec![
                pause.clone(),
                InventoryAsset::binary("https://files.example.com/kubelet"),
            ]),
    )
    .unwrap();

    let report = ConvergenceEngine::new()
        .run(ctx, &RunOptions::dry_run())
        .await
        .unwrap();

    assert!(world.renders().is_empty());
    assert_eq!(world.value("existing").as_deref(), Some("old"));
    assert_eq!(
        report.outcome(&FakeResource::id("existing")),
        Some(&TaskOutcome::WouldUpdate {
            fields: vec!["value".to_string()]
        })
    );
    assert_eq!(
        report.outcome(&FakeResource::id("fresh")),
        Some(&TaskOutcome::WouldCreate)
    );
    assert_eq!(
        report.inventory,
        vec![
            pause,
            InventoryAsset::binary("https://files.example.com/kubelet")
        ]
    );
}

#[tokio::test]
async fn test_dry_run_surfaces_validation_errors() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "a").with_value(None))
        .unwrap();

    let err = ConvergenceEngine::new()
        .run(ctx, &RunOptions::dry_run())
        .await
        .unwrap_err();
    assert!(matches!(err.root(), ConvergeError::RequiredField { .. }));
}

#[tokio::test]
async fn test_phase_filter_visits_subgraph() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    world.insert("net", "net-value");

    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "net").in_phase(Phase::Network))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "cluster").linked_to("net"))
        .unwrap();
    ctx.add_task(FakeResource::new(&world, "unrelated").in_phase(Phase::Iam))
        .unwrap();

    let options = RunOptions::apply().with_phases([Phase::Cluster]);
    let report = ConvergenceEngine::new().run(ctx, &options).await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(
        report.outcome(&FakeResource::id("net")),
        Some(&TaskOutcome::Bound)
    );
    assert_eq!(world.renders(), vec!["cluster"]);
    assert!(!world.calls().contains(&"find:unrelated".to_string()));
}

#[tokio::test]
async fn test_cancelled_run_stops_before_next_task() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "a")).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = ConvergenceEngine::new()
        .with_cancellation(cancel)
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap_err();

    assert!(matches!(err, ConvergeError::Cancelled));
    assert!(world.calls().is_empty());
}

#[tokio::test]
async fn test_unsupported_target_fails_before_execution() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let dir = tempfile::TempDir::new().unwrap();

    let mut ctx = config_context(&cloud, dir.path());
    ctx.add_task(FakeResource::new(&world, "a")).unwrap();
    ctx.add_task(FakeResource::new(&world, "api-only").api_only())
        .unwrap();

    let err = ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap_err();

    match err {
        ConvergeError::UnsupportedTarget { task, target } => {
            assert_eq!(task, FakeResource::id("api-only"));
            assert_eq!(target, TargetKind::Config);
        }
        other => panic!("expected unsupported target, got {other}"),
    }
    assert!(world.calls().is_empty());
}

#[tokio::test]
async fn test_shared_task_needs_no_renderer() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    world.insert("shared", "shared-value");
    let dir = tempfile::TempDir::new().unwrap();

    let mut ctx = config_context(&cloud, dir.path());
    ctx.add_task(
        FakeResource::new(&world, "shared")
            .api_only()
            .with_lifecycle(Lifecycle::Shared),
    )
    .unwrap();
    ctx.add_task(FakeResource::new(&world, "user").linked_to("shared"))
        .unwrap();

    ConvergenceEngine::new()
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap();

    let written =
        std::fs::read_to_string(dir.path().join("cluster.tf.json")).unwrap();
    let document: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(
        document["resource"]["fake_resource"]["user"]["references"][0],
        "shared-value"
    );
}

#[tokio::test]
async fn test_engine_publishes_task_events() {
    let cloud = MemoryCloud::new();
    let world = FakeWorld::new();
    let mut ctx = api_context(&cloud);
    ctx.add_task(FakeResource::new(&world, "a")).unwrap();

    let publisher = EventPublisher::new(16);
    let mut receiver = publisher.subscribe();
    ConvergenceEngine::new()
        .with_publisher(publisher)
        .run(ctx, &RunOptions::apply())
        .await
        .unwrap();

    let mut names = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        names.push(event.name);
    }
    assert_eq!(
        names,
        vec![
            events::RUN_STARTED,
            events::TASK_STARTED,
            events::TASK_COMPLETED,
            events::RUN_COMPLETED
        ]
    );
}
