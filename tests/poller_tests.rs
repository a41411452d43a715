//! Operation Poller Tests
//!
//! Bounded waiting on provider operations, driven on a paused clock.

mod common;

use async_trait::async_trait;
use clusterup_core::cloud::{
    CloudResult, MemoryCloud, Operation, OperationErrorDetail, OperationRef, OperationSource,
    OperationStatus,
};
use clusterup_core::config::{ConvergeConfig, PollerConfig};
use clusterup_core::orchestration::ApplyCluster;
use clusterup_core::{ConvergeError, OperationPoller};
use common::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const LINK: &str =
    "https://container.googleapis.com/v1/projects/demo/zones/us-central1-a/operations/op-7";

/// Stays `RUNNING` until the configured fetch, then reports `DONE`,
/// optionally with an error attached.
struct CountingSource {
    fetches: AtomicU32,
    done_after: Option<u32>,
    error: Option<(&'static str, &'static str)>,
}

impl CountingSource {
    fn done_after(fetches: u32) -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicU32::new(0),
            done_after: Some(fetches),
            error: None,
        })
    }

    fn never_done() -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicU32::new(0),
            done_after: None,
            error: None,
        })
    }

    fn failing(code: &'static str, message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicU32::new(0),
            done_after: Some(1),
            error: Some((code, message)),
        })
    }

    fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationSource for CountingSource {
    async fn get_operation(&self, operation: &OperationRef) -> CloudResult<Operation> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let mut current = Operation::pending(operation.name.clone(), LINK);
        current.status = OperationStatus::Running;
        if self.done_after.is_some_and(|done| n >= done) {
            current.status = OperationStatus::Done;
            if let Some((code, message)) = self.error {
                current.http_error_status_code = Some(403);
                current.errors.push(OperationErrorDetail {
                    code: code.to_string(),
                    message: message.to_string(),
                });
            }
        }
        Ok(current)
    }
}

fn poller(source: Arc<CountingSource>, cancel: CancellationToken) -> OperationPoller {
    OperationPoller::new(source, cancel)
        .with_timing(Duration::from_secs(1), Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn test_pending_polls_then_done() {
    for pending in [0u32, 1, 3] {
        let source = CountingSource::done_after(pending + 1);
        let done = poller(source.clone(), CancellationToken::new())
            .wait(&Operation::pending("op-7", LINK))
            .await
            .unwrap();

        assert!(done.is_done());
        assert_eq!(source.fetches(), pending + 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_bounds_fetches() {
    let source = CountingSource::never_done();
    let err = poller(source.clone(), CancellationToken::new())
        .wait(&Operation::pending("op-7", LINK))
        .await
        .unwrap_err();

    match err {
        ConvergeError::OperationTimedOut { operation, timeout } => {
            assert_eq!(operation, "op-7");
            assert_eq!(timeout, Duration::from_secs(5));
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert_eq!(source.fetches(), 5);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(source.fetches(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_failed_operation_is_not_a_timeout() {
    let source = CountingSource::failing("PERMISSION_DENIED", "caller lacks container.clusters.create");
    let err = poller(source.clone(), CancellationToken::new())
        .wait(&Operation::pending("op-7", LINK))
        .await
        .unwrap_err();

    match err {
        ConvergeError::OperationFailed {
            operation,
            code,
            message,
        } => {
            assert_eq!(operation, "op-7");
            assert_eq!(code, 403);
            assert!(message.contains("container.clusters.create"));
        }
        other => panic!("expected operation failure, got {other}"),
    }
    assert_eq!(source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_wait() {
    let source = CountingSource::never_done();
    let cancel = CancellationToken::new();
    let poller = poller(source.clone(), cancel.clone());

    let waiting = tokio::spawn(async move { poller.wait(&Operation::pending("op-7", LINK)).await });
    tokio::time::sleep(Duration::from_millis(2500)).await;
    cancel.cancel();

    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, ConvergeError::Cancelled));
    assert_eq!(source.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_poller_from_config() {
    let config = PollerConfig {
        interval_ms: 250,
        timeout_seconds: 2,
        long_operation_seconds: 1,
    };
    let source = CountingSource::never_done();
    let poller = OperationPoller::from_config(source.clone(), &config, CancellationToken::new());
    assert_eq!(poller.interval(), Duration::from_millis(250));

    let err = poller
        .wait(&Operation::pending("op-7", LINK))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvergeError::OperationTimedOut { .. }));
    assert_eq!(source.fetches(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_apply_waits_on_slow_operations() {
    let cloud = MemoryCloud::new().with_polls_per_operation(3);
    let mut config = ConvergeConfig::default();
    config.poller.interval_ms = 1000;
    config.poller.timeout_seconds = 60;

    let report = ApplyCluster::new(config, Arc::new(cloud.clone()), cluster_spec("k8s.example.com"))
        .run()
        .await
        .unwrap();

    // Network, cluster and extra node pool each need three fetches.
    assert_eq!(report.mutation_count(), 3);
    assert_eq!(cloud.operation_fetches(), 9);
    assert!(cloud.cluster("my-project", "us-central1-a", "k8s-example-com").is_some());
}
