//! # Operation Poller
//!
//! Waits for a provider operation to reach `DONE`, sleeping one interval
//! before each status fetch. A fetch that fails is logged and retried on the
//! next tick; only the overall ceiling or cancellation ends the wait early.

use super::{Operation, OperationRef, OperationSource};
use crate::config::PollerConfig;
use crate::constants::polling;
use crate::error::{ConvergeError, ConvergeResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct OperationPoller {
    source: Arc<dyn OperationSource>,
    interval: Duration,
    timeout: Duration,
    long_operation_threshold: Duration,
    cancel: CancellationToken,
}

impl OperationPoller {
    pub fn new(source: Arc<dyn OperationSource>, cancel: CancellationToken) -> Self {
        Self {
            source,
            interval: polling::DEFAULT_INTERVAL,
            timeout: polling::DEFAULT_TIMEOUT,
            long_operation_threshold: polling::LONG_OPERATION_THRESHOLD,
            cancel,
        }
    }

    pub fn from_config(
        source: Arc<dyn OperationSource>,
        config: &PollerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(source, cancel)
            .with_timing(config.interval(), config.timeout())
            .with_long_operation_threshold(config.long_operation_threshold())
    }

    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    pub fn with_long_operation_threshold(mut self, threshold: Duration) -> Self {
        self.long_operation_threshold = threshold;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Block until `operation` finishes, returning its terminal state.
    ///
    /// An operation that is already `DONE` is returned without a fetch.
    pub async fn wait(&self, operation: &Operation) -> ConvergeResult<Operation> {
        if operation.is_done() {
            return Self::finish(operation.clone());
        }

        let reference = OperationRef::parse(&operation.self_link)?;
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ConvergeError::Cancelled);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ConvergeError::Cancelled),
                _ = sleep(self.interval) => {}
            }

            if started.elapsed() > self.timeout {
                warn!(
                    operation = %reference.name,
                    polls = polls,
                    timeout_secs = self.timeout.as_secs(),
                    "Gave up waiting for operation"
                );
                return Err(ConvergeError::OperationTimedOut {
                    operation: reference.name.clone(),
                    timeout: self.timeout,
                });
            }

            let fetch_started = Instant::now();
            polls += 1;
            match self.source.get_operation(&reference).await {
                Ok(current) => {
                    debug!(
                        operation = %reference.name,
                        status = %current.status,
                        latency_ms = fetch_started.elapsed().as_millis() as u64,
                        "Polled operation"
                    );
                    if current.is_done() {
                        let elapsed = started.elapsed();
                        if elapsed > self.long_operation_threshold {
                            info!(
                                operation = %reference.name,
                                elapsed_secs = elapsed.as_secs(),
                                "Long-running operation finished"
                            );
                        }
                        return Self::finish(current);
                    }
                }
                Err(err) => {
                    warn!(
                        operation = %reference.name,
                        error = %err,
                        "Failed to fetch operation status; will retry"
                    );
                }
            }
        }
    }

    fn finish(operation: Operation) -> ConvergeResult<Operation> {
        match operation.failure() {
            Some(failure) => {
                error!(operation = %operation.name, error = %failure, "Operation failed");
                Err(failure)
            }
            None => Ok(operation),
        }
    }
}
