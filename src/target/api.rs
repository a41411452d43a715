//! Imperative rendering through provider calls.

use crate::cloud::{CloudClients, Operation, OperationPoller};
use crate::error::ConvergeResult;
use tracing::debug;

/// Renders changes directly through provider APIs.
#[derive(Clone)]
pub struct ApiTarget {
    cloud: CloudClients,
    poller: OperationPoller,
}

impl ApiTarget {
    pub fn new(cloud: CloudClients, poller: OperationPoller) -> Self {
        Self { cloud, poller }
    }

    pub fn cloud(&self) -> &CloudClients {
        &self.cloud
    }

    /// Wait for a mutation to finish; a failed operation is an error.
    pub async fn wait_for(&self, operation: Operation) -> ConvergeResult<Operation> {
        debug!(operation = %operation.name, status = %operation.status, "Waiting for operation");
        self.poller.wait(&operation).await
    }
}

impl std::fmt::Debug for ApiTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiTarget")
            .field("cloud", &self.cloud)
            .field("poll_interval", &self.poller.interval())
            .field("poll_timeout", &self.poller.timeout())
            .finish()
    }
}
